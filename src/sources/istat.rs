// 📊 ISTAT Source Client
// Italian municipality roster ("Elenco comuni italiani", semicolon-separated CSV)
//
// The client never fails outright: when the download or parse fails it
// degrades to a small built-in table, and says so through Origin::Backup.

use std::time::{Duration, Instant};

use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::error::{SourceError, SourceResult};
use crate::http::{HttpFetch, ReqwestFetcher};
use crate::model::{Fetched, Municipality};
use crate::normalize::parse_count;
use crate::sources::headers::{self, ColumnMap};

// ============================================================================
// ROSTER TABLE
// ============================================================================

/// Tabular roster: header row plus string cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RosterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse a roster CSV body (UTF-8 or Latin-1, `;` delimited)
    pub fn from_csv_bytes(bytes: &[u8]) -> SourceResult<RosterTable> {
        let text = decode_text(bytes);

        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SourceError::parse("roster CSV has no header row"));
        }

        let mut rows = Vec::new();
        for (line_num, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                SourceError::parse(format!("roster CSV line {}: {}", line_num + 2, e))
            })?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(RosterTable { headers, rows })
    }

    fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|s| s.trim()).unwrap_or("")
    }

    fn to_municipality(columns: &ColumnMap, row: &[String]) -> Municipality {
        let population = columns
            .population
            .map(|idx| parse_population(Self::cell(row, idx)))
            .unwrap_or(0);

        Municipality::new(
            Self::cell(row, columns.code),
            Self::cell(row, columns.name),
            Self::cell(row, columns.province),
            Self::cell(row, columns.region),
            population,
        )
    }

    /// Rows whose region contains `region` (case-insensitive), at most `limit`
    pub fn select_region(&self, columns: &ColumnMap, region: &str, limit: usize) -> Vec<Municipality> {
        let needle = region.to_lowercase();
        self.rows
            .iter()
            .filter(|row| Self::cell(row, columns.region).to_lowercase().contains(&needle))
            .take(limit)
            .map(|row| Self::to_municipality(columns, row))
            .collect()
    }

    /// First `limit` rows, no filtering
    pub fn head(&self, columns: &ColumnMap, limit: usize) -> Vec<Municipality> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| Self::to_municipality(columns, row))
            .collect()
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte is its own code point)
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Grouped or plain whole number; anything else (blank, "n.d.", decimals) → 0
fn parse_population(raw: &str) -> u64 {
    parse_count(raw).unwrap_or(0)
}

// ============================================================================
// BACKUP DATA
// ============================================================================

/// Built-in sample roster used when ISTAT is unreachable
pub fn backup_data() -> RosterTable {
    let headers = ["Codice Comune", "Denominazione", "Provincia", "Regione", "Popolazione_2023"];
    let rows = [
        ["058091", "Roma", "Roma", "Lazio", "2872800"],
        ["058001", "Albano Laziale", "Roma", "Lazio", "41700"],
        ["058059", "Marino", "Roma", "Lazio", "43600"],
    ];

    RosterTable {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}

// ============================================================================
// CLIENT
// ============================================================================

struct CachedRoster {
    roster: Fetched<RosterTable>,
    fetched_at: Instant,
}

impl CachedRoster {
    /// Backup tables are never considered fresh: the next call retries the source
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.roster.is_degraded() && self.fetched_at.elapsed() < ttl
    }
}

pub struct IstatClient<F: HttpFetch = ReqwestFetcher> {
    fetcher: F,
    roster_url: String,
    ttl: Duration,
    cache: Option<CachedRoster>,
}

impl IstatClient<ReqwestFetcher> {
    pub fn new(config: &CollectorConfig) -> SourceResult<Self> {
        Ok(Self::with_fetcher(
            ReqwestFetcher::new(config)?,
            &config.istat_roster_url,
            config.roster_ttl,
        ))
    }
}

impl<F: HttpFetch> IstatClient<F> {
    pub fn with_fetcher(fetcher: F, roster_url: &str, ttl: Duration) -> Self {
        IstatClient {
            fetcher,
            roster_url: roster_url.to_string(),
            ttl,
            cache: None,
        }
    }

    fn download(&self) -> SourceResult<RosterTable> {
        let response = self.fetcher.get(&self.roster_url)?;
        if !response.is_success() {
            return Err(SourceError::transport(
                &self.roster_url,
                format!("HTTP {}", response.status),
            ));
        }
        RosterTable::from_csv_bytes(&response.body)
    }

    /// Download and parse the roster; on any failure return the backup table
    pub fn fetch_municipality_roster(&self) -> Fetched<RosterTable> {
        info!(url = %self.roster_url, "downloading ISTAT roster");

        match self.download() {
            Ok(table) => {
                info!(rows = table.len(), "ISTAT roster downloaded");
                Fetched::live(table)
            }
            Err(e) => {
                warn!("ISTAT roster unavailable ({}), using backup data", e);
                Fetched::backup(backup_data(), format!("{}: {}", e.kind(), e))
            }
        }
    }

    /// Cached roster, downloading it when missing or stale
    pub fn roster(&mut self) -> &Fetched<RosterTable> {
        let entry = match self.cache.take() {
            Some(entry) if entry.is_fresh(self.ttl) => entry,
            _ => CachedRoster {
                roster: self.fetch_municipality_roster(),
                fetched_at: Instant::now(),
            },
        };
        &self.cache.insert(entry).roster
    }

    /// Force a new download regardless of cache age
    pub fn refresh(&mut self) -> &Fetched<RosterTable> {
        self.invalidate();
        self.roster()
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Age of the cached roster, if any
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache.as_ref().map(|c| c.fetched_at.elapsed())
    }

    /// Municipalities whose region contains `region` (case-insensitive), at most `limit`
    ///
    /// If the roster headers match no known schema the drift is reported as a
    /// backup origin and the first `limit` backup rows are returned unfiltered.
    pub fn filter_by_region(&mut self, region: &str, limit: usize) -> Fetched<Vec<Municipality>> {
        let roster = self.roster();

        let result = match headers::resolve(&roster.data.headers) {
            Ok(columns) => Fetched {
                data: roster.data.select_region(&columns, region, limit),
                origin: roster.origin.clone(),
            },
            Err(e) => {
                warn!("ISTAT roster headers not recognized ({}), using backup data", e);
                let backup = backup_data();
                let rows = match headers::resolve(&backup.headers) {
                    Ok(columns) => backup.head(&columns, limit),
                    Err(_) => Vec::new(),
                };
                Fetched::backup(rows, format!("schema drift: {}", e))
            }
        };

        info!(region, found = result.data.len(), degraded = result.is_degraded(), "ISTAT municipalities selected");
        result
    }
}
