// 🔄 Collection pipeline
// fetch (or fall back) → filter/truncate → normalize → write dataset

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::config::CollectorConfig;
use crate::error::SourceError;
use crate::http::{HttpFetch, ReqwestFetcher};
use crate::model::{BudgetRecord, Fetched, Municipality, Origin};
use crate::normalize::normalize_municipalities;
use crate::persist::{dataset_name, dataset_path, read_manifest, write_dataset, WriteOutcome};
use crate::sources::{sample_budgets, BdapClient, IstatClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MunicipalitySource {
    Bdap,
    Istat,
}

impl MunicipalitySource {
    pub fn code(&self) -> &'static str {
        match self {
            MunicipalitySource::Bdap => "bdap",
            MunicipalitySource::Istat => "istat",
        }
    }
}

impl fmt::Display for MunicipalitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What one collection run produced
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub dataset: String,
    pub records: usize,
    pub origin: Origin,
    pub outcome: WriteOutcome,
}

impl CollectionReport {
    pub fn path(&self) -> &Path {
        self.outcome.path()
    }

    pub fn is_degraded(&self) -> bool {
        self.origin.is_degraded()
    }
}

pub struct Pipeline<F: HttpFetch = ReqwestFetcher> {
    bdap: BdapClient<F>,
    istat: IstatClient<F>,
    output_dir: PathBuf,
}

impl Pipeline<ReqwestFetcher> {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        Ok(Pipeline {
            bdap: BdapClient::new(config)?,
            istat: IstatClient::new(config)?,
            output_dir: config.output_dir.clone(),
        })
    }
}

impl<F: HttpFetch> Pipeline<F> {
    pub fn with_clients(bdap: BdapClient<F>, istat: IstatClient<F>, output_dir: impl Into<PathBuf>) -> Self {
        Pipeline {
            bdap,
            istat,
            output_dir: output_dir.into(),
        }
    }

    pub fn bdap(&self) -> &BdapClient<F> {
        &self.bdap
    }

    /// Municipalities of `region` from `source`, written to comuni_<source>_<region>.json
    ///
    /// A failing BDAP request yields an empty report flagged as backup;
    /// ISTAT carries its own fallback origin through. Neither replaces a
    /// dataset already on disk (see `write`).
    pub fn collect_municipalities(
        &mut self,
        source: MunicipalitySource,
        region: &str,
        limit: usize,
    ) -> Result<CollectionReport> {
        let fetched: Fetched<Vec<Municipality>> = match source {
            MunicipalitySource::Bdap => match self.bdap.list_municipalities(region, limit) {
                Ok(list) => Fetched::live(list),
                Err(e) => {
                    error!(region, "BDAP collection degraded to empty result: {}", e);
                    Fetched::backup(Vec::new(), format!("{}: {}", e.kind(), e))
                }
            },
            MunicipalitySource::Istat => self.istat.filter_by_region(region, limit),
        };

        let fetched = fetched.map(normalize_municipalities);
        let name = dataset_name(&["comuni", source.code(), region]);
        self.write(&name, &fetched.data, fetched.data.len(), source.code(), fetched.origin)
    }

    /// Sample budgets, written to bilanci_sample.json
    pub fn collect_sample_budgets(&self) -> Result<CollectionReport> {
        let budgets = sample_budgets();
        self.write("bilanci_sample", &budgets, budgets.len(), "sample", Origin::Live)
    }

    /// One BDAP budget, written to bilancio_<code>_<year>.json
    ///
    /// NotFound is a normal outcome (empty report, nothing written); any
    /// other failure is an error.
    pub fn collect_budget(&self, code: &str, year: i32) -> Result<CollectionReport> {
        let year_label = year.to_string();
        let name = dataset_name(&["bilancio", code, &year_label]);

        let records: Vec<BudgetRecord> = match self.bdap.get_budget(code, year) {
            Ok(budget) => {
                if !budget.per_capita_consistent(1.0) {
                    warn!(code, year, "reported per-capita expenditure disagrees with the figures");
                }
                vec![budget]
            }
            Err(SourceError::NotFound { resource }) => {
                warn!(%resource, "no budget published");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        self.write(&name, &records, records.len(), "bdap", Origin::Live)
    }

    /// Write a dataset unless the run would lose data already on disk
    ///
    /// Empty runs never write. Degraded runs never replace a live dataset;
    /// they may replace an older degraded one.
    fn write<T: serde::Serialize + ?Sized>(
        &self,
        name: &str,
        records: &T,
        count: usize,
        source: &str,
        origin: Origin,
    ) -> Result<CollectionReport> {
        let previous = read_manifest(&self.output_dir, name);
        let keep_previous = count == 0
            || (origin.is_degraded() && previous.as_ref().is_some_and(|m| !m.origin.is_degraded()));

        let outcome = if keep_previous {
            warn!(
                dataset = name,
                degraded = origin.is_degraded(),
                kept = previous.is_some(),
                "nothing usable collected, keeping existing dataset"
            );
            WriteOutcome::Skipped {
                path: dataset_path(&self.output_dir, name),
                previous,
            }
        } else {
            write_dataset(&self.output_dir, name, records, count, source, &origin)?
        };

        Ok(CollectionReport {
            dataset: name.to_string(),
            records: count,
            origin,
            outcome,
        })
    }
}
