// 🗂️ Roster header aliases
//
// The ISTAT CSV renames its columns between releases. Each HeaderSchema is
// one known header set; resolve() picks the first schema whose required
// columns are all present and reports which ones are missing otherwise.

use crate::error::{SourceError, SourceResult};

/// Known header names for each canonical field, in one schema version
#[derive(Debug, Clone, Copy)]
pub struct HeaderSchema {
    pub version: &'static str,
    pub code: &'static [&'static str],
    pub name: &'static [&'static str],
    pub province: &'static [&'static str],
    pub region: &'static [&'static str],
    /// Optional: the roster does not always carry population
    pub population: &'static [&'static str],
}

/// Current "Elenco comuni italiani" release
pub const ISTAT_2024: HeaderSchema = HeaderSchema {
    version: "istat-2024",
    code: &["Codice Comune formato alfanumerico", "Codice Comune formato numerico"],
    name: &["Denominazione in italiano", "Denominazione (Italiana e straniera)"],
    province: &[
        "Denominazione dell'Unità territoriale sovracomunale (valida a fini statistici)",
        "Denominazione Provincia",
    ],
    region: &["Denominazione Regione"],
    population: &["Popolazione legale 2011 (09/10/2011)", "Popolazione legale"],
};

/// Short headers used by older extracts and by the backup table
pub const ISTAT_LEGACY: HeaderSchema = HeaderSchema {
    version: "istat-legacy",
    code: &["Codice Comune", "Codice Istat", "Codice"],
    name: &["Denominazione", "Comune", "Nome Comune"],
    province: &["Provincia", "Sigla automobilistica"],
    region: &["Regione"],
    population: &["Popolazione_2023", "Popolazione"],
};

pub const KNOWN_SCHEMAS: &[HeaderSchema] = &[ISTAT_2024, ISTAT_LEGACY];

/// Column indexes of the canonical fields in one concrete header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub version: &'static str,
    pub code: usize,
    pub name: usize,
    pub province: usize,
    pub region: usize,
    pub population: Option<usize>,
}

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        let wanted = normalize_header(alias);
        headers.iter().position(|h| normalize_header(h) == wanted)
    })
}

impl HeaderSchema {
    /// Match this schema against a header row
    ///
    /// Comparison is exact after trimming, collapsing whitespace and lowercasing,
    /// so "Codice Regione" never stands in for "Regione".
    pub fn resolve(&self, headers: &[String]) -> Result<ColumnMap, Vec<String>> {
        let code = find_column(headers, self.code);
        let name = find_column(headers, self.name);
        let province = find_column(headers, self.province);
        let region = find_column(headers, self.region);

        match (code, name, province, region) {
            (Some(code), Some(name), Some(province), Some(region)) => Ok(ColumnMap {
                version: self.version,
                code,
                name,
                province,
                region,
                population: find_column(headers, self.population),
            }),
            _ => {
                let missing = [("code", code), ("name", name), ("province", province), ("region", region)]
                    .iter()
                    .filter(|(_, idx)| idx.is_none())
                    .map(|(field, _)| field.to_string())
                    .collect();
                Err(missing)
            }
        }
    }
}

/// Resolve against every known schema, newest first
///
/// On failure the error lists the fields missing under the closest schema
/// (the one with the fewest missing fields).
pub fn resolve(headers: &[String]) -> SourceResult<ColumnMap> {
    let mut closest: Option<Vec<String>> = None;

    for schema in KNOWN_SCHEMAS {
        match schema.resolve(headers) {
            Ok(map) => return Ok(map),
            Err(missing) => {
                if closest.as_ref().map_or(true, |c| missing.len() < c.len()) {
                    closest = Some(missing);
                }
            }
        }
    }

    Err(SourceError::Schema {
        missing: closest.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_current_release() {
        let row = headers(&[
            "Codice Regione",
            "Codice Comune formato alfanumerico",
            "Denominazione (Italiana e straniera)",
            "Denominazione in italiano",
            "Denominazione Regione",
            "Denominazione dell'Unità territoriale sovracomunale (valida a fini statistici)",
            "Sigla automobilistica",
        ]);

        let map = resolve(&row).unwrap();
        assert_eq!(map.version, "istat-2024");
        assert_eq!(map.code, 1);
        assert_eq!(map.name, 3);
        assert_eq!(map.region, 4);
        assert_eq!(map.province, 5);
        assert_eq!(map.population, None);
    }

    #[test]
    fn test_resolve_legacy_headers_with_noise() {
        let row = headers(&["\u{feff}Codice Comune", " Denominazione ", "PROVINCIA", "Regione", "Popolazione_2023"]);

        let map = resolve(&row).unwrap();
        assert_eq!(map.version, "istat-legacy");
        assert_eq!(map.code, 0);
        assert_eq!(map.province, 2);
        assert_eq!(map.population, Some(4));
    }

    #[test]
    fn test_region_code_column_is_not_a_region_name() {
        let row = headers(&["Codice Comune", "Denominazione", "Provincia", "Codice Regione"]);

        match resolve(&row).unwrap_err() {
            SourceError::Schema { missing } => assert_eq!(missing, vec!["region".to_string()]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_unrelated_headers_report_all_missing() {
        let row = headers(&["id", "label"]);
        let err = resolve(&row).unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("region"));
    }
}
