// 💰 BDAP Source Client
// Banca Dati delle Amministrazioni Pubbliche (MEF) - entity list and budgets
//
// Endpoints:
//   GET {base}/public/elenco_amministrazioni     → {"data": [ {codice_ente, ...}, ... ]}
//   GET {base}/public/bilanci/{code}/{year}      → budget object, or non-200

use serde::{Deserialize, Deserializer};
use tracing::{error, info, warn};

use crate::config::CollectorConfig;
use crate::error::{SourceError, SourceResult};
use crate::http::{HttpFetch, HttpResponse, ReqwestFetcher};
use crate::model::{BudgetRecord, Expenditures, Municipality, Revenues};
use crate::normalize::parse_count;

const ENTITY_TYPE_MUNICIPALITY: &str = "COMUNE";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct EntityListPayload {
    #[serde(default)]
    data: Vec<EntityEntry>,
}

#[derive(Debug, Deserialize)]
struct EntityEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    codice_ente: String,
    #[serde(default, deserialize_with = "lenient_string")]
    denominazione: String,
    #[serde(default, deserialize_with = "lenient_string")]
    tipo_ente: String,
    #[serde(default, deserialize_with = "lenient_string")]
    regione: String,
    #[serde(default, deserialize_with = "lenient_string")]
    provincia: String,
    #[serde(default, deserialize_with = "lenient_count")]
    popolazione: u64,
}

impl EntityEntry {
    fn into_municipality(self) -> Municipality {
        Municipality::new(
            self.codice_ente,
            self.denominazione,
            self.provincia,
            self.regione,
            self.popolazione,
        )
    }
}

/// Budget object as published: Italian field names, revenues ("entrate")
/// and expenditures ("spese") split by title
#[derive(Debug, Deserialize)]
pub(crate) struct BudgetPayload {
    #[serde(default)]
    anno: Option<i32>,
    entrate: RevenuePayload,
    spese: ExpenditurePayload,
    #[serde(default, deserialize_with = "lenient_count")]
    popolazione: u64,
    #[serde(default)]
    spesa_procapite: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RevenuePayload {
    #[serde(default)]
    tributarie: f64,
    #[serde(default)]
    trasferimenti: f64,
    #[serde(default)]
    extratributarie: f64,
}

#[derive(Debug, Deserialize)]
struct ExpenditurePayload {
    #[serde(default)]
    correnti: f64,
    #[serde(default)]
    investimenti: f64,
    #[serde(default)]
    rimborso_prestiti: f64,
}

impl BudgetPayload {
    pub(crate) fn into_record(self, municipality: &str, requested_year: i32) -> BudgetRecord {
        let record = BudgetRecord::new(
            municipality,
            self.anno.unwrap_or(requested_year),
            Revenues {
                tax: self.entrate.tributarie,
                transfers: self.entrate.trasferimenti,
                other: self.entrate.extratributarie,
            },
            Expenditures {
                current: self.spese.correnti,
                investment: self.spese.investimenti,
                debt_repayment: self.spese.rimborso_prestiti,
            },
            self.popolazione,
        );

        match self.spesa_procapite {
            Some(reported) => record.with_reported_per_capita(reported),
            None => record,
        }
    }
}

/// Codes arrive both as "058091" and as 58091 depending on the dataset release
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

/// Population as whole number, grouped numeric string ("43.600"), or null
///
/// Fractional or unreadable values count as missing (0).
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => parse_count(&s).unwrap_or(0),
        _ => 0,
    })
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct BdapClient<F: HttpFetch = ReqwestFetcher> {
    fetcher: F,
    base_url: String,
}

impl BdapClient<ReqwestFetcher> {
    /// Client backed by a blocking HTTP session (user agent + timeout set once)
    pub fn new(config: &CollectorConfig) -> SourceResult<Self> {
        Ok(Self::with_fetcher(ReqwestFetcher::new(config)?, &config.bdap_base_url))
    }
}

impl<F: HttpFetch> BdapClient<F> {
    pub fn with_fetcher(fetcher: F, base_url: &str) -> Self {
        BdapClient {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn entity_list_url(&self) -> String {
        format!("{}/public/elenco_amministrazioni", self.base_url)
    }

    fn budget_url(&self, code: &str, year: i32) -> String {
        format!("{}/public/bilanci/{}/{}", self.base_url, code, year)
    }

    /// Probe the entity list endpoint; true only on HTTP 200
    pub fn test_connection(&self) -> bool {
        match self.fetcher.get(&self.entity_list_url()) {
            Ok(response) => response.status == 200,
            Err(e) => {
                error!("BDAP connection failed: {}", e);
                false
            }
        }
    }

    /// Municipalities ("COMUNE" entities) of `region`, at most `limit`
    ///
    /// Filtering is client-side over the full entity list; the region must
    /// match exactly, ignoring case.
    pub fn list_municipalities(&self, region: &str, limit: usize) -> SourceResult<Vec<Municipality>> {
        let url = self.entity_list_url();
        info!(region, limit, "fetching BDAP municipalities");

        let result = self
            .fetcher
            .get(&url)
            .and_then(|response| require_success(&url, response))
            .and_then(|response| {
                serde_json::from_slice::<EntityListPayload>(&response.body).map_err(SourceError::from)
            });

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                error!(region, "BDAP municipality list failed: {}", e);
                return Err(e);
            }
        };

        let municipalities: Vec<Municipality> = payload
            .data
            .into_iter()
            .filter(|entry| entry.tipo_ente.eq_ignore_ascii_case(ENTITY_TYPE_MUNICIPALITY))
            .map(EntityEntry::into_municipality)
            .filter(|m| m.in_region(region))
            .take(limit)
            .collect();

        info!(region, found = municipalities.len(), "BDAP municipalities fetched");
        Ok(municipalities)
    }

    /// Budget of one municipality for one year
    ///
    /// `code` must be ASCII alphanumeric. HTTP 404 → NotFound; any other
    /// non-2xx → Transport.
    pub fn get_budget(&self, code: &str, year: i32) -> SourceResult<BudgetRecord> {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SourceError::InvalidRequest {
                detail: format!("municipality code must be alphanumeric: {:?}", code),
            });
        }
        let url = self.budget_url(code, year);
        info!(code, year, "fetching BDAP budget");

        let response = self.fetcher.get(&url).map_err(|e| {
            error!(code, year, "BDAP budget request failed: {}", e);
            e
        })?;

        if response.status == 404 {
            warn!(code, year, "no budget data");
            return Err(SourceError::NotFound {
                resource: format!("bilanci/{}/{}", code, year),
            });
        }
        let response = require_success(&url, response)?;

        let payload: BudgetPayload = serde_json::from_slice(&response.body).map_err(|e| {
            error!(code, year, "malformed BDAP budget: {}", e);
            SourceError::from(e)
        })?;

        Ok(payload.into_record(code, year))
    }
}

fn require_success(url: &str, response: HttpResponse) -> SourceResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(SourceError::transport(url, format!("HTTP {}", response.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fixtures::FixtureFetcher;
    use proptest::prelude::*;
    use serde_json::json;

    const BASE: &str = "http://bdap.test/api/v1";
    const LIST_URL: &str = "http://bdap.test/api/v1/public/elenco_amministrazioni";

    fn entity(code: &str, name: &str, kind: &str, region: &str) -> serde_json::Value {
        json!({
            "codice_ente": code,
            "denominazione": name,
            "tipo_ente": kind,
            "regione": region,
            "provincia": "RM",
            "popolazione": 10000
        })
    }

    fn entity_list_fixture() -> serde_json::Value {
        json!({
            "data": [
                entity("058091", "Roma", "COMUNE", "LAZIO"),
                entity("015146", "Milano", "COMUNE", "LOMBARDIA"),
                entity("058001", "Albano Laziale", "COMUNE", "Lazio"),
                entity("058059", "Marino", "COMUNE", "LAZIO"),
                entity("063049", "Napoli", "COMUNE", "CAMPANIA"),
                entity("058047", "Frascati", "COMUNE", "LAZIO"),
                entity("058050", "Grottaferrata", "COMUNE", "lazio"),
                entity("R12", "Regione Lazio", "REGIONE", "LAZIO")
            ]
        })
    }

    fn client(fetcher: FixtureFetcher) -> BdapClient<FixtureFetcher> {
        BdapClient::with_fetcher(fetcher, BASE)
    }

    #[test]
    fn test_connection_ok_on_200() {
        let bdap = client(FixtureFetcher::new().with_json(LIST_URL, 200, json!({"data": []})));
        assert!(bdap.test_connection());
    }

    #[test]
    fn test_connection_false_on_error_status_or_transport() {
        let unavailable = client(FixtureFetcher::new().with_json(LIST_URL, 503, json!({})));
        assert!(!unavailable.test_connection());

        let unreachable = client(FixtureFetcher::new());
        assert!(!unreachable.test_connection());
    }

    #[test]
    fn test_list_municipalities_limits_and_filters_region() {
        let bdap = client(FixtureFetcher::new().with_json(LIST_URL, 200, entity_list_fixture()));

        let comuni = bdap.list_municipalities("LAZIO", 3).unwrap();

        assert_eq!(comuni.len(), 3);
        assert!(comuni.iter().all(|m| m.region.eq_ignore_ascii_case("LAZIO")));
        assert_eq!(comuni[0].name, "Roma");
        assert_eq!(comuni[1].name, "Albano Laziale");
        assert_eq!(comuni[2].name, "Marino");
    }

    #[test]
    fn test_list_municipalities_excludes_non_comune_entities() {
        let bdap = client(FixtureFetcher::new().with_json(LIST_URL, 200, entity_list_fixture()));

        let comuni = bdap.list_municipalities("lazio", 100).unwrap();

        assert_eq!(comuni.len(), 5);
        assert!(comuni.iter().all(|m| m.code != "R12"));
    }

    #[test]
    fn test_list_municipalities_lenient_fields() {
        let payload = json!({
            "data": [
                {"codice_ente": 58091, "denominazione": "Roma", "tipo_ente": "COMUNE",
                 "regione": "LAZIO", "provincia": "RM", "popolazione": null},
                {"codice_ente": "058059", "denominazione": "Marino", "tipo_ente": "COMUNE",
                 "regione": "LAZIO", "provincia": "RM", "popolazione": "43.600"},
                {"codice_ente": "058047", "denominazione": "Frascati", "tipo_ente": "COMUNE",
                 "regione": "LAZIO", "provincia": "RM", "popolazione": "22,500"},
                {"codice_ente": "058050", "denominazione": "Grottaferrata", "tipo_ente": "COMUNE",
                 "regione": "LAZIO", "provincia": "RM", "popolazione": "1.5"},
                {"codice_ente": "058001", "denominazione": "Albano Laziale", "tipo_ente": "COMUNE",
                 "regione": "LAZIO", "provincia": "RM", "popolazione": 41700.5}
            ]
        });
        let bdap = client(FixtureFetcher::new().with_json(LIST_URL, 200, payload));

        let comuni = bdap.list_municipalities("LAZIO", 5).unwrap();
        assert_eq!(comuni[0].code, "58091");
        assert_eq!(comuni[0].population, 0);
        assert_eq!(comuni[1].population, 43_600);
        assert_eq!(comuni[2].population, 22_500);
        // Decimal values are not head counts
        assert_eq!(comuni[3].population, 0);
        assert_eq!(comuni[4].population, 0);
    }

    #[test]
    fn test_list_municipalities_surfaces_failures() {
        let down = client(FixtureFetcher::new().with_json(LIST_URL, 500, json!({})));
        assert_eq!(down.list_municipalities("LAZIO", 3).unwrap_err().kind(), "transport");

        let garbage = client(FixtureFetcher::new().with_bytes(LIST_URL, 200, b"<html>oops</html>"));
        assert_eq!(garbage.list_municipalities("LAZIO", 3).unwrap_err().kind(), "parse");

        let slow = client(FixtureFetcher::new().with_timeout(LIST_URL));
        assert_eq!(slow.list_municipalities("LAZIO", 3).unwrap_err().kind(), "timeout");
    }

    #[test]
    fn test_get_budget_not_found() {
        let url = format!("{}/public/bilanci/999999/2022", BASE);
        let bdap = client(FixtureFetcher::new().with_json(&url, 404, json!({"detail": "Not Found"})));

        let err = bdap.get_budget("999999", 2022).unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_get_budget_rejects_path_like_codes() {
        let bdap = client(FixtureFetcher::new());

        for code in ["../x", "058091/2021", "", "05 8091", "058091?anno=1"] {
            let err = bdap.get_budget(code, 2022).unwrap_err();
            assert_eq!(err.kind(), "invalid_request", "code {:?}", code);
        }
        assert_eq!(bdap.fetcher.call_count("http://bdap.test/api/v1/public/bilanci/../x/2022"), 0);
    }

    #[test]
    fn test_get_budget_server_error_is_transport() {
        let url = format!("{}/public/bilanci/058091/2022", BASE);
        let bdap = client(FixtureFetcher::new().with_json(&url, 502, json!({})));

        let err = bdap.get_budget("058091", 2022).unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_get_budget_normalizes_italian_layout() {
        let url = format!("{}/public/bilanci/058059/2023", BASE);
        let body = json!({
            "anno": 2023,
            "entrate": {"tributarie": 28000000, "trasferimenti": 6000000, "extratributarie": 4000000},
            "spese": {"correnti": 30000000, "investimenti": 5000000, "rimborso_prestiti": 2000000},
            "popolazione": 43600,
            "spesa_procapite": 849
        });
        let bdap = client(FixtureFetcher::new().with_json(&url, 200, body));

        let budget = bdap.get_budget("058059", 2023).unwrap();

        assert_eq!(budget.municipality, "058059");
        assert_eq!(budget.year, 2023);
        assert_eq!(budget.revenues.tax, 28_000_000.0);
        assert_eq!(budget.expenditures.debt_repayment, 2_000_000.0);
        assert_eq!(budget.per_capita_expenditure, 849.0);
        assert!(budget.per_capita_consistent(1.0));
    }

    #[test]
    fn test_get_budget_missing_sections_is_parse_error() {
        let url = format!("{}/public/bilanci/058091/2022", BASE);
        let bdap = client(FixtureFetcher::new().with_json(&url, 200, json!({"anno": 2022})));

        assert_eq!(bdap.get_budget("058091", 2022).unwrap_err().kind(), "parse");
    }

    fn arb_entity() -> impl Strategy<Value = serde_json::Value> {
        (
            "[0-9]{6}",
            "[A-Z][a-z]{2,10}",
            prop::sample::select(vec!["COMUNE", "comune", "REGIONE", "PROVINCIA"]),
            prop::sample::select(vec!["LAZIO", "Lazio", "LOMBARDIA", "Campania", "Valle d'Aosta"]),
        )
            .prop_map(|(code, name, kind, region)| entity(&code, &name, kind, region))
    }

    proptest! {
        #[test]
        fn list_municipalities_is_bounded_and_in_region(
            entries in prop::collection::vec(arb_entity(), 0..40),
            region in prop_oneof![
                prop::sample::select(vec!["lazio", "LOMBARDIA", "campania", "valle d'aosta"]).prop_map(String::from),
                "[A-Za-z' ]{0,12}",
            ],
            limit in 0usize..15,
        ) {
            let matching = entries
                .iter()
                .filter(|e| e["tipo_ente"].as_str().unwrap_or("").eq_ignore_ascii_case("COMUNE"))
                .filter(|e| e["regione"].as_str().unwrap_or("").to_lowercase() == region.to_lowercase())
                .count();
            let bdap = client(FixtureFetcher::new().with_json(LIST_URL, 200, json!({"data": entries})));

            let comuni = bdap.list_municipalities(&region, limit).unwrap();

            prop_assert_eq!(comuni.len(), matching.min(limit));
            prop_assert!(comuni.iter().all(|m| m.in_region(&region)));
        }
    }
}
