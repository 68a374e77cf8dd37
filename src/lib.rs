// Trasparenza Comuni - Core Library
// Collectors for Italian municipal open data, exposed for the CLI, the API server, and tests

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod sources;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{CollectorConfig, ServerConfig};
pub use error::{SourceError, SourceResult};
pub use http::{HttpFetch, HttpResponse, ReqwestFetcher};
pub use model::{BudgetRecord, Expenditures, Fetched, Municipality, Origin, Revenues};
pub use normalize::normalize_municipalities;
pub use persist::{load, persist, write_dataset, DatasetManifest, WriteOutcome};
pub use pipeline::{CollectionReport, MunicipalitySource, Pipeline};
pub use sources::{backup_data, sample_budgets, BdapClient, IstatClient, RosterTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
