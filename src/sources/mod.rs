// Source clients - one module per upstream open-data source
//
// - bdap:    MEF budget database (JSON API)
// - istat:   municipality roster (CSV feed, with built-in backup table)
// - headers: known ISTAT header sets
// - sample:  example budgets while no live budget source is wired in

pub mod bdap;
pub mod headers;
pub mod istat;
pub mod sample;

pub use bdap::BdapClient;
pub use headers::{ColumnMap, HeaderSchema};
pub use istat::{backup_data, IstatClient, RosterTable};
pub use sample::sample_budgets;
