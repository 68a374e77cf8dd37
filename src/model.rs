// 🏛️ Domain Model - Municipalities and budgets
//
// Municipality is identified by its ISTAT code; BudgetRecord references it by code.
// Both are plain values: built by a source client, never mutated afterwards.

use serde::{Deserialize, Serialize};

// ============================================================================
// MUNICIPALITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    pub province: String,
    pub region: String,
    #[serde(default)]
    pub population: u64,
}

impl Municipality {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        province: impl Into<String>,
        region: impl Into<String>,
        population: u64,
    ) -> Self {
        Municipality {
            code: code.into(),
            name: name.into(),
            province: province.into(),
            region: region.into(),
            population,
        }
    }

    /// Exact region match, ignoring case
    pub fn in_region(&self, region: &str) -> bool {
        self.region.to_lowercase() == region.to_lowercase()
    }
}

// ============================================================================
// BUDGET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Revenues {
    pub tax: f64,
    pub transfers: f64,
    pub other: f64,
}

impl Revenues {
    pub fn total(&self) -> f64 {
        self.tax + self.transfers + self.other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Expenditures {
    pub current: f64,
    pub investment: f64,
    pub debt_repayment: f64,
}

impl Expenditures {
    pub fn total(&self) -> f64 {
        self.current + self.investment + self.debt_repayment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    /// Municipality.code
    pub municipality: String,
    pub year: i32,
    pub revenues: Revenues,
    pub expenditures: Expenditures,
    pub population: u64,
    pub per_capita_expenditure: f64,
}

impl BudgetRecord {
    /// Build a record, deriving per-capita expenditure from the figures
    pub fn new(
        municipality: impl Into<String>,
        year: i32,
        revenues: Revenues,
        expenditures: Expenditures,
        population: u64,
    ) -> Self {
        BudgetRecord {
            municipality: municipality.into(),
            year,
            revenues,
            expenditures,
            population,
            per_capita_expenditure: per_capita(expenditures.total(), population),
        }
    }

    /// Override the derived value with one reported upstream
    pub fn with_reported_per_capita(mut self, value: f64) -> Self {
        self.per_capita_expenditure = value;
        self
    }

    /// Balance = revenues - expenditures
    pub fn balance(&self) -> f64 {
        self.revenues.total() - self.expenditures.total()
    }

    /// per_capita_expenditure ≈ sum(expenditures) / population, within `tolerance` (absolute)
    pub fn per_capita_consistent(&self, tolerance: f64) -> bool {
        let derived = per_capita(self.expenditures.total(), self.population);
        (self.per_capita_expenditure - derived).abs() <= tolerance
    }
}

fn per_capita(total: f64, population: u64) -> f64 {
    if population == 0 {
        0.0
    } else {
        total / population as f64
    }
}

// ============================================================================
// PROVENANCE
// ============================================================================

/// Where a result came from: the live source, or a fallback after a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    Live,
    Backup { reason: String },
}

impl Origin {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Origin::Backup { .. })
    }
}

/// A result flagged with its origin, so fallbacks are observable
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub origin: Origin,
}

impl<T> Fetched<T> {
    pub fn live(data: T) -> Self {
        Fetched { data, origin: Origin::Live }
    }

    pub fn backup(data: T, reason: impl Into<String>) -> Self {
        Fetched {
            data,
            origin: Origin::Backup { reason: reason.into() },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.origin.is_degraded()
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            origin: self.origin,
        }
    }
}
