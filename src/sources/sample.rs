// 🧪 Sample budgets
// Stand-in for a budget source: three Lazio municipalities, year 2023.

use std::collections::BTreeMap;

use crate::model::{BudgetRecord, Expenditures, Revenues};

pub const SAMPLE_YEAR: i32 = 2023;

/// Example budgets keyed by municipality name
///
/// Per-capita expenditure is derived from the figures; the published
/// rounded values (870, 768, 849) agree within one euro.
pub fn sample_budgets() -> BTreeMap<String, BudgetRecord> {
    let mut budgets = BTreeMap::new();

    budgets.insert(
        "Roma".to_string(),
        BudgetRecord::new(
            "058091",
            SAMPLE_YEAR,
            Revenues {
                tax: 1_500_000_000.0,
                transfers: 800_000_000.0,
                other: 300_000_000.0,
            },
            Expenditures {
                current: 2_000_000_000.0,
                investment: 400_000_000.0,
                debt_repayment: 100_000_000.0,
            },
            2_872_800,
        ),
    );

    budgets.insert(
        "Albano Laziale".to_string(),
        BudgetRecord::new(
            "058001",
            SAMPLE_YEAR,
            Revenues {
                tax: 25_000_000.0,
                transfers: 5_000_000.0,
                other: 3_000_000.0,
            },
            Expenditures {
                current: 28_000_000.0,
                investment: 3_000_000.0,
                debt_repayment: 1_000_000.0,
            },
            41_700,
        ),
    );

    budgets.insert(
        "Marino".to_string(),
        BudgetRecord::new(
            "058059",
            SAMPLE_YEAR,
            Revenues {
                tax: 28_000_000.0,
                transfers: 6_000_000.0,
                other: 4_000_000.0,
            },
            Expenditures {
                current: 30_000_000.0,
                investment: 5_000_000.0,
                debt_repayment: 2_000_000.0,
            },
            43_600,
        ),
    );

    budgets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_budgets_deterministic() {
        let first = sample_budgets();
        assert_eq!(first, sample_budgets());

        let names: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["Albano Laziale", "Marino", "Roma"]);
    }

    #[test]
    fn test_sample_budgets_match_published_per_capita() {
        let budgets = sample_budgets();
        let published = [("Roma", 870.0), ("Albano Laziale", 768.0), ("Marino", 849.0)];

        for (name, value) in published {
            let budget = &budgets[name];
            assert!(
                (budget.per_capita_expenditure - value).abs() < 1.0,
                "{name}: derived {} vs published {value}",
                budget.per_capita_expenditure
            );
            assert!(budget.per_capita_consistent(1e-9));
            assert_eq!(budget.year, SAMPLE_YEAR);
        }
    }

    #[test]
    fn test_sample_budget_references_istat_codes() {
        let budgets = sample_budgets();
        assert_eq!(budgets["Roma"].municipality, "058091");
        assert_eq!(budgets["Marino"].population, 43_600);
        assert_eq!(budgets["Albano Laziale"].revenues.total(), 33_000_000.0);
    }
}
