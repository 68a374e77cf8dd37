// 🧹 Record Normalizer
// Bring municipalities from different sources to one shape before export

use std::collections::HashSet;

use tracing::debug;

use crate::model::Municipality;

/// ISTAT municipality codes are six digits ("058091")
pub const MUNICIPALITY_CODE_WIDTH: usize = 6;

/// Trim and collapse internal whitespace
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Left-pad purely numeric codes to six digits; other codes are only trimmed
///
/// Sources that read the code as a number drop its leading zeros: 58091 → "058091".
pub fn normalize_code(code: &str) -> String {
    let code = code.trim();
    if !code.is_empty() && code.len() < MUNICIPALITY_CODE_WIDTH && code.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>width$}", code, width = MUNICIPALITY_CODE_WIDTH)
    } else {
        code.to_string()
    }
}

/// Whole count written plainly or with thousands grouping: "2872800",
/// "2.872.800", "2,872,800", "2 872 800"
///
/// One separator kind per value; every group after the first must have
/// exactly three digits. Decimals ("1.5", "43,6") and mixed separators are
/// rejected.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok();
    }

    let separator = raw.chars().find(|c| !c.is_ascii_digit())?;
    if !matches!(separator, '.' | ',' | ' ' | '\u{a0}') {
        return None;
    }

    let groups: Vec<&str> = raw.split(separator).collect();
    let (first, rest) = groups.split_first()?;
    let well_formed = (1..=3).contains(&first.len())
        && first.chars().all(|c| c.is_ascii_digit())
        && rest
            .iter()
            .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()));

    if well_formed {
        groups.concat().parse().ok()
    } else {
        None
    }
}

pub fn normalize_municipality(m: Municipality) -> Municipality {
    Municipality {
        code: normalize_code(&m.code),
        name: clean_text(&m.name),
        province: clean_text(&m.province),
        region: clean_text(&m.region),
        population: m.population,
    }
}

/// Normalize every record and drop repeated codes, keeping the first occurrence
///
/// Order of the surviving records is preserved.
pub fn normalize_municipalities(records: Vec<Municipality>) -> Vec<Municipality> {
    let total = records.len();
    let mut seen = HashSet::new();

    let normalized: Vec<Municipality> = records
        .into_iter()
        .map(normalize_municipality)
        .filter(|m| seen.insert(m.code.clone()))
        .collect();

    if normalized.len() < total {
        debug!(dropped = total - normalized.len(), "duplicate municipality codes dropped");
    }
    normalized
}
