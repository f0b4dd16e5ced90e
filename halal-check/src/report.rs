use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{CheckerError, Result};
use crate::models::{IngredientResult, IngredientStatus, NOT_AVAILABLE};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub const CSV_HEADER: [&str; 5] = [
    "Ingredient",
    "Status",
    "Expiry Date",
    "Supplier",
    "Certificate ID",
];

/// Whole days until the certificate lapses, rounded up; `None` when there is no usable date.
pub fn days_until_expiry(expiry_date: &str, now: DateTime<Utc>) -> Option<i64> {
    let expiry_date = expiry_date.trim();
    if expiry_date.is_empty() || expiry_date == NOT_AVAILABLE {
        return None;
    }

    let expiry = NaiveDate::parse_from_str(expiry_date, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    let remaining_ms = (expiry - now).num_milliseconds();

    Some(remaining_ms.div_euclid(MS_PER_DAY) + i64::from(remaining_ms.rem_euclid(MS_PER_DAY) != 0))
}

/// True when the certificate lapses within `threshold_days` but has not lapsed yet.
pub fn is_expiring(expiry_date: &str, now: DateTime<Utc>, threshold_days: i64) -> bool {
    days_until_expiry(expiry_date, now).is_some_and(|days| days > 0 && days <= threshold_days)
}

/// Display bucket for one result row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificationState {
    Certified,
    Expiring,
    Issue,
}

pub fn certification_state(
    result: &IngredientResult,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> CertificationState {
    match result.status {
        IngredientStatus::Certified if is_expiring(&result.expiry_date, now, threshold_days) => {
            CertificationState::Expiring
        }
        IngredientStatus::Certified => CertificationState::Certified,
        IngredientStatus::Expired | IngredientStatus::NotFound => CertificationState::Issue,
    }
}

/// Summary counters shown above the result table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultStats {
    pub total: usize,
    pub certified: usize,
    pub expiring: usize,
    pub issues: usize,
}

impl ResultStats {
    pub fn compute(results: &[IngredientResult], now: DateTime<Utc>, threshold_days: i64) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match certification_state(result, now, threshold_days) {
                CertificationState::Certified => stats.certified += 1,
                CertificationState::Expiring => {
                    stats.expiring += 1;
                    stats.issues += 1;
                }
                CertificationState::Issue => stats.issues += 1,
            }
        }
        stats
    }
}

/// Warning about certificates about to lapse, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryAlert {
    pub ingredients: Vec<String>,
    pub threshold_days: i64,
}

impl ExpiryAlert {
    pub fn find(results: &[IngredientResult], now: DateTime<Utc>, threshold_days: i64) -> Option<Self> {
        let ingredients: Vec<String> = results
            .iter()
            .filter(|r| is_expiring(&r.expiry_date, now, threshold_days))
            .map(|r| r.ingredient.clone())
            .collect();

        (!ingredients.is_empty()).then_some(Self {
            ingredients,
            threshold_days,
        })
    }

    pub fn message(&self) -> String {
        format!(
            "Warning: {} certificate(s) expiring within {} days: {}",
            self.ingredients.len(),
            self.threshold_days,
            self.ingredients.join(", ")
        )
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render results as CSV with every field quoted.
pub fn export_csv(results: &[IngredientResult]) -> Result<String> {
    if results.is_empty() {
        return Err(CheckerError::NothingToExport);
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(CSV_HEADER.iter().map(|h| quote(h)).collect::<Vec<_>>().join(","));
    for r in results {
        let status = r.status.to_string();
        let row = [
            r.ingredient.as_str(),
            status.as_str(),
            r.expiry_date.as_str(),
            r.supplier.as_str(),
            r.certificate_id.as_str(),
        ];
        lines.push(row.iter().map(|f| quote(f)).collect::<Vec<_>>().join(","));
    }
    Ok(lines.join("\n"))
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("halal_ingredients_{}.csv", now.format("%Y-%m-%d"))
}
