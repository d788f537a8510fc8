//! Header normalization across years.
//!
//! Column spelling drifts between yearly exports of the same category while
//! the column order stays put, so every year is renamed positionally to the
//! reference year's headers.

use std::collections::BTreeMap;

use anyhow::Result;
use log::debug;

use crate::{category::Category, error::PipelineError, table::Table};

pub fn normalize_headers(
    table: &Table,
    reference: &[String],
    category: Category,
    year: u16,
) -> Result<Table> {
    if table.column_count() != reference.len() {
        return Err(PipelineError::HeaderLengthMismatch {
            category,
            year,
            expected: reference.len(),
            found: table.column_count(),
        }
        .into());
    }
    let renamed = table
        .headers()
        .iter()
        .zip(reference)
        .filter(|(current, canonical)| current != canonical)
        .count();
    if renamed > 0 {
        debug!("{category} {year}: renamed {renamed} header(s) to reference spelling");
    }
    table.rename_headers(reference.to_vec())
}

/// Renames every year of one category to the headers of `reference_year`.
pub fn normalize_category(
    category: Category,
    tables: &BTreeMap<u16, Table>,
    reference_year: u16,
) -> Result<BTreeMap<u16, Table>> {
    let reference = tables
        .get(&reference_year)
        .ok_or_else(|| PipelineError::MissingSource {
            category,
            year: reference_year,
            directory: "primary source".to_string(),
        })?
        .headers()
        .to_vec();
    tables
        .iter()
        .map(|(year, table)| {
            normalize_headers(table, &reference, category, *year).map(|table| (*year, table))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> Table {
        Table::new(
            "t",
            headers.iter().map(|h| h.to_string()).collect(),
            vec![headers.iter().map(|_| "1".to_string()).collect()],
        )
        .expect("table")
    }

    #[test]
    fn older_years_take_reference_spelling() {
        let mut tables = BTreeMap::new();
        tables.insert(2017, table(&["CASENO", "rd_inv", "milepost"]));
        tables.insert(2014, table(&["caseno", "RD_INV", "MILEPOST"]));
        let normalized = normalize_category(Category::Acc, &tables, 2017).expect("normalized");
        assert_eq!(normalized[&2014].headers(), &["CASENO", "rd_inv", "milepost"]);
        assert_eq!(normalized[&2014].row_count(), 1);
    }

    #[test]
    fn column_count_drift_is_fatal() {
        let mut tables = BTreeMap::new();
        tables.insert(2017, table(&["CASENO", "rd_inv"]));
        tables.insert(2013, table(&["CASENO"]));
        let err = normalize_category(Category::Acc, &tables, 2017).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::HeaderLengthMismatch {
                category: Category::Acc,
                year: 2013,
                expected: 2,
                found: 1,
            })
        );
    }
}
