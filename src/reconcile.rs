//! Column reconciliation.
//!
//! Brings every (year, category) table onto the canonical attribute list
//! from the request specification:
//!
//! 1. attribute names are matched with [`names_match`] (same length, equal
//!    ignoring case; nothing fuzzier),
//! 2. attributes the reference year lacks are pulled from the secondary
//!    source for every year and appended **by row position**,
//! 3. the merged table is projected onto the canonical order.
//!
//! Step 2 has no join key: both sources must list the same rows in the same
//! order for a given year. Only the row count can be checked, and a mismatch
//! is fatal.

use std::collections::BTreeMap;

use anyhow::Result;
use itertools::Itertools;
use log::{debug, info};

use crate::{category::Category, error::PipelineError, sources::TableSource, table::Table};

pub fn names_match(first: &str, second: &str) -> bool {
    first.chars().count() == second.chars().count()
        && first
            .chars()
            .zip(second.chars())
            .all(|(a, b)| a == b || a.to_lowercase().eq(b.to_lowercase()))
}

pub fn find_match(name: &str, candidates: &[String]) -> bool {
    candidates.iter().any(|candidate| names_match(name, candidate))
}

/// First candidate, in column order, matching `name`.
pub fn resolve_name<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|candidate| names_match(name, candidate))
        .map(String::as_str)
}

/// Canonical attributes with no match among `headers`, in canonical order.
pub fn missing_attributes(canonical: &[String], headers: &[String]) -> Vec<String> {
    canonical
        .iter()
        .filter(|name| !find_match(name, headers))
        .cloned()
        .collect()
}

/// Appends the `missing` attributes of `secondary` to `primary`, pairing rows
/// by position.
pub fn merge_missing(
    primary: &Table,
    secondary: &Table,
    missing: &[String],
    category: Category,
    year: u16,
) -> Result<Table> {
    let resolved = missing
        .iter()
        .map(|attribute| {
            resolve_name(attribute, secondary.headers())
                .map(str::to_string)
                .ok_or_else(|| PipelineError::MissingAttribute {
                    category,
                    year,
                    attribute: attribute.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "{category} {year}: copying [{}] from {}",
        resolved.iter().join(", "),
        secondary.label()
    );

    let selected = secondary.select(&resolved)?;
    if selected.column_count() != missing.len() {
        return Err(PipelineError::ColumnCountMismatch {
            category,
            year,
            expected: missing.len(),
            found: selected.column_count(),
        }
        .into());
    }
    if primary.row_count() != selected.row_count() {
        return Err(PipelineError::RowCountMismatch {
            category,
            year,
            primary: primary.row_count(),
            secondary: selected.row_count(),
        }
        .into());
    }

    let merged = primary.append_by_position(&selected)?;
    let expected = primary.column_count() + missing.len();
    if merged.column_count() != expected {
        return Err(PipelineError::ColumnCountMismatch {
            category,
            year,
            expected,
            found: merged.column_count(),
        }
        .into());
    }
    if merged.row_count() != primary.row_count() {
        return Err(PipelineError::RowCountMismatch {
            category,
            year,
            primary: primary.row_count(),
            secondary: merged.row_count(),
        }
        .into());
    }
    Ok(merged)
}

/// Reorders `table` onto `canonical`, renaming each column to its canonical
/// spelling. With `keep_extra`, unmatched source columns follow in source order.
pub fn project_canonical(
    table: &Table,
    canonical: &[String],
    keep_extra: bool,
    category: Category,
    year: u16,
) -> Result<Table> {
    if canonical.is_empty() {
        return Ok(table.clone());
    }
    let headers = table.headers();
    let mut indices = Vec::with_capacity(canonical.len());
    for attribute in canonical {
        let source = resolve_name(attribute, headers).ok_or_else(|| {
            PipelineError::MissingAttribute {
                category,
                year,
                attribute: attribute.clone(),
            }
        })?;
        let idx = table.require_column(source)?;
        indices.push(idx);
    }
    let mut output_headers = canonical.to_vec();
    if keep_extra {
        for (idx, header) in headers.iter().enumerate() {
            if !indices.contains(&idx) {
                indices.push(idx);
                output_headers.push(header.clone());
            }
        }
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Table::new(table.label(), output_headers, rows)
}

#[derive(Debug, Clone)]
pub struct CategoryReconciliation {
    pub category: Category,
    /// Attributes the reference year lacked and that were copied from the
    /// secondary source.
    pub missing: Vec<String>,
    pub tables: BTreeMap<u16, Table>,
}

/// Reconciles every year of one category.
///
/// `primary` holds the header-normalized tables keyed by year. The reference
/// year is processed first so its merged header can be imposed on the other
/// years, which follow in descending order.
pub fn reconcile_category(
    category: Category,
    canonical: &[String],
    primary: &BTreeMap<u16, Table>,
    secondary: &dyn TableSource,
    reference_year: u16,
    keep_extra: bool,
) -> Result<CategoryReconciliation> {
    let reference = primary
        .get(&reference_year)
        .ok_or_else(|| PipelineError::MissingSource {
            category,
            year: reference_year,
            directory: "primary source".to_string(),
        })?;
    let missing = missing_attributes(canonical, reference.headers());
    if missing.is_empty() {
        debug!("{category}: reference year {reference_year} covers every requested attribute");
    } else {
        info!(
            "{category}: {} attribute(s) missing from {reference_year}: {}",
            missing.len(),
            missing.iter().join(", ")
        );
    }

    let order = std::iter::once(reference_year)
        .chain(primary.keys().rev().copied().filter(|year| *year != reference_year))
        .collect::<Vec<_>>();

    let mut header: Option<Vec<String>> = None;
    let mut tables = BTreeMap::new();
    for year in order {
        let Some(table) = primary.get(&year) else {
            continue;
        };
        let merged = if missing.is_empty() {
            table.clone()
        } else {
            let backup = secondary.load(year, category)?;
            let merged = merge_missing(table, &backup, &missing, category, year)?;
            match &header {
                None => {
                    header = Some(merged.headers().to_vec());
                    merged
                }
                Some(names) => {
                    if names.len() != merged.column_count() {
                        return Err(PipelineError::ColumnCountMismatch {
                            category,
                            year,
                            expected: names.len(),
                            found: merged.column_count(),
                        }
                        .into());
                    }
                    merged.rename_headers(names.clone())?
                }
            }
        };
        let projected = project_canonical(&merged, canonical, keep_extra, category, year)?;
        tables.insert(year, projected);
    }

    Ok(CategoryReconciliation {
        category,
        missing,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(label: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            label,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
        .expect("table")
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn match_ignores_case_but_not_length() {
        assert!(names_match("AcCtYpE", "acctype"));
        assert!(names_match("rd_inv", "RD_INV"));
        assert!(!names_match("ACC", "ACCX"));
        assert!(!names_match("ACCTYPE", "ACCTYPX"));
    }

    #[test]
    fn resolve_takes_first_match_in_column_order() {
        let candidates = names(&["roadinv", "ROADINV"]);
        assert_eq!(resolve_name("ROADINV", &candidates), Some("roadinv"));
        assert_eq!(resolve_name("RoadInv", &candidates), Some("roadinv"));
        assert_eq!(resolve_name("ROAD_INV", &candidates), None);
    }

    #[test]
    fn missing_attributes_keep_canonical_order() {
        let canonical = names(&["CASENO", "AADT", "weather", "LIGHT"]);
        let headers = names(&["caseno", "light"]);
        assert_eq!(missing_attributes(&canonical, &headers), names(&["AADT", "weather"]));
    }

    #[test]
    fn merge_missing_rejects_row_count_mismatch() {
        let primary = table("wa17acc.csv", &["CASENO"], &[&["1"], &["2"]]);
        let secondary = table("wa17acc.csv", &["CASENO", "Weather"], &[&["1", "clear"]]);
        let err = merge_missing(&primary, &secondary, &names(&["weather"]), Category::Acc, 2017)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::RowCountMismatch {
                category: Category::Acc,
                year: 2017,
                primary: 2,
                secondary: 1,
            })
        );
    }

    #[test]
    fn merge_missing_names_unresolved_attribute() {
        let primary = table("wa15acc.csv", &["CASENO"], &[&["1"]]);
        let secondary = table("wa15acc.csv", &["CASENO"], &[&["1"]]);
        let err = merge_missing(&primary, &secondary, &names(&["weather"]), Category::Acc, 2015)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute 'weather' for acc 2015 has no match in the primary or secondary source"
        );
    }

    #[test]
    fn project_canonical_renames_and_orders() {
        let merged = table(
            "wa16road.csv",
            &["begmp", "road_inv", "AADT", "DOMAIN"],
            &[&["0.0", "A1", "900", "x"]],
        );
        let canonical = names(&["ROAD_INV", "BEGMP", "AADT"]);
        let strict = project_canonical(&merged, &canonical, false, Category::Road, 2016)
            .expect("projected");
        assert_eq!(strict.headers(), canonical.as_slice());
        assert_eq!(strict.rows()[0], names(&["A1", "0.0", "900"]));

        let wide = project_canonical(&merged, &canonical, true, Category::Road, 2016)
            .expect("projected");
        assert_eq!(wide.headers(), names(&["ROAD_INV", "BEGMP", "AADT", "DOMAIN"]).as_slice());
    }
}
