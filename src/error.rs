//! Fatal data-quality errors raised by the reconcile and merge stages.
//!
//! Everything else in the crate flows through `anyhow`; these variants exist
//! so callers (and tests) can tell an invariant violation in the source data
//! apart from an ordinary I/O or parse failure via `downcast_ref`.

use thiserror::Error;

use crate::category::Category;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Attribute '{attribute}' for {category} {year} has no match in the primary or secondary source")]
    MissingAttribute {
        category: Category,
        year: u16,
        attribute: String,
    },

    #[error("Row count mismatch for {category} {year}: primary has {primary} row(s), secondary has {secondary}")]
    RowCountMismatch {
        category: Category,
        year: u16,
        primary: usize,
        secondary: usize,
    },

    #[error("Column count mismatch for {category} {year}: expected {expected} column(s), found {found}")]
    ColumnCountMismatch {
        category: Category,
        year: u16,
        expected: usize,
        found: usize,
    },

    #[error("Header length mismatch for {category} {year}: reference year has {expected} column(s), file has {found}")]
    HeaderLengthMismatch {
        category: Category,
        year: u16,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("No {category} source for {year} under {directory}")]
    MissingSource {
        category: Category,
        year: u16,
        directory: String,
    },
}
