//! In-memory year-keyed table.
//!
//! A [`Table`] is the header row plus every data row of one source file, kept
//! as decoded strings. Empty cells are nulls. Stages never mutate a table they
//! were handed; each transformation returns a new one.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::debug;

use crate::{error::PipelineError, io_utils};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    label: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(
        label: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self> {
        let label = label.into();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(anyhow!(
                    "Row {} of {label} has {} field(s) but the header has {}",
                    idx + 1,
                    row.len(),
                    headers.len()
                ));
            }
        }
        Ok(Self {
            label,
            headers,
            rows,
        })
    }

    pub fn read(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)
            .with_context(|| format!("Reading headers of {path:?}"))?;
        let mut rows = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record =
                record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {} in {path:?}", row_idx + 2))?;
            rows.push(decoded);
        }
        debug!("Read {} row(s) x {} column(s) from {path:?}", rows.len(), headers.len());
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            label,
            headers,
            rows,
        })
    }

    pub fn write(&self, path: &Path, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer
            .write_record(&self.headers)
            .with_context(|| format!("Writing headers to {path:?}"))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .with_context(|| format!("Writing row to {path:?}"))?;
        }
        writer
            .flush()
            .with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.headers, self.rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, PipelineError> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                table: self.label.clone(),
                column: name.to_string(),
            })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(String::as_str)
    }

    /// Projects the table onto `columns`, in that order. Every name must exist.
    pub fn select(&self, columns: &[String]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Ok(Table {
            label: self.label.clone(),
            headers: columns.to_vec(),
            rows,
        })
    }

    /// Removes the named columns. Names absent from the table are skipped.
    pub fn drop_columns(&self, columns: &[String]) -> Table {
        let mut keep = Vec::with_capacity(self.headers.len());
        for (idx, header) in self.headers.iter().enumerate() {
            if !columns.iter().any(|name| name == header) {
                keep.push(idx);
            }
        }
        for name in columns {
            if self.column_index(name).is_none() {
                debug!("Drop column '{name}' not present in {}", self.label);
            }
        }
        let headers = keep.iter().map(|&idx| self.headers[idx].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Table {
            label: self.label.clone(),
            headers,
            rows,
        }
    }

    pub fn rename_headers(&self, headers: Vec<String>) -> Result<Table> {
        if headers.len() != self.headers.len() {
            return Err(anyhow!(
                "Cannot rename {} column(s) of {} with {} name(s)",
                self.headers.len(),
                self.label,
                headers.len()
            ));
        }
        Ok(Table {
            label: self.label.clone(),
            headers,
            rows: self.rows.clone(),
        })
    }

    /// Appends the columns of `other` row by row, pairing rows by position.
    pub fn append_by_position(&self, other: &Table) -> Result<Table> {
        if self.rows.len() != other.rows.len() {
            return Err(anyhow!(
                "Cannot align {} ({} row(s)) with {} ({} row(s)) by position",
                self.label,
                self.rows.len(),
                other.label,
                other.rows.len()
            ));
        }
        let mut headers = self.headers.clone();
        headers.extend(other.headers.iter().cloned());
        let rows = self
            .rows
            .iter()
            .zip(other.rows.iter())
            .map(|(left, right)| {
                let mut combined = left.clone();
                combined.extend(right.iter().cloned());
                combined
            })
            .collect();
        Ok(Table {
            label: self.label.clone(),
            headers,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            "sample",
            vec!["CASENO".into(), "milepost".into(), "CITY".into()],
            vec![
                vec!["1".into(), "0.5".into(), "Seattle".into()],
                vec!["2".into(), "1.5".into(), String::new()],
            ],
        )
        .expect("table")
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Table::new("bad", vec!["a".into(), "b".into()], vec![vec!["1".into()]])
            .unwrap_err();
        assert!(err.to_string().contains("Row 1 of bad"));
    }

    #[test]
    fn drop_columns_skips_absent_names() {
        let dropped = sample().drop_columns(&["CITY".into(), "GPS_LATX".into()]);
        assert_eq!(dropped.headers(), &["CASENO", "milepost"]);
        assert_eq!(dropped.rows()[1], vec!["2", "1.5"]);
    }

    #[test]
    fn select_reports_missing_column() {
        let err = sample().select(&["AADT".into()]).unwrap_err();
        let typed = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(typed, PipelineError::MissingColumn { column, .. } if column == "AADT"));
    }

    #[test]
    fn append_by_position_pairs_rows() {
        let extra = Table::new(
            "extra",
            vec!["AADT".into()],
            vec![vec!["900".into()], vec!["1200".into()]],
        )
        .expect("extra");
        let combined = sample().append_by_position(&extra).expect("combined");
        assert_eq!(combined.column_count(), 4);
        assert_eq!(combined.row_count(), 2);
        assert_eq!(combined.cell(1, 3), Some("1200"));
    }
}
