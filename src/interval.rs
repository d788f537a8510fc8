//! Milepost interval lookup.
//!
//! Segments are grouped by inventory id and sorted by begin milepost, so a
//! lookup binary-searches the last segment starting at or before the measure
//! and only scans that prefix for ranges that still cover it. Both range
//! ends are inclusive.

use std::collections::HashMap;

use anyhow::Result;
use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::table::Table;

/// How one segment is chosen when several contain the same measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Smallest range width, then lowest begin, then source order.
    #[default]
    Narrowest,
    /// Earliest segment in source order.
    First,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Row of the segment in its source table.
    pub row: usize,
    pub begin: f64,
    pub end: f64,
}

impl Segment {
    pub fn width(&self) -> f64 {
        self.end - self.begin
    }

    pub fn contains(&self, measure: f64) -> bool {
        self.begin <= measure && measure <= self.end
    }
}

/// Canonical form of an inventory id or case number: trimmed, and integral
/// numbers written without a fractional part so `"1042"` and `"1042.0"` agree.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", value as i64)
        }
        _ => trimmed.to_string(),
    }
}

pub fn parse_measure(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    by_inventory: HashMap<String, Vec<Segment>>,
    skipped: usize,
}

impl IntervalIndex {
    pub fn build(
        table: &Table,
        inventory_column: &str,
        begin_column: &str,
        end_column: &str,
    ) -> Result<Self> {
        let inventory_idx = table.require_column(inventory_column)?;
        let begin_idx = table.require_column(begin_column)?;
        let end_idx = table.require_column(end_column)?;

        let mut index = IntervalIndex::default();
        for (row, values) in table.rows().iter().enumerate() {
            let inventory = values[inventory_idx].trim();
            let begin = parse_measure(&values[begin_idx]);
            let end = parse_measure(&values[end_idx]);
            match (begin, end) {
                (Some(begin), Some(end)) if !inventory.is_empty() && begin <= end => {
                    index.insert(normalize_key(inventory), Segment { row, begin, end });
                }
                _ => {
                    index.skipped += 1;
                    warn!(
                        "Skipping segment row {} of {}: inventory '{}', range [{}, {}]",
                        row + 2,
                        table.label(),
                        inventory,
                        values[begin_idx],
                        values[end_idx]
                    );
                }
            }
        }
        index.finish();
        Ok(index)
    }

    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = (String, Segment)>,
    {
        let mut index = IntervalIndex::default();
        for (inventory, segment) in segments {
            index.insert(normalize_key(&inventory), segment);
        }
        index.finish();
        index
    }

    fn insert(&mut self, inventory: String, segment: Segment) {
        self.by_inventory.entry(inventory).or_default().push(segment);
    }

    fn finish(&mut self) {
        for segments in self.by_inventory.values_mut() {
            segments.sort_by(|a, b| a.begin.total_cmp(&b.begin).then(a.row.cmp(&b.row)));
        }
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    pub fn segment_count(&self) -> usize {
        self.by_inventory.values().map(Vec::len).sum()
    }

    /// Every segment of `inventory` whose range contains `measure`, ordered by
    /// begin milepost.
    pub fn matches(&self, inventory: &str, measure: f64) -> Vec<&Segment> {
        let Some(segments) = self.by_inventory.get(&normalize_key(inventory)) else {
            return Vec::new();
        };
        let upper = segments.partition_point(|segment| segment.begin <= measure);
        segments[..upper]
            .iter()
            .filter(|segment| segment.contains(measure))
            .collect()
    }

    /// The single segment chosen for `measure`, plus how many contained it.
    pub fn resolve(
        &self,
        inventory: &str,
        measure: f64,
        tie_break: TieBreak,
    ) -> (Option<Segment>, usize) {
        let candidates = self.matches(inventory, measure);
        let count = candidates.len();
        let chosen = match tie_break {
            TieBreak::Narrowest => candidates.into_iter().min_by(|a, b| {
                a.width()
                    .total_cmp(&b.width())
                    .then(a.begin.total_cmp(&b.begin))
                    .then(a.row.cmp(&b.row))
            }),
            TieBreak::First => candidates.into_iter().min_by_key(|segment| segment.row),
        };
        (chosen.copied(), count)
    }
}

/// Reference lookup without the index: a full scan over every segment.
pub fn scan_matches<'a>(
    segments: &'a [(String, Segment)],
    inventory: &str,
    measure: f64,
) -> Vec<&'a Segment> {
    let key = normalize_key(inventory);
    segments
        .iter()
        .filter(|(id, segment)| normalize_key(id) == key && segment.contains(measure))
        .map(|(_, segment)| segment)
        .collect()
}
