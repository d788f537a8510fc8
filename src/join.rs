//! Case-number and interval joins used by the merge stage.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use log::{debug, info};

use crate::{
    config::JoinStage,
    error::PipelineError,
    interval::{IntervalIndex, TieBreak, normalize_key, parse_measure},
    table::Table,
};

/// Base-table columns an interval join is driven by.
#[derive(Debug, Clone, Copy)]
pub struct JoinKeys<'a> {
    pub case_column: &'a str,
    pub position_key: &'a str,
    pub measure_column: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub base_rows: usize,
    pub output_rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Rows whose measure fell inside more than one segment.
    pub ambiguous: usize,
    /// Base rows dropped because their case number was already emitted.
    pub duplicate_cases: usize,
    pub skipped_segments: usize,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub table: Table,
    pub stats: JoinStats,
}

/// Appends `right_headers` to `existing`, renaming collisions to
/// `<prefix>_<name>` (then `<prefix>_<name>_<n>`).
pub fn append_unique_headers(
    existing: &[String],
    right_headers: &[String],
    prefix: &str,
) -> Vec<String> {
    let mut headers = existing.to_vec();
    let mut seen: HashSet<String> = headers.iter().cloned().collect();
    for name in right_headers {
        let mut candidate = name.clone();
        if seen.contains(&candidate) {
            candidate = format!("{prefix}_{name}");
            let mut counter = 1usize;
            while seen.contains(&candidate) {
                candidate = format!("{prefix}_{name}_{counter}");
                counter += 1;
            }
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

/// Inner join of `left` with `right` on the case-number column. Each left row
/// picks up the non-key columns of the first right row with the same case.
pub fn inner_join_on_case(
    left: &Table,
    right: &Table,
    case_column: &str,
    prefix: &str,
) -> Result<Table> {
    let left_idx = left.require_column(case_column)?;
    let right_idx = right.require_column(case_column)?;

    let mut lookup: HashMap<String, usize> = HashMap::new();
    for (row, values) in right.rows().iter().enumerate() {
        lookup.entry(normalize_key(&values[right_idx])).or_insert(row);
    }

    let right_columns = (0..right.column_count())
        .filter(|idx| *idx != right_idx)
        .collect::<Vec<_>>();
    let right_headers = right_columns
        .iter()
        .map(|&idx| right.headers()[idx].clone())
        .collect::<Vec<_>>();
    let headers = append_unique_headers(left.headers(), &right_headers, prefix);

    let mut rows = Vec::with_capacity(left.row_count());
    for values in left.rows() {
        let Some(&matched) = lookup.get(&normalize_key(&values[left_idx])) else {
            continue;
        };
        let mut combined = values.clone();
        combined.extend(right_columns.iter().map(|&idx| right.rows()[matched][idx].clone()));
        rows.push(combined);
    }
    debug!(
        "Joined {} on '{case_column}': {} of {} row(s) kept",
        right.label(),
        rows.len(),
        left.row_count()
    );
    Table::new(left.label(), headers, rows)
}

/// Left-augments every base row with the attributes of the segment whose
/// inventory id equals the row's position key and whose range contains its
/// measure.
///
/// One row is emitted per case number. Rows without a containing segment are
/// kept when the stage says so, with the stage's fill defaults in place of
/// nulls. The segment's connecting columns never reach the output.
pub fn interval_join(
    base: &Table,
    segments: &Table,
    stage: &JoinStage,
    keys: JoinKeys<'_>,
    tie_break: TieBreak,
) -> Result<JoinOutcome> {
    let case_idx = base.require_column(keys.case_column)?;
    let key_idx = base.require_column(keys.position_key)?;
    let measure_idx = base.require_column(keys.measure_column)?;

    let segments = segments.drop_columns(&stage.drop);
    let index = IntervalIndex::build(
        &segments,
        &stage.inventory_column,
        &stage.begin_column,
        &stage.end_column,
    )?;

    let connecting = stage.connecting_columns();
    let attribute_columns = segments
        .headers()
        .iter()
        .enumerate()
        .filter(|(_, name)| !connecting.contains(&name.as_str()))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let attribute_headers = attribute_columns
        .iter()
        .map(|&idx| segments.headers()[idx].clone())
        .collect::<Vec<_>>();

    let mut fills: Vec<Option<&str>> = vec![None; attribute_columns.len()];
    for (column, value) in &stage.fill {
        let position = attribute_headers
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                table: segments.label().to_string(),
                column: column.clone(),
            })?;
        fills[position] = Some(value.as_str());
    }

    let prefix = stage.category.code();
    let headers = append_unique_headers(base.headers(), &attribute_headers, prefix);

    let mut stats = JoinStats {
        base_rows: base.row_count(),
        skipped_segments: index.skipped_rows(),
        ..JoinStats::default()
    };
    let mut emitted: HashSet<String> = HashSet::new();
    let mut rows = Vec::with_capacity(base.row_count());
    for values in base.rows() {
        let case = normalize_key(&values[case_idx]);
        if emitted.contains(&case) {
            stats.duplicate_cases += 1;
            continue;
        }

        let (chosen, candidates) = match parse_measure(&values[measure_idx]) {
            Some(measure) => index.resolve(&values[key_idx], measure, tie_break),
            None => (None, 0),
        };
        if candidates > 1 {
            stats.ambiguous += 1;
        }

        let attributes: Vec<String> = match chosen {
            Some(segment) => {
                stats.matched += 1;
                let source = &segments.rows()[segment.row];
                attribute_columns.iter().map(|&idx| source[idx].clone()).collect()
            }
            None if stage.keep_unmatched => {
                stats.unmatched += 1;
                vec![String::new(); attribute_columns.len()]
            }
            None => {
                stats.unmatched += 1;
                continue;
            }
        };

        let mut combined = values.clone();
        combined.extend(attributes.into_iter().zip(&fills).map(|(value, fill)| {
            match fill {
                Some(default) if value.trim().is_empty() => default.to_string(),
                _ => value,
            }
        }));
        emitted.insert(case);
        rows.push(combined);
    }
    stats.output_rows = rows.len();

    info!(
        "{prefix} join: {} matched, {} unmatched, {} ambiguous, {} duplicate case(s) dropped",
        stats.matched, stats.unmatched, stats.ambiguous, stats.duplicate_cases
    );
    Ok(JoinOutcome {
        table: Table::new(base.label(), headers, rows)?,
        stats,
    })
}
