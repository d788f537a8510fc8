//! Builds the per-year meta dataset from reconciled tables.
//!
//! For one year: drop unused accident columns, attach the vehicle summary
//! (inner join on case number), then chain the interval joins in configured
//! order (road, curve, grade by default). Each stage consumes the previous
//! stage's one-row-per-case output.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    category::Category,
    config::MergeConfig,
    join::{self, JoinKeys, JoinStats},
    table::Table,
    vehicle,
};

/// Reconciled tables of one year.
pub trait YearTables {
    fn table(&self, category: Category) -> Result<&Table>;
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub category: Category,
    pub stats: JoinStats,
}

#[derive(Debug, Clone)]
pub struct YearMerge {
    pub year: u16,
    pub table: Table,
    pub crashes: usize,
    pub crashes_with_vehicles: usize,
    pub stages: Vec<StageReport>,
}

pub fn merge_year(year: u16, tables: &dyn YearTables, config: &MergeConfig) -> Result<YearMerge> {
    let crashes = tables
        .table(Category::Acc)?
        .drop_columns(&config.accident_drop);
    let vehicles = tables.table(Category::Veh)?;

    let summaries =
        vehicle::aggregate_vehicles(vehicles, &config.vehicle, &config.case_column, year)
            .with_context(|| format!("Aggregating vehicles for {year}"))?;
    debug!("{year}: {} vehicle summary row(s)", summaries.len());
    let summary = vehicle::summary_table(&summaries, &config.case_column, config.boolean_format)?;
    let mut records = join::inner_join_on_case(&crashes, &summary, &config.case_column, "veh")?;
    let crashes_with_vehicles = records.row_count();

    let keys = JoinKeys {
        case_column: &config.case_column,
        position_key: &config.position_key,
        measure_column: &config.measure_column,
    };
    let mut stages = Vec::with_capacity(config.stages.len());
    for stage in &config.stages {
        let segments = tables.table(stage.category)?;
        let outcome = join::interval_join(&records, segments, stage, keys, config.tie_break)
            .with_context(|| format!("Joining {} segments for {year}", stage.category))?;
        stages.push(StageReport {
            category: stage.category,
            stats: outcome.stats,
        });
        records = outcome.table;
    }

    if let Some(subset) = &config.subset {
        records = records
            .select(subset)
            .with_context(|| format!("Selecting output subset for {year}"))?;
    }
    if let Some(offset) = config.fill_offset_from_end {
        records = fill_trailing_column(&records, offset)?;
    }

    info!(
        "{year}: {} crash(es), {} with vehicles, {} meta row(s)",
        crashes.row_count(),
        crashes_with_vehicles,
        records.row_count()
    );
    Ok(YearMerge {
        year,
        table: records.with_label(format!("{year}.csv")),
        crashes: crashes.row_count(),
        crashes_with_vehicles,
        stages,
    })
}

/// Replaces null cells of the column `offset` positions from the end with
/// `"0"`. An offset of 1 is the last column.
pub fn fill_trailing_column(table: &Table, offset: usize) -> Result<Table> {
    if offset == 0 || offset > table.column_count() {
        return Err(anyhow!(
            "Cannot address column {offset} from the end of {} ({} column(s))",
            table.label(),
            table.column_count()
        ));
    }
    let column = table.column_count() - offset;
    let (headers, mut rows) = table.clone().into_parts();
    let mut filled = 0usize;
    for row in &mut rows {
        if row[column].trim().is_empty() {
            row[column] = "0".to_string();
            filled += 1;
        }
    }
    debug!("Filled {filled} null cell(s) in '{}'", headers[column]);
    Table::new(table.label(), headers, rows)
}
