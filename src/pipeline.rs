//! Stage orchestration.
//!
//! [`PipelineContext`] holds every table of the run keyed by year and
//! category; stages hand it to one another instead of sharing module state.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{
    attributes::AttributeSchema,
    category::Category,
    config::PipelineConfig,
    error::PipelineError,
    merge::{self, YearMerge, YearTables},
    normalize,
    reconcile::{self, CategoryReconciliation},
    sources::{DirectorySource, SourceDir, TableSource, source_file_name},
    table::Table,
};

const OUTPUT_DELIMITER: u8 = b',';
const OUTPUT_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    tables: BTreeMap<u16, BTreeMap<Category, Table>>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every (year, category) pair from `source`.
    pub fn load(source: &dyn TableSource, years: &[u16], categories: &[Category]) -> Result<Self> {
        let mut context = Self::new();
        for &year in years {
            for &category in categories {
                context.insert(year, category, source.load(year, category)?);
            }
        }
        Ok(context)
    }

    pub fn insert(&mut self, year: u16, category: Category, table: Table) {
        self.tables.entry(year).or_default().insert(category, table);
    }

    pub fn get(&self, year: u16, category: Category) -> Option<&Table> {
        self.tables.get(&year).and_then(|tables| tables.get(&category))
    }

    pub fn category(&self, category: Category) -> BTreeMap<u16, Table> {
        self.tables
            .iter()
            .filter_map(|(year, tables)| tables.get(&category).map(|t| (*year, t.clone())))
            .collect()
    }

    pub fn year(&self, year: u16) -> YearView<'_> {
        YearView {
            year,
            context: self,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, Category, &Table)> + '_ {
        self.tables.iter().flat_map(|(year, tables)| {
            tables
                .iter()
                .map(move |(category, table)| (*year, *category, table))
        })
    }

    pub fn table_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Writes one `<prefix><yy><category>.csv` per table under `dir`.
    pub fn write_all(&self, dir: &Path, prefix: &str) -> Result<()> {
        for (year, category, table) in self.iter() {
            let path = dir.join(source_file_name(prefix, year, category, OUTPUT_EXTENSION));
            table
                .write(&path, OUTPUT_DELIMITER)
                .with_context(|| format!("Writing {category} {year}"))?;
            info!(
                "Wrote {} row(s) x {} column(s) to {:?}",
                table.row_count(),
                table.column_count(),
                path
            );
        }
        Ok(())
    }
}

pub struct YearView<'a> {
    year: u16,
    context: &'a PipelineContext,
}

impl YearTables for YearView<'_> {
    fn table(&self, category: Category) -> Result<&Table> {
        self.context.get(self.year, category).ok_or_else(|| {
            PipelineError::MissingSource {
                category,
                year: self.year,
                directory: "pipeline context".to_string(),
            }
            .into()
        })
    }
}

fn directory_source(config: &PipelineConfig, root: &Path) -> Result<DirectorySource> {
    let dir = SourceDir::new(root, &config.state_prefix, &config.input.extension)?;
    Ok(DirectorySource::new(
        dir,
        config.input.delimiter.map(|c| c as u8),
        config.input_encoding()?,
    ))
}

fn output_source(config: &PipelineConfig, root: &Path) -> Result<DirectorySource> {
    let dir = SourceDir::new(root, &config.state_prefix, OUTPUT_EXTENSION)?;
    Ok(DirectorySource::new(dir, Some(OUTPUT_DELIMITER), encoding_rs::UTF_8))
}

/// Loads the raw exports of `categories` and renames every year's headers to
/// the reference year's spelling.
pub fn normalize_sources(
    source: &dyn TableSource,
    config: &PipelineConfig,
    categories: &[Category],
) -> Result<PipelineContext> {
    let years = config.years_descending();
    let mut context = PipelineContext::new();
    for &category in categories {
        let mut raw = BTreeMap::new();
        for &year in &years {
            raw.insert(year, source.load(year, category)?);
        }
        let normalized = normalize::normalize_category(category, &raw, config.reference_year)?;
        for (year, table) in normalized {
            context.insert(year, category, table);
        }
    }
    Ok(context)
}

#[derive(Debug, Clone)]
pub struct ReconcileRun {
    pub context: PipelineContext,
    pub categories: Vec<CategoryReconciliation>,
}

/// Reconciles every configured category of `normalized` against `schema`,
/// consulting `secondary` for attributes the reference year lacks.
pub fn reconcile_context(
    normalized: &PipelineContext,
    schema: &AttributeSchema,
    secondary: &dyn TableSource,
    config: &PipelineConfig,
) -> Result<ReconcileRun> {
    let mut context = PipelineContext::new();
    let mut categories = Vec::new();
    for &category in &config.reconcile.categories {
        let primary = normalized.category(category);
        let outcome = reconcile::reconcile_category(
            category,
            schema.attributes(category),
            &primary,
            secondary,
            config.reference_year,
            config.reconcile.keep_extra_columns,
        )?;
        for (year, table) in &outcome.tables {
            context.insert(*year, category, table.clone());
        }
        categories.push(outcome);
    }
    Ok(ReconcileRun {
        context,
        categories,
    })
}

/// Merges every configured year of `context` in ascending order.
pub fn merge_context(context: &PipelineContext, config: &PipelineConfig) -> Result<Vec<YearMerge>> {
    config
        .years_ascending()
        .into_iter()
        .map(|year| {
            merge::merge_year(year, &context.year(year), &config.merge)
                .with_context(|| format!("Merging {year}"))
        })
        .collect()
}

pub fn write_merged(merges: &[YearMerge], dir: &Path) -> Result<()> {
    for merged in merges {
        let path = dir.join(format!("{}.{OUTPUT_EXTENSION}", merged.year));
        merged.table.write(&path, OUTPUT_DELIMITER)?;
        info!(
            "Finished {}: {} row(s) written to {:?}",
            merged.year,
            merged.table.row_count(),
            path
        );
    }
    Ok(())
}

/// Categories the merge stage reads: accidents, vehicles, and every join stage.
pub fn merge_categories(config: &PipelineConfig) -> Vec<Category> {
    let mut categories = vec![Category::Acc, Category::Veh];
    for stage in &config.merge.stages {
        if !categories.contains(&stage.category) {
            categories.push(stage.category);
        }
    }
    categories
}

pub fn run_normalize(config: &PipelineConfig) -> Result<PipelineContext> {
    let source = directory_source(config, &config.paths.raw_dir)?;
    let context = normalize_sources(&source, config, &config.reconcile.categories)?;
    context.write_all(&config.paths.normalized_dir, &config.state_prefix)?;
    Ok(context)
}

pub fn run_reconcile(config: &PipelineConfig) -> Result<ReconcileRun> {
    let schema = AttributeSchema::load(&config.paths.request, config.input_encoding()?)
        .with_context(|| format!("Loading request {:?}", config.paths.request))?;
    let primary = directory_source(config, &config.paths.raw_dir)?;
    let secondary = directory_source(config, &config.paths.reference_dir)?;
    let normalized = normalize_sources(&primary, config, &config.reconcile.categories)?;
    let run = reconcile_context(&normalized, &schema, &secondary, config)?;
    run.context
        .write_all(&config.paths.reconciled_dir, &config.state_prefix)?;
    info!(
        "Reconciled {} table(s) into {:?}",
        run.context.table_count(),
        config.paths.reconciled_dir
    );
    Ok(run)
}

pub fn run_merge(config: &PipelineConfig) -> Result<Vec<YearMerge>> {
    let source = output_source(config, &config.paths.reconciled_dir)?;
    let context =
        PipelineContext::load(&source, &config.years_ascending(), &merge_categories(config))?;
    let merges = merge_context(&context, config)?;
    write_merged(&merges, &config.paths.merged_dir)?;
    Ok(merges)
}

pub fn run_all(config: &PipelineConfig) -> Result<(ReconcileRun, Vec<YearMerge>)> {
    let run = run_reconcile(config)?;
    let merges = merge_context(&run.context, config)?;
    write_merged(&merges, &config.paths.merged_dir)?;
    Ok((run, merges))
}
