pub mod attributes;
pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod interval;
pub mod io_utils;
pub mod join;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod sources;
pub mod table;
pub mod vehicle;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, ConfigArgs, MergeOptions, SourceArgs},
    config::PipelineConfig,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("hsis_prep", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Reconcile(args) => handle_reconcile(&args),
        Commands::Merge(args) => handle_merge(&args),
        Commands::Run(args) => handle_run(&args),
    }
}

fn load_config(args: &ConfigArgs) -> Result<PipelineConfig> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())
        .with_context(|| format!("Loading configuration {:?}", args.config))?;
    debug!(
        "Years {:?}, reference year {}, prefix '{}'",
        config.years, config.reference_year, config.state_prefix
    );
    Ok(config)
}

fn apply_merge_options(config: &mut PipelineConfig, options: &MergeOptions) {
    if let Some(tie_break) = options.tie_break {
        config.merge.tie_break = tie_break;
    }
    if let Some(format) = options.boolean_format {
        config.merge.boolean_format = format;
    }
}

fn apply_source_args(config: &mut PipelineConfig, sources: &SourceArgs) {
    if let Some(dir) = &sources.raw_dir {
        config.paths.raw_dir = dir.clone();
    }
    if let Some(dir) = &sources.reference_dir {
        config.paths.reference_dir = dir.clone();
    }
    if let Some(path) = &sources.request {
        config.paths.request = path.clone();
    }
}

fn handle_normalize(args: &cli::NormalizeArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(dir) = &args.raw_dir {
        config.paths.raw_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.paths.normalized_dir = dir.clone();
    }
    info!(
        "Normalizing headers in {:?} to {} spelling",
        config.paths.raw_dir, config.reference_year
    );
    let context = pipeline::run_normalize(&config)?;
    if args.common.summary {
        let (headers, rows) = report::reconcile_rows(&context, &[]);
        report::print_table(&headers, &rows);
    }
    Ok(())
}

fn handle_reconcile(args: &cli::ReconcileArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    apply_source_args(&mut config, &args.sources);
    if let Some(dir) = &args.output_dir {
        config.paths.reconciled_dir = dir.clone();
    }
    if args.keep_extra_columns {
        config.reconcile.keep_extra_columns = true;
    }
    info!(
        "Reconciling {:?} against {:?} (secondary {:?})",
        config.paths.raw_dir, config.paths.request, config.paths.reference_dir
    );
    let run = pipeline::run_reconcile(&config)?;
    if args.common.summary {
        let (headers, rows) = report::reconcile_rows(&run.context, &run.categories);
        report::print_table(&headers, &rows);
    }
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(dir) = &args.input_dir {
        config.paths.reconciled_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.paths.merged_dir = dir.clone();
    }
    apply_merge_options(&mut config, &args.options);
    info!(
        "Merging {:?} into {:?} ({:?} tie-break)",
        config.paths.reconciled_dir, config.paths.merged_dir, config.merge.tie_break
    );
    let merges = pipeline::run_merge(&config)?;
    if args.common.summary {
        let (headers, rows) = report::merge_rows(&merges);
        report::print_table(&headers, &rows);
    }
    Ok(())
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    apply_source_args(&mut config, &args.sources);
    if let Some(dir) = &args.reconciled_dir {
        config.paths.reconciled_dir = dir.clone();
    }
    if let Some(dir) = &args.merged_dir {
        config.paths.merged_dir = dir.clone();
    }
    apply_merge_options(&mut config, &args.options);
    let (run, merges) = pipeline::run_all(&config)?;
    info!(
        "Pipeline complete: {} reconciled table(s), {} meta table(s)",
        run.context.table_count(),
        merges.len()
    );
    if args.common.summary {
        let (headers, rows) = report::reconcile_rows(&run.context, &run.categories);
        report::print_table(&headers, &rows);
        let (headers, rows) = report::merge_rows(&merges);
        report::print_table(&headers, &rows);
    }
    Ok(())
}
