use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::interval::TieBreak;

#[derive(Debug, Parser)]
#[command(author, version, about = "Prepare per-year HSIS accident meta datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rename every year's headers to the reference year's spelling
    Normalize(NormalizeArgs),
    /// Fill missing attributes from the reference source and write canonical tables
    Reconcile(ReconcileArgs),
    /// Join reconciled tables into one meta dataset per year
    Merge(MergeArgs),
    /// Run reconcile and merge back to back
    Run(RunArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct ConfigArgs {
    /// Pipeline configuration YAML (defaults reproduce the WA 2013-2017 run)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Print a per-table summary after the stage completes
    #[arg(long = "summary")]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    /// Directory holding the raw exports
    #[arg(long = "raw-dir")]
    pub raw_dir: Option<PathBuf>,
    /// Directory to write normalized tables to
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

/// Inputs of the reconcile stage.
#[derive(Debug, Args, Clone, Default)]
pub struct SourceArgs {
    /// Directory holding the raw exports
    #[arg(long = "raw-dir")]
    pub raw_dir: Option<PathBuf>,
    /// Secondary source consulted for missing attributes
    #[arg(long = "reference-dir")]
    pub reference_dir: Option<PathBuf>,
    /// Request specification listing canonical attributes per category
    #[arg(short = 'r', long = "request")]
    pub request: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Directory to write reconciled tables to
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Keep non-canonical source columns after the canonical block
    #[arg(long = "keep-extra-columns")]
    pub keep_extra_columns: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    /// Directory holding reconciled tables
    #[arg(short = 'i', long = "input-dir")]
    pub input_dir: Option<PathBuf>,
    /// Directory to write one meta table per year to
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    #[command(flatten)]
    pub options: MergeOptions,
}

#[derive(Debug, Args, Clone, Default)]
pub struct MergeOptions {
    /// Policy for choosing among several containing segments
    #[arg(long = "tie-break", value_enum)]
    pub tie_break: Option<TieBreak>,
    /// Rendering of the vehicle indicator columns
    #[arg(long = "boolean-format", value_enum)]
    pub boolean_format: Option<BooleanFormat>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Directory to write reconciled tables to
    #[arg(long = "reconciled-dir")]
    pub reconciled_dir: Option<PathBuf>,
    /// Directory to write one meta table per year to
    #[arg(long = "merged-dir")]
    pub merged_dir: Option<PathBuf>,
    #[command(flatten)]
    pub options: MergeOptions,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BooleanFormat {
    /// `True` / `False`
    #[default]
    TitleCase,
    /// `true` / `false`
    Lowercase,
    /// `1` / `0`
    OneZero,
}

impl BooleanFormat {
    pub fn render(&self, value: bool) -> &'static str {
        match (self, value) {
            (BooleanFormat::TitleCase, true) => "True",
            (BooleanFormat::TitleCase, false) => "False",
            (BooleanFormat::Lowercase, true) => "true",
            (BooleanFormat::Lowercase, false) => "false",
            (BooleanFormat::OneZero, true) => "1",
            (BooleanFormat::OneZero, false) => "0",
        }
    }
}
