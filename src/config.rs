//! Pipeline configuration.
//!
//! Every field defaults to the constants of the Washington 2013-2017 HSIS
//! snapshot, so an empty YAML document (or no `--config` at all) reproduces
//! the reference run. A config file only needs the keys it overrides.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{category::Category, cli::BooleanFormat, interval::TieBreak, io_utils};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// File name prefix ahead of the 2-digit year, e.g. `wa` in `wa17acc.csv`.
    pub state_prefix: String,
    pub years: Vec<u16>,
    /// Most recent year; its headers are the canonical spelling for all others.
    pub reference_year: u16,
    pub paths: PathsConfig,
    pub input: InputConfig,
    pub reconcile: ReconcileConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    /// Secondary source consulted for attributes missing from `raw_dir`.
    pub reference_dir: PathBuf,
    pub normalized_dir: PathBuf,
    pub reconciled_dir: PathBuf,
    pub merged_dir: PathBuf,
    /// Request specification listing the canonical attributes per category.
    pub request: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub extension: String,
    pub delimiter: Option<char>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub categories: Vec<Category>,
    /// Keep non-canonical source columns after the canonical block.
    pub keep_extra_columns: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub case_column: String,
    pub position_key: String,
    pub measure_column: String,
    pub accident_drop: Vec<String>,
    pub vehicle: VehicleFields,
    pub stages: Vec<JoinStage>,
    pub tie_break: TieBreak,
    pub boolean_format: BooleanFormat,
    /// Optional projection applied before the trailing-column fill.
    pub subset: Option<Vec<String>>,
    /// Column counted from the end whose nulls become `"0"`; `None` disables.
    pub fill_offset_from_end: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleFields {
    pub sex: String,
    pub age: String,
    pub vehicle_type: String,
    pub model_year: String,
    pub intoxication: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinStage {
    pub category: Category,
    pub inventory_column: String,
    pub begin_column: String,
    pub end_column: String,
    #[serde(default)]
    pub drop: Vec<String>,
    /// Values written into null segment attributes after the join.
    #[serde(default)]
    pub fill: BTreeMap<String, String>,
    #[serde(default = "JoinStage::default_keep_unmatched")]
    pub keep_unmatched: bool,
}

impl JoinStage {
    const fn default_keep_unmatched() -> bool {
        true
    }

    fn new(category: Category, inventory: &str, begin: &str, end: &str) -> Self {
        Self {
            category,
            inventory_column: inventory.to_string(),
            begin_column: begin.to_string(),
            end_column: end.to_string(),
            drop: Vec::new(),
            fill: BTreeMap::new(),
            keep_unmatched: true,
        }
    }

    /// Columns used only to connect the segment table to the base rows.
    pub fn connecting_columns(&self) -> [&str; 3] {
        [
            self.inventory_column.as_str(),
            self.begin_column.as_str(),
            self.end_column.as_str(),
        ]
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_prefix: "wa".to_string(),
            years: (2013..=2017).collect(),
            reference_year: 2017,
            paths: PathsConfig::default(),
            input: InputConfig::default(),
            reconcile: ReconcileConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/hsis-raw"),
            reference_dir: PathBuf::from("data/hsis-reference"),
            normalized_dir: PathBuf::from("data/hsis-normalized"),
            reconciled_dir: PathBuf::from("data/hsis-csv"),
            merged_dir: PathBuf::from("data/merged"),
            request: PathBuf::from("data/request.yaml"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: "csv".to_string(),
            delimiter: None,
            encoding: None,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            keep_extra_columns: false,
        }
    }
}

impl Default for VehicleFields {
    fn default() -> Self {
        Self {
            sex: "DRV_SEX".to_string(),
            age: "DRV_AGE".to_string(),
            vehicle_type: "vehtype".to_string(),
            model_year: "vehyr".to_string(),
            intoxication: "intox".to_string(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        let mut road = JoinStage::new(Category::Road, "ROAD_INV", "BEGMP", "ENDMP");
        road.drop = strings(&[
            "TRLL_LG1", "TRLL_LG2", "TRLL_WD1", "TRLL_WD2", "TRLR_LG1", "TRLR_LG2", "TRLR_WD1",
            "TRLR_WD2", "DOMAIN", "COUNTY", "RTE_NBR",
        ]);

        let mut curve = JoinStage::new(Category::Curv, "curv_inv", "begmp", "endmp");
        curve.drop = strings(&["seg_lng"]);
        curve.fill.insert("deg_curv".to_string(), "0".to_string());

        let mut grade = JoinStage::new(Category::Grad, "grad_inv", "begmp", "endmp");
        grade.fill.insert("pct_grad".to_string(), "0".to_string());

        Self {
            case_column: "CASENO".to_string(),
            position_key: "rd_inv".to_string(),
            measure_column: "milepost".to_string(),
            // GPS_LAT* are all zero, xrdclass and AC_SRMPI are empty, loc_char is
            // mostly '.', CITY is missing for most urban cases.
            accident_drop: strings(&[
                "GPS_LATX", "GPS_LATY", "GPS_LATZ", "xrdclass", "loc_char", "CITY", "AC_SRMPI",
            ]),
            vehicle: VehicleFields::default(),
            stages: vec![road, curve, grade],
            tie_break: TieBreak::default(),
            boolean_format: BooleanFormat::default(),
            subset: None,
            fill_offset_from_end: Some(2),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.years.is_empty(), "Config must list at least one year");
        for year in &self.years {
            ensure!(
                (2000..=2099).contains(year),
                "Year {year} cannot be encoded as a 2-digit file year"
            );
        }
        ensure!(
            self.years.contains(&self.reference_year),
            "Reference year {} is not among the configured years {:?}",
            self.reference_year,
            self.years
        );
        if let Some(delimiter) = self.input.delimiter {
            ensure!(delimiter.is_ascii(), "Input delimiter must be ASCII");
        }
        self.input_encoding()?;
        ensure!(
            !self.merge.case_column.is_empty(),
            "merge.case_column cannot be empty"
        );
        Ok(())
    }

    /// Years from most recent to oldest; the reconcile stage walks this order.
    pub fn years_descending(&self) -> Vec<u16> {
        let mut years = self.years.clone();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    pub fn years_ascending(&self) -> Vec<u16> {
        let mut years = self.years_descending();
        years.reverse();
        years
    }

    pub fn input_encoding(&self) -> Result<&'static Encoding> {
        io_utils::resolve_encoding(self.input.encoding.as_deref())
    }
}
