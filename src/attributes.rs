//! Canonical attribute schema read from the data request specification.
//!
//! The request lists, per category, the ordered attribute names every output
//! table must carry. Two layouts are accepted:
//!
//! - YAML mapping category code → list of names (`.yaml` / `.yml`)
//! - the request form exported to delimited text, one row per attribute with
//!   `tab` and `SAS variable name` columns

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{category::Category, io_utils, reconcile::names_match, table::Table};

pub const REQUEST_TAB_COLUMN: &str = "tab";
pub const REQUEST_NAME_COLUMN: &str = "SAS variable name";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema {
    categories: BTreeMap<Category, Vec<String>>,
}

impl AttributeSchema {
    pub fn from_map(categories: BTreeMap<Category, Vec<String>>) -> Result<Self> {
        let schema = Self { categories };
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let schema = if is_yaml {
            let file =
                File::open(path).with_context(|| format!("Opening request file {path:?}"))?;
            serde_yaml::from_reader::<_, AttributeSchema>(BufReader::new(file))
                .with_context(|| format!("Parsing request YAML {path:?}"))?
        } else {
            let delimiter = io_utils::resolve_input_delimiter(path, None);
            let table = Table::read(path, delimiter, encoding)?;
            Self::from_request_table(&table)?
        };
        schema
            .validate()
            .with_context(|| format!("Validating request {path:?}"))?;
        Ok(schema)
    }

    fn from_request_table(table: &Table) -> Result<Self> {
        let tab_idx = table.require_column(REQUEST_TAB_COLUMN)?;
        let name_idx = table.require_column(REQUEST_NAME_COLUMN)?;
        let mut categories: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for (row_idx, row) in table.rows().iter().enumerate() {
            let name = row[name_idx].trim();
            if name.is_empty() {
                continue;
            }
            let category: Category = row[tab_idx]
                .parse()
                .with_context(|| format!("Request row {}", row_idx + 2))?;
            categories
                .entry(category)
                .or_default()
                .push(name.to_string());
        }
        Ok(Self { categories })
    }

    fn validate(&self) -> Result<()> {
        for (category, names) in &self.categories {
            for (idx, name) in names.iter().enumerate() {
                if name.trim().is_empty() {
                    bail!("Empty attribute name at position {} of {category}", idx + 1);
                }
                if let Some(previous) = names[..idx].iter().find(|other| names_match(other, name)) {
                    return Err(anyhow!(
                        "Attribute '{name}' of {category} duplicates '{previous}'"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Canonical attributes of `category` in request order; empty when the
    /// request does not cover it.
    pub fn attributes(&self, category: Category) -> &[String] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
