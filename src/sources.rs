//! Source file naming and discovery.
//!
//! HSIS exports are named `<prefix><yy><category>.<ext>`, e.g. `wa17acc.csv`
//! for the 2017 accident file. Lookups accept any letter case and either the
//! configured extension or `.tsv`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use regex::Regex;

use crate::{category::Category, error::PipelineError, io_utils, table::Table};

/// Anything that can hand out the table for one (year, category).
pub trait TableSource {
    fn load(&self, year: u16, category: Category) -> Result<Table>;
}

impl TableSource for BTreeMap<(u16, Category), Table> {
    fn load(&self, year: u16, category: Category) -> Result<Table> {
        self.get(&(year, category)).cloned().ok_or_else(|| {
            PipelineError::MissingSource {
                category,
                year,
                directory: "in-memory source".to_string(),
            }
            .into()
        })
    }
}

pub fn file_year(year: u16) -> u16 {
    year % 100
}

pub fn source_file_name(prefix: &str, year: u16, category: Category, extension: &str) -> String {
    format!("{prefix}{:02}{}.{extension}", file_year(year), category.code())
}

#[derive(Debug, Clone)]
pub struct SourceDir {
    root: PathBuf,
    prefix: String,
    extension: String,
    pattern: Regex,
}

impl SourceDir {
    pub fn new(root: &Path, prefix: &str, extension: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"(?i)^{}(\d{{2}})([a-z]+)\.([a-z]+)$",
            regex::escape(prefix)
        ))
        .context("Compiling source file pattern")?;
        Ok(Self {
            root: root.to_path_buf(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            pattern,
        })
    }

    /// Parses a file name into its (full year, category), if it follows the
    /// naming convention.
    pub fn parse_file_name(&self, name: &str) -> Option<(u16, Category)> {
        let captures = self.pattern.captures(name)?;
        let ext = captures.get(3)?.as_str();
        if !ext.eq_ignore_ascii_case(&self.extension) && !ext.eq_ignore_ascii_case("tsv") {
            return None;
        }
        let yy: u16 = captures.get(1)?.as_str().parse().ok()?;
        let category = captures.get(2)?.as_str().parse().ok()?;
        Some((2000 + yy, category))
    }

    /// Every recognised source file under the directory, keyed by (year, category).
    pub fn discover(&self) -> Result<BTreeMap<(u16, Category), PathBuf>> {
        let mut found = BTreeMap::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Listing source directory {:?}", self.root))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Reading entry in {:?}", self.root))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        for name in names {
            if let Some(key) = self.parse_file_name(&name) {
                found.entry(key).or_insert_with(|| self.root.join(&name));
            }
        }
        Ok(found)
    }

    pub fn path_for(&self, year: u16, category: Category) -> PathBuf {
        self.root
            .join(source_file_name(&self.prefix, year, category, &self.extension))
    }

    /// Locates the file for (year, category), falling back to a directory scan
    /// when the canonical name does not exist.
    pub fn locate(&self, year: u16, category: Category) -> Result<PathBuf> {
        let expected = self.path_for(year, category);
        if expected.is_file() {
            return Ok(expected);
        }
        if self.root.is_dir()
            && let Some(path) = self.discover()?.remove(&(year, category))
        {
            return Ok(path);
        }
        Err(PipelineError::MissingSource {
            category,
            year,
            directory: self.root.display().to_string(),
        }
        .into())
    }
}

/// Source tables read from a directory of HSIS exports.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: SourceDir,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
}

impl DirectorySource {
    pub fn new(dir: SourceDir, delimiter: Option<u8>, encoding: &'static Encoding) -> Self {
        Self {
            dir,
            delimiter,
            encoding,
        }
    }
}

impl TableSource for DirectorySource {
    fn load(&self, year: u16, category: Category) -> Result<Table> {
        let path = self.dir.locate(year, category)?;
        let delimiter = io_utils::resolve_input_delimiter(&path, self.delimiter);
        debug!("Loading {category} {year} from {path:?}");
        Table::read(&path, delimiter, self.encoding)
            .with_context(|| format!("Loading {category} {year} from {path:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_two_digit_year() {
        assert_eq!(
            source_file_name("wa", 2013, Category::Curv, "csv"),
            "wa13curv.csv"
        );
    }

    #[test]
    fn parse_accepts_mixed_case_and_tsv() {
        let dir = SourceDir::new(Path::new("."), "wa", "csv").expect("dir");
        assert_eq!(dir.parse_file_name("WA16Road.CSV"), Some((2016, Category::Road)));
        assert_eq!(dir.parse_file_name("wa15veh.tsv"), Some((2015, Category::Veh)));
        assert_eq!(dir.parse_file_name("wa15veh.xlsx"), None);
        assert_eq!(dir.parse_file_name("or15veh.csv"), None);
        assert_eq!(dir.parse_file_name("wa15bike.csv"), None);
    }
}
