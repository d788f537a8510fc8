use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Record category of an HSIS export. The order of [`Category::ALL`] is the
/// order every stage walks the categories in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Acc,
    Curv,
    Grad,
    Occ,
    Peds,
    Road,
    Veh,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Acc,
        Category::Curv,
        Category::Grad,
        Category::Occ,
        Category::Peds,
        Category::Road,
        Category::Veh,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Category::Acc => "acc",
            Category::Curv => "curv",
            Category::Grad => "grad",
            Category::Occ => "occ",
            Category::Peds => "peds",
            Category::Road => "road",
            Category::Veh => "veh",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| anyhow!("Unknown record category '{value}'"))
    }
}
