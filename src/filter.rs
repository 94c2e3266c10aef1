// Year window, country allow-list and the range filter

use crate::data::RawTable;
use crate::normalize::Record;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const YEAR_MIN: i32 = 2015;
pub const YEAR_MAX: i32 = 2024;

/// Closed year interval. A window with `min > max` is degenerate and
/// contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub min: i32,
    pub max: i32,
}

impl Default for YearWindow {
    fn default() -> Self {
        Self {
            min: YEAR_MIN,
            max: YEAR_MAX,
        }
    }
}

impl YearWindow {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }

    /// Years in ascending order; empty for a degenerate window
    pub fn years(&self) -> impl DoubleEndedIterator<Item = i32> {
        self.min..=self.max
    }
}

/// Country names admitted to a chart. Matching is exact after trimming.
/// An empty list admits every country.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    names: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn permits(&self, country: &str) -> bool {
        self.names.is_empty() || self.names.contains(country.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn extend(&mut self, other: &AllowList) {
        self.names.extend(other.names.iter().cloned());
    }
}

/// Reference table of in-scope countries: name -> ISO3 code.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    names: Vec<String>,
    iso3: HashMap<String, String>,
}

impl CountryTable {
    /// Build from a raw reference table. The name comes from the first
    /// non-empty cell among the `Country`, `CountryName` and `country`
    /// columns (headers compared after trimming, so `Country ` matches too),
    /// or else the row's last non-empty cell.
    pub fn from_table(table: &RawTable) -> Self {
        let name_cols: Vec<usize> = ["Country", "CountryName", "country"]
            .iter()
            .filter_map(|n| table.column_index(n))
            .collect();
        let iso_col = ["iso3", "ISO3", "Iso3"]
            .iter()
            .find_map(|n| table.column_index(n));

        let mut names = Vec::new();
        let mut iso3 = HashMap::new();

        for row in &table.rows {
            let name = name_cols
                .iter()
                .filter_map(|&i| row.get(i))
                .map(|s| s.trim())
                .find(|s| !s.is_empty())
                .or_else(|| row.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).last());

            let Some(name) = name else { continue };
            if names.iter().any(|n| n == name) {
                continue;
            }

            if let Some(code) = iso_col.and_then(|i| row.get(i)).map(|s| s.trim()) {
                if !code.is_empty() {
                    iso3.insert(name.to_string(), code.to_string());
                }
            }
            names.push(name.to_string());
        }

        debug!(countries = names.len(), "loaded country reference table");
        Self { names, iso3 }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iso3(&self, country: &str) -> Option<&str> {
        self.iso3.get(country.trim()).map(String::as_str)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.names)
    }
}

/// Keep records whose year is known and inside `window` and whose country
/// the allow-list admits. Input order is preserved and the input is left
/// untouched.
pub fn range_filter(records: &[Record], window: YearWindow, allow: &AllowList) -> Vec<Record> {
    let kept: Vec<Record> = records
        .iter()
        .filter(|r| r.year.is_some_and(|y| window.contains(y)))
        .filter(|r| allow.permits(&r.country))
        .cloned()
        .collect();

    debug!(
        input = records.len(),
        kept = kept.len(),
        min = window.min,
        max = window.max,
        "applied range filter"
    );
    kept
}
