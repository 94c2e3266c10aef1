// Library exports for conflict-stats

pub mod aggregate;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod fields;
pub mod filter;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod stats;

pub use aggregate::{Dimension, GroupKey, Rollup};
pub use error::{ConfigError, DataError};
pub use fields::Dataset;
pub use filter::{AllowList, CountryTable, YearWindow};
pub use normalize::Record;
pub use pipeline::{Pipeline, Selection, NETWORK_FLOW, SANKEY_FLOW};

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

const FOUR_DIGIT_YEARS: RangeInclusive<i32> = 1000..=9999;

/// Explicit pipeline configuration, passed to every run instead of living in
/// process-wide globals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_year_min")]
    pub year_min: i32,
    #[serde(default = "default_year_max")]
    pub year_max: i32,
    /// Empty means every country passes
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    /// KDE bandwidth factor
    #[serde(default = "default_bandwidth")]
    pub bandwidth: f64,
    /// Groups with fewer samples are flagged as insufficient
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
}

fn default_year_min() -> i32 { filter::YEAR_MIN }
fn default_year_max() -> i32 { filter::YEAR_MAX }
fn default_bandwidth() -> f64 { stats::DEFAULT_BANDWIDTH }
fn default_min_sample_size() -> usize { stats::DEFAULT_MIN_SAMPLE_SIZE }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            year_min: filter::YEAR_MIN,
            year_max: filter::YEAR_MAX,
            allowed_countries: Vec::new(),
            bandwidth: stats::DEFAULT_BANDWIDTH,
            min_sample_size: stats::DEFAULT_MIN_SAMPLE_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject settings that would make the statistics meaningless. Window
    /// bounds must be four-digit years like every parsed record year; an
    /// inverted window is allowed and simply selects nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |year: i32| FOUR_DIGIT_YEARS.contains(&year);
        if !(in_range(self.year_min) && in_range(self.year_max)) {
            return Err(ConfigError::InvalidWindow {
                min: self.year_min,
                max: self.year_max,
            });
        }
        if !(self.bandwidth > 0.0 && self.bandwidth.is_finite()) {
            return Err(ConfigError::InvalidBandwidth { value: self.bandwidth });
        }
        if self.min_sample_size == 0 {
            return Err(ConfigError::ZeroSampleSize);
        }
        Ok(())
    }

    pub fn window(&self) -> YearWindow {
        YearWindow::new(self.year_min, self.year_max)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.allowed_countries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.window(), YearWindow::new(2015, 2024));
        assert!(config.allow_list().is_empty());
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json_str(
            r#"{"year_min": 2018, "allowed_countries": ["Syria", "Iraq"]}"#,
        )
        .unwrap();
        assert_eq!(config.year_min, 2018);
        assert_eq!(config.year_max, 2024);
        assert_eq!(config.allow_list().len(), 2);
    }

    #[test]
    fn test_inverted_window_is_accepted() {
        let config = PipelineConfig::from_json_str(r#"{"year_min": 2024, "year_max": 2015}"#);
        assert!(config.is_ok());
    }

    #[test]
    fn test_window_outside_four_digit_years() {
        let result = PipelineConfig::from_json_str(
            r#"{"year_min": -2000000000, "year_max": 2000000000}"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidWindow { min: -2000000000, max: 2000000000 })
        ));
        let result = PipelineConfig::from_json_str(r#"{"year_max": 10000}"#);
        assert!(matches!(result, Err(ConfigError::InvalidWindow { .. })));
        assert!(PipelineConfig::from_json_str(r#"{"year_min": 1000, "year_max": 9999}"#).is_ok());
    }

    #[test]
    fn test_invalid_bandwidth() {
        let result = PipelineConfig::from_json_str(r#"{"bandwidth": 0}"#);
        assert!(matches!(result, Err(ConfigError::InvalidBandwidth { .. })));
    }

    #[test]
    fn test_zero_sample_size() {
        let result = PipelineConfig::from_json_str(r#"{"min_sample_size": 0}"#);
        assert!(matches!(result, Err(ConfigError::ZeroSampleSize)));
    }

    #[test]
    fn test_malformed_json() {
        let result = PipelineConfig::from_json_str("{year_min: }");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"bandwidth": 0.8, "min_sample_size": 5}"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.bandwidth, 0.8);
        assert_eq!(config.min_sample_size, 5);

        let missing = PipelineConfig::from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::File { .. })));
    }
}
