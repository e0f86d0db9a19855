//! Analyzer configuration.
//!
//! Configuration is a plain value handed to [`crate::analyzer::SchemaAnalyzer`]
//! at construction time. Every field has a default so a YAML file only needs
//! to mention what it overrides.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum number of non-null values handed to the type detectors.
    pub sample_size: usize,
    /// Categorical columns with at most this many distinct values record them.
    pub max_categories: usize,
    /// Number of distinct example values kept per column.
    pub sample_values: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            max_categories: 20,
            sample_values: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub cardinality_change_threshold: f64,
    /// Also report uniqueness flips and categorical value-set changes.
    pub extended_checks: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            cardinality_change_threshold: 0.2,
            extended_checks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Minimum relative cardinality increase that earns an index suggestion.
    pub index_suggestion_threshold: f64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            index_suggestion_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub review_confidence_below: f64,
    pub migration_impact_above: f64,
    pub null_fraction_above: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            review_confidence_below: 0.7,
            migration_impact_above: 0.5,
            null_fraction_above: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub inference: InferenceConfig,
    pub drift: DriftConfig,
    pub migration: MigrationConfig,
    pub quality: QualityConfig,
}

impl AnalyzerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: AnalyzerConfig =
            serde_yaml::from_reader(reader).context("Parsing config YAML")?;
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        ensure!(
            self.inference.sample_size > 0,
            "inference.sample_size must be positive"
        );
        ensure!(
            self.drift.cardinality_change_threshold >= 0.0,
            "drift.cardinality_change_threshold cannot be negative"
        );
        for (name, value) in [
            (
                "quality.review_confidence_below",
                self.quality.review_confidence_below,
            ),
            (
                "quality.migration_impact_above",
                self.quality.migration_impact_above,
            ),
            (
                "quality.null_fraction_above",
                self.quality.null_fraction_above,
            ),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be between 0 and 1 (got {value})"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_merges_partial_yaml_with_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "inference:\n  sample_size: 250\ndrift:\n  extended_checks: true").unwrap();

        let config = AnalyzerConfig::load(file.path()).expect("load config");
        assert_eq!(config.inference.sample_size, 250);
        assert_eq!(config.inference.max_categories, 20);
        assert!(config.drift.extended_checks);
        assert_eq!(config.drift.cardinality_change_threshold, 0.2);
        assert_eq!(config.quality, QualityConfig::default());
    }

    #[test]
    fn load_rejects_out_of_range_thresholds() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "quality:\n  null_fraction_above: 1.5").unwrap();
        let err = AnalyzerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("quality.null_fraction_above"));
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = AnalyzerConfig::load(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(err.to_string().contains("Opening config file"));
    }
}
