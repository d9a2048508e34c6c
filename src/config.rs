//! Runtime configuration
//!
//! Defaults can be overridden from the environment (`F1_DATA_DIR`,
//! `F1_MODEL_PATH`) and then by command-line flags.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "f1data";
pub const DEFAULT_MODEL_PATH: &str = "f1_model.json";
pub const HISTORICAL_FILE: &str = "historical_observations.csv";

/// Number of features examined when looking for a split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least 1
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(count) => count.min(n_features),
        };
        n.max(1)
    }
}

/// Random forest hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Train/validation/test split of the historical observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub validation_fraction: f64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.15,
            test_fraction: 0.15,
            seed: 42,
        }
    }
}

/// Paths and model settings for a predictor session
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub data_dir: PathBuf,
    pub model_path: PathBuf,
    pub forest: ForestConfig,
    pub split: SplitConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            forest: ForestConfig::default(),
            split: SplitConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Defaults with `F1_DATA_DIR` / `F1_MODEL_PATH` applied when set
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("F1_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            model_path: env::var("F1_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            ..defaults
        }
    }

    pub fn historical_path(&self) -> PathBuf {
        self.data_dir.join(HISTORICAL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_defaults() {
        let config = ForestConfig::default();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.min_samples_split, 5);
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(12), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(12), 12);
        assert_eq!(MaxFeatures::Count(20).resolve(12), 12);
        assert_eq!(MaxFeatures::Count(0).resolve(12), 1);
    }

    #[test]
    fn test_historical_path() {
        let config = PredictorConfig::default();
        assert_eq!(
            config.historical_path(),
            PathBuf::from("f1data/historical_observations.csv")
        );
    }
}
