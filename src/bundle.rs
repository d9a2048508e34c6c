//! Trained artifact bundle and its JSON persistence
//!
//! Saves write to a temporary sibling file that is renamed into place, so the
//! destination only ever holds a complete bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ForestConfig;
use crate::data::{EncoderSet, FEATURE_NAMES};
use crate::error::{PredictorError, Result};
use crate::forest::RandomForest;
use crate::models::FeatureImportance;

/// Bumped whenever the serialized layout changes
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Everything needed to predict: forest, importance ranking and encoders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub forest_config: ForestConfig,
    pub trained_at: DateTime<Utc>,
    pub forest: RandomForest,
    pub feature_importance: Vec<FeatureImportance>,
    pub encoders: EncoderSet,
}

/// Summary of a loaded or trained bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleInfo {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub n_trees: usize,
    pub n_features: usize,
    pub forest_config: ForestConfig,
}

impl ArtifactBundle {
    pub fn new(
        forest: RandomForest,
        feature_importance: Vec<FeatureImportance>,
        encoders: EncoderSet,
    ) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            forest_config: *forest.config(),
            trained_at: Utc::now(),
            forest,
            feature_importance,
            encoders,
        }
    }

    pub fn info(&self) -> BundleInfo {
        BundleInfo {
            format_version: self.format_version,
            trained_at: self.trained_at,
            n_trees: self.forest.n_trees(),
            n_features: self.forest.n_features(),
            forest_config: self.forest_config,
        }
    }

    /// Write the bundle as JSON, replacing `path` atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let persistence = |source| PredictorError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_vec(self)
            .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp = temp_sibling(path);
        if let Err(e) = fs::write(&tmp, &json).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(persistence(e));
        }

        tracing::info!("Saved model bundle to {:?} ({} bytes)", path, json.len());
        Ok(())
    }

    /// Read and validate a bundle. Missing, unreadable, corrupt or
    /// incompatible files are all malformed-bundle errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |reason: String| PredictorError::MalformedBundle {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = fs::read(path).map_err(|e| malformed(e.to_string()))?;
        let bundle: ArtifactBundle =
            serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))?;

        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(malformed(format!(
                "format version {} (expected {})",
                bundle.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        if bundle.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(malformed(format!(
                "feature columns {:?} do not match this build",
                bundle.feature_names
            )));
        }
        bundle
            .forest
            .validate(FEATURE_NAMES.len())
            .map_err(|e| match e {
                PredictorError::Validation(reason) => malformed(reason),
                other => malformed(other.to_string()),
            })?;

        tracing::info!(
            "Loaded model bundle from {:?} (trained {})",
            path,
            bundle.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(bundle)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
