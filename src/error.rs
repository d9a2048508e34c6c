use std::fmt;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DataLoading,
    FeatureBuilding,
    Encoding,
    Classification,
    Evaluation,
    Persistence,
    Validation,
    State,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DataLoading => "data loading",
            Stage::FeatureBuilding => "feature building",
            Stage::Encoding => "encoding",
            Stage::Classification => "classification",
            Stage::Evaluation => "evaluation",
            Stage::Persistence => "persistence",
            Stage::Validation => "validation",
            Stage::State => "model state",
        };
        f.write_str(name)
    }
}

/// Predictor error types
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("Failed to read data: {0}")]
    Data(#[from] PolarsError),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Feature building failed: {0}")]
    FeatureBuild(String),

    #[error("Unknown {field} category {value:?} (not seen when the encoders were fitted)")]
    UnknownCategory { field: &'static str, value: String },

    #[error("Classifier error: {0}")]
    Classification(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Failed to write model bundle to {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model bundle at {path:?}: {reason}")]
    MalformedBundle { path: PathBuf, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model state lock poisoned")]
    StatePoisoned,
}

impl PredictorError {
    /// Stage of the pipeline that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            PredictorError::Data(_) | PredictorError::MissingColumns(_) => Stage::DataLoading,
            PredictorError::FeatureBuild(_) => Stage::FeatureBuilding,
            PredictorError::UnknownCategory { .. } => Stage::Encoding,
            PredictorError::Classification(_) => Stage::Classification,
            PredictorError::Evaluation(_) => Stage::Evaluation,
            PredictorError::Persistence { .. } | PredictorError::MalformedBundle { .. } => {
                Stage::Persistence
            }
            PredictorError::Validation(_) => Stage::Validation,
            PredictorError::StatePoisoned => Stage::State,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;

/// Grid positions are 1-based
pub fn validate_grid_position(position: u32) -> Result<()> {
    if position == 0 {
        return Err(PredictorError::Validation(format!(
            "Grid position must be at least 1, got {}",
            position
        )));
    }
    Ok(())
}

pub fn validate_probability(prob: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(PredictorError::Validation(format!(
            "Probability must be between 0 and 1, got {}",
            prob
        )));
    }
    Ok(())
}

/// Split fractions must be positive and leave room for a training split
pub fn validate_split_fractions(validation: f64, test: f64) -> Result<()> {
    if validation <= 0.0 || test <= 0.0 || validation + test >= 1.0 {
        return Err(PredictorError::Validation(format!(
            "Validation and test fractions must be positive and sum below 1, got {} + {}",
            validation, test
        )));
    }
    Ok(())
}
