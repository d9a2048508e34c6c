//! F1 Predictor - Formula 1 race-win probability prediction
//!
//! This library provides:
//! - Feature building from historical observations and the current season
//! - Label encoding of nationality and country fields
//! - A random-forest win classifier with impurity-based feature importance
//! - A predictor that trains, predicts, saves and loads the model bundle
//!
//! # Example
//!
//! ```no_run
//! use f1_predictor::config::PredictorConfig;
//! use f1_predictor::data::HistoricalCsvLoader;
//! use f1_predictor::predictor::F1Predictor;
//!
//! let config = PredictorConfig::from_env();
//! let predictor = F1Predictor::from_config(&config)?;
//!
//! let loader = HistoricalCsvLoader::load(config.historical_path(), config.split)?;
//! let metrics = predictor.train(&loader)?;
//! println!("Test accuracy: {:.3}", metrics.test.accuracy);
//!
//! if let Some(forecast) = predictor.predict("Monaco Grand Prix", None)? {
//!     for row in forecast.top(3) {
//!         println!("{} {:.1}%", row.driver, row.win_probability * 100.0);
//!     }
//! }
//! # Ok::<(), f1_predictor::error::PredictorError>(())
//! ```

pub mod bundle;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod forest;
pub mod models;
pub mod predictor;

// Re-export commonly used types
pub use bundle::{ArtifactBundle, BundleInfo};
pub use calendar::{calendar_2025, find_race, CalendarEntry};
pub use config::{ForestConfig, PredictorConfig, SplitConfig};
pub use data::{DataLoader, FeatureVector, GridOverrides, HistoricalCsvLoader, SeasonSnapshot};
pub use error::{PredictorError, Result};
pub use evaluation::TrainingMetrics;
pub use forest::{Classifier, RandomForest};
pub use models::{FeatureImportance, GridEntry, RaceForecast, RacePrediction, SeasonResult};
pub use predictor::{AutoloadOutcome, F1Predictor, ModelStatus, SaveOutcome};
