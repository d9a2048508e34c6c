//! Predictor orchestrator
//!
//! Owns the model lifecycle: Untrained until [`F1Predictor::train`] or
//! [`F1Predictor::load`] succeeds, Trained afterwards. The trained bundle is
//! swapped in whole behind an `Arc`, so readers never see a partial model.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::bundle::{ArtifactBundle, BundleInfo};
use crate::config::{ForestConfig, PredictorConfig};
use crate::data::{DataLoader, FeatureBuilder, FeatureVector, GridOverrides, SeasonSnapshot};
use crate::error::{validate_probability, PredictorError, Result};
use crate::evaluation::{evaluate, TrainingMetrics};
use crate::forest::{Classifier, RandomForest};
use crate::models::{FeatureImportance, RaceForecast, RacePrediction, SeasonResult};

enum ModelState {
    Untrained,
    Trained(Arc<ArtifactBundle>),
}

/// Lifecycle state reported to callers
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStatus {
    Untrained,
    Trained(BundleInfo),
}

/// Result of [`F1Predictor::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// Nothing to save; no file was written
    Skipped,
}

/// Result of [`F1Predictor::try_autoload`]
#[derive(Debug)]
pub enum AutoloadOutcome {
    Loaded,
    NotLoaded(PredictorError),
}

impl AutoloadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, AutoloadOutcome::Loaded)
    }
}

/// Race-win predictor for the current season
pub struct F1Predictor {
    state: RwLock<ModelState>,
    season: SeasonSnapshot,
    forest_config: ForestConfig,
}

impl F1Predictor {
    /// Create an untrained predictor over a season snapshot
    pub fn new(season: SeasonSnapshot, forest_config: ForestConfig) -> Self {
        Self {
            state: RwLock::new(ModelState::Untrained),
            season,
            forest_config,
        }
    }

    /// Create an untrained predictor, reading the season from `config.data_dir`
    pub fn from_config(config: &PredictorConfig) -> Result<Self> {
        let season = SeasonSnapshot::load(&config.data_dir)?;
        Ok(Self::new(season, config.forest))
    }

    pub fn season(&self) -> &SeasonSnapshot {
        &self.season
    }

    fn current(&self) -> Result<Option<Arc<ArtifactBundle>>> {
        let state = self.state.read().map_err(|_| PredictorError::StatePoisoned)?;
        Ok(match &*state {
            ModelState::Untrained => None,
            ModelState::Trained(bundle) => Some(Arc::clone(bundle)),
        })
    }

    fn install(&self, bundle: ArtifactBundle) -> Result<()> {
        let mut state = self.state.write().map_err(|_| PredictorError::StatePoisoned)?;
        *state = ModelState::Trained(Arc::new(bundle));
        Ok(())
    }

    /// Fit a fresh forest on the loader's training split and score it on
    /// every split. Replaces any previous model only on success.
    pub fn train<L: DataLoader + ?Sized>(&self, loader: &L) -> Result<TrainingMetrics> {
        let splits = loader.prepare_features()?;
        info!(
            "Training on {} rows ({} wins), validating on {}, testing on {}",
            splits.train.len(),
            splits.train.win_count(),
            splits.validation.len(),
            splits.test.len()
        );

        let mut forest = RandomForest::new(self.forest_config);
        Classifier::fit(&mut forest, &splits.train.features, &splits.train.labels)?;

        let metrics = evaluate(&forest, &splits)?;
        let bundle = ArtifactBundle::new(
            forest,
            metrics.feature_importance.clone(),
            loader.encoders().clone(),
        );
        self.install(bundle)?;

        info!("Model trained");
        Ok(metrics)
    }

    /// Win probabilities for every driver on the grid, most likely first.
    /// `Ok(None)` while no model is trained or loaded.
    pub fn predict(
        &self,
        circuit: &str,
        overrides: Option<&GridOverrides>,
    ) -> Result<Option<RaceForecast>> {
        let Some(bundle) = self.current()? else {
            return Ok(None);
        };

        let snapshot = FeatureBuilder::build_snapshot(
            self.season.grid(),
            self.season.results(),
            overrides,
            &bundle.encoders,
        )?;
        let vectors: Vec<FeatureVector> = snapshot.iter().map(|s| s.to_vector()).collect();
        let probabilities = Classifier::predict_proba(&bundle.forest, &vectors)?;

        let mut predictions = Vec::with_capacity(snapshot.len());
        for (features, probability) in snapshot.into_iter().zip(probabilities) {
            validate_probability(probability)?;
            predictions.push(RacePrediction {
                driver: features.driver_name,
                team: features.team_name,
                grid: features.grid,
                win_probability: probability,
                championship_points: features.points_championship,
            });
        }
        // Stable: ties keep grid order
        predictions.sort_by(|a, b| b.win_probability.total_cmp(&a.win_probability));

        info!("Predicted {} drivers for {}", predictions.len(), circuit);
        Ok(Some(RaceForecast {
            circuit: circuit.to_string(),
            predictions,
        }))
    }

    /// Persist the current bundle. Writes nothing while untrained.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<SaveOutcome> {
        let Some(bundle) = self.current()? else {
            warn!("No trained model to save");
            return Ok(SaveOutcome::Skipped);
        };

        bundle.save(path.as_ref())?;
        Ok(SaveOutcome::Saved(path.as_ref().to_path_buf()))
    }

    /// Replace the current model with a saved bundle
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bundle = ArtifactBundle::load(path)?;
        self.install(bundle)
    }

    /// Startup load that never fails the caller; on error the predictor
    /// keeps its current state
    pub fn try_autoload<P: AsRef<Path>>(&self, path: P) -> AutoloadOutcome {
        match self.load(path.as_ref()) {
            Ok(()) => AutoloadOutcome::Loaded,
            Err(e) => {
                warn!("Could not load saved model {:?}: {}", path.as_ref(), e);
                AutoloadOutcome::NotLoaded(e)
            }
        }
    }

    pub fn status(&self) -> Result<ModelStatus> {
        Ok(match self.current()? {
            Some(bundle) => ModelStatus::Trained(bundle.info()),
            None => ModelStatus::Untrained,
        })
    }

    /// Importance ranking of the current model, highest first
    pub fn feature_importance(&self) -> Result<Option<Vec<FeatureImportance>>> {
        Ok(self.current()?.map(|b| b.feature_importance.clone()))
    }

    pub fn bundle_info(&self) -> Result<Option<BundleInfo>> {
        Ok(self.current()?.map(|b| b.info()))
    }

    pub fn driver_recent_results(&self, driver_name: &str) -> Vec<&SeasonResult> {
        self.season.driver_recent_results(driver_name)
    }
}
