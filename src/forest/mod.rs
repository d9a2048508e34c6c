//! Random-forest classifier
//!
//! [`Classifier`] is the seam the predictor trains and scores through;
//! [`RandomForest`] is the only implementation.

pub mod ensemble;
pub mod tree;

pub use ensemble::{RandomForest, DECISION_THRESHOLD};
pub use tree::{DecisionTree, SplitCondition, TreeNode, TreeParams};

use crate::data::FeatureVector;
use crate::error::Result;

/// Binary win classifier over feature vectors
pub trait Classifier: Send + Sync {
    /// Fit on a feature matrix and its win labels
    fn fit(&mut self, x: &[FeatureVector], y: &[bool]) -> Result<()>;

    /// Win probability for each row
    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<f64>>;

    fn predict(&self, x: &[FeatureVector]) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p > DECISION_THRESHOLD)
            .collect())
    }

    /// Per-feature importance in model column order
    fn feature_importances(&self) -> Vec<f64>;

    /// Get classifier name
    fn name(&self) -> &str;
}
