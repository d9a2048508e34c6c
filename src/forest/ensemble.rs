//! Random forest classifier
//!
//! Bagged ensemble of [`DecisionTree`]s. Per-tree RNG seeds are drawn from a
//! master RNG in tree order before the trees are grown in parallel, so the
//! fitted forest does not depend on thread scheduling.

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::Classifier;
use crate::config::ForestConfig;
use crate::data::FeatureVector;
use crate::error::{PredictorError, Result};

/// Probability above which a row is classified as a win
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Create an unfitted forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fit on rows `x` with win labels `y`, replacing any previous fit
    pub fn fit<R: AsRef<[f64]> + Sync>(&mut self, x: &[R], y: &[bool]) -> Result<()> {
        if x.is_empty() {
            return Err(PredictorError::Classification(
                "cannot fit on an empty feature matrix".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(PredictorError::Classification(format!(
                "feature matrix has {} rows but {} labels were given",
                x.len(),
                y.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(PredictorError::Classification(
                "forest needs at least one tree".to_string(),
            ));
        }

        let n_features = x[0].as_ref().len();
        if let Some(row) = x.iter().position(|r| r.as_ref().len() != n_features) {
            return Err(PredictorError::Classification(format!(
                "row {} has {} features, expected {}",
                row,
                x[row].as_ref().len(),
                n_features
            )));
        }

        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split.max(2),
            min_samples_leaf: self.config.min_samples_leaf.max(1),
            max_features: self.config.max_features.resolve(n_features),
        };

        let mut master = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let seeds: Vec<u64> = (0..self.config.n_trees).map(|_| master.gen()).collect();

        let n_rows = x.len();
        let bootstrap = self.config.bootstrap;
        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .enumerate()
            .map(|(t, &seed)| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                let sample: Vec<usize> = if bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = DecisionTree::fit(x, y, sample, n_features, params, rng);
                tracing::debug!(
                    "Grew tree {} ({} nodes, depth {})",
                    t,
                    tree.node_count(),
                    tree.depth()
                );
                tree
            })
            .collect();

        self.feature_importances = Self::aggregate_importances(&trees, n_features);
        self.trees = trees;
        self.n_features = n_features;

        tracing::info!(
            "Fitted random forest: {} trees on {} rows x {} features",
            self.trees.len(),
            n_rows,
            n_features
        );
        Ok(())
    }

    /// Mean of per-tree normalized importances (trees that never split are
    /// skipped), renormalized to sum to 1
    fn aggregate_importances(trees: &[DecisionTree], n_features: usize) -> Vec<f64> {
        let mut sum = vec![0.0; n_features];
        let mut counted = 0usize;
        for tree in trees.iter().filter(|t| t.node_count() > 1) {
            for (acc, v) in sum.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
            counted += 1;
        }
        if counted == 0 {
            return sum;
        }

        let total: f64 = sum.iter().sum();
        if total > 0.0 {
            sum.iter().map(|v| v / total).collect()
        } else {
            sum
        }
    }

    /// Structural check for a deserialized forest expecting `n_features` inputs
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if !self.is_fitted() {
            return Err(PredictorError::Validation("forest has no trees".to_string()));
        }
        if self.n_features != n_features || self.feature_importances.len() != n_features {
            return Err(PredictorError::Validation(format!(
                "forest is fitted on {} features with {} importances, expected {}",
                self.n_features,
                self.feature_importances.len(),
                n_features
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| match e {
                PredictorError::Validation(reason) => {
                    PredictorError::Validation(format!("tree {}: {}", t, reason))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Win probability per row: mean of tree leaf win fractions
    pub fn predict_proba<R: AsRef<[f64]>>(&self, x: &[R]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(PredictorError::Classification(
                "random forest is not fitted".to_string(),
            ));
        }

        let n_trees = self.trees.len() as f64;
        x.iter()
            .enumerate()
            .map(|(i, row)| {
                let row = row.as_ref();
                if row.len() != self.n_features {
                    return Err(PredictorError::Classification(format!(
                        "row {} has {} features, model expects {}",
                        i,
                        row.len(),
                        self.n_features
                    )));
                }
                // Sequential sum in tree order keeps results bit-identical
                let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                Ok(total / n_trees)
            })
            .collect()
    }

    /// Hard win / no-win labels
    pub fn predict<R: AsRef<[f64]>>(&self, x: &[R]) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p > DECISION_THRESHOLD)
            .collect())
    }

    /// Normalized mean decrease in impurity per feature (empty until fitted)
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[FeatureVector], y: &[bool]) -> Result<()> {
        RandomForest::fit(self, x, y)
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<f64>> {
        RandomForest::predict_proba(self, x)
    }

    fn predict(&self, x: &[FeatureVector]) -> Result<Vec<bool>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.feature_importances.clone()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wins iff the first feature is small; second feature is noise
    fn toy_data() -> (Vec<[f64; 2]>, Vec<bool>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            let a = (i % 20) as f64;
            let b = ((i * 7) % 11) as f64;
            x.push([a, b]);
            y.push(a < 5.0);
        }
        (x, y)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_fit_predict() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();

        assert!(forest.is_fitted());
        assert_eq!(forest.n_trees(), 15);

        let probs = forest.predict_proba(&[[1.0, 3.0], [18.0, 3.0]]).unwrap();
        assert!(probs[0] > 0.5);
        assert!(probs[1] < 0.5);
        for p in probs {
            assert!((0.0..=1.0).contains(&p));
        }

        let labels = forest.predict(&[[2.0, 0.0], [15.0, 0.0]]).unwrap();
        assert_eq!(labels, vec![true, false]);
    }

    #[test]
    fn test_feature_importances_normalized() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();

        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        let total: f64 = importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = toy_data();
        let mut a = RandomForest::new(small_config());
        let mut b = RandomForest::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        let query = [[4.5, 2.0], [5.5, 9.0]];
        assert_eq!(a.predict_proba(&query).unwrap(), b.predict_proba(&query).unwrap());
    }

    #[test]
    fn test_fit_errors() {
        let mut forest = RandomForest::new(small_config());
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(forest.fit(&empty, &[]).is_err());
        assert!(forest.fit(&[[1.0, 2.0]], &[true, false]).is_err());

        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(forest.fit(&ragged, &[true, false]).is_err());
    }

    #[test]
    fn test_predict_unfitted_or_wrong_width() {
        let forest = RandomForest::new(small_config());
        assert!(forest.predict_proba(&[[1.0, 2.0]]).is_err());

        let (x, y) = toy_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert!(forest.predict_proba(&[[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_validate() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(small_config());
        assert!(forest.validate(2).is_err());

        forest.fit(&x, &y).unwrap();
        assert!(forest.validate(2).is_ok());
        assert!(forest.validate(12).is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_predictions() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();

        let query = [[3.0, 1.0], [9.0, 4.0], [f64::NAN, 2.0]];
        assert_eq!(
            forest.predict_proba(&query).unwrap(),
            restored.predict_proba(&query).unwrap()
        );
    }
}
