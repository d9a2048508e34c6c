//! CART decision tree for binary classification.
//!
//! Trees are grown depth-first on a bootstrap sample using Gini impurity.
//! At each node a random subset of features is examined; missing values
//! (NaN) are routed to whichever side gives the better split, and that
//! direction is remembered for prediction.

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

/// Hyper-parameters for growing a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of non-constant features examined per split
    pub max_features: usize,
}

/// Split condition for a decision node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitCondition {
    pub feature: usize,
    /// Go left if the feature value is <= threshold
    pub threshold: f64,
    /// Direction for missing values
    pub missing_left: bool,
}

impl SplitCondition {
    #[inline]
    pub fn go_left(&self, value: f64) -> bool {
        if value.is_nan() {
            self.missing_left
        } else {
            value <= self.threshold
        }
    }
}

/// A node in a decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        condition: SplitCondition,
        left: u32,
        right: u32,
    },
    Leaf {
        /// Fraction of (bootstrap) samples in this leaf that were wins
        win_probability: f64,
        samples: u32,
    },
}

/// A fitted decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    /// Unnormalized impurity decrease per feature
    impurity_decrease: Vec<f64>,
}

/// Gini impurity of a binary node
#[inline]
fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    condition: SplitCondition,
    /// Weighted child impurity: n_left * gini_left + n_right * gini_right
    score: f64,
}

struct TreeBuilder<'a, R> {
    x: &'a [R],
    y: &'a [bool],
    params: TreeParams,
    n_features: usize,
    rng: Xoshiro256PlusPlus,
    nodes: Vec<TreeNode>,
    impurity_decrease: Vec<f64>,
    n_total: f64,
}

impl<'a, R: AsRef<[f64]>> TreeBuilder<'a, R> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x[row].as_ref()[feature]
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> u32 {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| self.y[i]).count();
        let impurity = gini(positives, n);

        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            win_probability: if n > 0 { positives as f64 / n as f64 } else { 0.0 },
            samples: n as u32,
        });

        let splittable = depth < self.params.max_depth
            && n >= self.params.min_samples_split
            && n >= 2 * self.params.min_samples_leaf
            && impurity > 0.0;
        if !splittable {
            return node_id as u32;
        }

        let Some(best) = self.find_best_split(&indices) else {
            return node_id as u32;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| best.condition.go_left(self.value(i, best.condition.feature)));

        let decrease = (n as f64 * impurity - best.score) / self.n_total;
        self.impurity_decrease[best.condition.feature] += decrease;

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[node_id] = TreeNode::Split {
            condition: best.condition,
            left,
            right,
        };

        node_id as u32
    }

    fn find_best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut self.rng);

        let min_leaf = self.params.min_samples_leaf;
        let mut visited = 0;
        let mut best: Option<BestSplit> = None;

        for feature in features {
            if visited >= self.params.max_features {
                break;
            }

            let mut present: Vec<(f64, bool)> = Vec::with_capacity(indices.len());
            let mut missing_total = 0usize;
            let mut missing_pos = 0usize;
            for &i in indices {
                let v = self.value(i, feature);
                if v.is_nan() {
                    missing_total += 1;
                    missing_pos += self.y[i] as usize;
                } else {
                    present.push((v, self.y[i]));
                }
            }

            present.sort_by(|a, b| a.0.total_cmp(&b.0));
            let constant = match (present.first(), present.last()) {
                (Some(first), Some(last)) => first.0 >= last.0 && missing_total == 0,
                _ => true,
            };
            if constant {
                continue;
            }
            visited += 1;

            let present_total = present.len();
            let present_pos = present.iter().filter(|p| p.1).count();
            let mut left_n = 0usize;
            let mut left_pos = 0usize;

            // Candidate boundaries between distinct values; with missing values
            // present, "all present values left" is also a candidate.
            for i in 0..present_total {
                left_n += 1;
                left_pos += present[i].1 as usize;

                let is_last = i + 1 == present_total;
                if !is_last && present[i].0 >= present[i + 1].0 {
                    continue;
                }
                if is_last && missing_total == 0 {
                    continue;
                }

                let threshold = if is_last {
                    present[i].0
                } else {
                    let mid = present[i].0 / 2.0 + present[i + 1].0 / 2.0;
                    if mid >= present[i + 1].0 || mid.is_infinite() {
                        present[i].0
                    } else {
                        mid
                    }
                };

                let right_n = present_total - left_n;
                let right_pos = present_pos - left_pos;

                let options: &[bool] = if missing_total > 0 {
                    &[true, false]
                } else {
                    // No missing values here; send future ones to the larger side
                    if left_n >= right_n {
                        &[true]
                    } else {
                        &[false]
                    }
                };

                for &missing_left in options {
                    let (nl, pl, nr, pr) = if missing_left {
                        (left_n + missing_total, left_pos + missing_pos, right_n, right_pos)
                    } else {
                        (left_n, left_pos, right_n + missing_total, right_pos + missing_pos)
                    };
                    if nl < min_leaf || nr < min_leaf {
                        continue;
                    }

                    let score = nl as f64 * gini(pl, nl) + nr as f64 * gini(pr, nr);
                    if best.map_or(true, |b| score < b.score) {
                        best = Some(BestSplit {
                            condition: SplitCondition {
                                feature,
                                threshold,
                                missing_left,
                            },
                            score,
                        });
                    }
                }
            }
        }

        best
    }
}

impl DecisionTree {
    /// Grow a tree on the given sample indices (duplicates allowed)
    pub fn fit<R: AsRef<[f64]>>(
        x: &[R],
        y: &[bool],
        sample: Vec<usize>,
        n_features: usize,
        params: TreeParams,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        let n_total = sample.len().max(1) as f64;
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            n_features,
            rng,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
            n_total,
        };
        builder.build(sample, 0);

        Self {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    /// Win probability for a single row
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf {
                    win_probability, ..
                } => return *win_probability,
                TreeNode::Split {
                    condition,
                    left,
                    right,
                } => {
                    idx = if condition.go_left(row[condition.feature]) {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    /// Per-feature impurity decrease normalized to sum to 1 (all zero for a stump)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }

    /// Check the structure of a deserialized tree: children point forward
    /// within bounds (so traversal always terminates), split features exist
    /// and leaf probabilities lie in [0, 1]
    pub fn validate(&self, n_features: usize) -> Result<()> {
        let invalid = |reason: String| Err(PredictorError::Validation(reason));

        if self.nodes.is_empty() {
            return invalid("tree has no nodes".to_string());
        }
        if self.impurity_decrease.len() != n_features {
            return invalid(format!(
                "tree has {} importance entries, expected {}",
                self.impurity_decrease.len(),
                n_features
            ));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    condition,
                    left,
                    right,
                } => {
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return invalid(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                    if condition.feature >= n_features {
                        return invalid(format!(
                            "node {} splits on feature {} of {}",
                            idx, condition.feature, n_features
                        ));
                    }
                    if condition.threshold.is_nan() {
                        return invalid(format!("node {} has a NaN threshold", idx));
                    }
                }
                TreeNode::Leaf {
                    win_probability, ..
                } => {
                    if !(0.0..=1.0).contains(win_probability) {
                        return invalid(format!(
                            "leaf {} has probability {}",
                            idx, win_probability
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left as usize).max(depth_of(nodes, *right as usize))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(7)
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(10, 10), 0.0);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
        assert_eq!(gini(0, 0), 0.0);
    }

    #[test]
    fn test_split_condition_missing() {
        let cond = SplitCondition {
            feature: 0,
            threshold: 1.5,
            missing_left: false,
        };
        assert!(cond.go_left(1.5));
        assert!(!cond.go_left(2.0));
        assert!(!cond.go_left(f64::NAN));
    }

    #[test]
    fn test_fit_separable() {
        // Feature 0 separates perfectly, feature 1 is noise
        let x = vec![
            [1.0, 5.0],
            [2.0, 3.0],
            [3.0, 5.0],
            [10.0, 3.0],
            [11.0, 5.0],
            [12.0, 3.0],
        ];
        let y = vec![true, true, true, false, false, false];

        let tree = DecisionTree::fit(&x, &y, (0..6).collect(), 2, params(), rng());

        assert_eq!(tree.predict_row(&[1.5, 4.0]), 1.0);
        assert_eq!(tree.predict_row(&[11.5, 4.0]), 0.0);
        assert_eq!(tree.depth(), 1);

        let importances = tree.feature_importances();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = vec![[1.0], [2.0], [3.0]];
        let y = vec![false, false, false];

        let tree = DecisionTree::fit(&x, &y, (0..3).collect(), 1, params(), rng());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[2.0]), 0.0);
        assert_eq!(tree.feature_importances(), vec![0.0]);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = vec![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = vec![true, false, false, false, false];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..params()
        };

        let tree = DecisionTree::fit(&x, &y, (0..5).collect(), 1, params, rng());
        for node in &tree.nodes {
            if let TreeNode::Leaf { samples, .. } = node {
                assert!(*samples >= 2);
            }
        }
    }

    #[test]
    fn test_max_depth_respected() {
        let x: Vec<[f64; 1]> = (0..64).map(|i| [i as f64]).collect();
        let y: Vec<bool> = (0..64).map(|i| i % 2 == 0).collect();
        let params = TreeParams {
            max_depth: 3,
            ..params()
        };

        let tree = DecisionTree::fit(&x, &y, (0..64).collect(), 1, params, rng());
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_missing_values_routed() {
        // Wins have a missing feature value, losses a present one
        let x = vec![[f64::NAN], [f64::NAN], [1.0], [2.0]];
        let y = vec![true, true, false, false];

        let tree = DecisionTree::fit(&x, &y, (0..4).collect(), 1, params(), rng());
        assert_eq!(tree.predict_row(&[f64::NAN]), 1.0);
        assert_eq!(tree.predict_row(&[1.5]), 0.0);
    }

    fn leaf(win_probability: f64) -> TreeNode {
        TreeNode::Leaf {
            win_probability,
            samples: 1,
        }
    }

    fn split(feature: usize, left: u32, right: u32) -> TreeNode {
        TreeNode::Split {
            condition: SplitCondition {
                feature,
                threshold: 0.5,
                missing_left: true,
            },
            left,
            right,
        }
    }

    #[test]
    fn test_validate_fitted_tree() {
        let x = vec![[1.0, 0.0], [2.0, 1.0], [10.0, 0.0], [11.0, 1.0]];
        let y = vec![true, true, false, false];
        let tree = DecisionTree::fit(&x, &y, (0..4).collect(), 2, params(), rng());

        assert!(tree.validate(2).is_ok());
        assert!(tree.validate(3).is_err());
    }

    #[test]
    fn test_validate_rejects_corrupt_structure() {
        let tree = |nodes: Vec<TreeNode>| DecisionTree {
            nodes,
            impurity_decrease: vec![0.0; 2],
        };

        assert!(tree(vec![split(0, 1, 2), leaf(1.0), leaf(0.0)]).validate(2).is_ok());

        // Empty, cyclic, out of range, unknown feature, bad probability
        assert!(tree(Vec::new()).validate(2).is_err());
        assert!(tree(vec![split(0, 0, 1), leaf(0.0)]).validate(2).is_err());
        assert!(tree(vec![split(0, 1, 5), leaf(0.0)]).validate(2).is_err());
        assert!(tree(vec![split(7, 1, 2), leaf(1.0), leaf(0.0)]).validate(2).is_err());
        assert!(tree(vec![leaf(1.5)]).validate(2).is_err());
    }
}
