//! Classification Metrics
//!
//! Accuracy, ROC-AUC and precision/recall/F1 for the win class, plus the
//! per-split training report.

use serde::{Deserialize, Serialize};

use crate::data::{DataSplits, LabeledSplit, FEATURE_NAMES};
use crate::error::{PredictorError, Result};
use crate::forest::Classifier;
use crate::models::FeatureImportance;

/// Metrics for one labelled split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub samples: usize,
    pub wins: usize,
    pub accuracy: f64,
    /// `None` when the split holds a single class
    pub roc_auc: Option<f64>,
}

/// Precision, recall and F1 of the win class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train: SplitMetrics,
    pub validation: SplitMetrics,
    pub test: SplitMetrics,
    pub test_report: ClassReport,
    pub feature_importance: Vec<FeatureImportance>,
}

fn check_lengths(a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(PredictorError::Evaluation(format!(
            "{} predictions for {} labels",
            a, b
        )));
    }
    Ok(())
}

/// Fraction of rows whose predicted label matches
pub fn accuracy(predicted: &[bool], labels: &[bool]) -> Result<f64> {
    check_lengths(predicted.len(), labels.len())?;
    if labels.is_empty() {
        return Err(PredictorError::Evaluation(
            "accuracy of an empty split".to_string(),
        ));
    }

    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    Ok(correct as f64 / labels.len() as f64)
}

/// Area under the ROC curve via the Mann-Whitney U statistic, with tied
/// scores given their average rank. Undefined unless both classes occur.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Result<f64> {
    check_lengths(scores.len(), labels.len())?;

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PredictorError::Evaluation(
            "ROC-AUC needs both winners and non-winners".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of 1-based ranks of the positives
    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| labels[k]).count() as f64 * avg_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

/// Precision, recall and F1 of the win class. Zero denominators yield 0.
pub fn precision_recall_f1(predicted: &[bool], labels: &[bool]) -> Result<ClassReport> {
    check_lengths(predicted.len(), labels.len())?;

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&p, &l) in predicted.iter().zip(labels) {
        match (p, l) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize, what: &str, rows: &str| {
        if den == 0 {
            tracing::warn!("{} is ill-defined with no {} rows, reporting 0", what, rows);
            0.0
        } else {
            num as f64 / den as f64
        }
    };
    let precision = ratio(tp, tp + fp, "precision", "predicted win");
    let recall = ratio(tp, tp + fn_, "recall", "actual win");
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ClassReport {
        precision,
        recall,
        f1,
    })
}

/// Importance table sorted descending; ties keep model column order
pub fn importance_table(importances: &[f64]) -> Result<Vec<FeatureImportance>> {
    if importances.len() != FEATURE_NAMES.len() {
        return Err(PredictorError::Evaluation(format!(
            "{} importances for {} features",
            importances.len(),
            FEATURE_NAMES.len()
        )));
    }

    let mut table: Vec<FeatureImportance> = FEATURE_NAMES
        .iter()
        .zip(importances)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
        })
        .collect();
    table.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(table)
}

fn evaluate_split(
    classifier: &dyn Classifier,
    split: &LabeledSplit,
    name: &str,
) -> Result<(SplitMetrics, Vec<bool>)> {
    let scores = classifier.predict_proba(&split.features)?;
    let predicted = classifier.predict(&split.features)?;

    let roc_auc = match roc_auc(&scores, &split.labels) {
        Ok(auc) => Some(auc),
        Err(e) => {
            tracing::warn!("No ROC-AUC for {} split: {}", name, e);
            None
        }
    };

    let metrics = SplitMetrics {
        samples: split.len(),
        wins: split.win_count(),
        accuracy: accuracy(&predicted, &split.labels)?,
        roc_auc,
    };
    Ok((metrics, predicted))
}

/// Score a fitted classifier on every split
pub fn evaluate(classifier: &dyn Classifier, splits: &DataSplits) -> Result<TrainingMetrics> {
    let (train, _) = evaluate_split(classifier, &splits.train, "train")?;
    let (validation, _) = evaluate_split(classifier, &splits.validation, "validation")?;
    let (test, test_predicted) = evaluate_split(classifier, &splits.test, "test")?;
    let test_report = precision_recall_f1(&test_predicted, &splits.test.labels)?;

    tracing::info!(
        "Accuracy train {:.3} / validation {:.3} / test {:.3}",
        train.accuracy,
        validation.accuracy,
        test.accuracy
    );

    Ok(TrainingMetrics {
        train,
        validation,
        test,
        test_report,
        feature_importance: importance_table(&classifier.feature_importances())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        let acc = accuracy(&[true, false, true, false], &[true, false, false, false]).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
        assert!(accuracy(&[], &[]).is_err());
        assert!(accuracy(&[true], &[true, false]).is_err());
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = [false, false, true, true];
        let perfect = roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels).unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);

        let inverted = roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels).unwrap();
        assert!(inverted.abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties() {
        // All scores equal: every pair counts half
        let auc = roc_auc(&[0.5, 0.5, 0.5], &[true, false, false]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);

        // pos {0.8, 0.4}, neg {0.4, 0.1}: pairs 1 + 1 + 0.5 + 1 = 3.5 of 4
        let auc = roc_auc(&[0.8, 0.4, 0.4, 0.1], &[true, true, false, false]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class() {
        let err = roc_auc(&[0.1, 0.2], &[false, false]).unwrap_err();
        assert!(matches!(err, PredictorError::Evaluation(_)));
    }

    #[test]
    fn test_precision_recall_f1() {
        let predicted = [true, true, false, false];
        let labels = [true, false, true, false];
        let report = precision_recall_f1(&predicted, &labels).unwrap();
        assert!((report.precision - 0.5).abs() < 1e-12);
        assert!((report.recall - 0.5).abs() < 1e-12);
        assert!((report.f1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_precision_no_positive_predictions() {
        let report = precision_recall_f1(&[false, false], &[true, false]).unwrap();
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
    }

    #[test]
    fn test_importance_table_sorted() {
        let mut importances = vec![0.0; FEATURE_NAMES.len()];
        importances[2] = 0.6;
        importances[0] = 0.3;
        importances[11] = 0.1;

        let table = importance_table(&importances).unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(table[0].feature, "points_moving_avg");
        assert_eq!(table[1].feature, "grid");
        assert_eq!(table[2].feature, "country_encoded");
        // Zero-importance rows keep column order
        assert_eq!(table[3].feature, "qual_position_avg");

        assert!(importance_table(&[1.0]).is_err());
    }
}
