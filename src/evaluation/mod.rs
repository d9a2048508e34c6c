//! Model evaluation for training runs

pub mod metrics;

pub use metrics::{
    accuracy, evaluate, importance_table, precision_recall_f1, roc_auc, ClassReport,
    SplitMetrics, TrainingMetrics,
};
