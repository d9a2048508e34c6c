//! Data loading, encoding and feature engineering modules

pub mod encoders;
pub mod features;
pub mod history;
pub mod season;

// Re-export commonly used types
pub use encoders::{CategoricalFeature, EncoderSet, EncodingPolicy, LabelEncoder};
pub use features::{
    get_feature_names, FeatureBuilder, FeatureColumn, FeatureVector, GridOverrides, Observation,
    SnapshotFeatures, FEATURE_COUNT, FEATURE_NAMES,
};
pub use history::{DataLoader, DataSplits, HistoricalCsvLoader, LabeledSplit};
pub use season::SeasonSnapshot;
