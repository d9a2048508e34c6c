//! Categorical encoders
//!
//! Label encoding for the nationality, constructor nationality and country
//! fields. Encoders are fitted once on historical data and only ever used to
//! transform afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PredictorError, Result};
use crate::models::GridEntry;

/// Code used for the country feature at prediction time
pub const COUNTRY_PLACEHOLDER_CODE: u32 = 0;

/// How a categorical feature is encoded when building snapshot features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPolicy {
    /// Look the value up in the fitted encoder; unseen values are an error
    Lookup,
    /// Unencoded placeholder: always this code, the source value is never read
    Placeholder(u32),
}

/// The closed set of categorical features in the model input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalFeature {
    Nationality,
    ConstructorNationality,
    Country,
}

impl CategoricalFeature {
    pub const ALL: [CategoricalFeature; 3] = [
        CategoricalFeature::Nationality,
        CategoricalFeature::ConstructorNationality,
        CategoricalFeature::Country,
    ];

    /// Source column name in historical data
    pub fn field_name(self) -> &'static str {
        match self {
            CategoricalFeature::Nationality => "nationality",
            CategoricalFeature::ConstructorNationality => "nationality_constructor",
            CategoricalFeature::Country => "country",
        }
    }

    /// Name of the encoded model column
    pub fn encoded_column(self) -> &'static str {
        match self {
            CategoricalFeature::Nationality => "nationality_encoded",
            CategoricalFeature::ConstructorNationality => "nationality_constructor_encoded",
            CategoricalFeature::Country => "country_encoded",
        }
    }

    pub fn snapshot_policy(self) -> EncodingPolicy {
        match self {
            CategoricalFeature::Nationality | CategoricalFeature::ConstructorNationality => {
                EncodingPolicy::Lookup
            }
            CategoricalFeature::Country => EncodingPolicy::Placeholder(COUNTRY_PLACEHOLDER_CODE),
        }
    }

    /// Grid field this feature is read from (the country is not on the grid)
    pub fn snapshot_value(self, entry: &GridEntry) -> Option<&str> {
        match self {
            CategoricalFeature::Nationality => Some(&entry.nationality),
            CategoricalFeature::ConstructorNationality => Some(&entry.constructor_nationality),
            CategoricalFeature::Country => None,
        }
    }
}

/// String to integer code table. Codes follow the sorted order of the
/// distinct values seen while fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self {
            classes: distinct.into_iter().collect(),
        }
    }

    pub fn transform(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Fitted encoders for every categorical feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderSet {
    nationality: LabelEncoder,
    nationality_constructor: LabelEncoder,
    country: LabelEncoder,
}

impl EncoderSet {
    pub fn new(
        nationality: LabelEncoder,
        nationality_constructor: LabelEncoder,
        country: LabelEncoder,
    ) -> Self {
        Self {
            nationality,
            nationality_constructor,
            country,
        }
    }

    pub fn get(&self, feature: CategoricalFeature) -> &LabelEncoder {
        match feature {
            CategoricalFeature::Nationality => &self.nationality,
            CategoricalFeature::ConstructorNationality => &self.nationality_constructor,
            CategoricalFeature::Country => &self.country,
        }
    }

    /// Encode a value, failing on categories the encoder never saw
    pub fn encode(&self, feature: CategoricalFeature, value: &str) -> Result<f64> {
        self.get(feature)
            .transform(value)
            .map(|code| code as f64)
            .ok_or_else(|| PredictorError::UnknownCategory {
                field: feature.field_name(),
                value: value.to_string(),
            })
    }

    /// Encode a grid entry's feature according to its snapshot policy
    pub fn encode_snapshot(&self, feature: CategoricalFeature, entry: &GridEntry) -> Result<f64> {
        match feature.snapshot_policy() {
            EncodingPolicy::Placeholder(code) => Ok(code as f64),
            EncodingPolicy::Lookup => match feature.snapshot_value(entry) {
                Some(value) => self.encode(feature, value),
                None => Err(PredictorError::FeatureBuild(format!(
                    "{} has no grid source field",
                    feature.field_name()
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_entry(nationality: &str, constructor_nationality: &str) -> GridEntry {
        GridEntry {
            driver_id: "norris".to_string(),
            driver_name: "Lando Norris".to_string(),
            team_name: "McLaren".to_string(),
            nationality: nationality.to_string(),
            constructor_nationality: constructor_nationality.to_string(),
        }
    }

    fn encoder_set() -> EncoderSet {
        EncoderSet::new(
            LabelEncoder::fit(["British", "Dutch", "Monegasque", "British"]),
            LabelEncoder::fit(["British", "Italian", "Austrian"]),
            LabelEncoder::fit(["Monaco", "Italy", "UK"]),
        )
    }

    #[test]
    fn test_label_encoder_sorted_codes() {
        let encoder = LabelEncoder::fit(["Dutch", "British", "Monegasque", "British"]);

        assert_eq!(encoder.len(), 3);
        assert_eq!(encoder.transform("British"), Some(0));
        assert_eq!(encoder.transform("Dutch"), Some(1));
        assert_eq!(encoder.transform("Monegasque"), Some(2));
        assert_eq!(encoder.transform("Finnish"), None);
    }

    #[test]
    fn test_encode_unknown_category_fails() {
        let encoders = encoder_set();
        let err = encoders
            .encode(CategoricalFeature::Nationality, "Finnish")
            .unwrap_err();

        match err {
            PredictorError::UnknownCategory { field, value } => {
                assert_eq!(field, "nationality");
                assert_eq!(value, "Finnish");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_snapshot_policies() {
        assert_eq!(
            CategoricalFeature::Nationality.snapshot_policy(),
            EncodingPolicy::Lookup
        );
        assert_eq!(
            CategoricalFeature::ConstructorNationality.snapshot_policy(),
            EncodingPolicy::Lookup
        );
        assert_eq!(
            CategoricalFeature::Country.snapshot_policy(),
            EncodingPolicy::Placeholder(0)
        );
    }

    #[test]
    fn test_encode_snapshot() {
        let encoders = encoder_set();
        let entry = grid_entry("Dutch", "Austrian");

        assert_eq!(
            encoders
                .encode_snapshot(CategoricalFeature::Nationality, &entry)
                .unwrap(),
            1.0
        );
        assert_eq!(
            encoders
                .encode_snapshot(CategoricalFeature::ConstructorNationality, &entry)
                .unwrap(),
            0.0
        );
        // Country never consults the encoder
        assert_eq!(
            encoders
                .encode_snapshot(CategoricalFeature::Country, &entry)
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn test_encode_snapshot_unknown_constructor_nationality() {
        let encoders = encoder_set();
        let entry = grid_entry("British", "German");

        let err = encoders
            .encode_snapshot(CategoricalFeature::ConstructorNationality, &entry)
            .unwrap_err();
        assert!(matches!(
            err,
            PredictorError::UnknownCategory {
                field: "nationality_constructor",
                ..
            }
        ));
    }

    #[test]
    fn test_encoder_set_json_roundtrip() {
        let encoders = encoder_set();
        let json = serde_json::to_string(&encoders).unwrap();
        let restored: EncoderSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, encoders);
    }
}
