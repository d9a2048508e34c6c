//! Historical observations
//!
//! The [`DataLoader`] trait is the contract with whatever component cleans
//! historical race data. [`HistoricalCsvLoader`] implements it over an
//! already-cleaned observation table.

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;

use crate::config::SplitConfig;
use crate::data::encoders::{CategoricalFeature, EncoderSet, LabelEncoder};
use crate::data::features::{FeatureBuilder, FeatureVector, Observation, FEATURE_NAMES};
use crate::error::{validate_split_fractions, PredictorError, Result};

/// Label column in the historical table (1 = race win)
pub const LABEL_COLUMN: &str = "winner";

/// Numeric feature columns read as-is from the historical table
const NUMERIC_COLUMNS: [&str; 9] = [
    "grid",
    "qual_position_avg",
    "points_moving_avg",
    "circuit_wins",
    "points_championship",
    "position_championship",
    "constructor_points_mean",
    "constructor_points_std",
    "constructor_position_mean",
];

/// Feature matrix with its win labels
#[derive(Debug, Clone, Default)]
pub struct LabeledSplit {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<bool>,
}

impl LabeledSplit {
    pub fn new(features: Vec<FeatureVector>, labels: Vec<bool>) -> Self {
        Self { features, labels }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn win_count(&self) -> usize {
        self.labels.iter().filter(|&&won| won).count()
    }
}

/// Disjoint train / validation / test splits
#[derive(Debug, Clone, Default)]
pub struct DataSplits {
    pub train: LabeledSplit,
    pub validation: LabeledSplit,
    pub test: LabeledSplit,
}

/// Source of historical training data and fitted categorical encoders
pub trait DataLoader {
    /// Build feature-label pairs for the train, validation and test splits
    fn prepare_features(&self) -> Result<DataSplits>;

    /// Encoders fitted on the historical data
    fn encoders(&self) -> &EncoderSet;
}

/// Columns every historical table must provide
pub fn required_columns() -> Vec<&'static str> {
    let mut columns = NUMERIC_COLUMNS.to_vec();
    columns.extend(CategoricalFeature::ALL.iter().map(|f| f.field_name()));
    columns.push(LABEL_COLUMN);
    columns
}

/// Data loader over a cleaned historical observations CSV
pub struct HistoricalCsvLoader {
    observations: Vec<Observation>,
    encoders: EncoderSet,
    split: SplitConfig,
}

impl HistoricalCsvLoader {
    /// Load observations from CSV and fit the encoders on them
    pub fn load<P: AsRef<Path>>(csv_path: P, split: SplitConfig) -> Result<Self> {
        let df = CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
            .finish()?;

        let observations = Self::dataframe_to_observations(&df)?;
        tracing::info!(
            "Loaded {} historical observations from {:?}",
            observations.len(),
            csv_path.as_ref()
        );

        Ok(Self::from_observations(observations, split))
    }

    /// Build a loader from in-memory observations, fitting the encoders
    pub fn from_observations(observations: Vec<Observation>, split: SplitConfig) -> Self {
        let encoders = EncoderSet::new(
            LabelEncoder::fit(observations.iter().map(|o| o.nationality.as_str())),
            LabelEncoder::fit(observations.iter().map(|o| o.nationality_constructor.as_str())),
            LabelEncoder::fit(observations.iter().map(|o| o.country.as_str())),
        );

        Self {
            observations,
            encoders,
            split,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Shuffled (seeded) split of observation indices into train/validation/test
    fn split_indices(&self) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>)> {
        validate_split_fractions(self.split.validation_fraction, self.split.test_fraction)?;

        let n = self.observations.len();
        let n_test = (n as f64 * self.split.test_fraction).round() as usize;
        let n_val = (n as f64 * self.split.validation_fraction).round() as usize;

        if n_test == 0 || n_val == 0 || n_test + n_val >= n {
            return Err(PredictorError::FeatureBuild(format!(
                "{} observations are too few for a train/validation/test split",
                n
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.split.seed);
        indices.shuffle(&mut rng);

        let test = indices[..n_test].to_vec();
        let validation = indices[n_test..n_test + n_val].to_vec();
        let train = indices[n_test + n_val..].to_vec();
        Ok((train, validation, test))
    }

    fn build_split(&self, indices: &[usize]) -> Result<LabeledSplit> {
        let observations: Vec<Observation> = indices
            .iter()
            .map(|&i| self.observations[i].clone())
            .collect();
        let (features, labels) = FeatureBuilder::build_historical(&observations, &self.encoders)?;
        Ok(LabeledSplit::new(features, labels))
    }

    /// Convert DataFrame to Observation vector
    fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<Observation>> {
        let missing: Vec<String> = required_columns()
            .into_iter()
            .filter(|name| df.column(name).is_err())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PredictorError::MissingColumns(missing));
        }

        let numeric: Vec<Vec<Option<f64>>> = NUMERIC_COLUMNS
            .iter()
            .map(|name| float_column(df, name))
            .collect::<Result<_>>()?;
        let nationality = string_column(df, CategoricalFeature::Nationality.field_name())?;
        let nationality_constructor =
            string_column(df, CategoricalFeature::ConstructorNationality.field_name())?;
        let country = string_column(df, CategoricalFeature::Country.field_name())?;
        let winner = float_column(df, LABEL_COLUMN)?;

        // Identity columns are informational only
        let driver = optional_string_column(df, "driverId")?;
        let constructor = optional_string_column(df, "constructorId")?;

        let mut observations = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let value = |col: usize| -> Result<f64> {
                numeric[col][i].ok_or_else(|| null_value(NUMERIC_COLUMNS[col], i))
            };
            let text = |values: &Vec<Option<String>>, name: &str| -> Result<String> {
                values[i].clone().ok_or_else(|| null_value(name, i))
            };

            observations.push(Observation {
                driver: driver[i].clone().unwrap_or_default(),
                constructor: constructor[i].clone().unwrap_or_default(),
                nationality: text(&nationality, "nationality")?,
                nationality_constructor: text(&nationality_constructor, "nationality_constructor")?,
                country: text(&country, "country")?,
                grid: value(0)?,
                qual_position_avg: value(1)?,
                points_moving_avg: value(2)?,
                circuit_wins: value(3)?,
                points_championship: value(4)?,
                position_championship: value(5)?,
                constructor_points_mean: value(6)?,
                constructor_points_std: numeric[7][i].filter(|v| !v.is_nan()),
                constructor_position_mean: value(8)?,
                won: winner[i].ok_or_else(|| null_value(LABEL_COLUMN, i))? > 0.5,
            });
        }

        Ok(observations)
    }
}

impl DataLoader for HistoricalCsvLoader {
    fn prepare_features(&self) -> Result<DataSplits> {
        let (train, validation, test) = self.split_indices()?;

        let splits = DataSplits {
            train: self.build_split(&train)?,
            validation: self.build_split(&validation)?,
            test: self.build_split(&test)?,
        };

        tracing::info!(
            "Prepared splits: train={} validation={} test={} ({} features)",
            splits.train.len(),
            splits.validation.len(),
            splits.test.len(),
            FEATURE_NAMES.len()
        );
        Ok(splits)
    }

    fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }
}

fn null_value(column: &str, row: usize) -> PredictorError {
    PredictorError::FeatureBuild(format!("null value in column {} at row {}", column, row))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn optional_string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if df.column(name).is_ok() {
        string_column(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Synthetic history where pole sitters with high points usually win
    pub(crate) fn synthetic_observations(n_races: usize) -> Vec<Observation> {
        let nationalities = ["British", "Dutch", "Monegasque", "Spanish", "Australian"];
        let constructors = ["British", "Austrian", "Italian"];
        let countries = ["Australia", "China", "Japan", "Bahrain"];

        let mut observations = Vec::new();
        for race in 0..n_races {
            for slot in 0..10usize {
                let grid = (slot + 1) as f64;
                let points = (25.0 - grid * 2.0 + ((race * 7 + slot * 3) % 5) as f64).max(0.0);
                observations.push(Observation {
                    driver: format!("driver_{}", slot),
                    constructor: format!("team_{}", slot / 2),
                    nationality: nationalities[slot % nationalities.len()].to_string(),
                    nationality_constructor: constructors[(slot / 2) % constructors.len()]
                        .to_string(),
                    country: countries[race % countries.len()].to_string(),
                    grid,
                    qual_position_avg: grid + ((race + slot) % 3) as f64 * 0.5,
                    points_moving_avg: points,
                    circuit_wins: if slot == 0 { (race % 4) as f64 } else { 0.0 },
                    points_championship: points * 5.0,
                    position_championship: grid,
                    constructor_points_mean: points * 4.0,
                    constructor_points_std: if slot == 9 { None } else { Some(3.0) },
                    constructor_position_mean: (slot / 2 + 1) as f64,
                    won: slot == race % 2,
                });
            }
        }
        observations
    }

    #[test]
    fn test_required_columns() {
        let columns = required_columns();
        assert_eq!(columns.len(), 13);
        assert!(columns.contains(&"country"));
        assert!(columns.contains(&LABEL_COLUMN));
    }

    #[test]
    fn test_prepare_features_disjoint_splits() {
        let loader =
            HistoricalCsvLoader::from_observations(synthetic_observations(20), SplitConfig::default());
        let splits = loader.prepare_features().unwrap();

        // 200 observations: 30 test, 30 validation, 140 train
        assert_eq!(splits.test.len(), 30);
        assert_eq!(splits.validation.len(), 30);
        assert_eq!(splits.train.len(), 140);

        let (train, validation, test) = loader.split_indices().unwrap();
        for idx in &test {
            assert!(!train.contains(idx));
            assert!(!validation.contains(idx));
        }
        for idx in &validation {
            assert!(!train.contains(idx));
        }

        for vector in &splits.train.features {
            assert_eq!(vector.as_slice().len(), 12);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = HistoricalCsvLoader::from_observations(synthetic_observations(10), SplitConfig::default());
        let b = HistoricalCsvLoader::from_observations(synthetic_observations(10), SplitConfig::default());
        assert_eq!(a.split_indices().unwrap(), b.split_indices().unwrap());
    }

    #[test]
    fn test_too_few_observations() {
        let loader = HistoricalCsvLoader::from_observations(
            synthetic_observations(1).into_iter().take(3).collect(),
            SplitConfig::default(),
        );
        assert!(matches!(
            loader.prepare_features(),
            Err(PredictorError::FeatureBuild(_))
        ));
    }

    #[test]
    fn test_encoders_fitted_from_observations() {
        let loader =
            HistoricalCsvLoader::from_observations(synthetic_observations(4), SplitConfig::default());
        let encoders = loader.encoders();
        assert_eq!(encoders.get(CategoricalFeature::Nationality).len(), 5);
        assert_eq!(encoders.get(CategoricalFeature::ConstructorNationality).len(), 3);
        assert_eq!(encoders.get(CategoricalFeature::Country).len(), 4);
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "driverId,grid,qual_position_avg,points_moving_avg,circuit_wins,points_championship,\
             position_championship,constructor_points_mean,constructor_points_std,\
             constructor_position_mean,nationality,nationality_constructor,country,winner"
        )
        .unwrap();
        writeln!(file, "hamilton,1,1.5,20.5,3,180,1,150,10.5,1,British,German,China,1").unwrap();
        writeln!(file, "bottas,2,2.0,15,0,120,2,150,,1,Finnish,German,China,0").unwrap();
        file.flush().unwrap();

        let loader = HistoricalCsvLoader::load(file.path(), SplitConfig::default()).unwrap();
        let observations = loader.observations();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].driver, "hamilton");
        assert!(observations[0].won);
        assert!(!observations[1].won);
        assert_eq!(observations[0].constructor_points_std, Some(10.5));
        assert_eq!(observations[1].constructor_points_std, None);
        assert_eq!(observations[1].constructor, "");
    }

    #[test]
    fn test_load_csv_missing_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "grid,points_moving_avg,winner").unwrap();
        writeln!(file, "1,20,1").unwrap();
        file.flush().unwrap();

        let err = HistoricalCsvLoader::load(file.path(), SplitConfig::default())
            .err()
            .unwrap();
        match err {
            PredictorError::MissingColumns(columns) => {
                assert!(columns.contains(&"country".to_string()));
                assert!(columns.contains(&"qual_position_avg".to_string()));
                assert!(!columns.contains(&"grid".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
