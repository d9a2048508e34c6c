//! Feature Engineering
//!
//! Builds the twelve-column model input, either from historical observations
//! (training) or from the current grid and season results (prediction).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Index;

use crate::data::encoders::{CategoricalFeature, EncoderSet};
use crate::error::{validate_grid_position, Result};
use crate::models::{GridEntry, SeasonResult};

/// Number of model input columns
pub const FEATURE_COUNT: usize = 12;

/// Model input column names, in model order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "grid",
    "qual_position_avg",
    "points_moving_avg",
    "circuit_wins",
    "points_championship",
    "position_championship",
    "constructor_points_mean",
    "constructor_points_std",
    "constructor_position_mean",
    "nationality_encoded",
    "nationality_constructor_encoded",
    "country_encoded",
];

/// Points awarded per finishing position before flooring at zero
const POSITION_POINTS_BASE: f64 = 26.0;

/// Column positions in the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    Grid = 0,
    QualPositionAvg,
    PointsMovingAvg,
    CircuitWins,
    PointsChampionship,
    PositionChampionship,
    ConstructorPointsMean,
    ConstructorPointsStd,
    ConstructorPositionMean,
    NationalityEncoded,
    NationalityConstructorEncoded,
    CountryEncoded,
}

impl FeatureColumn {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    pub fn for_categorical(feature: CategoricalFeature) -> Self {
        match feature {
            CategoricalFeature::Nationality => FeatureColumn::NationalityEncoded,
            CategoricalFeature::ConstructorNationality => {
                FeatureColumn::NationalityConstructorEncoded
            }
            CategoricalFeature::Country => FeatureColumn::CountryEncoded,
        }
    }
}

/// Fixed-order numeric model input. An undefined constructor standard
/// deviation is stored as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl Index<FeatureColumn> for FeatureVector {
    type Output = f64;

    fn index(&self, column: FeatureColumn) -> &f64 {
        &self.0[column.index()]
    }
}

/// One driver's participation in one historical race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub driver: String,
    pub constructor: String,
    pub nationality: String,
    pub nationality_constructor: String,
    pub country: String,
    pub grid: f64,
    pub qual_position_avg: f64,
    pub points_moving_avg: f64,
    pub circuit_wins: f64,
    pub points_championship: f64,
    pub position_championship: f64,
    pub constructor_points_mean: f64,
    /// None when the constructor fielded a single driver
    pub constructor_points_std: Option<f64>,
    pub constructor_position_mean: f64,
    pub won: bool,
}

impl Observation {
    fn categorical_value(&self, feature: CategoricalFeature) -> &str {
        match feature {
            CategoricalFeature::Nationality => &self.nationality,
            CategoricalFeature::ConstructorNationality => &self.nationality_constructor,
            CategoricalFeature::Country => &self.country,
        }
    }
}

/// Per-driver features derived from the season snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFeatures {
    pub driver_id: String,
    pub driver_name: String,
    pub team_name: String,
    pub grid: u32,
    pub qual_position_avg: f64,
    pub points_moving_avg: f64,
    pub circuit_wins: f64,
    pub points_championship: f64,
    pub position_championship: f64,
    pub constructor_points_mean: f64,
    /// None for a single-driver team (no variance defined)
    pub constructor_points_std: Option<f64>,
    pub constructor_position_mean: f64,
    pub nationality_encoded: f64,
    pub nationality_constructor_encoded: f64,
    pub country_encoded: f64,
}

impl SnapshotFeatures {
    /// Convert features to the model input vector
    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector([
            self.grid as f64,
            self.qual_position_avg,
            self.points_moving_avg,
            self.circuit_wins,
            self.points_championship,
            self.position_championship,
            self.constructor_points_mean,
            self.constructor_points_std.unwrap_or(f64::NAN),
            self.constructor_position_mean,
            self.nationality_encoded,
            self.nationality_constructor_encoded,
            self.country_encoded,
        ])
    }
}

/// Driver id -> grid position set by the user
pub type GridOverrides = HashMap<String, u32>;

/// Constructor point statistics broadcast to each driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstructorStats {
    pub points_mean: f64,
    pub points_std: Option<f64>,
}

/// Score heuristic for a finishing position: 26 - p, floored at zero
pub fn points_from_position(position: u32) -> f64 {
    (POSITION_POINTS_BASE - position as f64).max(0.0)
}

/// Descending competition ranking: equal values share the best rank and the
/// next rank skips by the number of tied entries ([100, 100, 80] -> [1, 1, 3])
pub fn competition_rank_desc(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|&target| (values.iter().filter(|&&v| v > target).count() + 1) as f64)
        .collect()
}

/// Mean position score over a driver's season results, 0 without results
pub fn points_moving_average(driver_name: &str, results: &[SeasonResult]) -> f64 {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| r.driver_name == driver_name)
        .map(|r| points_from_position(r.position))
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Mean and sample standard deviation (n - 1)
pub fn mean_and_std(values: &[f64]) -> (f64, Option<f64>) {
    if values.is_empty() {
        return (f64::NAN, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, None);
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, Some(variance.sqrt()))
}

/// Feature construction for training and prediction
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Feature vector for a historical observation. All categorical fields,
    /// country included, go through the fitted encoders.
    pub fn from_observation(obs: &Observation, encoders: &EncoderSet) -> Result<FeatureVector> {
        let mut values = [
            obs.grid,
            obs.qual_position_avg,
            obs.points_moving_avg,
            obs.circuit_wins,
            obs.points_championship,
            obs.position_championship,
            obs.constructor_points_mean,
            obs.constructor_points_std.unwrap_or(f64::NAN),
            obs.constructor_position_mean,
            0.0,
            0.0,
            0.0,
        ];

        for feature in CategoricalFeature::ALL {
            let column = FeatureColumn::for_categorical(feature);
            values[column.index()] = encoders.encode(feature, obs.categorical_value(feature))?;
        }

        Ok(FeatureVector(values))
    }

    /// Feature matrix and win labels for a set of historical observations
    pub fn build_historical(
        observations: &[Observation],
        encoders: &EncoderSet,
    ) -> Result<(Vec<FeatureVector>, Vec<bool>)> {
        let mut features = Vec::with_capacity(observations.len());
        let mut labels = Vec::with_capacity(observations.len());

        for obs in observations {
            features.push(Self::from_observation(obs, encoders)?);
            labels.push(obs.won);
        }

        Ok((features, labels))
    }

    /// Grid positions by snapshot order (1..N), with user overrides applied.
    /// Overrides may produce duplicate positions; they are kept as given.
    pub fn grid_positions(grid: &[GridEntry], overrides: Option<&GridOverrides>) -> Result<Vec<u32>> {
        let mut positions: Vec<u32> = (1..=grid.len() as u32).collect();

        if let Some(overrides) = overrides {
            for (driver_id, &position) in overrides {
                validate_grid_position(position)?;
                match grid.iter().position(|e| &e.driver_id == driver_id) {
                    Some(idx) => positions[idx] = position,
                    None => tracing::warn!("Grid override for unknown driver {}", driver_id),
                }
            }
        }

        Ok(positions)
    }

    /// Team mean/std of `points`, broadcast back onto each driver
    pub fn constructor_stats(grid: &[GridEntry], points: &[f64]) -> Vec<ConstructorStats> {
        let mut by_team: HashMap<&str, Vec<f64>> = HashMap::new();
        for (entry, &p) in grid.iter().zip(points) {
            by_team.entry(entry.team_name.as_str()).or_default().push(p);
        }

        let team_stats: HashMap<&str, ConstructorStats> = by_team
            .into_iter()
            .map(|(team, values)| {
                let (points_mean, points_std) = mean_and_std(&values);
                (
                    team,
                    ConstructorStats {
                        points_mean,
                        points_std,
                    },
                )
            })
            .collect();

        grid.iter()
            .map(|entry| team_stats[entry.team_name.as_str()])
            .collect()
    }

    /// Create snapshot features for every driver on the current grid
    pub fn build_snapshot(
        grid: &[GridEntry],
        results: &[SeasonResult],
        overrides: Option<&GridOverrides>,
        encoders: &EncoderSet,
    ) -> Result<Vec<SnapshotFeatures>> {
        if grid.is_empty() {
            return Ok(Vec::new());
        }

        let positions = Self::grid_positions(grid, overrides)?;

        let points: Vec<f64> = grid
            .iter()
            .map(|e| points_moving_average(&e.driver_name, results))
            .collect();
        let championship_ranks = competition_rank_desc(&points);

        let constructor = Self::constructor_stats(grid, &points);
        let team_means: Vec<f64> = constructor.iter().map(|c| c.points_mean).collect();
        let constructor_ranks = competition_rank_desc(&team_means);

        grid.iter()
            .enumerate()
            .map(|(i, entry)| {
                Ok(SnapshotFeatures {
                    driver_id: entry.driver_id.clone(),
                    driver_name: entry.driver_name.clone(),
                    team_name: entry.team_name.clone(),
                    grid: positions[i],
                    // No qualifying history at prediction time; grid stands in
                    qual_position_avg: positions[i] as f64,
                    points_moving_avg: points[i],
                    circuit_wins: 0.0,
                    points_championship: points[i],
                    position_championship: championship_ranks[i],
                    constructor_points_mean: constructor[i].points_mean,
                    constructor_points_std: constructor[i].points_std,
                    constructor_position_mean: constructor_ranks[i],
                    nationality_encoded: encoders
                        .encode_snapshot(CategoricalFeature::Nationality, entry)?,
                    nationality_constructor_encoded: encoders
                        .encode_snapshot(CategoricalFeature::ConstructorNationality, entry)?,
                    country_encoded: encoders.encode_snapshot(CategoricalFeature::Country, entry)?,
                })
            })
            .collect()
    }
}

/// Get feature column names in model order
pub fn get_feature_names() -> Vec<&'static str> {
    FEATURE_NAMES.to_vec()
}
