use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Driver seat on the current grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEntry {
    pub driver_id: String,
    pub driver_name: String,
    pub team_name: String,
    pub nationality: String,
    pub constructor_nationality: String,
}

/// Finishing result from the current season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonResult {
    pub driver_name: String,
    pub position: u32,
    pub date: NaiveDate,
}

/// One row of a race forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacePrediction {
    pub driver: String,
    pub team: String,
    pub grid: u32,
    pub win_probability: f64,
    pub championship_points: f64,
}

/// Ranked forecast for a race, most likely winner first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceForecast {
    pub circuit: String,
    pub predictions: Vec<RacePrediction>,
}

impl RaceForecast {
    /// Most likely winner, if the grid was not empty
    pub fn favourite(&self) -> Option<&RacePrediction> {
        self.predictions.first()
    }

    /// Top `n` rows (fewer if the grid is smaller)
    pub fn top(&self, n: usize) -> &[RacePrediction] {
        &self.predictions[..n.min(self.predictions.len())]
    }
}

/// Feature importance entry (mean decrease in impurity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}
