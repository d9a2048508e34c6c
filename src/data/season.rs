//! Current-season snapshot: grid line-up and results so far

use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

use crate::error::{PredictorError, Result};
use crate::models::{GridEntry, SeasonResult};

pub const GRID_FILE: &str = "f1_2025_grid.csv";
pub const RESULTS_FILE: &str = "f1_2025_results.csv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Grid and results for the season being predicted
#[derive(Debug, Clone, Default)]
pub struct SeasonSnapshot {
    grid: Vec<GridEntry>,
    results: Vec<SeasonResult>,
}

impl SeasonSnapshot {
    pub fn new(grid: Vec<GridEntry>, results: Vec<SeasonResult>) -> Self {
        Self { grid, results }
    }

    /// Load `f1_2025_grid.csv` and `f1_2025_results.csv` from a data directory
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let grid = Self::load_grid(data_dir.join(GRID_FILE))?;
        let results = Self::load_results(data_dir.join(RESULTS_FILE))?;

        tracing::info!(
            "Loaded season snapshot: {} drivers, {} results",
            grid.len(),
            results.len()
        );
        Ok(Self { grid, results })
    }

    pub fn load_grid<P: AsRef<Path>>(csv_path: P) -> Result<Vec<GridEntry>> {
        let df = read_csv(csv_path.as_ref())?;

        let driver_id = df.column("driverId")?.cast(&DataType::String)?;
        let driver_name = df.column("driver_name")?.cast(&DataType::String)?;
        let team_name = df.column("team_name")?.cast(&DataType::String)?;
        let nationality = df.column("nationality")?.cast(&DataType::String)?;
        let constructor_nationality = df.column("constructor_nationality")?.cast(&DataType::String)?;

        let (driver_id, driver_name, team_name, nationality, constructor_nationality) = (
            driver_id.str()?,
            driver_name.str()?,
            team_name.str()?,
            nationality.str()?,
            constructor_nationality.str()?,
        );

        let mut grid = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            grid.push(GridEntry {
                driver_id: required(driver_id.get(i), "driverId", i)?,
                driver_name: required(driver_name.get(i), "driver_name", i)?,
                team_name: required(team_name.get(i), "team_name", i)?,
                nationality: required(nationality.get(i), "nationality", i)?,
                constructor_nationality: required(
                    constructor_nationality.get(i),
                    "constructor_nationality",
                    i,
                )?,
            });
        }

        Ok(grid)
    }

    pub fn load_results<P: AsRef<Path>>(csv_path: P) -> Result<Vec<SeasonResult>> {
        let df = read_csv(csv_path.as_ref())?;

        let driver_name = df.column("driver_name")?.cast(&DataType::String)?;
        let position = df.column("position")?.cast(&DataType::Int64)?;
        let date = df.column("date")?.cast(&DataType::String)?;

        let (driver_name, position, date) = (driver_name.str()?, position.i64()?, date.str()?);

        let mut results = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            // Rows without a classified position (DNF etc.) carry no score
            let (Some(name), Some(pos), Some(raw_date)) =
                (driver_name.get(i), position.get(i), date.get(i))
            else {
                continue;
            };

            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
                PredictorError::FeatureBuild(format!(
                    "invalid result date {:?} at row {}: {}",
                    raw_date, i, e
                ))
            })?;

            let position = u32::try_from(pos)
                .ok()
                .filter(|&p| p >= 1)
                .ok_or_else(|| {
                    PredictorError::FeatureBuild(format!(
                        "invalid finishing position {} at row {}",
                        pos, i
                    ))
                })?;

            results.push(SeasonResult {
                driver_name: name.to_string(),
                position,
                date,
            });
        }

        Ok(results)
    }

    pub fn grid(&self) -> &[GridEntry] {
        &self.grid
    }

    pub fn results(&self) -> &[SeasonResult] {
        &self.results
    }

    /// A driver's results this season, most recent first
    pub fn driver_recent_results(&self, driver_name: &str) -> Vec<&SeasonResult> {
        let mut results: Vec<&SeasonResult> = self
            .results
            .iter()
            .filter(|r| r.driver_name == driver_name)
            .collect();
        results.sort_by(|a, b| b.date.cmp(&a.date));
        results
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }
}

fn required(value: Option<&str>, column: &str, row: usize) -> Result<String> {
    value.map(str::to_string).ok_or_else(|| {
        PredictorError::FeatureBuild(format!("null value in column {} at row {}", column, row))
    })
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_snapshot_files(dir: &Path) {
        fs::write(
            dir.join(GRID_FILE),
            "driverId,driver_name,team_name,nationality,constructor_nationality\n\
             norris,Lando Norris,McLaren,British,British\n\
             piastri,Oscar Piastri,McLaren,Australian,British\n\
             max_verstappen,Max Verstappen,Red Bull,Dutch,Austrian\n",
        )
        .unwrap();
        fs::write(
            dir.join(RESULTS_FILE),
            "driver_name,position,date\n\
             Lando Norris,1,2025-03-16\n\
             Max Verstappen,2,2025-03-16\n\
             Lando Norris,2,2025-03-23\n\
             Oscar Piastri,,2025-03-23\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot_files(dir.path());

        let snapshot = SeasonSnapshot::load(dir.path()).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.grid()[0].driver_id, "norris");
        assert_eq!(snapshot.grid()[2].team_name, "Red Bull");
        // The unclassified row is skipped
        assert_eq!(snapshot.results().len(), 3);
    }

    #[test]
    fn test_driver_recent_results_sorted_desc() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot_files(dir.path());
        let snapshot = SeasonSnapshot::load(dir.path()).unwrap();

        let recent = snapshot.driver_recent_results("Lando Norris");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].position, 2);
        assert_eq!(recent[0].date, NaiveDate::from_ymd_opt(2025, 3, 23).unwrap());
        assert!(snapshot.driver_recent_results("Oscar Piastri").is_empty());
    }

    #[test]
    fn test_load_grid_rejects_null_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GRID_FILE);
        fs::write(
            &path,
            "driverId,driver_name,team_name,nationality,constructor_nationality\n\
             norris,Lando Norris,McLaren,British,British\n\
             ,Oscar Piastri,McLaren,Australian,British\n",
        )
        .unwrap();

        let err = SeasonSnapshot::load_grid(&path).unwrap_err();
        assert!(matches!(err, PredictorError::FeatureBuild(_)));
        let message = err.to_string();
        assert!(message.contains("driverId"));
        assert!(message.contains("row 1"));
    }

    #[test]
    fn test_load_results_rejects_invalid_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        for bad in ["-3", "0", "4294967296"] {
            fs::write(
                &path,
                format!(
                    "driver_name,position,date\n\
                     Lando Norris,1,2025-03-16\n\
                     Max Verstappen,{},2025-03-16\n",
                    bad
                ),
            )
            .unwrap();

            let err = SeasonSnapshot::load_results(&path).unwrap_err();
            assert!(matches!(err, PredictorError::FeatureBuild(_)));
            let message = err.to_string();
            assert!(message.contains(bad));
            assert!(message.contains("row 1"));
        }
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SeasonSnapshot::load(dir.path().join("nope")).is_err());
    }
}
