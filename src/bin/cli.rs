//! F1 Predictor CLI - Command-line interface for race-win predictions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use f1_predictor::calendar::{calendar_2025, find_race};
use f1_predictor::data::{GridOverrides, HistoricalCsvLoader};
use f1_predictor::predictor::{AutoloadOutcome, F1Predictor, ModelStatus, SaveOutcome};
use f1_predictor::{FeatureImportance, PredictorConfig, RaceForecast, TrainingMetrics};

#[derive(Parser)]
#[command(name = "f1-predictor")]
#[command(author, version, about = "Formula 1 race-win prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Directory holding the historical and 2025 season CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path of the saved model bundle
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model on historical data and save it
    Train {
        /// Keep the trained model in memory only
        #[arg(long)]
        no_save: bool,
    },

    /// Predict win probabilities for a race
    Predict {
        /// Grand prix name or location (e.g. "Monaco" or "Suzuka")
        #[arg(short, long)]
        circuit: String,

        /// Grid position override, repeatable (e.g. --grid norris=3)
        #[arg(short, long, value_parser = parse_grid_override)]
        grid: Vec<(String, u32)>,

        /// Number of drivers to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Show feature importance of the saved model
    Importance,

    /// Show recent 2025 results for a driver
    Results {
        /// Driver name as listed on the grid
        #[arg(short, long)]
        driver: String,
    },

    /// List the 2025 race calendar
    Calendar,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    println!("{}", "F1 Race Predictor".red().bold());
    println!();

    // Environment first, then flags
    let mut config = PredictorConfig::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(model_path) = cli.model_path {
        config.model_path = model_path;
    }

    if cli.interactive {
        run_interactive(&config)?;
    } else if let Some(command) = cli.command {
        match command {
            Commands::Train { no_save } => {
                let predictor = open_predictor(&config)?;
                run_train(&predictor, &config, !no_save)?;
            }
            Commands::Predict { circuit, grid, top } => {
                let predictor = open_predictor(&config)?;
                if autoload(&predictor, &config) {
                    let overrides: GridOverrides = grid.into_iter().collect();
                    predict_race(&predictor, &circuit, &overrides, top)?;
                }
            }
            Commands::Importance => {
                let predictor = open_predictor(&config)?;
                if autoload(&predictor, &config) {
                    show_importance(&predictor)?;
                }
            }
            Commands::Results { driver } => {
                let predictor = open_predictor(&config)?;
                show_driver_results(&predictor, &driver);
            }
            Commands::Calendar => show_calendar(),
        }
    } else {
        println!("Use --help for usage information or --interactive for interactive mode.");
    }

    Ok(())
}

/// Parse `DRIVER_ID=POSITION`
fn parse_grid_override(s: &str) -> std::result::Result<(String, u32), String> {
    let (driver, position) = s
        .split_once('=')
        .ok_or_else(|| format!("expected DRIVER_ID=POSITION, got {:?}", s))?;
    let position: u32 = position
        .trim()
        .parse()
        .map_err(|e| format!("invalid grid position {:?}: {}", position, e))?;
    if position == 0 {
        return Err("grid positions start at 1".to_string());
    }
    Ok((driver.trim().to_string(), position))
}

fn open_predictor(config: &PredictorConfig) -> Result<F1Predictor> {
    F1Predictor::from_config(config)
        .with_context(|| format!("Failed to load 2025 season data from {:?}", config.data_dir))
}

/// Load the saved bundle, printing a hint when there is none
fn autoload(predictor: &F1Predictor, config: &PredictorConfig) -> bool {
    match predictor.try_autoload(&config.model_path) {
        AutoloadOutcome::Loaded => true,
        AutoloadOutcome::NotLoaded(_) => {
            println!(
                "{} No usable model at {:?}. Run `f1-predictor train` first.",
                "!".yellow().bold(),
                config.model_path
            );
            false
        }
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn run_train(predictor: &F1Predictor, config: &PredictorConfig, save: bool) -> Result<()> {
    let csv_path = config.historical_path();
    let pb = spinner("Loading historical data...")?;
    let loader = HistoricalCsvLoader::load(&csv_path, config.split)
        .with_context(|| format!("Failed to load historical data from {:?}", csv_path))?;

    pb.set_message(format!(
        "Training {} trees on {} observations...",
        config.forest.n_trees,
        loader.observations().len()
    ));
    let metrics = predictor.train(&loader).context("Training failed")?;
    pb.finish_and_clear();

    println!("{}", "Model trained".green().bold());
    println!();
    print_metrics(&metrics);

    if save {
        match predictor
            .save(&config.model_path)
            .with_context(|| format!("Failed to save model to {:?}", config.model_path))?
        {
            SaveOutcome::Saved(path) => println!("{} {:?}", "Saved model to".green(), path),
            SaveOutcome::Skipped => println!("{}", "Nothing to save".yellow()),
        }
    }

    Ok(())
}

fn print_metrics(metrics: &TrainingMetrics) {
    let auc = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v));

    println!("{}", "Performance:".yellow().bold());
    println!("{:<12} {:>8} {:>6} {:>9} {:>8}", "Split", "Samples", "Wins", "Accuracy", "ROC-AUC");
    println!("{}", "-".repeat(47));
    for (name, split) in [
        ("Train", &metrics.train),
        ("Validation", &metrics.validation),
        ("Test", &metrics.test),
    ] {
        println!(
            "{:<12} {:>8} {:>6} {:>9.3} {:>8}",
            name,
            split.samples,
            split.wins,
            split.accuracy,
            auc(split.roc_auc)
        );
    }
    println!();
    println!(
        "Test win class: precision {:.3}, recall {:.3}, F1 {:.3}",
        metrics.test_report.precision, metrics.test_report.recall, metrics.test_report.f1
    );
    println!();
    print_importance(&metrics.feature_importance);
}

fn print_importance(importance: &[FeatureImportance]) {
    println!("{}", "Feature importance:".yellow().bold());
    for row in importance {
        let bar = "█".repeat((row.importance * 50.0).round() as usize);
        println!("{:<32} {:>6.3} {}", row.feature, row.importance, bar.cyan());
    }
}

fn show_importance(predictor: &F1Predictor) -> Result<()> {
    if let ModelStatus::Trained(info) = predictor.status()? {
        println!(
            "Model: {} trees, trained {}",
            info.n_trees,
            info.trained_at.format("%Y-%m-%d %H:%M UTC")
        );
        println!();
    }
    match predictor.feature_importance()? {
        Some(importance) => print_importance(&importance),
        None => println!("{}", "No trained model.".red()),
    }
    Ok(())
}

/// Calendar grand prix name for a query, or the query itself
fn resolve_circuit(query: &str) -> String {
    find_race(query)
        .map(|race| race.grand_prix)
        .unwrap_or_else(|| query.trim().to_string())
}

fn predict_race(
    predictor: &F1Predictor,
    circuit: &str,
    overrides: &GridOverrides,
    top: usize,
) -> Result<()> {
    let circuit = resolve_circuit(circuit);
    println!("{}: {}", "Predicting".green(), circuit);
    println!();

    let overrides = (!overrides.is_empty()).then_some(overrides);
    let Some(forecast) = predictor
        .predict(&circuit, overrides)
        .with_context(|| format!("Failed to predict {}", circuit))?
    else {
        println!("{}", "No trained model.".red());
        return Ok(());
    };

    print_forecast(&forecast, top);
    Ok(())
}

fn print_forecast(forecast: &RaceForecast, top: usize) {
    if forecast.predictions.is_empty() {
        println!("{}", "No drivers on the grid.".red());
        return;
    }

    println!("{}", "Win probabilities:".yellow().bold());
    println!(
        "{:>4} {:<22} {:<18} {:>4} {:>8} {:>7}",
        "Pos", "Driver", "Team", "Grid", "Win %", "Points"
    );
    println!("{}", "-".repeat(68));

    for (i, row) in forecast.top(top).iter().enumerate() {
        let pct = format!("{:>7.1}%", row.win_probability * 100.0);
        let pct = if i == 0 { pct.green().bold() } else { pct.normal() };
        println!(
            "{:>4} {:<22} {:<18} {:>4} {} {:>7.1}",
            i + 1,
            truncate_name(&row.driver, 22),
            truncate_name(&row.team, 18),
            row.grid,
            pct,
            row.championship_points
        );
    }

    if let Some(favourite) = forecast.favourite() {
        println!();
        println!(
            "{} {} ({:.1}%)",
            "Predicted winner:".cyan().bold(),
            favourite.driver.bold(),
            favourite.win_probability * 100.0
        );
    }
}

fn show_driver_results(predictor: &F1Predictor, driver: &str) {
    let results = predictor.driver_recent_results(driver);
    if results.is_empty() {
        println!("{} {}", "No 2025 results for".red(), driver);
        return;
    }

    println!("{} {}", "Recent results:".yellow().bold(), driver);
    println!("{:<12} {:>8}", "Date", "Position");
    println!("{}", "-".repeat(21));
    for result in results {
        println!("{:<12} {:>8}", result.date.format("%Y-%m-%d"), result.position);
    }
}

fn show_calendar() {
    println!("{}", "2025 Calendar:".yellow().bold());
    for race in calendar_2025() {
        let line = format!(
            "{:>2}. {:<28} {:<18} {}",
            race.round, race.grand_prix, race.location, race.date_label
        );
        if race.completed {
            println!("{} {}", line.dimmed(), "(completed)".dimmed());
        } else {
            println!("{}", line);
        }
    }
}

fn run_interactive(config: &PredictorConfig) -> Result<()> {
    println!("{}", "Interactive mode".green().bold());
    println!();

    let predictor = open_predictor(config)?;
    autoload(&predictor, config);

    let theme = ColorfulTheme::default();

    loop {
        let options = vec![
            "Predict a race",
            "Train model",
            "Feature importance",
            "Driver results",
            "Quit",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => {
                let races = calendar_2025();
                let labels: Vec<String> = races.iter().map(|r| r.label()).collect();
                let default = races.iter().position(|r| !r.completed).unwrap_or(0);

                let race = Select::with_theme(&theme)
                    .with_prompt("Race")
                    .items(&labels)
                    .default(default)
                    .interact()?;

                let edit_grid = Select::with_theme(&theme)
                    .with_prompt("Edit grid positions?")
                    .items(&["No", "Yes"])
                    .default(0)
                    .interact()?
                    == 1;

                let mut overrides = GridOverrides::new();
                if edit_grid {
                    for (i, entry) in predictor.season().grid().iter().enumerate() {
                        let default_position = i as u32 + 1;
                        let position: u32 = Input::with_theme(&theme)
                            .with_prompt(format!("{} ({})", entry.driver_name, entry.team_name))
                            .default(default_position)
                            .validate_with(|p: &u32| {
                                if *p >= 1 {
                                    Ok(())
                                } else {
                                    Err("grid positions start at 1")
                                }
                            })
                            .interact_text()?;
                        if position != default_position {
                            overrides.insert(entry.driver_id.clone(), position);
                        }
                    }
                }

                println!();
                predict_race(&predictor, &races[race].grand_prix, &overrides, 20)?;
                println!();
            }
            1 => {
                println!();
                run_train(&predictor, config, true)?;
                println!();
            }
            2 => {
                println!();
                show_importance(&predictor)?;
                println!();
            }
            3 => {
                let drivers: Vec<&str> = predictor
                    .season()
                    .grid()
                    .iter()
                    .map(|e| e.driver_name.as_str())
                    .collect();
                if drivers.is_empty() {
                    println!("{}", "No drivers on the grid.".red());
                    continue;
                }

                let driver = Select::with_theme(&theme)
                    .with_prompt("Driver")
                    .items(&drivers)
                    .default(0)
                    .interact()?;

                println!();
                show_driver_results(&predictor, drivers[driver]);
                println!();
            }
            4 => {
                println!("Goodbye!");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grid_override() {
        assert_eq!(
            parse_grid_override("norris=3").unwrap(),
            ("norris".to_string(), 3)
        );
        assert_eq!(
            parse_grid_override(" max_verstappen = 1 ").unwrap(),
            ("max_verstappen".to_string(), 1)
        );
        assert!(parse_grid_override("norris").is_err());
        assert!(parse_grid_override("norris=first").is_err());
        assert!(parse_grid_override("norris=0").is_err());
    }

    #[test]
    fn test_resolve_circuit() {
        assert_eq!(resolve_circuit("Suzuka"), "Japanese Grand Prix");
        assert_eq!(resolve_circuit("monaco"), "Monaco Grand Prix");
        assert_eq!(resolve_circuit(" Kyalami "), "Kyalami");
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("Lando Norris", 22), "Lando Norris");
        assert_eq!(truncate_name("Andrea Kimi Antonelli", 10), "Andrea Ki…");
    }
}
