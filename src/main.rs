//! WNBA Prediction CLI
//!
//! Ingest results and schedules, predict score differentials and grade them.

use clap::{Parser, Subcommand};
use wnba::{Config, Result};

#[derive(Parser)]
#[command(name = "wnba")]
#[command(about = "WNBA score differential prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Game results commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Upcoming schedule commands
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommands,
    },
    /// Predict scheduled games with the Elo ridge model
    Predict {
        /// Date of games to predict (YYYY-MM-DD)
        date: String,
        #[command(flatten)]
        sim: SimulationArgs,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Predict scheduled games with the bias-corrected model
    PredictBias {
        /// Date of games to predict (YYYY-MM-DD)
        date: String,
        #[command(flatten)]
        sim: SimulationArgs,
        /// Decay constant for past prediction errors, in days
        #[arg(long)]
        decay_days: Option<f64>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Compare stored predictions with final scores
    Evaluate {
        /// Show every graded game
        #[arg(long)]
        details: bool,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Fetch today's scoreboard and upsert scores
    Results,
    /// Fetch completed games for recent days
    Backfill {
        /// Number of days back from today
        #[arg(long, default_value = "90")]
        days: u32,
    },
    /// Scrape historical seasons from the archive
    History {
        /// First season (defaults to config)
        #[arg(long)]
        start_year: Option<u16>,
        /// Last season, inclusive (defaults to config)
        #[arg(long)]
        end_year: Option<u16>,
        /// Cache directory for HTML files
        #[arg(long)]
        cache: Option<String>,
        /// Use only cached files (no network requests)
        #[arg(long)]
        offline: bool,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Fetch upcoming games
    Fetch {
        /// Number of days to fetch
        #[arg(long, default_value = "90")]
        days: u32,
        /// First day (defaults to today)
        #[arg(long)]
        start: Option<String>,
    },
    /// Delete schedule rows on or after a date
    Clear {
        /// First day to delete (defaults to today)
        #[arg(long)]
        from: Option<String>,
    },
}

#[derive(clap::Args)]
struct SimulationArgs {
    /// Scale applied to the residual spread
    #[arg(long)]
    std_multiplier: Option<f64>,
    /// Confidence interval percentile bounds
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    ci: Option<Vec<f64>>,
    /// RNG seed for reproducible simulations
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or fall back to defaults
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Results => commands::data_results(&config),
            DataCommands::Backfill { days } => commands::data_backfill(&config, days),
            DataCommands::History {
                start_year,
                end_year,
                cache,
                offline,
            } => commands::data_history(&config, start_year, end_year, cache, offline),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Schedule { action } => match action {
            ScheduleCommands::Fetch { days, start } => {
                commands::schedule_fetch(&config, days, start)
            }
            ScheduleCommands::Clear { from } => commands::schedule_clear(&config, from),
        },
        Commands::Predict { date, sim, format } => {
            commands::predict(&config, &date, &sim, format)
        }
        Commands::PredictBias {
            date,
            sim,
            decay_days,
            format,
        } => commands::predict_bias(&config, &date, &sim, decay_days, format),
        Commands::Evaluate { details, format } => commands::evaluate(&config, details, format),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use wnba::data::scrapers::{BasketballReferenceScraper, Scraper};
    use wnba::data::{Database, EspnClient, UpsertOutcome};
    use wnba::model::ConfidenceBounds;
    use wnba::predict::{self, format_prediction, PredictOptions, PredictionRun};
    use wnba::{evaluation, parse_date, PredictionRecord};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        if let Some(dir) = std::path::Path::new(&config.data.database_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
                println!("Created {}/ directory", dir.display());
            }
        }

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'wnba data history' to load past seasons");
        println!("  3. Run 'wnba schedule fetch' to load upcoming games");
        println!("  4. Run 'wnba predict YYYY-MM-DD' to predict a day's games");

        Ok(())
    }

    fn espn_client(config: &Config) -> Result<EspnClient> {
        EspnClient::new(&config.espn, config.timezone()?)
    }

    pub fn data_results(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = espn_client(config)?;

        let games = client.fetch_results(None, false)?;
        println!("Fetched {} games from the scoreboard", games.len());

        let (mut inserted, mut updated, mut unchanged) = (0, 0, 0);
        for game in &games {
            match db.upsert_live_game(game) {
                Ok(UpsertOutcome::Inserted) => inserted += 1,
                Ok(UpsertOutcome::Updated) => updated += 1,
                Ok(UpsertOutcome::Unchanged) => unchanged += 1,
                Err(e) => log::error!(
                    "Failed to store {} vs {} on {}: {}",
                    game.home_team,
                    game.away_team,
                    game.date,
                    e
                ),
            }
        }

        println!(
            "Inserted {}, updated {}, unchanged {}",
            inserted, updated, unchanged
        );
        Ok(())
    }

    pub fn data_backfill(config: &Config, days: u32) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = espn_client(config)?;
        let today = config.today()?;

        let mut total = 0;
        for offset in 0..days {
            let date = today - Duration::days(offset as i64);
            log::info!("Fetching results for {}...", date);
            match client.fetch_results(Some(date), true) {
                Ok(games) => total += db.insert_games(&games)?,
                Err(e) => log::warn!("Failed to fetch results for {}: {}", date, e),
            }
        }

        println!("Stored {} new games from the last {} days", total, days);
        Ok(())
    }

    pub fn data_history(
        config: &Config,
        start_year: Option<u16>,
        end_year: Option<u16>,
        cache: Option<String>,
        offline: bool,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let start = start_year.unwrap_or(config.archive.start_year);
        let end = end_year.unwrap_or(config.archive.end_year);
        if start > end {
            return Err(wnba::WnbaError::Config(format!(
                "start year {} is after end year {}",
                start, end
            )));
        }

        let mut scraper = BasketballReferenceScraper::new(
            &config.archive,
            &config.espn.user_agent,
            config.espn.timeout_secs,
        )?;
        if let Some(cache_dir) = cache.or_else(|| config.data.cache_dir.clone()) {
            println!("Using cache directory: {}", cache_dir);
            scraper = scraper.with_cache(&cache_dir);
        }
        if offline {
            println!("Offline mode: using cached files only");
            scraper = scraper.offline_only(true);
        }

        println!("Scraping seasons {} to {}...", start, end);
        let games = scraper.fetch_seasons(start, end);
        println!("Fetched {} games", games.len());

        if games.is_empty() {
            println!("No games found. Check the parser or cache directory.");
            return Ok(());
        }

        let count = db.insert_games(&games)?;
        println!("Stored {} new games in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!(
            "  Games:       {} ({} completed)",
            stats.game_count, stats.completed_count
        );
        println!("  Scheduled:   {}", stats.schedule_count);
        println!("  Predictions: {}", stats.prediction_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:       {} to {}", earliest, latest);
        }

        Ok(())
    }

    fn date_or_today(config: &Config, value: Option<String>) -> Result<NaiveDate> {
        match value {
            Some(v) => parse_date(&v),
            None => config.today(),
        }
    }

    pub fn schedule_fetch(config: &Config, days: u32, start: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = espn_client(config)?;
        let start = date_or_today(config, start)?;

        let mut total = 0;
        for offset in 0..days {
            let date = start + Duration::days(offset as i64);
            log::info!("Fetching {}...", date);
            match client.fetch_schedule(date) {
                Ok(games) => total += db.insert_schedule(&games)?,
                Err(e) => log::warn!("Failed to fetch schedule for {}: {}", date, e),
            }
        }

        println!("Stored {} new scheduled games", total);
        Ok(())
    }

    pub fn schedule_clear(config: &Config, from: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let from = date_or_today(config, from)?;
        let removed = db.clear_schedule_from(from)?;
        println!("Removed {} scheduled games from {} onwards", removed, from);
        Ok(())
    }

    fn predict_options(
        sim: &SimulationArgs,
        default_multiplier: f64,
        default_bounds: (f64, f64),
        default_seed: Option<u64>,
    ) -> Result<PredictOptions> {
        let (low, high) = match sim.ci.as_deref() {
            Some([low, high]) => (*low, *high),
            Some(other) => {
                return Err(wnba::WnbaError::Config(format!(
                    "--ci takes two values, got {}",
                    other.len()
                )))
            }
            None => default_bounds,
        };

        Ok(PredictOptions {
            std_multiplier: sim.std_multiplier.unwrap_or(default_multiplier),
            bounds: ConfidenceBounds::new(low, high)?,
            seed: sim.seed.or(default_seed),
        })
    }

    pub fn predict(
        config: &Config,
        date: &str,
        sim: &SimulationArgs,
        format: OutputFormat,
    ) -> Result<()> {
        let date = parse_date(date)?;
        let prediction = &config.prediction;
        let options = predict_options(
            sim,
            prediction.std_multiplier,
            (prediction.ci_low, prediction.ci_high),
            prediction.seed,
        )?;

        let db = Database::open(&config.data.database_path)?;
        let run = predict::run_elo_ridge(&db, prediction, date, &options)?;
        print_run(date, &run, format)
    }

    pub fn predict_bias(
        config: &Config,
        date: &str,
        sim: &SimulationArgs,
        decay_days: Option<f64>,
        format: OutputFormat,
    ) -> Result<()> {
        let date = parse_date(date)?;
        let mut bias = config.bias.clone();
        if let Some(d) = decay_days {
            bias.decay_days = d;
        }
        let options = predict_options(
            sim,
            config.prediction.std_multiplier,
            (bias.ci_low, bias.ci_high),
            config.prediction.seed,
        )?;

        let db = Database::open(&config.data.database_path)?;
        let run = predict::run_bias_corrected(
            &db,
            &bias,
            config.prediction.ridge_alpha,
            config.prediction.simulations,
            date,
            config.today()?,
            &options,
        )?;
        print_run(date, &run, format)
    }

    fn print_run(date: NaiveDate, run: &PredictionRun, format: OutputFormat) -> Result<()> {
        if run.scheduled == 0 {
            println!("No scheduled games found for {}", date);
            return Ok(());
        }

        match format {
            OutputFormat::Table => {
                println!("Scheduled games on {}: {}", date, run.scheduled);
                for prediction in &run.predictions {
                    println!("\n{}", format_prediction(prediction));
                }
                if run.skipped > 0 {
                    println!("\nSkipped {} games without team history", run.skipped);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&run.predictions)?);
            }
            OutputFormat::Csv => {
                println!(
                    "date,home,away,home_score,away_score,diff,win_prob,conf_low,conf_high,model"
                );
                for p in &run.predictions {
                    println!("{}", csv_row(p));
                }
            }
        }

        Ok(())
    }

    fn csv_row(p: &PredictionRecord) -> String {
        format!(
            "{},{},{},{},{},{:.2},{:.3},{:.2},{:.2},{}",
            p.date,
            p.home_team,
            p.away_team,
            p.predicted_home_score,
            p.predicted_away_score,
            p.predicted_diff,
            p.win_probability,
            p.conf_low,
            p.conf_high,
            p.model
        )
    }

    pub fn evaluate(config: &Config, details: bool, format: OutputFormat) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let evaluation = evaluation::evaluate(&db)?;

        let report = match &evaluation.report {
            Some(r) => r,
            None => {
                println!("No predictions matched with completed games yet.");
                return Ok(());
            }
        };

        match format {
            OutputFormat::Json => {
                let json = if details {
                    serde_json::json!({ "summary": report, "games": evaluation.rows })
                } else {
                    serde_json::json!({ "summary": report })
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                if details {
                    print!("{}", evaluation::details_csv(&evaluation.rows));
                } else {
                    print!("{}", evaluation::summary_csv(report));
                }
            }
            OutputFormat::Table => {
                if details {
                    println!("Recent Predictions:");
                    print!("{}", evaluation::format_details(&evaluation.rows));
                    println!();
                }
                println!("Evaluation Summary:");
                println!("{}", report);
            }
        }

        Ok(())
    }
}
