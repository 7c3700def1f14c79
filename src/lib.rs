//! WNBA score differential prediction
//!
//! Batch pipeline: ingest results and schedules, fit a regression on team
//! strength features, simulate outcomes and evaluate against real results.

pub mod data;
pub mod evaluation;
pub mod features;
pub mod model;
pub mod predict;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Date format used for every date column in the database
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of game data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Espn,
    BasketballReference,
}

impl DataSource {
    /// Value stored in the `source` column
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Espn => "espn",
            DataSource::BasketballReference => "basketball_reference",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "espn" => Some(DataSource::Espn),
            "basketball_reference" => Some(DataSource::BasketballReference),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Espn => write!(f, "ESPN"),
            DataSource::BasketballReference => write!(f, "Basketball Reference"),
        }
    }
}

/// A game row as ingested; scores are missing until the game has been played
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub source: Option<DataSource>,
}

impl GameRecord {
    /// Returns the completed game if both scores are known
    pub fn completed(&self) -> Option<CompletedGame> {
        match (self.home_score, self.away_score) {
            (Some(home_score), Some(away_score)) => Some(CompletedGame {
                date: self.date,
                home_team: self.home_team.clone(),
                away_team: self.away_team.clone(),
                home_score,
                away_score,
            }),
            _ => None,
        }
    }
}

/// A game with a final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedGame {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u16,
    pub away_score: u16,
}

impl CompletedGame {
    /// Home score minus away score
    pub fn score_diff(&self) -> f64 {
        self.home_score as f64 - self.away_score as f64
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// Points scored by the given team, if it played in this game
    pub fn points_for(&self, team: &str) -> Option<u16> {
        if team == self.home_team {
            Some(self.home_score)
        } else if team == self.away_team {
            Some(self.away_score)
        } else {
            None
        }
    }
}

/// An upcoming game from the schedule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    /// Kickoff in UTC, RFC 3339
    pub game_time: Option<String>,
    /// Kickoff in the configured local timezone, RFC 3339
    pub game_time_local: Option<String>,
    pub source: Option<DataSource>,
}

/// Which model produced a stored prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Elo, form and rest features through a scaled ridge regression
    EloRidge,
    /// Recent scoring through a ridge regression, corrected by team bias
    BiasCorrected,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::EloRidge => "elo_ridge",
            ModelKind::BiasCorrected => "bias_corrected",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "elo_ridge" => Some(ModelKind::EloRidge),
            "bias_corrected" => Some(ModelKind::BiasCorrected),
            _ => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction row as stored in the predictions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub predicted_home_score: i64,
    pub predicted_away_score: i64,
    pub predicted_diff: f64,
    pub win_probability: f64,
    pub conf_low: f64,
    pub conf_high: f64,
    pub ci_lower_bound: f64,
    pub ci_upper_bound: f64,
    pub std_multiplier: f64,
    pub model: ModelKind,
}

impl PredictionRecord {
    /// Team expected to win (home on a zero differential)
    pub fn predicted_winner(&self) -> &str {
        if self.predicted_diff >= 0.0 {
            &self.home_team
        } else {
            &self.away_team
        }
    }
}

/// A stored prediction joined with the actual final score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedPrediction {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub predicted_home_score: Option<i64>,
    pub predicted_away_score: Option<i64>,
    pub predicted_diff: f64,
    pub win_probability: Option<f64>,
    pub home_score: u16,
    pub away_score: u16,
}

impl EvaluatedPrediction {
    pub fn actual_diff(&self) -> f64 {
        self.home_score as f64 - self.away_score as f64
    }

    /// Predicted minus actual differential
    pub fn diff_error(&self) -> f64 {
        self.predicted_diff - self.actual_diff()
    }

    /// True when prediction and result agree on a strict winner
    pub fn winner_correct(&self) -> bool {
        let actual = self.actual_diff();
        (self.predicted_diff > 0.0 && actual > 0.0) || (self.predicted_diff < 0.0 && actual < 0.0)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum WnbaError {
    #[error("Scraper failed for {data_source}: {message}")]
    Scraper {
        data_source: DataSource,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {data_source}: {url}")]
    HttpStatus {
        data_source: DataSource,
        status: u16,
        url: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Insufficient history: have {games} completed games, need {required}")]
    InsufficientHistory { games: usize, required: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl WnbaError {
    /// Whether the same request might succeed if sent again
    pub fn is_transient(&self) -> bool {
        match self {
            WnbaError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_body()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            WnbaError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WnbaError>;

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| WnbaError::Parse(format!("invalid date '{}': {}", value, e)))
}

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub espn: EspnConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub bias: BiasConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_path: String,
    /// Directory for cached archive pages
    pub cache_dir: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/games.db".to_string(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EspnConfig {
    pub scoreboard_url: String,
    /// IANA timezone used to assign games to calendar dates
    pub timezone: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for EspnConfig {
    fn default() -> Self {
        EspnConfig {
            scoreboard_url:
                "https://site.api.espn.com/apis/site/v2/sports/basketball/wnba/scoreboard"
                    .to_string(),
            timezone: "America/Chicago".to_string(),
            user_agent: "wnba-predict/0.1".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Season page URL; `{season}` is replaced by the year
    pub season_url: String,
    pub start_year: u16,
    pub end_year: u16,
    /// Pause between season requests
    pub request_delay_ms: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            season_url: "https://www.basketball-reference.com/wnba/years/{season}_games.html"
                .to_string(),
            start_year: 2018,
            end_year: 2024,
            request_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub ridge_alpha: f64,
    pub elo_k_factor: f64,
    pub elo_initial_rating: f64,
    pub form_window: usize,
    pub default_rest_days: i64,
    pub max_rest_days: i64,
    /// Per-team score when the differential is zero
    pub baseline_score: f64,
    pub min_score: f64,
    pub simulations: usize,
    pub std_multiplier: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// Fixed RNG seed for reproducible simulations
    pub seed: Option<u64>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            ridge_alpha: 1.0,
            elo_k_factor: 20.0,
            elo_initial_rating: 1500.0,
            form_window: 5,
            default_rest_days: 7,
            max_rest_days: 14,
            baseline_score: 80.0,
            min_score: 50.0,
            simulations: 10_000,
            std_multiplier: 1.0,
            ci_low: 2.5,
            ci_high: 97.5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    pub decay_days: f64,
    pub recent_games: usize,
    /// Combined points the two predicted scores add up to
    pub total_points: i64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl Default for BiasConfig {
    fn default() -> Self {
        BiasConfig {
            decay_days: 30.0,
            recent_games: 5,
            total_points: 100,
            ci_low: 5.0,
            ci_high: 95.0,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WnbaError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| WnbaError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WnbaError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the configured local timezone
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.espn.timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            WnbaError::Config(format!("Unknown timezone {}: {}", self.espn.timezone, e))
        })
    }

    /// Today's date in the configured timezone
    pub fn today(&self) -> Result<NaiveDate> {
        let tz = self.timezone()?;
        Ok(chrono::Utc::now().with_timezone(&tz).date_naive())
    }
}
