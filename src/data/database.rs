//! SQLite database management for games, schedule and predictions

use crate::{
    CompletedGame, DataSource, EvaluatedPrediction, GameRecord, ModelKind, PredictionRecord,
    Result, ScheduledGame, DATE_FORMAT,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

/// What happened to a game row on a live upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                home_score INTEGER,
                away_score INTEGER,
                source TEXT,
                UNIQUE(date, home_team, away_team)
            );

            CREATE TABLE IF NOT EXISTS schedule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                game_time TEXT,
                game_time_local TEXT,
                source TEXT,
                UNIQUE(date, home_team, away_team)
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                predicted_home_score INTEGER,
                predicted_away_score INTEGER,
                predicted_diff REAL NOT NULL,
                win_probability REAL,
                conf_low REAL,
                conf_high REAL,
                ci_lower_bound REAL,
                ci_upper_bound REAL,
                std_multiplier REAL,
                model TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(date, home_team, away_team)
            );

            CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
            CREATE INDEX IF NOT EXISTS idx_schedule_date ON schedule(date);
            CREATE INDEX IF NOT EXISTS idx_predictions_date ON predictions(date);
            "#,
        )?;
        Ok(())
    }

    // ==================== Game Operations ====================

    /// Insert a game from the live scoreboard, or refresh its scores.
    ///
    /// An existing row is rewritten when it is missing a score or when the
    /// incoming scores differ. Missing incoming scores never replace a known
    /// final score.
    pub fn upsert_live_game(&self, game: &GameRecord) -> Result<UpsertOutcome> {
        let date = game.date.format(DATE_FORMAT).to_string();
        let existing: Option<(Option<u16>, Option<u16>)> = self
            .conn
            .query_row(
                "SELECT home_score, away_score FROM games
                 WHERE date = ?1 AND home_team = ?2 AND away_team = ?3",
                params![date, game.home_team, game.away_team],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO games (date, home_team, away_team, home_score, away_score, source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        date,
                        game.home_team,
                        game.away_team,
                        game.home_score,
                        game.away_score,
                        game.source.map(|s| s.as_str()),
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) => {
                if !needs_score_update(stored, (game.home_score, game.away_score)) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.conn.execute(
                    "UPDATE games SET home_score = ?1, away_score = ?2
                     WHERE date = ?3 AND home_team = ?4 AND away_team = ?5",
                    params![
                        game.home_score,
                        game.away_score,
                        date,
                        game.home_team,
                        game.away_team
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Insert a game unless one already exists for (date, home, away).
    /// Returns whether a row was written.
    pub fn insert_game_if_absent(&self, game: &GameRecord) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO games
                 (date, home_team, away_team, home_score, away_score, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                game.date.format(DATE_FORMAT).to_string(),
                game.home_team,
                game.away_team,
                game.home_score,
                game.away_score,
                game.source.map(|s| s.as_str()),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Insert a batch of games, skipping existing keys.
    /// Rows that fail are logged and skipped; returns the number written.
    pub fn insert_games(&self, games: &[GameRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for game in games {
            match self.insert_game_if_absent(game) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => log::warn!(
                    "Failed to insert {} vs {} on {}: {}",
                    game.home_team,
                    game.away_team,
                    game.date,
                    e
                ),
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Get every game row, ordered by date
    pub fn get_all_games(&self) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, home_score, away_score, source
             FROM games
             ORDER BY date, id",
        )?;

        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Get games with both scores recorded, ordered by date
    pub fn get_completed_games(&self) -> Result<Vec<CompletedGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, home_score, away_score, source
             FROM games
             WHERE home_score IS NOT NULL AND away_score IS NOT NULL
             ORDER BY date, id",
        )?;

        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(games.iter().filter_map(GameRecord::completed).collect())
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        let date_str: String = row.get(0)?;
        let source: Option<String> = row.get(5)?;
        Ok(GameRecord {
            date: parse_db_date(&date_str, 0)?,
            home_team: row.get(1)?,
            away_team: row.get(2)?,
            home_score: row.get(3)?,
            away_score: row.get(4)?,
            source: source.as_deref().and_then(DataSource::from_db),
        })
    }

    // ==================== Schedule Operations ====================

    /// Insert scheduled games, ignoring ones already present.
    /// Rows that fail are logged and skipped; returns the number written.
    pub fn insert_schedule(&self, games: &[ScheduledGame]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for game in games {
            let result = self.conn.execute(
                "INSERT OR IGNORE INTO schedule
                    (date, home_team, away_team, game_time, game_time_local, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    game.date.format(DATE_FORMAT).to_string(),
                    game.home_team,
                    game.away_team,
                    game.game_time,
                    game.game_time_local,
                    game.source.map(|s| s.as_str()),
                ],
            );
            match result {
                Ok(changed) => count += changed,
                Err(e) => log::warn!(
                    "Failed to insert scheduled game {} vs {} on {}: {}",
                    game.home_team,
                    game.away_team,
                    game.date,
                    e
                ),
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Get scheduled games on a date
    pub fn get_schedule_for(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, game_time, game_time_local, source
             FROM schedule
             WHERE date = ?1
             ORDER BY game_time, id",
        )?;

        let games = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                let date_str: String = row.get(0)?;
                let source: Option<String> = row.get(5)?;
                Ok(ScheduledGame {
                    date: parse_db_date(&date_str, 0)?,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    game_time: row.get(3)?,
                    game_time_local: row.get(4)?,
                    source: source.as_deref().and_then(DataSource::from_db),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Delete scheduled games on or after a date; returns rows removed
    pub fn clear_schedule_from(&self, date: NaiveDate) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM schedule WHERE date >= ?1",
            params![date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(removed)
    }

    // ==================== Prediction Operations ====================

    /// Store a prediction, replacing any earlier one for the same game
    pub fn save_prediction(&self, prediction: &PredictionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO predictions (
                date, home_team, away_team,
                predicted_home_score, predicted_away_score,
                predicted_diff, win_probability,
                conf_low, conf_high,
                ci_lower_bound, ci_upper_bound, std_multiplier, model
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                prediction.date.format(DATE_FORMAT).to_string(),
                prediction.home_team,
                prediction.away_team,
                prediction.predicted_home_score,
                prediction.predicted_away_score,
                prediction.predicted_diff,
                prediction.win_probability,
                prediction.conf_low,
                prediction.conf_high,
                prediction.ci_lower_bound,
                prediction.ci_upper_bound,
                prediction.std_multiplier,
                prediction.model.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Get stored predictions for a date
    pub fn get_predictions_for(&self, date: NaiveDate) -> Result<Vec<PredictionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, predicted_home_score, predicted_away_score,
                    predicted_diff, win_probability, conf_low, conf_high,
                    ci_lower_bound, ci_upper_bound, std_multiplier, model
             FROM predictions
             WHERE date = ?1
             ORDER BY id",
        )?;

        let predictions = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                let date_str: String = row.get(0)?;
                let model: Option<String> = row.get(12)?;
                Ok(PredictionRecord {
                    date: parse_db_date(&date_str, 0)?,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    predicted_home_score: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                    predicted_away_score: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                    predicted_diff: row.get(5)?,
                    win_probability: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
                    conf_low: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
                    conf_high: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
                    ci_lower_bound: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
                    ci_upper_bound: row.get::<_, Option<f64>>(10)?.unwrap_or_default(),
                    std_multiplier: row.get::<_, Option<f64>>(11)?.unwrap_or(1.0),
                    model: model
                        .as_deref()
                        .and_then(ModelKind::from_db)
                        .unwrap_or(ModelKind::EloRidge),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(predictions)
    }

    /// Predictions joined with final scores, newest first
    pub fn get_evaluated_predictions(&self) -> Result<Vec<EvaluatedPrediction>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.date, p.home_team, p.away_team,
                    p.predicted_home_score, p.predicted_away_score,
                    p.predicted_diff, p.win_probability,
                    g.home_score, g.away_score
             FROM predictions p
             JOIN games g
               ON p.date = g.date
              AND p.home_team = g.home_team
              AND p.away_team = g.away_team
             WHERE g.home_score IS NOT NULL AND g.away_score IS NOT NULL
             ORDER BY p.date DESC, p.id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let date_str: String = row.get(0)?;
                Ok(EvaluatedPrediction {
                    date: parse_db_date(&date_str, 0)?,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    predicted_home_score: row.get(3)?,
                    predicted_away_score: row.get(4)?,
                    predicted_diff: row.get(5)?,
                    win_probability: row.get(6)?,
                    home_score: row.get(7)?,
                    away_score: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    // ==================== Statistics ====================

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;

        let completed_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM games WHERE home_score IS NOT NULL AND away_score IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let schedule_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM schedule", [], |row| row.get(0))?;

        let prediction_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM games",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            game_count: game_count as usize,
            completed_count: completed_count as usize,
            schedule_count: schedule_count as usize,
            prediction_count: prediction_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

/// Decide whether stored scores should be replaced by incoming ones
pub fn needs_score_update(
    stored: (Option<u16>, Option<u16>),
    incoming: (Option<u16>, Option<u16>),
) -> bool {
    let incoming_complete = incoming.0.is_some() && incoming.1.is_some();
    let stored_complete = stored.0.is_some() && stored.1.is_some();

    if stored_complete && !incoming_complete {
        return false;
    }
    !stored_complete || stored != incoming
}

fn parse_db_date(value: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub game_count: usize,
    pub completed_count: usize,
    pub schedule_count: usize,
    pub prediction_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn game(home_score: Option<u16>, away_score: Option<u16>) -> GameRecord {
        GameRecord {
            date: date(2024, 6, 1),
            home_team: "Las Vegas Aces".to_string(),
            away_team: "Seattle Storm".to_string(),
            home_score,
            away_score,
            source: Some(DataSource::Espn),
        }
    }

    fn prediction(diff: f64) -> PredictionRecord {
        PredictionRecord {
            date: date(2024, 6, 1),
            home_team: "Las Vegas Aces".to_string(),
            away_team: "Seattle Storm".to_string(),
            predicted_home_score: 82,
            predicted_away_score: 78,
            predicted_diff: diff,
            win_probability: 0.62,
            conf_low: -15.0,
            conf_high: 23.0,
            ci_lower_bound: 2.5,
            ci_upper_bound: 97.5,
            std_multiplier: 1.0,
            model: ModelKind::EloRidge,
        }
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.game_count, 0);
        assert_eq!(stats.schedule_count, 0);
        assert_eq!(stats.prediction_count, 0);
        assert!(stats.earliest_game.is_none());
    }

    #[test]
    fn test_live_upsert_lifecycle() {
        let db = Database::in_memory().unwrap();

        assert_eq!(
            db.upsert_live_game(&game(None, None)).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            db.upsert_live_game(&game(Some(40), Some(38))).unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(
            db.upsert_live_game(&game(Some(40), Some(38))).unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            db.upsert_live_game(&game(Some(88), Some(80))).unwrap(),
            UpsertOutcome::Updated
        );
        // A blank scoreboard entry must not erase the final score
        assert_eq!(
            db.upsert_live_game(&game(None, None)).unwrap(),
            UpsertOutcome::Unchanged
        );

        let completed = db.get_completed_games().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].home_score, 88);
        assert_eq!(completed[0].away_score, 80);
    }

    #[test]
    fn test_needs_score_update() {
        assert!(needs_score_update((None, None), (None, None)));
        assert!(needs_score_update((Some(0), Some(0)), (Some(10), Some(8))));
        assert!(!needs_score_update((Some(10), Some(8)), (Some(10), Some(8))));
        assert!(!needs_score_update((Some(10), Some(8)), (Some(10), None)));
    }

    #[test]
    fn test_insert_games_ignores_duplicates() {
        let db = Database::in_memory().unwrap();
        let mut other = game(Some(70), Some(75));
        other.date = date(2024, 6, 3);

        let inserted = db
            .insert_games(&[game(Some(88), Some(80)), other.clone()])
            .unwrap();
        assert_eq!(inserted, 2);

        // Archive rows never overwrite existing ones
        let mut conflicting = game(Some(1), Some(2));
        conflicting.source = Some(DataSource::BasketballReference);
        let inserted = db.insert_games(&[conflicting, other]).unwrap();
        assert_eq!(inserted, 0);

        let games = db.get_all_games().unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_score, Some(88));
        assert_eq!(games[0].source, Some(DataSource::Espn));
    }

    #[test]
    fn test_schedule_insert_and_clear() {
        let db = Database::in_memory().unwrap();
        let make = |d: NaiveDate, home: &str| ScheduledGame {
            date: d,
            home_team: home.to_string(),
            away_team: "Atlanta Dream".to_string(),
            game_time: Some(format!("{}T23:00:00+00:00", d)),
            game_time_local: None,
            source: Some(DataSource::Espn),
        };

        let games = vec![
            make(date(2024, 6, 1), "Chicago Sky"),
            make(date(2024, 6, 2), "Minnesota Lynx"),
            make(date(2024, 6, 2), "Minnesota Lynx"),
            make(date(2024, 6, 5), "Phoenix Mercury"),
        ];
        assert_eq!(db.insert_schedule(&games).unwrap(), 3);

        let on_second = db.get_schedule_for(date(2024, 6, 2)).unwrap();
        assert_eq!(on_second.len(), 1);
        assert_eq!(on_second[0].home_team, "Minnesota Lynx");

        assert_eq!(db.clear_schedule_from(date(2024, 6, 2)).unwrap(), 2);
        assert_eq!(db.get_stats().unwrap().schedule_count, 1);
    }

    #[test]
    fn test_prediction_replaced_on_repeat() {
        let db = Database::in_memory().unwrap();
        db.save_prediction(&prediction(4.0)).unwrap();
        db.save_prediction(&prediction(-1.5)).unwrap();

        let stored = db.get_predictions_for(date(2024, 6, 1)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].predicted_diff, -1.5);
        assert_eq!(stored[0].model, ModelKind::EloRidge);
    }

    #[test]
    fn test_evaluated_predictions_join_completed_games() {
        let db = Database::in_memory().unwrap();
        db.save_prediction(&prediction(4.0)).unwrap();
        assert!(db.get_evaluated_predictions().unwrap().is_empty());

        db.upsert_live_game(&game(None, None)).unwrap();
        assert!(db.get_evaluated_predictions().unwrap().is_empty());

        db.upsert_live_game(&game(Some(90), Some(84))).unwrap();
        let rows = db.get_evaluated_predictions().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actual_diff(), 6.0);
        assert_eq!(rows[0].diff_error(), -2.0);
    }

    #[test]
    fn test_stats_date_range() {
        let db = Database::in_memory().unwrap();
        let mut early = game(Some(80), Some(70));
        early.date = date(2019, 5, 25);
        db.insert_games(&[early, game(None, None)]).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.game_count, 2);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.earliest_game, Some(date(2019, 5, 25)));
        assert_eq!(stats.latest_game, Some(date(2024, 6, 1)));
    }
}
