//! Bias-corrected ridge model
//!
//! A ridge regression on scoring averages, adjusted by each team's recent
//! prediction error. Older errors count less: weights decay exponentially
//! with the age of the game.

use crate::data::Database;
use crate::features::TeamHistory;
use crate::model::{ConfidenceBounds, MonteCarlo, Regressor, RidgeRegression};
use crate::{
    BiasConfig, CompletedGame, EvaluatedPrediction, ModelKind, PredictionRecord, Result,
    ScheduledGame, WnbaError,
};
use chrono::NaiveDate;
use std::collections::HashMap;

use super::{PredictOptions, PredictionRun};

/// Decay-weighted mean prediction error per team.
///
/// Positive bias means the team's margin has been over-predicted.
#[derive(Debug, Clone, Default)]
pub struct TeamBiases {
    biases: HashMap<String, f64>,
}

impl TeamBiases {
    pub fn from_evaluated(
        rows: &[EvaluatedPrediction],
        today: NaiveDate,
        decay_days: f64,
    ) -> Result<Self> {
        if !(decay_days > 0.0) {
            return Err(WnbaError::Config(format!(
                "decay_days must be positive, got {}",
                decay_days
            )));
        }

        // team -> (sum of weighted residuals, sum of weights)
        let mut sums: HashMap<&str, (f64, f64)> = HashMap::new();
        for row in rows {
            let days_ago = (today - row.date).num_days() as f64;
            let weight = (-days_ago / decay_days).exp();
            let residual = row.diff_error();

            let home = sums.entry(row.home_team.as_str()).or_default();
            home.0 += weight * residual;
            home.1 += weight;

            let away = sums.entry(row.away_team.as_str()).or_default();
            away.0 -= weight * residual;
            away.1 += weight;
        }

        let biases = sums
            .into_iter()
            .filter(|(_, (_, w))| *w > 0.0)
            .map(|(team, (weighted, w))| (team.to_string(), weighted / w))
            .collect();

        Ok(TeamBiases { biases })
    }

    /// Bias for a team, zero when unknown
    pub fn get(&self, team: &str) -> f64 {
        self.biases.get(team).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.biases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.biases.is_empty()
    }
}

/// Ridge on (home points, away points) with per-team bias correction
pub struct BiasCorrectedPredictor {
    model: RidgeRegression,
    residual_std: f64,
    history: TeamHistory,
    biases: TeamBiases,
    recent_games: usize,
    total_points: i64,
}

impl BiasCorrectedPredictor {
    pub fn fit(
        games: &[CompletedGame],
        biases: TeamBiases,
        config: &BiasConfig,
        ridge_alpha: f64,
    ) -> Result<Self> {
        if games.is_empty() {
            return Err(WnbaError::InsufficientHistory {
                games: 0,
                required: 1,
            });
        }

        let x: Vec<Vec<f64>> = games
            .iter()
            .map(|g| vec![g.home_score as f64, g.away_score as f64])
            .collect();
        let y: Vec<f64> = games.iter().map(CompletedGame::score_diff).collect();

        let model = RidgeRegression::fit(&x, &y, ridge_alpha)?;
        let residual_std = model.residual_std(&x, &y);

        Ok(BiasCorrectedPredictor {
            model,
            residual_std,
            history: TeamHistory::new(games),
            biases,
            recent_games: config.recent_games,
            total_points: config.total_points,
        })
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    /// Bias-corrected differential, or None when either team has no history
    pub fn predict_diff(&self, home: &str, away: &str, date: NaiveDate) -> Option<f64> {
        let home_avg = self.history.recent_points(home, date, self.recent_games)?;
        let away_avg = self.history.recent_points(away, date, self.recent_games)?;

        let raw = self.model.predict(&[home_avg, away_avg]);
        Some(raw - (self.biases.get(home) - self.biases.get(away)))
    }

    /// Score line splitting the configured total around the differential
    pub fn score_line(&self, diff: f64) -> (i64, i64) {
        let home = ((self.total_points as f64 + diff) / 2.0).round_ties_even() as i64;
        (home, self.total_points - home)
    }

    pub fn predict(
        &self,
        game: &ScheduledGame,
        simulator: &mut MonteCarlo,
        bounds: ConfidenceBounds,
        std_multiplier: f64,
    ) -> Result<Option<PredictionRecord>> {
        let diff = match self.predict_diff(&game.home_team, &game.away_team, game.date) {
            Some(d) => d,
            None => return Ok(None),
        };
        let summary = simulator.simulate(diff, self.residual_std * std_multiplier, bounds)?;
        let (home_score, away_score) = self.score_line(diff);

        Ok(Some(PredictionRecord {
            date: game.date,
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            predicted_home_score: home_score,
            predicted_away_score: away_score,
            predicted_diff: diff,
            win_probability: summary.win_probability,
            conf_low: summary.conf_low,
            conf_high: summary.conf_high,
            ci_lower_bound: bounds.low,
            ci_upper_bound: bounds.high,
            std_multiplier,
            model: ModelKind::BiasCorrected,
        }))
    }
}

/// Predict and store every scheduled game on `date` with the bias model
pub fn run_bias_corrected(
    db: &Database,
    config: &BiasConfig,
    ridge_alpha: f64,
    simulations: usize,
    date: NaiveDate,
    today: NaiveDate,
    options: &PredictOptions,
) -> Result<PredictionRun> {
    let schedule = db.get_schedule_for(date)?;
    if schedule.is_empty() {
        return Ok(PredictionRun::default());
    }

    let games = db.get_completed_games()?;
    let evaluated = db.get_evaluated_predictions()?;
    let biases = TeamBiases::from_evaluated(&evaluated, today, config.decay_days)?;
    log::info!(
        "Computed bias for {} teams from {} graded predictions",
        biases.len(),
        evaluated.len()
    );

    let predictor = BiasCorrectedPredictor::fit(&games, biases, config, ridge_alpha)?;
    let mut simulator = MonteCarlo::new(simulations, options.seed);
    let mut run = PredictionRun {
        scheduled: schedule.len(),
        ..PredictionRun::default()
    };

    for game in &schedule {
        let prediction =
            match predictor.predict(game, &mut simulator, options.bounds, options.std_multiplier)? {
                Some(p) => p,
                None => {
                    log::warn!(
                        "Skipping {} vs {}: no recent games for one of the teams",
                        game.home_team,
                        game.away_team
                    );
                    run.skipped += 1;
                    continue;
                }
            };
        if let Err(e) = db.save_prediction(&prediction) {
            log::error!(
                "Failed to store prediction for {} vs {}: {}",
                game.home_team,
                game.away_team,
                e
            );
        }
        run.predictions.push(prediction);
    }

    Ok(run)
}
