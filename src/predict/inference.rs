//! Elo, form and rest features through a standardised ridge regression

use crate::data::Database;
use crate::features::{EloRatings, FeatureBuilder, MatchupFeatures, TeamHistory};
use crate::model::{ConfidenceBounds, MonteCarlo, Regressor, ScaledRidge};
use crate::{
    CompletedGame, ModelKind, PredictionConfig, PredictionRecord, Result, ScheduledGame,
    WnbaError,
};
use chrono::NaiveDate;

use super::{PredictOptions, PredictionRun};

/// Fitted Elo ridge model plus the history it was fitted on
pub struct EloRidgePredictor {
    model: ScaledRidge,
    residual_std: f64,
    history: TeamHistory,
    ratings: EloRatings,
    builder: FeatureBuilder,
    baseline_score: f64,
    min_score: f64,
    training_rows: usize,
}

impl EloRidgePredictor {
    /// Fit on completed games
    pub fn fit(games: &[CompletedGame], config: &PredictionConfig) -> Result<Self> {
        if games.is_empty() {
            return Err(WnbaError::InsufficientHistory {
                games: 0,
                required: 1,
            });
        }

        let history = TeamHistory::new(games);
        let builder = FeatureBuilder::from_config(config);
        let training = builder.training_set(&history);

        let model = ScaledRidge::fit(&training.features, &training.targets, config.ridge_alpha)?;
        let residual_std = model.residual_std(&training.features, &training.targets);
        let ratings = builder.final_ratings(&history);
        for (team, rating) in ratings.standings().iter().take(5) {
            log::debug!("  {:<28} {:.1}", team, rating);
        }

        log::debug!(
            "Fitted ridge on {} games: intercept {:.3}, residual std {:.3}",
            training.len(),
            model.ridge.intercept,
            residual_std
        );
        for (name, coef) in MatchupFeatures::NAMES.iter().zip(&model.ridge.coefficients) {
            log::debug!("  {:<12} {:+.3}", name, coef);
        }

        Ok(EloRidgePredictor {
            model,
            residual_std,
            history,
            ratings,
            builder,
            baseline_score: config.baseline_score,
            min_score: config.min_score,
            training_rows: training.len(),
        })
    }

    /// Root mean squared training error
    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn ratings(&self) -> &EloRatings {
        &self.ratings
    }

    /// Predicted home-minus-away differential
    pub fn predict_diff(&self, home: &str, away: &str, date: NaiveDate) -> f64 {
        let features = self
            .builder
            .features_for(&self.history, &self.ratings, home, away, date);
        self.model.predict(&features.to_vec())
    }

    /// Score line implied by a differential around the baseline score
    pub fn score_line(&self, diff: f64) -> (i64, i64) {
        let home = (diff / 2.0 + self.baseline_score).max(self.min_score);
        let away = (-diff / 2.0 + self.baseline_score).max(self.min_score);
        (home.round_ties_even() as i64, away.round_ties_even() as i64)
    }

    pub fn predict(
        &self,
        game: &ScheduledGame,
        simulator: &mut MonteCarlo,
        bounds: ConfidenceBounds,
        std_multiplier: f64,
    ) -> Result<PredictionRecord> {
        let diff = self.predict_diff(&game.home_team, &game.away_team, game.date);
        let summary = simulator.simulate(diff, self.residual_std * std_multiplier, bounds)?;
        let (home_score, away_score) = self.score_line(diff);

        Ok(PredictionRecord {
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
            model: ModelKind::EloRidge,
        })
    }
}

/// Predict and store every scheduled game on `date` with the Elo ridge model
pub fn run_elo_ridge(
    db: &Database,
    config: &PredictionConfig,
    date: NaiveDate,
    options: &PredictOptions,
) -> Result<PredictionRun> {
    let schedule = db.get_schedule_for(date)?;
    if schedule.is_empty() {
        return Ok(PredictionRun::default());
    }

    let games = db.get_completed_games()?;
    let predictor = EloRidgePredictor::fit(&games, config)?;
    log::info!(
        "Trained on {} games (residual std {:.2})",
        predictor.training_rows(),
        predictor.residual_std()
    );

    let mut simulator = MonteCarlo::new(config.simulations, options.seed);
    let mut run = PredictionRun {
        scheduled: schedule.len(),
        ..PredictionRun::default()
    };

    for game in &schedule {
        let prediction =
            predictor.predict(game, &mut simulator, options.bounds, options.std_multiplier)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataSource;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn game(day: u32, home: &str, away: &str, hs: u16, aws: u16) -> CompletedGame {
        CompletedGame {
            date: date(day),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: aws,
        }
    }

    /// The Aces beat everyone, the Sky lose to everyone
    fn season() -> Vec<CompletedGame> {
        let mut games = Vec::new();
        for week in 0..4 {
            let base = 1 + week * 7;
            games.push(game(base, "Aces", "Sky", 95, 75));
            games.push(game(base + 1, "Storm", "Sky", 84, 78));
            games.push(game(base + 2, "Aces", "Storm", 88, 80));
            games.push(game(base + 3, "Sky", "Aces", 70, 90));
            games.push(game(base + 4, "Storm", "Aces", 79, 86));
            games.push(game(base + 5, "Sky", "Storm", 74, 81));
        }
        games
    }

    fn scheduled(home: &str, away: &str) -> ScheduledGame {
        ScheduledGame {
            date: date(30),
            home_team: home.to_string(),
            away_team: away.to_string(),
            game_time: None,
            game_time_local: None,
            source: Some(DataSource::Espn),
        }
    }

    fn options() -> PredictOptions {
        PredictOptions {
            std_multiplier: 1.0,
            bounds: ConfidenceBounds::new(2.5, 97.5).unwrap(),
            seed: Some(11),
        }
    }

    #[test]
    fn test_fit_requires_history() {
        let err = EloRidgePredictor::fit(&[], &PredictionConfig::default());
        assert!(matches!(
            err,
            Err(WnbaError::InsufficientHistory { games: 0, .. })
        ));
    }

    #[test]
    fn test_stronger_team_favoured() {
        let predictor = EloRidgePredictor::fit(&season(), &PredictionConfig::default()).unwrap();
        assert_eq!(predictor.training_rows(), 24);
        assert!(predictor.ratings().get_rating("Aces") > predictor.ratings().get_rating("Sky"));

        let strong_home = predictor.predict_diff("Aces", "Sky", date(30));
        let weak_home = predictor.predict_diff("Sky", "Aces", date(30));
        assert!(strong_home > 0.0);
        assert!(weak_home < strong_home);
    }

    #[test]
    fn test_score_line() {
        let predictor = EloRidgePredictor::fit(&season(), &PredictionConfig::default()).unwrap();
        assert_eq!(predictor.score_line(0.0), (80, 80));
        assert_eq!(predictor.score_line(9.0), (84, 76));
        assert_eq!(predictor.score_line(-5.0), (78, 82));
        // Scores never drop below the floor
        assert_eq!(predictor.score_line(100.0), (130, 50));
    }

    #[test]
    fn test_prediction_fields() {
        let predictor = EloRidgePredictor::fit(&season(), &PredictionConfig::default()).unwrap();
        let mut simulator = MonteCarlo::new(2000, Some(3));
        let bounds = ConfidenceBounds::new(2.5, 97.5).unwrap();

        let p = predictor
            .predict(&scheduled("Aces", "Sky"), &mut simulator, bounds, 1.0)
            .unwrap();
        assert_eq!(p.model, ModelKind::EloRidge);
        assert!(p.win_probability > 0.5);
        assert!(p.conf_low < p.predicted_diff && p.predicted_diff < p.conf_high);
        assert_eq!(p.ci_lower_bound, 2.5);
        assert_eq!(p.predicted_winner(), "Aces");
    }

    #[test]
    fn test_run_without_schedule_is_empty() {
        let db = Database::in_memory().unwrap();
        let run = run_elo_ridge(&db, &PredictionConfig::default(), date(30), &options()).unwrap();
        assert_eq!(run.scheduled, 0);
        assert!(run.predictions.is_empty());
    }

    #[test]
    fn test_run_stores_predictions() {
        let db = Database::in_memory().unwrap();
        let records: Vec<_> = season()
            .into_iter()
            .map(|g| crate::GameRecord {
                date: g.date,
                home_team: g.home_team,
                away_team: g.away_team,
                home_score: Some(g.home_score),
                away_score: Some(g.away_score),
                source: Some(DataSource::Espn),
            })
            .collect();
        db.insert_games(&records).unwrap();
        db.insert_schedule(&[scheduled("Aces", "Sky"), scheduled("Storm", "Aces")])
            .unwrap();

        let config = PredictionConfig {
            simulations: 500,
            ..PredictionConfig::default()
        };
        let run = run_elo_ridge(&db, &config, date(30), &options()).unwrap();
        assert_eq!(run.predictions.len(), 2);

        // Second run overwrites rather than duplicates
        run_elo_ridge(&db, &config, date(30), &options()).unwrap();
        assert_eq!(db.get_predictions_for(date(30)).unwrap().len(), 2);
    }
}
