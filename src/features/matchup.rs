//! Matchup feature vectors for the Elo ridge model

use super::elo::{EloConfig, EloRatings};
use super::form::{FormConfig, Side, TeamHistory};
use crate::PredictionConfig;
use chrono::NaiveDate;

/// Features describing one game from the home team's side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatchupFeatures {
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_form: f64,
    pub away_form: f64,
    pub home_rest: f64,
    pub away_rest: f64,
}

impl MatchupFeatures {
    pub const DIM: usize = 6;

    pub const NAMES: [&'static str; Self::DIM] = [
        "home_rating",
        "away_rating",
        "home_form",
        "away_form",
        "home_rest",
        "away_rest",
    ];

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.home_rating,
            self.away_rating,
            self.home_form,
            self.away_form,
            self.home_rest,
            self.away_rest,
        ]
    }
}

/// Training matrix with its regression target
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    /// Score differential (home minus away)
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Builds matchup features from game history
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    pub elo: EloConfig,
    pub form: FormConfig,
}

impl FeatureBuilder {
    pub fn from_config(config: &PredictionConfig) -> Self {
        FeatureBuilder {
            elo: EloConfig {
                k_factor: config.elo_k_factor,
                initial_rating: config.elo_initial_rating,
                ..EloConfig::default()
            },
            form: FormConfig {
                window: config.form_window,
                default_rest_days: config.default_rest_days,
                max_rest_days: config.max_rest_days,
            },
        }
    }

    /// Features for every completed game, using ratings as they stood at
    /// the start of that game's date
    pub fn training_set(&self, history: &TeamHistory) -> TrainingSet {
        let mut ratings = EloRatings::new(self.elo.clone());
        let mut set = TrainingSet::default();
        let games = history.games();

        let mut start = 0;
        while start < games.len() {
            let date = games[start].date;
            let end = games[start..]
                .iter()
                .position(|g| g.date != date)
                .map(|offset| start + offset)
                .unwrap_or(games.len());

            for game in &games[start..end] {
                let features =
                    self.features_for(history, &ratings, &game.home_team, &game.away_team, date);
                set.features.push(features.to_vec());
                set.targets.push(game.score_diff());
            }
            for game in &games[start..end] {
                ratings.update(game);
            }
            start = end;
        }

        set
    }

    /// Ratings after replaying the whole history
    pub fn final_ratings(&self, history: &TeamHistory) -> EloRatings {
        EloRatings::from_games(history.games(), self.elo.clone())
    }

    /// Features for a game between two teams on a date
    pub fn features_for(
        &self,
        history: &TeamHistory,
        ratings: &EloRatings,
        home: &str,
        away: &str,
        date: NaiveDate,
    ) -> MatchupFeatures {
        MatchupFeatures {
            home_rating: ratings.get_rating(home),
            away_rating: ratings.get_rating(away),
            home_form: history.form(home, date, Side::Home, self.form.window),
            away_form: history.form(away, date, Side::Away, self.form.window),
            home_rest: history.rest_days(home, date, &self.form) as f64,
            away_rest: history.rest_days(away, date, &self.form) as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompletedGame;

    fn game(day: u32, home: &str, away: &str, hs: u16, aws: u16) -> CompletedGame {
        CompletedGame {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: aws,
        }
    }

    #[test]
    fn test_training_set_uses_pre_game_ratings() {
        let history = TeamHistory::new(&[
            game(1, "Aces", "Storm", 90, 80),
            game(1, "Sky", "Fever", 70, 72),
            game(4, "Storm", "Aces", 75, 77),
        ]);
        let builder = FeatureBuilder::default();
        let set = builder.training_set(&history);

        assert_eq!(set.len(), 3);
        assert_eq!(set.targets, vec![10.0, -2.0, -2.0]);

        // Same-day games both see the initial ratings
        assert_eq!(set.features[0][0], 1500.0);
        assert_eq!(set.features[1][0], 1500.0);
        assert_eq!(set.features[1][4], 7.0);

        // Third game: Storm lost on day 1, Aces won
        let third = &set.features[2];
        assert!(third[0] < 1500.0);
        assert!(third[1] > 1500.0);
        assert_eq!(third[4], 3.0);
        assert_eq!(third[5], 3.0);
        // Aces' away form: no earlier away games
        assert_eq!(third[3], 0.0);
    }

    #[test]
    fn test_features_for_unknown_teams() {
        let history = TeamHistory::new(&[game(1, "Aces", "Storm", 90, 80)]);
        let builder = FeatureBuilder::default();
        let ratings = builder.final_ratings(&history);

        let features = builder.features_for(
            &history,
            &ratings,
            "Valkyries",
            "Aces",
            NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
        );
        assert_eq!(features.home_rating, 1500.0);
        assert!(features.away_rating > 1500.0);
        assert_eq!(features.home_form, 0.0);
        assert_eq!(features.home_rest, 7.0);
        assert_eq!(features.away_rest, 14.0);
        assert_eq!(features.to_vec().len(), MatchupFeatures::DIM);
    }

    #[test]
    fn test_names_follow_vector_order() {
        let features = MatchupFeatures {
            home_rest: 3.0,
            ..MatchupFeatures::default()
        };
        let position = MatchupFeatures::NAMES
            .iter()
            .position(|n| *n == "home_rest")
            .unwrap();
        assert_eq!(features.to_vec()[position], 3.0);
    }
}
