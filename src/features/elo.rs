//! Elo rating system for team strength estimation
//!
//! Ratings move by the margin of victory rather than a plain win/loss, so a
//! blowout shifts ratings further than a one-point game.

use std::collections::HashMap;

use crate::CompletedGame;

/// Elo rating configuration
#[derive(Debug, Clone)]
pub struct EloConfig {
    /// K-factor: how much ratings change per game
    pub k_factor: f64,
    /// Starting rating for new teams
    pub initial_rating: f64,
    /// Damping added to the absolute margin in the result score
    pub margin_damping: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            k_factor: 20.0,
            initial_rating: 1500.0,
            margin_damping: 3.0,
        }
    }
}

/// Elo rating computer
#[derive(Debug, Clone)]
pub struct EloRatings {
    ratings: HashMap<String, f64>,
    config: EloConfig,
}

impl Default for EloRatings {
    fn default() -> Self {
        Self::new(EloConfig::default())
    }
}

impl EloRatings {
    pub fn new(config: EloConfig) -> Self {
        EloRatings {
            ratings: HashMap::new(),
            config,
        }
    }

    /// Replay games in date order and return the final ratings
    pub fn from_games(games: &[CompletedGame], config: EloConfig) -> Self {
        let mut elo = Self::new(config);
        let mut ordered: Vec<&CompletedGame> = games.iter().collect();
        ordered.sort_by_key(|g| g.date);
        for game in ordered {
            elo.update(game);
        }
        elo
    }

    /// Current rating for a team (initial rating if unknown)
    pub fn get_rating(&self, team: &str) -> f64 {
        self.ratings
            .get(team)
            .copied()
            .unwrap_or(self.config.initial_rating)
    }

    /// Expected score (0-1) for the home team. No home advantage is applied.
    pub fn expected_score(&self, home: &str, away: &str) -> f64 {
        let diff = self.get_rating(away) - self.get_rating(home);
        1.0 / (1.0 + 10.0_f64.powf(diff / 400.0))
    }

    /// Result score for the home team: 0.5 for a tie, moving towards
    /// 1.5 / -0.5 as the margin grows
    pub fn margin_result(&self, home_score: u16, away_score: u16) -> f64 {
        let margin = home_score as f64 - away_score as f64;
        0.5 + margin / (margin.abs() + self.config.margin_damping)
    }

    /// Update ratings after a game
    pub fn update(&mut self, game: &CompletedGame) {
        let home_expected = self.expected_score(&game.home_team, &game.away_team);
        let home_actual = self.margin_result(game.home_score, game.away_score);

        let home_rating = self.get_rating(&game.home_team);
        let away_rating = self.get_rating(&game.away_team);

        let home_new = home_rating + self.config.k_factor * (home_actual - home_expected);
        let away_new =
            away_rating + self.config.k_factor * ((1.0 - home_actual) - (1.0 - home_expected));

        self.ratings.insert(game.home_team.clone(), home_new);
        self.ratings.insert(game.away_team.clone(), away_new);
    }

    /// Number of teams with a rating
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Teams sorted by rating, strongest first
    pub fn standings(&self) -> Vec<(String, f64)> {
        let mut standings: Vec<_> = self
            .ratings
            .iter()
            .map(|(team, rating)| (team.clone(), *rating))
            .collect();
        standings.sort_by(|a, b| b.1.total_cmp(&a.1));
        standings
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn make_game(home: &str, away: &str, home_score: u16, away_score: u16) -> CompletedGame {
        CompletedGame {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score,
            away_score,
        }
    }

    #[test]
    fn test_initial_ratings() {
        let elo = EloRatings::default();
        assert_eq!(elo.get_rating("Atlanta Dream"), 1500.0);
        assert!(elo.is_empty());
    }

    #[test]
    fn test_expected_score_even() {
        let elo = EloRatings::default();
        assert!((elo.expected_score("A", "B") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_margin_result() {
        let elo = EloRatings::default();
        assert_eq!(elo.margin_result(80, 80), 0.5);
        assert!((elo.margin_result(81, 80) - 0.75).abs() < 1e-12);
        assert!((elo.margin_result(80, 83) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_is_zero_sum() {
        let mut elo = EloRatings::default();
        elo.update(&make_game("A", "B", 90, 80));

        // result = 0.5 + 10/13, expected = 0.5
        let expected_gain = 20.0 * (10.0 / 13.0);
        assert!((elo.get_rating("A") - (1500.0 + expected_gain)).abs() < 1e-9);
        assert!((elo.get_rating("B") - (1500.0 - expected_gain)).abs() < 1e-9);
    }

    #[test]
    fn test_bigger_margin_moves_more() {
        let mut close = EloRatings::default();
        close.update(&make_game("A", "B", 81, 80));
        let mut blowout = EloRatings::default();
        blowout.update(&make_game("A", "B", 100, 70));

        assert!(blowout.get_rating("A") > close.get_rating("A"));
    }

    #[test]
    fn test_from_games_orders_by_date() {
        let mut later = make_game("A", "B", 70, 90);
        later.date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let earlier = make_game("A", "B", 90, 70);

        let forwards =
            EloRatings::from_games(&[earlier.clone(), later.clone()], EloConfig::default());
        let backwards = EloRatings::from_games(&[later, earlier], EloConfig::default());

        assert_eq!(forwards.get_rating("A"), backwards.get_rating("A"));
        assert_eq!(forwards.standings().len(), 2);
    }
}
