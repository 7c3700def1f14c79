//! Rolling form and rest features
//!
//! Per-team view of completed games, used to compute features as of a given
//! date. Only games strictly before that date are considered.

use crate::CompletedGame;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Which side of a game a team played on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// Form and rest settings
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Games averaged for rolling form
    pub window: usize,
    /// Rest days assumed for a team with no previous game
    pub default_rest_days: i64,
    /// Upper bound on rest days
    pub max_rest_days: i64,
}

impl Default for FormConfig {
    fn default() -> Self {
        FormConfig {
            window: 5,
            default_rest_days: 7,
            max_rest_days: 14,
        }
    }
}

/// Completed games indexed by team, in date order
#[derive(Debug, Clone)]
pub struct TeamHistory {
    games: Vec<CompletedGame>,
    by_team: HashMap<String, Vec<usize>>,
}

impl TeamHistory {
    pub fn new(games: &[CompletedGame]) -> Self {
        let mut games = games.to_vec();
        games.sort_by_key(|g| g.date);

        let mut by_team: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, game) in games.iter().enumerate() {
            by_team.entry(game.home_team.clone()).or_default().push(i);
            by_team.entry(game.away_team.clone()).or_default().push(i);
        }

        TeamHistory { games, by_team }
    }

    pub fn games(&self) -> &[CompletedGame] {
        &self.games
    }

    /// The team's games before `date`, oldest first
    pub fn games_before<'a>(
        &'a self,
        team: &str,
        date: NaiveDate,
    ) -> impl Iterator<Item = &'a CompletedGame> + 'a {
        self.by_team
            .get(team)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.games[i])
            .filter(move |g| g.date < date)
    }

    /// Mean score differential from the team's perspective over its last
    /// `window` games on the given side before `date`. Zero without history.
    pub fn form(&self, team: &str, date: NaiveDate, side: Side, window: usize) -> f64 {
        let on_side: Vec<&CompletedGame> = self
            .games_before(team, date)
            .filter(|g| match side {
                Side::Home => g.home_team == team,
                Side::Away => g.away_team == team,
            })
            .collect();

        let recent = &on_side[on_side.len().saturating_sub(window)..];
        if recent.is_empty() {
            return 0.0;
        }

        let mean = recent.iter().map(|g| g.score_diff()).sum::<f64>() / recent.len() as f64;
        match side {
            Side::Home => mean,
            Side::Away => -mean,
        }
    }

    /// Days since the team's previous game, capped
    pub fn rest_days(&self, team: &str, date: NaiveDate, config: &FormConfig) -> i64 {
        match self.games_before(team, date).last() {
            Some(last) => (date - last.date).num_days().min(config.max_rest_days),
            None => config.default_rest_days,
        }
    }

    /// Mean points scored by the team over its last `window` games before `date`
    pub fn recent_points(&self, team: &str, date: NaiveDate, window: usize) -> Option<f64> {
        let points: Vec<f64> = self
            .games_before(team, date)
            .filter_map(|g| g.points_for(team))
            .map(f64::from)
            .collect();

        let recent = &points[points.len().saturating_sub(window)..];
        if recent.is_empty() {
            None
        } else {
            Some(recent.iter().sum::<f64>() / recent.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn game(day: u32, home: &str, away: &str, hs: u16, aws: u16) -> CompletedGame {
        CompletedGame {
            date: d(day),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: aws,
        }
    }

    fn history() -> TeamHistory {
        TeamHistory::new(&[
            game(5, "Aces", "Storm", 90, 80),
            game(1, "Aces", "Sky", 70, 75),
            game(8, "Storm", "Aces", 85, 88),
            game(10, "Sky", "Storm", 60, 66),
        ])
    }

    #[test]
    fn test_home_form() {
        let h = history();
        // Aces home games before the 20th: -5 and +10
        assert_eq!(h.form("Aces", d(20), Side::Home, 5), 2.5);
        // Window of one keeps the most recent
        assert_eq!(h.form("Aces", d(20), Side::Home, 1), 10.0);
    }

    #[test]
    fn test_away_form_is_negated() {
        let h = history();
        // Aces won 88-85 away: home diff -3, so away form +3
        assert_eq!(h.form("Aces", d(20), Side::Away, 5), 3.0);
    }

    #[test]
    fn test_form_only_uses_earlier_games() {
        let h = history();
        assert_eq!(h.form("Aces", d(5), Side::Home, 5), -5.0);
        assert_eq!(h.form("Aces", d(1), Side::Home, 5), 0.0);
        assert_eq!(h.form("Lynx", d(20), Side::Home, 5), 0.0);
    }

    #[test]
    fn test_rest_days() {
        let h = history();
        let config = FormConfig::default();
        assert_eq!(h.rest_days("Storm", d(12), &config), 2);
        assert_eq!(h.rest_days("Aces", d(30), &config), 14);
        assert_eq!(h.rest_days("Aces", d(1), &config), 7);
        assert_eq!(h.rest_days("Lynx", d(12), &config), 7);
    }

    #[test]
    fn test_recent_points() {
        let h = history();
        // Storm scored 80, 85, 66
        assert_eq!(h.recent_points("Storm", d(20), 5), Some(77.0));
        assert_eq!(h.recent_points("Storm", d(20), 2), Some(75.5));
        assert_eq!(h.recent_points("Storm", d(1), 5), None);
    }
}
