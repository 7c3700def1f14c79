//! Prediction runs
//!
//! Fit a model on stored history, predict every scheduled game for a date
//! and persist the results.

pub mod bias;
pub mod inference;

pub use bias::{run_bias_corrected, BiasCorrectedPredictor, TeamBiases};
pub use inference::{run_elo_ridge, EloRidgePredictor};

use crate::model::ConfidenceBounds;
use crate::PredictionRecord;

/// Per-run knobs supplied on the command line
#[derive(Debug, Clone, Copy)]
pub struct PredictOptions {
    /// Scale applied to the residual spread before simulating
    pub std_multiplier: f64,
    pub bounds: ConfidenceBounds,
    pub seed: Option<u64>,
}

/// Outcome of predicting one date
#[derive(Debug, Clone, Default)]
pub struct PredictionRun {
    /// Games found on the schedule
    pub scheduled: usize,
    /// Games left out because a team had no history
    pub skipped: usize,
    pub predictions: Vec<PredictionRecord>,
}

/// Human readable block for one prediction
pub fn format_prediction(p: &PredictionRecord) -> String {
    let coverage = p.ci_upper_bound - p.ci_lower_bound;
    format!(
        "{} @ {} on {}\n  \
         Prediction: {} {} - {} {}\n  \
         Projected winner: {} (diff = {:.2})\n  \
         Win probability: {:.1}%\n  \
         {}% CI for score diff: {:.1} to {:.1}",
        p.away_team,
        p.home_team,
        p.date,
        p.home_team,
        p.predicted_home_score,
        p.predicted_away_score,
        p.away_team,
        p.predicted_winner(),
        p.predicted_diff,
        p.win_probability * 100.0,
        coverage,
        p.conf_low,
        p.conf_high
    )
}
