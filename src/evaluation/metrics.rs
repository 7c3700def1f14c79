//! Error metrics for graded predictions

use crate::EvaluatedPrediction;
use serde::Serialize;
use std::fmt;

/// Summary of prediction quality against real results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Number of predictions with a completed game
    pub games: usize,
    /// Mean absolute error of the differential
    pub mae: f64,
    /// Median absolute error of the differential
    pub median_error: f64,
    /// Share of games where the winner was called correctly
    pub winner_accuracy: f64,
    /// Mean signed error of the predicted home score
    pub mean_home_error: Option<f64>,
    /// Mean signed error of the predicted away score
    pub mean_away_error: Option<f64>,
    /// Mean signed error of the differential
    pub mean_diff_error: f64,
    pub rmse: f64,
}

impl EvaluationReport {
    /// Compute the report, or None when nothing has been graded yet
    pub fn from_rows(rows: &[EvaluatedPrediction]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let n = rows.len() as f64;

        let errors: Vec<f64> = rows.iter().map(EvaluatedPrediction::diff_error).collect();
        let mut absolute: Vec<f64> = errors.iter().map(|e| e.abs()).collect();
        absolute.sort_by(f64::total_cmp);

        let correct = rows.iter().filter(|r| r.winner_correct()).count();

        Some(EvaluationReport {
            games: rows.len(),
            mae: absolute.iter().sum::<f64>() / n,
            median_error: median(&absolute),
            winner_accuracy: correct as f64 / n,
            mean_home_error: mean_signed(
                rows.iter()
                    .filter_map(|r| r.predicted_home_score.map(|p| p as f64 - r.home_score as f64)),
            ),
            mean_away_error: mean_signed(
                rows.iter()
                    .filter_map(|r| r.predicted_away_score.map(|p| p as f64 - r.away_score as f64)),
            ),
            mean_diff_error: errors.iter().sum::<f64>() / n,
            rmse: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
        })
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total evaluated games: {}", self.games)?;
        writeln!(f, "Mean Absolute Error (MAE): {:.2}", self.mae)?;
        writeln!(f, "Median Absolute Error: {:.2}", self.median_error)?;
        writeln!(
            f,
            "Correct winner prediction: {:.1}%",
            self.winner_accuracy * 100.0
        )?;
        if let Some(e) = self.mean_home_error {
            writeln!(f, "Avg error (home score): {:.4}", e)?;
        }
        if let Some(e) = self.mean_away_error {
            writeln!(f, "Avg error (away score): {:.4}", e)?;
        }
        writeln!(f, "Avg error (score diff): {:.4}", self.mean_diff_error)?;
        write!(f, "RMSE (score diff): {:.4}", self.rmse)
    }
}

/// Median of sorted data
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn mean_signed(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
