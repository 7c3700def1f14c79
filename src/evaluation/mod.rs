//! Grading stored predictions against final scores

pub mod metrics;

pub use metrics::EvaluationReport;

use crate::data::Database;
use crate::{EvaluatedPrediction, Result};

/// Graded predictions plus their summary
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Newest first
    pub rows: Vec<EvaluatedPrediction>,
    pub report: Option<EvaluationReport>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Join every stored prediction with its completed game and score it
pub fn evaluate(db: &Database) -> Result<Evaluation> {
    let rows = db.get_evaluated_predictions()?;
    let report = EvaluationReport::from_rows(&rows);
    log::debug!("Graded {} predictions", rows.len());
    Ok(Evaluation { rows, report })
}

/// Per-game table, one line per graded prediction
pub fn format_details(rows: &[EvaluatedPrediction]) -> String {
    let mut out = format!(
        "{:<10}  {:<24}  {:<24}  {:>9}  {:>9}  {:>7}  {:>7}  {:>6}  {}\n",
        "Date", "Away", "Home", "Predicted", "Actual", "P.Diff", "A.Diff", "Error", "Winner"
    );
    for row in rows {
        let predicted = match (row.predicted_home_score, row.predicted_away_score) {
            (Some(h), Some(a)) => format!("{}-{}", h, a),
            _ => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<10}  {:<24}  {:<24}  {:>9}  {:>9}  {:>7.1}  {:>7.0}  {:>6.1}  {}\n",
            row.date,
            row.away_team,
            row.home_team,
            predicted,
            format!("{}-{}", row.home_score, row.away_score),
            row.predicted_diff,
            row.actual_diff(),
            row.diff_error().abs(),
            if row.winner_correct() { "yes" } else { "no" }
        ));
    }
    out
}

/// Summary as a CSV header plus one row; missing score errors are blank
pub fn summary_csv(report: &EvaluationReport) -> String {
    let optional = |v: Option<f64>| v.map(|e| format!("{:.4}", e)).unwrap_or_default();
    format!(
        "games,mae,median_error,winner_accuracy,\
         mean_home_error,mean_away_error,mean_diff_error,rmse\n\
         {},{:.4},{:.4},{:.4},{},{},{:.4},{:.4}\n",
        report.games,
        report.mae,
        report.median_error,
        report.winner_accuracy,
        optional(report.mean_home_error),
        optional(report.mean_away_error),
        report.mean_diff_error,
        report.rmse
    )
}

/// Graded predictions as CSV, one row per game
pub fn details_csv(rows: &[EvaluatedPrediction]) -> String {
    let mut out = String::from(
        "date,home,away,predicted_home,predicted_away,home_score,away_score,\
         predicted_diff,actual_diff,error,winner_correct\n",
    );
    for row in rows {
        let score = |v: Option<i64>| v.map(|s| s.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{:.2},{:.0},{:.2},{}\n",
            row.date,
            row.home_team,
            row.away_team,
            score(row.predicted_home_score),
            score(row.predicted_away_score),
            row.home_score,
            row.away_score,
            row.predicted_diff,
            row.actual_diff(),
            row.diff_error(),
            row.winner_correct()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataSource, GameRecord, ModelKind, PredictionRecord};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn prediction(day: u32, diff: f64) -> PredictionRecord {
        PredictionRecord {
            date: date(day),
            home_team: "Fever".to_string(),
            away_team: "Wings".to_string(),
            predicted_home_score: 82,
            predicted_away_score: 78,
            predicted_diff: diff,
            win_probability: 0.6,
            conf_low: -15.0,
            conf_high: 23.0,
            ci_lower_bound: 2.5,
            ci_upper_bound: 97.5,
            std_multiplier: 1.0,
            model: ModelKind::EloRidge,
        }
    }

    fn result(day: u32, home: Option<u16>, away: Option<u16>) -> GameRecord {
        GameRecord {
            date: date(day),
            home_team: "Fever".to_string(),
            away_team: "Wings".to_string(),
            home_score: home,
            away_score: away,
            source: Some(DataSource::Espn),
        }
    }

    #[test]
    fn test_nothing_to_grade() {
        let db = Database::in_memory().unwrap();
        db.save_prediction(&prediction(1, 4.0)).unwrap();
        // Game not played yet
        db.insert_games(&[result(1, None, None)]).unwrap();

        let evaluation = evaluate(&db).unwrap();
        assert!(evaluation.is_empty());
        assert!(evaluation.report.is_none());
    }

    #[test]
    fn test_graded_newest_first() {
        let db = Database::in_memory().unwrap();
        db.save_prediction(&prediction(1, 4.0)).unwrap();
        db.save_prediction(&prediction(3, -2.0)).unwrap();
        db.insert_games(&[result(1, Some(88), Some(80)), result(3, Some(90), Some(85))])
            .unwrap();

        let evaluation = evaluate(&db).unwrap();
        assert_eq!(evaluation.rows.len(), 2);
        assert_eq!(evaluation.rows[0].date, date(3));

        let report = evaluation.report.unwrap();
        assert_eq!(report.games, 2);
        assert_eq!(report.winner_accuracy, 0.5);
        // Errors 4 - 8 = -4 and -2 - 5 = -7
        assert!((report.mae - 5.5).abs() < 1e-12);

        let table = format_details(&evaluation.rows);
        assert_eq!(table.lines().count(), 3);
        assert!(table.lines().nth(1).unwrap().starts_with("2024-07-03"));
        assert!(table.contains("82-78"));
    }

    #[test]
    fn test_csv_output() {
        let db = Database::in_memory().unwrap();
        db.save_prediction(&prediction(1, 4.0)).unwrap();
        db.insert_games(&[result(1, Some(88), Some(80))]).unwrap();
        let evaluation = evaluate(&db).unwrap();

        let summary = summary_csv(evaluation.report.as_ref().unwrap());
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("games,mae,"));
        // Predicted 82-78 against 88-80
        assert_eq!(lines[1], "1,4.0000,4.0000,1.0000,-6.0000,-2.0000,-4.0000,4.0000");

        let details = details_csv(&evaluation.rows);
        let lines: Vec<&str> = details.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2024-07-01,Fever,Wings,82,78,88,80,4.00,8,-4.00,true");
    }
}
