//! Ridge regression with optional feature standardisation
//!
//! Closed-form fit of `(XᵀX + αI) w = Xᵀy` on centred data. The intercept is
//! the target mean and is never penalised.

use crate::{Result, WnbaError};

/// Per-column standardisation to zero mean and unit variance
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    /// Constant columns get a scale of 1.
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let dim = check_matrix(x)?;
        let n = x.len() as f64;

        let means: Vec<f64> = (0..dim)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let scales = (0..dim)
            .map(|j| {
                let var = x.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(StandardScaler { means, scales })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// L2-regularised linear regression
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeRegression {
    pub alpha: f64,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl RidgeRegression {
    pub fn fit(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<Self> {
        let dim = check_matrix(x)?;
        if x.len() != y.len() {
            return Err(WnbaError::Model(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if !(alpha >= 0.0) {
            return Err(WnbaError::Model(format!("invalid ridge alpha {}", alpha)));
        }

        let n = x.len() as f64;
        let x_means: Vec<f64> = (0..dim)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        // Normal equations on centred data
        let mut gram = vec![vec![0.0; dim]; dim];
        let mut rhs = vec![0.0; dim];
        for (row, target) in x.iter().zip(y) {
            let centred: Vec<f64> = row.iter().zip(&x_means).map(|(v, m)| v - m).collect();
            let yc = target - y_mean;
            for i in 0..dim {
                rhs[i] += centred[i] * yc;
                for j in 0..dim {
                    gram[i][j] += centred[i] * centred[j];
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += alpha;
        }

        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_means)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(RidgeRegression {
            alpha,
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }
}

/// Standardisation followed by ridge regression
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledRidge {
    pub scaler: StandardScaler,
    pub ridge: RidgeRegression,
}

impl ScaledRidge {
    pub fn fit(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<Self> {
        let scaler = StandardScaler::fit(x)?;
        let ridge = RidgeRegression::fit(&scaler.transform(x), y, alpha)?;
        Ok(ScaledRidge { scaler, ridge })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.ridge.predict(&self.scaler.transform_row(row))
    }
}

/// A fitted regressor over plain feature rows
pub trait Regressor {
    fn predict_row(&self, row: &[f64]) -> f64;

    /// Root mean squared error over a dataset
    fn residual_std(&self, x: &[Vec<f64>], y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let sse: f64 = x
            .iter()
            .zip(y)
            .map(|(row, target)| (self.predict_row(row) - target).powi(2))
            .sum();
        (sse / y.len() as f64).sqrt()
    }
}

impl Regressor for RidgeRegression {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.predict(row)
    }
}

impl Regressor for ScaledRidge {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.predict(row)
    }
}

fn check_matrix(x: &[Vec<f64>]) -> Result<usize> {
    let dim = x
        .first()
        .map(|row| row.len())
        .ok_or_else(|| WnbaError::Model("no training rows".to_string()))?;
    if dim == 0 {
        return Err(WnbaError::Model("no feature columns".to_string()));
    }
    if let Some(bad) = x.iter().position(|row| row.len() != dim) {
        return Err(WnbaError::Model(format!(
            "row {} has {} features, expected {}",
            bad,
            x[bad].len(),
            dim
        )));
    }
    Ok(dim)
}

/// Solve a square linear system by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(WnbaError::Model(
                "singular system; increase ridge alpha".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    Ok(solution)
}
