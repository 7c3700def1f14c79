//! Regression models and outcome simulation

pub mod ridge;
pub mod simulation;

pub use ridge::{Regressor, RidgeRegression, ScaledRidge, StandardScaler};
pub use simulation::{percentile, ConfidenceBounds, MonteCarlo, SimulationSummary};
