//! Feature extraction
//!
//! Converts completed game history into model-ready features.

pub mod elo;
pub mod form;
pub mod matchup;

pub use elo::{EloConfig, EloRatings};
pub use form::{FormConfig, Side, TeamHistory};
pub use matchup::{FeatureBuilder, MatchupFeatures, TrainingSet};
