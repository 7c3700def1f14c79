//! Data ingestion and storage
//!
//! ESPN scoreboard client, historical archive scrapers and SQLite storage.

pub mod database;
pub mod espn;
pub mod scrapers;

pub use database::{Database, UpsertOutcome};
pub use espn::EspnClient;
