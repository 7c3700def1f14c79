//! Web scrapers for historical game data

pub mod basketball_reference;

pub use basketball_reference::BasketballReferenceScraper;

use crate::{DataSource, GameRecord, Result};
use std::time::Duration;

/// Trait for historical archive scrapers
pub trait Scraper {
    /// The data source this scraper fetches from
    fn source(&self) -> DataSource;

    /// Fetch completed games for a season
    fn fetch_season(&self, year: u16) -> Result<Vec<GameRecord>>;

    /// Whether fetching `year` will hit the network
    fn needs_request(&self, _year: u16) -> bool {
        true
    }

    /// Pause between network requests
    fn request_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Fetch an inclusive range of seasons, skipping ones that fail.
    /// Sleeps between seasons that went over the network.
    fn fetch_seasons(&self, start_year: u16, end_year: u16) -> Vec<GameRecord> {
        let mut all_games = Vec::new();
        for year in start_year..=end_year {
            log::info!("Fetching {} season from {}...", year, self.source());
            let networked = self.needs_request(year);
            match self.fetch_season(year) {
                Ok(games) => {
                    log::info!("  Found {} games", games.len());
                    all_games.extend(games);
                }
                Err(e) => log::warn!("Failed to fetch {} season: {}", year, e),
            }
            let delay = self.request_delay();
            if networked && year < end_year && !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
        all_games
    }
}

/// Retry an operation with exponential backoff.
/// Only transient failures are retried.
pub fn with_retry<T, F>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                log::warn!("Attempt {} failed: {}", attempt + 1, e);
                let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
