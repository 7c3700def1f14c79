//! basketball-reference.com scraper for historical WNBA seasons
//!
//! Parses the season "games" page, one table per month. Supports caching
//! HTML files for offline runs and reduced load.

use super::{with_retry, Scraper};
use crate::{ArchiveConfig, DataSource, GameRecord, Result, WnbaError};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DATE_FORMAT: &str = "%a, %b %d, %Y";

/// Scraper for basketball-reference season pages
pub struct BasketballReferenceScraper {
    client: reqwest::blocking::Client,
    season_url: String,
    request_delay: Duration,
    max_attempts: u32,
    cache_dir: Option<PathBuf>,
    /// If true, only use cache (no network requests)
    offline_only: bool,
    selectors: RowSelectors,
    footnote: Regex,
}

struct RowSelectors {
    rows: Selector,
    date: Selector,
    team: Selector,
    points: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| WnbaError::Parse(format!("bad selector {}: {}", css, e)))
}

impl BasketballReferenceScraper {
    pub fn new(config: &ArchiveConfig, user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(BasketballReferenceScraper {
            client,
            season_url: config.season_url.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_attempts: 2,
            cache_dir: None,
            offline_only: false,
            selectors: RowSelectors {
                rows: selector("table > tbody > tr")?,
                date: selector(r#"th[data-stat="date_game"]"#)?,
                team: selector(r#"td[data-stat="team_name"]"#)?,
                points: selector(r#"td[data-stat="pts"]"#)?,
            },
            footnote: Regex::new(r"\s*(\[[^\]]*\]|\*)\s*$")
                .map_err(|e| WnbaError::Parse(e.to_string()))?,
        })
    }

    /// Create scraper with a cache directory
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    /// Set offline-only mode (no network requests, cache must exist)
    pub fn offline_only(mut self, offline: bool) -> Self {
        self.offline_only = offline;
        self
    }

    pub fn season_url(&self, year: u16) -> String {
        self.season_url.replace("{season}", &year.to_string())
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            let filename = url
                .replace("https://", "")
                .replace("http://", "")
                .replace(['/', '?'], "_")
                + if url.ends_with(".html") { "" } else { ".html" };
            dir.join(filename)
        })
    }

    fn load_from_cache(&self, url: &str) -> Option<String> {
        let path = self.cache_path(url)?;
        if path.exists() {
            log::debug!("Loading from cache: {}", path.display());
            std::fs::read_to_string(&path).ok()
        } else {
            None
        }
    }

    fn save_to_cache(&self, url: &str, html: &str) -> Result<()> {
        if let Some(path) = self.cache_path(url) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, html)?;
            log::debug!("Saved to cache: {}", path.display());
        }
        Ok(())
    }

    fn fetch_page(&self, url: &str) -> Result<String> {
        if let Some(cached) = self.load_from_cache(url) {
            return Ok(cached);
        }
        if self.offline_only {
            return Err(WnbaError::Scraper {
                data_source: DataSource::BasketballReference,
                message: format!("No cached data for {} (offline mode)", url),
            });
        }

        let html = with_retry(
            || {
                let response = self.client.get(url).send()?;
                if !response.status().is_success() {
                    return Err(WnbaError::HttpStatus {
                        data_source: DataSource::BasketballReference,
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    });
                }
                Ok(response.text()?)
            },
            self.max_attempts,
        )?;

        if let Err(e) = self.save_to_cache(url, &html) {
            log::warn!("Failed to cache {}: {}", url, e);
        }
        Ok(html)
    }

    /// Parse a season page into completed games
    pub fn parse_page(&self, html: &str) -> Vec<GameRecord> {
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.rows)
            .filter(|row| !row.value().classes().any(|c| c == "thead"))
            .filter_map(|row| self.parse_row(&row))
            .collect()
    }

    fn parse_row(&self, row: &ElementRef) -> Option<GameRecord> {
        let date_text = cell_text(&row.select(&self.selectors.date).next()?);
        let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).ok()?;

        let teams: Vec<String> = row
            .select(&self.selectors.team)
            .map(|c| self.clean_team_name(&cell_text(&c)))
            .collect();
        if teams.len() != 2 || teams.iter().any(|t| t.is_empty()) {
            return None;
        }

        let points: Vec<u16> = row
            .select(&self.selectors.points)
            .map(|c| cell_text(&c).parse().ok())
            .collect::<Option<Vec<_>>>()?;
        if points.len() != 2 {
            return None;
        }

        // Visitors are listed first
        Some(GameRecord {
            date,
            home_team: teams[1].clone(),
            away_team: teams[0].clone(),
            home_score: Some(points[1]),
            away_score: Some(points[0]),
            source: Some(DataSource::BasketballReference),
        })
    }

    fn clean_team_name(&self, name: &str) -> String {
        let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
        self.footnote.replace(&collapsed, "").into_owned()
    }
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

impl Scraper for BasketballReferenceScraper {
    fn source(&self) -> DataSource {
        DataSource::BasketballReference
    }

    fn fetch_season(&self, year: u16) -> Result<Vec<GameRecord>> {
        let url = self.season_url(year);
        let html = self.fetch_page(&url)?;
        Ok(self.parse_page(&html))
    }

    fn needs_request(&self, year: u16) -> bool {
        let cached = self
            .cache_path(&self.season_url(year))
            .is_some_and(|p| p.exists());
        !cached && !self.offline_only
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEASON_HTML: &str = r#"<html><body>
<table id="schedule">
  <thead><tr><th>Date</th><th>Visitor</th><th>PTS</th><th>Home</th><th>PTS</th></tr></thead>
  <tbody>
    <tr>
      <th data-stat="date_game">Fri, May 18, 2018</th>
      <td data-stat="team_name">Connecticut Sun</td>
      <td data-stat="pts">101</td>
      <td data-stat="team_name">Phoenix Mercury*</td>
      <td data-stat="pts">74</td>
    </tr>
    <tr class="thead"><th data-stat="date_game">Date</th></tr>
    <tr>
      <th data-stat="date_game">Sat, May 19, 2018</th>
      <td data-stat="team_name">Minnesota  Lynx</td>
      <td data-stat="pts">71</td>
      <td data-stat="team_name">Los Angeles Sparks</td>
      <td data-stat="pts">77</td>
    </tr>
    <tr>
      <th data-stat="date_game">Sun, May 20, 2018</th>
      <td data-stat="team_name">Dallas Wings</td>
      <td data-stat="pts"></td>
      <td data-stat="team_name">Atlanta Dream</td>
      <td data-stat="pts"></td>
    </tr>
    <tr>
      <th data-stat="date_game">Not a date</th>
      <td data-stat="team_name">Dallas Wings</td>
      <td data-stat="pts">80</td>
      <td data-stat="team_name">Atlanta Dream</td>
      <td data-stat="pts">82</td>
    </tr>
  </tbody>
</table>
<table id="playoffs"><tbody>
    <tr>
      <th data-stat="date_game">Sun, Sep 9, 2018</th>
      <td data-stat="team_name">Washington Mystics</td>
      <td data-stat="pts">73</td>
      <td data-stat="team_name">Seattle Storm</td>
      <td data-stat="pts">89</td>
    </tr>
</tbody></table>
</body></html>"#;

    fn scraper() -> BasketballReferenceScraper {
        BasketballReferenceScraper::new(&ArchiveConfig::default(), "test-agent", 5).unwrap()
    }

    #[test]
    fn test_parse_season_page() {
        let games = scraper().parse_page(SEASON_HTML);

        assert_eq!(games.len(), 3);
        let first = &games[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2018, 5, 18).unwrap());
        assert_eq!(first.home_team, "Phoenix Mercury");
        assert_eq!(first.away_team, "Connecticut Sun");
        assert_eq!(first.home_score, Some(74));
        assert_eq!(first.away_score, Some(101));
        assert_eq!(first.source, Some(DataSource::BasketballReference));

        assert_eq!(games[1].away_team, "Minnesota Lynx");
        assert_eq!(games[2].home_team, "Seattle Storm");
    }

    #[test]
    fn test_unplayed_and_malformed_rows_skipped() {
        let games = scraper().parse_page(SEASON_HTML);
        assert!(games.iter().all(|g| g.home_team != "Atlanta Dream"));
    }

    #[test]
    fn test_empty_html() {
        assert!(scraper().parse_page("<html></html>").is_empty());
    }

    #[test]
    fn test_season_url() {
        assert_eq!(
            scraper().season_url(2021),
            "https://www.basketball-reference.com/wnba/years/2021_games.html"
        );
    }

    #[test]
    fn test_team_name_cleanup() {
        let s = scraper();
        assert_eq!(s.clean_team_name("Seattle Storm*"), "Seattle Storm");
        assert_eq!(s.clean_team_name("Las Vegas  Aces [1]"), "Las Vegas Aces");
        assert_eq!(s.clean_team_name("  Chicago Sky "), "Chicago Sky");
    }

    #[test]
    fn test_cached_season_needs_no_request() {
        let dir = std::env::temp_dir().join("wnba-predict-season-cache");
        let s = scraper().with_cache(&dir);
        let path = s.cache_path(&s.season_url(2019)).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, SEASON_HTML).unwrap();

        assert!(!s.needs_request(2019));
        assert!(s.needs_request(1991));
        assert_eq!(s.fetch_seasons(2019, 2019).len(), 3);

        let offline = scraper().with_cache(&dir).offline_only(true);
        assert!(!offline.needs_request(1991));
    }

    #[test]
    fn test_offline_without_cache_fails() {
        let dir = std::env::temp_dir().join("wnba-predict-empty-cache");
        let s = scraper().with_cache(&dir).offline_only(true);
        let err = s.fetch_season(1990).unwrap_err();
        assert!(matches!(err, WnbaError::Scraper { .. }));
    }
}
