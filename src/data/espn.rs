//! ESPN scoreboard API client
//!
//! The scoreboard endpoint serves results for finished games and kickoff
//! times for upcoming ones. Games are keyed by their calendar date in the
//! configured local timezone so that results, schedule and predictions join.

use super::scrapers::with_retry;
use crate::{DataSource, EspnConfig, GameRecord, Result, ScheduledGame, WnbaError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

/// Client for the ESPN scoreboard endpoint
pub struct EspnClient {
    client: reqwest::blocking::Client,
    scoreboard_url: String,
    timezone: Tz,
    max_attempts: u32,
}

impl EspnClient {
    pub fn new(config: &EspnConfig, timezone: Tz) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(EspnClient {
            client,
            scoreboard_url: config.scoreboard_url.clone(),
            timezone,
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Fetch the scoreboard for a date, or the current one when `date` is None
    pub fn fetch_scoreboard(&self, date: Option<NaiveDate>) -> Result<Scoreboard> {
        let mut request = self.client.get(&self.scoreboard_url);
        if let Some(d) = date {
            request = request.query(&[("dates", d.format("%Y%m%d").to_string())]);
        }
        let label = date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "today".to_string());

        with_retry(
            || {
                let request = request.try_clone().ok_or_else(|| WnbaError::Scraper {
                    data_source: DataSource::Espn,
                    message: "request cannot be retried".to_string(),
                })?;
                log::debug!("Fetching ESPN scoreboard for {}", label);
                let response = request.send()?;
                if !response.status().is_success() {
                    return Err(WnbaError::HttpStatus {
                        data_source: DataSource::Espn,
                        status: response.status().as_u16(),
                        url: response.url().to_string(),
                    });
                }
                let body = response.text()?;
                Scoreboard::from_json(&body)
            },
            self.max_attempts,
        )
    }

    /// Game rows for a scoreboard; `completed_only` drops unfinished games
    pub fn fetch_results(
        &self,
        date: Option<NaiveDate>,
        completed_only: bool,
    ) -> Result<Vec<GameRecord>> {
        let scoreboard = self.fetch_scoreboard(date)?;
        Ok(scoreboard.results(&self.timezone, completed_only))
    }

    /// Scheduled games on a date
    pub fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>> {
        let scoreboard = self.fetch_scoreboard(Some(date))?;
        Ok(scoreboard.schedule(&self.timezone))
    }
}

/// Scoreboard response body
#[derive(Debug, Clone, Deserialize)]
pub struct Scoreboard {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub competitions: Vec<Competition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Competition {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub competitors: Vec<Competitor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    #[serde(rename = "type", default)]
    pub kind: Option<StatusType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusType {
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Competitor {
    #[serde(rename = "homeAway")]
    pub home_away: String,
    /// Usually a numeric string; empty before tip-off
    #[serde(default)]
    pub score: Option<serde_json::Value>,
    pub team: TeamRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl Competitor {
    /// Parsed score, None when blank
    pub fn score(&self) -> Result<Option<u16>> {
        match &self.score {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| WnbaError::Parse(format!("invalid score '{}'", s))),
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| WnbaError::Parse(format!("invalid score {}", n))),
            Some(other) => Err(WnbaError::Parse(format!("unexpected score value {}", other))),
        }
    }
}

/// Teams and kickoff extracted from one event
struct ParsedEvent<'a> {
    home: &'a Competitor,
    away: &'a Competitor,
    kickoff: DateTime<Utc>,
    completed: bool,
}

impl Scoreboard {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Game rows, skipping events that fail to parse
    pub fn results(&self, tz: &Tz, completed_only: bool) -> Vec<GameRecord> {
        let mut games = Vec::new();
        for event in &self.events {
            let parsed = match parse_event(event) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Failed to parse game {}: {}", event_label(event), e);
                    continue;
                }
            };
            if completed_only && !parsed.completed {
                continue;
            }
            let (home_score, away_score) = match (parsed.home.score(), parsed.away.score()) {
                (Ok(home), Ok(away)) => (home, away),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Failed to parse score for {}: {}", event_label(event), e);
                    continue;
                }
            };
            if completed_only && (home_score.is_none() || away_score.is_none()) {
                log::warn!("Completed game {} has no score", event_label(event));
                continue;
            }
            // Scores before tip-off and during play are not results
            let (home_score, away_score) = if parsed.completed {
                (home_score, away_score)
            } else {
                (None, None)
            };

            games.push(GameRecord {
                date: parsed.kickoff.with_timezone(tz).date_naive(),
                home_team: parsed.home.team.display_name.clone(),
                away_team: parsed.away.team.display_name.clone(),
                home_score,
                away_score,
                source: Some(DataSource::Espn),
            });
        }
        games
    }

    /// Scheduled games with UTC and local kickoff times
    pub fn schedule(&self, tz: &Tz) -> Vec<ScheduledGame> {
        let mut games = Vec::new();
        for event in &self.events {
            let parsed = match parse_event(event) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Failed to parse fixture {}: {}", event_label(event), e);
                    continue;
                }
            };
            let local = parsed.kickoff.with_timezone(tz);
            games.push(ScheduledGame {
                date: local.date_naive(),
                home_team: parsed.home.team.display_name.clone(),
                away_team: parsed.away.team.display_name.clone(),
                game_time: Some(parsed.kickoff.to_rfc3339()),
                game_time_local: Some(local.to_rfc3339()),
                source: Some(DataSource::Espn),
            });
        }
        games
    }
}

fn event_label(event: &Event) -> String {
    event.id.clone().unwrap_or_else(|| "<unknown>".to_string())
}

fn parse_event(event: &Event) -> Result<ParsedEvent<'_>> {
    let competition = event
        .competitions
        .first()
        .ok_or_else(|| WnbaError::Parse("event has no competitions".to_string()))?;

    let side = |name: &str| {
        competition
            .competitors
            .iter()
            .find(|c| c.home_away.eq_ignore_ascii_case(name))
            .ok_or_else(|| WnbaError::Parse(format!("no {} competitor", name)))
    };
    let home = side("home")?;
    let away = side("away")?;

    let raw_date = competition
        .date
        .as_deref()
        .or(event.date.as_deref())
        .ok_or_else(|| WnbaError::Parse("event has no date".to_string()))?;
    let kickoff = parse_espn_datetime(raw_date)?;

    let completed = competition
        .status
        .as_ref()
        .and_then(|s| s.kind.as_ref())
        .map(|k| k.completed)
        .unwrap_or(false);

    Ok(ParsedEvent {
        home,
        away,
        kickoff,
        completed,
    })
}

/// Parse ESPN timestamps, which often omit seconds (`2024-06-01T17:00Z`)
pub fn parse_espn_datetime(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(WnbaError::Parse(format!("invalid timestamp '{}'", value)))
}
