//! ESPN scoreboard adapter.
//!
//! Uses the public site API; no credentials required. Events come back under
//! `events[]` with a nested competition carrying competitors and venue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::EspnConfig;
use crate::domain::{GameStatus, NormalizedResult};
use crate::error::{Result, TallyError};

use super::http::ProviderHttp;
use super::{id_string, parse_datetime_utc, parse_score, ProviderKind, SportsProvider};

pub struct EspnProvider {
    http: ProviderHttp,
    base_url: String,
}

impl EspnProvider {
    pub fn new(config: &EspnConfig, http: ProviderHttp) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Map internal league names to ESPN sport/league path segments.
    fn league_path(league: &str) -> Option<&'static str> {
        match league {
            "NFL" => Some("football/nfl"),
            "NBA" => Some("basketball/nba"),
            "MLB" => Some("baseball/mlb"),
            "NHL" => Some("hockey/nhl"),
            "NCAA_BASKETBALL" => Some("basketball/mens-college-basketball"),
            "NCAA_FOOTBALL" => Some("football/college-football"),
            _ => None,
        }
    }

    fn event_state(event: &Value) -> String {
        event
            .get("status")
            .and_then(|s| s.get("type"))
            .and_then(|t| t.get("state"))
            .and_then(Value::as_str)
            .unwrap_or("pre")
            .to_ascii_lowercase()
    }

    fn parse_event(&self, event: &Value) -> Result<NormalizedResult> {
        let competition = event
            .get("competitions")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| TallyError::Parse("ESPN event has no competitions".to_string()))?;

        let competitors = competition
            .get("competitors")
            .and_then(Value::as_array)
            .filter(|c| c.len() >= 2)
            .ok_or_else(|| {
                TallyError::Parse("ESPN event has fewer than two competitors".to_string())
            })?;

        let mut home: Option<(String, Option<i32>)> = None;
        let mut away: Option<(String, Option<i32>)> = None;

        for competitor in competitors {
            let name = competitor
                .get("team")
                .and_then(|t| t.get("displayName"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let score = competitor.get("score").and_then(parse_score);

            if competitor.get("homeAway").and_then(Value::as_str) == Some("home") {
                home = Some((name, score));
            } else {
                away = Some((name, score));
            }
        }

        let (home_team, home_score) = home
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| TallyError::Parse("ESPN event missing home team".to_string()))?;
        let (away_team, away_score) = away
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| TallyError::Parse("ESPN event missing away team".to_string()))?;

        let status = match Self::event_state(event).as_str() {
            "in" => GameStatus::InProgress,
            "post" => GameStatus::Final,
            _ => GameStatus::Scheduled,
        };

        let scheduled_start_time = event
            .get("date")
            .and_then(Value::as_str)
            .and_then(parse_datetime_utc)
            .unwrap_or_else(Utc::now);

        let venue = competition
            .get("venue")
            .and_then(|v| v.get("fullName"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(NormalizedResult {
            provider: ProviderKind::Espn,
            external_id: event.get("id").map(id_string).unwrap_or_default(),
            home_team,
            away_team,
            scheduled_start_time,
            status,
            home_score,
            away_score,
            venue,
            raw: event.clone(),
        })
    }
}

#[async_trait]
impl SportsProvider for EspnProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Espn
    }

    async fn get_schedule(
        &self,
        league: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedResult>> {
        let Some(path) = Self::league_path(league) else {
            warn!("ESPN: no league mapping for {}", league);
            return Ok(Vec::new());
        };

        let url = format!("{}/{}/scoreboard", self.base_url, path);
        // ESPN takes a single YYYYMMDD date parameter
        let query = [("dates", start.format("%Y%m%d").to_string())];

        let response = self
            .http
            .get_json(ProviderKind::Espn, &url, &query, None)
            .await?;

        let mut games = Vec::new();
        for event in events(&response) {
            match self.parse_event(event) {
                Ok(result) => games.push(result),
                Err(e) => warn!("ESPN: skipping malformed event: {}", e),
            }
        }

        info!("ESPN: fetched {} games for {}", games.len(), league);
        Ok(games)
    }

    async fn get_live_results(&self, league: &str) -> Result<Vec<NormalizedResult>> {
        let Some(path) = Self::league_path(league) else {
            warn!("ESPN: no league mapping for {}", league);
            return Ok(Vec::new());
        };

        let url = format!("{}/{}/scoreboard", self.base_url, path);
        let response = self
            .http
            .get_json(ProviderKind::Espn, &url, &[], None)
            .await?;

        let mut games = Vec::new();
        for event in events(&response) {
            if !matches!(Self::event_state(event).as_str(), "in" | "live") {
                continue;
            }
            match self.parse_event(event) {
                Ok(result) => games.push(result),
                Err(e) => warn!("ESPN: skipping malformed event: {}", e),
            }
        }

        info!("ESPN: fetched {} live games for {}", games.len(), league);
        Ok(games)
    }

    async fn get_result(
        &self,
        league: &str,
        external_id: &str,
    ) -> Result<Option<NormalizedResult>> {
        let Some(path) = Self::league_path(league) else {
            warn!("ESPN: no league mapping for {}", league);
            return Ok(None);
        };

        let url = format!("{}/{}/summary", self.base_url, path);
        let query = [("event", external_id.to_string())];

        let response = self
            .http
            .get_json(ProviderKind::Espn, &url, &query, None)
            .await?;

        // The summary endpoint nests the event under "header"
        let Some(header) = response.get("header").filter(|h| h.is_object()) else {
            return Ok(None);
        };

        match self.parse_event(header) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!("ESPN: could not parse game {}: {}", external_id, e);
                Ok(None)
            }
        }
    }
}

fn events(response: &Value) -> &[Value] {
    response
        .get("events")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
