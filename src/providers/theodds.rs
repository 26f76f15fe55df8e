//! The Odds API adapter.
//!
//! Schedule comes from the odds endpoint (h2h market events) and live scores
//! from the scores endpoint; both return flat JSON arrays.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::TheOddsConfig;
use crate::domain::{GameStatus, NormalizedResult};
use crate::error::{Result, TallyError};

use super::http::ProviderHttp;
use super::{id_string, parse_datetime_utc, parse_score, ProviderKind, SportsProvider};

pub struct TheOddsProvider {
    http: ProviderHttp,
    base_url: String,
    api_key: String,
}

impl TheOddsProvider {
    pub fn new(config: &TheOddsConfig, http: ProviderHttp) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Map internal league names to The Odds API sport keys.
    fn sport_key(league: &str) -> Option<&'static str> {
        match league {
            "NFL" => Some("americanfootball_nfl"),
            "NBA" => Some("basketball_nba"),
            "MLB" => Some("baseball_mlb"),
            "NHL" => Some("icehockey_nhl"),
            "NCAA_BASKETBALL" => Some("basketball_ncaab"),
            "NCAA_FOOTBALL" => Some("americanfootball_ncaaf"),
            _ => None,
        }
    }

    fn teams(event: &Value) -> Result<(String, String)> {
        let home = event
            .get("home_team")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let away = event
            .get("away_team")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if home.is_empty() || away.is_empty() {
            return Err(TallyError::Parse(
                "The Odds API event missing team names".to_string(),
            ));
        }

        Ok((home.to_string(), away.to_string()))
    }

    fn commence_time(event: &Value) -> DateTime<Utc> {
        event
            .get("commence_time")
            .and_then(Value::as_str)
            .and_then(parse_datetime_utc)
            .unwrap_or_else(Utc::now)
    }

    /// Parse an event from the odds endpoint: upcoming games, no scores.
    fn parse_event(&self, event: &Value) -> Result<NormalizedResult> {
        let (home_team, away_team) = Self::teams(event)?;

        Ok(NormalizedResult {
            provider: ProviderKind::TheOdds,
            external_id: event.get("id").map(id_string).unwrap_or_default(),
            home_team,
            away_team,
            scheduled_start_time: Self::commence_time(event),
            status: GameStatus::Scheduled,
            home_score: None,
            away_score: None,
            venue: None,
            raw: event.clone(),
        })
    }

    /// Parse an event from the scores endpoint.
    ///
    /// Scores arrive as a `[{name, score}]` array matched to teams by name.
    fn parse_score_event(&self, event: &Value) -> Result<NormalizedResult> {
        let (home_team, away_team) = Self::teams(event)?;

        let mut home_score = None;
        let mut away_score = None;

        if let Some(scores) = event.get("scores").and_then(Value::as_array) {
            for entry in scores {
                let name = entry.get("name").and_then(Value::as_str).unwrap_or_default();
                let score = entry.get("score").and_then(parse_score);

                if name == home_team {
                    home_score = score;
                } else if name == away_team {
                    away_score = score;
                }
            }
        }

        let completed = event
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let status = if completed {
            GameStatus::Final
        } else {
            GameStatus::InProgress
        };

        Ok(NormalizedResult {
            provider: ProviderKind::TheOdds,
            external_id: event.get("id").map(id_string).unwrap_or_default(),
            home_team,
            away_team,
            scheduled_start_time: Self::commence_time(event),
            status,
            home_score,
            away_score,
            venue: None,
            raw: event.clone(),
        })
    }

    async fn fetch_scores(&self, sport_key: &str, days_from: &str) -> Result<Value> {
        let url = format!("{}/sports/{}/scores", self.base_url, sport_key);
        let query = [
            ("apiKey", self.api_key.clone()),
            ("daysFrom", days_from.to_string()),
            ("dateFormat", "iso".to_string()),
        ];

        self.http
            .get_json(ProviderKind::TheOdds, &url, &query, None)
            .await
    }
}

#[async_trait]
impl SportsProvider for TheOddsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TheOdds
    }

    async fn get_schedule(
        &self,
        league: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedResult>> {
        let Some(sport_key) = Self::sport_key(league) else {
            warn!("TheOddsAPI: no league mapping for {}", league);
            return Ok(Vec::new());
        };

        let url = format!("{}/sports/{}/odds", self.base_url, sport_key);
        let query = [
            ("apiKey", self.api_key.clone()),
            ("regions", "us".to_string()),
            // Head-to-head market covers game results
            ("markets", "h2h".to_string()),
            ("dateFormat", "iso".to_string()),
        ];

        let response = self
            .http
            .get_json(ProviderKind::TheOdds, &url, &query, None)
            .await?;

        let mut games = Vec::new();
        for event in response.as_array().map(Vec::as_slice).unwrap_or_default() {
            match self.parse_event(event) {
                Ok(result) => {
                    if result.scheduled_start_time >= start && result.scheduled_start_time <= end {
                        games.push(result);
                    }
                }
                Err(e) => warn!("TheOddsAPI: skipping malformed event: {}", e),
            }
        }

        info!("TheOddsAPI: fetched {} games for {}", games.len(), league);
        Ok(games)
    }

    async fn get_live_results(&self, league: &str) -> Result<Vec<NormalizedResult>> {
        let Some(sport_key) = Self::sport_key(league) else {
            warn!("TheOddsAPI: no league mapping for {}", league);
            return Ok(Vec::new());
        };

        let response = self.fetch_scores(sport_key, "1").await?;

        let mut games = Vec::new();
        for event in response.as_array().map(Vec::as_slice).unwrap_or_default() {
            let completed = event
                .get("completed")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if completed {
                continue;
            }
            match self.parse_score_event(event) {
                Ok(result) => games.push(result),
                Err(e) => warn!("TheOddsAPI: skipping malformed score event: {}", e),
            }
        }

        info!(
            "TheOddsAPI: fetched {} live games for {}",
            games.len(),
            league
        );
        Ok(games)
    }

    async fn get_result(
        &self,
        league: &str,
        external_id: &str,
    ) -> Result<Option<NormalizedResult>> {
        let Some(sport_key) = Self::sport_key(league) else {
            warn!("TheOddsAPI: no league mapping for {}", league);
            return Ok(None);
        };

        // No single-game endpoint; scan recent scores instead
        let response = self.fetch_scores(sport_key, "3").await?;

        for event in response.as_array().map(Vec::as_slice).unwrap_or_default() {
            if event.get("id").map(id_string).as_deref() == Some(external_id) {
                return match self.parse_score_event(event) {
                    Ok(result) => Ok(Some(result)),
                    Err(e) => {
                        warn!("TheOddsAPI: could not parse game {}: {}", external_id, e);
                        Ok(None)
                    }
                };
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::json;

    fn provider() -> TheOddsProvider {
        let http = ProviderHttp::new(30, &RetryConfig::default()).expect("client should build");
        let config = TheOddsConfig {
            api_key: "test-key".to_string(),
            ..TheOddsConfig::default()
        };
        TheOddsProvider::new(&config, http)
    }

    #[test]
    fn sport_key_maps_known_leagues() {
        assert_eq!(
            TheOddsProvider::sport_key("NHL"),
            Some("icehockey_nhl")
        );
        assert_eq!(TheOddsProvider::sport_key("DARTS"), None);
    }

    #[test]
    fn parse_score_event_matches_scores_by_team_name() {
        let event = json!({
            "id": "e912f3a",
            "commence_time": "2026-01-10T01:00:00Z",
            "completed": true,
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "scores": [
                {"name": "Boston Celtics", "score": "112"},
                {"name": "Miami Heat", "score": "98"}
            ]
        });

        let result = provider()
            .parse_score_event(&event)
            .expect("event should parse");

        assert_eq!(result.home_score, Some(112));
        assert_eq!(result.away_score, Some(98));
        assert_eq!(result.status, GameStatus::Final);
    }

    #[test]
    fn parse_score_event_inflight_game_is_in_progress() {
        let event = json!({
            "id": "e912f3a",
            "commence_time": "2026-01-10T01:00:00Z",
            "completed": false,
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "scores": null
        });

        let result = provider()
            .parse_score_event(&event)
            .expect("event should parse");

        assert_eq!(result.status, GameStatus::InProgress);
        assert_eq!(result.home_score, None);
    }

    #[test]
    fn parse_event_requires_team_names() {
        let event = json!({"id": "x", "home_team": "", "away_team": "Miami Heat"});
        assert!(provider().parse_event(&event).is_err());
    }
}
