//! RapidAPI sports adapter.
//!
//! Routes per-league to the matching API-Sports host. Response shapes vary a
//! little by sport, so field lookups try the common alternatives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::RapidApiConfig;
use crate::domain::{GameStatus, NormalizedResult};
use crate::error::{Result, TallyError};

use super::http::ProviderHttp;
use super::{id_string, parse_datetime_utc, parse_score, ProviderKind, SportsProvider};

pub struct RapidApiProvider {
    http: ProviderHttp,
    api_key: String,
}

impl RapidApiProvider {
    pub fn new(config: &RapidApiConfig, http: ProviderHttp) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
        }
    }

    /// Map internal league names to RapidAPI hosts.
    ///
    /// College leagues have no dedicated host here; ESPN covers them.
    fn host_for(league: &str) -> Option<&'static str> {
        match league {
            "NFL" => Some("api-american-football.p.rapidapi.com"),
            "NBA" => Some("api-nba-v1.p.rapidapi.com"),
            "MLB" => Some("api-baseball.p.rapidapi.com"),
            "NHL" => Some("api-hockey.p.rapidapi.com"),
            _ => None,
        }
    }

    fn headers(&self, host: &'static str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-rapidapi-key"),
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| TallyError::Validation(format!("invalid RapidAPI key: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static("x-rapidapi-host"),
            HeaderValue::from_static(host),
        );
        Ok(headers)
    }

    fn pick<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .find_map(|key| root.get(*key))
            .filter(|v| !v.is_null())
    }

    fn pick_str<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a str> {
        Self::pick(root, keys)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn team_name(team: &Value) -> Option<String> {
        Self::pick_str(team, &["name", "nickname"]).map(str::to_string)
    }

    fn side_score(scores: &Value, keys: &[&str]) -> Option<i32> {
        Self::pick(scores, keys)
            .and_then(|side| Self::pick(side, &["points", "total"]))
            .and_then(parse_score)
    }

    fn parse_game(&self, game: &Value) -> Result<NormalizedResult> {
        let teams = game.get("teams").unwrap_or(&Value::Null);
        let home = teams.get("home").unwrap_or(&Value::Null);
        let away = Self::pick(teams, &["visitors", "away"]).unwrap_or(&Value::Null);

        let home_team = Self::team_name(home)
            .ok_or_else(|| TallyError::Parse("RapidAPI game missing home team".to_string()))?;
        let away_team = Self::team_name(away)
            .ok_or_else(|| TallyError::Parse("RapidAPI game missing away team".to_string()))?;

        let scores = game.get("scores").unwrap_or(&Value::Null);
        let home_score = Self::side_score(scores, &["home"]);
        let away_score = Self::side_score(scores, &["visitors", "away"]);

        let short = match game.get("status").and_then(|s| s.get("short")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "NS".to_string(),
        };
        let status = match short.as_str() {
            "1" | "2" | "3" | "4" | "H" => GameStatus::InProgress,
            "FT" | "AOT" | "AP" => GameStatus::Final,
            _ => GameStatus::Scheduled,
        };

        let scheduled_start_time = game
            .get("date")
            .and_then(|d| d.get("start"))
            .and_then(Value::as_str)
            .and_then(parse_datetime_utc)
            .unwrap_or_else(Utc::now);

        let venue = Self::pick(game, &["arena", "venue"])
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(NormalizedResult {
            provider: ProviderKind::RapidApi,
            external_id: game.get("id").map(id_string).unwrap_or_default(),
            home_team,
            away_team,
            scheduled_start_time,
            status,
            home_score,
            away_score,
            venue,
            raw: game.clone(),
        })
    }

    async fn fetch_games(
        &self,
        host: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<NormalizedResult>> {
        let url = format!("https://{}/games", host);
        let headers = self.headers(host)?;

        let response = self
            .http
            .get_json(ProviderKind::RapidApi, &url, query, Some(headers))
            .await?;

        let mut games = Vec::new();
        for game in response
            .get("response")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            match self.parse_game(game) {
                Ok(result) => games.push(result),
                Err(e) => warn!("RapidAPI: skipping malformed game: {}", e),
            }
        }

        Ok(games)
    }
}

#[async_trait]
impl SportsProvider for RapidApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::RapidApi
    }

    async fn get_schedule(
        &self,
        league: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedResult>> {
        let Some(host) = Self::host_for(league) else {
            warn!("RapidAPI: no host mapping for {}", league);
            return Ok(Vec::new());
        };

        let query = [
            ("date", start.format("%Y-%m-%d").to_string()),
            ("season", start.format("%Y").to_string()),
        ];

        let games = self.fetch_games(host, &query).await?;
        info!("RapidAPI: fetched {} games for {}", games.len(), league);
        Ok(games)
    }

    async fn get_live_results(&self, league: &str) -> Result<Vec<NormalizedResult>> {
        let Some(host) = Self::host_for(league) else {
            warn!("RapidAPI: no host mapping for {}", league);
            return Ok(Vec::new());
        };

        let query = [("live", "all".to_string())];

        let mut games = self.fetch_games(host, &query).await?;
        games.retain(|g| g.status == GameStatus::InProgress);

        info!("RapidAPI: fetched {} live games for {}", games.len(), league);
        Ok(games)
    }

    async fn get_result(
        &self,
        league: &str,
        external_id: &str,
    ) -> Result<Option<NormalizedResult>> {
        let Some(host) = Self::host_for(league) else {
            warn!("RapidAPI: no host mapping for {}", league);
            return Ok(None);
        };

        let query = [("id", external_id.to_string())];

        let games = self.fetch_games(host, &query).await?;
        Ok(games.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::json;

    fn provider() -> RapidApiProvider {
        let http = ProviderHttp::new(30, &RetryConfig::default()).expect("client should build");
        RapidApiProvider::new(
            &RapidApiConfig {
                api_key: "test-key".to_string(),
            },
            http,
        )
    }

    fn nba_game() -> Value {
        json!({
            "id": 12403,
            "date": {"start": "2026-01-10T00:30:00.000Z"},
            "status": {"short": 3},
            "arena": {"name": "Madison Square Garden"},
            "teams": {
                "home": {"name": "New York Knicks"},
                "visitors": {"nickname": "Lakers"}
            },
            "scores": {
                "home": {"points": 54},
                "visitors": {"points": 61}
            }
        })
    }

    #[test]
    fn host_for_maps_major_leagues_only() {
        assert_eq!(
            RapidApiProvider::host_for("NBA"),
            Some("api-nba-v1.p.rapidapi.com")
        );
        assert_eq!(RapidApiProvider::host_for("NCAA_FOOTBALL"), None);
    }

    #[test]
    fn parse_game_handles_nba_shape() {
        let result = provider()
            .parse_game(&nba_game())
            .expect("game should parse");

        assert_eq!(result.external_id, "12403");
        assert_eq!(result.home_team, "New York Knicks");
        assert_eq!(result.away_team, "Lakers");
        assert_eq!(result.home_score, Some(54));
        assert_eq!(result.away_score, Some(61));
        assert_eq!(result.status, GameStatus::InProgress);
        assert_eq!(result.venue.as_deref(), Some("Madison Square Garden"));
    }

    #[test]
    fn parse_game_maps_terminal_statuses() {
        let mut game = nba_game();
        game["status"]["short"] = json!("FT");
        let result = provider().parse_game(&game).expect("game should parse");
        assert_eq!(result.status, GameStatus::Final);

        game["status"]["short"] = json!("NS");
        let result = provider().parse_game(&game).expect("game should parse");
        assert_eq!(result.status, GameStatus::Scheduled);
    }

    #[test]
    fn parse_game_handles_away_key_and_totals() {
        let game = json!({
            "id": "88",
            "date": {"start": "2026-04-02T23:05:00Z"},
            "status": {"short": "FT"},
            "venue": {"name": "Fenway Park"},
            "teams": {
                "home": {"name": "Boston Red Sox"},
                "away": {"name": "New York Yankees"}
            },
            "scores": {
                "home": {"total": 5},
                "away": {"total": 3}
            }
        });

        let result = provider().parse_game(&game).expect("game should parse");
        assert_eq!(result.away_team, "New York Yankees");
        assert_eq!(result.home_score, Some(5));
        assert_eq!(result.away_score, Some(3));
        assert_eq!(result.venue.as_deref(), Some("Fenway Park"));
    }

    #[test]
    fn parse_game_requires_both_teams() {
        let game = json!({"id": 1, "teams": {"home": {"name": "Solo FC"}}});
        assert!(provider().parse_game(&game).is_err());
    }
}
