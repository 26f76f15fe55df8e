use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::NormalizedResult;
use crate::error::{Result, TallyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Espn,
    TheOdds,
    RapidApi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Espn => "espn",
            Self::TheOdds => "theodds",
            Self::RapidApi => "rapidapi",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "espn" => Ok(Self::Espn),
            "theodds" | "the_odds" | "the_odds_api" => Ok(Self::TheOdds),
            "rapidapi" | "rapid_api" => Ok(Self::RapidApi),
            _ => Err("invalid provider; expected espn|theodds|rapidapi"),
        }
    }
}

pub fn parse_provider_kind(raw: &str) -> Result<ProviderKind> {
    ProviderKind::from_str(raw).map_err(|e| TallyError::Validation(e.to_string()))
}

/// Contract every provider adapter implements.
///
/// Each adapter owns its league mapping table; an unmapped league yields an
/// empty result set rather than an error, so failover can keep going.
/// Malformed individual records are logged and skipped.
#[async_trait]
pub trait SportsProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch the game schedule for a league within a date range.
    async fn get_schedule(
        &self,
        league: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedResult>>;

    /// Fetch scores for games currently in progress.
    async fn get_live_results(&self, league: &str) -> Result<Vec<NormalizedResult>>;

    /// Fetch a single game by the provider's external id.
    async fn get_result(&self, league: &str, external_id: &str)
        -> Result<Option<NormalizedResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_provider_kind_accepts_aliases() {
        assert_eq!(
            parse_provider_kind("espn").expect("espn should parse"),
            ProviderKind::Espn
        );
        assert_eq!(
            parse_provider_kind("the_odds_api").expect("the_odds_api alias should parse"),
            ProviderKind::TheOdds
        );
        assert_eq!(
            parse_provider_kind("RapidAPI").expect("mixed case should parse"),
            ProviderKind::RapidApi
        );
    }

    #[test]
    fn parse_provider_kind_rejects_unknown_value() {
        assert!(parse_provider_kind("foo").is_err());
    }

    #[test]
    fn provider_kind_round_trips_as_str() {
        for kind in [
            ProviderKind::Espn,
            ProviderKind::TheOdds,
            ProviderKind::RapidApi,
        ] {
            assert_eq!(
                parse_provider_kind(kind.as_str()).expect("as_str should parse"),
                kind
            );
        }
    }
}
