use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::game::GameStatus;
use crate::providers::ProviderKind;

/// Provider-agnostic result shape every adapter normalizes into.
///
/// Produced fresh per fetch and consumed by the refresh pass to update a
/// persisted game; never stored directly. Serializable because the failover
/// layer caches whole batches as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub provider: ProviderKind,
    pub external_id: String,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub status: GameStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    /// Original provider payload for this record
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl NormalizedResult {
    /// Scores are only trustworthy once both sides are present.
    pub fn has_scores(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let result = NormalizedResult {
            provider: ProviderKind::Espn,
            external_id: "401547439".to_string(),
            home_team: "Kansas City Chiefs".to_string(),
            away_team: "Buffalo Bills".to_string(),
            scheduled_start_time: Utc::now(),
            status: GameStatus::InProgress,
            home_score: Some(14),
            away_score: Some(10),
            venue: Some("Arrowhead Stadium".to_string()),
            raw: serde_json::json!({"id": "401547439"}),
        };

        let encoded = serde_json::to_string(&vec![result.clone()]).unwrap();
        let decoded: Vec<NormalizedResult> = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].external_id, result.external_id);
        assert_eq!(decoded[0].status, GameStatus::InProgress);
        assert!(decoded[0].has_scores());
    }
}
