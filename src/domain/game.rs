use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Game lifecycle status as reported by providers and persisted on games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
    Postponed,
    Cancelled,
    NoResult,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
            GameStatus::Cancelled => "cancelled",
            GameStatus::NoResult => "no_result",
        }
    }

    /// Still awaiting a result; the refresh and pick-locking passes
    /// only look at games in these states.
    pub fn is_pending(&self) -> bool {
        matches!(self, GameStatus::Scheduled | GameStatus::InProgress)
    }

    /// No further result updates can occur from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameStatus::Final | GameStatus::Postponed | GameStatus::Cancelled | GameStatus::NoResult
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GameStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(GameStatus::Scheduled),
            "in_progress" => Ok(GameStatus::InProgress),
            "final" => Ok(GameStatus::Final),
            "postponed" => Ok(GameStatus::Postponed),
            "cancelled" => Ok(GameStatus::Cancelled),
            "no_result" => Ok(GameStatus::NoResult),
            _ => Err(format!("Unknown game status: {}", s)),
        }
    }
}

/// A scheduled or played game within a competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub competition_id: Uuid,
    /// Provider-side identifier used to match incoming results
    pub external_id: String,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub scheduled_start_time: DateTime<Utc>,
    pub status: GameStatus,
    pub home_team_score: Option<i32>,
    pub away_team_score: Option<i32>,
    /// Null for ties, cancelled games and games without a result
    pub winner_team_id: Option<Uuid>,
    pub venue_name: Option<String>,
    /// Raw provider payload from the most recent update
    pub api_data: Option<serde_json::Value>,
    pub score_corrected_at: Option<DateTime<Utc>>,
    pub score_correction_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    /// Wall-clock has reached the scheduled start.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_start_time <= now
    }
}

/// Winner under the settlement rule: only a final game with differing
/// scores has a winner; ties, missing scores and every non-final
/// disposition yield none.
pub fn decide_winner(
    status: GameStatus,
    home_score: Option<i32>,
    away_score: Option<i32>,
    home_team_id: Uuid,
    away_team_id: Uuid,
) -> Option<Uuid> {
    if status != GameStatus::Final {
        return None;
    }

    match (home_score, away_score) {
        (Some(home), Some(away)) if home > away => Some(home_team_id),
        (Some(home), Some(away)) if away > home => Some(away_team_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_home_win() {
        let (home, away) = ids();
        assert_eq!(
            decide_winner(GameStatus::Final, Some(28), Some(21), home, away),
            Some(home)
        );
    }

    #[test]
    fn test_away_win() {
        let (home, away) = ids();
        assert_eq!(
            decide_winner(GameStatus::Final, Some(3), Some(7), home, away),
            Some(away)
        );
    }

    #[test]
    fn test_tie_has_no_winner() {
        let (home, away) = ids();
        assert_eq!(
            decide_winner(GameStatus::Final, Some(14), Some(14), home, away),
            None
        );
    }

    #[test]
    fn test_missing_scores_have_no_winner() {
        let (home, away) = ids();
        assert_eq!(
            decide_winner(GameStatus::Final, Some(14), None, home, away),
            None
        );
        assert_eq!(decide_winner(GameStatus::Final, None, None, home, away), None);
    }

    #[test]
    fn test_non_final_has_no_winner() {
        let (home, away) = ids();
        for status in [
            GameStatus::Scheduled,
            GameStatus::InProgress,
            GameStatus::Postponed,
            GameStatus::Cancelled,
            GameStatus::NoResult,
        ] {
            assert_eq!(decide_winner(status, Some(28), Some(21), home, away), None);
        }
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            GameStatus::try_from("in_progress").unwrap(),
            GameStatus::InProgress
        );
        assert_eq!(GameStatus::try_from("FINAL").unwrap(), GameStatus::Final);
        assert!(GameStatus::try_from("halftime").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(GameStatus::Final.is_terminal());
        assert!(GameStatus::Cancelled.is_terminal());
        assert!(GameStatus::Postponed.is_terminal());
        assert!(GameStatus::NoResult.is_terminal());
        assert!(!GameStatus::Scheduled.is_terminal());
        assert!(!GameStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_pending_states() {
        assert!(GameStatus::Scheduled.is_pending());
        assert!(GameStatus::InProgress.is_pending());
        assert!(!GameStatus::Final.is_pending());
    }
}
