use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::game::GameStatus;

/// Competition lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Upcoming,
    Active,
    Completed,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionStatus::Upcoming => "upcoming",
            CompetitionStatus::Active => "active",
            CompetitionStatus::Completed => "completed",
        }
    }

    /// Lifecycle only ever moves forward.
    pub fn can_transition_to(&self, target: CompetitionStatus) -> bool {
        use CompetitionStatus::*;

        matches!((self, target), (Upcoming, Active) | (Active, Completed))
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CompetitionStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(CompetitionStatus::Upcoming),
            "active" => Ok(CompetitionStatus::Active),
            "completed" => Ok(CompetitionStatus::Completed),
            _ => Err(format!("Unknown competition status: {}", s)),
        }
    }
}

/// A competition as seen by the lifecycle pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: Uuid,
    pub name: String,
    pub status: CompetitionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Competition {
    /// Upcoming competition whose start date has passed.
    pub fn should_activate(&self, now: DateTime<Utc>) -> bool {
        self.status == CompetitionStatus::Upcoming && self.start_date <= now
    }

    /// Active competition past its end date with every game settled.
    /// A lingering in-progress game keeps the competition active until
    /// a later tick observes its terminal disposition.
    pub fn should_complete(&self, now: DateTime<Utc>, game_statuses: &[GameStatus]) -> bool {
        self.status == CompetitionStatus::Active
            && self.end_date <= now
            && game_statuses.iter().all(|status| status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn competition(status: CompetitionStatus, start_offset_h: i64, end_offset_h: i64) -> Competition {
        let now = Utc::now();
        Competition {
            id: Uuid::new_v4(),
            name: "Week 1 Showdown".to_string(),
            status,
            start_date: now + Duration::hours(start_offset_h),
            end_date: now + Duration::hours(end_offset_h),
        }
    }

    #[test]
    fn test_upcoming_past_start_activates() {
        let comp = competition(CompetitionStatus::Upcoming, -1, 24);
        assert!(comp.should_activate(Utc::now()));
    }

    #[test]
    fn test_upcoming_before_start_stays() {
        let comp = competition(CompetitionStatus::Upcoming, 1, 24);
        assert!(!comp.should_activate(Utc::now()));
    }

    #[test]
    fn test_active_never_reactivates() {
        let comp = competition(CompetitionStatus::Active, -2, 24);
        assert!(!comp.should_activate(Utc::now()));
    }

    #[test]
    fn test_completes_when_all_games_terminal() {
        let comp = competition(CompetitionStatus::Active, -48, -1);
        let statuses = [GameStatus::Final, GameStatus::Cancelled];
        assert!(comp.should_complete(Utc::now(), &statuses));
    }

    #[test]
    fn test_lingering_game_blocks_completion() {
        let comp = competition(CompetitionStatus::Active, -48, -1);
        let statuses = [GameStatus::Final, GameStatus::InProgress];
        assert!(!comp.should_complete(Utc::now(), &statuses));
    }

    #[test]
    fn test_end_date_in_future_blocks_completion() {
        let comp = competition(CompetitionStatus::Active, -48, 1);
        let statuses = [GameStatus::Final];
        assert!(!comp.should_complete(Utc::now(), &statuses));
    }

    #[test]
    fn test_no_lifecycle_regression() {
        use CompetitionStatus::*;

        assert!(Upcoming.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Upcoming));
        assert!(!Upcoming.can_transition_to(Completed));
    }
}
