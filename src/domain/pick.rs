use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's prediction for one game in a competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: Uuid,
    pub user_id: Uuid,
    pub competition_id: Uuid,
    pub game_id: Uuid,
    pub predicted_winner_team_id: Uuid,
    pub is_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    /// Null until the game is settled
    pub is_correct: Option<bool>,
    pub points_earned: i32,
    pub updated_at: DateTime<Utc>,
}

impl Pick {
    /// Score this pick against a settled game's winner.
    ///
    /// A null winner (tie, cancelled, no result) scores every pick as
    /// incorrect with zero points. Returns (is_correct, points_earned);
    /// points are 1 exactly when the pick is correct.
    pub fn score(&self, winner_team_id: Option<Uuid>) -> (bool, i32) {
        match winner_team_id {
            Some(winner) if self.predicted_winner_team_id == winner => (true, 1),
            _ => (false, 0),
        }
    }
}
