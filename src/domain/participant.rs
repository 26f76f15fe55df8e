use serde::{Deserialize, Serialize};

use crate::domain::pick::Pick;

/// Aggregate standings for one (user, competition) pair.
///
/// Always recomputed wholesale from that user's scored picks, never
/// patched incrementally, so a repeated settlement pass converges to the
/// same values instead of drifting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipantTotals {
    pub total_points: i32,
    pub total_wins: i32,
    pub total_losses: i32,
    pub accuracy_percentage: f64,
}

impl ParticipantTotals {
    /// Compute totals from scored picks; unscored picks (is_correct null)
    /// are excluded by the caller's query and ignored here.
    pub fn from_picks(picks: &[Pick]) -> Self {
        let mut total_points = 0;
        let mut total_wins = 0;
        let mut total_losses = 0;

        for pick in picks {
            match pick.is_correct {
                Some(true) => {
                    total_wins += 1;
                    total_points += pick.points_earned;
                }
                Some(false) => {
                    total_losses += 1;
                    total_points += pick.points_earned;
                }
                None => {}
            }
        }

        let scored = total_wins + total_losses;
        let accuracy_percentage = if scored > 0 {
            f64::from(total_wins) / f64::from(scored) * 100.0
        } else {
            0.0
        };

        Self {
            total_points,
            total_wins,
            total_losses,
            accuracy_percentage,
        }
    }
}
