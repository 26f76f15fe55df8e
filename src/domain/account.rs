use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account lifecycle for the deferred-deletion sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    PendingDeletion,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::PendingDeletion => "pending_deletion",
            AccountStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AccountStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "pending_deletion" => Ok(AccountStatus::PendingDeletion),
            "deleted" => Ok(AccountStatus::Deleted),
            _ => Err(format!("Unknown account status: {}", s)),
        }
    }
}

/// A user account as seen by the deletion sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub status: AccountStatus,
    pub deletion_requested_at: Option<DateTime<Utc>>,
}

/// Replacement identity written over an anonymized account. Historical
/// picks and participant rows keep referencing the account id so past
/// leaderboards stay intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizedIdentity {
    pub email: String,
    pub username: String,
}

impl AnonymizedIdentity {
    pub fn for_account(id: Uuid) -> Self {
        Self {
            email: format!("deleted_user_{}@deleted.local", id),
            username: format!("Deleted User #{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymized_identity_is_deterministic() {
        let id = Uuid::new_v4();
        let first = AnonymizedIdentity::for_account(id);
        let second = AnonymizedIdentity::for_account(id);

        assert_eq!(first, second);
        assert_eq!(first.email, format!("deleted_user_{}@deleted.local", id));
        assert_eq!(first.username, format!("Deleted User #{}", id));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            AccountStatus::try_from("pending_deletion").unwrap(),
            AccountStatus::PendingDeletion
        );
        assert!(AccountStatus::try_from("suspended").is_err());
    }
}
