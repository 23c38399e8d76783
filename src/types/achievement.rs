//! Workflow-side achievement types
//!
//! The relational half of an achievement: its status reference and the
//! append-only transition log. The free-form payload lives in
//! [`crate::content`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::AppError;

/// Verification status of an achievement
///
/// Allowed moves:
///
/// ```text
/// DRAFT ──┐
///         ├─▶ PENDING ─┬─▶ VERIFIED
/// REJECTED┘            └─▶ REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AchievementStatus {
    Draft,
    Pending,
    Verified,
    Rejected,
}

impl AchievementStatus {
    pub const ALL: [AchievementStatus; 4] = [
        AchievementStatus::Draft,
        AchievementStatus::Pending,
        AchievementStatus::Verified,
        AchievementStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether the workflow permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: AchievementStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Pending)
                | (Self::Rejected, Self::Pending)
                | (Self::Pending, Self::Verified)
                | (Self::Pending, Self::Rejected)
        )
    }

    /// Content may be edited by its owner
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "PENDING" => Ok(Self::Pending),
            "VERIFIED" => Ok(Self::Verified),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(AppError::Validation(format!("Unknown status '{}'", other))),
        }
    }
}

/// Marker written as `previous_status` for the creation row of the history
pub const NO_PREVIOUS_STATUS: &str = "NONE";

/// Workflow reference for one achievement
#[derive(Debug, Clone, Serialize)]
pub struct AchievementReference {
    pub id: String,
    /// User id of the owning student
    pub student_id: String,
    /// Key of the content document
    pub content_ref: String,
    pub status: AchievementStatus,
    pub rejection_note: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One row of the transition log
#[derive(Debug, Clone, Serialize)]
pub struct AchievementHistory {
    pub id: i32,
    pub achievement_id: String,
    pub changed_by: String,
    pub previous_status: String,
    pub new_status: String,
    pub remarks: Option<String>,
    pub created_at: String,
}

/// Input for appending a history row
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub achievement_id: String,
    pub changed_by: String,
    pub previous_status: Option<AchievementStatus>,
    pub new_status: AchievementStatus,
    pub remarks: Option<String>,
}

impl HistoryEntry {
    pub fn previous_label(&self) -> &str {
        self.previous_status
            .as_ref()
            .map(AchievementStatus::as_str)
            .unwrap_or(NO_PREVIOUS_STATUS)
    }
}

/// A guarded status change applied by the workflow
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status the caller observed; the update only applies while it still holds
    pub expected: AchievementStatus,
    pub status: AchievementStatus,
    pub rejection_note: Option<String>,
    /// Set when the change is a verification
    pub verified_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use AchievementStatus::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(Draft.can_transition_to(Pending));
        assert!(Rejected.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Rejected));
    }

    #[test]
    fn test_disallowed_transitions() {
        assert!(!Draft.can_transition_to(Verified));
        assert!(!Draft.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Draft));
        for next in AchievementStatus::ALL {
            assert!(!Verified.can_transition_to(next), "VERIFIED -> {next}");
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<AchievementStatus>().unwrap(), Pending);
        assert_eq!("VERIFIED".parse::<AchievementStatus>().unwrap(), Verified);
        assert!("APPROVED".parse::<AchievementStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_uppercase() {
        assert_eq!(serde_json::to_string(&Rejected).unwrap(), "\"REJECTED\"");
    }
}
