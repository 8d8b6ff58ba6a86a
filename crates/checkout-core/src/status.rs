//! Canonical Sale Status
//!
//! The provider-independent status taxonomy and the transition table that the
//! reconciler enforces.
//!
//! ```text
//!              ┌──────────┐
//!        ┌────▶│ approved │────┬────▶ refunded
//!        │     └──────────┘    └────▶ charged_back
//! ┌─────────┐
//! │ pending │──────▶ rejected
//! └─────────┘
//!        └──────────▶ cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// Provider-independent payment status of a sale
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 6] = [
        CanonicalStatus::Pending,
        CanonicalStatus::Approved,
        CanonicalStatus::Rejected,
        CanonicalStatus::Cancelled,
        CanonicalStatus::Refunded,
        CanonicalStatus::ChargedBack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Pending => "pending",
            CanonicalStatus::Approved => "approved",
            CanonicalStatus::Rejected => "rejected",
            CanonicalStatus::Cancelled => "cancelled",
            CanonicalStatus::Refunded => "refunded",
            CanonicalStatus::ChargedBack => "charged_back",
        }
    }

    /// Whether `self → next` is an allowed transition.
    ///
    /// Same-state moves are not transitions.
    pub fn can_transition_to(&self, next: CanonicalStatus) -> bool {
        use CanonicalStatus::*;
        matches!(
            (*self, next),
            (Pending, Approved | Rejected | Cancelled) | (Approved, Refunded | ChargedBack)
        )
    }

    /// No further transition is possible from this status
    pub fn is_terminal(&self) -> bool {
        !Self::ALL.iter().any(|next| self.can_transition_to(*next))
    }
}

impl std::fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownValue {
                kind: "status",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalStatus::*;

    #[test]
    fn test_pending_transitions() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(ChargedBack));
    }

    #[test]
    fn test_approved_never_regresses() {
        assert!(Approved.can_transition_to(Refunded));
        assert!(Approved.can_transition_to(ChargedBack));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Cancelled));
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        for status in CanonicalStatus::ALL {
            assert!(!status.can_transition_to(status), "{status}");
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!Pending.is_terminal());
        assert!(!Approved.is_terminal());
        for status in [Rejected, Cancelled, Refunded, ChargedBack] {
            assert!(status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        assert_eq!("charged_back".parse::<CanonicalStatus>().unwrap(), ChargedBack);
        assert!("paid".parse::<CanonicalStatus>().is_err());
    }
}
