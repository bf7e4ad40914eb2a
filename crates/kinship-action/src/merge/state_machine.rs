//! Merge request state machine.
//!
//! Pending -> Approved
//! Pending -> Rejected
//!
//! Approved and Rejected are terminal.

use kinship_core::types::MergeStatus;

use crate::error::MergeError;

/// Validate that a merge status transition is allowed.
pub fn validate_transition(from: MergeStatus, to: MergeStatus) -> Result<(), MergeError> {
    let valid = matches!(
        (from, to),
        (MergeStatus::Pending, MergeStatus::Approved) | (MergeStatus::Pending, MergeStatus::Rejected)
    );

    if valid {
        Ok(())
    } else {
        Err(MergeError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MergeStatus; 3] = [
        MergeStatus::Pending,
        MergeStatus::Approved,
        MergeStatus::Rejected,
    ];

    #[test]
    fn test_pending_to_approved() {
        assert!(validate_transition(MergeStatus::Pending, MergeStatus::Approved).is_ok());
    }

    #[test]
    fn test_pending_to_rejected() {
        assert!(validate_transition(MergeStatus::Pending, MergeStatus::Rejected).is_ok());
    }

    #[test]
    fn test_terminal_states() {
        for to in ALL {
            assert!(validate_transition(MergeStatus::Approved, to).is_err());
            assert!(validate_transition(MergeStatus::Rejected, to).is_err());
        }
    }

    #[test]
    fn test_pending_to_pending_invalid() {
        assert!(validate_transition(MergeStatus::Pending, MergeStatus::Pending).is_err());
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let valid_count = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| validate_transition(*from, *to).is_ok())
            .count();
        assert_eq!(valid_count, 2);
    }

    #[test]
    fn test_invalid_transition_error_message() {
        let msg = validate_transition(MergeStatus::Approved, MergeStatus::Rejected)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("approved"));
        assert!(msg.contains("rejected"));
    }
}
