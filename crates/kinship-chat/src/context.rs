//! Per-user dialogue state.
//!
//! Each user has at most one half-finished dialogue. Its state is a tagged
//! variant holding whatever input has been collected so far; the store maps
//! user ids to those variants and forgets them after a period of inactivity.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use kinship_core::types::{RelationType, Timestamp, UserId};

use crate::error::ChatError;

// =============================================================================
// DialogueState
// =============================================================================

/// Where a user is in the add-member dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingName,
    AwaitingBirthYear {
        name: String,
    },
    AwaitingRelation {
        name: String,
        birth_year: Option<i32>,
    },
    /// The member will be linked to one of `candidates`, listed to the user
    /// in this order, or placed unattached in `tree_id`, the tree they were
    /// drawn from.
    AwaitingAnchor {
        name: String,
        birth_year: Option<i32>,
        relation: RelationType,
        tree_id: Uuid,
        candidates: Vec<Uuid>,
    },
}

impl DialogueState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DialogueState::Idle)
    }

    /// Short name of the step, for logs.
    pub fn step(&self) -> &'static str {
        match self {
            DialogueState::Idle => "idle",
            DialogueState::AwaitingName => "awaiting_name",
            DialogueState::AwaitingBirthYear { .. } => "awaiting_birth_year",
            DialogueState::AwaitingRelation { .. } => "awaiting_relation",
            DialogueState::AwaitingAnchor { .. } => "awaiting_anchor",
        }
    }
}

// =============================================================================
// DialogueStore
// =============================================================================

/// Keyed storage of dialogue state. Absent users are `Idle`.
pub trait DialogueStore: Send + Sync {
    fn get(&self, user: UserId) -> Result<DialogueState, ChatError>;
    fn set(&self, user: UserId, state: DialogueState) -> Result<(), ChatError>;
    fn clear(&self, user: UserId) -> Result<(), ChatError>;
}

struct Session {
    state: DialogueState,
    last_message_at: Timestamp,
}

/// Process-local store. Concurrent turns from one user are last-write-wins.
pub struct InMemoryDialogueStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    session_timeout_minutes: u32,
}

impl InMemoryDialogueStore {
    pub fn new(session_timeout_minutes: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            session_timeout_minutes,
        }
    }

    fn is_expired(&self, session: &Session, now: Timestamp) -> bool {
        let timeout_secs = i64::from(self.session_timeout_minutes) * 60;
        now.0 - session.last_message_at.0 > timeout_secs
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<UserId, Session>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Store(format!("session lock poisoned: {}", e)))
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ChatError> {
        let now = Timestamp::now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        Ok(before - sessions.len())
    }

    #[cfg(test)]
    fn backdate(&self, user: UserId, seconds: i64) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&user) {
            session.last_message_at = Timestamp(session.last_message_at.0 - seconds);
        }
    }
}

impl DialogueStore for InMemoryDialogueStore {
    fn get(&self, user: UserId) -> Result<DialogueState, ChatError> {
        let now = Timestamp::now();
        let mut sessions = self.lock()?;
        match sessions.get(&user) {
            Some(session) if self.is_expired(session, now) => {
                debug!(%user, step = session.state.step(), "Dialogue expired");
                sessions.remove(&user);
                Ok(DialogueState::Idle)
            }
            Some(session) => Ok(session.state.clone()),
            None => Ok(DialogueState::Idle),
        }
    }

    fn set(&self, user: UserId, state: DialogueState) -> Result<(), ChatError> {
        let mut sessions = self.lock()?;
        if state.is_idle() {
            sessions.remove(&user);
        } else {
            sessions.insert(
                user,
                Session {
                    state,
                    last_message_at: Timestamp::now(),
                },
            );
        }
        Ok(())
    }

    fn clear(&self, user: UserId) -> Result<(), ChatError> {
        self.lock()?.remove(&user);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(7);

    #[test]
    fn test_absent_user_is_idle() {
        let store = InMemoryDialogueStore::new(30);
        assert_eq!(store.get(USER).unwrap(), DialogueState::Idle);
    }

    #[test]
    fn test_set_get_clear() {
        let store = InMemoryDialogueStore::new(30);
        let state = DialogueState::AwaitingBirthYear {
            name: "Vali".into(),
        };
        store.set(USER, state.clone()).unwrap();
        assert_eq!(store.get(USER).unwrap(), state);
        assert_eq!(store.get(UserId(8)).unwrap(), DialogueState::Idle);

        store.clear(USER).unwrap();
        assert_eq!(store.get(USER).unwrap(), DialogueState::Idle);
    }

    #[test]
    fn test_last_write_wins() {
        let store = InMemoryDialogueStore::new(30);
        store.set(USER, DialogueState::AwaitingName).unwrap();
        store
            .set(USER, DialogueState::AwaitingBirthYear { name: "A".into() })
            .unwrap();
        assert_eq!(
            store.get(USER).unwrap(),
            DialogueState::AwaitingBirthYear { name: "A".into() }
        );
    }

    #[test]
    fn test_session_expires_after_timeout() {
        let store = InMemoryDialogueStore::new(30);
        store.set(USER, DialogueState::AwaitingName).unwrap();

        store.backdate(USER, 29 * 60);
        assert_eq!(store.get(USER).unwrap(), DialogueState::AwaitingName);

        store.backdate(USER, 2 * 60);
        assert_eq!(store.get(USER).unwrap(), DialogueState::Idle);
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryDialogueStore::new(1);
        store.set(USER, DialogueState::AwaitingName).unwrap();
        store.set(UserId(8), DialogueState::AwaitingName).unwrap();
        store.backdate(USER, 120);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.get(UserId(8)).unwrap(), DialogueState::AwaitingName);
    }

    #[test]
    fn test_state_serializes_tagged() {
        let state = DialogueState::AwaitingRelation {
            name: "Vali".into(),
            birth_year: Some(1960),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["step"], "awaiting_relation");
        assert_eq!(json["birth_year"], 1960);

        let back: DialogueState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
