//! Pending password-recovery challenge that must survive a full navigation
//! between the request page and the deep-link entry.

use super::challenge::Challenge;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChallenge {
    pub masked_email: String,
    pub challenge_id: String,
    /// Address the code was requested for; needed to resend after a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PendingChallenge {
    #[must_use]
    pub fn challenge(&self) -> Challenge {
        Challenge {
            challenge_id: Some(self.challenge_id.clone()),
            masked_email: self.masked_email.clone(),
        }
    }
}

/// Storage for the single outstanding recovery challenge.
pub trait ChallengeStore: Send + Sync {
    fn load(&self) -> Option<PendingChallenge>;

    /// Replaces whatever was stored.
    fn save(&self, pending: PendingChallenge);

    fn clear(&self);
}

/// Process-local store. Callers that need persistence (the CLI state file)
/// seed it on start and read it back before exiting.
#[derive(Debug, Default)]
pub struct MemoryChallengeStore {
    slot: Mutex<Option<PendingChallenge>>,
}

impl MemoryChallengeStore {
    #[must_use]
    pub fn new(initial: Option<PendingChallenge>) -> Self {
        Self {
            slot: Mutex::new(initial),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingChallenge>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChallengeStore for MemoryChallengeStore {
    fn load(&self) -> Option<PendingChallenge> {
        self.lock().clone()
    }

    fn save(&self, pending: PendingChallenge) {
        *self.lock() = Some(pending);
    }

    fn clear(&self) {
        *self.lock() = None;
    }
}
