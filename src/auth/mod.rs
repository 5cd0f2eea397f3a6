//! Auth feature module: session record, routing decisions, one-time-code
//! challenges, password recovery, silent refresh and step-up reauthentication.
//! It keeps authentication state out of the screens and must avoid logging
//! passwords, codes or reset tokens.
//!
//! Flow Overview: the [`refresh::RefreshController`] hydrates the
//! [`context::SessionContext`]; every entry point asks [`route::decide_route`] (through
//! [`guards`]) where the visitor belongs; [`mfa::MfaFlow`] and [`reset::ResetFlow`] drive
//! the shared [`challenge::ChallengeEngine`]; [`step_up::StepUpOverlay`] gates the
//! protected area and drains the [`recovery::RequestRegistry`] once satisfied.

pub mod challenge;
pub mod code;
pub mod context;
pub mod guards;
pub mod mfa;
pub mod recovery;
pub mod refresh;
pub mod reset;
pub mod route;
pub mod session;
pub mod shell;
pub mod step_up;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

use crate::api::{Code, ServiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Message shown for every failed code verification, whatever the cause.
pub const INCORRECT_CODE: &str = "Incorrect code. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Client-side validation failure; no network call was made.
    #[error("{0}")]
    Invalid(String),
    #[error("Another request is already in progress.")]
    Busy,
    #[error("Please wait {remaining_secs} seconds before requesting a new code.")]
    Cooldown { remaining_secs: u64 },
    #[error("Incorrect code. Please try again.")]
    IncorrectCode(#[source] ServiceError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl AuthError {
    /// Error classification for control flow, when the failure came from the service.
    #[must_use]
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::IncorrectCode(err) | Self::Service(err) => Some(err.code),
            Self::Invalid(_) | Self::Busy | Self::Cooldown { .. } => None,
        }
    }

    /// Sentence-cased text for display.
    #[must_use]
    pub fn user_message(&self) -> String {
        validate::sentence_case(&self.to_string())
    }
}

/// Single-flight flag held for the duration of one request; released on drop.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_code_hides_cause_but_keeps_code() {
        let err = AuthError::IncorrectCode(ServiceError::new(
            Code::ResourceExhausted,
            "too many attempts",
        ));
        assert_eq!(err.user_message(), INCORRECT_CODE);
        assert_eq!(err.code(), Some(Code::ResourceExhausted));
    }

    #[test]
    fn service_errors_are_sentence_cased() {
        let err = AuthError::from(ServiceError::new(Code::NotFound, "user not found"));
        assert_eq!(err.user_message(), "User not found.");
        assert_eq!(err.code(), Some(Code::NotFound));
    }

    #[test]
    fn in_flight_is_exclusive_until_dropped() {
        let flag = AtomicBool::new(false);
        let held = InFlight::acquire(&flag).unwrap();
        assert!(InFlight::acquire(&flag).is_none());
        drop(held);
        assert!(InFlight::acquire(&flag).is_some());
    }

    #[test]
    fn client_errors_have_no_code() {
        assert_eq!(AuthError::Busy.code(), None);
        assert_eq!(
            AuthError::Cooldown { remaining_secs: 12 }.user_message(),
            "Please wait 12 seconds before requesting a new code."
        );
    }
}
