//! Silent session refresh: once on load, again on window refocus (debounced),
//! and on demand after a surfaced failure. Triggers are serialized; an
//! in-flight refresh is never started twice.

use super::{context::SessionContext, session::SessionRecord, AuthError, InFlight};
use crate::api::{Code, RefreshOutcome, SessionService};
use std::{
    sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Idle,
    /// First validation in flight; the shell shows a placeholder.
    Loading,
    Ready,
    /// Retryable failure, sentence-cased for display.
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoSessionMarker,
    SignedOut,
    Debounced,
    InFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshReport {
    Refreshed(RefreshOutcome),
    /// The server no longer recognizes the session; the context was reset.
    SignedOut,
    /// Timed out; the existing session was kept.
    KeptSession,
    Skipped(SkipReason),
}

#[derive(Default)]
struct ControllerState {
    phase: LoadPhase,
    last_refresh_at: Option<Instant>,
}

pub struct RefreshController<S> {
    service: Arc<S>,
    context: SessionContext,
    debounce: Duration,
    in_flight: AtomicBool,
    state: Mutex<ControllerState>,
}

impl<S: SessionService> RefreshController<S> {
    pub fn new(service: Arc<S>, context: SessionContext, debounce: Duration) -> Self {
        Self {
            service,
            context,
            debounce,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(ControllerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        self.lock().phase.clone()
    }

    #[must_use]
    pub fn last_refresh_at(&self) -> Option<Instant> {
        self.lock().last_refresh_at
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    fn set_phase(&self, phase: LoadPhase) {
        self.lock().phase = phase;
    }

    /// Page load. Without a session marker there is nothing to validate.
    ///
    /// # Errors
    /// A retryable service failure (also reflected in [`Self::phase`]).
    pub async fn on_load(&self, has_marker: bool) -> Result<RefreshReport, AuthError> {
        if !has_marker {
            debug!("no session marker, staying signed out");
            self.set_phase(LoadPhase::Ready);
            return Ok(RefreshReport::Skipped(SkipReason::NoSessionMarker));
        }
        self.refresh().await
    }

    /// Window refocus: refreshes a present session at most once per debounce window.
    ///
    /// # Errors
    /// A retryable service failure.
    pub async fn on_focus(&self) -> Result<RefreshReport, AuthError> {
        if !self.context.is_logged_in() {
            return Ok(RefreshReport::Skipped(SkipReason::SignedOut));
        }
        let recent = self
            .lock()
            .last_refresh_at
            .is_some_and(|at| at.elapsed() < self.debounce);
        if recent {
            debug!("focus refresh debounced");
            return Ok(RefreshReport::Skipped(SkipReason::Debounced));
        }
        self.refresh().await
    }

    /// Re-invokes the refresh after a surfaced failure.
    ///
    /// # Errors
    /// A retryable service failure.
    pub async fn retry(&self) -> Result<RefreshReport, AuthError> {
        self.refresh().await
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<RefreshReport, AuthError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!("refresh already in flight");
            return Ok(RefreshReport::Skipped(SkipReason::InFlight));
        };
        {
            let mut state = self.lock();
            state.last_refresh_at = Some(Instant::now());
            if state.phase != LoadPhase::Ready {
                state.phase = LoadPhase::Loading;
            }
        }

        match self.service.refresh_session().await {
            Ok(response) => {
                let record = SessionRecord::from_response(response.session, response.mfa_verified);
                self.context.replace_session(record);
                if response.outcome == RefreshOutcome::RequiresPassword {
                    info!("session requires password re-proof");
                    self.context.set_needs_step_up(true);
                }
                self.set_phase(LoadPhase::Ready);
                Ok(RefreshReport::Refreshed(response.outcome))
            }
            Err(err) if err.is(Code::Unauthenticated) => {
                info!("session no longer valid");
                self.context.reset();
                self.set_phase(LoadPhase::Ready);
                Ok(RefreshReport::SignedOut)
            }
            Err(err) if err.is(Code::DeadlineExceeded) => {
                warn!("session refresh timed out, keeping current session");
                self.set_phase(LoadPhase::Ready);
                Ok(RefreshReport::KeptSession)
            }
            Err(err) => {
                warn!(code = %err.code, "session refresh failed");
                let err = AuthError::Service(err);
                self.set_phase(LoadPhase::Failed(err.user_message()));
                Err(err)
            }
        }
    }
}
