//! Session context shared by every screen. The Session Record and the step-up
//! flag live in one explicit object instead of ambient globals, so each test (or
//! each embedded shell) owns an independent instance. Screens only read it; the
//! refresh controller, the MFA flow and the step-up overlay write it.

use super::{
    route::{decide_route, Route},
    session::SessionRecord,
};
use tokio::sync::watch;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub session: SessionRecord,
    /// Raised by a `RequiresPassword` refresh outcome; observed by the overlay.
    pub needs_step_up: bool,
}

#[derive(Clone, Debug)]
pub struct SessionContext {
    state: watch::Sender<AuthState>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { state }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> SessionRecord {
        self.state.borrow().session.clone()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().session.logged_in
    }

    #[must_use]
    pub fn needs_step_up(&self) -> bool {
        self.state.borrow().needs_step_up
    }

    /// Routing decision for the current record.
    #[must_use]
    pub fn destination(&self) -> Option<Route> {
        decide_route(&self.state.borrow().session)
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub(crate) fn replace_session(&self, session: SessionRecord) {
        self.state.send_modify(|state| state.session = session);
    }

    pub(crate) fn set_needs_step_up(&self, needs_step_up: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.needs_step_up != needs_step_up;
            state.needs_step_up = needs_step_up;
            changed
        });
    }

    pub(crate) fn mark_mfa_verified(&self) {
        self.state.send_modify(|state| {
            state.session = state.session.with_mfa_verified();
        });
    }

    /// Back to the signed-out zero value, step-up flag included.
    pub(crate) fn reset(&self) {
        self.state.send_replace(AuthState::default());
    }
}
