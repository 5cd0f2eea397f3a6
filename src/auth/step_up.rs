//! Step-up reauthentication overlay. While the session needs a password
//! re-proof it covers the protected area, swallowing input and locking scroll;
//! once satisfied it re-issues every request that failed behind it.

use super::{
    context::SessionContext,
    recovery::{RecoverySummary, RequestRegistry},
    route::Route,
    session::SessionRecord,
    validate::{valid_password, WEAK_PASSWORD},
    AuthError, InFlight,
};
use crate::api::{Code, SessionService};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use tracing::{info, instrument, warn};

pub const CHECK_CREDENTIALS: &str = "Please check your credentials and try again.";
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

pub struct StepUpOverlay<S> {
    service: Arc<S>,
    context: SessionContext,
    registry: RequestRegistry,
    submitting: AtomicBool,
    notice: Mutex<Option<String>>,
}

impl<S: SessionService> StepUpOverlay<S> {
    pub fn new(service: Arc<S>, context: SessionContext, registry: RequestRegistry) -> Self {
        Self {
            service,
            context,
            registry,
            submitting: AtomicBool::new(false),
            notice: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_visible(&self, route: &Route) -> bool {
        self.context.needs_step_up() && route.is_protected()
    }

    /// Click-through to the page underneath is prevented while visible.
    #[must_use]
    pub fn blocks_input(&self, route: &Route) -> bool {
        self.is_visible(route)
    }

    #[must_use]
    pub fn scroll_locked(&self, route: &Route) -> bool {
        self.is_visible(route)
    }

    /// Message for the last failed submit.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.notice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_notice(&self, notice: Option<String>) {
        *self.notice.lock().unwrap_or_else(PoisonError::into_inner) = notice;
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Re-proves the session with the password, then re-issues outstanding requests.
    ///
    /// # Errors
    /// `Invalid` for a password that fails the password rule (no network call),
    /// `Busy`, or the service error. The display text is in [`Self::notice`].
    #[instrument(skip_all)]
    pub async fn submit(&self, password: &SecretString) -> Result<RecoverySummary, AuthError> {
        if !valid_password(password.expose_secret()) {
            let err = AuthError::Invalid(WEAK_PASSWORD.to_string());
            self.set_notice(Some(failure_message(&err)));
            return Err(err);
        }
        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            return Err(AuthError::Busy);
        };

        match self.service.refresh_session_with_password(password).await {
            Ok(response) => {
                let record = SessionRecord::from_response(response.session, response.mfa_verified);
                self.context.replace_session(record);
                self.context.set_needs_step_up(false);
                self.set_notice(None);
                info!("step-up satisfied");
                Ok(self.registry.retry_outstanding().await)
            }
            Err(err) => {
                warn!(code = %err.code, "step-up failed");
                let err = AuthError::Service(err);
                self.set_notice(Some(failure_message(&err)));
                Err(err)
            }
        }
    }

    /// "Not you? Sign out". Always available; the server call is best-effort.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if let Err(err) = self.service.sign_out().await {
            warn!(code = %err.code, "sign-out request failed");
        }
        self.context.reset();
        self.registry.clear();
        self.set_notice(None);
        info!("signed out");
    }
}

/// Display text for a failed step-up; raw service messages are never shown.
#[must_use]
pub fn failure_message(err: &AuthError) -> String {
    match err {
        AuthError::Invalid(_) | AuthError::Busy | AuthError::Cooldown { .. } => err.user_message(),
        _ if err.code() == Some(Code::Unauthenticated) => CHECK_CREDENTIALS.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}
