//! Three-step password recovery: locate the account, verify the emailed code,
//! change the password with the resulting single-use reset token.
//!
//! The token is handed from the verify step to the change step explicitly,
//! either in place or through the `/reset-password?token=` deep link. The
//! pending challenge is cleared as part of a successful verification, so there
//! is no timer racing the navigation.

use super::{
    challenge::{Challenge, ChallengeEngine, CodeChannel, Initiated},
    code::OtpCode,
    route::Route,
    store::{ChallengeStore, PendingChallenge},
    validate::{valid_email, valid_password, INVALID_EMAIL, PASSWORD_MISMATCH, WEAK_PASSWORD},
    AuthError, InFlight,
};
use crate::api::{Code, ServiceError, SessionService};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fmt,
    sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info, instrument};

const MISSING_TOKEN: &str = "Your reset link is invalid or has expired. Please request a new code.";

/// Single-use proof of a completed recovery challenge. Never printed.
#[derive(Clone)]
pub struct ResetToken(SecretString);

impl ResetToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("ResetToken([REDACTED])")
    }
}

impl PartialEq for ResetToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for ResetToken {}

/// Recovery operations. Remembers the address so resend can re-initiate.
pub struct ResetChannel<S> {
    service: Arc<S>,
    email: Mutex<Option<String>>,
}

impl<S> ResetChannel<S> {
    fn email(&self) -> Option<String> {
        self.email
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_email(&self, email: Option<String>) {
        *self.email.lock().unwrap_or_else(PoisonError::into_inner) = email;
    }
}

impl<S: SessionService> CodeChannel for ResetChannel<S> {
    type Credential = ResetToken;

    async fn send(&self) -> Result<Challenge, ServiceError> {
        let Some(email) = self.email() else {
            return Err(ServiceError::new(Code::InvalidArgument, "email is required"));
        };
        let response = self.service.initiate_reset_password(&email).await?;
        Ok(Challenge {
            challenge_id: Some(response.challenge_id),
            masked_email: response.masked_email,
        })
    }

    /// Re-initiates; the server issues a fresh challenge id.
    async fn resend(&self, _current: &Challenge) -> Result<Challenge, ServiceError> {
        self.send().await
    }

    async fn verify(&self, challenge: &Challenge, code: &OtpCode) -> Result<ResetToken, ServiceError> {
        let Some(challenge_id) = challenge.challenge_id.as_deref() else {
            return Err(ServiceError::new(Code::InvalidArgument, "challenge id is required"));
        };
        self.service.verify_reset_password(code, challenge_id).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResetStep {
    Locate,
    Verify { masked_email: String },
    Change,
    /// Password changed; the visitor is on the way back to login.
    Done,
}

/// A navigation the page performs after a short confirmation delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub after: Duration,
}

impl Navigation {
    /// Waits out the delay and yields the destination.
    pub async fn follow(self) -> Route {
        tokio::time::sleep(self.after).await;
        self.route
    }
}

struct FlowState {
    step: ResetStep,
    token: Option<ResetToken>,
}

pub struct ResetFlow<S: SessionService, St> {
    engine: ChallengeEngine<ResetChannel<S>>,
    store: Arc<St>,
    state: Mutex<FlowState>,
    changing: AtomicBool,
    redirect_delay: Duration,
}

impl<S, St> ResetFlow<S, St>
where
    S: SessionService,
    St: ChallengeStore,
{
    pub fn new(service: Arc<S>, store: Arc<St>, cooldown: Duration, redirect_delay: Duration) -> Self {
        let channel = ResetChannel {
            service,
            email: Mutex::new(None),
        };
        Self {
            engine: ChallengeEngine::new(channel, cooldown),
            store,
            state: Mutex::new(FlowState {
                step: ResetStep::Locate,
                token: None,
            }),
            changing: AtomicBool::new(false),
            redirect_delay,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn engine(&self) -> &ChallengeEngine<ResetChannel<S>> {
        &self.engine
    }

    #[must_use]
    pub fn step(&self) -> ResetStep {
        self.lock().step.clone()
    }

    fn set_step(&self, step: ResetStep) {
        self.lock().step = step;
    }

    /// Entry guard for the recovery pages. A deep link carrying a token
    /// resumes at the change step, a live stored challenge resumes at verify.
    ///
    /// # Errors
    /// Returns the redirect (`ForgotPassword`) when the password-change page is
    /// reached with neither, or for a route outside password recovery.
    pub fn enter(&self, route: &Route) -> Result<ResetStep, Route> {
        match route {
            Route::ResetPassword { token: Some(token) } => {
                let mut state = self.lock();
                state.token = Some(ResetToken::new(token.clone()));
                state.step = ResetStep::Change;
                Ok(ResetStep::Change)
            }
            Route::ResetPassword { token: None } => {
                if self.lock().token.is_some() {
                    self.set_step(ResetStep::Change);
                    return Ok(ResetStep::Change);
                }
                self.resume_pending().ok_or(Route::ForgotPassword)
            }
            Route::ForgotPassword => Ok(self.resume_pending().unwrap_or_else(|| {
                self.set_step(ResetStep::Locate);
                ResetStep::Locate
            })),
            _ => Err(Route::ForgotPassword),
        }
    }

    fn resume_pending(&self) -> Option<ResetStep> {
        let pending = self.store.load()?;
        debug!(masked_email = %pending.masked_email, "resuming stored reset challenge");
        if pending.email.is_some() {
            self.engine.channel().set_email(pending.email.clone());
        }
        self.engine.resume(pending.challenge());
        let step = ResetStep::Verify {
            masked_email: pending.masked_email,
        };
        self.set_step(step.clone());
        Some(step)
    }

    /// Step 1: validates the address locally, then requests a code.
    ///
    /// # Errors
    /// `Invalid` for a malformed address (no network call), `Busy`, or the
    /// service error (e.g. `NotFound`).
    #[instrument(skip(self, email))]
    pub async fn locate(&self, email: &str) -> Result<ResetStep, AuthError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(AuthError::Invalid(INVALID_EMAIL.to_string()));
        }
        self.engine.channel().set_email(Some(email.to_string()));

        match self.engine.initiate().await? {
            Initiated::Sent(challenge) => {
                self.remember(&challenge, email);
                self.lock().token = None;
                let step = ResetStep::Verify {
                    masked_email: challenge.masked_email,
                };
                self.set_step(step.clone());
                Ok(step)
            }
            Initiated::AlreadyVerified(token) => {
                let mut state = self.lock();
                state.token = Some(token);
                state.step = ResetStep::Change;
                Ok(ResetStep::Change)
            }
        }
    }

    fn remember(&self, challenge: &Challenge, email: &str) {
        if let Some(challenge_id) = &challenge.challenge_id {
            self.store.save(PendingChallenge {
                masked_email: challenge.masked_email.clone(),
                challenge_id: challenge_id.clone(),
                email: Some(email.to_string()),
            });
        }
    }

    /// Requests a fresh code for the remembered address.
    ///
    /// # Errors
    /// `Cooldown`, `Busy`, `Invalid` when no address is known, or the service error.
    #[instrument(skip(self))]
    pub async fn resend(&self) -> Result<String, AuthError> {
        let Some(email) = self.engine.channel().email() else {
            return Err(AuthError::Invalid(
                "Start over and enter your email address again.".to_string(),
            ));
        };
        let challenge = self.engine.resend().await?;
        self.remember(&challenge, &email);
        self.set_step(ResetStep::Verify {
            masked_email: challenge.masked_email.clone(),
        });
        Ok(challenge.masked_email)
    }

    /// Step 2: exchanges the code for a reset token and clears the stored
    /// challenge. The flow moves to `Change` in place; the returned navigation
    /// is the deep link for pages that change on a separate screen.
    ///
    /// # Errors
    /// `IncorrectCode` on any verification failure, `Invalid`, or `Busy`.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, code: &OtpCode) -> Result<Navigation, AuthError> {
        let token = self.engine.verify(code).await?;
        self.store.clear();
        let route = Route::ResetPassword {
            token: Some(token.expose().to_string()),
        };
        {
            let mut state = self.lock();
            state.token = Some(token);
            state.step = ResetStep::Change;
        }
        info!("reset code verified");
        Ok(Navigation {
            route,
            after: self.redirect_delay,
        })
    }

    /// Step 3: sets the new password and sends the visitor back to login.
    ///
    /// # Errors
    /// `Invalid` for a weak or mismatched password or a missing token (no
    /// network call), `Busy`, or the service error (`Unauthenticated` for a
    /// spent token).
    #[instrument(skip_all)]
    pub async fn change(
        &self,
        new_password: &SecretString,
        confirm: &SecretString,
    ) -> Result<Navigation, AuthError> {
        if !valid_password(new_password.expose_secret()) {
            return Err(AuthError::Invalid(WEAK_PASSWORD.to_string()));
        }
        if new_password.expose_secret() != confirm.expose_secret() {
            return Err(AuthError::Invalid(PASSWORD_MISMATCH.to_string()));
        }
        let Some(token) = self.lock().token.clone() else {
            return Err(AuthError::Invalid(MISSING_TOKEN.to_string()));
        };
        let Some(_in_flight) = InFlight::acquire(&self.changing) else {
            return Err(AuthError::Busy);
        };

        self.engine
            .channel()
            .service
            .change_password_with_reset_token(new_password, &token)
            .await?;

        {
            let mut state = self.lock();
            state.token = None;
            state.step = ResetStep::Done;
        }
        self.engine.reset();
        info!("password changed");
        Ok(Navigation {
            route: Route::Login,
            after: self.redirect_delay,
        })
    }

    /// Abandons the recovery and returns to the locate step.
    pub fn start_over(&self) {
        self.store.clear();
        self.engine.reset();
        self.engine.channel().set_email(None);
        let mut state = self.lock();
        state.token = None;
        state.step = ResetStep::Locate;
    }
}
