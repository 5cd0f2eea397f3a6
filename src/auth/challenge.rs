//! One-time-code challenge engine.
//!
//! Send a 6-digit code to a masked destination, accept one verification attempt
//! at a time, produce an opaque credential on success. The engine is generic over
//! a [`CodeChannel`] and is instantiated for MFA (credential: an upgraded
//! session) and for password recovery (credential: a reset token).
//!
//! ```text
//! Idle -> Sending -> Sent(challenge) -> Verifying(challenge) -> Verified(credential)
//!                       ^                    |
//!                       +---- failure -------+
//! ```

use super::{code::OtpCode, AuthError, INCORRECT_CODE};
use crate::api::{config::RESEND_COOLDOWN, ServiceError};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Server-issued correlation between a code send and its verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Opaque id; MFA challenges are bound to the session and carry none.
    pub challenge_id: Option<String>,
    /// Display only, never used for matching.
    pub masked_email: String,
}

/// Client-side resend countdown. Cosmetic: the server enforces rate limits.
#[derive(Clone, Debug)]
pub struct Cooldown {
    period: Duration,
    until: Option<Instant>,
}

impl Cooldown {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            until: None,
        }
    }

    pub fn start(&mut self) {
        self.until = Some(Instant::now() + self.period);
    }

    pub fn clear(&mut self) {
        self.until = None;
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(Instant::now()))
    }

    /// Whole seconds left, rounded up, as shown by the countdown.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        let remaining = self.remaining();
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.remaining().is_zero()
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(RESEND_COOLDOWN)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase<T> {
    Idle,
    Sending,
    Sent(Challenge),
    Verifying(Challenge),
    Verified(T),
}

impl<T> Phase<T> {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Sending | Self::Verifying(_))
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&Challenge> {
        match self {
            Self::Sent(challenge) | Self::Verifying(challenge) => Some(challenge),
            Self::Idle | Self::Sending | Self::Verified(_) => None,
        }
    }
}

/// Result of a successful initiate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Initiated<T> {
    Sent(Challenge),
    /// The server reported the challenge as already satisfied.
    AlreadyVerified(T),
}

/// Transport for one kind of code challenge.
pub trait CodeChannel: Send + Sync {
    type Credential: Clone + Send + Sync;

    fn send(&self) -> impl Future<Output = Result<Challenge, ServiceError>> + Send;

    fn resend(
        &self,
        current: &Challenge,
    ) -> impl Future<Output = Result<Challenge, ServiceError>> + Send;

    fn verify(
        &self,
        challenge: &Challenge,
        code: &OtpCode,
    ) -> impl Future<Output = Result<Self::Credential, ServiceError>> + Send;

    /// Treats a send failure as success when it signals the challenge is
    /// already satisfied.
    fn already_satisfied(&self, _err: &ServiceError) -> Option<Self::Credential> {
        None
    }
}

struct EngineState<T> {
    phase: Phase<T>,
    cooldown: Cooldown,
    notice: Option<String>,
}

pub struct ChallengeEngine<C: CodeChannel> {
    channel: C,
    state: Mutex<EngineState<C::Credential>>,
}

impl<C: CodeChannel> ChallengeEngine<C> {
    pub fn new(channel: C, cooldown: Duration) -> Self {
        Self {
            channel,
            state: Mutex::new(EngineState {
                phase: Phase::Idle,
                cooldown: Cooldown::new(cooldown),
                notice: None,
            }),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn lock(&self) -> MutexGuard<'_, EngineState<C::Credential>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn phase(&self) -> Phase<C::Credential> {
        self.lock().phase.clone()
    }

    #[must_use]
    pub fn challenge(&self) -> Option<Challenge> {
        self.lock().phase.challenge().cloned()
    }

    /// Message for the last failed verification, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    #[must_use]
    pub fn cooldown_remaining_secs(&self) -> u64 {
        self.lock().cooldown.remaining_secs()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().phase.is_busy()
    }

    /// Resumes at `Sent` with a challenge issued earlier (deep-link entry).
    pub fn resume(&self, challenge: Challenge) {
        let mut state = self.lock();
        state.phase = Phase::Sent(challenge);
        state.notice = None;
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.phase = Phase::Idle;
        state.cooldown.clear();
        state.notice = None;
    }

    /// Requests a code and starts the resend cooldown.
    ///
    /// # Errors
    /// `Busy` while another operation is in flight, or the service error.
    #[instrument(skip(self))]
    pub async fn initiate(&self) -> Result<Initiated<C::Credential>, AuthError> {
        let guard = self.begin(|_| Ok(Phase::Sending))?;

        match self.channel.send().await {
            Ok(challenge) => {
                guard.finish(Phase::Sent(challenge.clone()));
                let mut state = self.lock();
                state.cooldown.start();
                state.notice = None;
                debug!(masked_email = %challenge.masked_email, "code sent");
                Ok(Initiated::Sent(challenge))
            }
            Err(err) => {
                if let Some(credential) = self.channel.already_satisfied(&err) {
                    debug!("challenge already satisfied");
                    guard.finish(Phase::Verified(credential.clone()));
                    return Ok(Initiated::AlreadyVerified(credential));
                }
                warn!(code = %err.code, "failed to send code");
                drop(guard);
                Err(AuthError::Service(err))
            }
        }
    }

    /// Re-sends a code for the outstanding challenge and restarts the cooldown.
    ///
    /// # Errors
    /// `Cooldown` while the countdown runs, `Invalid` without an outstanding
    /// challenge, `Busy`, or the service error.
    #[instrument(skip(self))]
    pub async fn resend(&self) -> Result<Challenge, AuthError> {
        let guard = self.begin(|state| match &state.phase {
            Phase::Sent(_) if !state.cooldown.is_ready() => Err(AuthError::Cooldown {
                remaining_secs: state.cooldown.remaining_secs(),
            }),
            Phase::Sent(_) => Ok(Phase::Sending),
            _ => Err(no_challenge()),
        })?;
        let Some(current) = guard.previous_challenge() else {
            return Err(no_challenge());
        };

        match self.channel.resend(&current).await {
            Ok(challenge) => {
                guard.finish(Phase::Sent(challenge.clone()));
                let mut state = self.lock();
                state.cooldown.start();
                state.notice = None;
                Ok(challenge)
            }
            Err(err) => {
                drop(guard);
                Err(AuthError::Service(err))
            }
        }
    }

    /// Submits one verification attempt. On failure the engine returns to `Sent`
    /// and the error only says the code was incorrect.
    ///
    /// # Errors
    /// `IncorrectCode` (carrying the service error), `Invalid` without an
    /// outstanding challenge, or `Busy`.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, code: &OtpCode) -> Result<C::Credential, AuthError> {
        let guard = self.begin(|state| match &state.phase {
            Phase::Sent(challenge) => Ok(Phase::Verifying(challenge.clone())),
            _ => Err(no_challenge()),
        })?;
        let Some(challenge) = guard.previous_challenge() else {
            return Err(no_challenge());
        };

        match self.channel.verify(&challenge, code).await {
            Ok(credential) => {
                guard.finish(Phase::Verified(credential.clone()));
                self.lock().notice = None;
                Ok(credential)
            }
            Err(err) => {
                debug!(code = %err.code, "code verification failed");
                guard.finish(Phase::Sent(challenge));
                self.lock().notice = Some(INCORRECT_CODE.to_string());
                Err(AuthError::IncorrectCode(err))
            }
        }
    }

    /// Swaps in a busy phase; the returned guard restores the previous phase if
    /// the operation is dropped before finishing.
    fn begin<F>(&self, next: F) -> Result<PhaseGuard<'_, C::Credential>, AuthError>
    where
        F: FnOnce(&EngineState<C::Credential>) -> Result<Phase<C::Credential>, AuthError>,
    {
        let mut state = self.lock();
        if state.phase.is_busy() {
            return Err(AuthError::Busy);
        }
        let busy = next(&state)?;
        let previous = std::mem::replace(&mut state.phase, busy);
        Ok(PhaseGuard {
            state: &self.state,
            previous: Some(previous),
        })
    }
}

fn no_challenge() -> AuthError {
    AuthError::Invalid("Request a code first.".to_string())
}

struct PhaseGuard<'a, T> {
    state: &'a Mutex<EngineState<T>>,
    previous: Option<Phase<T>>,
}

impl<T: Clone> PhaseGuard<'_, T> {
    fn previous_challenge(&self) -> Option<Challenge> {
        self.previous.as_ref().and_then(Phase::challenge).cloned()
    }

    fn finish(mut self, phase: Phase<T>) {
        self.previous = None;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase = phase;
    }
}

impl<T> Drop for PhaseGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .phase = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Code;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedChannel {
        sends: AtomicUsize,
        verifies: AtomicUsize,
        send_error: Option<ServiceError>,
        accepted_code: &'static str,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedChannel {
        fn accepting(code: &'static str) -> Self {
            Self {
                accepted_code: code,
                ..Self::default()
            }
        }
    }

    impl CodeChannel for ScriptedChannel {
        type Credential = String;

        async fn send(&self) -> Result<Challenge, ServiceError> {
            let count = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(err) = &self.send_error {
                return Err(err.clone());
            }
            Ok(Challenge {
                challenge_id: Some(format!("c{count}")),
                masked_email: "n***e@example.com".to_string(),
            })
        }

        async fn resend(&self, _current: &Challenge) -> Result<Challenge, ServiceError> {
            self.send().await
        }

        async fn verify(&self, challenge: &Challenge, code: &OtpCode) -> Result<String, ServiceError> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if code.as_str() == self.accepted_code {
                Ok(format!("token-for-{}", challenge.challenge_id.clone().unwrap_or_default()))
            } else {
                Err(ServiceError::new(Code::InvalidArgument, "code mismatch"))
            }
        }

        fn already_satisfied(&self, err: &ServiceError) -> Option<String> {
            err.is(Code::AlreadyExists).then(|| "already".to_string())
        }
    }

    fn code(value: &str) -> OtpCode {
        OtpCode::parse(value).unwrap()
    }

    #[tokio::test]
    async fn verify_success_yields_credential() {
        let engine = ChallengeEngine::new(ScriptedChannel::accepting("482913"), RESEND_COOLDOWN);
        let sent = engine.initiate().await.unwrap();
        assert!(matches!(sent, Initiated::Sent(ref c) if c.challenge_id.as_deref() == Some("c1")));

        let credential = engine.verify(&code("482913")).await.unwrap();
        assert_eq!(credential, "token-for-c1");
        assert_eq!(engine.phase(), Phase::Verified("token-for-c1".to_string()));
    }

    #[tokio::test]
    async fn failed_verify_returns_to_sent_with_notice() {
        let engine = ChallengeEngine::new(ScriptedChannel::accepting("482913"), RESEND_COOLDOWN);
        engine.initiate().await.unwrap();

        let err = engine.verify(&code("000000")).await.unwrap_err();
        assert_eq!(err.user_message(), INCORRECT_CODE);
        assert_eq!(err.code(), Some(Code::InvalidArgument));
        assert!(matches!(engine.phase(), Phase::Sent(_)));
        assert_eq!(engine.notice().as_deref(), Some(INCORRECT_CODE));

        engine.verify(&code("482913")).await.unwrap();
        assert_eq!(engine.notice(), None);
    }

    #[tokio::test]
    async fn verify_without_challenge_is_rejected_locally() {
        let channel = ScriptedChannel::accepting("482913");
        let engine = ChallengeEngine::new(channel, RESEND_COOLDOWN);
        assert!(matches!(
            engine.verify(&code("482913")).await,
            Err(AuthError::Invalid(_))
        ));
        assert_eq!(engine.channel().verifies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn already_satisfied_is_success() {
        let channel = ScriptedChannel {
            send_error: Some(ServiceError::new(Code::AlreadyExists, "mfa already verified")),
            ..ScriptedChannel::default()
        };
        let engine = ChallengeEngine::new(channel, RESEND_COOLDOWN);
        assert_eq!(
            engine.initiate().await.unwrap(),
            Initiated::AlreadyVerified("already".to_string())
        );
        assert_eq!(engine.phase(), Phase::Verified("already".to_string()));
    }

    #[tokio::test]
    async fn send_failure_restores_previous_phase() {
        let channel = ScriptedChannel {
            send_error: Some(ServiceError::new(Code::NotFound, "user not found")),
            ..ScriptedChannel::default()
        };
        let engine = ChallengeEngine::new(channel, RESEND_COOLDOWN);
        let err = engine.initiate().await.unwrap_err();
        assert_eq!(err.code(), Some(Code::NotFound));
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn resend_respects_cooldown() {
        let engine = ChallengeEngine::new(ScriptedChannel::accepting("482913"), RESEND_COOLDOWN);
        engine.initiate().await.unwrap();
        assert_eq!(engine.cooldown_remaining_secs(), 30);

        tokio::time::advance(Duration::from_millis(10_500)).await;
        assert_eq!(engine.cooldown_remaining_secs(), 20);
        assert_eq!(
            engine.resend().await.unwrap_err(),
            AuthError::Cooldown { remaining_secs: 20 }
        );

        tokio::time::advance(Duration::from_secs(20)).await;
        let challenge = engine.resend().await.unwrap();
        assert_eq!(challenge.challenge_id.as_deref(), Some("c2"));
        assert_eq!(engine.cooldown_remaining_secs(), 30);
    }

    #[tokio::test]
    async fn concurrent_verify_is_busy() {
        let gate = Arc::new(Notify::new());
        let channel = ScriptedChannel {
            accepted_code: "482913",
            gate: Some(gate.clone()),
            ..ScriptedChannel::default()
        };
        let engine = ChallengeEngine::new(channel, RESEND_COOLDOWN);
        engine.initiate().await.unwrap();

        let first_code = code("482913");
        let second_code = code("482913");
        let first = engine.verify(&first_code);
        tokio::pin!(first);

        // Drive the first attempt until it parks on the gate.
        tokio::select! {
            biased;
            _ = &mut first => panic!("verification should be parked"),
            () = tokio::task::yield_now() => {}
        }
        assert!(engine.is_busy());
        assert_eq!(engine.verify(&second_code).await, Err(AuthError::Busy));

        gate.notify_one();
        assert!(first.await.is_ok());
        assert_eq!(engine.channel().verifies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_verify_restores_sent() {
        let gate = Arc::new(Notify::new());
        let channel = ScriptedChannel {
            accepted_code: "482913",
            gate: Some(gate),
            ..ScriptedChannel::default()
        };
        let engine = ChallengeEngine::new(channel, RESEND_COOLDOWN);
        engine.initiate().await.unwrap();

        let attempt = code("482913");
        {
            let pending = engine.verify(&attempt);
            tokio::pin!(pending);
            tokio::select! {
                biased;
                _ = &mut pending => panic!("verification should be parked"),
                () = tokio::task::yield_now() => {}
            }
            assert!(engine.is_busy());
        }
        assert!(matches!(engine.phase(), Phase::Sent(_)));
    }
}
