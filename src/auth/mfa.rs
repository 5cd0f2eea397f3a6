//! MFA verification after password login: the challenge engine instantiated
//! with the session-bound MFA operations.

use super::{
    challenge::{Challenge, ChallengeEngine, CodeChannel, Initiated},
    code::OtpCode,
    context::SessionContext,
    route::Route,
    AuthError,
};
use crate::api::{Code, ServiceError, SessionService};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// MFA operations; the address on file is looked up server-side.
pub struct MfaChannel<S> {
    service: Arc<S>,
}

impl<S: SessionService> CodeChannel for MfaChannel<S> {
    type Credential = ();

    async fn send(&self) -> Result<Challenge, ServiceError> {
        let response = self.service.initiate_mfa().await?;
        Ok(Challenge {
            challenge_id: None,
            masked_email: response.masked_email,
        })
    }

    async fn resend(&self, _current: &Challenge) -> Result<Challenge, ServiceError> {
        let response = self.service.resend_mfa_code().await?;
        Ok(Challenge {
            challenge_id: None,
            masked_email: response.masked_email,
        })
    }

    async fn verify(&self, _challenge: &Challenge, code: &OtpCode) -> Result<(), ServiceError> {
        self.service.verify_mfa(code).await
    }

    /// `AlreadyExists`: this session already completed MFA.
    fn already_satisfied(&self, err: &ServiceError) -> Option<()> {
        err.is(Code::AlreadyExists).then_some(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MfaStart {
    CodeSent { masked_email: String },
    /// Nothing to verify; continue to the routed destination.
    AlreadyVerified { destination: Option<Route> },
}

pub struct MfaFlow<S: SessionService> {
    engine: ChallengeEngine<MfaChannel<S>>,
    context: SessionContext,
}

impl<S: SessionService> MfaFlow<S> {
    pub fn new(service: Arc<S>, context: SessionContext, cooldown: Duration) -> Self {
        Self {
            engine: ChallengeEngine::new(MfaChannel { service }, cooldown),
            context,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &ChallengeEngine<MfaChannel<S>> {
        &self.engine
    }

    /// Sends the code. Idempotent: an already-verified session is success.
    ///
    /// # Errors
    /// Any engine error other than the already-verified signal.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<MfaStart, AuthError> {
        match self.engine.initiate().await? {
            Initiated::Sent(challenge) => Ok(MfaStart::CodeSent {
                masked_email: challenge.masked_email,
            }),
            Initiated::AlreadyVerified(()) => {
                info!("session already passed MFA");
                self.context.mark_mfa_verified();
                Ok(MfaStart::AlreadyVerified {
                    destination: self.context.destination(),
                })
            }
        }
    }

    /// Resumes at the verify step after a restart; no code is sent.
    pub fn resume(&self, masked_email: impl Into<String>) {
        self.engine.resume(Challenge {
            challenge_id: None,
            masked_email: masked_email.into(),
        });
    }

    /// # Errors
    /// `Cooldown`, `Busy`, or the service error.
    pub async fn resend(&self) -> Result<String, AuthError> {
        Ok(self.engine.resend().await?.masked_email)
    }

    /// Verifies the code, upgrades the session and returns where to go next.
    ///
    /// # Errors
    /// `IncorrectCode` on any verification failure.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, code: &OtpCode) -> Result<Option<Route>, AuthError> {
        self.engine.verify(code).await?;
        self.context.mark_mfa_verified();
        info!("MFA verified");
        Ok(self.context.destination())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        challenge::Phase,
        session::{ApprovalStatus, Role, SessionRecord},
        testing::FakeService,
        INCORRECT_CODE,
    };

    fn nurse_pending() -> SessionRecord {
        SessionRecord {
            logged_in: true,
            mfa_verified: false,
            role: Role::Nurse,
            status: ApprovalStatus::Pending,
            ..SessionRecord::default()
        }
    }

    #[tokio::test]
    async fn already_exists_marks_verified_without_error() {
        let service = Arc::new(FakeService::default());
        service.fail_next(
            "InitiateMFA",
            ServiceError::new(Code::AlreadyExists, "mfa already verified"),
        );
        let context = SessionContext::new();
        context.replace_session(nurse_pending());
        let flow = MfaFlow::new(service, context.clone(), Duration::from_secs(30));

        let start = flow.start().await.unwrap();
        assert_eq!(
            start,
            MfaStart::AlreadyVerified {
                destination: Some(Route::StatusPending)
            }
        );
        assert!(context.session().mfa_verified);
        assert_eq!(flow.engine().notice(), None);
    }

    #[tokio::test]
    async fn verify_upgrades_session_and_routes() {
        let service = Arc::new(FakeService::default());
        let context = SessionContext::new();
        context.replace_session(nurse_pending());
        let flow = MfaFlow::new(service.clone(), context.clone(), Duration::from_secs(30));

        let start = flow.start().await.unwrap();
        assert_eq!(
            start,
            MfaStart::CodeSent {
                masked_email: "n***e@example.com".to_string()
            }
        );

        let wrong = OtpCode::parse("000000").unwrap();
        let err = flow.verify(&wrong).await.unwrap_err();
        assert_eq!(err.user_message(), INCORRECT_CODE);
        assert!(!context.session().mfa_verified);

        let right = OtpCode::parse(FakeService::MFA_CODE).unwrap();
        assert_eq!(flow.verify(&right).await.unwrap(), Some(Route::StatusPending));
        assert!(context.session().mfa_verified);
        assert_eq!(flow.engine().phase(), Phase::Verified(()));
        assert_eq!(service.calls("VerifyMFA"), 2);
    }
}
