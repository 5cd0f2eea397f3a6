//! In-memory session service for unit tests.

use crate::api::{
    Code, InitiateResetResponse, MaskedEmailResponse, RefreshOutcome, RefreshSessionResponse,
    RefreshWithPasswordResponse, ServiceError, SessionInfo, SessionService,
};
use crate::auth::{
    code::OtpCode,
    reset::ResetToken,
    session::{ApprovalStatus, Role},
};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<ServiceError>>,
    refreshes: VecDeque<RefreshSessionResponse>,
    refresh_gate: Option<Arc<Notify>>,
    challenges: usize,
    used_tokens: HashSet<String>,
}

#[derive(Default)]
pub(crate) struct FakeService {
    state: Mutex<State>,
}

impl FakeService {
    pub(crate) const MFA_CODE: &'static str = "482913";
    pub(crate) const RESET_CODE: &'static str = "482913";
    pub(crate) const RESET_TOKEN: &'static str = "rt_abc";
    pub(crate) const PASSWORD: &'static str = "Secret123";

    pub(crate) fn admin() -> SessionInfo {
        SessionInfo {
            user_id: "u1".to_string(),
            username: "ana".to_string(),
            name: "Ana Silva".to_string(),
            company_id: "co1".to_string(),
            role: Role::Admin,
            status: ApprovalStatus::Accepted,
        }
    }

    pub(crate) fn signed_in(outcome: RefreshOutcome) -> RefreshSessionResponse {
        RefreshSessionResponse {
            session: Some(Self::admin()),
            outcome,
            mfa_verified: true,
        }
    }

    /// The next call to `method` fails with `err`.
    pub(crate) fn fail_next(&self, method: &'static str, err: ServiceError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(method)
            .or_default()
            .push_back(err);
    }

    /// Queues a successful refresh response; without one, refresh returns a
    /// normal signed-in admin.
    pub(crate) fn push_refresh(&self, response: RefreshSessionResponse) {
        self.state.lock().unwrap().refreshes.push_back(response);
    }

    /// Parks every refresh call until the gate is notified.
    pub(crate) fn gate_refresh(&self, gate: Arc<Notify>) {
        self.state.lock().unwrap().refresh_gate = Some(gate);
    }

    pub(crate) fn calls(&self, method: &'static str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, method: &'static str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(method).or_default() += 1;
        match state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl SessionService for FakeService {
    async fn refresh_session(&self) -> Result<RefreshSessionResponse, ServiceError> {
        let gate = self.state.lock().unwrap().refresh_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.enter("RefreshSession")?;
        let next = self.state.lock().unwrap().refreshes.pop_front();
        Ok(next.unwrap_or_else(|| Self::signed_in(RefreshOutcome::Normal)))
    }

    async fn refresh_session_with_password(
        &self,
        password: &SecretString,
    ) -> Result<RefreshWithPasswordResponse, ServiceError> {
        self.enter("RefreshSessionWithPassword")?;
        if password.expose_secret() == Self::PASSWORD {
            Ok(RefreshWithPasswordResponse {
                session: Some(Self::admin()),
                mfa_verified: true,
            })
        } else {
            Err(ServiceError::new(Code::Unauthenticated, "invalid password"))
        }
    }

    async fn initiate_mfa(&self) -> Result<MaskedEmailResponse, ServiceError> {
        self.enter("InitiateMFA")?;
        Ok(MaskedEmailResponse {
            masked_email: "n***e@example.com".to_string(),
        })
    }

    async fn resend_mfa_code(&self) -> Result<MaskedEmailResponse, ServiceError> {
        self.enter("ResendMFACode")?;
        Ok(MaskedEmailResponse {
            masked_email: "n***e@example.com".to_string(),
        })
    }

    async fn verify_mfa(&self, code: &OtpCode) -> Result<(), ServiceError> {
        self.enter("VerifyMFA")?;
        if code.as_str() == Self::MFA_CODE {
            Ok(())
        } else {
            Err(ServiceError::new(Code::InvalidArgument, "invalid code"))
        }
    }

    async fn initiate_reset_password(
        &self,
        email: &str,
    ) -> Result<InitiateResetResponse, ServiceError> {
        self.enter("InitiateResetPassword")?;
        let mut state = self.state.lock().unwrap();
        state.challenges += 1;
        let masked_email = match email.split_once('@') {
            Some((local, domain)) if local.len() > 1 => format!(
                "{}***{}@{domain}",
                &local[..1],
                &local[local.len() - 1..]
            ),
            _ => "***".to_string(),
        };
        Ok(InitiateResetResponse {
            masked_email,
            challenge_id: format!("c{}", state.challenges),
        })
    }

    async fn verify_reset_password(
        &self,
        code: &OtpCode,
        challenge_id: &str,
    ) -> Result<ResetToken, ServiceError> {
        self.enter("VerifyResetPassword")?;
        let latest = format!("c{}", self.state.lock().unwrap().challenges);
        if challenge_id != latest {
            return Err(ServiceError::new(Code::NotFound, "challenge not found"));
        }
        if code.as_str() != Self::RESET_CODE {
            return Err(ServiceError::new(Code::InvalidArgument, "invalid code"));
        }
        Ok(ResetToken::new(Self::RESET_TOKEN))
    }

    async fn change_password_with_reset_token(
        &self,
        _new_password: &SecretString,
        reset_token: &ResetToken,
    ) -> Result<(), ServiceError> {
        self.enter("ChangePasswordWithResetToken")?;
        let mut state = self.state.lock().unwrap();
        let token = reset_token.expose().to_string();
        if token != Self::RESET_TOKEN || !state.used_tokens.insert(token) {
            return Err(ServiceError::new(Code::Unauthenticated, "invalid reset token"));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        self.enter("SignOut")
    }
}
