//! Session service boundary. The controller only consumes the authentication
//! service through the narrow operations of [`SessionService`]; token issuance,
//! code generation and password hashing stay on the server.
//!
//! Flow Overview: the refresh controller and step-up overlay call the refresh
//! operations, the challenge engine calls the MFA and reset-password operations.
//! [`client::HttpSessionService`] speaks Connect-style JSON over HTTP.

pub mod client;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod types;

use crate::auth::{code::OtpCode, reset::ResetToken};
use secrecy::SecretString;
use std::future::Future;

pub use errors::{Code, ServiceError};
pub use types::{
    InitiateResetResponse, MaskedEmailResponse, RefreshOutcome, RefreshSessionResponse,
    RefreshWithPasswordResponse, SessionInfo,
};

/// Consumed server operations.
pub trait SessionService: Send + Sync {
    /// Validates (and silently renews) the current session.
    fn refresh_session(
        &self,
    ) -> impl Future<Output = Result<RefreshSessionResponse, ServiceError>> + Send;

    /// Re-proves the current session with the account password (step-up).
    fn refresh_session_with_password(
        &self,
        password: &SecretString,
    ) -> impl Future<Output = Result<RefreshWithPasswordResponse, ServiceError>> + Send;

    /// Sends an MFA code to the address on file. `AlreadyExists` means the
    /// session already satisfied MFA.
    fn initiate_mfa(
        &self,
    ) -> impl Future<Output = Result<MaskedEmailResponse, ServiceError>> + Send;

    fn resend_mfa_code(
        &self,
    ) -> impl Future<Output = Result<MaskedEmailResponse, ServiceError>> + Send;

    fn verify_mfa(&self, code: &OtpCode) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Sends a recovery code; a new call invalidates the previous challenge.
    fn initiate_reset_password(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<InitiateResetResponse, ServiceError>> + Send;

    fn verify_reset_password(
        &self,
        code: &OtpCode,
        challenge_id: &str,
    ) -> impl Future<Output = Result<ResetToken, ServiceError>> + Send;

    /// Sets a new password; the reset token is single-use.
    fn change_password_with_reset_token(
        &self,
        new_password: &SecretString,
        reset_token: &ResetToken,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Clears the server-side session. Callers treat failures as best-effort.
    fn sign_out(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
