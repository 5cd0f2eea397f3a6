//! HTTP implementation of [`SessionService`] using Connect-style JSON RPC. All
//! calls share one timeout policy and one cookie jar, so route code never builds
//! requests or handles the session marker itself. Request bodies carry secrets
//! and are never logged.

use super::{
    config::ClientConfig,
    cookies::CookieJar,
    errors::{Code, ErrorBody, ServiceError},
    types::{
        ChangePasswordRequest, Empty, InitiateResetRequest, InitiateResetResponse,
        MaskedEmailResponse, RefreshSessionResponse, RefreshWithPasswordRequest,
        RefreshWithPasswordResponse, VerifyMfaRequest, VerifyResetRequest, VerifyResetResponse,
    },
    SessionService,
};
use crate::{
    auth::{code::OtpCode, reset::ResetToken},
    APP_USER_AGENT,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info_span, Instrument};
use url::Url;

/// Fully-qualified RPC service name; methods are posted to `{base}/{SERVICE}/{Method}`.
pub const SERVICE: &str = "carenotes.auth.v1.AuthService";
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct HttpSessionService {
    client: Client,
    base_url: Url,
    cookies: CookieJar,
}

impl HttpSessionService {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, cookies: CookieJar) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout)
            .cookie_provider(cookies.provider())
            .build()
            .map_err(|err| {
                ServiceError::new(Code::Internal, format!("Failed to build HTTP client: {err}"))
            })?;

        let mut base_url = config.api_base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            cookies,
        })
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    fn endpoint(&self, method: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(&format!("{SERVICE}/{method}"))
            .map_err(|err| ServiceError::new(Code::Internal, format!("Invalid endpoint: {err}")))
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(method)?;
        let span = info_span!("session.rpc", rpc.method = method, url = %url);

        let response = self
            .client
            .post(url)
            .header("Connect-Protocol-Version", "1")
            .json(body)
            .send()
            .instrument(span)
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        debug!(method, status = status.as_u16(), "session service responded");

        if status.is_success() {
            let body = if text.trim().is_empty() {
                "{}"
            } else {
                text.as_str()
            };
            serde_json::from_str(body).map_err(|err| {
                ServiceError::new(Code::Internal, format!("Failed to decode response: {err}"))
            })
        } else {
            Err(decode_error(status.as_u16(), &text))
        }
    }
}

impl SessionService for HttpSessionService {
    async fn refresh_session(&self) -> Result<RefreshSessionResponse, ServiceError> {
        self.call("RefreshSession", &Empty {}).await
    }

    async fn refresh_session_with_password(
        &self,
        password: &SecretString,
    ) -> Result<RefreshWithPasswordResponse, ServiceError> {
        let request = RefreshWithPasswordRequest {
            password: password.expose_secret(),
        };
        self.call("RefreshSessionWithPassword", &request).await
    }

    async fn initiate_mfa(&self) -> Result<MaskedEmailResponse, ServiceError> {
        self.call("InitiateMFA", &Empty {}).await
    }

    async fn resend_mfa_code(&self) -> Result<MaskedEmailResponse, ServiceError> {
        self.call("ResendMFACode", &Empty {}).await
    }

    async fn verify_mfa(&self, code: &OtpCode) -> Result<(), ServiceError> {
        let request = VerifyMfaRequest {
            code: code.as_str(),
        };
        let _: Empty = self.call("VerifyMFA", &request).await?;
        Ok(())
    }

    async fn initiate_reset_password(
        &self,
        email: &str,
    ) -> Result<InitiateResetResponse, ServiceError> {
        self.call("InitiateResetPassword", &InitiateResetRequest { email })
            .await
    }

    async fn verify_reset_password(
        &self,
        code: &OtpCode,
        challenge_id: &str,
    ) -> Result<ResetToken, ServiceError> {
        let request = VerifyResetRequest {
            code: code.as_str(),
            challenge_id,
        };
        let response: VerifyResetResponse = self.call("VerifyResetPassword", &request).await?;
        Ok(ResetToken::new(response.reset_token))
    }

    async fn change_password_with_reset_token(
        &self,
        new_password: &SecretString,
        reset_token: &ResetToken,
    ) -> Result<(), ServiceError> {
        let request = ChangePasswordRequest {
            new_password: new_password.expose_secret(),
            reset_token: reset_token.expose(),
        };
        let _: Empty = self.call("ChangePasswordWithResetToken", &request).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let result: Result<Empty, ServiceError> = self.call("SignOut", &Empty {}).await;
        self.cookies.clear();
        result.map(|_| ())
    }
}

/// Maps transport failures; timeouts become `DeadlineExceeded` so the refresh
/// controller can continue optimistically.
fn map_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::new(
            Code::DeadlineExceeded,
            "Request timed out. Please try again.",
        )
    } else if err.is_connect() {
        ServiceError::new(
            Code::Unavailable,
            format!("Unable to reach the server: {err}"),
        )
    } else if err.is_decode() {
        ServiceError::new(Code::Internal, format!("Failed to read response: {err}"))
    } else {
        ServiceError::new(Code::Unknown, format!("Request failed: {err}"))
    }
}

/// Decodes a Connect error body, falling back to the HTTP status.
fn decode_error(status: u16, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => ServiceError::new(error.code, sanitize_body(&error.message)),
        Err(_) => ServiceError::new(Code::from_http_status(status), sanitize_body(body)),
    }
}

/// Trims and truncates error bodies before they reach the user.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
