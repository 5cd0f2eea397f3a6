//! Request and response payloads for the session service. Passwords, codes and
//! reset tokens pass through these types, so they must never be logged.

use crate::auth::session::{ApprovalStatus, Role};
use serde::{Deserialize, Serialize};

/// Identity fragment returned by every session-bearing response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInfo {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub company_id: String,
    pub role: Role,
    pub status: ApprovalStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    #[default]
    Normal,
    RequiresPassword,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshSessionResponse {
    pub session: Option<SessionInfo>,
    pub outcome: RefreshOutcome,
    pub mfa_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct RefreshWithPasswordRequest<'a> {
    pub password: &'a str,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshWithPasswordResponse {
    pub session: Option<SessionInfo>,
    pub mfa_verified: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskedEmailResponse {
    pub masked_email: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyMfaRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct InitiateResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitiateResetResponse {
    pub masked_email: String,
    pub challenge_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResetRequest<'a> {
    pub code: &'a str,
    pub challenge_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResetResponse {
    pub reset_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub new_password: &'a str,
    pub reset_token: &'a str,
}

/// Empty request/response message.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_response_defaults_missing_fields() {
        let response: RefreshSessionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.session, None);
        assert_eq!(response.outcome, RefreshOutcome::Normal);
        assert!(!response.mfa_verified);
    }

    #[test]
    fn refresh_response_reads_camel_case() {
        let response: RefreshSessionResponse = serde_json::from_str(
            r#"{
                "session": {"userId": "u1", "username": "ana", "role": "admin", "status": "accepted"},
                "outcome": "requires_password",
                "mfaVerified": true
            }"#,
        )
        .unwrap();
        let session = response.session.unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.status, ApprovalStatus::Accepted);
        assert_eq!(response.outcome, RefreshOutcome::RequiresPassword);
        assert!(response.mfa_verified);
    }

    #[test]
    fn verify_reset_request_uses_camel_case() {
        let body = serde_json::to_value(VerifyResetRequest {
            code: "482913",
            challenge_id: "c1",
        })
        .unwrap();
        assert_eq!(body["challengeId"], "c1");
        assert_eq!(body["code"], "482913");
    }
}
