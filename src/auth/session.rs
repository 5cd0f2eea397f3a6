//! The Session Record: who the current visitor is and what they have proven.

use crate::api::types::SessionInfo;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Nurse,
    Admin,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Admin-approval state of the account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Accepted,
    Rejected,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Replaced wholesale on every successful refresh or verify call; the zero value
/// is the signed-out state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub logged_in: bool,
    pub mfa_verified: bool,
    pub role: Role,
    pub status: ApprovalStatus,
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub company_id: String,
}

impl SessionRecord {
    /// Builds a signed-in record from a server session fragment.
    #[must_use]
    pub fn signed_in(info: SessionInfo, mfa_verified: bool) -> Self {
        Self {
            logged_in: true,
            mfa_verified,
            role: info.role,
            status: info.status,
            user_id: info.user_id,
            username: info.username,
            name: info.name,
            company_id: info.company_id,
        }
    }

    /// Builds the record from an optional fragment; a missing fragment means
    /// there is no server-recognized session.
    #[must_use]
    pub fn from_response(info: Option<SessionInfo>, mfa_verified: bool) -> Self {
        info.map_or_else(Self::default, |info| Self::signed_in(info, mfa_verified))
    }

    /// Same identity with the second factor proven.
    #[must_use]
    pub fn with_mfa_verified(&self) -> Self {
        Self {
            mfa_verified: true,
            ..self.clone()
        }
    }
}
