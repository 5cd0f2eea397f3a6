//! Routing decision function and the typed page routes it can produce.
//!
//! [`decide_route`] is the only place the role/status/MFA ordering lives; every
//! entry point (public pages, password recovery, the MFA page and the app shell)
//! calls it instead of carrying its own copy.

use super::session::{ApprovalStatus, Role, SessionRecord};
use std::fmt;
use url::{form_urlencoded, Url};

pub mod paths {
    pub const LOGIN: &str = "/login";
    pub const MFA: &str = "/mfa";
    pub const DASHBOARD: &str = "/dashboard";
    pub const STATUS_PENDING: &str = "/status/pending";
    pub const STATUS_REJECTED: &str = "/status/rejected";
    pub const STATUS_NOT_ADMIN: &str = "/status/not-admin";
    pub const FORGOT_PASSWORD: &str = "/forgot-password";
    pub const RESET_PASSWORD: &str = "/reset-password";
}

/// Query parameter carrying the reset token on the deep link.
pub const RESET_TOKEN_PARAM: &str = "token";

/// Prefixes of the protected area (screens gated behind a verified session).
const PROTECTED_PREFIXES: &[&str] = &[
    "/dashboard",
    "/patients",
    "/nurses",
    "/notes",
    "/companies",
    "/billing",
    "/settings",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Mfa,
    Dashboard,
    StatusPending,
    StatusRejected,
    StatusNotAdmin,
    ForgotPassword,
    /// Password change step; `None` when reached without a token in the URL.
    ResetPassword { token: Option<String> },
    /// Any other screen of the protected area, by path.
    Protected(String),
    /// Any other public page (landing, legal), by path.
    Public(String),
}

impl Route {
    /// Path and query for navigation.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => paths::LOGIN.to_string(),
            Self::Mfa => paths::MFA.to_string(),
            Self::Dashboard => paths::DASHBOARD.to_string(),
            Self::StatusPending => paths::STATUS_PENDING.to_string(),
            Self::StatusRejected => paths::STATUS_REJECTED.to_string(),
            Self::StatusNotAdmin => paths::STATUS_NOT_ADMIN.to_string(),
            Self::ForgotPassword => paths::FORGOT_PASSWORD.to_string(),
            Self::ResetPassword { token: None } => paths::RESET_PASSWORD.to_string(),
            Self::ResetPassword { token: Some(token) } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(RESET_TOKEN_PARAM, token)
                    .finish();
                format!("{}?{query}", paths::RESET_PASSWORD)
            }
            Self::Protected(path) | Self::Public(path) => path.clone(),
        }
    }

    #[must_use]
    pub fn is_protected(&self) -> bool {
        match self {
            Self::Dashboard | Self::Protected(_) => true,
            Self::Login
            | Self::Mfa
            | Self::StatusPending
            | Self::StatusRejected
            | Self::StatusNotAdmin
            | Self::ForgotPassword
            | Self::ResetPassword { .. }
            | Self::Public(_) => false,
        }
    }

    /// Parses a path (optionally with a query, or a full URL) into a route.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let url = Url::parse(location)
            .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(location)));
        let Ok(url) = url else {
            return Self::Public(location.to_string());
        };

        let path = url.path().trim_end_matches('/');
        match path {
            paths::LOGIN => Self::Login,
            paths::MFA => Self::Mfa,
            paths::DASHBOARD => Self::Dashboard,
            paths::STATUS_PENDING => Self::StatusPending,
            paths::STATUS_REJECTED => Self::StatusRejected,
            paths::STATUS_NOT_ADMIN => Self::StatusNotAdmin,
            paths::FORGOT_PASSWORD => Self::ForgotPassword,
            paths::RESET_PASSWORD => Self::ResetPassword {
                token: url
                    .query_pairs()
                    .find(|(key, _)| key == RESET_TOKEN_PARAM)
                    .map(|(_, value)| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
            },
            other if is_protected_path(other) => Self::Protected(other.to_string()),
            "" => Self::Public("/".to_string()),
            other => Self::Public(other.to_string()),
        }
    }

    /// Absolute URL of this route under the dashboard base.
    ///
    /// # Errors
    /// Returns an error if the route cannot be joined onto `base`.
    pub fn to_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&self.path())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // never print the token
            Self::ResetPassword { token: Some(_) } => {
                write!(formatter, "{}?{RESET_TOKEN_PARAM}=…", paths::RESET_PASSWORD)
            }
            other => formatter.write_str(&other.path()),
        }
    }
}

fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Where a visitor with this session belongs. `None` means no redirect: stay on
/// the current public or auth page. First matching rule wins.
#[must_use]
pub fn decide_route(session: &SessionRecord) -> Option<Route> {
    if !session.logged_in {
        return None;
    }
    if !session.mfa_verified {
        return Some(Route::Mfa);
    }
    let route = match (session.role, session.status) {
        (Role::Admin, ApprovalStatus::Accepted) => Route::Dashboard,
        (_, ApprovalStatus::Pending) => Route::StatusPending,
        (_, ApprovalStatus::Rejected) => Route::StatusRejected,
        (Role::Nurse, _) => Route::StatusNotAdmin,
        _ => Route::Dashboard,
    };
    Some(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::Unspecified, Role::Nurse, Role::Admin];
    const STATUSES: [ApprovalStatus; 4] = [
        ApprovalStatus::Unspecified,
        ApprovalStatus::Pending,
        ApprovalStatus::Accepted,
        ApprovalStatus::Rejected,
    ];

    fn record(logged_in: bool, mfa: bool, role: Role, status: ApprovalStatus) -> SessionRecord {
        SessionRecord {
            logged_in,
            mfa_verified: mfa,
            role,
            status,
            ..SessionRecord::default()
        }
    }

    /// Reference chain of the seven rules, evaluated literally in order.
    fn expected(session: &SessionRecord) -> Option<Route> {
        if !session.logged_in {
            None
        } else if !session.mfa_verified {
            Some(Route::Mfa)
        } else if session.role == Role::Admin && session.status == ApprovalStatus::Accepted {
            Some(Route::Dashboard)
        } else if session.status == ApprovalStatus::Pending {
            Some(Route::StatusPending)
        } else if session.status == ApprovalStatus::Rejected {
            Some(Route::StatusRejected)
        } else if session.role == Role::Nurse {
            Some(Route::StatusNotAdmin)
        } else {
            Some(Route::Dashboard)
        }
    }

    #[test]
    fn decide_route_is_total_and_ordered() {
        for logged_in in [false, true] {
            for mfa in [false, true] {
                for role in ROLES {
                    for status in STATUSES {
                        let session = record(logged_in, mfa, role, status);
                        assert_eq!(decide_route(&session), expected(&session), "{session:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn unverified_admin_goes_to_mfa() {
        let session = record(true, false, Role::Admin, ApprovalStatus::Accepted);
        assert_eq!(decide_route(&session), Some(Route::Mfa));
    }

    #[test]
    fn signed_out_stays() {
        let session = record(false, true, Role::Admin, ApprovalStatus::Accepted);
        assert_eq!(decide_route(&session), None);
    }

    #[test]
    fn status_rules() {
        let cases = [
            (Role::Admin, ApprovalStatus::Pending, Route::StatusPending),
            (Role::Nurse, ApprovalStatus::Rejected, Route::StatusRejected),
            (Role::Nurse, ApprovalStatus::Accepted, Route::StatusNotAdmin),
            (Role::Unspecified, ApprovalStatus::Accepted, Route::Dashboard),
            (Role::Admin, ApprovalStatus::Unspecified, Route::Dashboard),
        ];
        for (role, status, route) in cases {
            assert_eq!(decide_route(&record(true, true, role, status)), Some(route));
        }
    }

    #[test]
    fn reset_link_round_trip_encodes_token() {
        let route = Route::ResetPassword {
            token: Some("rt abc/+".to_string()),
        };
        let path = route.path();
        assert_eq!(path, "/reset-password?token=rt+abc%2F%2B");
        assert_eq!(Route::parse(&path), route);
        assert_eq!(route.to_string(), "/reset-password?token=…");
    }

    #[test]
    fn parse_recognizes_pages() {
        assert_eq!(Route::parse("/mfa"), Route::Mfa);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(
            Route::parse("https://app.carenotes.dev/reset-password?token=rt_abc"),
            Route::ResetPassword {
                token: Some("rt_abc".to_string())
            }
        );
        assert_eq!(
            Route::parse("/reset-password?token="),
            Route::ResetPassword { token: None }
        );
        assert_eq!(
            Route::parse("/patients/42"),
            Route::Protected("/patients/42".to_string())
        );
        assert_eq!(Route::parse("/privacy"), Route::Public("/privacy".to_string()));
        assert_eq!(
            Route::parse("/notesheet"),
            Route::Public("/notesheet".to_string())
        );
    }

    #[test]
    fn protected_area() {
        assert!(Route::Dashboard.is_protected());
        assert!(Route::parse("/notes/7").is_protected());
        assert!(!Route::Login.is_protected());
        assert!(!Route::StatusPending.is_protected());
    }

    #[test]
    fn to_url_joins_base() {
        let base = Url::parse("https://app.carenotes.dev").unwrap();
        assert_eq!(
            Route::Login.to_url(&base).unwrap().as_str(),
            "https://app.carenotes.dev/login"
        );
    }
}
