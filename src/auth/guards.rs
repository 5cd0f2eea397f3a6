//! Per-page redirects. Every guard defers to [`decide_route`]; none of them
//! carries its own role/status ordering.

use super::{
    route::{decide_route, Route},
    session::SessionRecord,
};

/// Registration, login and password recovery: a signed-in visitor is sent to
/// wherever the session belongs.
#[must_use]
pub fn public_redirect(session: &SessionRecord) -> Option<Route> {
    decide_route(session)
}

/// The MFA page is only for signed-in visitors that still owe the second factor.
#[must_use]
pub fn mfa_redirect(session: &SessionRecord) -> Option<Route> {
    if !session.logged_in {
        return Some(Route::Login);
    }
    if !session.mfa_verified {
        return None;
    }
    decide_route(session)
}

/// The protected area renders only for sessions routed to the dashboard.
#[must_use]
pub fn protected_redirect(session: &SessionRecord) -> Option<Route> {
    match decide_route(session) {
        None => Some(Route::Login),
        Some(Route::Dashboard) => None,
        other => other,
    }
}

/// Account status pages stay put only while they match the session.
#[must_use]
pub fn status_redirect(session: &SessionRecord, current: &Route) -> Option<Route> {
    match decide_route(session) {
        None => Some(Route::Login),
        Some(destination) if destination == *current => None,
        other => other,
    }
}

/// Guard for whatever page is mounted.
#[must_use]
pub fn redirect_for(route: &Route, session: &SessionRecord) -> Option<Route> {
    match route {
        Route::Dashboard | Route::Protected(_) => protected_redirect(session),
        Route::Mfa => mfa_redirect(session),
        Route::StatusPending | Route::StatusRejected | Route::StatusNotAdmin => {
            status_redirect(session, route)
        }
        Route::Login | Route::ForgotPassword | Route::ResetPassword { .. } => {
            public_redirect(session)
        }
        Route::Public(_) => None,
    }
}
