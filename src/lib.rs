//! # Carenotes (session lifecycle and step-up client)
//!
//! `carenotes` is the client-resident authentication controller for the Carenotes
//! care-documentation dashboard. It decides whether a visitor is signed in,
//! whether the second factor has been proven, whether a live session must be
//! re-proven with a password, and where the visitor must be routed.
//!
//! ## Session Lifecycle
//!
//! 1. **Load:** When a session marker is present the refresh controller calls
//!    `RefreshSession` and blocks protected content until it resolves.
//! 2. **Route:** Every entry point consults the single routing decision function
//!    ([`auth::route::decide_route`]).
//! 3. **Refocus:** Window refocus refreshes again, at most once every five minutes.
//! 4. **Step-up:** A `RequiresPassword` outcome gates the protected area behind the
//!    step-up overlay until the password is re-proven; failed requests are then
//!    re-issued from the recovery registry.
//!
//! ## One-Time Codes
//!
//! MFA verification and password recovery share one challenge engine: a 6-digit
//! code is sent to a masked address, verified once, and exchanged for a credential
//! (an upgraded session or a single-use reset token).
//!
//! The server-side authentication service is an external collaborator reached
//! through [`api::SessionService`]; this crate never sees password hashes or code
//! generation.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
