//! Client configuration for the session service and the controller timers.
//! Values come from CLI arguments or `CARENOTES_*` environment variables; empty
//! overrides are ignored. Configuration values are public; do not store secrets here.

use std::time::Duration;
use url::Url;

/// Default request timeout applied to every session service call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Minimum time between two focus-triggered refreshes.
pub const FOCUS_REFRESH_DEBOUNCE: Duration = Duration::from_secs(5 * 60);
/// Cosmetic countdown before a code can be re-sent.
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(30);
/// Delay before following a redirect so the success message can render.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: Url,
    /// Base of the dashboard used to build deep links (reset-password links).
    pub app_base_url: Url,
    pub request_timeout: Duration,
    pub focus_debounce: Duration,
    pub resend_cooldown: Duration,
    pub redirect_delay: Duration,
}

impl ClientConfig {
    /// Builds a config with default timers around the given API base URL.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed.
    pub fn new(api_base_url: &str) -> Result<Self, url::ParseError> {
        let api_base_url = Url::parse(api_base_url.trim())?;
        Ok(Self {
            app_base_url: api_base_url.clone(),
            api_base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            focus_debounce: FOCUS_REFRESH_DEBOUNCE,
            resend_cooldown: RESEND_COOLDOWN,
            redirect_delay: REDIRECT_DELAY,
        })
    }

    /// Applies optional overrides; blank string values are ignored.
    ///
    /// # Errors
    /// Returns an error if the app base URL override cannot be parsed.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, url::ParseError> {
        if let Some(value) = overrides.app_base_url.as_deref().and_then(normalize_value) {
            self.app_base_url = Url::parse(&value)?;
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.focus_debounce_secs {
            self.focus_debounce = Duration::from_secs(secs);
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub app_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub focus_debounce_secs: Option<u64>,
}

fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
