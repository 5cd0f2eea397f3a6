//! Session marker handling on top of reqwest's cookie store. The HTTP client
//! owns parsing, expiry and replay of `Set-Cookie`; this wrapper only seeds the
//! store from the CLI state file and reads the live cookies back out for it.

use reqwest::cookie::{CookieStore, Jar};
use std::{collections::BTreeMap, sync::Arc};
use url::Url;

/// Name of the server-set session marker cookie.
pub const SESSION_COOKIE: &str = "carenotes_session";

#[derive(Clone, Debug)]
pub struct CookieJar {
    store: Arc<Jar>,
    origin: Url,
}

impl CookieJar {
    /// Empty jar for cookies set by `origin`.
    #[must_use]
    pub fn new(origin: &Url) -> Self {
        Self {
            store: Arc::new(Jar::default()),
            origin: origin.clone(),
        }
    }

    /// Builds a jar from previously exported `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(origin: &Url, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let jar = Self::new(origin);
        for (name, value) in pairs {
            let cookie = format!("{}={}; Path=/", name.into(), value.into());
            jar.store.add_cookie_str(&cookie, &jar.origin);
        }
        jar
    }

    /// Store handed to `reqwest::ClientBuilder::cookie_provider`.
    #[must_use]
    pub fn provider(&self) -> Arc<Jar> {
        Arc::clone(&self.store)
    }

    /// Whether a live session marker is present.
    #[must_use]
    pub fn has_marker(&self) -> bool {
        self.export().contains_key(SESSION_COOKIE)
    }

    /// Expires every cookie for the origin.
    pub fn clear(&self) {
        for name in self.export().into_keys() {
            let expired = format!("{name}=; Path=/; Max-Age=0");
            self.store.add_cookie_str(&expired, &self.origin);
        }
    }

    /// Live (unexpired) cookies for persistence. Callers must not log the result.
    #[must_use]
    pub fn export(&self) -> BTreeMap<String, String> {
        self.store
            .cookies(&self.origin)
            .as_ref()
            .and_then(|header| header.to_str().ok())
            .map(parse_cookie_header)
            .unwrap_or_default()
    }
}

/// Splits a `Cookie` request header produced by the store into pairs.
fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split("; ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn origin() -> Url {
        Url::parse("https://api.carenotes.dev/rpc/").unwrap()
    }

    fn set_cookie(jar: &CookieJar, header: &str) {
        let value = HeaderValue::from_str(header).unwrap();
        jar.provider()
            .set_cookies(&mut std::iter::once(&value), &jar.origin);
    }

    #[test]
    fn captures_session_marker() {
        let jar = CookieJar::new(&origin());
        assert!(!jar.has_marker());

        set_cookie(&jar, "carenotes_session=abc123; Path=/; HttpOnly; Secure");
        set_cookie(&jar, "theme=dark; Path=/");
        assert!(jar.has_marker());
        assert_eq!(
            jar.export(),
            BTreeMap::from([
                ("carenotes_session".to_string(), "abc123".to_string()),
                ("theme".to_string(), "dark".to_string()),
            ])
        );
    }

    #[test]
    fn marker_is_the_named_cookie() {
        let jar = CookieJar::from_pairs(&origin(), [("theme", "dark")]);
        assert!(!jar.has_marker());
    }

    #[test]
    fn expires_in_the_past_removes_marker() {
        let jar = CookieJar::from_pairs(&origin(), [(SESSION_COOKIE, "abc123")]);
        assert!(jar.has_marker());
        set_cookie(
            &jar,
            "carenotes_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
        );
        assert!(!jar.has_marker());
        assert!(jar.export().is_empty());
    }

    #[test]
    fn max_age_zero_removes_marker() {
        let jar = CookieJar::from_pairs(&origin(), [(SESSION_COOKIE, "abc123")]);
        set_cookie(&jar, "carenotes_session=; Max-Age=0; Path=/");
        assert!(!jar.has_marker());
    }

    #[test]
    fn clear_expires_everything() {
        let jar = CookieJar::from_pairs(&origin(), [(SESSION_COOKIE, "abc123"), ("theme", "dark")]);
        jar.clear();
        assert!(jar.export().is_empty());
    }

    #[test]
    fn export_restores_into_a_new_jar() {
        let jar = CookieJar::new(&origin());
        set_cookie(&jar, "carenotes_session=abc123; Path=/");
        let restored = CookieJar::from_pairs(&origin(), jar.export());
        assert_eq!(restored.export(), jar.export());
    }
}
