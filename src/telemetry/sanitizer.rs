//! Redaction of sensitive query parameters before they reach telemetry.

use std::borrow::Cow;

/// Rewrites a raw query string before it is recorded as `url.query`.
pub trait UriSanitizer: Send + Sync {
    fn sanitize_query<'a>(&self, query: &'a str) -> Cow<'a, str>;
}

/// Replaces the values of well-known signing parameters with `REDACTED`.
#[derive(Clone, Debug)]
pub struct DefaultSanitizer {
    keys: Vec<String>,
}

const REDACTED: &str = "REDACTED";

impl DefaultSanitizer {
    pub const DEFAULT_KEYS: [&'static str; 4] = ["AWSAccessKeyId", "Signature", "sig", "X-Goog-Signature"];

    pub fn new() -> Self {
        Self::with_keys(Self::DEFAULT_KEYS)
    }

    /// Redact a custom set of parameter names (exact, case-sensitive match).
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

impl Default for DefaultSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl UriSanitizer for DefaultSanitizer {
    fn sanitize_query<'a>(&self, query: &'a str) -> Cow<'a, str> {
        let sensitive = query
            .split('&')
            .any(|pair| pair.split_once('=').is_some_and(|(key, _)| self.is_sensitive(key)));
        if !sensitive {
            return Cow::Borrowed(query);
        }

        let pairs: Vec<Cow<'_, str>> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, _)) if self.is_sensitive(key) => Cow::Owned(format!("{}={}", key, REDACTED)),
                _ => Cow::Borrowed(pair),
            })
            .collect();
        Cow::Owned(pairs.join("&"))
    }
}
