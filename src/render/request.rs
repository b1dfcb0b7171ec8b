//! Render request validation
//!
//! Turns raw query parameters into an immutable [`RenderRequest`]. Numeric
//! parameters are lenient: anything that does not start with an integer falls
//! back to its default, and out-of-range values are clamped rather than
//! rejected. Only a missing or non-http(s) `url` fails the request.

use crate::error::RequestError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Default extra settle time
pub const DEFAULT_WAIT_MS: u64 = 0;
/// Upper bound for the extra settle time
pub const MAX_WAIT_MS: u64 = 15_000;
/// Default navigation timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 45_000;
/// Lower bound for the navigation timeout
pub const MIN_TIMEOUT_MS: u64 = 10_000;
/// Upper bound for the navigation timeout
pub const MAX_TIMEOUT_MS: u64 = 90_000;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^https?://").expect("static url pattern"))
}

/// Rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Block images, media and fonts
    #[default]
    Fast,
    /// Load every resource
    Full,
}

impl RenderMode {
    /// Parse the `mode` parameter; only a case-insensitive "full" selects Full.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(mode) if mode.eq_ignore_ascii_case("full") => RenderMode::Full,
            _ => RenderMode::Fast,
        }
    }

    /// Lowercase name, as used in logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Fast => "fast",
            RenderMode::Full => "full",
        }
    }
}

/// Raw `GET /render` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderQuery {
    /// Page to render
    pub url: Option<String>,
    /// Extra settle time in ms
    pub wait: Option<String>,
    /// Selector to wait for
    pub selector: Option<String>,
    /// Navigation timeout in ms
    pub timeout: Option<String>,
    /// "fast" or "full"
    pub mode: Option<String>,
}

/// A validated render request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    url: String,
    extra_wait: Duration,
    selector: Option<String>,
    mode: RenderMode,
    nav_timeout: Duration,
}

impl RenderRequest {
    /// Validate raw query parameters
    pub fn from_query(query: &RenderQuery) -> Result<Self, RequestError> {
        let url = query.url.as_deref().unwrap_or_default();
        if !url_pattern().is_match(url) {
            return Err(RequestError::InvalidUrl(url.to_string()));
        }

        let wait_ms = parse_leading_int(query.wait.as_deref())
            .unwrap_or(DEFAULT_WAIT_MS as i64)
            .clamp(0, MAX_WAIT_MS as i64);

        let timeout_ms = parse_leading_int(query.timeout.as_deref())
            .filter(|ms| *ms != 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS as i64)
            .clamp(MIN_TIMEOUT_MS as i64, MAX_TIMEOUT_MS as i64);

        let selector = query
            .selector
            .as_ref()
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(Self {
            url: url.to_string(),
            extra_wait: Duration::from_millis(wait_ms as u64),
            selector,
            mode: RenderMode::parse(query.mode.as_deref()),
            nav_timeout: Duration::from_millis(timeout_ms as u64),
        })
    }

    /// Shorthand for a request with default parameters
    pub fn for_url(url: impl Into<String>) -> Result<Self, RequestError> {
        Self::from_query(&RenderQuery {
            url: Some(url.into()),
            ..Default::default()
        })
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Unconditional pause after the load signals
    pub fn extra_wait(&self) -> Duration {
        self.extra_wait
    }

    /// Selector that must appear before capture
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Rendering mode
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Bound for each navigation and for the soft reload
    pub fn nav_timeout(&self) -> Duration {
        self.nav_timeout
    }

    /// Copy with a different mode
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Copy with a selector to wait for
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }
}

/// Parse a leading integer the way lenient query parsing expects.
///
/// Leading whitespace and a sign are accepted, trailing garbage is ignored
/// ("1500ms" is 1500) and values too large for `i64` saturate.
fn parse_leading_int(raw: Option<&str>) -> Option<i64> {
    let s = raw?.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}
