//! CORS configuration
//!
//! The render service is called from arbitrary front-ends, so every origin is
//! allowed. Only the methods and headers the API actually uses are listed.

use http::Method;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Headers a caller may send
pub const ALLOWED_HEADERS: [http::header::HeaderName; 2] =
    [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];

/// Methods the API serves
pub const ALLOWED_METHODS: [Method; 2] = [Method::GET, Method::OPTIONS];

/// Response headers visible to browser callers
pub const EXPOSED_HEADERS: [&str; 2] = ["x-render-attempts", "x-request-id"];

/// Default max age for preflight cache (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// CORS layer allowing any origin
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .expose_headers(EXPOSED_HEADERS.map(http::header::HeaderName::from_static))
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}
