//! Bearer token gate
//!
//! When a token is configured every route requires
//! `Authorization: Bearer <token>`; without one the gate lets everything
//! through. The token is read once at startup and never changes afterwards.
//!
//! ```rust,ignore
//! use render_api::security::{require_token, AuthConfig};
//! use axum::{middleware, Router};
//!
//! let auth = AuthConfig::new(std::env::var("AUTH_TOKEN").ok());
//! let app = Router::new()
//!     // ... routes
//!     .layer(middleware::from_fn_with_state(auth, require_token));
//! ```

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable authentication settings
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    token: Option<Arc<str>>,
}

impl AuthConfig {
    /// Gate on `token`; `None` or an empty string disables the gate
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.is_empty()).map(Arc::from);
        Self { token }
    }

    /// Whether a token is required
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Authenticate a request based on its Authorization header
    pub fn authenticate(&self, auth_header: Option<&str>) -> AuthResult {
        let expected = match self.token {
            Some(ref t) => t,
            None => return AuthResult::Bypassed,
        };

        let header = match auth_header {
            Some(h) => h,
            None => return AuthResult::MissingHeader,
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(t) => t,
            None => return AuthResult::InvalidFormat,
        };

        if constant_time_compare(token.as_bytes(), expected.as_bytes()) {
            AuthResult::Authenticated
        } else {
            warn!("Invalid authentication token attempt");
            AuthResult::InvalidToken
        }
    }
}

/// Token-based authentication result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// Authentication successful
    Authenticated,
    /// Authentication failed - missing header
    MissingHeader,
    /// Authentication failed - not a bearer credential
    InvalidFormat,
    /// Authentication failed - invalid token
    InvalidToken,
    /// No token configured
    Bypassed,
}

impl AuthResult {
    /// Check if authentication was successful or bypassed
    pub fn is_ok(&self) -> bool {
        matches!(self, AuthResult::Authenticated | AuthResult::Bypassed)
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// axum middleware enforcing [`AuthConfig`]
pub async fn require_token(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let result = auth.authenticate(header);
    if result.is_ok() {
        return next.run(request).await;
    }

    debug!("Rejected {} ({:?})", request.uri().path(), result);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
