//! Render API - rendered HTML over HTTP
//!
//! `GET /render?url=...` drives a headless Chromium through the page, waits
//! for it to settle and returns the resulting document. Slow or flaky pages
//! are retried with progressively more patient wait strategies before the
//! request gives up.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──▶ handlers::render ──▶ RetryOrchestrator ──▶ RenderEngine (CDP)
//!                                     │                    │
//!                                     ▼                    ▼
//!                        NavigationAttemptRunner     RenderSession
//!                     (navigate, selector, quiet,   (page, context,
//!                        settle, capture)            interception)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use render_api::browser::BrowserController;
//! use render_api::render::{RenderRequest, RenderResult, RetryOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = RetryOrchestrator::new(BrowserController::default());
//!     let request = RenderRequest::for_url("https://example.com")?;
//!
//!     if let RenderResult::Rendered(html) = orchestrator.render(&request).await.result {
//!         println!("{} bytes", html.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod render;
pub mod security;
pub mod server;
pub mod telemetry;

// Re-exports for convenience
pub use browser::{BrowserController, RenderEngine, RenderSession};
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use render::{RenderRequest, RenderResult, RetryOrchestrator};
pub use server::{app, serve, ServerState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
