//! Render pipeline
//!
//! Validation, resource filtering, wait strategies, single attempts and the
//! retry state machine that ties them together. Nothing in here depends on
//! chromiumoxide; the browser is reached through [`crate::browser::RenderEngine`].

pub mod attempt;
pub mod filter;
pub mod orchestrator;
pub mod request;
pub mod strategy;

pub use attempt::{AttemptFailure, AttemptOutcome, NavigationAttemptRunner};
pub use filter::{FilterDecision, ResourceFilterPolicy, ResourceKind};
pub use orchestrator::{RenderReport, RenderResult, RetryOrchestrator, RetryPhase, RetryPolicy};
pub use request::{RenderMode, RenderQuery, RenderRequest};
pub use strategy::{WaitStrategy, WAIT_SEQUENCE};
