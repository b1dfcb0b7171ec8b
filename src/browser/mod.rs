//! Browser automation module
//!
//! The render pipeline only ever sees the two traits defined here. The
//! chromiumoxide-backed implementation lives in [`controller`] (launch and
//! session identity), [`session`] (navigation, waits, capture) and
//! [`interception`] (request filtering).

pub mod controller;
pub mod interception;
pub mod session;

pub use controller::{BrowserConfig, BrowserController, SessionProfile};
pub use session::BrowserSession;

use crate::error::{BrowserError, NavigationError};
use crate::render::{ResourceFilterPolicy, WaitStrategy};
use async_trait::async_trait;
use std::time::Duration;

/// Something that can open isolated render sessions.
///
/// Every call to [`RenderEngine::open`] must produce a fresh session that
/// shares no cookies, storage or viewport state with any other session.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Session type handed to the pipeline
    type Session: RenderSession;

    /// Acquire a browser, an isolated context and a page.
    ///
    /// On error nothing is left running; partially acquired resources are
    /// released before returning.
    async fn open(&self) -> Result<Self::Session, BrowserError>;
}

/// One isolated browsing context with a single page.
#[async_trait]
pub trait RenderSession: Send {
    /// Route every sub-resource request through `policy`
    async fn install_filter(&mut self, policy: ResourceFilterPolicy) -> Result<(), BrowserError>;

    /// Navigate and wait for `strategy`, bounded by `timeout`
    async fn navigate(
        &mut self,
        url: &str,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError>;

    /// Wait until `selector` matches an element
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigationError>;

    /// Wait until the page stops making requests
    async fn wait_for_network_quiet(&mut self, timeout: Duration) -> Result<(), NavigationError>;

    /// Reload the current page and wait for `strategy`
    async fn reload(
        &mut self,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError>;

    /// Serialize the current document
    async fn content(&mut self) -> Result<String, NavigationError>;

    /// Tear down page, context and browser process
    async fn close(&mut self) -> Result<(), BrowserError>;
}
