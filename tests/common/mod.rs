//! Scripted render engine for pipeline and HTTP tests.
//!
//! Every call a session receives is appended to its own log so tests can
//! assert on the exact sequence the pipeline drove.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use render_api::browser::{RenderEngine, RenderSession};
use render_api::error::{BrowserError, NavigationError};
use render_api::render::{ResourceFilterPolicy, ResourceKind, RetryOrchestrator, RetryPolicy, WaitStrategy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One call received by a fake session
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InstallFilter(Vec<ResourceKind>),
    Navigate(String, WaitStrategy, Duration),
    Selector(String, Duration),
    Quiet(Duration),
    Reload(WaitStrategy, Duration),
    Content,
    Close,
}

#[derive(Debug, Default, Clone)]
struct Behavior {
    open_error: Option<String>,
    filter_error: bool,
    navigate_failures: u32,
    navigate_delay: Duration,
    selector_fails: bool,
    quiet_fails: bool,
    reload_fails: bool,
    close_fails: bool,
}

#[derive(Debug, Default)]
struct Inner {
    behavior: Behavior,
    opened: AtomicU32,
    sessions: Mutex<Vec<Arc<Mutex<Vec<Call>>>>>,
}

/// Engine whose sessions follow a fixed script
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Inner>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, f: impl FnOnce(&mut Behavior)) -> Self {
        let mut behavior = self.inner.behavior.clone();
        f(&mut behavior);
        Self {
            inner: Arc::new(Inner {
                behavior,
                ..Default::default()
            }),
        }
    }

    /// `open` fails with a launch error
    pub fn failing_open(self, msg: &str) -> Self {
        let msg = msg.to_string();
        self.with(|b| b.open_error = Some(msg))
    }

    /// Installing the request filter fails
    pub fn failing_filter(self) -> Self {
        self.with(|b| b.filter_error = true)
    }

    /// The first `n` navigations of every session time out
    pub fn failing_navigations(self, n: u32) -> Self {
        self.with(|b| b.navigate_failures = n)
    }

    /// Every navigation times out
    pub fn always_timing_out(self) -> Self {
        self.failing_navigations(u32::MAX)
    }

    /// Navigations take this long before answering
    pub fn navigate_delay(self, delay: Duration) -> Self {
        self.with(|b| b.navigate_delay = delay)
    }

    /// The selector never appears
    pub fn failing_selector(self) -> Self {
        self.with(|b| b.selector_fails = true)
    }

    /// The network never goes quiet
    pub fn failing_quiet(self) -> Self {
        self.with(|b| b.quiet_fails = true)
    }

    /// Soft reloads fail
    pub fn failing_reload(self) -> Self {
        self.with(|b| b.reload_fails = true)
    }

    /// Closing the session fails
    pub fn failing_close(self) -> Self {
        self.with(|b| b.close_fails = true)
    }

    /// Sessions opened so far
    pub fn opened(&self) -> u32 {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Call log of the `index`-th session
    pub fn calls(&self, index: usize) -> Vec<Call> {
        self.inner.sessions.lock()[index].lock().clone()
    }

    /// Call logs of every session
    pub fn all_calls(&self) -> Vec<Vec<Call>> {
        self.inner
            .sessions
            .lock()
            .iter()
            .map(|log| log.lock().clone())
            .collect()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, BrowserError> {
        if let Some(ref msg) = self.inner.behavior.open_error {
            return Err(BrowserError::LaunchFailed(msg.clone()));
        }

        let id = self.inner.opened.fetch_add(1, Ordering::SeqCst);
        let log = Arc::new(Mutex::new(Vec::new()));
        self.inner.sessions.lock().push(Arc::clone(&log));

        Ok(FakeSession {
            id,
            behavior: self.inner.behavior.clone(),
            log,
            navigations: 0,
            url: None,
        })
    }
}

/// Session driven by [`FakeEngine`]'s script
#[derive(Debug)]
pub struct FakeSession {
    id: u32,
    behavior: Behavior,
    log: Arc<Mutex<Vec<Call>>>,
    navigations: u32,
    url: Option<String>,
}

impl FakeSession {
    fn record(&self, call: Call) {
        self.log.lock().push(call);
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn install_filter(&mut self, policy: ResourceFilterPolicy) -> Result<(), BrowserError> {
        self.record(Call::InstallFilter(policy.blocked().to_vec()));
        if self.behavior.filter_error {
            return Err(BrowserError::InterceptionFailed("Fetch.enable rejected".into()));
        }
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: &str,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        self.record(Call::Navigate(url.to_string(), strategy, timeout));
        if !self.behavior.navigate_delay.is_zero() {
            tokio::time::sleep(self.behavior.navigate_delay).await;
        }

        self.navigations += 1;
        if self.navigations <= self.behavior.navigate_failures {
            return Err(NavigationError::Timeout(timeout.as_millis() as u64));
        }
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        self.record(Call::Selector(selector.to_string(), timeout));
        if self.behavior.selector_fails {
            return Err(NavigationError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn wait_for_network_quiet(&mut self, timeout: Duration) -> Result<(), NavigationError> {
        self.record(Call::Quiet(timeout));
        if self.behavior.quiet_fails {
            return Err(NavigationError::QuiescenceTimeout(timeout.as_millis() as u64));
        }
        Ok(())
    }

    async fn reload(
        &mut self,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        self.record(Call::Reload(strategy, timeout));
        if self.behavior.reload_fails {
            return Err(NavigationError::LoadFailed("net::ERR_CONNECTION_RESET".into()));
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String, NavigationError> {
        self.record(Call::Content);
        let url = self.url.clone().unwrap_or_default();
        Ok(format!(
            "<html><body data-session=\"{}\">{}</body></html>",
            self.id, url
        ))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.record(Call::Close);
        if self.behavior.close_fails {
            return Err(BrowserError::CloseFailed("target already gone".into()));
        }
        Ok(())
    }
}

/// Policy without inter-attempt pauses
pub fn instant_policy() -> RetryPolicy {
    RetryPolicy {
        strategy_pause: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

/// Orchestrator over a clone of `engine` with [`instant_policy`]
pub fn orchestrator(engine: &FakeEngine) -> RetryOrchestrator<FakeEngine> {
    RetryOrchestrator::with_policy(engine.clone(), instant_policy())
}

/// Number of `Close` calls in a log
pub fn closes(calls: &[Call]) -> usize {
    calls.iter().filter(|c| **c == Call::Close).count()
}
