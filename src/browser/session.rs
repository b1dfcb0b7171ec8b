//! A live render session
//!
//! Wraps one browser process, its isolated context and the single page a
//! render drives. Readiness is observed by polling the document from inside
//! the page; navigations are issued as raw `Page.navigate` commands so that
//! the wait condition stays under the pipeline's control.

use super::interception;
use super::RenderSession;
use crate::error::{BrowserError, NavigationError};
use crate::render::{ResourceFilterPolicy, WaitStrategy};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::{NavigateParams, ReloadParams};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Interval between `document.readyState` probes
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must hold still to count as quiet
const QUIET_WINDOW_MS: u64 = 500;

/// Marks the current document so a probe can tell it apart from its successor
const MARK_STALE_SCRIPT: &str = "window.__renderApiStale = true; true";

/// Ready state of the committed document, or `stale` while the old one remains
const READY_STATE_SCRIPT: &str =
    "window.__renderApiStale === true ? 'stale' : document.readyState";

/// Log target for page-originated diagnostics
const PAGE_TARGET: &str = "render_api::page";

/// Protocol errors raised when the page navigated under a running script
const CONTEXT_LOST_MARKERS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
    "Promise was collected",
];

/// Session over a dedicated chromiumoxide browser
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    context_id: BrowserContextId,
    page: Page,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("context_id", &self.context_id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl BrowserSession {
    /// Take ownership of a prepared browser and start page diagnostics
    pub(crate) async fn start(
        browser: Browser,
        handler: JoinHandle<()>,
        context_id: BrowserContextId,
        page: Page,
    ) -> Self {
        let mut session = Self {
            browser,
            handler,
            context_id,
            page,
            tasks: Vec::new(),
            closed: false,
        };

        match attach_diagnostics(&session.page).await {
            Ok(task) => session.tasks.push(task),
            Err(e) => warn!("Page diagnostics unavailable: {}", e),
        }

        session
    }

    /// Underlying page
    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn install_filter(&mut self, policy: ResourceFilterPolicy) -> Result<(), BrowserError> {
        let task = interception::install(&self.page, policy).await?;
        self.tasks.push(task);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn navigate(
        &mut self,
        url: &str,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        let timeout_ms = timeout.as_millis() as u64;
        mark_stale(&self.page).await;

        let page = &self.page;
        let navigation = async move {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

            if let Some(ref error_text) = response.result.error_text {
                return Err(NavigationError::LoadFailed(error_text.clone()));
            }

            // No loader means a same-document navigation; nothing new will load
            if response.result.loader_id.is_none() {
                return Ok(());
            }

            wait_for_strategy(page, strategy).await
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| NavigationError::Timeout(timeout_ms))??;

        debug!("Navigation settled ({})", strategy);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        let timeout_ms = timeout.as_millis() as u64;
        let timed_out = || NavigationError::SelectorTimeout {
            selector: selector.to_string(),
            timeout_ms,
        };

        let page = &self.page;
        let found = tokio::time::timeout(
            timeout + Duration::from_secs(1),
            poll_selector(
                move |remaining| check_selector(page, selector, remaining),
                timeout,
            ),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(NavigationError::SelectorFailed)?;

        if found {
            Ok(())
        } else {
            Err(timed_out())
        }
    }

    async fn wait_for_network_quiet(&mut self, timeout: Duration) -> Result<(), NavigationError> {
        let timeout_ms = timeout.as_millis() as u64;

        tokio::time::timeout(
            timeout + Duration::from_secs(1),
            evaluate_quiet(&self.page, Some(timeout_ms)),
        )
        .await
        .map_err(|_| NavigationError::QuiescenceTimeout(timeout_ms))?
    }

    #[instrument(skip(self))]
    async fn reload(
        &mut self,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), NavigationError> {
        let timeout_ms = timeout.as_millis() as u64;
        mark_stale(&self.page).await;

        let page = &self.page;
        let reload = async move {
            page.execute(ReloadParams::default())
                .await
                .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;
            wait_for_strategy(page, strategy).await
        };

        tokio::time::timeout(timeout, reload)
            .await
            .map_err(|_| NavigationError::Timeout(timeout_ms))?
    }

    async fn content(&mut self) -> Result<String, NavigationError> {
        self.page
            .content()
            .await
            .map_err(|e| NavigationError::CaptureFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        for task in self.tasks.drain(..) {
            task.abort();
        }

        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::CloseFailed(e.to_string()));

        if let Err(e) = tokio::time::timeout(Duration::from_secs(5), self.browser.wait()).await {
            warn!("Browser process did not exit in time: {}", e);
        }

        // Wait for handler to finish
        if tokio::time::timeout(Duration::from_secs(5), &mut self.handler)
            .await
            .is_err()
        {
            self.handler.abort();
        }

        info!("Browser closed");
        result
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            for task in &self.tasks {
                task.abort();
            }
            self.handler.abort();
        }
    }
}

async fn mark_stale(page: &Page) {
    if let Err(e) = page.evaluate(MARK_STALE_SCRIPT).await {
        debug!("Could not mark current document: {}", e);
    }
}

async fn wait_for_ready_state(page: &Page, accepted: &[&str]) {
    loop {
        // Probes fail while the execution context is being swapped
        if let Ok(result) = page.evaluate(READY_STATE_SCRIPT).await {
            if let Ok(state) = result.into_value::<String>() {
                if accepted.contains(&state.as_str()) {
                    return;
                }
            }
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

async fn wait_for_strategy(page: &Page, strategy: WaitStrategy) -> Result<(), NavigationError> {
    match strategy {
        WaitStrategy::DomReady => {
            wait_for_ready_state(page, &["interactive", "complete"]).await;
            Ok(())
        }
        WaitStrategy::NetworkQuiet => {
            wait_for_ready_state(page, &["complete"]).await;
            evaluate_quiet(page, None).await
        }
    }
}

async fn evaluate_quiet(page: &Page, budget_ms: Option<u64>) -> Result<(), NavigationError> {
    let script = network_quiet_script(budget_ms);
    let quiet = page
        .evaluate(script.as_str())
        .await
        .map_err(|e| NavigationError::LoadFailed(e.to_string()))?
        .into_value::<bool>()
        .unwrap_or(false);

    if quiet {
        Ok(())
    } else {
        Err(NavigationError::QuiescenceTimeout(budget_ms.unwrap_or_default()))
    }
}

/// Outcome of one in-page selector check
#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectorCheck {
    Found,
    /// The script ran out its budget without a match
    Missing,
    /// The page navigated and took the script's context with it
    ContextLost,
    Failed(String),
}

async fn check_selector(page: &Page, selector: &str, remaining: Duration) -> SelectorCheck {
    let script = selector_script(selector, remaining.as_millis() as u64);
    match page.evaluate(script.as_str()).await {
        Ok(result) => match result.into_value::<bool>() {
            Ok(true) => SelectorCheck::Found,
            Ok(false) => SelectorCheck::Missing,
            Err(e) => SelectorCheck::Failed(e.to_string()),
        },
        Err(CdpError::JavascriptException(details)) => SelectorCheck::Failed(
            details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone()),
        ),
        Err(e) if is_context_lost(&e.to_string()) => SelectorCheck::ContextLost,
        Err(e) => SelectorCheck::Failed(e.to_string()),
    }
}

fn is_context_lost(message: &str) -> bool {
    CONTEXT_LOST_MARKERS.iter().any(|m| message.contains(m))
}

/// Run `check` until it settles or `timeout` elapses, starting over in the
/// new document whenever the page navigates mid-check.
///
/// `Ok(false)` means the selector never matched.
async fn poll_selector<F, Fut>(mut check: F, timeout: Duration) -> Result<bool, String>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = SelectorCheck>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        match check(remaining).await {
            SelectorCheck::Found => return Ok(true),
            SelectorCheck::Missing => return Ok(false),
            SelectorCheck::Failed(reason) => return Err(reason),
            SelectorCheck::ContextLost => {
                debug!("Page navigated during selector wait; checking again");
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        }
    }
}

/// Forward console errors/warnings and uncaught exceptions to tracing
async fn attach_diagnostics(page: &Page) -> Result<JoinHandle<()>, BrowserError> {
    let listen_failed = |e: chromiumoxide::error::CdpError| BrowserError::ConfigError(e.to_string());

    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(listen_failed)?;
    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(listen_failed)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = console.next() => {
                    let text = console_text(&event.args);
                    match event.r#type {
                        ConsoleApiCalledType::Error => {
                            warn!(target: PAGE_TARGET, "PAGE console.error: {}", text)
                        }
                        ConsoleApiCalledType::Warning => {
                            warn!(target: PAGE_TARGET, "PAGE console.warn: {}", text)
                        }
                        _ => {}
                    }
                }
                Some(event) = exceptions.next() => {
                    let details = &event.exception_details;
                    let description = details
                        .exception
                        .as_ref()
                        .and_then(|e| e.description.clone())
                        .unwrap_or_else(|| details.text.clone());
                    warn!(target: PAGE_TARGET, "PAGE error: {}", description);
                }
                else => break,
            }
        }
    }))
}

fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Script resolving `true` once `selector` matches, `false` after `timeout_ms`.
/// A malformed selector rejects.
fn selector_script(selector: &str, timeout_ms: u64) -> String {
    let literal = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
            new Promise((resolve, reject) => {{
                const selector = {literal};
                const timeout = {timeout_ms};
                const start = Date.now();

                function check() {{
                    let el;
                    try {{
                        el = document.querySelector(selector);
                    }} catch (e) {{
                        reject(e);
                        return;
                    }}
                    if (el) {{
                        resolve(true);
                    }} else if (Date.now() - start > timeout) {{
                        resolve(false);
                    }} else {{
                        setTimeout(check, 100);
                    }}
                }}
                check();
            }})
        "#
    )
}

/// Script resolving `true` once the page is complete and the resource count
/// has held still for the quiet window. Without a budget it waits forever.
fn network_quiet_script(budget_ms: Option<u64>) -> String {
    let budget = budget_ms
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "Infinity".to_string());
    format!(
        r#"
            (async () => {{
                const budget = {budget};
                const quietWindow = {QUIET_WINDOW_MS};
                const start = Date.now();
                let lastCount = -1;
                let stableSince = Date.now();

                while (Date.now() - start < budget) {{
                    const count = performance.getEntriesByType('resource').length;
                    if (document.readyState === 'complete' && count === lastCount) {{
                        if (Date.now() - stableSince >= quietWindow) {{
                            return true;
                        }}
                    }} else {{
                        lastCount = count;
                        stableSince = Date.now();
                    }}
                    await new Promise(r => setTimeout(r, 100));
                }}
                return false;
            }})()
        "#
    )
}
