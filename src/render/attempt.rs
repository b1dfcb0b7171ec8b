//! A single navigation attempt
//!
//! navigate -> selector (optional, attempt-ending) -> network quiet
//! (best-effort) -> settle pause (optional) -> capture.
//!
//! The runner never retries; it reports one [`AttemptOutcome`] and leaves the
//! decision to the orchestrator.

use super::orchestrator::RetryPolicy;
use super::request::RenderRequest;
use super::strategy::WaitStrategy;
use crate::browser::RenderSession;
use crate::error::NavigationError;
use tracing::{debug, instrument};

/// Why an attempt failed, and where
#[derive(Debug)]
pub struct AttemptFailure {
    /// Underlying error
    pub cause: NavigationError,
    /// Strategy the attempt used
    pub strategy: WaitStrategy,
    /// 1-based attempt number within the request
    pub attempt: u32,
}

/// Result of one attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Captured document
    Success(String),
    /// Attempt-ending failure
    Failure(AttemptFailure),
}

/// Executes one (strategy x session) attempt
#[derive(Debug, Clone, Copy)]
pub struct NavigationAttemptRunner {
    policy: RetryPolicy,
}

impl NavigationAttemptRunner {
    /// Create a runner bound by `policy`'s sub-wait caps
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run one attempt against `session`
    #[instrument(skip(self, session, request), fields(url = %request.url()))]
    pub async fn run<S: RenderSession>(
        &self,
        session: &mut S,
        request: &RenderRequest,
        strategy: WaitStrategy,
        attempt: u32,
    ) -> AttemptOutcome {
        match self.execute(session, request, strategy).await {
            Ok(html) => AttemptOutcome::Success(html),
            Err(cause) => AttemptOutcome::Failure(AttemptFailure {
                cause,
                strategy,
                attempt,
            }),
        }
    }

    async fn execute<S: RenderSession>(
        &self,
        session: &mut S,
        request: &RenderRequest,
        strategy: WaitStrategy,
    ) -> Result<String, NavigationError> {
        session
            .navigate(request.url(), strategy, request.nav_timeout())
            .await?;

        if let Some(selector) = request.selector() {
            let bound = self.policy.selector_cap.min(request.nav_timeout());
            session.wait_for_selector(selector, bound).await?;
        }

        let bound = self.policy.quiescence_cap.min(request.nav_timeout());
        if let Err(e) = session.wait_for_network_quiet(bound).await {
            debug!("Continuing without network quiet: {}", e);
        }

        if !request.extra_wait().is_zero() {
            debug!("Settling for {:?}", request.extra_wait());
            tokio::time::sleep(request.extra_wait()).await;
        }

        session.content().await
    }
}
