//! Retry orchestration
//!
//! Drives a render as an explicit state machine:
//!
//! ```text
//!            ┌──────────── success ─────────────┐
//!            │                                  ▼
//! open ──▶ Round(1) ──reload──▶ Round(2) ──▶ Succeeded
//!  │          │                    │
//!  │          └──── all failed ────┴──────▶ Exhausted
//!  ▼
//! Fatal (launch/context/filter failure, never retried)
//! ```
//!
//! Each round sweeps [`WAIT_SEQUENCE`]. The session is closed exactly once
//! after it has been opened, whatever the outcome.

use super::attempt::{AttemptFailure, AttemptOutcome, NavigationAttemptRunner};
use super::filter::ResourceFilterPolicy;
use super::request::RenderRequest;
use super::strategy::{WaitStrategy, WAIT_SEQUENCE};
use crate::browser::{RenderEngine, RenderSession};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Attempt budget and sub-wait caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Outer rounds, each sweeping the full strategy sequence (default: 2)
    pub rounds: u32,
    /// Pause after a failed attempt before the next step (default: 600ms)
    pub strategy_pause: Duration,
    /// Cap on the selector wait (default: 20s)
    pub selector_cap: Duration,
    /// Cap on the network-quiet wait (default: 15s)
    pub quiescence_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rounds: 2,
            strategy_pause: Duration::from_millis(600),
            selector_cap: Duration::from_millis(20_000),
            quiescence_cap: Duration::from_millis(15_000),
        }
    }
}

/// What a render produced. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Captured document
    Rendered(String),
    /// All attempts failed; carries the last cause
    TimedOut(String),
    /// Environment failure before the retry loop
    Fatal(String),
}

impl RenderResult {
    /// Machine-readable kind, used in error bodies and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            RenderResult::Rendered(_) => "rendered",
            RenderResult::TimedOut(_) => "render_timeout",
            RenderResult::Fatal(_) => "render_failed",
        }
    }
}

/// Phase of the retry state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Sweeping the strategy sequence in the given 1-based round
    Round(u32),
    /// Every round failed
    Exhausted,
    /// An attempt captured the document
    Succeeded,
}

/// Result plus the bookkeeping of how it was reached
#[derive(Debug, Clone)]
pub struct RenderReport {
    /// The outcome
    pub result: RenderResult,
    /// Navigation attempts made
    pub attempts: u32,
    /// Soft reloads made
    pub reloads: u32,
    /// Final phase
    pub phase: RetryPhase,
    /// Wall time, session open to close
    pub elapsed: Duration,
}

enum Step {
    Attempt,
    Reload,
    Exhausted,
    Succeeded(String),
}

struct RetryState {
    round: u32,
    strategy_index: usize,
    attempts: u32,
    reloads: u32,
    last_failure: Option<AttemptFailure>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            round: 1,
            strategy_index: 0,
            attempts: 0,
            reloads: 0,
            last_failure: None,
        }
    }

    fn strategy(&self) -> WaitStrategy {
        WAIT_SEQUENCE[self.strategy_index]
    }

    /// Next step after a failed attempt.
    ///
    /// Reloads only between rounds; a reload after the last round would be
    /// followed by no attempt, so it is skipped.
    fn advance(&mut self, rounds: u32) -> Step {
        if self.strategy_index + 1 < WAIT_SEQUENCE.len() {
            self.strategy_index += 1;
            Step::Attempt
        } else if self.round < rounds {
            Step::Reload
        } else {
            Step::Exhausted
        }
    }

    fn last_cause(&self) -> String {
        self.last_failure
            .as_ref()
            .map(|f| f.cause.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Owns the attempt budget for renders against one engine
#[derive(Debug)]
pub struct RetryOrchestrator<E> {
    engine: E,
    policy: RetryPolicy,
}

impl<E: RenderEngine> RetryOrchestrator<E> {
    /// Orchestrator with the default policy
    pub fn new(engine: E) -> Self {
        Self::with_policy(engine, RetryPolicy::default())
    }

    /// Orchestrator with a custom policy
    pub fn with_policy(engine: E, policy: RetryPolicy) -> Self {
        let policy = RetryPolicy {
            rounds: policy.rounds.max(1),
            ..policy
        };
        Self { engine, policy }
    }

    /// The engine sessions are opened on
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Render `request`, always releasing the session it opens
    #[instrument(skip(self, request), fields(url = %request.url(), mode = request.mode().as_str()))]
    pub async fn render(&self, request: &RenderRequest) -> RenderReport {
        let started = Instant::now();

        let mut session = match self.engine.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("Render fatal: {}", e);
                return RenderReport {
                    result: RenderResult::Fatal(e.to_string()),
                    attempts: 0,
                    reloads: 0,
                    phase: RetryPhase::Round(1),
                    elapsed: started.elapsed(),
                };
            }
        };

        let (result, state, phase) = self.drive(&mut session, request).await;

        if let Err(e) = session.close().await {
            warn!("Ignoring cleanup failure: {}", e);
        }

        RenderReport {
            result,
            attempts: state.attempts,
            reloads: state.reloads,
            phase,
            elapsed: started.elapsed(),
        }
    }

    async fn drive<S: RenderSession>(
        &self,
        session: &mut S,
        request: &RenderRequest,
    ) -> (RenderResult, RetryState, RetryPhase) {
        let mut state = RetryState::new();

        if let Some(filter) = ResourceFilterPolicy::for_mode(request.mode()) {
            if let Err(e) = session.install_filter(filter).await {
                error!("Render fatal: {}", e);
                return (RenderResult::Fatal(e.to_string()), state, RetryPhase::Round(1));
            }
        }

        let runner = NavigationAttemptRunner::new(self.policy);
        let mut step = Step::Attempt;

        loop {
            step = match step {
                Step::Attempt => {
                    state.attempts += 1;
                    let strategy = state.strategy();
                    match runner.run(session, request, strategy, state.attempts).await {
                        AttemptOutcome::Success(html) => Step::Succeeded(html),
                        AttemptOutcome::Failure(failure) => {
                            warn!(
                                "Nav attempt failed (round {}, attempt {}, {}): {}",
                                state.round, failure.attempt, failure.strategy, failure.cause
                            );
                            state.last_failure = Some(failure);
                            let next = state.advance(self.policy.rounds);
                            if !matches!(next, Step::Exhausted) {
                                tokio::time::sleep(self.policy.strategy_pause).await;
                            }
                            next
                        }
                    }
                }
                Step::Reload => {
                    state.reloads += 1;
                    if let Err(e) = session
                        .reload(WaitStrategy::DomReady, request.nav_timeout())
                        .await
                    {
                        debug!("Soft reload failed: {}", e);
                    }
                    state.round += 1;
                    state.strategy_index = 0;
                    Step::Attempt
                }
                Step::Exhausted => {
                    let cause = state.last_cause();
                    error!("Render error final after {} attempts: {}", state.attempts, cause);
                    return (RenderResult::TimedOut(cause), state, RetryPhase::Exhausted);
                }
                Step::Succeeded(html) => {
                    info!(
                        "Rendered {} bytes after {} attempt(s)",
                        html.len(),
                        state.attempts
                    );
                    return (RenderResult::Rendered(html), state, RetryPhase::Succeeded);
                }
            };
        }
    }
}
