//! Retry pipeline tests
//!
//! Drive the orchestrator against a scripted engine and check which browser
//! operations it performs, in which order, and what it reports.

mod common;

use common::{closes, instant_policy, orchestrator, Call, FakeEngine};
use pretty_assertions::assert_eq;
use render_api::render::{
    RenderMode, RenderQuery, RenderRequest, RenderResult, ResourceKind, RetryOrchestrator,
    RetryPhase, RetryPolicy, WaitStrategy,
};
use std::time::{Duration, Instant};

const URL: &str = "https://example.com/app";
const NAV: Duration = Duration::from_millis(45_000);
const QUIET: Duration = Duration::from_millis(15_000);
const PAUSE: Duration = Duration::from_millis(600);

fn request() -> RenderRequest {
    RenderRequest::for_url(URL).unwrap()
}

fn query(pairs: &[(&str, &str)]) -> RenderRequest {
    let mut q = RenderQuery {
        url: Some(URL.to_string()),
        ..Default::default()
    };
    for (key, value) in pairs {
        let value = Some(value.to_string());
        match *key {
            "wait" => q.wait = value,
            "selector" => q.selector = value,
            "timeout" => q.timeout = value,
            "mode" => q.mode = value,
            other => panic!("unknown param {other}"),
        }
    }
    RenderRequest::from_query(&q).unwrap()
}

fn fast_filter() -> Call {
    Call::InstallFilter(vec![ResourceKind::Image, ResourceKind::Media, ResourceKind::Font])
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn test_first_attempt_success_skips_network_quiet_strategy() {
    let engine = FakeEngine::new();
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Rendered(ref html) if html.contains(URL)));
    assert_eq!(report.attempts, 1);
    assert_eq!(report.reloads, 0);
    assert_eq!(report.phase, RetryPhase::Succeeded);

    assert_eq!(
        engine.calls(0),
        vec![
            fast_filter(),
            Call::Navigate(URL.to_string(), WaitStrategy::DomReady, NAV),
            Call::Quiet(QUIET),
            Call::Content,
            Call::Close,
        ]
    );
}

#[tokio::test]
async fn test_second_strategy_recovers_without_reload() {
    let engine = FakeEngine::new().failing_navigations(1);
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert_eq!(report.attempts, 2);
    assert_eq!(report.reloads, 0);

    let calls = engine.calls(0);
    assert_eq!(
        calls[1..3].to_vec(),
        vec![
            Call::Navigate(URL.to_string(), WaitStrategy::DomReady, NAV),
            Call::Navigate(URL.to_string(), WaitStrategy::NetworkQuiet, NAV),
        ]
    );
    assert!(!calls.iter().any(|c| matches!(c, Call::Reload(..))));
    assert_eq!(closes(&calls), 1);
}

#[tokio::test]
async fn test_second_round_recovers_after_reload() {
    let engine = FakeEngine::new().failing_navigations(2);
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert_eq!(report.attempts, 3);
    assert_eq!(report.reloads, 1);

    let calls = engine.calls(0);
    assert_eq!(calls[3], Call::Reload(WaitStrategy::DomReady, NAV));
    assert_eq!(calls[4], Call::Navigate(URL.to_string(), WaitStrategy::DomReady, NAV));
}

#[tokio::test]
async fn test_network_quiet_failure_is_not_fatal() {
    let engine = FakeEngine::new().failing_quiet();
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn test_close_failure_does_not_change_result() {
    let engine = FakeEngine::new().failing_close();
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert_eq!(closes(&engine.calls(0)), 1);
}

#[tokio::test]
async fn test_extra_wait_is_applied_before_capture() {
    let engine = FakeEngine::new();
    let started = Instant::now();
    let report = orchestrator(&engine)
        .render(&query(&[("wait", "120")]))
        .await;

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert!(started.elapsed() >= Duration::from_millis(120));
}

// ============================================================================
// Exhaustion
// ============================================================================

#[tokio::test]
async fn test_exhaustion_reports_last_cause() {
    let engine = FakeEngine::new().always_timing_out();
    let report = orchestrator(&engine).render(&request()).await;

    assert_eq!(
        report.result,
        RenderResult::TimedOut("Navigation timed out after 45000ms".to_string())
    );
    assert_eq!(report.attempts, 4);
    assert_eq!(report.reloads, 1);
    assert_eq!(report.phase, RetryPhase::Exhausted);

    assert_eq!(
        engine.calls(0),
        vec![
            fast_filter(),
            Call::Navigate(URL.to_string(), WaitStrategy::DomReady, NAV),
            Call::Navigate(URL.to_string(), WaitStrategy::NetworkQuiet, NAV),
            Call::Reload(WaitStrategy::DomReady, NAV),
            Call::Navigate(URL.to_string(), WaitStrategy::DomReady, NAV),
            Call::Navigate(URL.to_string(), WaitStrategy::NetworkQuiet, NAV),
            Call::Close,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_strategy_pauses_before_next_attempt() {
    let engine = FakeEngine::new().failing_navigations(1);
    let orchestrator = RetryOrchestrator::new(engine.clone());

    let started = tokio::time::Instant::now();
    let report = orchestrator.render(&request()).await;
    let elapsed = started.elapsed();

    assert!(matches!(report.result, RenderResult::Rendered(_)));
    assert_eq!(report.attempts, 2);
    assert!(elapsed >= PAUSE, "{elapsed:?}");
    assert!(elapsed < PAUSE * 2, "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_no_pause_before_reporting_exhaustion() {
    let engine = FakeEngine::new().always_timing_out();
    let orchestrator = RetryOrchestrator::new(engine.clone());

    let started = tokio::time::Instant::now();
    let report = orchestrator.render(&request()).await;
    let elapsed = started.elapsed();

    assert_eq!(report.phase, RetryPhase::Exhausted);
    assert_eq!(report.attempts, 4);
    // One pause between each pair of attempts, none after the last
    assert!(elapsed >= PAUSE * 3, "{elapsed:?}");
    assert!(elapsed < PAUSE * 4, "{elapsed:?}");
}

#[tokio::test]
async fn test_failed_reload_still_runs_second_round() {
    let engine = FakeEngine::new().always_timing_out().failing_reload();
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::TimedOut(_)));
    assert_eq!(report.attempts, 4);
    assert_eq!(report.reloads, 1);
}

#[tokio::test]
async fn test_selector_timeout_ends_attempt() {
    let engine = FakeEngine::new().failing_selector();
    let report = orchestrator(&engine)
        .render(&query(&[("selector", "#root")]))
        .await;

    match report.result {
        RenderResult::TimedOut(cause) => {
            assert!(cause.contains("#root"), "{cause}");
            assert!(cause.contains("20000ms"), "{cause}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(report.attempts, 4);

    let calls = engine.calls(0);
    assert!(!calls.contains(&Call::Content));
    assert!(!calls.iter().any(|c| matches!(c, Call::Quiet(_))));
}

#[tokio::test]
async fn test_sub_waits_are_bounded_by_navigation_timeout() {
    let engine = FakeEngine::new();
    orchestrator(&engine)
        .render(&query(&[("selector", ".ready"), ("timeout", "12000")]))
        .await;

    let nav = Duration::from_millis(12_000);
    assert_eq!(
        engine.calls(0)[1..4].to_vec(),
        vec![
            Call::Navigate(URL.to_string(), WaitStrategy::DomReady, nav),
            Call::Selector(".ready".to_string(), nav),
            Call::Quiet(nav),
        ]
    );
}

#[tokio::test]
async fn test_single_round_policy_never_reloads() {
    let engine = FakeEngine::new().always_timing_out();
    let policy = RetryPolicy {
        rounds: 0,
        ..instant_policy()
    };
    let orchestrator = RetryOrchestrator::with_policy(engine.clone(), policy);
    assert_eq!(orchestrator.policy().rounds, 1);

    let report = orchestrator.render(&request()).await;
    assert_eq!(report.attempts, 2);
    assert_eq!(report.reloads, 0);
}

// ============================================================================
// Environment failures
// ============================================================================

#[tokio::test]
async fn test_open_failure_is_fatal_and_not_retried() {
    let engine = FakeEngine::new().failing_open("chrome not found");
    let report = orchestrator(&engine).render(&request()).await;

    assert_eq!(
        report.result,
        RenderResult::Fatal("Failed to launch browser: chrome not found".to_string())
    );
    assert_eq!(report.attempts, 0);
    assert_eq!(engine.opened(), 0);
    assert!(engine.all_calls().is_empty());
}

#[tokio::test]
async fn test_filter_failure_is_fatal_but_closes_session() {
    let engine = FakeEngine::new().failing_filter();
    let report = orchestrator(&engine).render(&request()).await;

    assert!(matches!(report.result, RenderResult::Fatal(ref cause) if cause.contains("interception")));
    assert_eq!(report.attempts, 0);
    assert_eq!(engine.calls(0), vec![fast_filter(), Call::Close]);
}

// ============================================================================
// Modes and isolation
// ============================================================================

#[tokio::test]
async fn test_full_mode_installs_no_filter() {
    let engine = FakeEngine::new();
    let request = request().with_mode(RenderMode::Full);
    orchestrator(&engine).render(&request).await;

    assert!(!engine
        .calls(0)
        .iter()
        .any(|c| matches!(c, Call::InstallFilter(_))));
}

#[tokio::test]
async fn test_every_outcome_closes_exactly_once() {
    for engine in [
        FakeEngine::new(),
        FakeEngine::new().always_timing_out(),
        FakeEngine::new().failing_filter(),
        FakeEngine::new().always_timing_out().failing_close(),
    ] {
        orchestrator(&engine).render(&request()).await;
        assert_eq!(engine.opened(), 1);
        assert_eq!(closes(&engine.calls(0)), 1);
    }
}

#[tokio::test]
async fn test_concurrent_renders_use_independent_sessions() {
    let engine = FakeEngine::new().navigate_delay(Duration::from_millis(30));
    let orchestrator = orchestrator(&engine);

    let a = RenderRequest::for_url("https://a.example").unwrap();
    let b = RenderRequest::for_url("https://b.example").unwrap();
    let (ra, rb) = tokio::join!(orchestrator.render(&a), orchestrator.render(&b));

    let (RenderResult::Rendered(html_a), RenderResult::Rendered(html_b)) = (ra.result, rb.result)
    else {
        panic!("both renders should succeed");
    };
    assert!(html_a.contains("https://a.example"));
    assert!(html_b.contains("https://b.example"));
    assert_ne!(html_a, html_b);

    assert_eq!(engine.opened(), 2);
    for calls in engine.all_calls() {
        assert_eq!(closes(&calls), 1);
        let urls: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Navigate(url, ..) => Some(url.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(urls.len(), 1);
    }
}
