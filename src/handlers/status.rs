//! Liveness and status handlers.
//!
//! - `/` - plain `OK`
//! - `/healthz` - `{"ok": true}` liveness probe
//! - `/status` - version, uptime, render counters, latency percentiles, memory
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "render-api",
//!   "uptime_seconds": 3600,
//!   "renders": {
//!     "rendered": 1011,
//!     "timed_out": 12,
//!     "failed": 1,
//!     "rejected": 40,
//!     "in_flight": 2,
//!     "abandoned": 3,
//!     "attempts": 1090,
//!     "reloads": 9
//!   },
//!   "memory": { "rss_bytes": 52428800, "virtual_bytes": 268435456 },
//!   "latency": { "p50_ms": 2150.0, "p95_ms": 9800.0, "p99_ms": 31000.0, ... },
//!   "status": "running",
//!   "timestamp": "2026-01-01T12:00:00Z"
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument};

use crate::render::{RenderReport, RenderResult};

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Response Types
// ============================================================================

/// Liveness probe body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always true if responding
    pub ok: bool,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { ok: true }
    }
}

/// Detailed server status response with runtime metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,

    /// Server name
    pub name: String,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Render counters
    pub renders: RenderCounters,

    /// Memory usage metrics
    pub memory: MemoryMetrics,

    /// Render latency statistics (percentiles)
    pub latency: LatencyMetrics,

    /// Server status (always "running" if responding)
    pub status: String,

    /// ISO8601 timestamp of when status was generated
    pub timestamp: String,
}

/// Render outcomes since start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCounters {
    /// 200 responses
    pub rendered: u64,
    /// 504 responses
    pub timed_out: u64,
    /// 500 responses
    pub failed: u64,
    /// 400 responses
    pub rejected: u64,
    /// Renders currently holding a browser
    pub in_flight: u64,
    /// Renders dropped before finishing (client went away)
    pub abandoned: u64,
    /// Navigation attempts across all renders
    pub attempts: u64,
    /// Soft reloads across all renders
    pub reloads: u64,
}

/// Memory usage metrics collected from sysinfo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    /// Resident Set Size - actual physical memory used (bytes)
    pub rss_bytes: u64,

    /// Virtual memory size (bytes)
    pub virtual_bytes: u64,
}

/// Render latency percentile metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// 50th percentile (median) latency in milliseconds
    pub p50_ms: f64,

    /// 95th percentile latency in milliseconds
    pub p95_ms: f64,

    /// 99th percentile latency in milliseconds
    pub p99_ms: f64,

    /// Total number of renders recorded
    pub total_requests: u64,

    /// Mean latency in milliseconds
    pub mean_ms: f64,

    /// Maximum latency recorded in milliseconds
    pub max_ms: f64,
}

// ============================================================================
// Latency Histogram
// ============================================================================

/// Highest trackable latency: five minutes, in microseconds
const MAX_TRACKABLE_US: u64 = 300_000_000;

/// Thread-safe latency histogram for recording render timings.
///
/// Tracks latencies from 1us to five minutes with 3 significant figures;
/// a render is bounded well below that by its attempt budget.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Option<Histogram<u64>>>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    pub fn new() -> Self {
        let histogram = match Histogram::new_with_bounds(1, MAX_TRACKABLE_US, 3) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!("Latency histogram disabled: {}", e);
                None
            }
        };
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a latency value in microseconds.
    ///
    /// Values outside the histogram bounds are clamped.
    pub fn record(&self, latency_us: u64) {
        if let Some(hist) = self.inner.write().as_mut() {
            hist.saturating_record(latency_us.max(1));
        }
    }

    /// Record a latency duration.
    pub fn record_duration(&self, duration: std::time::Duration) {
        self.record(duration.as_micros() as u64);
    }

    /// Get the total count of recorded values.
    pub fn count(&self) -> u64 {
        self.inner.read().as_ref().map_or(0, |h| h.len())
    }

    /// Get complete latency metrics in milliseconds.
    pub fn metrics(&self) -> LatencyMetrics {
        let guard = self.inner.read();
        let hist = match guard.as_ref() {
            Some(h) if !h.is_empty() => h,
            _ => return LatencyMetrics::default(),
        };
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: hist.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: hist.value_at_percentile(99.0) as f64 / 1000.0,
            total_requests: hist.len(),
            mean_ms: hist.mean() / 1000.0,
            max_ms: hist.max() as f64 / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Shared counters behind `/status`.
///
/// All fields are lock-free atomics except the histogram.
#[derive(Debug)]
pub struct AppState {
    start_time: Instant,
    rendered: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    in_flight: AtomicU64,
    abandoned: AtomicU64,
    attempts: AtomicU64,
    reloads: AtomicU64,
    latency_histogram: LatencyHistogram,
}

impl AppState {
    /// Create a new AppState; uptime starts now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rendered: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
            latency_histogram: LatencyHistogram::new(),
        }
    }

    /// Get the server uptime in seconds.
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Count a request rejected before any browser work
    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark a render as started.
    ///
    /// The render stays in flight until the returned guard is finished or
    /// dropped; a guard dropped unfinished counts as abandoned.
    pub fn begin_render(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight {
            state: self,
            finished: false,
        }
    }

    fn record_render(&self, report: &RenderReport) {
        let counter = match report.result {
            RenderResult::Rendered(_) => &self.rendered,
            RenderResult::TimedOut(_) => &self.timed_out,
            RenderResult::Fatal(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.attempts
            .fetch_add(u64::from(report.attempts), Ordering::Relaxed);
        self.reloads
            .fetch_add(u64::from(report.reloads), Ordering::Relaxed);
        self.latency_histogram.record_duration(report.elapsed);
    }

    /// Decrement the in-flight counter without underflowing.
    fn end_render(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Snapshot of the render counters
    pub fn counters(&self) -> RenderCounters {
        RenderCounters {
            rendered: self.rendered.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }

    /// Get the latency metrics.
    #[inline]
    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency_histogram.metrics()
    }
}

/// A render counted as in flight
#[derive(Debug)]
#[must_use = "dropping the guard ends the render immediately"]
pub struct InFlight<'a> {
    state: &'a AppState,
    finished: bool,
}

impl InFlight<'_> {
    /// Count the finished render and its latency
    pub fn finish(mut self, report: &RenderReport) {
        self.state.record_render(report);
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.abandoned.fetch_add(1, Ordering::Relaxed);
        }
        self.state.end_render();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// System Metrics Collection
// ============================================================================

/// Memory usage of this process; zeroes if sysinfo cannot see it.
fn collect_memory_metrics() -> MemoryMetrics {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();

    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match system.process(pid) {
        Some(process) => MemoryMetrics {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        },
        None => {
            debug!("Could not find current process in sysinfo");
            MemoryMetrics::default()
        }
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// `GET /`
#[instrument(skip_all)]
pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /healthz`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: state.uptime_seconds(),
        renders: state.counters(),
        memory: collect_memory_metrics(),
        latency: state.latency_metrics(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

// ============================================================================
// Tests
// ============================================================================
