//! Tracing subscriber and metric descriptions

use std::sync::Once;

use metrics::{describe_counter, describe_histogram, Unit};
use tracing_subscriber::EnvFilter;

use crate::handlers::render::{METRIC_RENDER_MS, METRIC_RENDER_REQUESTS};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
pub fn init(default_filter: &str) -> Result<(), String> {
    describe_metrics();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_RENDER_REQUESTS,
            Unit::Count,
            "Finished /render requests by outcome."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Render wall time from session open to close."
        );
    });
}
