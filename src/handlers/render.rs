//! `GET /render`
//!
//! Validates the query before any browser work, runs the retry orchestrator
//! and maps its single result onto an HTTP response:
//!
//! | result               | status | body                                              |
//! |----------------------|--------|---------------------------------------------------|
//! | invalid request      | 400    | `{"error": "Missing or invalid url param", ...}`  |
//! | rendered             | 200    | the captured HTML                                 |
//! | attempts exhausted   | 504    | `{"error": "Render timed out", "detail": ...}`    |
//! | environment failure  | 500    | `{"error": "<cause>", "kind": "render_failed"}`   |

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use metrics::{counter, histogram};
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::status::AppState;
use crate::browser::RenderEngine;
use crate::render::{RenderQuery, RenderReport, RenderRequest, RenderResult, RetryOrchestrator};

/// Number of navigation attempts the render took
pub const RENDER_ATTEMPTS_HEADER: &str = "x-render-attempts";

/// Per-request correlation id, also recorded on the request span
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Counter of finished requests, labelled by `outcome`
pub const METRIC_RENDER_REQUESTS: &str = "render_api_requests_total";

/// Histogram of render wall time in milliseconds
pub const METRIC_RENDER_MS: &str = "render_api_render_ms";

/// Render handler
pub async fn render_handler<E>(
    State(orchestrator): State<Arc<RetryOrchestrator<E>>>,
    State(stats): State<Arc<AppState>>,
    query: Result<Query<RenderQuery>, QueryRejection>,
) -> Response
where
    E: RenderEngine + 'static,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("render", %request_id);

    let mut response = async move {
        let query = match query {
            Ok(Query(query)) => query,
            Err(rejection) => {
                warn!("Unreadable query: {}", rejection);
                return reject(&stats);
            }
        };

        let request = match RenderRequest::from_query(&query) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected render request: {:?}", e);
                return reject(&stats);
            }
        };

        info!(
            "Rendering {} (mode={}, timeout={:?})",
            request.url(),
            request.mode().as_str(),
            request.nav_timeout()
        );

        let in_flight = stats.begin_render();
        let report = orchestrator.render(&request).await;
        in_flight.finish(&report);

        counter!(METRIC_RENDER_REQUESTS, "outcome" => report.result.kind()).increment(1);
        histogram!(METRIC_RENDER_MS).record(report.elapsed.as_secs_f64() * 1000.0);

        respond(report)
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn reject(stats: &AppState) -> Response {
    stats.record_rejected();
    counter!(METRIC_RENDER_REQUESTS, "outcome" => "invalid_request").increment(1);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Missing or invalid url param",
            "kind": "invalid_request",
        })),
    )
        .into_response()
}

/// Map a finished render onto its response
pub fn respond(report: RenderReport) -> Response {
    let attempts = HeaderValue::from(report.attempts);
    let kind = report.result.kind();

    let mut response = match report.result {
        RenderResult::Rendered(html) => (StatusCode::OK, Html(html)).into_response(),
        RenderResult::TimedOut(detail) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({
                "error": "Render timed out",
                "kind": kind,
                "detail": detail,
            })),
        )
            .into_response(),
        RenderResult::Fatal(cause) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": cause,
                "kind": kind,
            })),
        )
            .into_response(),
    };

    response
        .headers_mut()
        .insert(HeaderName::from_static(RENDER_ATTEMPTS_HEADER), attempts);
    response
}
