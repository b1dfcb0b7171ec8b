//! Fetch-domain request interception
//!
//! Pauses every request at the request stage and either continues or fails
//! it according to a [`ResourceFilterPolicy`].

use crate::error::BrowserError;
use crate::render::{FilterDecision, ResourceFilterPolicy, ResourceKind};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

impl From<&ResourceType> for ResourceKind {
    fn from(resource_type: &ResourceType) -> Self {
        match resource_type {
            ResourceType::Document => ResourceKind::Document,
            ResourceType::Stylesheet => ResourceKind::Stylesheet,
            ResourceType::Image => ResourceKind::Image,
            ResourceType::Media => ResourceKind::Media,
            ResourceType::Font => ResourceKind::Font,
            ResourceType::Script => ResourceKind::Script,
            ResourceType::Xhr => ResourceKind::Xhr,
            ResourceType::Fetch => ResourceKind::Fetch,
            ResourceType::WebSocket => ResourceKind::WebSocket,
            _ => ResourceKind::Other,
        }
    }
}

/// Enable interception on `page` and spawn the task answering paused requests.
///
/// The returned task runs until the page goes away or it is aborted.
pub async fn install(
    page: &Page,
    policy: ResourceFilterPolicy,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| BrowserError::InterceptionFailed(e.to_string()))?;

    page.execute(
        EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await
    .map_err(|e| BrowserError::InterceptionFailed(e.to_string()))?;

    debug!("Request interception enabled, blocking {:?}", policy.blocked());

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let kind = ResourceKind::from(&event.resource_type);
            let answered = match policy.decide(kind) {
                FilterDecision::Abort => {
                    trace!("Aborting {:?} {}", kind, event.request.url);
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                }
                FilterDecision::Allow => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = answered {
                debug!("Could not answer paused request {}: {}", event.request.url, e);
            }
        }
    }))
}
