//! Sub-resource filtering for fast renders
//!
//! Fast mode aborts the heavy, non-structural resources of a page (images,
//! media, fonts) so that load-completion signals settle sooner. Full mode
//! installs no policy at all.

use super::request::RenderMode;
use serde::{Deserialize, Serialize};

/// Resource type of an outgoing request, as classified by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Top-level or frame document
    Document,
    /// CSS
    Stylesheet,
    /// Images, including favicons
    Image,
    /// Audio and video
    Media,
    /// Web fonts
    Font,
    /// JavaScript
    Script,
    /// XMLHttpRequest
    Xhr,
    /// fetch()
    Fetch,
    /// WebSocket upgrades
    WebSocket,
    /// Anything else (manifests, pings, prefetches, ...)
    Other,
}

/// Verdict for a single intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Let the request reach the network
    Allow,
    /// Fail the request before it leaves the browser
    Abort,
}

/// Which resource kinds are aborted during a render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilterPolicy {
    blocked: Vec<ResourceKind>,
}

impl ResourceFilterPolicy {
    /// The fast-mode policy: abort images, media and fonts
    pub fn fast() -> Self {
        Self {
            blocked: vec![ResourceKind::Image, ResourceKind::Media, ResourceKind::Font],
        }
    }

    /// Policy to install for a mode, if any
    pub fn for_mode(mode: RenderMode) -> Option<Self> {
        match mode {
            RenderMode::Fast => Some(Self::fast()),
            RenderMode::Full => None,
        }
    }

    /// Classify one request
    pub fn decide(&self, kind: ResourceKind) -> FilterDecision {
        if self.blocked.contains(&kind) {
            FilterDecision::Abort
        } else {
            FilterDecision::Allow
        }
    }

    /// Kinds this policy aborts
    pub fn blocked(&self) -> &[ResourceKind] {
        &self.blocked
    }
}
