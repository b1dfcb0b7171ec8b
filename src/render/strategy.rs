//! Navigation-completion conditions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition that marks a navigation as complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Initial document parsed (`DOMContentLoaded`)
    #[serde(rename = "domcontentloaded")]
    DomReady,
    /// Document loaded and no network activity for a short trailing window
    #[serde(rename = "networkidle")]
    NetworkQuiet,
}

/// Order in which strategies are tried within one retry round
pub const WAIT_SEQUENCE: [WaitStrategy; 2] = [WaitStrategy::DomReady, WaitStrategy::NetworkQuiet];

impl WaitStrategy {
    /// Wire name of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitStrategy::DomReady => "domcontentloaded",
            WaitStrategy::NetworkQuiet => "networkidle",
        }
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
