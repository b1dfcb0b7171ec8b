//! HTTP handlers
//!
//! [`render`] serves `GET /render`; [`status`] carries the liveness routes and
//! the shared counters behind `GET /status`.

pub mod render;
pub mod status;

pub use render::{render_handler, RENDER_ATTEMPTS_HEADER, REQUEST_ID_HEADER};
pub use status::{health_handler, root_handler, status_handler, AppState, InFlight};
