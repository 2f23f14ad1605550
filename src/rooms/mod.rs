mod envelope;
mod registry;
mod router;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use envelope::{ClientEnvelope, ServerEnvelope};
pub use registry::{ConnectionId, FanOut, Outbox, Registry, Session};
pub use router::{MessageRouter, Routed};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ws::relay_ws))
        .route("/ws", get(ws::relay_ws))
}
