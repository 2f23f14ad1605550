pub mod config;
pub mod error;
pub mod rooms;

use axum::{Router, extract::FromRef};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::Config;
pub use error::{RelayError, RelayResult};
use rooms::{MessageRouter, Registry};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub router: MessageRouter,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            router: MessageRouter::new(Registry::new(config.prune_empty_rooms)),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(rooms::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
