//! HTTP surface: one webhook route per target plus a status endpoint

pub mod status;
pub mod webhook;

use axum::{Router, routing};
use std::sync::Arc;
use tracing::info;

use crate::SharedState;
pub use status::status;
pub use webhook::{TargetHandler, handle_webhook};

/// Build the router. Target paths must already be validated as unique.
pub fn build_router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/status", routing::get(status))
        .with_state(Arc::clone(&state));

    for target in state.targets.iter() {
        info!(
            path = %target.path,
            destination = %target.destination,
            channel = %target.channel,
            "Registering webhook target"
        );
        let handler = Arc::new(TargetHandler {
            target: Arc::clone(target),
            state: Arc::clone(&state),
        });
        let route = Router::new()
            .route(&target.path, routing::post(handle_webhook))
            .with_state(handler);
        app = app.merge(route);
    }

    app
}
