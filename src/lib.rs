pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod irc;
pub mod link;
pub mod logging;
pub mod provider;
pub mod push;
pub mod render;
pub mod server;
pub mod session;
pub mod targets;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use link::Linker;
use session::DestinationRegistry;
use targets::TargetRegistry;

pub use config::RelayConfig;

/// State shared by every request handler
pub struct AppState {
    pub destinations: Arc<DestinationRegistry>,
    pub targets: TargetRegistry,
    pub linker: Linker,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        destinations: Arc<DestinationRegistry>,
        targets: TargetRegistry,
        linker: Linker,
    ) -> Self {
        Self {
            destinations,
            targets,
            linker,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
