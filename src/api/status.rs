//! Status endpoint

use axum::{Json, extract::State as AxumState};
use serde::Serialize;

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub connected: bool,
    pub channels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub server: ServerStatus,
    pub sessions: Vec<SessionStatus>,
    pub total_targets: usize,
}

/// GET /status - Server uptime and the state of each registered session
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    let server = ServerStatus {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
    };

    let sessions = state
        .destinations
        .ids()
        .into_iter()
        .filter_map(|id| {
            let handle = state.destinations.get(&id)?;
            let mut channels: Vec<String> = handle.member_channels().into_iter().collect();
            channels.sort();
            Some(SessionStatus {
                id,
                connected: handle.is_connected(),
                channels,
            })
        })
        .collect();

    Json(StatusResponse {
        server,
        sessions,
        total_targets: state.targets.len(),
    })
}
