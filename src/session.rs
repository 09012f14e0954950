//! Chat session handles and the registry webhook deliveries look them up in

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SendError;

/// A connection to a chat network, managed outside the webhook path.
#[async_trait]
pub trait ChatSession: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Rooms the session has currently joined.
    fn member_channels(&self) -> HashSet<String>;

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), SendError>;

    /// Ask the session to leave the network; advisory, returns once queued.
    async fn disconnect(&self, reason: &str);
}

pub type SessionHandle = Arc<dyn ChatSession>;

/// Session id -> handle. Written once per session, read on every delivery.
#[derive(Default)]
pub struct DestinationRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under `id`. A second registration for the same
    /// id is refused and the first handle kept.
    pub fn register(&self, id: &str, handle: SessionHandle) -> bool {
        match self.sessions.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                warn!(destination = %id, "Session already registered, ignoring");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(handle);
                info!(destination = %id, "Session registered");
                true
            }
        }
    }

    /// Handles are cloned out so no map shard stays locked during a send.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tell every registered session to disconnect with `reason`.
    pub async fn disconnect_all(&self, reason: &str) {
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        for (id, handle) in handles {
            warn!(destination = %id, reason = %reason, "Disconnecting session");
            handle.disconnect(reason).await;
        }
    }
}
