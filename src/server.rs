//! Webhook listener lifecycle

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::RelayError;
use crate::session::DestinationRegistry;

/// Serve `app` on `listen_addr` until the listener fails.
///
/// A listener failure is fatal: every registered session is told to
/// disconnect with the failure reason before the error is returned.
pub async fn serve(
    listen_addr: &str,
    app: Router,
    destinations: Arc<DestinationRegistry>,
) -> Result<(), RelayError> {
    let result = run_listener(listen_addr, app).await;
    if let Err(e) = &result {
        error!("{}", e);
        destinations.disconnect_all(&e.to_string()).await;
    }
    result
}

async fn run_listener(listen_addr: &str, app: Router) -> Result<(), RelayError> {
    let listener = TcpListener::bind(listen_addr).await.map_err(|e| {
        RelayError::ListenerFatal(format!("cannot bind {}: {}", listen_addr, e))
    })?;
    info!("Webhook listener on {}", listen_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| RelayError::ListenerFatal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SendError;
    use crate::session::ChatSession;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct QuitRecorder {
        reason: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ChatSession for QuitRecorder {
        fn is_connected(&self) -> bool {
            true
        }
        fn member_channels(&self) -> HashSet<String> {
            HashSet::new()
        }
        async fn send_message(&self, _channel: &str, _text: &str) -> Result<(), SendError> {
            Ok(())
        }
        async fn disconnect(&self, reason: &str) {
            *self.reason.lock().unwrap() = Some(reason.to_string());
        }
    }

    #[tokio::test]
    async fn bind_failure_disconnects_sessions() {
        // hold the port so the relay cannot bind it
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let registry = Arc::new(DestinationRegistry::new());
        let session = Arc::new(QuitRecorder::default());
        registry.register("net1", session.clone());

        let err = serve(&addr, Router::new(), registry).await.unwrap_err();
        assert!(matches!(err, RelayError::ListenerFatal(_)));

        let reason = session.reason.lock().unwrap().clone().unwrap();
        assert!(reason.contains("cannot bind"));
    }
}
