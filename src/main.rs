use githook_relay::api::build_router;
use githook_relay::config::{RelayConfig, load_config};
use githook_relay::error::RelayError;
use githook_relay::link::Linker;
use githook_relay::logging::setup_logging;
use githook_relay::session::DestinationRegistry;
use githook_relay::{AppState, irc, server};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "githook_relay.toml";
/// Time given to sessions to flush their QUIT before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("GITHOOK_RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config: RelayConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = match setup_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };
    info!("Using config at {:?}", config_path);

    if let Err(e) = run(config).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let destinations = Arc::new(DestinationRegistry::new());

    for session in &config.session {
        info!(
            session = %session.id,
            server = %session.server,
            nick = %session.nick,
            channels = ?session.channels,
            "Starting chat session"
        );
        irc::spawn(session.clone(), Arc::clone(&destinations));
    }

    let state = Arc::new(AppState::new(
        Arc::clone(&destinations),
        config.target_registry(),
        Linker::from_config(&config.link),
    ));
    let app = build_router(state);

    let result = server::serve(&config.listen_addr, app, destinations).await;
    if result.is_err() {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
    result
}
