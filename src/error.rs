use std::fmt;

/// Top-level error type for githook_relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration:\n{0}")]
    InvalidConfig(#[from] ConfigErrors),

    #[error("Webhook listener failed: {0}")]
    ListenerFatal(String),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// A single configuration violation, carrying enough context to locate it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no chat sessions configured")]
    NoSessions,

    #[error("session #{index} has an empty id")]
    EmptySessionId { index: usize },

    #[error("duplicate session id `{id}`")]
    DuplicateSession { id: String },

    #[error("session `{id}`: server (host:port) is empty")]
    EmptyServer { id: String },

    #[error("session `{id}` has no nick")]
    MissingNick { id: String },

    #[error("session `{id}` has no channels")]
    NoChannels { id: String },

    #[error("webhook listen address (host:port) not configured")]
    MissingListenAddress,

    #[error("no webhook targets configured")]
    NoTargets,

    #[error("target `{path}`: path must start with `/` and contain no route pattern characters")]
    InvalidPath { path: String },

    #[error("target `{path}`: path is reserved")]
    ReservedPath { path: String },

    #[error("target `{path}`: path is configured more than once")]
    DuplicatePath { path: String },

    #[error("target `{path}`: destination `{destination}` is not a configured session")]
    UnknownDestination { path: String, destination: String },

    #[error("target `{path}`: channel `{channel}` is not configured for session `{destination}`")]
    UnknownChannel {
        path: String,
        destination: String,
        channel: String,
    },
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn push(&mut self, err: ConfigError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, err: &ConfigError) -> bool {
        self.0.contains(err)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> std::result::Result<(), ConfigErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// Why an inbound webhook body was rejected
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("secret token mismatch")]
    InvalidToken,

    #[error("unsupported event `{0}`")]
    UnsupportedEvent(String),

    #[error("could not decode payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed commit id `{0}`")]
    MalformedCommitId(String),
}

/// Failure reported by a chat session when sending
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("session is not connected")]
    NotConnected,

    #[error("session has shut down")]
    Closed,
}
