use crate::symbols::models::BackendId;
use thiserror::Error;

/// Errors produced while querying symbol backends
#[derive(Error, Debug)]
pub enum SymbolError {
    /// The list of backends for the requested scope could not be obtained
    #[error("Backend list unavailable: {0}")]
    BackendList(String),

    /// A single backend call failed
    #[error("Backend {backend} failed: {source}")]
    Backend {
        backend: BackendId,
        #[source]
        source: Box<SymbolError>,
    },

    /// A backend did not answer before the query deadline
    #[error("Backend {backend} did not respond within {elapsed_ms}ms")]
    Timeout { backend: BackendId, elapsed_ms: u64 },

    /// The query deadline passed before any backend answered
    #[error("No backend responded within {elapsed_ms}ms ({outstanding} outstanding)")]
    DeadlineExceeded { elapsed_ms: u64, outstanding: usize },

    /// The response did not match either symbol shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// JSON-RPC error returned by a language server
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Framing or protocol violation on the JSON-RPC stream
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Language server process could not be started
    #[error("Failed to spawn language server: {0}")]
    Spawn(String),

    /// Language server went away while a request was outstanding
    #[error("Language server shut down")]
    ServerShutdown,

    /// Request was cancelled before a response arrived
    #[error("Request cancelled")]
    Cancelled,

    /// The backend a record came from is no longer supplied
    #[error("Backend {0} is not available")]
    BackendUnavailable(BackendId),

    /// Operation not offered by this backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The backend call panicked
    #[error("Backend task panicked: {0}")]
    Panicked(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Async runtime errors
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl SymbolError {
    /// Wrap an error raised by a specific backend
    pub fn backend(backend: BackendId, source: SymbolError) -> Self {
        SymbolError::Backend {
            backend,
            source: Box::new(source),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            SymbolError::BackendList(_) => "BACKEND_LIST_UNAVAILABLE",
            SymbolError::Backend { .. } => "BACKEND_FAILED",
            SymbolError::Timeout { .. } => "BACKEND_TIMEOUT",
            SymbolError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            SymbolError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            SymbolError::Rpc { .. } => "RPC_ERROR",
            SymbolError::Protocol(_) => "PROTOCOL_ERROR",
            SymbolError::Spawn(_) => "SPAWN_FAILED",
            SymbolError::ServerShutdown => "SERVER_SHUTDOWN",
            SymbolError::Cancelled => "CANCELLED",
            SymbolError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            SymbolError::Unsupported(_) => "UNSUPPORTED",
            SymbolError::Panicked(_) => "BACKEND_PANICKED",
            SymbolError::Io(_) => "IO_ERROR",
            SymbolError::Serialization(_) => "SERIALIZATION_ERROR",
            SymbolError::Configuration(_) => "CONFIGURATION_ERROR",
            SymbolError::Runtime(_) => "RUNTIME_ERROR",
        }
    }

    /// Whether this error may surface from a query instead of degrading to
    /// a smaller result
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SymbolError::BackendList(_) | SymbolError::Configuration(_) | SymbolError::Runtime(_)
        )
    }

    /// Backend the error is attributed to, if any
    pub fn backend_id(&self) -> Option<&BackendId> {
        match self {
            SymbolError::Backend { backend, .. }
            | SymbolError::Timeout { backend, .. }
            | SymbolError::BackendUnavailable(backend) => Some(backend),
            _ => None,
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for SymbolError {
    fn from(err: serde_json::Error) -> Self {
        SymbolError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for SymbolError {
    fn from(err: config::ConfigError) -> Self {
        SymbolError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SymbolError>;
