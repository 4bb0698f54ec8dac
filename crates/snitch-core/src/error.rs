//! Error types for the snitch
//!
//! Only [`Error::Config`] is expected to escape the snitch itself; every other
//! variant is produced by collaborators and contained (logged) by the caller.

use thiserror::Error;

/// Result type alias for snitch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the snitch
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at construction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Membership service errors
    #[error("Membership error: {0}")]
    Membership(String),

    /// Persisted topology store errors
    #[error("Topology store error: {0}")]
    TopologyStore(String),

    /// Legacy static topology errors
    #[error("Static topology error: {0}")]
    StaticTopology(String),

    /// Host name resolution errors
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Transport/routing errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a membership error
    pub fn membership(msg: impl Into<String>) -> Self {
        Self::Membership(msg.into())
    }

    /// Create a topology store error
    pub fn topology_store(msg: impl Into<String>) -> Self {
        Self::TopologyStore(msg.into())
    }

    /// Create a static topology error
    pub fn static_topology(msg: impl Into<String>) -> Self {
        Self::StaticTopology(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
