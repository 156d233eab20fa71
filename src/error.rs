//! Error handling for the Pin Deck dashboard crate.

/// A specialized `Result` type for Pin Deck operations.
pub type Result<T> = std::result::Result<T, DeckError>;

/// The main error type for Pin Deck operations.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound or outbound payload could not be processed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Channel to the device failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Pin catalog is inconsistent
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::board::catalog::CatalogError),

    /// Simulated device web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeckError {
    /// Create a new protocol error
    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new transport error
    pub fn transport_error(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<crate::protocol::DecodeError> for DeckError {
    fn from(err: crate::protocol::DecodeError) -> Self {
        Self::Protocol(err.to_string())
    }
}
