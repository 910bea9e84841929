use thiserror::Error;

/// Errors the runtime can encounter before or while servicing a provider.
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment variable was not set by the supervisor.
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    /// `MCP_PROVIDER_MODE` was not set to an affirmative value.
    #[error("process was not launched in provider mode")]
    NotProviderMode,

    /// The name the host assigned at spawn time doesn't match the name the
    /// `Provider` implementation declares.
    #[error("host assigned name {assigned:?} but provider declares {declared:?}")]
    NameMismatch {
        /// Name from `MCP_PROVIDER_NAME`.
        assigned: String,
        /// Name from `Provider::name`.
        declared: String,
    },

    /// Could not connect to the IPC socket at the given path.
    #[error("failed to connect to provider socket at {0}: {1}")]
    Connect(String, #[source] std::io::Error),

    /// Failed to serialize an outgoing frame.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// I/O failure while reading from or writing to the socket.
    #[error("io error: {0}")]
    Io(#[source] std::io::Error),
}

/// Convenience alias for fallible runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
