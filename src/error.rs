//! Error types for the provider host.

use std::io;

use thiserror::Error;

/// Result type alias for the provider host.
pub type Result<T> = std::result::Result<T, Error>;

/// Provider host errors.
///
/// Every `callTool` error kind from the protocol design carries a stable
/// discriminant (see [`Error::kind`]) so callers can match on it without
/// parsing the display message.
#[derive(Error, Debug)]
pub enum Error {
    /// No entry in the registry for the requested tool name.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Provider exists but is not `Running` (or `Starting`).
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Call landed while the provider's tools were mid-swap.
    #[error("provider reloading: {0}")]
    ProviderReloading(String),

    /// The provider's connection dropped before a response arrived.
    #[error("provider disconnected: {0}")]
    ProviderDisconnected(String),

    /// The call's deadline expired before a response arrived.
    #[error("call timed out")]
    Timeout,

    /// The child sent a malformed or unmatched `tool_response`, or closed
    /// the connection mid-frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The provider's own handler reported a failure.
    #[error("handler error: {0}")]
    Handler(String),

    /// The call was cancelled by a host-wide shutdown.
    #[error("host is shutting down")]
    HostShutdown,

    /// A tool name collided with one already owned by a different provider.
    #[error("tool name {name:?} already owned by provider {owner:?}")]
    NameCollision {
        /// Name of the colliding tool.
        name: String,
        /// Provider that already owns it.
        owner: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound. The only fatal startup
    /// condition; every other error is recoverable at the call site.
    #[error("failed to bind provider socket at {path}: {source}")]
    SocketBind {
        /// Path the host attempted to bind.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// I/O error outside the socket-bind path.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The stable, machine-readable discriminant used in `tracing` fields
    /// and reported to MCP clients as `kind`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound(_) => "ToolNotFound",
            Self::ProviderUnavailable(_) => "ProviderUnavailable",
            Self::ProviderReloading(_) => "ProviderReloading",
            Self::ProviderDisconnected(_) => "ProviderDisconnected",
            Self::Timeout => "Timeout",
            Self::Protocol(_) => "ProtocolError",
            Self::Handler(_) => "HandlerError",
            Self::HostShutdown => "HostShutdown",
            Self::NameCollision { .. } => "NameCollision",
            Self::Config(_) => "Config",
            Self::SocketBind { .. } => "SocketBind",
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
        }
    }
}
