//! Host-facing event stream

/// An event observable by subscribers of the host's event stream.
#[derive(Debug, Clone)]
pub enum Event {
    /// A tool became available under the given provider.
    ToolRegistered {
        /// Owning provider name.
        provider: String,
        /// Tool name.
        tool: String,
    },
    /// A tool was removed from the given provider's set.
    ToolUnregistered {
        /// Owning provider name.
        provider: String,
        /// Tool name.
        tool: String,
    },
    /// An external provider's connection was accepted and registered.
    ProviderConnected {
        /// Provider name.
        provider: String,
    },
    /// An external provider's connection closed.
    ProviderDisconnected {
        /// Provider name.
        provider: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A provider transitioned to `Stopped` due to an unrecoverable failure.
    ProviderFailed {
        /// Provider name.
        provider: String,
        /// Human-readable reason.
        reason: String,
    },
}
