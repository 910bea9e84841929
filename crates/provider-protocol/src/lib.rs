//! Wire types shared between the provider host and the provider-side runtime.
//!
//! Everything here is pure data: the newline-delimited JSON envelope
//! exchanged over the IPC socket, and the tool descriptor shape that
//! travels inside a `register` frame. No I/O, no state — just the shapes
//! both sides agree on.

mod codec;

pub use codec::{CodecError, FrameCodec};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool's metadata as declared by a provider.
///
/// The core treats `input_schema` / `output_schema` as opaque structured
/// data — it validates that they parsed as JSON, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Unique name within the owning provider's declared set.
    pub name: String,
    /// Human-readable description shown to MCP clients.
    #[serde(default)]
    pub description: String,
    /// Input JSON Schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Output JSON Schema, if the tool declares one.
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none", default)]
    pub output_schema: Option<Value>,
}

/// Payload of a `register` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    /// Provider name; must match the name the host assigned at spawn time.
    pub name: String,
    /// Provider-reported version string (informational).
    #[serde(default)]
    pub version: String,
    /// Provider-reported description (informational).
    #[serde(default)]
    pub description: String,
    /// The provider's complete tool set as of this registration.
    pub tools: Vec<ToolDescriptor>,
    /// PID of the registering process, for diagnostics.
    #[serde(default)]
    pub pid: Option<u32>,
}

/// Payload of a `tool_call` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallData {
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Structured arguments for the invocation.
    #[serde(default)]
    pub params: Value,
}

/// Payload of a `log` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogData {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured fields, forwarded as-is to the host logger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
}

/// Payload of a `reinitialize` frame (reserved for reinit-without-restart;
/// not currently sent by the supervisor, but accepted so a provider's own
/// handling is forward-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinitializeData {
    /// The provider's new configuration blob.
    pub config: Value,
}

/// The terminal outcome carried by a `tool_response` frame: either a
/// success `data` payload or an `error` reason string. Never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    /// The handler completed successfully.
    Success {
        /// Result payload.
        data: Value,
    },
    /// The handler reported a failure.
    Failure {
        /// Human-readable reason.
        error: String,
    },
}

impl ToolOutcome {
    /// Build a success outcome.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self::Success { data }
    }

    /// Build a failure outcome.
    #[must_use]
    pub fn err(reason: impl Into<String>) -> Self {
        Self::Failure {
            error: reason.into(),
        }
    }
}

/// A single newline-delimited JSON message exchanged over the IPC socket.
///
/// Each variant corresponds to one `type` value from the wire protocol
/// table. Encoding/decoding goes through `serde_json`; the frame codec is
/// responsible only for finding the newline boundaries (see
/// `mcp_provider_host::frame_codec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Child announces its identity and tool list.
    Register {
        /// Registration payload.
        data: RegisterData,
    },
    /// Host requests execution of a tool.
    ToolCall {
        /// Correlation ID; the matching `tool_response` must echo it.
        id: String,
        /// Call payload.
        data: ToolCallData,
    },
    /// Child reports the terminal result of a `tool_call`.
    ToolResponse {
        /// Correlation ID from the originating `tool_call`.
        id: String,
        /// Success or failure payload.
        #[serde(flatten)]
        outcome: ToolOutcome,
    },
    /// Child forwards a structured log record.
    Log {
        /// Log payload.
        data: LogData,
    },
    /// Host pushes a new configuration for reinit-without-restart.
    Reinitialize {
        /// New configuration payload.
        data: ReinitializeData,
    },
}

impl Frame {
    /// Convenience constructor for a `tool_call` frame.
    #[must_use]
    pub fn tool_call(id: impl Into<String>, tool_name: impl Into<String>, params: Value) -> Self {
        Self::ToolCall {
            id: id.into(),
            data: ToolCallData {
                tool_name: tool_name.into(),
                params,
            },
        }
    }

    /// Convenience constructor for a `tool_response` frame carrying success data.
    #[must_use]
    pub fn tool_response_ok(id: impl Into<String>, data: Value) -> Self {
        Self::ToolResponse {
            id: id.into(),
            outcome: ToolOutcome::ok(data),
        }
    }

    /// Convenience constructor for a `tool_response` frame carrying an error.
    #[must_use]
    pub fn tool_response_err(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolResponse {
            id: id.into(),
            outcome: ToolOutcome::err(reason),
        }
    }

    /// The `type` discriminant as it appears on the wire, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResponse { .. } => "tool_response",
            Self::Log { .. } => "log",
            Self::Reinitialize { .. } => "reinitialize",
        }
    }
}

/// Environment variable naming the IPC socket path.
pub const ENV_SOCKET_PATH: &str = "MCP_PROVIDER_SOCKET";
/// Environment variable marking "this process should run in provider mode".
pub const ENV_PROVIDER_MODE: &str = "MCP_PROVIDER_MODE";
/// Environment variable carrying the assigned provider name.
pub const ENV_PROVIDER_NAME: &str = "MCP_PROVIDER_NAME";
