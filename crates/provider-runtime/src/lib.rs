//! Provider-side runtime — the library linked into external provider child
//! processes
//!
//! A provider author implements [`Provider`], then calls [`run`] from their
//! `main`. The runtime reads the three environment variables the host's
//! process supervisor injects, connects to the IPC socket, sends a
//! `register` frame, and then services `tool_call` frames until the socket
//! closes.

mod error;

pub use error::{Error, Result};
pub use provider_protocol::{ToolDescriptor, ENV_PROVIDER_MODE, ENV_PROVIDER_NAME, ENV_SOCKET_PATH};

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use provider_protocol::{Frame, FrameCodec, RegisterData, ToolOutcome};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, RwLock};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

/// Read-only context handed to a tool handler for the duration of one call.
pub struct ToolContext {
    /// The provider's stable name, as assigned by the host.
    pub provider_name: String,
    /// The provider's current state object. Cloning this value performs a
    /// deep copy (it is plain `serde_json::Value`), so mutating the copy
    /// held by one in-flight call cannot affect another.
    pub state: Value,
}

/// A tool source linked into a provider child process.
///
/// Implementations declare their tools, handle `initialize` for both first
/// startup and reinit-without-restart, and execute tool calls.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Stable provider name. Must match the name the host assigned at spawn
    /// time or registration is rejected.
    fn name(&self) -> &str;

    /// Provider version, reported in the `register` frame (informational).
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Provider description, reported in the `register` frame (informational).
    fn description(&self) -> &str {
        ""
    }

    /// The provider's complete tool set as of now.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Called once at startup with `previous_state = None`, and again on
    /// every `reinitialize` frame with the prior state. The returned value
    /// deeply replaces the provider's state.
    async fn initialize(&self, config: Value, previous_state: Option<Value>) -> Value {
        let _ = config;
        previous_state.unwrap_or(Value::Null)
    }

    /// Execute `tool` with `params` and the current state. Returning `Err`
    /// produces a `tool_response` with that string as the `error` reason.
    async fn call(&self, tool: &str, ctx: &ToolContext, params: Value) -> Result<Value, String>;

    /// Optional cleanup hook invoked just before the process exits.
    async fn dispose(&self) {}
}

/// Run `provider` to completion: connect, register, service tool calls,
/// exit cleanly when the host closes the connection.
///
/// # Errors
///
/// Returns an error if the required environment variables are missing, the
/// socket cannot be reached, or registration is rejected by the host.
pub async fn run<P: Provider>(provider: P) -> Result<()> {
    let socket_path = env::var(ENV_SOCKET_PATH).map_err(|_| Error::MissingEnv(ENV_SOCKET_PATH))?;
    let provider_mode = env::var(ENV_PROVIDER_MODE).unwrap_or_default();
    if provider_mode != "1" && provider_mode.to_lowercase() != "true" {
        return Err(Error::NotProviderMode);
    }
    let assigned_name =
        env::var(ENV_PROVIDER_NAME).map_err(|_| Error::MissingEnv(ENV_PROVIDER_NAME))?;
    if assigned_name != provider.name() {
        return Err(Error::NameMismatch {
            assigned: assigned_name,
            declared: provider.name().to_string(),
        });
    }

    let stream = UnixStream::connect(&socket_path)
        .await
        .map_err(|e| Error::Connect(socket_path.clone(), e))?;
    let (read_half, write_half) = stream.into_split();
    let mut writer = FramedWrite::new(write_half, FrameCodec::new());

    let initial_state = provider.initialize(Value::Null, None).await;
    let state = Arc::new(RwLock::new(initial_state));

    let register = Frame::Register {
        data: RegisterData {
            name: provider.name().to_string(),
            version: provider.version().to_string(),
            description: provider.description().to_string(),
            tools: provider.tools(),
            pid: Some(std::process::id()),
        },
    };
    writer.send(register).await.map_err(|e| Error::Io(to_io_error(e)))?;
    info!(provider = provider.name(), "sent register frame");

    let provider = Arc::new(provider);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(64);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = writer.send(frame).await {
                error!(error = %e, "failed to write frame, stopping writer");
                break;
            }
        }
    });

    let mut frames = FramedRead::new(read_half, FrameCodec::new());
    loop {
        match frames.next().await {
            Some(Ok(Frame::ToolCall { id, data })) => {
                let provider = Arc::clone(&provider);
                let state = Arc::clone(&state);
                let tx = outbound_tx.clone();
                tokio::spawn(async move {
                    let snapshot = state.read().await.clone();
                    let ctx = ToolContext {
                        provider_name: provider.name().to_string(),
                        state: snapshot,
                    };
                    let outcome = match provider.call(&data.tool_name, &ctx, data.params).await {
                        Ok(result) => ToolOutcome::ok(result),
                        Err(reason) => ToolOutcome::err(reason),
                    };
                    let frame = Frame::ToolResponse { id, outcome };
                    let _ = tx.send(frame).await;
                });
            }
            Some(Ok(Frame::Reinitialize { data })) => {
                let previous = state.read().await.clone();
                let new_state = provider.initialize(data.config, Some(previous)).await;
                *state.write().await = new_state;
                debug!(provider = provider.name(), "reinitialized");
            }
            Some(Ok(other)) => {
                warn!(kind = other.kind(), "ignoring unexpected frame from host");
            }
            Some(Err(e)) => {
                error!(error = %e, "malformed frame from host, exiting");
                break;
            }
            None => {
                debug!("socket closed by host");
                break;
            }
        }
    }

    drop(outbound_tx);
    let _ = writer_task.await;
    provider.dispose().await;
    Ok(())
}

fn to_io_error(e: provider_protocol::CodecError) -> std::io::Error {
    match e {
        provider_protocol::CodecError::Io(io) => io,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
    }
}

/// Log a structured message to the host, via a `log` frame.
pub async fn log(
    tx: &mpsc::Sender<Frame>,
    level: &str,
    message: impl Into<String>,
    fields: Option<Value>,
) {
    let frame = Frame::Log {
        data: provider_protocol::LogData {
            level: level.to_string(),
            message: message.into(),
            fields,
        },
    };
    let _ = tx.send(frame).await;
}
