//! Socket Hub: owns the listening domain socket, accepts connections, and
//! turns raw byte streams into a frame event stream. Not provider-aware —
//! binding a connection to a provider identity is the Provider Manager's job.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use provider_protocol::{Frame, FrameCodec};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Opaque identifier for one accepted connection.
pub type ConnId = u64;

/// An event the hub observed on an accepted connection.
#[derive(Debug)]
pub enum HubEvent {
    /// A fresh connection was accepted.
    Connected(ConnId),
    /// A complete frame was decoded from `conn`.
    Frame(ConnId, Frame),
    /// `conn` closed, with a human-readable reason.
    Closed(ConnId, String),
}

/// Binds a Unix domain socket and fans inbound connections into a single
/// `HubEvent` stream, while exposing a per-connection outbound queue.
pub struct SocketHub {
    socket_path: PathBuf,
    writers: DashMap<ConnId, mpsc::Sender<Frame>>,
    next_id: AtomicU64,
    events: mpsc::Sender<HubEvent>,
}

impl SocketHub {
    /// Bind a domain socket at `socket_path`, unlinking any stale file left
    /// over from an unclean previous shutdown. Returns the hub, the bound
    /// listener (hand to [`Self::run_accept_loop`] to start serving), and
    /// the receiving half of the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketBind`] if the socket cannot be bound — the
    /// only fatal startup condition.
    pub fn bind(
        socket_path: PathBuf,
    ) -> Result<(Arc<Self>, UnixListener, mpsc::Receiver<HubEvent>)> {
        if socket_path.exists() {
            let _ = std::fs::remove_file(&socket_path);
        }
        if let Some(parent) = socket_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let listener = UnixListener::bind(&socket_path).map_err(|source| Error::SocketBind {
            path: socket_path.display().to_string(),
            source,
        })?;
        info!(path = %socket_path.display(), "bound provider socket");

        let (events, event_rx) = mpsc::channel(256);
        let hub = Arc::new(Self {
            socket_path,
            writers: DashMap::new(),
            next_id: AtomicU64::new(1),
            events,
        });
        Ok((hub, listener, event_rx))
    }

    /// Drive the accept loop until the listener itself errors out.
    pub async fn run_accept_loop(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    self.spawn_connection(id, stream);
                    if self.events.send(HubEvent::Connected(id)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn spawn_connection(&self, id: ConnId, stream: UnixStream) {
        let (read_half, write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<Frame>(64);
        self.writers.insert(id, out_tx);

        tokio::spawn(async move {
            let mut writer = tokio_util::codec::FramedWrite::new(write_half, FrameCodec::new());
            while let Some(frame) = out_rx.recv().await {
                if writer.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let events = self.events.clone();
        tokio::spawn(async move {
            let mut reader = tokio_util::codec::FramedRead::new(read_half, FrameCodec::new());
            loop {
                match reader.next().await {
                    Some(Ok(frame)) => {
                        if events.send(HubEvent::Frame(id, frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(conn = id, error = %e, "malformed frame, closing connection");
                        let _ = events
                            .send(HubEvent::Closed(id, format!("malformed frame: {e}")))
                            .await;
                        break;
                    }
                    None => {
                        let _ = events.send(HubEvent::Closed(id, "eof".to_string())).await;
                        break;
                    }
                }
            }
        });
    }

    /// Queue `frame` for delivery on `conn`. Silently dropped if the
    /// connection is no longer known.
    pub async fn send(&self, conn: ConnId, frame: Frame) {
        if let Some(tx) = self.writers.get(&conn) {
            let _ = tx.send(frame).await;
        }
    }

    /// Drop the outbound queue for `conn`, closing its writer task.
    pub fn forget(&self, conn: ConnId) {
        self.writers.remove(&conn);
    }

    /// Path of the bound socket file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Unlink the socket file. Called on clean shutdown.
    pub fn unlink(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
