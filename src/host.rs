//! Host facade: wires the Tool Registry, Socket Hub, Process Supervisor,
//! Provider Manager, Built-in Provider Host, and Hot-Reload Coordinator
//! into a single handle exposing `list_tools`/`call_tool` and owning
//! startup/shutdown.

use std::sync::Arc;

use provider_protocol::ToolDescriptor;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::builtin::BuiltinHost;
use crate::call_tracker::{self, CallTracker};
use crate::config::Config;
use crate::events::Event;
use crate::hot_reload::HotReloadCoordinator;
use crate::provider_manager::{ProviderManager, Timeouts};
use crate::registry::Registry;
use crate::socket_hub::SocketHub;
use crate::supervisor::Supervisor;
use crate::Result;

const SOCKET_FILE_NAME: &str = "host.sock";

/// A fully wired, running provider host.
pub struct Host {
    registry: Arc<Registry>,
    hub: Arc<SocketHub>,
    manager: Arc<ProviderManager>,
    call_tracker: Arc<CallTracker>,
    events: broadcast::Sender<Event>,
    _hot_reload: Option<HotReloadCoordinator>,
    _shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
    sweeper_task: JoinHandle<()>,
    log_task: JoinHandle<()>,
}

impl Host {
    /// Bind the socket, start every declared provider (built-in and
    /// external), and begin serving. Returns once startup has been
    /// initiated; providers continue registering asynchronously.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SocketBind`] if the domain socket cannot be
    /// bound — the only fatal startup condition.
    pub async fn start(config: Config) -> Result<Arc<Self>> {
        let socket_path = config.socket_dir().join(SOCKET_FILE_NAME);

        let (events_tx, _) = broadcast::channel(1024);
        let registry = Arc::new(Registry::new(events_tx.clone()));

        let (hub, listener, mut hub_rx) = SocketHub::bind(socket_path.clone())?;
        let accept_task = tokio::spawn(Arc::clone(&hub).run_accept_loop(listener));

        let call_tracker = Arc::new(CallTracker::new());
        let sweeper_task = call_tracker::spawn_sweeper(Arc::clone(&call_tracker));

        let builtin = Arc::new(BuiltinHost::new());
        builtin.start(&registry).await;

        let (log_tx, mut log_rx) = mpsc::channel::<(String, String)>(256);
        let log_task = tokio::spawn(async move {
            while let Some((provider, line)) = log_rx.recv().await {
                info!(provider = %provider, "{line}");
            }
        });

        let supervisor = Supervisor::new(socket_path.clone());
        let timeouts = Timeouts {
            registration: config.performance.provider_registration_timeout,
            tool_call: config.performance.tool_call_timeout,
            shutdown_grace: config.performance.provider_shutdown_grace,
        };

        let manager = Arc::new(ProviderManager::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
            supervisor,
            Arc::clone(&call_tracker),
            Arc::clone(&builtin),
            config.providers.clone(),
            timeouts,
            events_tx.clone(),
            log_tx,
        ));
        manager.start_all();

        let dispatch_manager = Arc::clone(&manager);
        let dispatch_task = tokio::spawn(async move {
            while let Some(event) = hub_rx.recv().await {
                dispatch_manager.handle_hub_event(event).await;
            }
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let hot_reload = if config.dev.hot_reload {
            match HotReloadCoordinator::start(
                Arc::clone(&manager),
                config.providers.clone(),
                shutdown_rx,
            ) {
                Ok(coordinator) => Some(coordinator),
                Err(e) => {
                    warn!(error = %e, "failed to start hot-reload watcher, continuing without it");
                    None
                }
            }
        } else {
            drop(shutdown_rx);
            None
        };

        info!(socket = %socket_path.display(), providers = config.providers.len(), "host started");

        Ok(Arc::new(Self {
            registry,
            hub,
            manager,
            call_tracker,
            events: events_tx,
            _hot_reload: hot_reload,
            _shutdown_tx: shutdown_tx,
            accept_task,
            dispatch_task,
            sweeper_task,
            log_task,
        }))
    }

    /// Invoke `name` with `params`, routing through the built-in or
    /// external path as the registry dictates.
    ///
    /// # Errors
    ///
    /// See [`ProviderManager::call_tool`] for the full set of error kinds.
    pub async fn call_tool(&self, name: &str, params: Value) -> Result<Value> {
        self.manager.call_tool(name, params).await
    }

    /// The registry's current tool set, sorted by name.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    /// Subscribe to the host-facing event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Path of the bound domain socket.
    #[must_use]
    pub fn socket_path(&self) -> &std::path::Path {
        self.hub.path()
    }

    /// Cancel in-flight calls with `HostShutdown`, stop every provider with
    /// its configured grace period, unlink the socket file, and abort the
    /// background tasks.
    pub async fn shutdown(&self) {
        info!("host shutting down");
        self.call_tracker.abort_all();
        self.manager.stop_all().await;
        self.hub.unlink();
        self.accept_task.abort();
        self.dispatch_task.abort();
        self.sweeper_task.abort();
        self.log_task.abort();
    }
}
