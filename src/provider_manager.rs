//! Provider Manager: the lifecycle state machine for external providers,
//! merging built-in and external providers against one shared registry and
//! exposing `callTool`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::{BackoffBuilder, ExponentialBuilder};
use dashmap::DashMap;
use parking_lot::Mutex;
use provider_protocol::{Frame, ToolOutcome};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, instrument, warn};

use crate::builtin::BuiltinHost;
use crate::call_tracker::{CallResult, CallTracker};
use crate::config::ProviderConfig;
use crate::events::Event;
use crate::registry::Registry;
use crate::socket_hub::{ConnId, HubEvent, SocketHub};
use crate::supervisor::{Supervised, Supervisor};
use crate::{Error, Result};

/// Lifecycle states for one external provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No child, no registered tools.
    Idle,
    /// Child spawned, awaiting its first `register` frame.
    Starting,
    /// Tools present; `callTool` proceeds.
    Running,
    /// Tools cleared atomically; old child stopping, new one starting.
    Reloading,
    /// Terminal; tools cleared.
    Stopped,
}

struct ExternalEntry {
    status: Status,
    conn_id: Option<ConnId>,
    child: Option<Supervised>,
    restart_count: u32,
    started_at: Option<Instant>,
}

impl ExternalEntry {
    fn idle() -> Self {
        Self {
            status: Status::Idle,
            conn_id: None,
            child: None,
            restart_count: 0,
            started_at: None,
        }
    }
}

/// Ceiling on automatic restarts after an unexpected exit before a provider
/// is left `Stopped` for good.
const MAX_RESTART_ATTEMPTS: u32 = 5;

fn restart_backoff(attempt: u32) -> Duration {
    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(MAX_RESTART_ATTEMPTS as usize)
        .build();
    backoff
        .nth(attempt as usize)
        .unwrap_or(Duration::from_secs(30))
}

/// Timeout knobs consulted by the manager.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Deadline for the first `register` frame after spawn.
    pub registration: Duration,
    /// Per-call deadline enforced by the Call Tracker.
    pub tool_call: Duration,
    /// Grace period before a force-kill on stop.
    pub shutdown_grace: Duration,
}

/// Coordinates built-in and external providers against a single registry.
pub struct ProviderManager {
    registry: Arc<Registry>,
    hub: Arc<SocketHub>,
    supervisor: Supervisor,
    call_tracker: Arc<CallTracker>,
    builtin: Arc<BuiltinHost>,
    providers: DashMap<String, Mutex<ExternalEntry>>,
    configs: HashMap<String, ProviderConfig>,
    conn_to_provider: DashMap<ConnId, String>,
    timeouts: Timeouts,
    events: broadcast::Sender<Event>,
    log_tx: mpsc::Sender<(String, String)>,
}

impl ProviderManager {
    /// Construct a manager over the given collaborators and provider
    /// declarations.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        hub: Arc<SocketHub>,
        supervisor: Supervisor,
        call_tracker: Arc<CallTracker>,
        builtin: Arc<BuiltinHost>,
        configs: HashMap<String, ProviderConfig>,
        timeouts: Timeouts,
        events: broadcast::Sender<Event>,
        log_tx: mpsc::Sender<(String, String)>,
    ) -> Self {
        let providers = DashMap::new();
        for name in configs.keys() {
            providers.insert(name.clone(), Mutex::new(ExternalEntry::idle()));
        }
        Self {
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            providers,
            configs,
            conn_to_provider: DashMap::new(),
            timeouts,
            events,
            log_tx,
        }
    }

    /// Spawn every declared external provider, transitioning `Idle ->
    /// Starting`.
    pub fn start_all(self: &Arc<Self>) {
        let names: Vec<String> = self.configs.keys().cloned().collect();
        for name in names {
            self.start_one(&name);
        }
    }

    fn start_one(self: &Arc<Self>, name: &str) {
        let Some(cfg) = self.configs.get(name) else {
            return;
        };
        let Some(entry_lock) = self.providers.get(name) else {
            return;
        };
        let mut entry = entry_lock.lock();
        match self.supervisor.spawn(
            name,
            &cfg.path,
            cfg.runtime.as_ref(),
            self.log_tx.clone(),
        ) {
            Ok(supervised) => {
                entry.status = Status::Starting;
                entry.started_at = Some(Instant::now());
                entry.child = Some(supervised);
                info!(provider = name, "provider starting");
                drop(entry);
                self.schedule_registration_deadline(name.to_string());
            }
            Err(e) => {
                entry.status = Status::Stopped;
                error!(provider = name, error = %e, "failed to spawn provider");
                let _ = self.events.send(Event::ProviderFailed {
                    provider: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Fail a provider still `Starting` once `timeouts.registration` has
    /// elapsed without a `register` frame.
    fn schedule_registration_deadline(self: &Arc<Self>, name: String) {
        let manager = Arc::clone(self);
        let deadline = self.timeouts.registration;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let Some(entry_lock) = manager.providers.get(&name) else {
                return;
            };
            let stale_child = {
                let mut entry = entry_lock.lock();
                if entry.status == Status::Starting {
                    entry.status = Status::Stopped;
                    entry.conn_id = None;
                    entry.child.take()
                } else {
                    return;
                }
            };
            warn!(provider = name, "registration deadline elapsed, no register frame received");
            let _ = manager.events.send(Event::ProviderFailed {
                provider: name.clone(),
                reason: "registration deadline elapsed".to_string(),
            });
            if let Some(child) = stale_child {
                child.stop(manager.timeouts.shutdown_grace).await;
            }
        });
    }

    /// Route a tool call: builtin tools dispatch synchronously, external
    /// tools go through the Call Tracker and Socket Hub.
    ///
    /// # Errors
    ///
    /// Returns `ToolNotFound` if no provider owns `name`, `ProviderUnavailable`
    /// / `ProviderReloading` / `ProviderDisconnected` if the owning provider
    /// cannot currently service it, `Timeout` if the call tracker's deadline
    /// elapses first, or `Handler` if the provider reported a failure.
    #[instrument(skip(self, params), fields(tool = name))]
    pub async fn call_tool(&self, name: &str, params: Value) -> Result<Value> {
        if self.registry.get(name).is_none() {
            return Err(Error::ToolNotFound(name.to_string()));
        }
        let provider = self
            .registry
            .owner_of(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        if let Some(result) = self.builtin.call(&provider, name, params.clone()).await {
            return result.map_err(Error::Handler);
        }

        self.call_external(&provider, name, params).await
    }

    async fn call_external(&self, provider: &str, tool: &str, params: Value) -> Result<Value> {
        let conn_id = {
            let Some(entry_lock) = self.providers.get(provider) else {
                return Err(Error::ProviderUnavailable(provider.to_string()));
            };
            let entry = entry_lock.lock();
            match entry.status {
                Status::Running | Status::Starting => entry
                    .conn_id
                    .ok_or_else(|| Error::ProviderUnavailable(provider.to_string()))?,
                Status::Reloading => return Err(Error::ProviderReloading(provider.to_string())),
                Status::Idle | Status::Stopped => {
                    return Err(Error::ProviderUnavailable(provider.to_string()))
                }
            }
        };

        let (call_id, rx) = self.call_tracker.begin(provider, self.timeouts.tool_call);
        self.hub
            .send(conn_id, Frame::tool_call(call_id, tool, params))
            .await;

        match rx.await {
            Ok(CallResult::Outcome(ToolOutcome::Success { data })) => Ok(data),
            Ok(CallResult::Outcome(ToolOutcome::Failure { error: reason })) => {
                Err(Error::Handler(reason))
            }
            Ok(CallResult::Timeout) => Err(Error::Timeout),
            Ok(CallResult::Disconnected) => Err(Error::ProviderDisconnected(provider.to_string())),
            Ok(CallResult::HostShutdown) => Err(Error::HostShutdown),
            Err(_) => Err(Error::ProviderDisconnected(provider.to_string())),
        }
    }

    /// Drive the manager's reaction to one hub event. Intended to be called
    /// in a loop by the host facade.
    pub async fn handle_hub_event(self: &Arc<Self>, event: HubEvent) {
        match event {
            HubEvent::Connected(_) => {}
            HubEvent::Frame(conn, frame) => self.handle_frame(conn, frame).await,
            HubEvent::Closed(conn, reason) => self.handle_closed(conn, reason).await,
        }
    }

    /// Before binding, a connection may only send a `register` frame; any
    /// other frame type is unregistered traffic and closes it.
    const UNREGISTERED_TRAFFIC: &'static str = "UnregisteredTraffic";

    async fn handle_frame(&self, conn: ConnId, frame: Frame) {
        if !matches!(frame, Frame::Register { .. }) && !self.conn_to_provider.contains_key(&conn) {
            warn!(
                conn,
                reason = Self::UNREGISTERED_TRAFFIC,
                "frame sent before registration, closing connection"
            );
            self.hub.forget(conn);
            return;
        }

        match frame {
            Frame::Register { data } => self.handle_register(conn, data).await,
            Frame::ToolResponse { id, outcome } => {
                self.call_tracker.complete(&id, outcome);
            }
            Frame::Log { data } => {
                if let Some(provider) = self.conn_to_provider.get(&conn) {
                    let _ = self
                        .log_tx
                        .send((provider.clone(), format!("[{}] {}", data.level, data.message)))
                        .await;
                }
            }
            Frame::ToolCall { .. } | Frame::Reinitialize { .. } => {
                warn!(conn, "unexpected frame type from provider, closing connection");
                self.hub.forget(conn);
            }
        }
    }

    async fn handle_register(&self, conn: ConnId, data: provider_protocol::RegisterData) {
        let name = data.name.clone();
        let Some(entry_lock) = self.providers.get(&name) else {
            warn!(provider = name, "register from unknown provider name, closing connection");
            self.hub.forget(conn);
            return;
        };

        {
            let mut entry = entry_lock.lock();
            if entry.conn_id.is_some() {
                warn!(provider = name, "duplicate registration, closing connection");
                self.hub.forget(conn);
                return;
            }
            entry.conn_id = Some(conn);
            entry.status = Status::Running;
        }

        self.conn_to_provider.insert(conn, name.clone());
        match self.registry.replace_provider_tools(&name, data.tools) {
            Ok(()) => {
                if let Some(entry_lock) = self.providers.get(&name) {
                    entry_lock.lock().restart_count = 0;
                }
                info!(provider = name, "provider registered");
                let _ = self.events.send(Event::ProviderConnected {
                    provider: name.clone(),
                });
            }
            Err(e) => {
                error!(provider = name, error = %e, "registration rejected");
                let mut entry = entry_lock.lock();
                entry.status = Status::Stopped;
                entry.conn_id = None;
                self.conn_to_provider.remove(&conn);
                self.hub.forget(conn);
                let _ = self.events.send(Event::ProviderFailed {
                    provider: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn handle_closed(self: &Arc<Self>, conn: ConnId, reason: String) {
        let Some((_, name)) = self.conn_to_provider.remove(&conn) else {
            return;
        };
        self.hub.forget(conn);
        self.call_tracker.abort_provider(&name);
        self.registry.clear_provider(&name);

        let (unexpected, exit_reason) = match self.providers.get(&name) {
            Some(entry_lock) => {
                let mut entry = entry_lock.lock();
                let unexpected = matches!(entry.status, Status::Running | Status::Starting);
                let exit_reason = entry
                    .child
                    .as_mut()
                    .and_then(|child| child.try_wait().ok().flatten());
                entry.status = Status::Stopped;
                entry.conn_id = None;
                entry.child = None;
                (unexpected, exit_reason)
            }
            None => (false, None),
        };

        let reason = match exit_reason {
            Some(exit) => format!("{reason} ({exit})"),
            None => reason,
        };
        warn!(provider = name, %reason, "provider disconnected");
        let _ = self.events.send(Event::ProviderDisconnected {
            provider: name.clone(),
            reason,
        });

        if unexpected {
            self.schedule_restart(name);
        }
    }

    /// Restart a provider that exited on its own, with exponential backoff
    /// and a cap on total attempts.
    fn schedule_restart(self: &Arc<Self>, name: String) {
        if !self.configs.contains_key(&name) {
            return;
        }
        let attempt = match self.providers.get(&name) {
            Some(entry_lock) => {
                let mut entry = entry_lock.lock();
                entry.restart_count += 1;
                entry.restart_count
            }
            None => return,
        };
        if attempt > MAX_RESTART_ATTEMPTS {
            error!(
                provider = name,
                attempts = attempt,
                "giving up restarting provider after repeated unexpected exits"
            );
            return;
        }

        let delay = restart_backoff(attempt - 1);
        info!(provider = name, attempt, delay_ms = delay.as_millis() as u64, "scheduling provider restart");
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.start_one(&name);
        });
    }

    /// Reload algorithm for provider `name`: clear its tools, stop its
    /// child, fail in-flight calls, then spawn a fresh child.
    pub async fn reload(self: &Arc<Self>, name: &str) {
        let Some(entry_lock) = self.providers.get(name) else {
            return;
        };

        let old_child = {
            let mut entry = entry_lock.lock();
            entry.status = Status::Reloading;
            entry.conn_id.take();
            entry.child.take()
        };
        self.registry.clear_provider(name);
        self.call_tracker.abort_provider(name);

        if let Some(child) = old_child {
            child.stop(self.timeouts.shutdown_grace).await;
        }

        self.start_one(name);
    }

    /// Stop `name`'s child with the configured grace period and mark it
    /// terminally `Stopped`.
    pub async fn stop(&self, name: &str) {
        let Some(entry_lock) = self.providers.get(name) else {
            return;
        };
        let child = {
            let mut entry = entry_lock.lock();
            entry.status = Status::Stopped;
            entry.conn_id.take();
            entry.child.take()
        };
        self.registry.clear_provider(name);
        self.call_tracker.abort_provider(name);
        if let Some(child) = child {
            child.stop(self.timeouts.shutdown_grace).await;
        }
    }

    /// Stop every provider, for host-wide shutdown.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.stop(&name).await;
        }
    }

    /// Current status of `name`, if declared.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<Status> {
        self.providers.get(name).map(|e| e.lock().status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> Timeouts {
        Timeouts {
            registration: Duration::from_secs(15),
            tool_call: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    fn manager_with_no_providers() -> ProviderManager {
        let (events_tx, _rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());
        let builtin = Arc::new(BuiltinHost::new());
        let (log_tx, _log_rx) = mpsc::channel(16);
        ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            HashMap::new(),
            timeouts(),
            events_tx,
            log_tx,
        )
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let manager = manager_with_no_providers();
        let err = manager.call_tool("divide", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), "ToolNotFound");
    }

    struct Echo;

    #[async_trait::async_trait]
    impl crate::builtin::BuiltinProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn tools(&self) -> Vec<provider_protocol::ToolDescriptor> {
            vec![provider_protocol::ToolDescriptor {
                name: "echo".to_string(),
                description: String::new(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
            }]
        }

        async fn call(
            &self,
            _tool: &str,
            _ctx: &crate::builtin::BuiltinContext,
            params: Value,
        ) -> std::result::Result<Value, String> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn call_tool_dispatches_to_builtin_provider() {
        let (events_tx, _rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());

        let mut builtin_host = BuiltinHost::new();
        builtin_host.register(Arc::new(Echo));
        let builtin = Arc::new(builtin_host);
        builtin.start(&registry).await;

        let (log_tx, _log_rx) = mpsc::channel(16);
        let manager = ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            HashMap::new(),
            timeouts(),
            events_tx,
            log_tx,
        );

        let result = manager
            .call_tool("echo", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn external_provider_with_no_connection_is_unavailable() {
        let (events_tx, _rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        registry
            .replace_provider_tools(
                "calc",
                vec![provider_protocol::ToolDescriptor {
                    name: "add".into(),
                    description: String::new(),
                    input_schema: serde_json::json!({"type": "object"}),
                    output_schema: None,
                }],
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());
        let builtin = Arc::new(BuiltinHost::new());
        let (log_tx, _log_rx) = mpsc::channel(16);

        let mut configs = HashMap::new();
        configs.insert(
            "calc".to_string(),
            ProviderConfig {
                kind: "file".into(),
                path: "calc.js".into(),
                runtime: None,
                config: Value::Null,
                change_analysis: crate::config::ChangeAnalysisConfig::default(),
            },
        );

        let manager = ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            configs,
            timeouts(),
            events_tx,
            log_tx,
        );

        let err = manager
            .call_tool("add", serde_json::json!({"a": 1, "b": 2}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ProviderUnavailable");
    }

    #[tokio::test]
    async fn unexpected_disconnect_while_running_schedules_a_restart() {
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());
        let builtin = Arc::new(BuiltinHost::new());
        let (log_tx, _log_rx) = mpsc::channel(16);

        let mut configs = HashMap::new();
        configs.insert(
            "calc".to_string(),
            ProviderConfig {
                kind: "file".into(),
                path: "calc.js".into(),
                runtime: None,
                config: Value::Null,
                change_analysis: crate::config::ChangeAnalysisConfig::default(),
            },
        );

        let manager = Arc::new(ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            configs,
            timeouts(),
            events_tx,
            log_tx,
        ));

        {
            let entry_lock = manager.providers.get("calc").unwrap();
            let mut entry = entry_lock.lock();
            entry.status = Status::Running;
            entry.conn_id = Some(1);
        }
        manager.conn_to_provider.insert(1, "calc".to_string());

        manager
            .handle_closed(1, "connection reset".to_string())
            .await;

        assert_eq!(manager.status("calc"), Some(Status::Stopped));
        assert_eq!(
            manager.providers.get("calc").unwrap().lock().restart_count,
            1
        );

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, Event::ProviderDisconnected { provider, .. } if provider == "calc"));
    }

    #[tokio::test]
    async fn deliberate_stop_does_not_schedule_a_restart() {
        let (events_tx, _rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());
        let builtin = Arc::new(BuiltinHost::new());
        let (log_tx, _log_rx) = mpsc::channel(16);

        let mut configs = HashMap::new();
        configs.insert(
            "calc".to_string(),
            ProviderConfig {
                kind: "file".into(),
                path: "calc.js".into(),
                runtime: None,
                config: Value::Null,
                change_analysis: crate::config::ChangeAnalysisConfig::default(),
            },
        );

        let manager = Arc::new(ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            configs,
            timeouts(),
            events_tx,
            log_tx,
        ));

        manager.stop("calc").await;
        manager.conn_to_provider.insert(1, "calc".to_string());

        manager
            .handle_closed(1, "connection reset".to_string())
            .await;

        assert_eq!(
            manager.providers.get("calc").unwrap().lock().restart_count,
            0
        );
    }

    #[tokio::test]
    async fn registration_deadline_stops_a_provider_that_never_registers() {
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let registry = Arc::new(Registry::new(events_tx.clone()));
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let (hub, _listener, _hub_events) = SocketHub::bind(socket_path.clone()).unwrap();
        let supervisor = Supervisor::new(socket_path);
        let call_tracker = Arc::new(CallTracker::new());
        let builtin = Arc::new(BuiltinHost::new());
        let (log_tx, _log_rx) = mpsc::channel(16);

        let mut configs = HashMap::new();
        configs.insert(
            "calc".to_string(),
            ProviderConfig {
                kind: "file".into(),
                path: "true".into(),
                runtime: Some(crate::config::RuntimeOverride {
                    command: "true".into(),
                    args: Vec::new(),
                }),
                config: Value::Null,
                change_analysis: crate::config::ChangeAnalysisConfig::default(),
            },
        );

        let mut short_timeouts = timeouts();
        short_timeouts.registration = Duration::from_millis(50);

        let manager = Arc::new(ProviderManager::new(
            registry,
            hub,
            supervisor,
            call_tracker,
            builtin,
            configs,
            short_timeouts,
            events_tx,
            log_tx,
        ));

        manager.start_one("calc");
        assert_eq!(manager.status("calc"), Some(Status::Starting));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.status("calc"), Some(Status::Stopped));

        let mut saw_failure = false;
        while let Ok(event) =
            tokio::time::timeout(Duration::from_millis(50), events_rx.recv()).await
        {
            if matches!(event, Ok(Event::ProviderFailed { ref provider, .. }) if provider == "calc")
            {
                saw_failure = true;
                break;
            }
        }
        assert!(saw_failure, "a missed registration deadline should fire ProviderFailed");
    }
}
