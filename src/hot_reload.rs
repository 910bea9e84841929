//! Hot-Reload Coordinator: watches external providers' source files and
//! routes observed changes into a provider restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;
use crate::provider_manager::ProviderManager;

const DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How an observed file change affects a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Impact {
    Restart,
    Reinit,
    Ignored,
}

fn classify(path: &str, cfg: &ProviderConfig, is_entry_point: bool) -> Impact {
    if is_entry_point {
        return Impact::Restart;
    }
    if cfg
        .change_analysis
        .restart_triggers
        .iter()
        .any(|t| path.contains(t.as_str()))
    {
        return Impact::Restart;
    }
    if cfg
        .change_analysis
        .reinit_triggers
        .iter()
        .any(|t| path.contains(t.as_str()))
    {
        return Impact::Reinit;
    }
    Impact::Ignored
}

/// Watches every declared external provider's entry-point file (and its
/// containing directory) and drives a restart whenever a change is
/// classified as significant.
pub struct HotReloadCoordinator {
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl HotReloadCoordinator {
    /// Start watching. Returns immediately with directory watching already
    /// registered; the debounced reload loop runs in a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying filesystem watcher cannot be
    /// constructed.
    pub fn start(
        manager: Arc<ProviderManager>,
        configs: HashMap<String, ProviderConfig>,
        mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    ) -> crate::Result<Self> {
        if configs.is_empty() {
            info!("no providers declared, hot-reload watcher idle");
            return Ok(Self {
                _watcher: Mutex::new(None),
            });
        }

        let (event_tx, mut event_rx) = mpsc::channel::<(String, Impact)>(256);

        let entry_points: HashMap<PathBuf, String> = configs
            .iter()
            .map(|(name, cfg)| (PathBuf::from(&cfg.path), name.clone()))
            .collect();

        let watcher = Self::create_watcher(event_tx, &configs, &entry_points)?;

        tokio::spawn(async move {
            let mut last_event: HashMap<String, Instant> = HashMap::new();
            let mut interval = tokio::time::interval(POLL_INTERVAL);

            loop {
                tokio::select! {
                    Some((provider, impact)) = event_rx.recv() => {
                        if impact != Impact::Ignored {
                            last_event.insert(provider, Instant::now());
                        }
                    }
                    _ = interval.tick() => {
                        let ready: Vec<String> = last_event
                            .iter()
                            .filter(|(_, at)| at.elapsed() >= DEBOUNCE)
                            .map(|(name, _)| name.clone())
                            .collect();
                        for name in ready {
                            last_event.remove(&name);
                            info!(provider = %name, "hot-reload: restarting provider");
                            manager.reload(&name).await;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("hot-reload coordinator shutting down");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: Mutex::new(Some(watcher)),
        })
    }

    fn create_watcher(
        event_tx: mpsc::Sender<(String, Impact)>,
        configs: &HashMap<String, ProviderConfig>,
        entry_points: &HashMap<PathBuf, String>,
    ) -> crate::Result<RecommendedWatcher> {
        let configs = configs.clone();
        let entry_points = entry_points.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in &event.paths {
                        let path_str = path.to_string_lossy().to_string();
                        let is_entry_point = entry_points.contains_key(path);
                        let Some(provider) = entry_points
                            .get(path)
                            .cloned()
                            .or_else(|| owning_provider(&configs, &path_str))
                        else {
                            continue;
                        };
                        let Some(cfg) = configs.get(&provider) else {
                            continue;
                        };
                        let impact = classify(&path_str, cfg, is_entry_point);
                        if impact != Impact::Ignored {
                            debug!(provider = %provider, path = %path_str, ?impact, "provider file change");
                            let _ = event_tx.try_send((provider, impact));
                        }
                    }
                }
                Err(e) => error!(error = %e, "file watcher error"),
            },
            NotifyConfig::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| crate::Error::Config(format!("failed to create file watcher: {e}")))?;

        let mut watched_dirs = std::collections::HashSet::new();
        for cfg in configs.values() {
            let path = Path::new(&cfg.path);
            let dir = path.parent().unwrap_or(Path::new("."));
            if watched_dirs.insert(dir.to_path_buf()) && dir.exists() {
                if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                    warn!(directory = %dir.display(), error = %e, "failed to watch provider directory");
                } else {
                    info!(directory = %dir.display(), "watching for provider changes");
                }
            }
        }

        Ok(watcher)
    }
}

/// Find the provider whose restart/reinit triggers match `path`, if any,
/// for paths that are not themselves an entry point (e.g. a sibling file
/// the provider's own trigger globs name explicitly).
fn owning_provider(configs: &HashMap<String, ProviderConfig>, path: &str) -> Option<String> {
    configs
        .iter()
        .find(|(_, cfg)| {
            cfg.change_analysis
                .restart_triggers
                .iter()
                .chain(cfg.change_analysis.reinit_triggers.iter())
                .any(|t| path.contains(t.as_str()))
        })
        .map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(restart: &[&str], reinit: &[&str]) -> ProviderConfig {
        ProviderConfig {
            kind: "file".to_string(),
            path: "demos/calc-provider/main.js".to_string(),
            runtime: None,
            config: serde_json::Value::Null,
            change_analysis: crate::config::ChangeAnalysisConfig {
                restart_triggers: restart.iter().map(|s| s.to_string()).collect(),
                reinit_triggers: reinit.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn entry_point_change_is_always_restart() {
        let c = cfg(&[], &["config.yaml"]);
        assert_eq!(classify("demos/calc-provider/main.js", &c, true), Impact::Restart);
    }

    #[test]
    fn restart_trigger_match_is_restart() {
        let c = cfg(&["endpoint"], &[]);
        assert_eq!(classify("providers/calc/endpoint.txt", &c, false), Impact::Restart);
    }

    #[test]
    fn reinit_trigger_match_is_reinit() {
        let c = cfg(&[], &["config.yaml"]);
        assert_eq!(classify("providers/calc/config.yaml", &c, false), Impact::Reinit);
    }

    #[test]
    fn unmatched_path_is_ignored() {
        let c = cfg(&["endpoint"], &["config.yaml"]);
        assert_eq!(classify("providers/calc/readme.md", &c, false), Impact::Ignored);
    }

    #[tokio::test]
    async fn starting_with_no_providers_is_a_noop() {
        let registry = Arc::new(crate::registry::Registry::new(
            tokio::sync::broadcast::channel(16).0,
        ));
        let hub_dir = tempfile::tempdir().unwrap();
        let (hub, listener, _hub_rx) =
            crate::socket_hub::SocketHub::bind(hub_dir.path().join("hub.sock")).unwrap();
        drop(listener);
        let (log_tx, _log_rx) = mpsc::channel(16);
        let manager = Arc::new(ProviderManager::new(
            registry,
            hub,
            crate::supervisor::Supervisor::new(hub_dir.path().join("hub.sock")),
            Arc::new(crate::call_tracker::CallTracker::new()),
            Arc::new(crate::builtin::BuiltinHost::new()),
            HashMap::new(),
            crate::provider_manager::Timeouts {
                registration: Duration::from_secs(1),
                tool_call: Duration::from_secs(1),
                shutdown_grace: Duration::from_secs(1),
            },
            tokio::sync::broadcast::channel(16).0,
            log_tx,
        ));
        let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let coordinator = HotReloadCoordinator::start(manager, HashMap::new(), shutdown_rx);
        assert!(coordinator.is_ok());
    }
}
