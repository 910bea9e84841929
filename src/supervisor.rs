//! Process Supervisor: spawns, monitors, and terminates external provider
//! child processes.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use provider_protocol::{ENV_PROVIDER_MODE, ENV_PROVIDER_NAME, ENV_SOCKET_PATH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RuntimeOverride;
use crate::{Error, Result};

/// Default grace period between a graceful stop signal and a force-kill.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Outcome reported when a supervised child exits on its own.
#[derive(Debug, Clone)]
pub struct ExitReason {
    /// Process exit code, if the OS reported one.
    pub code: Option<i32>,
    /// Whether the process was terminated by a signal rather than exiting
    /// normally (unix-only distinction; `false` on other platforms).
    pub signaled: bool,
}

/// A running (or about to run) external provider child process.
pub struct Supervised {
    child: Child,
    started_at: Instant,
    pid: Option<u32>,
}

impl Supervised {
    /// PID of the child, if still known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wall-clock time since this child was spawned.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Send a graceful termination request, wait up to `grace`, then
    /// force-kill if the child is still alive.
    pub async fn stop(mut self, grace: Duration) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        let _ = self.child.start_kill();

        let waited = tokio::time::timeout(grace, self.child.wait()).await;
        if waited.is_err() {
            warn!(pid = ?self.pid, "provider did not exit within grace period, force-killing");
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }

    /// Wait for the child to exit on its own (used by the monitoring task).
    pub async fn wait(&mut self) -> std::io::Result<ExitReason> {
        let status = self.child.wait().await?;
        Ok(Self::exit_reason(status))
    }

    /// Non-blocking check for an already-exited child, used to recover the
    /// real exit status of a child the hub has already reported as
    /// disconnected.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitReason>> {
        Ok(self.child.try_wait()?.map(Self::exit_reason))
    }

    fn exit_reason(status: std::process::ExitStatus) -> ExitReason {
        ExitReason {
            code: status.code(),
            #[cfg(unix)]
            signaled: {
                use std::os::unix::process::ExitStatusExt;
                status.signal().is_some()
            },
            #[cfg(not(unix))]
            signaled: false,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signaled) {
            (Some(code), _) => write!(f, "exited with code {code}"),
            (None, true) => write!(f, "terminated by signal"),
            (None, false) => write!(f, "exited with unknown status"),
        }
    }
}

/// Chooses a runtime command for a provider entry point and launches it.
pub struct Supervisor {
    socket_path: std::path::PathBuf,
}

impl Supervisor {
    /// Construct a supervisor that will point every spawned child at
    /// `socket_path`.
    #[must_use]
    pub fn new(socket_path: std::path::PathBuf) -> Self {
        Self { socket_path }
    }

    /// Spawn a provider's entry point, choosing a runtime command by file
    /// extension unless `runtime_override` names one explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the process cannot be spawned.
    pub fn spawn(
        &self,
        provider_name: &str,
        entry_path: &str,
        runtime_override: Option<&RuntimeOverride>,
        log_tx: mpsc::Sender<(String, String)>,
    ) -> Result<Supervised> {
        let (command, mut args) = match runtime_override {
            Some(r) => (r.command.clone(), r.args.clone()),
            None => Self::infer_runtime(entry_path),
        };
        args.push(entry_path.to_string());

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .env(ENV_SOCKET_PATH, &self.socket_path)
            .env(ENV_PROVIDER_MODE, "1")
            .env(ENV_PROVIDER_NAME, provider_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(Error::Io)?;
        let pid = child.id();
        info!(provider = provider_name, command, ?args, pid, "spawned provider process");

        if let Some(stdout) = child.stdout.take() {
            spawn_log_forwarder(stdout, provider_name.to_string(), "stdout".into(), log_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_forwarder(stderr, provider_name.to_string(), "stderr".into(), log_tx);
        }

        Ok(Supervised {
            child,
            started_at: Instant::now(),
            pid,
        })
    }

    /// Infer `(command, leading args)` from an entry path's extension.
    fn infer_runtime(entry_path: &str) -> (String, Vec<String>) {
        let ext = Path::new(entry_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match ext {
            "ts" => ("tsx".to_string(), Vec::new()),
            "js" | "mjs" => ("node".to_string(), Vec::new()),
            "py" => ("python3".to_string(), Vec::new()),
            _ => ("node".to_string(), Vec::new()),
        }
    }
}

fn spawn_log_forwarder(
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    provider: String,
    stream: String,
    log_tx: mpsc::Sender<(String, String)>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!(provider = %provider, %stream, %line, "provider diagnostic output");
                    let _ = log_tx.send((provider.clone(), line)).await;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(provider = %provider, %stream, error = %e, "error reading provider output");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_python_for_py_extension() {
        let (cmd, _) = Supervisor::infer_runtime("providers/calc/main.py");
        assert_eq!(cmd, "python3");
    }

    #[test]
    fn infers_node_for_js_and_mjs() {
        assert_eq!(Supervisor::infer_runtime("x.js").0, "node");
        assert_eq!(Supervisor::infer_runtime("x.mjs").0, "node");
    }

    #[test]
    fn infers_tsx_for_ts() {
        assert_eq!(Supervisor::infer_runtime("x.ts").0, "tsx");
    }

    #[test]
    fn unknown_extension_falls_back_to_node() {
        assert_eq!(Supervisor::infer_runtime("x.rb").0, "node");
        assert_eq!(Supervisor::infer_runtime("x").0, "node");
    }

    #[tokio::test]
    async fn spawn_and_stop_a_real_short_lived_process() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("host.sock");
        let supervisor = Supervisor::new(socket_path);
        let (tx, _rx) = mpsc::channel(16);

        let runtime = RuntimeOverride {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
        };
        // "sleep 30 <entry_path>" — sleep ignores the extra arg and just sleeps.
        let supervised = supervisor
            .spawn("calc", "ignored", Some(&runtime), tx)
            .expect("spawn sleep");
        assert!(supervised.pid().is_some());
        supervised.stop(Duration::from_millis(500)).await;
    }
}
