//! Call Tracker: correlates in-flight tool calls with their eventual
//! responses, and enforces per-call deadlines.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use provider_protocol::ToolOutcome;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;

/// Final outcome of a tracked call, as delivered to the original caller.
#[derive(Debug)]
pub enum CallResult {
    /// The provider returned a success or failure payload.
    Outcome(ToolOutcome),
    /// The deadline elapsed before a response arrived.
    Timeout,
    /// The provider's connection dropped before a response arrived.
    Disconnected,
    /// The host is shutting down; the call was aborted, not the provider.
    HostShutdown,
}

struct PendingCall {
    provider: String,
    deadline: Instant,
    completion: oneshot::Sender<CallResult>,
}

/// Tracks pending calls keyed by a UUIDv4 call ID.
pub struct CallTracker {
    pending: DashMap<String, PendingCall>,
}

impl CallTracker {
    /// Construct an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Begin tracking a call for `tool` on `provider`, expiring after
    /// `timeout`. Returns the generated call ID and a receiver that
    /// resolves exactly once with the call's [`CallResult`].
    pub fn begin(
        &self,
        provider: &str,
        timeout: Duration,
    ) -> (String, oneshot::Receiver<CallResult>) {
        let call_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            call_id.clone(),
            PendingCall {
                provider: provider.to_string(),
                deadline: Instant::now() + timeout,
                completion: tx,
            },
        );
        (call_id, rx)
    }

    /// Resolve `call_id` with `outcome`. A response for an ID that is no
    /// longer pending (already timed out, already completed, or unknown) is
    /// silently discarded and logged at `warn`.
    pub fn complete(&self, call_id: &str, outcome: ToolOutcome) {
        match self.pending.remove(call_id) {
            Some((_, pending)) => {
                let _ = pending.completion.send(CallResult::Outcome(outcome));
            }
            None => {
                warn!(call_id, "discarding response for unknown or already-resolved call");
            }
        }
    }

    /// Fail every call currently owned by `provider` with `Disconnected`.
    pub fn abort_provider(&self, provider: &str) {
        let ids: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().provider == provider)
            .map(|e| e.key().clone())
            .collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.completion.send(CallResult::Disconnected);
            }
        }
    }

    /// Fail every currently pending call, for host-wide shutdown.
    pub fn abort_all(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.completion.send(CallResult::HostShutdown);
            }
        }
    }

    /// Sweep expired entries, completing them with `Timeout`. Intended to be
    /// driven by a periodic timer (default once per second, or sooner if a
    /// nearer deadline is pending — see [`spawn_sweeper`]).
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().deadline <= now)
            .map(|e| e.key().clone())
            .collect();
        for id in expired {
            if let Some((_, pending)) = self.pending.remove(&id) {
                debug!(call_id = %id, "call deadline elapsed");
                let _ = pending.completion.send(CallResult::Timeout);
            }
        }
    }

    /// Earliest deadline among currently pending calls, if any.
    fn nearest_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|e| e.value().deadline).min()
    }

    /// Number of calls currently pending. Exposed for tests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Ceiling on the sweeper's sleep between checks.
const MAX_SWEEP_TICK: Duration = Duration::from_secs(1);

/// Spawn the background sweep timer. Wakes once per second, or sooner if a
/// pending call's deadline is nearer than that, so a short `toolCallTimeout`
/// resolves close to its deadline rather than waiting out a fixed tick.
pub fn spawn_sweeper(tracker: std::sync::Arc<CallTracker>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tracker.sweep_expired();
            let wait = tracker
                .nearest_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(MAX_SWEEP_TICK)
                .min(MAX_SWEEP_TICK);
            time::sleep(wait).await;
        }
    })
}

impl From<CallResult> for Result<ToolOutcome, Error> {
    fn from(result: CallResult) -> Self {
        match result {
            CallResult::Outcome(outcome) => Ok(outcome),
            CallResult::Timeout => Err(Error::Timeout),
            CallResult::Disconnected => Err(Error::ProviderDisconnected(String::new())),
            CallResult::HostShutdown => Err(Error::HostShutdown),
        }
    }
}
