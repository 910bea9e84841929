//! Tool Registry: the authoritative map of tool name to owning provider.

use std::collections::HashMap;

use parking_lot::RwLock;
use provider_protocol::ToolDescriptor;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::Event;
use crate::{Error, Result};

struct Inner {
    tools: HashMap<String, ToolDescriptor>,
    by_provider: HashMap<String, Vec<String>>,
}

/// Holds the two logical indices described in the design: `name →
/// descriptor` and `provider → owned tool names`. Both live behind one
/// `RwLock` so a reader never observes the in-between state of a swap:
/// `replace_provider_tools` takes the write side for its entire
/// remove-then-insert sequence, and `get`/`list`/`owner_of` take the read
/// side, so a concurrent read sees either the provider's old tool set in
/// full or its new one in full, never a mix of the two.
pub struct Registry {
    inner: RwLock<Inner>,
    events: broadcast::Sender<Event>,
}

impl Registry {
    /// Construct an empty registry, publishing events on `events`.
    #[must_use]
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                tools: HashMap::new(),
                by_provider: HashMap::new(),
            }),
            events,
        }
    }

    /// Atomically replace every tool owned by `provider` with `new_tools`.
    ///
    /// Fails with [`Error::NameCollision`] if any name in `new_tools` is
    /// currently owned by a *different* provider; on failure, the registry's
    /// prior state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameCollision`] on an ownership conflict.
    pub fn replace_provider_tools(
        &self,
        provider: &str,
        new_tools: Vec<ToolDescriptor>,
    ) -> Result<()> {
        let (previous_names, new_names) = {
            let mut inner = self.inner.write();

            // Check collisions against entries not owned by `provider`.
            for tool in &new_tools {
                if let Some(owner) = Self::owner_of_locked(&inner, &tool.name) {
                    if owner != provider {
                        return Err(Error::NameCollision {
                            name: tool.name.clone(),
                            owner,
                        });
                    }
                }
            }

            let previous_names = inner.by_provider.get(provider).cloned().unwrap_or_default();

            for name in &previous_names {
                inner.tools.remove(name);
            }

            let new_names: Vec<String> = new_tools.iter().map(|t| t.name.clone()).collect();
            for tool in new_tools {
                inner.tools.insert(tool.name.clone(), tool);
            }
            if new_names.is_empty() {
                inner.by_provider.remove(provider);
            } else {
                inner
                    .by_provider
                    .insert(provider.to_string(), new_names.clone());
            }

            (previous_names, new_names)
        };

        for name in &previous_names {
            if !new_names.contains(name) {
                self.publish(Event::ToolUnregistered {
                    provider: provider.to_string(),
                    tool: name.clone(),
                });
            }
        }
        for name in &new_names {
            if !previous_names.contains(name) {
                self.publish(Event::ToolRegistered {
                    provider: provider.to_string(),
                    tool: name.clone(),
                });
            }
        }

        debug!(provider, tools = new_names.len(), "tool set replaced");
        Ok(())
    }

    /// Remove every tool currently owned by `provider`.
    pub fn clear_provider(&self, provider: &str) {
        // `replace_provider_tools` with an empty set can never collide.
        let _ = self.replace_provider_tools(provider, Vec::new());
    }

    /// Look up a single tool descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolDescriptor> {
        self.inner.read().tools.get(name).cloned()
    }

    /// All descriptors, in deterministic order by name.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut all: Vec<ToolDescriptor> = self.inner.read().tools.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Name of the provider owning `tool`, if registered.
    #[must_use]
    pub fn owner_of(&self, tool: &str) -> Option<String> {
        Self::owner_of_locked(&self.inner.read(), tool)
    }

    fn owner_of_locked(inner: &Inner, tool: &str) -> Option<String> {
        inner.by_provider.iter().find_map(|(provider, names)| {
            names.iter().any(|n| n == tool).then(|| provider.clone())
        })
    }

    fn publish(&self, event: Event) {
        if self.events.send(event).is_err() {
            warn!("no subscribers for registry event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
        }
    }

    fn registry() -> Registry {
        let (tx, _rx) = broadcast::channel(16);
        Registry::new(tx)
    }

    #[test]
    fn replace_installs_and_lists_sorted() {
        let reg = registry();
        reg.replace_provider_tools("p1", vec![descriptor("b"), descriptor("a")])
            .unwrap();
        let names: Vec<_> = reg.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn collision_with_other_provider_is_rejected_and_state_preserved() {
        let reg = registry();
        reg.replace_provider_tools("p1", vec![descriptor("x")]).unwrap();
        let err = reg
            .replace_provider_tools("p2", vec![descriptor("x"), descriptor("y")])
            .unwrap_err();
        assert!(matches!(err, Error::NameCollision { .. }));
        assert_eq!(reg.owner_of("x").as_deref(), Some("p1"));
        assert!(reg.get("y").is_none());
    }

    #[test]
    fn same_provider_can_replace_its_own_tool() {
        let reg = registry();
        reg.replace_provider_tools("p1", vec![descriptor("x")]).unwrap();
        reg.replace_provider_tools("p1", vec![descriptor("x"), descriptor("z")])
            .unwrap();
        assert_eq!(reg.list().len(), 2);
    }

    #[test]
    fn clear_provider_removes_all_its_tools() {
        let reg = registry();
        reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("b")])
            .unwrap();
        reg.clear_provider("p1");
        assert!(reg.list().is_empty());
    }

    #[test]
    fn events_fire_only_for_the_delta() {
        let (tx, mut rx) = broadcast::channel(16);
        let reg = Registry::new(tx);
        reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("b")])
            .unwrap();
        rx.try_recv().unwrap();
        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("c")])
            .unwrap();
        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            seen.push(ev);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::ToolUnregistered { tool, .. } if tool == "b")));
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::ToolRegistered { tool, .. } if tool == "c")));
    }

    #[test]
    fn concurrent_reader_never_observes_a_partial_swap() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let reg = Arc::new(registry());
        reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("b")])
            .unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader_reg = Arc::clone(&reg);
        let reader_stop = Arc::clone(&stop);
        let reader = std::thread::spawn(move || {
            while !reader_stop.load(Ordering::Relaxed) {
                let names: Vec<_> = reader_reg.list().into_iter().map(|t| t.name).collect();
                let has_a = names.iter().any(|n| n == "a");
                let has_b = names.iter().any(|n| n == "b");
                let has_c = names.iter().any(|n| n == "c");
                assert!(has_a, "must always see a: {names:?}");
                assert!(has_b != has_c, "must see exactly one of b/c: {names:?}");
            }
        });

        for _ in 0..200 {
            reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("c")])
                .unwrap();
            reg.replace_provider_tools("p1", vec![descriptor("a"), descriptor("b")])
                .unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }
}
