//! Built-in Provider Host: registers in-process providers directly into the
//! registry and invokes their tools without IPC.

use std::sync::Arc;

use async_trait::async_trait;
use provider_protocol::ToolDescriptor;
use serde_json::Value;

use crate::registry::Registry;

/// Context passed to a built-in handler for one call.
pub struct BuiltinContext {
    /// The provider's stable name.
    pub provider_name: String,
}

/// A provider implemented in-process rather than as a child process.
#[async_trait]
pub trait BuiltinProvider: Send + Sync + 'static {
    /// Stable, unique name.
    fn name(&self) -> &str;

    /// Informational version string.
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// The provider's complete, static tool set.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Called once at host startup, before tools are installed.
    async fn initialize(&self) {}

    /// Execute `tool` with `params`. Returning `Err` becomes a
    /// `HandlerError` outcome for the caller.
    async fn call(&self, tool: &str, ctx: &BuiltinContext, params: Value) -> Result<Value, String>;

    /// Optional cleanup hook invoked at host shutdown.
    async fn dispose(&self) {}
}

/// Owns the set of registered built-in providers and dispatches calls to
/// them directly.
pub struct BuiltinHost {
    providers: Vec<Arc<dyn BuiltinProvider>>,
}

impl BuiltinHost {
    /// Construct an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Initialize every registered provider and install its tools into
    /// `registry`.
    pub async fn start(&self, registry: &Registry) {
        for provider in &self.providers {
            provider.initialize().await;
            let _ = registry.replace_provider_tools(provider.name(), provider.tools());
        }
    }

    /// Register a built-in provider. Must be called before [`Self::start`].
    pub fn register(&mut self, provider: Arc<dyn BuiltinProvider>) {
        self.providers.push(provider);
    }

    /// Invoke `tool` on the built-in provider named `provider_name`.
    ///
    /// # Errors
    ///
    /// Returns the handler's reported failure string as `Err`.
    pub async fn call(
        &self,
        provider_name: &str,
        tool: &str,
        params: Value,
    ) -> Option<std::result::Result<Value, String>> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.name() == provider_name)?;
        let ctx = BuiltinContext {
            provider_name: provider_name.to_string(),
        };
        Some(provider.call(tool, &ctx, params).await)
    }

    /// Dispose every registered provider, for host shutdown.
    pub async fn shutdown(&self) {
        for provider in &self.providers {
            provider.dispose().await;
        }
    }
}

impl Default for BuiltinHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    struct Echo;

    #[async_trait]
    impl BuiltinProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                name: "echo".to_string(),
                description: "echoes params back".to_string(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
            }]
        }

        async fn call(&self, _tool: &str, _ctx: &BuiltinContext, params: Value) -> Result<Value, String> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn start_installs_tools_into_registry() {
        let mut host = BuiltinHost::new();
        host.register(Arc::new(Echo));
        let (tx, _rx) = broadcast::channel(16);
        let registry = Registry::new(tx);
        host.start(&registry).await;
        assert!(registry.get("echo").is_some());
        assert_eq!(registry.owner_of("echo").as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn call_dispatches_to_the_matching_provider() {
        let mut host = BuiltinHost::new();
        host.register(Arc::new(Echo));
        let result = host
            .call("echo", "echo", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(result.unwrap(), serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn call_to_unknown_provider_returns_none() {
        let host = BuiltinHost::new();
        assert!(host.call("nope", "echo", Value::Null).await.is_none());
    }
}
