//! Configuration loading for the provider host.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level configuration, loaded from a YAML file merged with
/// `HOST_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Env files to load before processing config. Paths support `~`
    /// expansion. Loaded in order, later files override earlier ones.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Declared providers, keyed by stable provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Timeout knobs.
    pub performance: PerformanceConfig,
    /// Development-only toggles.
    pub dev: DevConfig,
    /// Socket hub settings.
    pub server: ServerConfig,
}

/// A single external provider's declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Only `"file"` is currently supported: the provider is an entry-point
    /// source file launched by the Process Supervisor.
    #[serde(rename = "type")]
    pub kind: String,
    /// Path to the provider's entry point.
    pub path: String,
    /// Explicit runtime command and args; overrides extension-based
    /// inference when present.
    #[serde(default)]
    pub runtime: Option<RuntimeOverride>,
    /// Provider-specific configuration blob, passed to `initialize`.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Predicates the Hot-Reload Coordinator uses to classify a source
    /// change for this provider.
    #[serde(default)]
    pub change_analysis: ChangeAnalysisConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "file".to_string(),
            path: String::new(),
            runtime: None,
            config: serde_json::Value::Null,
            change_analysis: ChangeAnalysisConfig::default(),
        }
    }
}

/// Explicit runtime command override for a provider.
///
/// Accepts either the structured form (`{command: "python3", args: ["-u"]}`)
/// or a single shell-like string (`"python3 -u"`), split with [`shlex`].
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeOverride {
    /// Executable to launch.
    pub command: String,
    /// Arguments passed before the provider's entry-point path.
    pub args: Vec<String>,
}

impl<'de> Deserialize<'de> for RuntimeOverride {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Line(String),
            Structured { command: String, #[serde(default)] args: Vec<String> },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Structured { command, args } => Ok(Self { command, args }),
            Repr::Line(line) => {
                let mut parts = shlex::split(&line)
                    .ok_or_else(|| serde::de::Error::custom("invalid shell-quoted runtime command"))?
                    .into_iter();
                let command = parts
                    .next()
                    .ok_or_else(|| serde::de::Error::custom("runtime command line is empty"))?;
                Ok(Self { command, args: parts.collect() })
            }
        }
    }
}

/// File-change classification predicates for one provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChangeAnalysisConfig {
    /// Glob-like substrings; a changed path containing one triggers a
    /// full restart.
    #[serde(default)]
    pub restart_triggers: Vec<String>,
    /// Glob-like substrings; a changed path containing one triggers a
    /// reinit-without-restart (currently routed through restart until the
    /// Hot-Reload Coordinator distinguishes the two).
    #[serde(default)]
    pub reinit_triggers: Vec<String>,
}

/// Timeout knobs for provider orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Overall timeout for a host-facing request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Per-call timeout enforced by the Call Tracker.
    #[serde(with = "humantime_serde")]
    pub tool_call_timeout: Duration,
    /// How long `Starting` waits for the first `register` frame.
    #[serde(with = "humantime_serde")]
    pub provider_registration_timeout: Duration,
    /// Grace period before a `stop()` escalates to a force-kill.
    #[serde(with = "humantime_serde")]
    pub provider_shutdown_grace: Duration,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            tool_call_timeout: Duration::from_secs(30),
            provider_registration_timeout: Duration::from_secs(15),
            provider_shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Development-only toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Enable the Hot-Reload Coordinator's filesystem watch.
    pub hot_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { hot_reload: true }
    }
}

/// Socket Hub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory the domain socket file is created under. Defaults to the
    /// OS temp directory.
    pub socket_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { socket_dir: None }
    }
}

impl Config {
    /// Load configuration from an optional file merged with environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a given path does not exist or the merged
    /// configuration fails to deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("HOST_").split("__"));

        let config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.load_env_files();

        Ok(config)
    }

    /// Load `env_files` into the process environment. Supports `~`
    /// expansion. Missing files are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if let Some(rest) = path_str.strip_prefix('~') {
                match dirs::home_dir() {
                    Some(home) => format!("{}{}", home.display(), rest),
                    None => path_str.clone(),
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!(path = %expanded, "loaded env file"),
                    Err(e) => tracing::warn!(path = %expanded, error = %e, "failed to load env file"),
                }
            } else {
                tracing::debug!(path = %expanded, "env file not found, skipped");
            }
        }
    }

    /// The socket directory to bind under, defaulting to the OS temp dir.
    #[must_use]
    pub fn socket_dir(&self) -> std::path::PathBuf {
        self.server
            .socket_dir
            .as_ref()
            .map(std::path::PathBuf::from)
            .unwrap_or_else(env::temp_dir)
    }
}

/// Custom humantime serde module for `Duration`, matching the
/// `30s` / `5m` / `100ms` string encoding used across this config surface.
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize `Duration` to a human-readable string (e.g. `"30s"`).
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize a human-readable duration string (`"30s"`, `"5m"`, `"100ms"`).
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(secs) = s.strip_suffix("ms") {
            // must check "ms" before "s"
            secs.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
