//! MCP Provider Host
//!
//! Hosts Model Context Protocol tool providers — both in-process built-ins
//! and out-of-process child programs connected over a local domain socket —
//! behind one registry and one `callTool` entry point. Providers can be
//! hot-reloaded without restarting the host.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtin;
pub mod call_tracker;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod hot_reload;
pub mod provider_manager;
pub mod registry;
pub mod socket_hub;
pub mod supervisor;

pub use error::{Error, Result};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set up the global `tracing` subscriber: an env-filter seeded from
/// `level` (overridden by `RUST_LOG` when set) and either human-readable
/// or JSON-formatted output.
pub fn setup_tracing(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
