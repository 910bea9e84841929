//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// MCP provider host - orchestrates built-in and external tool providers
#[derive(Parser, Debug)]
#[command(name = "mcp-provider-host")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true, env = "HOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "HOST_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text", env = "HOST_LOG_FORMAT")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the host to completion: bind the socket, spawn configured
    /// providers, and serve tool calls until interrupted
    Serve,

    /// Connect to a running host's socket and print the registry
    ListTools {
        /// Path to the host's domain socket. Defaults to the configured
        /// socket directory's `host.sock`
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Invoke a tool directly against a running host, for smoke-testing
    Call {
        /// Name of the tool to invoke
        tool: String,
        /// JSON-encoded arguments object
        args: String,
        /// Path to the host's domain socket
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}
