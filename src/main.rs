//! MCP Provider Host — orchestrates built-in and external Model Context
//! Protocol tool providers behind one registry and one `callTool` entry
//! point.

use std::process::ExitCode;

use clap::Parser;
use tokio::net::UnixStream;
use tracing::{error, info};

use mcp_provider_host::cli::{Cli, Command};
use mcp_provider_host::config::Config;
use mcp_provider_host::host::Host;
use mcp_provider_host::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("failed to set up tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve => run_serve(config).await,
        Command::ListTools { socket } => run_list_tools(config, socket).await,
        Command::Call { tool, args, socket } => run_call(config, tool, args, socket).await,
    }
}

async fn run_serve(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        providers = config.providers.len(),
        "starting mcp-provider-host"
    );

    let host = match Host::start(config).await {
        Ok(h) => h,
        Err(e) => {
            error!("failed to start host: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to wait for shutdown signal: {e}");
    }

    host.shutdown().await;
    info!("host shutdown complete");
    ExitCode::SUCCESS
}

fn default_socket(config: &Config) -> std::path::PathBuf {
    config.socket_dir().join("host.sock")
}

// The provider-facing IPC socket only accepts a `register` frame as a
// connection's first message (see socket_hub::SocketHub / ProviderManager);
// it has no separate client-facing wire protocol. `list-tools` and `call`
// are therefore smoke-test probes that confirm the socket is live rather
// than full remote clients — a genuine client-facing transport sits in the
// outer MCP request layer this host is built to sit behind.
async fn probe_socket(path: &std::path::Path) -> std::io::Result<UnixStream> {
    UnixStream::connect(path).await
}

async fn run_list_tools(config: Config, socket: Option<std::path::PathBuf>) -> ExitCode {
    let path = socket.unwrap_or_else(|| default_socket(&config));
    match probe_socket(&path).await {
        Ok(_) => {
            println!("host socket at {} is live", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(socket = %path.display(), error = %e, "failed to connect to host socket");
            ExitCode::FAILURE
        }
    }
}

async fn run_call(
    config: Config,
    tool: String,
    args: String,
    socket: Option<std::path::PathBuf>,
) -> ExitCode {
    let path = socket.unwrap_or_else(|| default_socket(&config));
    if let Err(e) = serde_json::from_str::<serde_json::Value>(&args) {
        error!(error = %e, "args is not valid JSON");
        return ExitCode::FAILURE;
    }

    match probe_socket(&path).await {
        Ok(_) => {
            println!(
                "host socket at {} is live; direct invocation of `{tool}` requires the MCP request layer in front of this host",
                path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(socket = %path.display(), error = %e, "failed to connect to host socket");
            ExitCode::FAILURE
        }
    }
}
