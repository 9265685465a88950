//! scriptcast command line.
//!
//! Front end over the discovery/dispatch engine:
//! - `watch`: run the periodic scanner and log target changes
//! - `send`: one scan cycle, then dispatch a script to one or all targets
//! - `targets`: one scan cycle, then list discovered ports
//! - `mock-target`: a receiving end for local testing

use std::io::Read;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scriptcast_core::{Config, Hub, RegistryChange, Target};
use scriptcast_proto::ScriptCodec;

/// Discover local script-execution targets and dispatch scripts to them
#[derive(Parser, Debug)]
#[command(name = "scriptcast")]
#[command(version, about, long_about = None)]
#[command(after_help = "\
Examples:
  scriptcast watch                      Log targets as they come and go
  scriptcast targets --json             Scan once, list ports as JSON
  scriptcast send run.lua --target all  Send a script to every target
  scriptcast send - --target 5553       Send stdin to one target
  scriptcast mock-target --port 5553    Print frames a target would receive
")]
struct Cli {
    /// Address the targets listen on
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Lowest candidate port (inclusive)
    #[arg(long, global = true, default_value_t = scriptcast_core::config::DEFAULT_PORT_MIN)]
    port_min: u16,

    /// Highest candidate port (inclusive)
    #[arg(long, global = true, default_value_t = scriptcast_core::config::DEFAULT_PORT_MAX)]
    port_max: u16,

    /// Scan period in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    interval_ms: u64,

    /// Per-attempt connect timeout in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the periodic scanner and log registry changes until Ctrl-C
    Watch,

    /// Scan once, then dispatch a script file (`-` reads stdin)
    Send {
        /// Script file to send
        file: PathBuf,

        /// Destination: a port number, or "all"
        #[arg(long, default_value = "all")]
        target: Target,
    },

    /// Scan once and list the discovered target ports
    Targets {
        /// Emit a JSON array instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Listen on one port and print every script frame received
    #[command(name = "mock-target")]
    MockTarget {
        /// Port to listen on
        #[arg(long)]
        port: u16,
    },
}

impl Cli {
    fn config(&self) -> Result<Config> {
        Ok(Config {
            host: self.host,
            port_min: self.port_min,
            port_max: self.port_max,
            scan_interval: Duration::from_millis(self.interval_ms),
            connect_timeout: Duration::from_millis(self.timeout_ms),
        }
        .validate()?)
    }
}

/// Set up logging.
/// In debug builds, defaults to debug level and logs to a timestamped file.
/// In release builds, defaults to info level and logs to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scriptcast={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("scriptcast-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);

        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_ansi(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn read_script(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("failed to read script from stdin")?;
        Ok(script)
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read script file {}", file.display()))
    }
}

async fn watch(config: Config) -> Result<()> {
    let (mut hub, mut changes_rx) = Hub::new(config);
    hub.start();

    info!("watching for targets (Ctrl-C to stop)");
    loop {
        tokio::select! {
            change = changes_rx.recv() => {
                match change {
                    Some(RegistryChange::Added(ports)) => info!("targets connected: {ports:?}"),
                    Some(RegistryChange::Removed(port)) => info!("target gone: {port}"),
                    Some(RegistryChange::Cleared) => info!("all targets dropped"),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    hub.shutdown().await;
    Ok(())
}

async fn send(config: Config, file: &Path, target: Target) -> Result<()> {
    let script = read_script(file)?;
    if script.is_empty() {
        warn!("script is empty, nothing to send");
        return Ok(());
    }

    let (hub, _changes_rx) = Hub::new(config);
    hub.scan_once().await;

    let ports = hub.ports().await;
    if ports.is_empty() {
        warn!("no targets found");
    } else if let Target::Port(port) = target
        && !ports.contains(&port)
    {
        warn!("target {port} not found (available: {ports:?})");
    } else {
        info!("sending {} bytes to {target}", script.len());
        hub.dispatcher().dispatch(target, &script).await;
    }

    // Shutdown flushes queued frames before the process exits.
    hub.shutdown().await;
    Ok(())
}

async fn targets(config: Config, json: bool) -> Result<()> {
    let (hub, _changes_rx) = Hub::new(config);
    hub.scan_once().await;

    let ports = hub.ports().await;
    if json {
        println!("{}", serde_json::to_string(&ports)?);
    } else {
        for port in &ports {
            println!("{port}");
        }
    }

    hub.shutdown().await;
    Ok(())
}

async fn mock_target(host: IpAddr, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to listen on {host}:{port}"))?;
    info!("mock target listening on {host}:{port}");

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("sender connected: {addr}");

        tokio::spawn(async move {
            let mut frames = FramedRead::new(stream, ScriptCodec::new());
            while let Some(result) = frames.next().await {
                match result {
                    Ok(script) => {
                        info!("received script ({} bytes)", script.len());
                        println!("{script}");
                    }
                    Err(e) => {
                        warn!("bad frame from {addr}: {e}");
                        break;
                    }
                }
            }
            info!("sender disconnected: {addr}");
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging();

    let config = cli.config()?;
    match cli.command {
        Commands::Watch => watch(config).await,
        Commands::Send { ref file, target } => send(config, file, target).await,
        Commands::Targets { json } => targets(config, json).await,
        Commands::MockTarget { port } => mock_target(cli.host, port).await,
    }
}
