//! Action Runtime CLI entry point.
//!
//! Starts the HTTP server that hosts a single action behind `/init` and `/run`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use action_runtime_common::ConfigFile;
use action_runtime_server::{ActionServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "action-runtime")]
#[command(about = "Hosts a single WebAssembly action behind /init and /run")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ACTION_RUNTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long, env = "BIND_ADDR")]
    bind: Option<SocketAddr>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,action_runtime=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Stdout is shared with the guest and the activation markers.
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Starting Action Runtime");

    let config_file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let mut server_config =
        ServerConfig::try_from(&config_file.server).context("Invalid server configuration")?;
    if let Some(bind) = cli.bind {
        server_config = server_config.with_bind_addr(bind);
    }

    info!(
        bind_addr = %server_config.bind_addr,
        pooling_allocator = config_file.runtime.engine.pooling_allocator,
        bundle_dir = %config_file.runtime.loader.bundle_dir().display(),
        "Configuration loaded"
    );

    let server = ActionServer::new(&config_file.runtime, server_config)
        .context("Failed to initialize the runtime")?;

    info!("Server initialized. Available endpoints:");
    info!("  POST /init  - Load the action (once)");
    info!("  POST /run   - Invoke the action");

    server.run().await?;

    Ok(())
}
