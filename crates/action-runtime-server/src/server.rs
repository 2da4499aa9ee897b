//! HTTP server implementation.
//!
//! This module provides the main [`ActionServer`] struct for running
//! the action runtime HTTP server.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use action_runtime_common::{RuntimeConfig, RuntimeError, ServerConfigFile};

use crate::router::build_router;
use crate::state::AppState;

/// Default largest accepted request body (48 MiB).
const DEFAULT_MAX_BODY_BYTES: usize = 48 * 1024 * 1024;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            graceful_shutdown: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with custom bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Create a new server config with a custom body limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

impl TryFrom<&ServerConfigFile> for ServerConfig {
    type Error = RuntimeError;

    fn try_from(file: &ServerConfigFile) -> Result<Self, Self::Error> {
        let bind_addr = file.bind_addr.parse().map_err(|e| {
            RuntimeError::invalid_config(format!("Invalid bind_addr '{}': {e}", file.bind_addr))
        })?;

        if file.max_body_bytes == 0 {
            return Err(RuntimeError::invalid_config(
                "max_body_bytes must be greater than 0",
            ));
        }

        Ok(Self {
            bind_addr,
            graceful_shutdown: file.graceful_shutdown,
            max_body_bytes: file.max_body_bytes,
        })
    }
}

/// Action runtime HTTP server.
///
/// Serves `POST /init` and `POST /run` for a single action.
///
/// # Example
///
/// ```ignore
/// use action_runtime_server::{ActionServer, ServerConfig};
/// use action_runtime_common::RuntimeConfig;
///
/// let server = ActionServer::new(&RuntimeConfig::default(), ServerConfig::default())?;
/// server.run().await?;
/// ```
pub struct ActionServer {
    /// Application state.
    state: AppState,
    /// Server configuration.
    config: ServerConfig,
}

impl ActionServer {
    /// Create a new server instance with an empty execution slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine or host linker cannot be set up.
    pub fn new(
        runtime_config: &RuntimeConfig,
        server_config: ServerConfig,
    ) -> Result<Self, RuntimeError> {
        let state = AppState::new(runtime_config)?;

        Ok(Self {
            state,
            config: server_config,
        })
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown.
    ///
    /// With graceful shutdown enabled, SIGINT or SIGTERM stops accepting
    /// connections and waits for in-flight activations to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the address.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let listener = bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "Starting HTTP server");

        let app = build_router(self.state, self.config.max_body_bytes);
        if self.config.graceful_shutdown {
            serve(listener, app, shutdown_signal()).await?;
        } else {
            serve(listener, app, std::future::pending::<()>()).await?;
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an ephemeral loopback port in the background.
    ///
    /// The returned [`TestHandle`] exposes the bound address and the shared
    /// state, and stops the server on [`TestHandle::shutdown`].
    pub async fn start_test(runtime_config: &RuntimeConfig) -> Result<TestHandle, RuntimeError> {
        let server = Self::new(
            runtime_config,
            ServerConfig::default().with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0))),
        )?;

        let listener = bind(server.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        let state = server.state.clone();
        let app = build_router(server.state, server.config.max_body_bytes);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, app, async move {
            let _ = shutdown_rx.await;
        }));

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx,
            task,
        })
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, RuntimeError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| RuntimeError::invalid_config(format!("Failed to bind {addr}: {e}")))
}

async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// A server running in the background on a loopback port.
pub struct TestHandle {
    addr: SocketAddr,
    state: AppState,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestHandle {
    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the server, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The state shared with the running handlers.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Test server task failed");
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
