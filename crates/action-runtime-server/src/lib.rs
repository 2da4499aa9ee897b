//! HTTP server for action-runtime.
//!
//! This crate exposes a single action over the action proxy contract:
//!
//! - `POST /init` loads the action's code, at most once per process
//! - `POST /run` invokes the loaded entry point, any number of times
//!
//! Every `/run` completion, and every failed `/init`, ends with an
//! activation marker on stdout and stderr.
//!
//! # Quick Start
//!
//! ```ignore
//! use action_runtime_server::{ActionServer, ServerConfig};
//! use action_runtime_common::RuntimeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime_config = RuntimeConfig::default();
//!     let server_config = ServerConfig::default();
//!
//!     let server = ActionServer::new(&runtime_config, server_config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod handler;
pub mod markers;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use markers::{ACTIVATION_END_MARKER, ActivationMarker, MarkerSink, StdioMarkers};
pub use server::{ActionServer, ServerConfig, TestHandle};
pub use state::AppState;
