//! Host functions linked into action-runtime guests.
//!
//! A loaded bundle can import nothing but what is registered here. This
//! is what confines its symbol resolution to the bundle itself.
//!
//! # Imports
//!
//! - `env.log(level, ptr, len)`: see [`logging`]
//! - `env.fail(ptr, len)`: see [`failure`]
//! - `wasi_snapshot_preview1.*`: WASI with stdout and stderr inherited, so
//!   guest prints land between the activation markers

pub mod failure;
pub mod linker;
pub mod logging;

pub use failure::FailureHost;
pub use linker::{create_linker, register_all};
pub use logging::LoggingHost;
