//! Common types, errors, and configuration for action-runtime.
//!
//! This crate provides shared functionality used across the action-runtime workspace:
//! - Error types using `thiserror` for the request lifecycle and process startup
//! - Configuration structures for engine, loader, and server settings
//! - The schema-free JSON mapping type exchanged with entry points

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, LoaderConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, ServerConfigFile};
pub use error::{ActionError, EntryPointError, LoadError, RuntimeError, StructuralError};

/// A JSON object: the input, context, and output type of every entry point.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Log line scanned by the external log collector to delimit one activation.
pub const ACTIVATION_END_MARKER: &str = "XXX_THE_END_OF_A_WHISK_ACTIVATION_XXX";
