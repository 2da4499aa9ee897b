//! Configuration structures for the action-runtime.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, optimization)
//! - [`LoaderConfig`]: Where and how bundles are materialized before loading

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the action-runtime.
/// It is usually loaded from the `[runtime]` table of a TOML config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Bundle loading configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Wasmtime engine configuration.
///
/// These settings affect the global Wasmtime engine behavior,
/// including memory allocation strategy and code generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for instance creation.
    ///
    /// The loaded module is instantiated once, at `/init`; the pool reserves
    /// its memory up front at the cost of reserved address space.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Optimize generated code for speed instead of compile time.
    #[serde(default = "defaults::optimize")]
    pub optimize: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            optimize: defaults::optimize(),
        }
    }
}

/// Bundle loading configuration.
///
/// Decoded bundles are written to `<bundle_dir>/<file_prefix>-<uuid><file_suffix>`
/// and removed again when the loaded entry point is dropped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Directory for transient bundle files. `None` uses the system temp dir.
    #[serde(default)]
    pub bundle_dir: Option<PathBuf>,

    /// File name prefix of persisted bundles.
    #[serde(default = "defaults::file_prefix")]
    pub file_prefix: String,

    /// File name suffix of persisted bundles.
    #[serde(default = "defaults::file_suffix")]
    pub file_suffix: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            bundle_dir: None,
            file_prefix: defaults::file_prefix(),
            file_suffix: defaults::file_suffix(),
        }
    }
}

impl LoaderConfig {
    /// The directory bundles are written to.
    pub fn bundle_dir(&self) -> PathBuf {
        self.bundle_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn max_instances() -> u32 {
        64
    }

    pub const fn instance_memory_mb() -> u32 {
        256
    }

    pub const fn optimize() -> bool {
        true
    }

    pub fn file_prefix() -> String {
        "useraction".to_string()
    }

    pub fn file_suffix() -> String {
        ".wasm".to_string()
    }
}
