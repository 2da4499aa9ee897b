//! WebAssembly module compilation.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's [`Module`]
//! that compiles a persisted bundle and exposes what the loader needs to check
//! the entry-point contract.
//!
//! Bundles may be either the binary format (starting with the `\0asm` magic)
//! or the text format (WAT).

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, ExternType, Module};

use action_runtime_common::LoadError;

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// A compiled WebAssembly module.
///
/// # Thread Safety
///
/// `CompiledModule` is cheap to clone and can be shared across threads.
/// The underlying Wasmtime module is also thread-safe.
#[derive(Clone)]
pub struct CompiledModule {
    inner: Module,

    /// Hash of the bundle bytes, for log correlation.
    content_hash: String,
}

/// The encoding a bundle was delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    /// Binary WebAssembly.
    Binary,
    /// WebAssembly text format.
    Text,
}

impl CompiledModule {
    /// Compile a module from a persisted bundle file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Persist`] if the file cannot be read and
    /// [`LoadError::InvalidBundle`] if it is not a valid module.
    #[instrument(skip(engine, path), fields(path = %path.as_ref().display()))]
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(engine, &bytes)
    }

    /// Compile a module from binary or text WebAssembly.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidBundle`] if the bytes are neither format or
    /// fail to compile.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, LoadError> {
        let start = Instant::now();

        let format = Self::detect_format(bytes)?;

        let module = Module::new(engine, bytes)
            .map_err(|e| LoadError::invalid_bundle(format!("Module compilation failed: {e}")))?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            format = ?format,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Determine whether the bytes look like binary or text WebAssembly.
    pub fn detect_format(bytes: &[u8]) -> Result<BundleFormat, LoadError> {
        if bytes.starts_with(WASM_MAGIC) {
            if bytes.len() < 8 {
                return Err(LoadError::invalid_bundle("Invalid Wasm: file too small"));
            }
            return Ok(BundleFormat::Binary);
        }

        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'(' | b';') => Ok(BundleFormat::Text),
            Some(_) => Err(LoadError::invalid_bundle(
                "Not a WebAssembly module: bad magic number",
            )),
            None => Err(LoadError::invalid_bundle("Bundle is empty")),
        }
    }

    /// Look up the type of an export by name.
    pub fn export_type(&self, name: &str) -> Option<ExternType> {
        self.inner.get_export(name)
    }

    /// Get the content hash of the original bundle bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get the inner Wasmtime module.
    pub fn as_module(&self) -> &Module {
        &self.inner
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
