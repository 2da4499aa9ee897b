//! Turning an encoded bundle into a callable entry point.
//!
//! [`CodeLoader::load`] runs the whole pipeline:
//!
//! 1. Decode the base64 bundle
//! 2. Persist it to a uniquely named transient file
//! 3. Compile the file into a module whose only imports are the host linker's
//! 4. Resolve the entry point among the module's exports
//! 5. Check the entry-point contract (see [`crate::abi`])
//! 6. Pre-link and instantiate the module, running its initializer once
//!
//! Every step maps its failure to a distinct [`LoadError`] variant.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::Linker;

use action_runtime_common::{LoadError, LoaderConfig};

use crate::abi::check_contract;
use crate::bundle::{BundleFile, decode_bundle};
use crate::store::ActivationContext;
use crate::{CompiledModule, WasmEngine, WasmEntryPoint};

/// Loads bundles against a fixed engine and set of host functions.
///
/// The linker decides what a loaded module can import; nothing else of the
/// host process is reachable from guest code.
#[derive(Clone)]
pub struct CodeLoader {
    engine: WasmEngine,
    linker: Arc<Linker<ActivationContext>>,
    config: LoaderConfig,
}

impl CodeLoader {
    /// Create a loader.
    ///
    /// `linker` should already have the host functions registered
    /// (see `action_runtime_host::create_linker`).
    pub fn new(engine: WasmEngine, linker: Linker<ActivationContext>, config: LoaderConfig) -> Self {
        Self {
            engine,
            linker: Arc::new(linker),
            config,
        }
    }

    /// Load `encoded` and resolve `entry_point` inside it.
    ///
    /// # Errors
    ///
    /// - [`LoadError::BadEncoding`] if the bundle is not base64
    /// - [`LoadError::Persist`] if the bundle cannot be written to disk
    /// - [`LoadError::InvalidBundle`] if it is not a WebAssembly module
    /// - [`LoadError::MissingEntryPoint`] if the export does not exist
    /// - [`LoadError::WrongShape`] if the export violates the contract
    /// - [`LoadError::Instantiation`] if linking or initialization fails
    #[instrument(skip(self, encoded), fields(encoded_len = encoded.len()))]
    pub fn load(&self, encoded: &str, entry_point: &str) -> Result<WasmEntryPoint, LoadError> {
        let start = Instant::now();

        let bytes = decode_bundle(encoded)?;
        let bundle = BundleFile::persist(&bytes, &self.config)?;

        let module = CompiledModule::from_file(self.engine.inner(), bundle.path())?;
        check_contract(&module, entry_point)?;

        let pre = self
            .linker
            .instantiate_pre(module.as_module())
            .map_err(|e| LoadError::instantiation(format!("{e:#}")))?;

        let loaded = WasmEntryPoint::instantiate(&self.engine, module, &pre, entry_point, bundle)?;

        info!(
            entry_point,
            content_hash = %loaded.module().content_hash(),
            bundle = %loaded.bundle_path().display(),
            duration_ms = start.elapsed().as_millis(),
            "Bundle loaded"
        );

        Ok(loaded)
    }
}

impl std::fmt::Debug for CodeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeLoader")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
