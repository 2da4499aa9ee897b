//! Shared application state.
//!
//! This module provides [`AppState`], which holds the resources shared by
//! the `/init` and `/run` handlers. The execution slot is the only mutable
//! state of the whole service.

use std::sync::Arc;

use action_runtime_common::{RuntimeConfig, RuntimeError};
use action_runtime_core::{CodeLoader, ExecutionSlot, WasmEngine};
use action_runtime_host::create_linker;

use crate::markers::{ActivationMarker, MarkerSink, StdioMarkers};

/// Shared state across all request handlers.
///
/// This struct is cloned for each request, so it uses `Arc` for shared data.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide execution slot.
    slot: Arc<ExecutionSlot>,

    /// Loader used by the first successful `/init`.
    loader: Arc<CodeLoader>,

    /// Where activation end markers are written.
    markers: Arc<dyn MarkerSink>,
}

impl AppState {
    /// Create new application state with an empty slot.
    ///
    /// # Errors
    ///
    /// Returns an error if engine or linker creation fails.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let engine = WasmEngine::new(&config.engine)?;
        let linker = create_linker(&engine)?;
        let loader = CodeLoader::new(engine, linker, config.loader.clone());

        Ok(Self {
            slot: Arc::new(ExecutionSlot::new()),
            loader: Arc::new(loader),
            markers: Arc::new(StdioMarkers),
        })
    }

    /// Replace the destination of activation end markers.
    #[must_use]
    pub fn with_marker_sink(mut self, markers: Arc<dyn MarkerSink>) -> Self {
        self.markers = markers;
        self
    }

    /// Get the execution slot.
    pub fn slot(&self) -> &Arc<ExecutionSlot> {
        &self.slot
    }

    /// Get the code loader.
    pub fn loader(&self) -> &Arc<CodeLoader> {
        &self.loader
    }

    /// Get the marker sink.
    pub fn markers(&self) -> &dyn MarkerSink {
        self.markers.as_ref()
    }

    /// Arm an end marker for an activation that starts now.
    pub fn activation_marker(&self) -> ActivationMarker {
        ActivationMarker::new(Arc::clone(&self.markers))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("slot", &self.slot)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}
