//! The process-wide execution slot.
//!
//! [`ExecutionSlot`] holds at most one entry point for the lifetime of the
//! process. It starts [`SlotState::Empty`] and moves to [`SlotState::Loaded`]
//! exactly once, on the first successful [`ExecutionSlot::try_load`]. A failed
//! load leaves it empty, so initialization can be retried.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use action_runtime_common::{ActionError, EntryPointError, JsonMap, LoadError};

use crate::entry_point::EntryPoint;
use crate::scope::{Activation, ActivationScope};

/// Lifecycle state of an [`ExecutionSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No entry point has been loaded yet.
    Empty,
    /// An entry point is loaded; terminal.
    Loaded,
}

/// Single-assignment holder of the loaded entry point.
///
/// `try_load` holds `load_lock` across the emptiness check *and* the load,
/// so concurrent initializations cannot both observe `Empty`. Invocations
/// only read the [`OnceLock`] and never take the lock.
#[derive(Default)]
pub struct ExecutionSlot {
    entry_point: OnceLock<Arc<dyn EntryPoint>>,
    load_lock: Mutex<()>,
}

impl ExecutionSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SlotState {
        if self.entry_point.get().is_some() {
            SlotState::Loaded
        } else {
            SlotState::Empty
        }
    }

    /// Returns `true` once an entry point has been stored.
    pub fn is_loaded(&self) -> bool {
        self.state() == SlotState::Loaded
    }

    /// The stored entry point, if any.
    pub fn entry_point(&self) -> Option<Arc<dyn EntryPoint>> {
        self.entry_point.get().cloned()
    }

    /// Run `load` and store its entry point, if the slot is still empty.
    ///
    /// # Errors
    ///
    /// - [`ActionError::AlreadyInitialized`] if an entry point is already
    ///   stored; `load` is not called and the stored entry point is kept
    /// - [`ActionError::Load`] if `load` fails; the slot stays empty
    pub fn try_load<E, F>(&self, load: F) -> Result<Arc<dyn EntryPoint>, ActionError>
    where
        E: EntryPoint + 'static,
        F: FnOnce() -> Result<E, LoadError>,
    {
        let _guard = self.load_lock.lock();

        if self.entry_point.get().is_some() {
            warn!("Rejecting initialization of an already loaded slot");
            return Err(ActionError::AlreadyInitialized);
        }

        let entry_point: Arc<dyn EntryPoint> = Arc::new(load()?);
        if self.entry_point.set(Arc::clone(&entry_point)).is_err() {
            return Err(ActionError::AlreadyInitialized);
        }

        info!(entry_point = entry_point.name(), "Execution slot loaded");
        Ok(entry_point)
    }

    /// Invoke the stored entry point.
    ///
    /// The call runs inside a fresh [`ActivationScope`]. A `None` result is
    /// reported as [`EntryPointError::NoResult`]; an empty mapping is a
    /// valid result. A panic inside the entry point is caught and reported
    /// as [`EntryPointError::Panicked`].
    ///
    /// # Errors
    ///
    /// - [`ActionError::NotInitialized`] if the slot is empty
    /// - [`ActionError::EntryPoint`] if the entry point fails
    #[instrument(skip_all)]
    pub fn invoke(&self, input: &JsonMap, context: &JsonMap) -> Result<JsonMap, ActionError> {
        let Some(entry_point) = self.entry_point() else {
            return Err(ActionError::NotInitialized);
        };

        let activation = Activation::new(entry_point.name());
        debug!(
            activation_id = activation.id(),
            entry_point = activation.entry_point(),
            "Invoking entry point"
        );

        let _scope = ActivationScope::enter(activation);
        let outcome = catch_unwind(AssertUnwindSafe(|| entry_point.invoke(input, context)))
            .unwrap_or_else(|payload| {
                Err(EntryPointError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        match outcome {
            Ok(Some(output)) => Ok(output),
            Ok(None) => Err(EntryPointError::NoResult.into()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for ExecutionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSlot")
            .field("state", &self.state())
            .field("entry_point", &self.entry_point.get().map(|e| e.name().to_string()))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
