//! Loaded WebAssembly entry points.
//!
//! This module provides [`WasmEntryPoint`]. The bundle is instantiated once,
//! at load time (running `_initialize` if exported), and that instance serves
//! every invocation. Guest globals and memory persist between calls the way
//! fields of a long-lived object would. Each invocation:
//!
//! 1. Retags the store with the current activation
//! 2. Copies the input and context JSON into guest memory through `alloc`
//! 3. Calls the entry point and reads its JSON output back

use std::path::Path;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use wasmtime::{InstancePre, Memory, Store, Trap, TypedFunc};

use action_runtime_common::{EntryPointError, JsonMap, LoadError};

use crate::abi::{ALLOC_EXPORT, INITIALIZE_EXPORT, MEMORY_EXPORT, unpack_result};
use crate::bundle::BundleFile;
use crate::entry_point::EntryPoint;
use crate::scope::current_activation;
use crate::store::{ActivationContext, create_store};
use crate::{CompiledModule, WasmEngine};

/// An entry point backed by a loaded WebAssembly bundle.
///
/// # Thread Safety
///
/// A guest instance is single-threaded, so concurrent invocations are
/// serialized on the instance lock. Each still runs in its own
/// [`crate::ActivationScope`] and sees only its own input and context.
pub struct WasmEntryPoint {
    module: CompiledModule,
    name: String,
    live: Mutex<LiveInstance>,
    bundle: BundleFile,
}

/// The instantiated module and the exports every call needs.
///
/// Export handles are resolved once and stay valid for the store's lifetime.
struct LiveInstance {
    store: Store<ActivationContext>,
    memory: Memory,
    alloc: TypedFunc<i32, i32>,
    entry: TypedFunc<(i32, i32, i32, i32), i64>,
}

impl WasmEntryPoint {
    /// Instantiate a checked module and resolve its exports.
    ///
    /// This runs the module's start function and `_initialize`, so a bundle
    /// that cannot be brought up is rejected at load time.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Instantiation`] if instantiation or initialization
    /// fails.
    pub(crate) fn instantiate(
        engine: &WasmEngine,
        module: CompiledModule,
        pre: &InstancePre<ActivationContext>,
        name: &str,
        bundle: BundleFile,
    ) -> Result<Self, LoadError> {
        let store = create_store(engine, format!("load-{}", Uuid::new_v4()));
        let live = LiveInstance::new(store, pre, name)
            .map_err(|e| LoadError::instantiation(describe_error(&e)))?;

        Ok(Self {
            module,
            name: name.to_string(),
            live: Mutex::new(live),
            bundle,
        })
    }

    /// The compiled module.
    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    /// Location of the persisted bundle this entry point was loaded from.
    pub fn bundle_path(&self) -> &Path {
        self.bundle.path()
    }
}

impl LiveInstance {
    fn new(
        mut store: Store<ActivationContext>,
        pre: &InstancePre<ActivationContext>,
        name: &str,
    ) -> wasmtime::Result<Self> {
        let instance = pre.instantiate(&mut store)?;

        if let Some(init) = instance.get_func(&mut store, INITIALIZE_EXPORT) {
            init.typed::<(), ()>(&store)?.call(&mut store, ())?;
        }

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| wasmtime::Error::msg("guest memory export not found"))?;
        let alloc = instance.get_typed_func::<i32, i32>(&mut store, ALLOC_EXPORT)?;
        let entry = instance.get_typed_func::<(i32, i32, i32, i32), i64>(&mut store, name)?;

        Ok(Self {
            store,
            memory,
            alloc,
            entry,
        })
    }

    fn call(&mut self, input: &JsonMap, context: &JsonMap) -> Result<Option<JsonMap>, EntryPointError> {
        let (input_ptr, input_len) = self.write_json(input)?;
        let (context_ptr, context_len) = self.write_json(context)?;

        let result = self
            .entry
            .call(&mut self.store, (input_ptr, input_len, context_ptr, context_len));

        // An explicit failure takes precedence over whatever the call returned.
        if let Some(message) = self.store.data_mut().take_failure() {
            return Err(EntryPointError::failed(message));
        }

        let packed = result.map_err(|e| trap_error(&e))?;
        let Some((ptr, len)) = unpack_result(packed) else {
            return Ok(None);
        };

        let output = guest_slice(self.memory.data(&self.store), ptr, len).ok_or_else(|| {
            EntryPointError::invalid_output(format!(
                "result ({ptr}, {len}) is outside guest memory"
            ))
        })?;

        parse_output(output)
    }

    /// Copy a JSON mapping into guest memory, returning `(ptr, len)`.
    #[allow(clippy::cast_sign_loss)]
    fn write_json(&mut self, value: &JsonMap) -> Result<(i32, i32), EntryPointError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| EntryPointError::trap(format!("failed to serialize argument: {e}")))?;
        let len = i32::try_from(bytes.len())
            .map_err(|_| EntryPointError::trap("argument does not fit in guest memory"))?;

        let ptr = self
            .alloc
            .call(&mut self.store, len)
            .map_err(|e| trap_error(&e))?;

        self.memory
            .write(&mut self.store, ptr as u32 as usize, &bytes)
            .map_err(|_| {
                EntryPointError::trap(format!(
                    "alloc({len}) returned {ptr}, which is outside guest memory"
                ))
            })?;

        Ok((ptr, len))
    }
}

impl EntryPoint for WasmEntryPoint {
    #[instrument(skip_all, fields(entry_point = %self.name))]
    fn invoke(
        &self,
        input: &JsonMap,
        context: &JsonMap,
    ) -> Result<Option<JsonMap>, EntryPointError> {
        let activation_id = current_activation()
            .map_or_else(|| Uuid::new_v4().to_string(), |a| a.id().to_string());

        let start = Instant::now();
        let mut live = self.live.lock();
        live.store.data_mut().begin(activation_id);

        let result = live.call(input, context);

        debug!(
            activation_id = %live.store.data().activation_id,
            duration_ms = start.elapsed().as_millis(),
            log_count = live.store.data().logs.len(),
            "Guest invocation finished"
        );

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for WasmEntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEntryPoint")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("bundle", &self.bundle.path())
            .finish_non_exhaustive()
    }
}

/// The `len` bytes at `ptr`, if they lie entirely inside `memory`.
fn guest_slice(memory: &[u8], ptr: u32, len: u32) -> Option<&[u8]> {
    let start = usize::try_from(ptr).ok()?;
    let end = start.checked_add(usize::try_from(len).ok()?)?;
    memory.get(start..end)
}

/// Interpret the JSON returned by the guest.
fn parse_output(bytes: &[u8]) -> Result<Option<JsonMap>, EntryPointError> {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Null) => Ok(None),
        Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(EntryPointError::invalid_output(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(EntryPointError::invalid_output(format!(
            "output is not valid JSON: {e}"
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn trap_error(error: &wasmtime::Error) -> EntryPointError {
    let message = describe_error(error);
    warn!(error = %message, "Guest trapped");
    EntryPointError::trap(message)
}

/// Extract a human-readable description, preferring the trap code.
fn describe_error(error: &wasmtime::Error) -> String {
    match error.downcast_ref::<Trap>() {
        Some(trap) => trap.to_string(),
        None => format!("{error:#}"),
    }
}
