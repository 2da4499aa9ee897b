//! Host function registration for Wasmtime linkers.
//!
//! This module provides functions to register host functions on Wasmtime
//! linkers, enabling loaded bundles to call into the host runtime.

use action_runtime_common::RuntimeError;
use action_runtime_core::{ActivationContext, WasmEngine};
use tracing::warn;
use wasmtime::{Caller, Linker};
use wasmtime_wasi::preview1;

use crate::failure::{FailureHost, INVALID_MESSAGE};
use crate::logging::{LoggingHost, level_from_i32};

/// Create a linker with every host function registered.
///
/// # Errors
///
/// Returns an error if function registration fails.
pub fn create_linker(engine: &WasmEngine) -> Result<Linker<ActivationContext>, RuntimeError> {
    let mut linker = Linker::new(engine.inner());
    register_all(&mut linker)?;
    Ok(linker)
}

/// Register all standard host functions on a core module linker.
///
/// This registers the following imports:
/// - `env::log` - Logging function for guest code
/// - `env::fail` - Explicit failure signal
/// - `wasi_snapshot_preview1::*` - WASI preview1
///
/// # Errors
///
/// Returns an error if function registration fails.
pub fn register_all(linker: &mut Linker<ActivationContext>) -> Result<(), RuntimeError> {
    register_logging(linker)?;
    register_failure(linker)?;
    register_wasi(linker)?;
    Ok(())
}

/// Register the logging host function.
///
/// Registers `env::log(level: i32, ptr: i32, len: i32)` which allows guest
/// code to emit logs at various levels (debug, info, warn, error).
///
/// # Memory Protocol
///
/// The guest passes:
/// - `level`: Log level (0=debug, 1=info, 2=warn, 3=error)
/// - `ptr`: Pointer to the message string in guest memory
/// - `len`: Length of the message in bytes (UTF-8)
///
/// Messages outside guest memory are dropped with a warning.
pub fn register_logging(linker: &mut Linker<ActivationContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            "env",
            "log",
            |mut caller: Caller<'_, ActivationContext>, level: i32, ptr: i32, len: i32| {
                let Some(message) = read_guest_str(&mut caller, ptr, len) else {
                    return;
                };
                LoggingHost::log(caller.data_mut(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| {
            RuntimeError::engine_setup(format!("Failed to register log function: {e}"))
        })?;

    Ok(())
}

/// Register the failure host function.
///
/// Registers `env::fail(ptr: i32, len: i32)`. The UTF-8 message at `ptr`
/// becomes the invocation's error; an unreadable message is reported as
/// `<invalid guest memory>` so the failure itself is never lost.
pub fn register_failure(linker: &mut Linker<ActivationContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            "env",
            "fail",
            |mut caller: Caller<'_, ActivationContext>, ptr: i32, len: i32| {
                let message = read_guest_str(&mut caller, ptr, len)
                    .unwrap_or_else(|| INVALID_MESSAGE.to_string());
                FailureHost::fail(caller.data_mut(), &message);
            },
        )
        .map_err(|e| {
            RuntimeError::engine_setup(format!("Failed to register fail function: {e}"))
        })?;

    Ok(())
}

/// Register WASI preview1, with the standard streams inherited from the host.
pub fn register_wasi(linker: &mut Linker<ActivationContext>) -> Result<(), RuntimeError> {
    preview1::add_to_linker_sync(linker, ActivationContext::wasi_mut)
        .map_err(|e| RuntimeError::engine_setup(format!("Failed to register WASI: {e}")))
}

/// Read a UTF-8 string out of the caller's exported memory.
///
/// Returns `None`, after logging why, if the range is invalid.
#[allow(clippy::cast_sign_loss)]
fn read_guest_str(caller: &mut Caller<'_, ActivationContext>, ptr: i32, len: i32) -> Option<String> {
    if ptr < 0 || len < 0 {
        warn!(ptr, len, "Invalid pointer or length (negative value)");
        return None;
    }

    let Some(memory) = caller
        .get_export("memory")
        .and_then(wasmtime::Extern::into_memory)
    else {
        warn!("Memory export not found in guest module");
        return None;
    };

    let data = memory.data(&*caller);
    let start = ptr as usize;
    let Some(end) = start.checked_add(len as usize) else {
        warn!(ptr, len, "Pointer + length overflow");
        return None;
    };

    if end > data.len() {
        warn!(
            start,
            end,
            memory_size = data.len(),
            "Memory access out of bounds"
        );
        return None;
    }

    Some(String::from_utf8_lossy(&data[start..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_runtime_common::EngineConfig;
    use tokio_test::{assert_err, assert_ok};

    fn engine() -> WasmEngine {
        WasmEngine::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_register_logging() {
        let engine = engine();
        let mut linker = Linker::new(engine.inner());

        assert_ok!(register_logging(&mut linker));
    }

    #[test]
    fn test_register_failure() {
        let engine = engine();
        let mut linker = Linker::new(engine.inner());

        assert_ok!(register_failure(&mut linker));
    }

    #[test]
    fn test_register_all() {
        let engine = engine();
        let mut linker = Linker::new(engine.inner());

        assert_ok!(register_all(&mut linker));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let engine = engine();
        let mut linker = create_linker(&engine).unwrap();

        let err = assert_err!(register_logging(&mut linker));
        assert!(matches!(err, RuntimeError::EngineSetup { .. }));
    }
}
