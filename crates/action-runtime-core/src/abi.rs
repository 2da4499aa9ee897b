//! The guest side of the entry-point contract.
//!
//! A bundle satisfies the contract when it exports:
//! - a linear memory named [`MEMORY_EXPORT`]
//! - an allocator [`ALLOC_EXPORT`] of type `(len: i32) -> ptr: i32`
//! - the entry point itself, of type `(in_ptr, in_len, ctx_ptr, ctx_len: i32) -> i64`
//!
//! The entry point receives the input and context mappings as UTF-8 JSON in
//! guest memory and returns a packed `(ptr << 32) | len` pointing at its JSON
//! output. A packed value of `0` means "no result".

use wasmtime::{ExternType, FuncType, ValType};

use action_runtime_common::LoadError;

use crate::CompiledModule;

/// Name of the exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

/// Name of the exported allocator.
pub const ALLOC_EXPORT: &str = "alloc";

/// Optional reactor initializer, run once per instance before the entry point.
pub const INITIALIZE_EXPORT: &str = "_initialize";

/// Check that `module` exports `entry_point` with the expected shape.
///
/// # Errors
///
/// Returns [`LoadError::MissingEntryPoint`] if there is no export of that
/// name and [`LoadError::WrongShape`] if any part of the contract is violated.
pub fn check_contract(module: &CompiledModule, entry_point: &str) -> Result<(), LoadError> {
    let Some(export) = module.export_type(entry_point) else {
        return Err(LoadError::missing_entry_point(entry_point));
    };

    let ExternType::Func(func) = export else {
        return Err(LoadError::wrong_shape(
            entry_point,
            format!("export is a {}, not a function", extern_kind(&export)),
        ));
    };

    let params = [ValType::I32, ValType::I32, ValType::I32, ValType::I32];
    if !signature_matches(&func, &params, &[ValType::I64]) {
        return Err(LoadError::wrong_shape(
            entry_point,
            format!("expected (i32, i32, i32, i32) -> i64, found {func:?}"),
        ));
    }

    match module.export_type(MEMORY_EXPORT) {
        Some(ExternType::Memory(_)) => {}
        _ => {
            return Err(LoadError::wrong_shape(
                entry_point,
                format!("module does not export a memory named '{MEMORY_EXPORT}'"),
            ));
        }
    }

    match module.export_type(ALLOC_EXPORT) {
        Some(ExternType::Func(alloc))
            if signature_matches(&alloc, &[ValType::I32], &[ValType::I32]) => {}
        _ => {
            return Err(LoadError::wrong_shape(
                entry_point,
                format!("module does not export '{ALLOC_EXPORT}' of type (i32) -> i32"),
            ));
        }
    }

    Ok(())
}

/// Split a packed entry-point result into `(ptr, len)`.
///
/// Returns `None` for the "no result" value `0`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn unpack_result(packed: i64) -> Option<(u32, u32)> {
    if packed == 0 {
        return None;
    }
    let bits = packed as u64;
    Some(((bits >> 32) as u32, (bits & 0xffff_ffff) as u32))
}

/// Pack `(ptr, len)` the way a guest does.
pub fn pack_result(ptr: u32, len: u32) -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let packed = ((u64::from(ptr) << 32) | u64::from(len)) as i64;
    packed
}

fn signature_matches(func: &FuncType, params: &[ValType], results: &[ValType]) -> bool {
    fn same(actual: impl ExactSizeIterator<Item = ValType>, expected: &[ValType]) -> bool {
        actual.len() == expected.len()
            && actual.zip(expected).all(|(a, e)| ValType::eq(&a, e))
    }

    same(func.params(), params) && same(func.results(), results)
}

fn extern_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Global(_) => "global",
        ExternType::Table(_) => "table",
        ExternType::Memory(_) => "memory",
        _ => "function",
    }
}
