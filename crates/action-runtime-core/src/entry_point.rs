//! The capability every loaded unit of user code provides.

use action_runtime_common::{EntryPointError, JsonMap};

/// A callable unit of user code.
///
/// An entry point accepts the primary input mapping and an auxiliary context
/// mapping and returns an output mapping. `Ok(None)` means the entry point
/// produced no result; callers treat that as a failure distinct from an
/// explicit [`EntryPointError`].
///
/// Implemented by [`crate::WasmEntryPoint`] for loaded bundles and by any
/// matching closure, which is how native entry points are embedded:
///
/// ```ignore
/// let echo = |input: &JsonMap, _context: &JsonMap| Ok(Some(input.clone()));
/// slot.try_load(|| Ok(echo))?;
/// ```
pub trait EntryPoint: Send + Sync {
    /// Run the entry point once.
    fn invoke(&self, input: &JsonMap, context: &JsonMap)
    -> Result<Option<JsonMap>, EntryPointError>;

    /// Identifier the entry point was resolved by.
    fn name(&self) -> &str {
        "native"
    }
}

impl std::fmt::Debug for dyn EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntryPoint").field(&self.name()).finish()
    }
}

impl<F> EntryPoint for F
where
    F: Fn(&JsonMap, &JsonMap) -> Result<Option<JsonMap>, EntryPointError> + Send + Sync,
{
    fn invoke(
        &self,
        input: &JsonMap,
        context: &JsonMap,
    ) -> Result<Option<JsonMap>, EntryPointError> {
        self(input, context)
    }
}
