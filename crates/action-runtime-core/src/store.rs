//! Per-invocation store state.
//!
//! This module provides:
//! - [`ActivationContext`]: State of one guest instance, reachable from host functions
//! - [`LogEntry`] and [`LogLevel`]: Log lines emitted by guest code
//! - [`create_store`]: The store a loaded bundle lives in

use std::time::Instant;

use wasmtime::Store;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;

/// State owned by the store of the loaded guest instance.
///
/// The store outlives individual activations. [`ActivationContext::begin`]
/// resets the per-activation parts (id, logs, failure) before each call.
///
/// Host functions access it through [`wasmtime::Caller::data_mut`].
pub struct ActivationContext {
    /// WASI preview1 context; stdout and stderr are inherited from the host.
    wasi: WasiP1Ctx,

    /// Activation identifier used to tag guest logs.
    pub activation_id: String,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// Failure message reported by the guest through `env.fail`.
    failure: Option<String>,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level (debug, info, warn, error).
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl ActivationContext {
    /// Create a new context for the given activation.
    pub fn new(activation_id: impl Into<String>) -> Self {
        let wasi = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build_p1();

        Self {
            wasi,
            activation_id: activation_id.into(),
            logs: Vec::new(),
            failure: None,
        }
    }

    /// Start a new activation: retag, and drop the previous one's logs and failure.
    pub fn begin(&mut self, activation_id: impl Into<String>) {
        self.activation_id = activation_id.into();
        self.logs.clear();
        self.failure = None;
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
    }

    /// Record that the guest signaled failure. The first message wins.
    pub fn fail(&mut self, message: String) {
        self.failure.get_or_insert(message);
    }

    /// The failure message reported by the guest, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Take the failure message, leaving none behind.
    pub fn take_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    /// The WASI context, for linking preview1 imports.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }
}

impl std::fmt::Debug for ActivationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationContext")
            .field("activation_id", &self.activation_id)
            .field("logs", &self.logs.len())
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

/// Create a new Wasmtime store tagged with `activation_id`.
pub fn create_store(engine: &WasmEngine, activation_id: impl Into<String>) -> Store<ActivationContext> {
    Store::new(engine.inner(), ActivationContext::new(activation_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_runtime_common::EngineConfig;

    #[test]
    fn test_activation_context_creation() {
        let ctx = ActivationContext::new("activation-123");

        assert_eq!(ctx.activation_id, "activation-123");
        assert!(ctx.logs.is_empty());
        assert!(ctx.failure().is_none());
    }

    #[test]
    fn test_activation_context_logging() {
        let mut ctx = ActivationContext::new("test");

        ctx.log(LogLevel::Info, "Hello".into());
        ctx.log(LogLevel::Error, "World".into());

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].level, LogLevel::Info);
        assert_eq!(ctx.logs[0].message, "Hello");
        assert_eq!(ctx.logs[1].level, LogLevel::Error);
    }

    #[test]
    fn test_first_failure_wins() {
        let mut ctx = ActivationContext::new("test");

        ctx.fail("first".into());
        ctx.fail("second".into());

        assert_eq!(ctx.failure(), Some("first"));
        assert_eq!(ctx.take_failure().as_deref(), Some("first"));
        assert!(ctx.failure().is_none());
    }

    #[test]
    fn test_begin_resets_activation_state() {
        let mut ctx = ActivationContext::new("load");
        ctx.log(LogLevel::Warn, "from the previous call".into());
        ctx.fail("previous failure".into());

        ctx.begin("activation-2");

        assert_eq!(ctx.activation_id, "activation-2");
        assert!(ctx.logs.is_empty());
        assert!(ctx.failure().is_none());
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_store_creation() {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();

        let store = create_store(&engine, "test-123");
        assert_eq!(store.data().activation_id, "test-123");
    }
}
