//! Execution slot, code loader, and Wasmtime entry points for action-runtime.
//!
//! This crate provides the core of the initialize-once/run-many lifecycle:
//! - [`ExecutionSlot`]: Process-wide holder of at most one loaded entry point
//! - [`CodeLoader`]: Decodes, persists, compiles, and validates a bundle
//! - [`EntryPoint`]: The capability every loaded unit of user code provides
//! - [`WasmEntryPoint`]: An entry point backed by a WebAssembly module
//! - [`ActivationScope`]: Marks the activation running on the current thread
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ExecutionSlot                       │
//! │  (Process-wide, Empty -> Loaded exactly once)           │
//! │  - try_load: check-and-set under a mutex                │
//! │  - invoke:   lock-free read, ActivationScope per call   │
//! └─────────────────────────────────────────────────────────┘
//!              │ first /init                 │ every /run
//!              ▼                             ▼
//! ┌───────────────────────────┐ ┌───────────────────────────┐
//! │        CodeLoader         │ │      WasmEntryPoint       │
//! │  base64 -> file -> Module │ │  InstancePre + bundle     │
//! │  contract check           │ │  fresh Store per call     │
//! └───────────────────────────┘ └───────────────────────────┘
//! ```

pub mod abi;
pub mod bundle;
pub mod engine;
pub mod entry_point;
pub mod instance;
pub mod loader;
pub mod module;
pub mod scope;
pub mod slot;
pub mod store;

pub use engine::WasmEngine;
pub use entry_point::EntryPoint;
pub use instance::WasmEntryPoint;
pub use loader::CodeLoader;
pub use module::CompiledModule;
pub use scope::{Activation, ActivationScope, current_activation};
pub use slot::{ExecutionSlot, SlotState};
pub use store::{ActivationContext, LogEntry, LogLevel};
