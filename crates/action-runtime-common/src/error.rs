//! Error types for the action-runtime.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`ActionError`]: Every failure a `/init` or `/run` request can produce
//! - [`StructuralError`]: Missing or malformed fields in a request body
//! - [`LoadError`]: Failures while turning a bundle into an entry point
//! - [`EntryPointError`]: Failures raised by (or about) the loaded code
//! - [`RuntimeError`]: Process-level startup failures

use std::io;

use thiserror::Error;

/// Prefix of every error message that is not a lifecycle violation.
const DETAILS_IN_LOGS: &str = "An error has occurred (see logs for details)";

/// Failures of a single `/init` or `/run` request.
///
/// All of these are recovered at the handler boundary and turned into a
/// uniform `{"error": ...}` envelope.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The request body does not have the required shape.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// `/init` was called after a successful initialization.
    #[error("Cannot initialize the action more than once.")]
    AlreadyInitialized,

    /// `/run` was called before a successful initialization.
    #[error("Cannot invoke an uninitialized action.")]
    NotInitialized,

    /// The bundle could not be turned into an entry point.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The entry point failed or returned no result.
    #[error(transparent)]
    EntryPoint(#[from] EntryPointError),

    /// The worker thread running the request did not report back.
    #[error("Worker failed: {reason}")]
    Worker {
        /// Description of the worker failure.
        reason: String,
    },
}

impl ActionError {
    /// Create a new `Worker` error.
    pub fn worker(reason: impl Into<String>) -> Self {
        Self::Worker {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is an initialize-once/run-many violation.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::AlreadyInitialized | Self::NotInitialized)
    }

    /// The message placed in the `error` field of the response envelope.
    ///
    /// Lifecycle violations are reported verbatim; everything else is
    /// summarized, with the full diagnostic going to the logs.
    pub fn client_message(&self) -> String {
        if self.is_lifecycle() {
            self.to_string()
        } else {
            format!("{DETAILS_IN_LOGS}: {self}")
        }
    }
}

/// Missing or malformed fields in a request body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// The body is not valid JSON.
    #[error("Request body is not valid JSON: {reason}")]
    InvalidJson {
        /// Parser error description.
        reason: String,
    },

    /// The body is valid JSON but not an object.
    #[error("Request body must be a JSON object")]
    NotAnObject,

    /// A required property is absent.
    #[error("No {field} property in input JSON object.")]
    MissingField {
        /// Path of the missing property (e.g. `value.main`).
        field: &'static str,
    },

    /// `value.main` or `value.code` is absent from an initialize request.
    #[error(
        "No {field} property in input JSON object. Runtime would not be able to execute provided action."
    )]
    NotExecutable {
        /// Name of the missing property inside `value`.
        field: &'static str,
    },

    /// A required property has the wrong JSON type.
    #[error("Property {field} must be {expected}")]
    WrongType {
        /// Path of the offending property.
        field: &'static str,
        /// Expected JSON type, e.g. "a string".
        expected: &'static str,
    },
}

impl StructuralError {
    /// Create a new `InvalidJson` error.
    pub fn invalid_json(reason: impl Into<String>) -> Self {
        Self::InvalidJson {
            reason: reason.into(),
        }
    }
}

/// Failures while decoding, persisting, resolving, or instantiating a bundle.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The bundle is not valid base64 (or decodes to nothing).
    #[error("Bundle is not valid base64: {reason}")]
    BadEncoding {
        /// Decoder error description.
        reason: String,
    },

    /// The decoded bundle could not be written to transient storage.
    #[error("Failed to persist bundle: {0}")]
    Persist(#[from] io::Error),

    /// The decoded bytes are not a loadable module.
    #[error("Invalid bundle: {reason}")]
    InvalidBundle {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The bundle does not export the requested entry point.
    #[error("Entry point '{name}' not found in bundle")]
    MissingEntryPoint {
        /// The requested entry point identifier.
        name: String,
    },

    /// The entry point exists but does not satisfy the invocation contract.
    #[error("Entry point '{name}' has the wrong shape: {reason}")]
    WrongShape {
        /// The requested entry point identifier.
        name: String,
        /// What part of the contract is violated.
        reason: String,
    },

    /// Linking or running the module's initialization failed.
    #[error("Instantiation failed: {reason}")]
    Instantiation {
        /// Description of the instantiation failure.
        reason: String,
    },
}

impl LoadError {
    /// Create a new `BadEncoding` error.
    pub fn bad_encoding(reason: impl Into<String>) -> Self {
        Self::BadEncoding {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidBundle` error.
    pub fn invalid_bundle(reason: impl Into<String>) -> Self {
        Self::InvalidBundle {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingEntryPoint` error.
    pub fn missing_entry_point(name: impl Into<String>) -> Self {
        Self::MissingEntryPoint { name: name.into() }
    }

    /// Create a new `WrongShape` error.
    pub fn wrong_shape(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WrongShape {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }
}

/// Failures raised by, or about, the loaded entry point during an invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryPointError {
    /// The entry point explicitly signaled failure.
    #[error("Action failed: {message}")]
    Failed {
        /// Message supplied by the entry point.
        message: String,
    },

    /// The loaded code trapped.
    #[error("Action trapped: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// The entry point returned no result.
    #[error("The action returned null")]
    NoResult,

    /// The entry point returned something that is not a JSON object.
    #[error("The action returned an invalid result: {reason}")]
    InvalidOutput {
        /// What is wrong with the returned value.
        reason: String,
    },

    /// The entry point panicked.
    #[error("The action panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl EntryPointError {
    /// Create a new `Failed` error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidOutput` error.
    pub fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            reason: reason.into(),
        }
    }
}

/// Process-level errors raised while starting the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// The WebAssembly engine or host linker could not be set up.
    #[error("Engine setup failed: {reason}")]
    EngineSetup {
        /// Description of the failure.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `EngineSetup` error.
    pub fn engine_setup(reason: impl Into<String>) -> Self {
        Self::EngineSetup {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_messages_are_verbatim() {
        assert_eq!(
            ActionError::AlreadyInitialized.client_message(),
            "Cannot initialize the action more than once."
        );
        assert_eq!(
            ActionError::NotInitialized.client_message(),
            "Cannot invoke an uninitialized action."
        );
    }

    #[test]
    fn test_other_messages_are_summarized() {
        let err: ActionError = EntryPointError::NoResult.into();
        assert_eq!(
            err.client_message(),
            "An error has occurred (see logs for details): The action returned null"
        );

        let err: ActionError = StructuralError::MissingField { field: "value" }.into();
        assert_eq!(
            err.client_message(),
            "An error has occurred (see logs for details): No value property in input JSON object."
        );
    }

    #[test]
    fn test_error_from_load_error() {
        let err: ActionError = LoadError::missing_entry_point("com.example.Main").into();
        assert!(matches!(err, ActionError::Load(LoadError::MissingEntryPoint { .. })));
        assert_eq!(
            err.to_string(),
            "Entry point 'com.example.Main' not found in bundle"
        );
    }

    #[test]
    fn test_is_lifecycle() {
        assert!(ActionError::NotInitialized.is_lifecycle());
        assert!(ActionError::AlreadyInitialized.is_lifecycle());
        assert!(!ActionError::from(StructuralError::NotAnObject).is_lifecycle());
        assert!(!ActionError::worker("join").is_lifecycle());
    }

    #[test]
    fn test_not_executable_message() {
        let err = StructuralError::NotExecutable { field: "main" };
        assert_eq!(
            err.to_string(),
            "No main property in input JSON object. Runtime would not be able to execute provided action."
        );
    }

    #[test]
    fn test_no_result_is_distinct_from_failure() {
        assert_ne!(EntryPointError::NoResult, EntryPointError::failed("null"));
        assert_eq!(
            EntryPointError::failed("bad input").to_string(),
            "Action failed: bad input"
        );
    }
}
