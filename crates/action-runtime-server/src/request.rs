//! Request body parsing for `/init` and `/run`.
//!
//! Bodies are parsed into [`serde_json::Value`] first and then checked field
//! by field, so every structural problem maps to a specific
//! [`StructuralError`] instead of a generic deserialization failure.

use serde_json::Value;

use action_runtime_common::{JsonMap, StructuralError};

/// A parsed `/init` request: `{"value": {"main": ..., "code": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRequest {
    /// Entry-point identifier.
    pub main: String,
    /// Base64-encoded bundle.
    pub code: String,
}

impl InitRequest {
    /// Parse an `/init` body.
    pub fn parse(body: &[u8]) -> Result<Self, StructuralError> {
        let mut request = parse_object(body)?;
        let mut value = take_value(&mut request)?;

        let main = take_string(&mut value, "main", "value.main")?;
        let code = take_string(&mut value, "code", "value.code")?;

        Ok(Self { main, code })
    }
}

/// A parsed `/run` request.
///
/// `value` becomes the primary input; every other top-level key is part of
/// the invocation context.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// The primary input mapping.
    pub input: JsonMap,
    /// The rest of the request body.
    pub context: JsonMap,
}

impl RunRequest {
    /// Parse a `/run` body.
    pub fn parse(body: &[u8]) -> Result<Self, StructuralError> {
        let mut context = parse_object(body)?;
        let input = take_value(&mut context)?;
        Ok(Self { input, context })
    }
}

fn parse_object(body: &[u8]) -> Result<JsonMap, StructuralError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StructuralError::NotAnObject),
        Err(e) => Err(StructuralError::invalid_json(e.to_string())),
    }
}

/// Remove and return the `value` object.
fn take_value(request: &mut JsonMap) -> Result<JsonMap, StructuralError> {
    match request.remove("value") {
        Some(Value::Object(value)) => Ok(value),
        Some(_) => Err(StructuralError::WrongType {
            field: "value",
            expected: "an object",
        }),
        None => Err(StructuralError::MissingField { field: "value" }),
    }
}

fn take_string(
    value: &mut JsonMap,
    key: &'static str,
    path: &'static str,
) -> Result<String, StructuralError> {
    match value.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(StructuralError::WrongType {
            field: path,
            expected: "a string",
        }),
        None => Err(StructuralError::NotExecutable { field: key }),
    }
}
