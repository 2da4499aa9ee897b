//! HTTP responses for the action contract.
//!
//! Every failure is answered with status 502 and a single-field
//! `{"error": "<message>"}` body; success is either the plain `OK`
//! acknowledgement of `/init` or the JSON output of `/run`.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

use action_runtime_common::{ActionError, JsonMap};

/// Status code of every failed `/init` or `/run`.
pub const FAILURE_STATUS: u16 = 502;

/// Response of an action endpoint.
#[derive(Debug, Clone)]
pub struct ActionResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as key-value pairs
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl ActionResponse {
    /// Create a simple text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create an error response with JSON body.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message
        })
        .to_string();
        Self::json(status, &body)
    }

    /// The acknowledgement of a successful `/init`.
    pub fn ok() -> Self {
        Self::text(200, "OK")
    }

    /// The output of a successful `/run`.
    pub fn output(output: &JsonMap) -> Self {
        match serde_json::to_string(output) {
            Ok(body) => Self::json(200, &body),
            Err(e) => Self::error(
                FAILURE_STATUS,
                &format!("Failed to serialize the action result: {e}"),
            ),
        }
    }

    /// The uniform failure envelope for `error`.
    pub fn failure(error: &ActionError) -> Self {
        Self::error(FAILURE_STATUS, &error.client_message())
    }

    /// Convert to Axum response.
    pub fn into_axum_response(self) -> Response<Body> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);

        let mut response = Response::builder().status(status);

        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response = response.header(name, value);
            }
        }

        response.body(Body::from(self.body)).unwrap_or_else(|_| {
            let mut fallback = Response::new(Body::from("Internal server error"));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

impl axum::response::IntoResponse for ActionResponse {
    fn into_response(self) -> axum::response::Response {
        self.into_axum_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_runtime_common::{EntryPointError, StructuralError};

    fn body_json(resp: &ActionResponse) -> serde_json::Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn test_ok_response() {
        let resp = ActionResponse::ok();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"OK");
    }

    #[test]
    fn test_output_response() {
        let mut output = JsonMap::new();
        output.insert("z".into(), serde_json::json!(1));
        output.insert("a".into(), serde_json::json!({"nested": [true, null]}));

        let resp = ActionResponse::output(&output);
        assert_eq!(resp.status, 200);
        // Key order is preserved.
        assert_eq!(resp.body, br#"{"z":1,"a":{"nested":[true,null]}}"#);
        assert_eq!(
            resp.headers[0],
            ("content-type".to_string(), "application/json".to_string())
        );
    }

    #[test]
    fn test_lifecycle_failures_are_verbatim() {
        let resp = ActionResponse::failure(&ActionError::AlreadyInitialized);
        assert_eq!(resp.status, 502);
        assert_eq!(
            body_json(&resp),
            serde_json::json!({"error": "Cannot initialize the action more than once."})
        );

        let resp = ActionResponse::failure(&ActionError::NotInitialized);
        assert_eq!(
            body_json(&resp),
            serde_json::json!({"error": "Cannot invoke an uninitialized action."})
        );
    }

    #[test]
    fn test_failure_envelope_has_single_field() {
        let resp = ActionResponse::failure(&EntryPointError::failed("bad input").into());
        let body = body_json(&resp);
        let object = body.as_object().unwrap();

        assert_eq!(object.len(), 1);
        assert_eq!(
            object["error"],
            "An error has occurred (see logs for details): Action failed: bad input"
        );

        let resp = ActionResponse::failure(&StructuralError::NotAnObject.into());
        assert_eq!(resp.status, 502);
    }

    #[test]
    fn test_into_axum_response() {
        let resp = ActionResponse::failure(&ActionError::NotInitialized);
        let axum_resp = resp.into_axum_response();
        assert_eq!(axum_resp.status(), StatusCode::BAD_GATEWAY);
    }
}
