//! HTTP router configuration.
//!
//! This module provides functions to build the Axum router with all
//! necessary routes and middleware.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use tower_http::trace::TraceLayer;

use crate::handler::{handle_init, handle_run};
use crate::state::AppState;

/// Build the application router.
///
/// Routes:
/// - `POST /init` - Load the action's code (once)
/// - `POST /run` - Invoke the loaded action
///
/// `max_body_bytes` bounds both bodies; `/init` carries the whole bundle.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/init", post(handle_init))
        .route("/run", post(handle_run))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use action_runtime_common::RuntimeConfig;
    use action_runtime_core::SlotState;

    use crate::markers::CountingMarkers;

    const ECHO: &str = r#"
        (module
            (memory (export "memory") 1)
            (global $bump (mut i32) (i32.const 1024))
            (func (export "alloc") (param $len i32) (result i32)
                (local $ptr i32)
                (local.set $ptr (global.get $bump))
                (global.set $bump (i32.add (global.get $bump) (local.get $len)))
                (local.get $ptr))
            (func (export "echo") (param $in i32) (param $in_len i32) (param i32 i32) (result i64)
                (i64.or
                    (i64.shl (i64.extend_i32_u (local.get $in)) (i64.const 32))
                    (i64.extend_i32_u (local.get $in_len))))
            (func (export "nothing") (param i32 i32 i32 i32) (result i64)
                (i64.const 0))
            (func (export "not_an_entry_point") (result i32)
                (i32.const 0))
        )
    "#;

    struct Harness {
        state: AppState,
        markers: Arc<CountingMarkers>,
    }

    impl Harness {
        fn new() -> Self {
            let markers = Arc::new(CountingMarkers::default());
            let state = AppState::new(&RuntimeConfig::default())
                .unwrap()
                .with_marker_sink(markers.clone());
            Self { state, markers }
        }

        async fn post(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
            let app = build_router(self.state.clone(), 1024 * 1024);
            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(uri)
                        .header("content-type", "application/json")
                        .body(body.into())
                        .unwrap(),
                )
                .await
                .unwrap();

            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, body.to_vec())
        }

        async fn init(&self, main: &str) -> (StatusCode, Vec<u8>) {
            let body = json!({"value": {"main": main, "code": STANDARD.encode(ECHO)}});
            self.post("/init", body.to_string()).await
        }

        async fn run(&self, body: Value) -> (StatusCode, Value) {
            let (status, body) = self.post("/run", body.to_string()).await;
            (status, serde_json::from_slice(&body).unwrap())
        }
    }

    fn error_of(body: &[u8]) -> String {
        let value: Value = serde_json::from_slice(body).unwrap();
        value["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_init_then_run() {
        let harness = Harness::new();

        let (status, body) = harness.init("echo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        assert_eq!(harness.markers.count(), 0);

        let (status, body) = harness
            .run(json!({"value": {"a": 1, "s": "x", "b": false, "n": null}, "namespace": "guest"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"a": 1, "s": "x", "b": false, "n": null}));
        assert_eq!(harness.markers.count(), 1);
    }

    #[tokio::test]
    async fn test_second_init_is_rejected() {
        let harness = Harness::new();
        harness.init("echo").await;
        let first = harness.state.slot().entry_point().unwrap();

        let (status, body) = harness.init("nothing").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error_of(&body), "Cannot initialize the action more than once.");
        assert!(Arc::ptr_eq(&first, &harness.state.slot().entry_point().unwrap()));

        // Any payload, even a malformed one.
        let (status, body) = harness.post("/init", "not json").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error_of(&body), "Cannot initialize the action more than once.");
    }

    #[tokio::test]
    async fn test_run_before_init() {
        let harness = Harness::new();

        let (status, body) = harness.run(json!({"value": {"a": 1}})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"error": "Cannot invoke an uninitialized action."}));
        assert_eq!(harness.markers.count(), 1);
        assert_eq!(harness.state.slot().state(), SlotState::Empty);
    }

    #[tokio::test]
    async fn test_init_structural_errors() {
        let harness = Harness::new();

        for body in [
            json!({}),
            json!({"value": []}),
            json!({"value": {"code": "AAAA"}}),
            json!({"value": {"main": "echo"}}),
            json!({"value": {"main": 7, "code": "AAAA"}}),
        ] {
            let (status, response) = harness.post("/init", body.to_string()).await;
            assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
            assert!(
                error_of(&response).starts_with("An error has occurred (see logs for details): "),
                "{body}"
            );
        }

        assert_eq!(harness.state.slot().state(), SlotState::Empty);
        assert_eq!(harness.markers.count(), 5);
    }

    #[tokio::test]
    async fn test_init_loader_failure_then_corrective_init() {
        let harness = Harness::new();

        let (status, body) = harness.init("not_an_entry_point").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(error_of(&body).contains("wrong shape"));
        assert_eq!(harness.state.slot().state(), SlotState::Empty);

        let (status, _) = harness.init("echo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(harness.state.slot().state(), SlotState::Loaded);
        assert_eq!(harness.markers.count(), 1);
    }

    #[tokio::test]
    async fn test_run_structural_errors_leave_slot_loaded() {
        let harness = Harness::new();
        harness.init("echo").await;

        for body in [
            json!({"value": [1, 2]}),
            json!({"value": "text"}),
            json!({"namespace": "guest"}),
            json!([{"value": {}}]),
        ] {
            let (status, response) = harness.run(body.clone()).await;
            assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
            assert_eq!(response.as_object().unwrap().len(), 1);
        }

        assert_eq!(harness.state.slot().state(), SlotState::Loaded);
        assert_eq!(harness.markers.count(), 4);

        let (status, _) = harness.run(json!({"value": {"ok": true}})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(harness.markers.count(), 5);
    }

    #[tokio::test]
    async fn test_run_no_result() {
        let harness = Harness::new();
        harness.init("nothing").await;

        let (status, body) = harness.run(json!({"value": {}})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({"error": "An error has occurred (see logs for details): The action returned null"})
        );
        assert_eq!(harness.markers.count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_run_still_writes_one_marker() {
        use std::sync::Mutex;
        use std::sync::mpsc;
        use std::time::Duration;

        use action_runtime_common::{EntryPointError, JsonMap};

        let harness = Harness::new();
        let (release, released) = mpsc::channel::<()>();
        let released = Mutex::new(released);
        harness
            .state
            .slot()
            .try_load(move || {
                Ok(
                    move |input: &JsonMap, _: &JsonMap| -> Result<Option<JsonMap>, EntryPointError> {
                        let _ = released
                            .lock()
                            .unwrap()
                            .recv_timeout(Duration::from_secs(5));
                        Ok(Some(input.clone()))
                    },
                )
            })
            .unwrap();

        // The client gives up while the entry point is still blocked.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            harness.run(json!({"value": {"a": 1}})),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(harness.markers.count(), 0);

        release.send(()).unwrap();
        for _ in 0..500 {
            if harness.markers.count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(harness.markers.count(), 1);

        // The next activation is unaffected.
        release.send(()).unwrap();
        let (status, body) = harness.run(json!({"value": {"b": 2}})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"b": 2}));
        assert_eq!(harness.markers.count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let harness = Harness::new();
        let (status, _) = harness.post("/health", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(harness.markers.count(), 0);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let harness = Harness::new();
        let app = build_router(harness.state.clone(), 16);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/init")
                    .body(Body::from(vec![b' '; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(harness.state.slot().state(), SlotState::Empty);
    }
}
