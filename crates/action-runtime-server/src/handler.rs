//! Request handlers for `/init` and `/run`.
//!
//! Both handlers recover every failure at this boundary: the full error is
//! logged, an activation end marker is written, and the caller receives the
//! uniform `{"error": ...}` envelope with status 502. Loading and guest
//! execution are CPU-bound and run on the blocking thread pool.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use tracing::{error, info, instrument};

use action_runtime_common::{ActionError, JsonMap};

use crate::markers::ActivationMarker;
use crate::request::{InitRequest, RunRequest};
use crate::response::ActionResponse;
use crate::state::AppState;

/// Handle `POST /init`.
///
/// The activation end marker is written only when initialization fails.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn handle_init(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();

    match initialize(&state, &body).await {
        Ok(entry_point) => {
            info!(
                entry_point = %entry_point,
                duration_ms = start.elapsed().as_millis(),
                "Action initialized"
            );
            ActionResponse::ok().into_axum_response()
        }
        Err(e) => {
            error!(error = %e, detail = ?e, "Initialization failed");
            state.markers().write_end_marker();
            ActionResponse::failure(&e).into_axum_response()
        }
    }
}

/// Handle `POST /run`.
///
/// The activation end marker is written on every completion. If the request
/// is dropped while the entry point runs, the marker follows once the entry
/// point returns.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn handle_run(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    let mut marker = Some(state.activation_marker());

    let response = match run(&state, &body, &mut marker).await {
        Ok(output) => {
            info!(
                duration_ms = start.elapsed().as_millis(),
                output_keys = output.len(),
                "Action completed"
            );
            ActionResponse::output(&output)
        }
        Err(e) => {
            error!(
                error = %e,
                detail = ?e,
                duration_ms = start.elapsed().as_millis(),
                "Action failed"
            );
            ActionResponse::failure(&e)
        }
    };

    drop(marker);
    response.into_axum_response()
}

/// Validate an `/init` body and load it into the slot.
///
/// Returns the name of the loaded entry point.
async fn initialize(state: &AppState, body: &[u8]) -> Result<String, ActionError> {
    // Fast path; `try_load` checks again under the slot lock.
    if state.slot().is_loaded() {
        return Err(ActionError::AlreadyInitialized);
    }

    let request = InitRequest::parse(body)?;

    let slot = Arc::clone(state.slot());
    let loader = Arc::clone(state.loader());
    let entry_point = tokio::task::spawn_blocking(move || {
        slot.try_load(|| loader.load(&request.code, &request.main))
    })
    .await
    .map_err(|e| ActionError::worker(e.to_string()))??;

    Ok(entry_point.name().to_string())
}

/// Validate a `/run` body and invoke the loaded entry point with it.
///
/// The marker travels with the blocking task and comes back with its result.
async fn run(
    state: &AppState,
    body: &[u8],
    marker: &mut Option<ActivationMarker>,
) -> Result<JsonMap, ActionError> {
    if !state.slot().is_loaded() {
        return Err(ActionError::NotInitialized);
    }

    let RunRequest { input, context } = RunRequest::parse(body)?;

    let slot = Arc::clone(state.slot());
    let guard = marker.take();
    let (result, guard) =
        tokio::task::spawn_blocking(move || (slot.invoke(&input, &context), guard))
            .await
            .map_err(|e| ActionError::worker(e.to_string()))?;
    *marker = guard;

    result
}
