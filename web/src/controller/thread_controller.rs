use crate::controller::ApiResponse;
use crate::params::thread::ThreadStats;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;

use log::*;

/// POST queue an event on a thread
#[utoipa::path(
    post,
    path = "/threads/{thread_id}/events",
    params(
        ("thread_id" = String, Path, description = "Thread to post to")
    ),
    request_body(content = String, description = "Opaque event payload", content_type = "application/octet-stream"),
    responses(
        (status = 202, description = "Event queued for delivery")
    )
)]
pub async fn post_event(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
    payload: Bytes,
) -> Result<impl IntoResponse, Error> {
    debug!("POST event on thread {thread_id} ({} bytes)", payload.len());

    app_state.registry().post(&thread_id, payload);

    Ok(StatusCode::ACCEPTED)
}

/// GET delivery state of a thread
#[utoipa::path(
    get,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread to inspect")
    ),
    responses(
        (status = 200, description = "Successfully retrieved the thread's delivery state", body = ThreadStats),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn read(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET thread {thread_id}");

    let response = match app_state.registry().stats(&thread_id) {
        Some(stats) => {
            let stats = ThreadStats::new(thread_id, &stats);
            (
                StatusCode::OK,
                Json(ApiResponse::new(StatusCode::OK.into(), stats)),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
    };

    Ok(response)
}

/// DELETE close a thread, dropping undelivered events and releasing its connection
#[utoipa::path(
    delete,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread to close")
    ),
    responses(
        (status = 204, description = "Thread closed (or did not exist)")
    )
)]
pub async fn close(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE thread {thread_id}");

    if !app_state.registry().close_thread(&thread_id) {
        debug!("Thread {thread_id} was not open");
    }

    Ok(StatusCode::NO_CONTENT)
}
