use crate::params::chat::{ChatRequest, ThreadAssigned, X_THREAD_ID};
use crate::streaming::handler::open_stream;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use axum::Json;

use log::*;

/// POST open a chat stream, starting a new thread when none is given
#[utoipa::path(
    post,
    path = "/api/chat/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "text/event-stream of the thread's events; the first event names the thread", content_type = "text/event-stream", body = String),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn chat_stream(
    State(app_state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, Error> {
    let thread_id = request.thread_id();
    debug!(
        "POST chat stream on thread {thread_id} ({} byte message)",
        request.message.len()
    );

    let mut response = open_stream(&app_state.sse_registry, thread_id.clone()).await?;

    let assigned = ThreadAssigned {
        thread_id: thread_id.clone(),
    };
    if let Err(e) = app_state.registry().post_json(&thread_id, &assigned) {
        error!("Failed to serialize thread assignment for {thread_id}: {e}");
    }

    match HeaderValue::from_str(&thread_id) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(HeaderName::from_static(X_THREAD_ID), value);
        }
        Err(e) => warn!("Thread id {thread_id:?} is not a valid header value: {e}"),
    }

    Ok(response)
}
