use crate::controller::{chat_controller, health_check_controller, thread_controller};
use crate::params::chat::{ChatRequest, X_THREAD_ID};
use crate::params::thread::ThreadStats;
use crate::streaming::handler;
use crate::AppState;
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use log::*;
use service::config::Config;
use tower_http::cors::{AllowOrigin, CorsLayer};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "SSE Relay API"
        ),
        paths(
            chat_controller::chat_stream,
            handler::stream_handler,
            health_check_controller::health_check,
            thread_controller::close,
            thread_controller::post_event,
            thread_controller::read,
        ),
        components(
            schemas(
                ChatRequest,
                ThreadStats,
            )
        ),
        tags(
            (name = "sse_relay", description = "Server-push event delivery over text/event-stream")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(chat_routes(app_state.clone()))
        .merge(health_routes())
        .merge(thread_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(cors)
}

fn chat_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_controller::chat_stream))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn thread_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/threads/{thread_id}", get(thread_controller::read))
        .route("/threads/{thread_id}", delete(thread_controller::close))
        .route("/threads/{thread_id}/events", post(thread_controller::post_event))
        .route("/threads/{thread_id}/stream", get(handler::stream_handler))
        .with_state(app_state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(X_THREAD_ID)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use futures::{Stream, StreamExt};
    use service::config::Config;
    use sse::StreamRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::try_parse_from(["sse_relay", "--sse-buffer-size", "4"]).unwrap();
        let registry = Arc::new(StreamRegistry::new(config.sse_buffer_size));
        AppState::new(config, &registry)
    }

    async fn next_chunk<S>(body: &mut S) -> Option<Bytes>
    where
        S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
    {
        tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("timed out waiting for a chunk")
            .map(|chunk| chunk.unwrap())
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = define_routes(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stream_sets_headers_and_delivers_posted_events() {
        let state = test_state();
        let app = define_routes(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
        assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
        assert_eq!(headers.get("x-accel-buffering").unwrap(), "no");

        let posted = app
            .oneshot(
                Request::post("/threads/t1/events")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(posted.status(), StatusCode::ACCEPTED);

        let mut body = response.into_body().into_data_stream();
        assert_eq!(next_chunk(&mut body).await.unwrap(), Bytes::from("data: hello\n\n"));
    }

    #[tokio::test]
    async fn test_events_posted_before_attach_are_buffered() {
        let state = test_state();
        let app = define_routes(state.clone());

        for payload in ["a", "b"] {
            state.registry().post("t1", payload);
        }

        let response = app
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        assert_eq!(next_chunk(&mut body).await.unwrap(), Bytes::from("data: a\n\n"));
        assert_eq!(next_chunk(&mut body).await.unwrap(), Bytes::from("data: b\n\n"));
    }

    #[tokio::test]
    async fn test_reattach_ends_previous_stream() {
        let state = test_state();
        let app = define_routes(state.clone());

        let first = app
            .clone()
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let second = app
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let mut first_body = first.into_body().into_data_stream();
        assert!(next_chunk(&mut first_body).await.is_none());

        state.registry().post("t1", "for second");
        let mut second_body = second.into_body().into_data_stream();
        assert_eq!(
            next_chunk(&mut second_body).await.unwrap(),
            Bytes::from("data: for second\n\n")
        );
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_is_idempotent() {
        let state = test_state();
        let app = define_routes(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        for _ in 0..2 {
            let closed = app
                .clone()
                .oneshot(Request::delete("/threads/t1").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(closed.status(), StatusCode::NO_CONTENT);
        }

        let mut body = response.into_body().into_data_stream();
        assert!(next_chunk(&mut body).await.is_none());
        assert!(!state.registry().contains("t1"));
    }

    #[tokio::test]
    async fn test_dropped_response_detaches_connection() {
        let state = test_state();
        let app = define_routes(state.clone());

        let response = app
            .oneshot(Request::get("/threads/t1/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(state.registry().get_or_create("t1").has_connection());

        drop(response);
        let stream = state.registry().get_or_create("t1");
        wait_until(|| !stream.has_connection()).await;
    }

    #[tokio::test]
    async fn test_read_thread_stats() {
        let state = test_state();
        let app = define_routes(state.clone());

        let missing = app
            .clone()
            .oneshot(Request::get("/threads/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        state.registry().post("t1", "queued");
        let found = app
            .oneshot(Request::get("/threads/t1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);

        let body = axum::body::to_bytes(found.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["thread_id"], "t1");
        assert_eq!(json["data"]["queued_events"], 1);
        assert_eq!(json["data"]["capacity"], 4);
        assert_eq!(json["data"]["connected"], false);
    }

    #[tokio::test]
    async fn test_chat_stream_assigns_thread_and_announces_it() {
        let state = test_state();
        let app = define_routes(state.clone());

        let response = app
            .oneshot(
                Request::post("/api/chat/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let thread_id = response
            .headers()
            .get(X_THREAD_ID)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(thread_id.starts_with("thread_"));
        assert!(state.registry().contains(&thread_id));

        let mut body = response.into_body().into_data_stream();
        let expected = format!("data: {{\"thread_id\":\"{thread_id}\"}}\n\n");
        assert_eq!(next_chunk(&mut body).await.unwrap(), Bytes::from(expected));
    }

    #[tokio::test]
    async fn test_chat_stream_resumes_given_thread() {
        let state = test_state();
        let app = define_routes(state.clone());
        state.registry().post("thread_7", "earlier");

        let response = app
            .oneshot(
                Request::post("/api/chat/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"again","thread_id":"thread_7"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(X_THREAD_ID).unwrap(), "thread_7");

        let mut body = response.into_body().into_data_stream();
        assert_eq!(next_chunk(&mut body).await.unwrap(), Bytes::from("data: earlier\n\n"));
        assert_eq!(
            next_chunk(&mut body).await.unwrap(),
            Bytes::from("data: {\"thread_id\":\"thread_7\"}\n\n")
        );
    }
}
