//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum glue between a request and the pool:
//! it attaches a channel-backed sink and turns the channel into the response
//! body. The pool itself (registry, streams, writer tasks) lives in the `sse`
//! crate.

pub mod handler;
