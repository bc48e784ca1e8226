//! Write-side abstraction over an open HTTP response.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// A writable response that can push partial output to the client on demand.
///
/// Headers are set once, before the first flush. `write` may buffer;
/// nothing is guaranteed to reach the client until `flush` returns `Ok`.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Whether `flush` actually pushes buffered output to the client.
    /// Sinks that can only deliver a complete body must return `false`.
    fn supports_flush(&self) -> bool;

    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    async fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;
}

/// Sink that hands flushed chunks to an HTTP response body through a bounded channel.
///
/// A full channel makes `flush` wait, which slows the stream's writer task
/// (and lets its queue drop old events) instead of growing memory.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    buf: BytesMut,
    headers: Arc<Mutex<HeaderMap>>,
}

/// The read half of a [`ChannelSink`], owned by the HTTP handler.
pub struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
    headers: Arc<Mutex<HeaderMap>>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (ChannelSink, ChannelBody) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let headers = Arc::new(Mutex::new(HeaderMap::new()));

        let sink = ChannelSink {
            tx,
            buf: BytesMut::new(),
            headers: Arc::clone(&headers),
        };
        (sink, ChannelBody { rx, headers })
    }

    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    fn supports_flush(&self) -> bool {
        true
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.tx.is_closed() {
            return Err(Self::closed());
        }
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return if self.tx.is_closed() {
                Err(Self::closed())
            } else {
                Ok(())
            };
        }

        let chunk = self.buf.split().freeze();
        self.tx.send(chunk).await.map_err(|_| Self::closed())
    }
}

impl ChannelBody {
    /// Headers set on the sink so far (normally the full set, once attach returned).
    pub fn headers(&self) -> HeaderMap {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_parts(self) -> (HeaderMap, mpsc::Receiver<Bytes>) {
        let headers = self.headers();
        (headers, self.rx)
    }
}
