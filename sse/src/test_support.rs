//! In-memory sinks for exercising the pool without an HTTP server.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::sink::EventSink;
use crate::wire::{DATA_PREFIX, EVENT_TERMINATOR};

#[derive(Default)]
struct Recorded {
    headers: HeaderMap,
    pending: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    flushes: usize,
    failing_writes: usize,
}

/// Sink that records every flushed chunk and can be told to fail writes.
pub(crate) struct RecordingSink {
    state: Arc<Mutex<Recorded>>,
}

/// Inspection handle that stays with the test after the sink is attached.
#[derive(Clone)]
pub(crate) struct SinkHandle {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub(crate) fn handle(&self) -> SinkHandle {
        SinkHandle {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    fn supports_flush(&self) -> bool {
        true
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.state.lock().unwrap().headers.insert(name, value);
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            state.pending.clear();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated failure"));
        }
        state.pending.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.flushes += 1;
        if !state.pending.is_empty() {
            let chunk = std::mem::take(&mut state.pending);
            state.chunks.push(chunk);
        }
        Ok(())
    }
}

impl SinkHandle {
    pub(crate) fn fail_writes(&self, count: usize) {
        self.state.lock().unwrap().failing_writes = count;
    }

    pub(crate) fn headers(&self) -> HeaderMap {
        self.state.lock().unwrap().headers.clone()
    }

    pub(crate) fn flush_count(&self) -> usize {
        self.state.lock().unwrap().flushes
    }

    /// Every byte flushed so far, in order.
    pub(crate) fn flushed(&self) -> Vec<u8> {
        self.state.lock().unwrap().chunks.concat()
    }

    /// Payloads of the events flushed so far, with the framing stripped.
    pub(crate) fn payloads(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .chunks
            .iter()
            .map(|chunk| {
                let body = chunk
                    .strip_prefix(DATA_PREFIX)
                    .and_then(|rest| rest.strip_suffix(EVENT_TERMINATOR))
                    .expect("chunk is a framed event");
                String::from_utf8(body.to_vec()).unwrap()
            })
            .collect()
    }

    /// Waits until at least `count` events were flushed, or panics after a while.
    pub(crate) async fn wait_for_payloads(&self, count: usize) -> Vec<String> {
        for _ in 0..400 {
            let payloads = self.payloads();
            if payloads.len() >= count {
                return payloads;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} payloads, got {:?}",
            count,
            self.payloads()
        );
    }
}

/// Sink for a response that can only be sent in one piece.
pub(crate) struct BufferedOnlySink;

#[async_trait]
impl EventSink for BufferedOnlySink {
    fn supports_flush(&self) -> bool {
        false
    }

    fn set_header(&mut self, _name: HeaderName, _value: HeaderValue) {}

    async fn write(&mut self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
