//! Thread id → stream registry.
//!
//! The registry is the only entry point producers and HTTP handlers use.
//! Streams are created lazily by the first attach or post for an id, and
//! removed by [`close_thread`](StreamRegistry::close_thread), by the idle
//! reaper, or by [`shutdown`](StreamRegistry::shutdown).

use bytes::Bytes;
use dashmap::DashMap;
use log::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::Error;
use crate::event::{Event, ThreadId};
use crate::queue::Push;
use crate::sink::EventSink;
use crate::stream::{EventStream, StreamStats};
use crate::{wire, writer};

/// Queue capacity used when a registry is created with a size of zero.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default time a stream may sit unused before the reaper evicts it.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Default period between two reaper passes.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct StreamRegistry {
    streams: DashMap<ThreadId, Arc<EventStream>>,
    buffer_size: usize,
    shutdown: CancellationToken,
}

impl StreamRegistry {
    /// Creates an independent registry. A `buffer_size` of zero falls back to
    /// [`DEFAULT_BUFFER_SIZE`].
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };

        Self {
            streams: DashMap::new(),
            buffer_size,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the stream for `thread_id`, creating it if needed. Concurrent
    /// callers for an unknown id all get the same stream.
    pub fn get_or_create(&self, thread_id: &str) -> Arc<EventStream> {
        if let Some(stream) = self.streams.get(thread_id) {
            return Arc::clone(stream.value());
        }

        let stream = self
            .streams
            .entry(thread_id.to_owned())
            .or_insert_with(|| {
                debug!("Creating stream for thread {}", thread_id);
                Arc::new(EventStream::new(self.buffer_size))
            });
        Arc::clone(stream.value())
    }

    /// Attaches a client response to `thread_id` and makes it the stream's
    /// current connection.
    ///
    /// Any connection previously attached to the thread is cancelled; its
    /// queue is kept and delivery continues on the new connection. The caller
    /// must keep the response open until the returned connection is
    /// cancelled or the client goes away.
    pub async fn attach<S: EventSink>(
        &self,
        thread_id: &str,
        mut sink: S,
    ) -> Result<Arc<Connection>, Error> {
        if !sink.supports_flush() {
            return Err(Error::StreamingUnsupported);
        }
        wire::write_headers(&mut sink);
        sink.flush().await?;

        let connection = Connection::new(Box::new(sink));
        let (stream, previous) =
            self.install_connection(thread_id, self.get_or_create(thread_id), &connection);

        if let Some(previous) = previous {
            debug!(
                "Connection {} on thread {} replaced by {}",
                previous.id(),
                thread_id,
                connection.id()
            );
            previous.cancel();
        }
        stream.touch();

        if stream.claim_writer() {
            writer::spawn(thread_id.to_owned(), Arc::clone(&stream));
        }

        info!(
            "Attached connection {} to thread {}",
            connection.id(),
            thread_id
        );
        Ok(connection)
    }

    /// Makes `connection` current on `stream`. If the stream was closed
    /// before the swap landed, the connection is taken back and installed on
    /// a fresh stream for the same id instead.
    fn install_connection(
        &self,
        thread_id: &str,
        mut stream: Arc<EventStream>,
        connection: &Arc<Connection>,
    ) -> (Arc<EventStream>, Option<Arc<Connection>>) {
        loop {
            let previous = stream.replace_connection(Arc::clone(connection));
            if !stream.is_closed() {
                return (stream, previous);
            }

            stream.clear_if_current(connection);
            debug!(
                "Thread {} closed while attaching {}, retrying on a fresh stream",
                thread_id,
                connection.id()
            );
            stream = self.get_or_create(thread_id);
        }
    }

    /// Queues a payload for `thread_id`. Never blocks on the client: when the
    /// stream's queue is full the oldest undelivered event is dropped.
    pub fn post(&self, thread_id: &str, payload: impl Into<Bytes>) {
        let stream = self.get_or_create(thread_id);
        match stream.enqueue(Event::new(payload)) {
            Push::Queued => {}
            Push::DroppedOldest(dropped) => {
                debug!(
                    "Queue full on thread {}, dropped oldest event ({} bytes)",
                    thread_id,
                    dropped.len()
                );
            }
            Push::Closed => {
                debug!("Thread {} closed while posting, event discarded", thread_id);
            }
        }
    }

    /// Serializes `value` as JSON and posts it.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        thread_id: &str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let payload = serde_json::to_vec(value)?;
        self.post(thread_id, payload);
        Ok(())
    }

    /// Removes and tears down the stream for `thread_id`. Returns `false` if
    /// there was no such stream; calling it again is harmless.
    pub fn close_thread(&self, thread_id: &str) -> bool {
        let Some((_, stream)) = self.streams.remove(thread_id) else {
            return false;
        };

        let discarded = stream.close();
        info!(
            "Closed thread {} ({} undelivered event(s) discarded)",
            thread_id, discarded
        );
        true
    }

    /// Releases `connection` from `thread_id` if it is still the current one,
    /// and cancels it. Used when the client side of a connection goes away.
    pub fn detach(&self, thread_id: &str, connection: &Arc<Connection>) -> bool {
        connection.cancel();

        let Some(stream) = self
            .streams
            .get(thread_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return false;
        };

        let released = stream.clear_if_current(connection);
        if released {
            debug!(
                "Connection {} detached from thread {}",
                connection.id(),
                thread_id
            );
        }
        released
    }

    /// Runs one reaper pass and returns the number of threads evicted.
    ///
    /// One `now` is sampled for the whole pass. A stream that becomes active
    /// between the check and the eviction is still evicted; the next attach
    /// or post simply creates a fresh one.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let now = Instant::now();

        let idle: Vec<ThreadId> = self
            .streams
            .iter()
            .filter(|entry| entry.value().is_idle(now, ttl))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for thread_id in idle {
            if self.close_thread(&thread_id) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!("Evicted {} idle thread(s)", evicted);
        }
        evicted
    }

    /// Spawns the idle reaper. The first pass runs one `interval` from now;
    /// the task ends when the registry is shut down.
    pub fn start_cleanup(self: &Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            info!(
                "Idle reaper started (interval {:?}, ttl {:?})",
                interval, ttl
            );
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = registry.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.sweep(ttl);
                    }
                }
            }
            debug!("Idle reaper stopped");
        })
    }

    /// Stops the reaper and closes every thread.
    pub fn shutdown(&self) {
        self.shutdown.cancel();

        let thread_ids: Vec<ThreadId> = self
            .streams
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for thread_id in &thread_ids {
            self.close_thread(thread_id);
        }
        info!("Stream registry shut down ({} thread(s) closed)", thread_ids.len());
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.streams.contains_key(thread_id)
    }

    pub fn stats(&self, thread_id: &str) -> Option<StreamStats> {
        self.streams.get(thread_id).map(|entry| entry.value().stats())
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
