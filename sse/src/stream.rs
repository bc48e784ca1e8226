//! Per-thread logical channel.
//!
//! An [`EventStream`] outlives the HTTP connections attached to it: the
//! queue and the activity clock survive any number of reconnects, and only
//! close or eviction tears them down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::event::Event;
use crate::queue::{EventQueue, Push};

pub struct EventStream {
    queue: EventQueue,

    /// The connection events are currently written to. Only ever replaced
    /// wholesale or cleared after an identity check.
    current: Mutex<Option<Arc<Connection>>>,

    /// Raised by attach so a writer waiting for a connection wakes up.
    attached: Notify,

    /// Cancelled when the stream is closed.
    closed: CancellationToken,

    writer_started: AtomicBool,

    /// Set while the writer holds a dequeued event it has not delivered yet.
    in_flight: AtomicBool,

    origin: Instant,
    /// Milliseconds since `origin` of the last activity. Only moves forward.
    last_active_ms: AtomicU64,
}

/// Point-in-time view of a stream, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    pub queued_events: usize,
    pub capacity: usize,
    pub has_connection: bool,
    pub idle_for: Duration,
}

impl EventStream {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: EventQueue::new(capacity),
            current: Mutex::new(None),
            attached: Notify::new(),
            closed: CancellationToken::new(),
            writer_started: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            origin: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Makes `connection` current and returns the one it replaced, if any.
    /// The caller is responsible for cancelling the replaced connection.
    pub(crate) fn replace_connection(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let previous = self.slot().replace(connection);
        self.attached.notify_one();
        previous
    }

    pub fn current_connection(&self) -> Option<Arc<Connection>> {
        self.slot().clone()
    }

    pub fn has_connection(&self) -> bool {
        self.slot().is_some()
    }

    /// Clears the slot only if it still holds exactly `connection`.
    pub(crate) fn clear_if_current(&self, connection: &Arc<Connection>) -> bool {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, connection) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn take_connection(&self) -> Option<Arc<Connection>> {
        self.slot().take()
    }

    pub(crate) fn enqueue(&self, event: Event) -> Push {
        let outcome = self.queue.push(event);
        if outcome != Push::Closed {
            self.touch();
        }
        outcome
    }

    /// Waits until a connection is current. Returns `None` if the stream is
    /// closed first.
    pub(crate) async fn wait_for_connection(&self) -> Option<Arc<Connection>> {
        loop {
            if self.closed.is_cancelled() {
                return None;
            }
            if let Some(connection) = self.current_connection() {
                return Some(connection);
            }

            tokio::select! {
                _ = self.attached.notified() => {}
                _ = self.closed.cancelled() => return None,
            }
        }
    }

    /// Claims the right to run this stream's writer. Only the first caller
    /// after creation (or after a close) gets `true`.
    pub(crate) fn claim_writer(&self) -> bool {
        self.writer_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn writer_started(&self) -> bool {
        self.writer_started.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_flight(&self, in_flight: bool) {
        self.in_flight.store(in_flight, Ordering::Release);
    }

    /// Events still owed to a client: queued ones plus the one the writer holds.
    pub fn pending_events(&self) -> usize {
        self.queue.len() + usize::from(self.in_flight.load(Ordering::Acquire))
    }

    /// Records activity now.
    pub(crate) fn touch(&self) {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(millis, Ordering::AcqRel);
    }

    pub fn last_active(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_active_ms.load(Ordering::Acquire))
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active())
    }

    /// No connection, nothing pending, and quiet for longer than `ttl` as of `now`.
    pub fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        !self.has_connection() && self.pending_events() == 0 && self.idle_for(now) > ttl
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Tears the stream down: cancels the current connection, discards the
    /// queue and stops the writer. Returns the number of events discarded.
    pub(crate) fn close(&self) -> usize {
        if let Some(connection) = self.take_connection() {
            connection.cancel();
        }
        let discarded = self.queue.close();
        self.closed.cancel();
        self.writer_started.store(false, Ordering::Release);
        discarded
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            queued_events: self.queue.len(),
            capacity: self.queue.capacity(),
            has_connection: self.has_connection(),
            idle_for: self.idle_for(Instant::now()),
        }
    }
}
