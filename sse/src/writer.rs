//! The per-stream delivery loop.
//!
//! Exactly one writer runs per stream. It takes events from the stream's
//! queue in order and writes each one to whatever connection is current.
//! A failed write never loses the event: the writer drops the broken
//! connection and keeps the same event until a new connection attaches.

use log::*;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::event::{Event, ThreadId};
use crate::stream::EventStream;

pub(crate) fn spawn(thread_id: ThreadId, stream: Arc<EventStream>) -> JoinHandle<()> {
    tokio::spawn(run(thread_id, stream))
}

async fn run(thread_id: ThreadId, stream: Arc<EventStream>) {
    debug!("Writer started for thread {}", thread_id);

    while let Some(event) = stream.queue().pop().await {
        stream.set_in_flight(true);
        let delivered = deliver(&thread_id, &stream, &event).await;
        stream.set_in_flight(false);

        if !delivered {
            break;
        }
    }

    debug!("Writer stopped for thread {}", thread_id);
}

/// Delivers `event`, retrying on each new connection until a write succeeds.
/// Returns `false` if the stream was closed first.
async fn deliver(thread_id: &str, stream: &EventStream, event: &Event) -> bool {
    loop {
        let Some(connection) = stream.wait_for_connection().await else {
            return false;
        };

        match connection.deliver(event).await {
            Ok(()) => {
                stream.touch();
                trace!(
                    "Delivered {} byte event on thread {} via connection {}",
                    event.len(),
                    thread_id,
                    connection.id()
                );
                return true;
            }
            Err(e) => {
                warn!(
                    "Failed to write event to connection {} on thread {}: {}. Waiting for a new connection.",
                    connection.id(),
                    thread_id,
                    e
                );
                stream.clear_if_current(&connection);
                connection.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::test_support::RecordingSink;

    #[tokio::test]
    async fn test_writer_delivers_in_order() {
        let stream = Arc::new(EventStream::new(8));
        let sink = RecordingSink::new();
        let handle = sink.handle();
        stream.replace_connection(Connection::new(Box::new(sink)));

        let task = spawn("t".to_string(), Arc::clone(&stream));
        for payload in ["a", "b", "c"] {
            stream.enqueue(Event::from(payload));
        }

        assert_eq!(handle.wait_for_payloads(3).await, vec!["a", "b", "c"]);

        stream.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_retries_same_event_on_next_connection() {
        let stream = Arc::new(EventStream::new(8));
        let first = RecordingSink::new();
        let first_handle = first.handle();
        first_handle.fail_writes(1);
        let first_conn = Connection::new(Box::new(first));
        stream.replace_connection(Arc::clone(&first_conn));

        stream.enqueue(Event::from("one"));
        let task = spawn("t".to_string(), Arc::clone(&stream));

        first_conn.cancelled().await;
        assert!(!stream.has_connection());

        let second = RecordingSink::new();
        let second_handle = second.handle();
        stream.replace_connection(Connection::new(Box::new(second)));

        assert_eq!(second_handle.wait_for_payloads(1).await, vec!["one"]);
        assert!(first_handle.payloads().is_empty());

        stream.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_exits_when_closed_while_waiting() {
        let stream = Arc::new(EventStream::new(8));
        stream.enqueue(Event::from("never sent"));
        let task = spawn("t".to_string(), Arc::clone(&stream));

        tokio::task::yield_now().await;
        stream.close();

        task.await.unwrap();
        assert_eq!(stream.pending_events(), 0);
    }
}
