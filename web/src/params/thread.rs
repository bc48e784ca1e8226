use serde::Serialize;
use sse::StreamStats;
use utoipa::ToSchema;

/// Delivery state of one thread.
#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadStats {
    pub(crate) thread_id: String,
    pub(crate) queued_events: usize,
    pub(crate) capacity: usize,
    pub(crate) connected: bool,
    /// Whole seconds since the last attach, post or delivered event.
    pub(crate) idle_secs: u64,
}

impl ThreadStats {
    pub(crate) fn new(thread_id: String, stats: &StreamStats) -> Self {
        Self {
            thread_id,
            queued_events: stats.queued_events,
            capacity: stats.capacity,
            connected: stats.has_connection,
            idle_secs: stats.idle_for.as_secs(),
        }
    }
}
