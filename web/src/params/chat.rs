use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response header carrying the thread id a chat stream is attached to.
pub(crate) const X_THREAD_ID: &str = "x-thread-id";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message.
    #[serde(default)]
    pub(crate) message: String,
    /// Thread to resume. A new one is started when missing or empty.
    #[serde(default)]
    pub(crate) thread_id: Option<String>,
}

impl ChatRequest {
    /// The requested thread id, or a freshly generated `thread_<uuid>`.
    pub(crate) fn thread_id(&self) -> String {
        match self.thread_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("thread_{}", uuid::Uuid::new_v4().simple()),
        }
    }
}

/// First event of every chat stream.
#[derive(Debug, Serialize)]
pub(crate) struct ThreadAssigned {
    pub(crate) thread_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_thread_id_generates_one() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        let first = request.thread_id();
        assert!(first.starts_with("thread_"));
        assert_ne!(first, request.thread_id());
    }

    #[test]
    fn test_empty_thread_id_generates_one() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","thread_id":""}"#).unwrap();
        assert!(request.thread_id().starts_with("thread_"));
    }

    #[test]
    fn test_given_thread_id_is_kept() {
        let request: ChatRequest = serde_json::from_str(r#"{"thread_id":"thread_42"}"#).unwrap();
        assert_eq!(request.thread_id(), "thread_42");
        assert!(request.message.is_empty());
    }
}
