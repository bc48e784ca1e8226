//! Error types for attaching connections to the pool.

use std::fmt;
use std::io;

/// Errors surfaced to callers of [`StreamRegistry::attach`](crate::StreamRegistry::attach).
///
/// Delivery failures on an already attached connection are never reported
/// through this type: the writer task recovers from them on its own.
#[derive(Debug)]
pub enum Error {
    /// The sink cannot flush partial output, so it cannot carry an event stream.
    /// No stream or connection is created when this is returned.
    StreamingUnsupported,

    /// The sink failed while the streaming headers were being flushed,
    /// typically because the client went away during the handshake.
    Sink(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StreamingUnsupported => write!(f, "response does not support streaming"),
            Error::Sink(e) => write!(f, "failed to start event stream: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StreamingUnsupported => None,
            Error::Sink(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Sink(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_streaming_unsupported() {
        assert_eq!(
            Error::StreamingUnsupported.to_string(),
            "response does not support streaming"
        );
    }

    #[test]
    fn test_sink_error_keeps_source() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("gone"));
    }
}
