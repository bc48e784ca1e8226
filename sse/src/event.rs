use bytes::Bytes;

/// Type alias for thread (logical session) identifiers.
pub type ThreadId = String;

/// An opaque payload waiting to be written to a client.
///
/// Cheap to clone: the payload is reference counted and never copied on the
/// way from a producer to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    data: Bytes,
}

impl Event {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for Event {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Event {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<String> for Event {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&'static str> for Event {
    fn from(data: &'static str) -> Self {
        Self::new(Bytes::from_static(data.as_bytes()))
    }
}
