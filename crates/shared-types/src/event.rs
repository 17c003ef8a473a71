//! # Event
//!
//! The unit of data handed to the pipeline by instrumentation.

/// A serialized telemetry event.
///
/// `data` is uploaded verbatim. `metadata` travels with the event on disk
/// (e.g. a view id used to reconcile batches) but is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Serialized event payload.
    pub data: Vec<u8>,
    /// Optional opaque metadata stored alongside the payload.
    pub metadata: Option<Vec<u8>>,
}

impl Event {
    /// Create an event without metadata.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the event.
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

impl From<Vec<u8>> for Event {
    fn from(data: Vec<u8>) -> Self {
        Event::new(data)
    }
}

impl From<&[u8]> for Event {
    fn from(data: &[u8]) -> Self {
        Event::new(data.to_vec())
    }
}
