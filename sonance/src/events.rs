//! Event types for Sonance
//!
//! The renderer reports playback progress through these events. They are
//! queued on a channel and drained with [`Context::poll_events`](crate::Context::poll_events);
//! nothing is delivered through callbacks.

use crate::buffer::BufferId;
use crate::source::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// A queued buffer finished rendering and may be unqueued.
    BufferProcessed { source: SourceId, buffer: BufferId },
    /// A looping source wrapped back to its queue head.
    Looped { source: SourceId },
    /// A source ran out of queued data and stopped on its own.
    Stopped { source: SourceId },
}

impl SourceEvent {
    pub fn source(&self) -> SourceId {
        match self {
            Self::BufferProcessed { source, .. }
            | Self::Looped { source }
            | Self::Stopped { source } => *source,
        }
    }
}
