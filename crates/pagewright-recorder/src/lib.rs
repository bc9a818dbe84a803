//! Records a user's browser session into a normalized, replayable event log.
//!
//! The [`ActionRecorder`] consumes translated page events from a single
//! loop, captures HTML snapshots as elements get annotated, and on the stop
//! chord collapses keystroke runs into text-entry events and persists the
//! result as one JSON artifact.

use thiserror::Error;

pub mod collapse;
pub mod events;
pub mod persist;
pub mod recorder;

pub use collapse::normalize;
pub use events::{ControlChord, RawEventKind, RawRecordedAction};
pub use persist::persist_recording;
pub use recorder::ActionRecorder;

/// Errors surfaced by the recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A bridge command failed while handling a notification
    #[error(transparent)]
    Automation(#[from] pagewright::AutomationError),

    /// The finalized recording could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The recording file could not be written
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
