//! Recording persistence: one pretty-printed JSON snapshot per session.

use std::path::Path;

use pagewright::Recording;
use tracing::info;

use crate::RecorderError;

/// Write the finalized recording. Failures are fatal to the stop transition;
/// there is no retry.
pub fn persist_recording(recording: &Recording, path: &Path) -> Result<(), RecorderError> {
    let json = serde_json::to_string_pretty(recording)?;
    std::fs::write(path, json)?;
    info!(
        path = %path.display(),
        events = recording.events.len(),
        snapshots = recording.html_snapshots.len(),
        "recording persisted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewright::{EventKind, RecordingEvent};

    #[test]
    fn writes_wire_format_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser-recording.json");

        let recording = Recording {
            html_snapshots: vec!["<p>hi</p>".to_string()],
            events: vec![RecordingEvent {
                html_snapshot_id: 0,
                kind: EventKind::MouseClick,
                node_id: "node-1".to_string(),
                text: None,
                char_code: None,
                current_url: None,
            }],
        };

        persist_recording(&recording, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"htmlSnapshots\""));
        assert!(written.contains("\"MOUSE_CLICK\""));
        let parsed: Recording = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, recording);
    }

    #[test]
    fn write_failure_surfaces() {
        let recording = Recording {
            html_snapshots: vec![],
            events: vec![],
        };
        let result = persist_recording(&recording, Path::new("/nonexistent-dir/out.json"));
        assert!(matches!(result, Err(RecorderError::Io(_))));
    }
}
