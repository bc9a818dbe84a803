//! Raw event model and the reserved control chords.

use pagewright::{EventKind, Rgba};

/// Event kinds as captured, before collapsing. `KeyDown` is the only kind
/// that does not survive normalization one-to-one: runs of keystrokes merge
/// into single `KEYPRESS` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    MouseClick,
    KeyDown,
    AssertElem,
    MajorDomChange,
}

impl RawEventKind {
    pub fn normalized(self) -> EventKind {
        match self {
            RawEventKind::MouseClick => EventKind::MouseClick,
            RawEventKind::KeyDown => EventKind::Keypress,
            RawEventKind::AssertElem => EventKind::AssertElem,
            RawEventKind::MajorDomChange => EventKind::MajorDomChange,
        }
    }
}

/// One observed user action, as appended by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecordedAction {
    /// Sequence id from the event source; ordering/debugging only.
    pub pos_id: i64,
    /// Index into the recorder's snapshot list at capture time.
    pub html_snapshot_id: usize,
    pub kind: RawEventKind,
    /// Stable node marker, or `"N/A"` for page-level events.
    pub node_id: String,
    /// Key name for keystrokes ("a", "Backspace", ...).
    pub key: Option<String>,
    pub char_code: Option<i64>,
    pub current_url: Option<String>,
}

impl RawRecordedAction {
    pub fn click(pos_id: i64, html_snapshot_id: usize, node_id: String) -> Self {
        Self {
            pos_id,
            html_snapshot_id,
            kind: RawEventKind::MouseClick,
            node_id,
            key: None,
            char_code: None,
            current_url: None,
        }
    }

    pub fn keystroke(
        pos_id: i64,
        html_snapshot_id: usize,
        node_id: String,
        key: Option<String>,
        char_code: Option<i64>,
    ) -> Self {
        Self {
            pos_id,
            html_snapshot_id,
            kind: RawEventKind::KeyDown,
            node_id,
            key,
            char_code,
            current_url: None,
        }
    }

    pub fn assertion(pos_id: i64, html_snapshot_id: usize, node_id: String) -> Self {
        Self {
            pos_id,
            html_snapshot_id,
            kind: RawEventKind::AssertElem,
            node_id,
            key: None,
            char_code: None,
            current_url: None,
        }
    }

    pub fn page_change(pos_id: i64, html_snapshot_id: usize, current_url: String) -> Self {
        Self {
            pos_id,
            html_snapshot_id,
            kind: RawEventKind::MajorDomChange,
            node_id: "N/A".to_string(),
            key: None,
            char_code: None,
            current_url: Some(current_url),
        }
    }
}

/// The four reserved modifier+key combinations. Everything else on the
/// keyboard is recordable input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChord {
    StartRecording,
    StopRecording,
    MarkAssertion,
    ConfirmAssertion,
}

impl ControlChord {
    /// Match a key-down against the chord table: Ctrl+Shift+{R,S,W,C}.
    pub fn from_key(code: &str, ctrl: bool, shift: bool) -> Option<Self> {
        if !(ctrl && shift) {
            return None;
        }
        match code {
            "KeyR" => Some(ControlChord::StartRecording),
            "KeyS" => Some(ControlChord::StopRecording),
            "KeyW" => Some(ControlChord::MarkAssertion),
            "KeyC" => Some(ControlChord::ConfirmAssertion),
            _ => None,
        }
    }
}

/// Overlay fills used as operator feedback.
pub const RECORDING_STARTED: Rgba = Rgba::new(255, 0, 0, 0.5);
pub const RECORDING_STOPPED: Rgba = Rgba::new(255, 255, 0, 0.5);
pub const ASSERT_MARKED: Rgba = Rgba::new(0, 0, 255, 0.5);
pub const ASSERT_CONFIRMED: Rgba = Rgba::new(0, 255, 0, 0.5);
pub const KEYSTROKE_TARGET: Rgba = Rgba::new(0, 125, 0, 0.2);
