//! Turns the raw event log into the persisted recording.
//!
//! Two jobs: compact the snapshot index space down to the snapshots that
//! events actually reference, and merge consecutive same-target keystrokes
//! into single text-entry events with backspace applied as an edit.
//!
//! Known limitation: only the `Backspace` key is modeled as an edit. Arrow
//! keys, caret moves via mouse, and multi-character paste are not, and will
//! corrupt the reconstructed text for sessions that use them.

use std::collections::{BTreeSet, HashMap};

use pagewright::{EventKind, Recording, RecordingEvent};

use crate::events::{RawEventKind, RawRecordedAction};

const BACKSPACE_KEY: &str = "Backspace";

/// Collapse and remap the raw log into a [`Recording`].
pub fn normalize(raw_events: &[RawRecordedAction], html_snapshots: &[String]) -> Recording {
    let used: BTreeSet<usize> = raw_events.iter().map(|e| e.html_snapshot_id).collect();
    let remap: HashMap<usize, usize> = used
        .iter()
        .enumerate()
        .map(|(rank, &original)| (original, rank))
        .collect();

    let mut events = Vec::new();
    let mut run: Vec<&RawRecordedAction> = Vec::new();

    for action in raw_events {
        if action.kind != RawEventKind::KeyDown {
            flush_run(&mut run, &remap, &mut events);
            events.push(pass_through(action, &remap));
        } else if run.is_empty() || run[0].node_id == action.node_id {
            run.push(action);
        } else {
            // A keystroke on a different element closes the open run.
            flush_run(&mut run, &remap, &mut events);
            run.push(action);
        }
    }
    flush_run(&mut run, &remap, &mut events);

    Recording {
        html_snapshots: used.iter().map(|&i| html_snapshots[i].clone()).collect(),
        events,
    }
}

/// Emit the open run's collapse result, if any, and reset the run.
fn flush_run(
    run: &mut Vec<&RawRecordedAction>,
    remap: &HashMap<usize, usize>,
    events: &mut Vec<RecordingEvent>,
) {
    if let Some(event) = collapse_run(run, remap) {
        events.push(event);
    }
    run.clear();
}

/// Reconstruct the text a run of keystrokes produced. A fully backspaced
/// run vanishes: the user typed and erased everything.
fn collapse_run(
    run: &[&RawRecordedAction],
    remap: &HashMap<usize, usize>,
) -> Option<RecordingEvent> {
    let first = run.first()?;

    let mut text = String::new();
    for action in run {
        match action.key.as_deref() {
            Some(BACKSPACE_KEY) => {
                text.pop();
            }
            Some(key) if key.chars().count() == 1 => text.push_str(key),
            _ => {}
        }
    }

    if text.is_empty() {
        return None;
    }

    Some(RecordingEvent {
        html_snapshot_id: remap[&first.html_snapshot_id],
        kind: EventKind::Keypress,
        node_id: first.node_id.clone(),
        text: Some(text),
        char_code: None,
        current_url: None,
    })
}

fn pass_through(action: &RawRecordedAction, remap: &HashMap<usize, usize>) -> RecordingEvent {
    RecordingEvent {
        html_snapshot_id: remap[&action.html_snapshot_id],
        kind: action.kind.normalized(),
        node_id: action.node_id.clone(),
        text: action.key.clone(),
        char_code: action.char_code,
        current_url: action.current_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystroke(snapshot: usize, node: &str, key: &str) -> RawRecordedAction {
        RawRecordedAction::keystroke(0, snapshot, node.to_string(), Some(key.to_string()), None)
    }

    fn click(snapshot: usize, node: &str) -> RawRecordedAction {
        RawRecordedAction::click(0, snapshot, node.to_string())
    }

    #[test]
    fn backspace_edits_the_accumulator() {
        let raw = vec![
            keystroke(0, "field", "a"),
            keystroke(0, "field", "b"),
            keystroke(0, "field", "c"),
            keystroke(0, "field", "Backspace"),
            keystroke(0, "field", "Backspace"),
            keystroke(0, "field", "d"),
        ];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert_eq!(recording.events.len(), 1);
        assert_eq!(recording.events[0].kind, EventKind::Keypress);
        assert_eq!(recording.events[0].text.as_deref(), Some("ad"));
    }

    #[test]
    fn fully_backspaced_run_vanishes() {
        let raw = vec![
            keystroke(0, "field", "Backspace"),
            keystroke(0, "field", "Backspace"),
            keystroke(0, "field", "Backspace"),
        ];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert!(recording.events.is_empty());
        assert!(recording.html_snapshots.is_empty());
    }

    #[test]
    fn non_printable_keys_are_dropped_from_text() {
        let raw = vec![
            keystroke(0, "field", "h"),
            keystroke(0, "field", "Shift"),
            keystroke(0, "field", "i"),
            keystroke(0, "field", "Enter"),
        ];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert_eq!(recording.events.len(), 1);
        assert_eq!(recording.events[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn click_between_runs_closes_the_first() {
        let raw = vec![
            keystroke(0, "first", "a"),
            keystroke(0, "first", "b"),
            click(0, "button"),
            keystroke(0, "second", "c"),
        ];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        let kinds: Vec<_> = recording.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Keypress, EventKind::MouseClick, EventKind::Keypress]
        );
        assert_eq!(recording.events[0].text.as_deref(), Some("ab"));
        assert_eq!(recording.events[0].node_id, "first");
        assert_eq!(recording.events[1].node_id, "button");
        assert_eq!(recording.events[2].text.as_deref(), Some("c"));
        assert_eq!(recording.events[2].node_id, "second");
    }

    #[test]
    fn keystroke_on_new_target_closes_run_mid_typing() {
        let raw = vec![
            keystroke(0, "first", "a"),
            keystroke(0, "second", "b"),
            keystroke(0, "second", "c"),
        ];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert_eq!(recording.events.len(), 2);
        assert_eq!(recording.events[0].text.as_deref(), Some("a"));
        assert_eq!(recording.events[1].text.as_deref(), Some("bc"));
    }

    #[test]
    fn vanished_run_does_not_emit_before_passthrough() {
        let raw = vec![
            keystroke(0, "field", "x"),
            keystroke(0, "field", "Backspace"),
            click(1, "button"),
        ];
        let snapshots = vec!["s0".to_string(), "s1".to_string()];
        let recording = normalize(&raw, &snapshots);
        assert_eq!(recording.events.len(), 1);
        assert_eq!(recording.events[0].kind, EventKind::MouseClick);
    }

    #[test]
    fn snapshot_indices_remap_to_compact_range() {
        let raw = vec![
            click(5, "a"),
            keystroke(2, "field", "h"),
            keystroke(2, "field", "i"),
            click(7, "b"),
        ];
        let snapshots: Vec<String> = (0..8).map(|i| format!("s{i}")).collect();
        let recording = normalize(&raw, &snapshots);

        // Referenced {2, 5, 7} -> ranks {0, 1, 2}, order preserving.
        assert_eq!(recording.html_snapshots, vec!["s2", "s5", "s7"]);
        let ids: Vec<_> = recording.events.iter().map(|e| e.html_snapshot_id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        for event in &recording.events {
            assert!(event.html_snapshot_id < recording.html_snapshots.len());
        }
    }

    #[test]
    fn click_type_click_scenario() {
        let raw = vec![
            click(0, "node-a"),
            keystroke(1, "node-b", "h"),
            keystroke(1, "node-b", "i"),
            click(1, "node-c"),
        ];
        let snapshots = vec!["first".to_string(), "second".to_string()];
        let recording = normalize(&raw, &snapshots);

        assert_eq!(recording.html_snapshots, vec!["first", "second"]);
        assert_eq!(recording.events.len(), 3);

        assert_eq!(recording.events[0].kind, EventKind::MouseClick);
        assert_eq!(recording.events[0].node_id, "node-a");
        assert_eq!(recording.events[0].html_snapshot_id, 0);

        assert_eq!(recording.events[1].kind, EventKind::Keypress);
        assert_eq!(recording.events[1].node_id, "node-b");
        assert_eq!(recording.events[1].text.as_deref(), Some("hi"));
        assert_eq!(recording.events[1].html_snapshot_id, 1);

        assert_eq!(recording.events[2].kind, EventKind::MouseClick);
        assert_eq!(recording.events[2].node_id, "node-c");
        assert_eq!(recording.events[2].html_snapshot_id, 1);
    }

    #[test]
    fn trailing_run_is_flushed() {
        let raw = vec![click(0, "a"), keystroke(0, "field", "o"), keystroke(0, "field", "k")];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert_eq!(recording.events.len(), 2);
        assert_eq!(recording.events[1].text.as_deref(), Some("ok"));
    }

    #[test]
    fn empty_log_normalizes_to_empty_recording() {
        let recording = normalize(&[], &["unreferenced".to_string()]);
        assert!(recording.events.is_empty());
        assert!(recording.html_snapshots.is_empty());
    }

    #[test]
    fn page_change_passes_through_with_url() {
        let raw = vec![RawRecordedAction::page_change(
            0,
            0,
            "https://example.com/login".to_string(),
        )];
        let recording = normalize(&raw, &["<body/>".to_string()]);
        assert_eq!(recording.events.len(), 1);
        assert_eq!(recording.events[0].kind, EventKind::MajorDomChange);
        assert_eq!(recording.events[0].node_id, "N/A");
        assert_eq!(
            recording.events[0].current_url.as_deref(),
            Some("https://example.com/login")
        );
    }
}
