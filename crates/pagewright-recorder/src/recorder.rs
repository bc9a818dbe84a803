//! The recording state machine.
//!
//! One [`ActionRecorder`] owns all session state and consumes the page's
//! event channel from a single loop, so every mutation of the recording
//! lists is serialized without locks. Bridge commands are awaited inline; a
//! failed command aborts only the notification being handled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use pagewright::{AutomationError, DebuggerBridge, NodeHandle, PageEvent, NODE_ID_MARKER};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collapse;
use crate::events::{
    ControlChord, RawRecordedAction, ASSERT_CONFIRMED, ASSERT_MARKED, KEYSTROKE_TARGET,
    RECORDING_STARTED, RECORDING_STOPPED,
};
use crate::persist;
use crate::RecorderError;

/// Records one operator session against a live page.
pub struct ActionRecorder {
    bridge: Arc<dyn DebuggerBridge>,
    output_path: PathBuf,
    is_recording: bool,
    raw_events: Vec<RawRecordedAction>,
    html_snapshots: Vec<String>,
    /// Remote-object id of the last hovered node; tracked regardless of the
    /// recording flag so assertions can target it the moment recording is on.
    element_under_pointer: Option<String>,
}

impl ActionRecorder {
    pub fn new(bridge: Arc<dyn DebuggerBridge>, output_path: PathBuf) -> Self {
        Self {
            bridge,
            output_path,
            is_recording: false,
            raw_events: Vec::new(),
            html_snapshots: Vec::new(),
            element_under_pointer: None,
        }
    }

    /// Consume page events until the channel closes. Each notification is
    /// handled in isolation: an error aborts that notification only.
    pub async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<PageEvent>,
    ) -> Result<(), RecorderError> {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                warn!("notification handling failed: {e}");
            }
        }
        Ok(())
    }

    async fn handle(&mut self, event: PageEvent) -> Result<(), RecorderError> {
        match event {
            PageEvent::Monitored {
                seq,
                event,
                object_id,
            } => match event.as_str() {
                "mousemove" => self.on_pointer_move(&object_id).await,
                "mousedown" => self.on_pointer_click(seq, &object_id).await,
                "keydown" => self.on_key_down(seq, &object_id).await,
                _ => Ok(()),
            },
            PageEvent::DocumentUpdated { seq } => self.on_document_updated(seq).await,
            PageEvent::ChildNodeInserted | PageEvent::ChildNodeRemoved => {
                self.on_child_node_changed().await
            }
        }
    }

    /// Pointer tracking runs even while stopped; the hovered element is the
    /// assertion target once the operator hits the mark chord.
    async fn on_pointer_move(&mut self, object_id: &str) -> Result<(), RecorderError> {
        let props = self.bridge.object_properties(object_id).await?;
        self.element_under_pointer = prop_object_id(&props, "target");
        Ok(())
    }

    async fn on_pointer_click(&mut self, seq: i64, object_id: &str) -> Result<(), RecorderError> {
        if !self.is_recording {
            return Ok(());
        }
        let props = self.bridge.object_properties(object_id).await?;
        let target = prop_object_id(&props, "target")
            .ok_or_else(|| AutomationError::Protocol("click event without target".into()))?;
        let node_id = self.pin_node(&target).await?;
        self.raw_events.push(RawRecordedAction::click(
            seq,
            self.html_snapshots.len() - 1,
            node_id,
        ));
        Ok(())
    }

    async fn on_key_down(&mut self, seq: i64, object_id: &str) -> Result<(), RecorderError> {
        let props = self.bridge.object_properties(object_id).await?;
        let code = prop_str(&props, "code");
        let ctrl = prop_bool(&props, "ctrlKey").unwrap_or(false);
        let shift = prop_bool(&props, "shiftKey").unwrap_or(false);

        if let Some(chord) = code
            .as_deref()
            .and_then(|code| ControlChord::from_key(code, ctrl, shift))
        {
            return self.on_control_chord(seq, chord).await;
        }

        if !self.is_recording {
            return Ok(());
        }
        let target = prop_object_id(&props, "target")
            .ok_or_else(|| AutomationError::Protocol("key event without target".into()))?;
        self.bridge
            .highlight(NodeHandle::Remote(target.clone()), KEYSTROKE_TARGET)
            .await?;
        let node_id = self.pin_node(&target).await?;
        self.raw_events.push(RawRecordedAction::keystroke(
            seq,
            self.html_snapshots.len() - 1,
            node_id,
            prop_str(&props, "key"),
            prop_i64(&props, "keyCode"),
        ));
        Ok(())
    }

    async fn on_control_chord(
        &mut self,
        seq: i64,
        chord: ControlChord,
    ) -> Result<(), RecorderError> {
        match chord {
            ControlChord::StartRecording => {
                if self.is_recording {
                    return Ok(());
                }
                let snapshot = self.bridge.document_html().await?;
                self.html_snapshots.push(snapshot);
                self.is_recording = true;

                let url = self.bridge.current_url().await?;
                self.raw_events.push(RawRecordedAction::page_change(
                    seq,
                    self.html_snapshots.len() - 1,
                    url,
                ));

                let root = self.bridge.document_root().await?;
                self.bridge
                    .highlight(NodeHandle::Node(root), RECORDING_STARTED)
                    .await?;
                info!("recording started");
            }
            ControlChord::StopRecording => {
                let was_recording = self.is_recording;
                self.is_recording = false;
                let root = self.bridge.document_root().await?;
                self.bridge
                    .highlight(NodeHandle::Node(root), RECORDING_STOPPED)
                    .await?;
                info!("recording stopped");
                if was_recording {
                    self.finalize()?;
                }
            }
            ControlChord::MarkAssertion => {
                let Some(target) = self.element_under_pointer.clone() else {
                    return Ok(());
                };
                if !self.is_recording {
                    return Ok(());
                }
                info!("highlighting possible assertion");
                self.bridge
                    .highlight(NodeHandle::Remote(target), ASSERT_MARKED)
                    .await?;
            }
            ControlChord::ConfirmAssertion => {
                let Some(target) = self.element_under_pointer.clone() else {
                    return Ok(());
                };
                if !self.is_recording {
                    return Ok(());
                }
                info!("confirming assertion");
                let node_id = self.pin_node(&target).await?;
                self.bridge
                    .highlight(NodeHandle::Remote(target), ASSERT_CONFIRMED)
                    .await?;
                self.raw_events.push(RawRecordedAction::assertion(
                    seq,
                    self.html_snapshots.len() - 1,
                    node_id,
                ));
            }
        }
        Ok(())
    }

    /// A whole-document replacement is itself a recordable action: it gets a
    /// snapshot and a MAJOR_DOM_CHANGE event carrying the new URL.
    async fn on_document_updated(&mut self, seq: i64) -> Result<(), RecorderError> {
        if !self.is_recording {
            return Ok(());
        }
        let snapshot = self.bridge.document_html().await?;
        self.html_snapshots.push(snapshot);
        let url = self.bridge.current_url().await?;
        self.raw_events.push(RawRecordedAction::page_change(
            seq,
            self.html_snapshots.len() - 1,
            url,
        ));
        Ok(())
    }

    /// Single-node insertions/removals refresh the snapshot list but append
    /// no event. Asymmetric with `on_document_updated` on purpose; changing
    /// this would change which snapshot later events resolve against.
    async fn on_child_node_changed(&mut self) -> Result<(), RecorderError> {
        if !self.is_recording {
            return Ok(());
        }
        let snapshot = self.bridge.document_html().await?;
        self.html_snapshots.push(snapshot);
        Ok(())
    }

    /// Obtain the stable marker for a live node. Re-annotation returns the
    /// existing marker without side effects; first annotation writes the
    /// marker attribute and captures a snapshot that contains it.
    async fn pin_node(&mut self, object_id: &str) -> Result<String, RecorderError> {
        let node_id = self.bridge.request_node(object_id).await?;
        let attrs = self.bridge.node_attributes(node_id).await?;
        if let Some(existing) = attrs.get(NODE_ID_MARKER) {
            return Ok(existing.clone());
        }

        let fresh = Uuid::new_v4().to_string();
        self.bridge
            .set_node_attribute(node_id, NODE_ID_MARKER, &fresh)
            .await?;
        self.html_snapshots.push(self.bridge.document_html().await?);
        Ok(fresh)
    }

    fn finalize(&mut self) -> Result<(), RecorderError> {
        let recording = collapse::normalize(&self.raw_events, &self.html_snapshots);
        persist::persist_recording(&recording, &self.output_path)?;
        self.raw_events.clear();
        self.html_snapshots.clear();
        Ok(())
    }
}

fn prop_str(props: &HashMap<String, Value>, name: &str) -> Option<String> {
    props
        .get(name)?
        .get("value")?
        .as_str()
        .map(str::to_string)
}

fn prop_bool(props: &HashMap<String, Value>, name: &str) -> Option<bool> {
    props.get(name)?.get("value")?.as_bool()
}

fn prop_i64(props: &HashMap<String, Value>, name: &str) -> Option<i64> {
    props.get(name)?.get("value")?.as_i64()
}

fn prop_object_id(props: &HashMap<String, Value>, name: &str) -> Option<String> {
    props
        .get(name)?
        .get("objectId")?
        .as_str()
        .map(str::to_string)
}
