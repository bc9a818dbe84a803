//! Data model shared by every pipeline stage.
//!
//! Field names and enum spellings here are the wire contract between the
//! recorder output, the enrichment stage, and the generators. Changing any
//! of them breaks previously persisted recordings.

use serde::{Deserialize, Serialize};

/// Attribute written onto annotated DOM nodes so they can be re-located in
/// historical snapshots. Stripped out of prompts and forbidden in generated
/// locators.
pub const NODE_ID_MARKER: &str = "node-id-for-tests-only";

/// Logical action taxonomy of a finalized recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MouseClick,
    Keypress,
    AssertElem,
    MajorDomChange,
}

/// One logical user action, ready for downstream consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingEvent {
    /// Index into [`Recording::html_snapshots`], compacted so only
    /// referenced snapshots survive.
    pub html_snapshot_id: usize,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Stable node marker value, or `"N/A"` for page-level events.
    pub node_id: String,
    /// Reconstructed text for collapsed keypress runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_code: Option<i64>,
    /// Only present on MAJOR_DOM_CHANGE events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
}

/// The artifact of one recording session: deduplicated snapshots plus the
/// normalized event log. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub html_snapshots: Vec<String>,
    pub events: Vec<RecordingEvent>,
}

/// A recording event after page naming and locator derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecordingEvent {
    pub html_snapshot_id: usize,
    pub page_name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub node_id: String,
    pub xpath: String,
    pub human_readable_node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecording {
    pub html_snapshots: Vec<String>,
    pub events: Vec<EnrichedRecordingEvent>,
}

/// One argument of a generated page-object method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Signature of a generated page-object method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRef {
    pub method_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<MethodArgument>>,
}

impl MethodRef {
    /// Render as a fluent Java signature returning the page-object class.
    pub fn to_fluent_java(&self, ret_class: &str) -> String {
        format!("{ret_class} {}({})", self.method_name, self.java_args())
    }

    /// Render as a plain Java signature.
    pub fn to_java(&self) -> String {
        format!(
            "{} {}({})",
            self.return_value.as_deref().unwrap_or(""),
            self.method_name,
            self.java_args()
        )
    }

    fn java_args(&self) -> String {
        self.arguments
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|a| format!("{} {}", a.kind, a.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A generated page-object class plus the method surface the test-case
/// stage is allowed to reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageObject {
    pub class_name: String,
    pub page_name: String,
    pub java_code: String,
    #[serde(default)]
    pub methods: Vec<MethodRef>,
}

/// A generated test class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub class_name: String,
    pub java_code: String,
}
