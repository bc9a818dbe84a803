//! Uniform surface the recorder sees over a live debugging session.
//!
//! The recorder never talks to the protocol directly: it consumes
//! [`PageEvent`]s from a channel and issues the handful of node-level
//! commands below. Keeping this a trait lets tests drive the state machine
//! with a scripted fake instead of a browser.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

/// Fill color used when flashing an element on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// A DOM node addressed either by a runtime remote-object id or by a
/// DOM-domain node id. Highlighting accepts both, mirroring the protocol.
#[derive(Debug, Clone)]
pub enum NodeHandle {
    Remote(String),
    Node(i64),
}

/// One notification delivered by the browser, already narrowed to the event
/// classes the recorder cares about. `seq` is a monotonically increasing
/// counter assigned at translation time; it orders events for debugging and
/// carries no correctness weight.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A monitored user-input event (`mousedown`, `keydown`, `mousemove`)
    /// with the remote-object id of the DOM event object.
    Monitored {
        seq: i64,
        event: String,
        object_id: String,
    },
    /// The whole document was replaced (navigation, large re-render).
    DocumentUpdated { seq: i64 },
    /// A node was attached somewhere in the tree.
    ChildNodeInserted,
    /// A node was detached somewhere in the tree.
    ChildNodeRemoved,
}

/// Commands the recorder (and the locator validator) may issue against a
/// page. All calls are awaited inline; a slow browser stalls only the
/// notification currently being handled.
#[async_trait]
pub trait DebuggerBridge: Send + Sync {
    /// Own properties of a remote object, keyed by property name. Each value
    /// is the property's remote-object representation: primitives carry a
    /// `value` field, nodes carry an `objectId`.
    async fn object_properties(&self, object_id: &str) -> Result<HashMap<String, Value>>;

    /// Node id of the document root. Also refreshes the backend's node map,
    /// which `request_node` depends on.
    async fn document_root(&self) -> Result<i64>;

    /// Resolve a remote object into a DOM node id.
    async fn request_node(&self, object_id: &str) -> Result<i64>;

    /// Attribute map of a node.
    async fn node_attributes(&self, node_id: i64) -> Result<HashMap<String, String>>;

    /// Write one attribute on a node.
    async fn set_node_attribute(&self, node_id: i64, name: &str, value: &str) -> Result<()>;

    /// Flash an element with a translucent fill.
    async fn highlight(&self, target: NodeHandle, color: Rgba) -> Result<()>;

    /// Serialized `document.body` markup of the page as it stands now.
    async fn document_html(&self) -> Result<String>;

    /// URL the page is currently on.
    async fn current_url(&self) -> Result<String>;
}
