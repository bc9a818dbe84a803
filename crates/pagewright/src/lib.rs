//! Record browser interactions over the DevTools protocol and grow them into
//! Selenium test suites.
//!
//! This crate carries the pieces every pipeline stage shares: the debugging
//! transport and page command surface, the recording data model, the
//! language-model client, and the HTML scrubber used to fit snapshots into
//! prompts.

pub mod bridge;
pub mod browser;
pub mod cdp;
pub mod errors;
pub mod llm;
pub mod recording;
pub mod sanitize;

pub use bridge::{DebuggerBridge, NodeHandle, PageEvent, Rgba};
pub use browser::{Browser, BrowserConfig, Page};
pub use cdp::{CdpConnection, CdpEvent};
pub use errors::{AutomationError, Result};
pub use llm::{
    parse_json_reply, with_retry, ChatMessage, ChatModel, ChatReply, ChatRole, OpenAiChatModel,
    TokenUsage,
};
pub use recording::{
    EnrichedRecording, EnrichedRecordingEvent, EventKind, MethodArgument, MethodRef, PageObject,
    Recording, RecordingEvent, TestCase, NODE_ID_MARKER,
};
pub use sanitize::clean_html;
