//! Error types shared across the pipeline

use thiserror::Error;

/// Result type alias for pagewright operations
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Errors produced by the browser session, the debugging transport and the
/// language-model client.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// WebSocket-level failure on the debugging connection
    #[error("debugger transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The browser process could not be started or attached to
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// The HTTP endpoint listing debuggable targets was unreachable
    #[error("debugger endpoint discovery failed: {0}")]
    EndpointDiscovery(#[from] reqwest::Error),

    /// The browser rejected a protocol command
    #[error("command {method} failed: {message}")]
    Command { method: String, message: String },

    /// A protocol payload did not have the expected shape
    #[error("unexpected protocol payload: {0}")]
    Protocol(String),

    /// The debugging connection went away mid-command
    #[error("debugger connection closed")]
    ConnectionClosed,

    /// Language model request failed or returned an unusable completion
    #[error("language model error: {0}")]
    Llm(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
