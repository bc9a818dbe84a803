//! Chrome process management and the page-level command surface.
//!
//! The browser is launched with a remote-debugging port, the first page
//! target is discovered over the `/json` HTTP endpoint, and a
//! [`CdpConnection`] is attached to it. [`Page`] wraps that connection with
//! the typed commands the pipeline needs and implements [`DebuggerBridge`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::info;

use crate::bridge::{DebuggerBridge, NodeHandle, PageEvent, Rgba};
use crate::cdp::{CdpConnection, CdpEvent};
use crate::errors::{AutomationError, Result};

/// User agent pinned for recording sessions so pages render the same way
/// between the recording run and later replays.
const RECORDING_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/41.0.2228.0 Safari/537.36";

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Browser binary; `google-chrome` when unset.
    pub binary: Option<String>,
    /// Remote-debugging port.
    pub port: u16,
    /// Run without a visible window. Recording wants a window; the locator
    /// validator does not.
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: None,
            port: 9222,
            headless: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    web_socket_debugger_url: Option<String>,
}

/// A running Chrome with an open debugging port. Killed on drop.
pub struct Browser {
    child: Child,
    http_base: String,
    // Held for its lifetime: Chrome writes its profile here.
    _profile_dir: tempfile::TempDir,
}

impl Browser {
    /// Spawn the browser and wait until its debugging endpoint answers.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let binary = config.binary.as_deref().unwrap_or("google-chrome");
        let profile_dir = tempfile::tempdir()?;
        let http_base = format!("http://127.0.0.1:{}", config.port);

        let mut cmd = Command::new(binary);
        cmd.arg(format!("--remote-debugging-port={}", config.port))
            .arg(format!("--user-data-dir={}", profile_dir.path().display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications")
            .arg(format!("--user-agent={RECORDING_USER_AGENT}"))
            .arg("about:blank")
            .kill_on_drop(true);
        if config.headless {
            cmd.arg("--headless=new");
        }

        let child = cmd
            .spawn()
            .map_err(|e| AutomationError::BrowserLaunch(format!("{binary}: {e}")))?;
        info!(binary, port = config.port, "browser started");

        let browser = Self {
            child,
            http_base,
            _profile_dir: profile_dir,
        };
        browser.wait_for_endpoint().await?;
        Ok(browser)
    }

    async fn wait_for_endpoint(&self) -> Result<()> {
        let url = format!("{}/json/version", self.http_base);
        for _ in 0..50 {
            if let Ok(resp) = reqwest::get(&url).await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Err(AutomationError::BrowserLaunch(format!(
            "debugging endpoint {url} never came up"
        )))
    }

    /// Attach to the first page target. Returns the typed command surface
    /// plus the channel of translated page events.
    pub async fn attach(&self) -> Result<(Page, mpsc::UnboundedReceiver<PageEvent>)> {
        let targets: Vec<TargetInfo> = reqwest::get(format!("{}/json", self.http_base))
            .await?
            .json()
            .await?;
        let ws_url = targets
            .into_iter()
            .find(|t| t.kind == "page")
            .and_then(|t| t.web_socket_debugger_url)
            .ok_or_else(|| {
                AutomationError::BrowserLaunch("no debuggable page target found".to_string())
            })?;

        let (cdp, cdp_events) = CdpConnection::connect(&ws_url).await?;
        let page = Page {
            cdp: Arc::new(cdp),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(translate_events(cdp_events, tx));
        Ok((page, rx))
    }

    /// Terminate the browser process.
    pub async fn close(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

/// Narrow the raw protocol event stream down to [`PageEvent`]s, stamping a
/// monotonic sequence id at translation time.
async fn translate_events(
    mut events: mpsc::UnboundedReceiver<CdpEvent>,
    tx: mpsc::UnboundedSender<PageEvent>,
) {
    let seq = AtomicI64::new(0);
    while let Some(event) = events.recv().await {
        let translated = match event.method.as_str() {
            "Runtime.consoleAPICalled" => monitored_event(&event.params, &seq),
            "DOM.documentUpdated" => Some(PageEvent::DocumentUpdated {
                seq: seq.fetch_add(1, Ordering::Relaxed),
            }),
            "DOM.childNodeInserted" => Some(PageEvent::ChildNodeInserted),
            "DOM.childNodeRemoved" => Some(PageEvent::ChildNodeRemoved),
            _ => None,
        };
        if let Some(translated) = translated {
            if tx.send(translated).is_err() {
                break;
            }
        }
    }
}

/// `monitorEvents` logs `(eventName, eventObject)` pairs through the console
/// API; anything else logged by the page is ignored.
fn monitored_event(params: &Value, seq: &AtomicI64) -> Option<PageEvent> {
    let args = params.get("args")?.as_array()?;
    if args.len() != 2 {
        return None;
    }
    let event = args[0].get("value")?.as_str()?;
    if !matches!(event, "mousedown" | "keydown" | "mousemove") {
        return None;
    }
    let object_id = args[1].get("objectId")?.as_str()?;
    Some(PageEvent::Monitored {
        seq: seq.fetch_add(1, Ordering::Relaxed),
        event: event.to_string(),
        object_id: object_id.to_string(),
    })
}

/// Typed command surface over one page target.
#[derive(Clone)]
pub struct Page {
    cdp: Arc<CdpConnection>,
}

impl Page {
    /// Enable the protocol domains the recorder needs and inject
    /// `monitorEvents` for the three input event classes on every new
    /// document. The command-line API must be available for `monitorEvents`
    /// to exist outside the console.
    pub async fn enable_monitoring(&self) -> Result<()> {
        self.cdp.send("Runtime.enable", json!({})).await?;
        self.cdp.send("Page.enable", json!({})).await?;
        self.cdp.send("DOM.enable", json!({})).await?;
        self.cdp.send("Overlay.enable", json!({})).await?;

        for class in ["mousemove", "mousedown", "keydown"] {
            self.cdp
                .send(
                    "Page.addScriptToEvaluateOnNewDocument",
                    json!({
                        "source": format!("monitorEvents(window, '{class}')"),
                        "includeCommandLineAPI": true,
                        "runImmediately": true,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Enable just enough of the protocol to evaluate scripts and set page
    /// content; used by the locator validator.
    pub async fn enable_scripting(&self) -> Result<()> {
        self.cdp.send("Runtime.enable", json!({})).await?;
        self.cdp.send("Page.enable", json!({})).await?;
        Ok(())
    }

    /// Evaluate an expression in page context and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let response = self
            .cdp
            .send(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(AutomationError::Protocol(format!(
                "script threw: {}",
                details.get("text").and_then(Value::as_str).unwrap_or("?")
            )));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Navigate the page.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.cdp.send("Page.navigate", json!({ "url": url })).await?;
        Ok(())
    }

    /// Replace the main frame's document with the given markup.
    pub async fn set_document_content(&self, html: &str) -> Result<()> {
        let tree = self.cdp.send("Page.getFrameTree", json!({})).await?;
        let frame_id = tree
            .pointer("/frameTree/frame/id")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::Protocol("frame tree without main frame".into()))?
            .to_string();
        self.cdp
            .send(
                "Page.setDocumentContent",
                json!({ "frameId": frame_id, "html": html }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DebuggerBridge for Page {
    async fn object_properties(&self, object_id: &str) -> Result<HashMap<String, Value>> {
        let response = self
            .cdp
            .send(
                "Runtime.getProperties",
                json!({ "objectId": object_id, "ownProperties": false }),
            )
            .await?;
        let descriptors = response
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| AutomationError::Protocol("getProperties without result".into()))?;

        let mut map = HashMap::new();
        for descriptor in descriptors {
            let Some(name) = descriptor.get("name").and_then(Value::as_str) else {
                continue;
            };
            if let Some(value) = descriptor.get("value") {
                map.insert(name.to_string(), value.clone());
            }
        }
        Ok(map)
    }

    async fn document_root(&self) -> Result<i64> {
        let response = self
            .cdp
            .send("DOM.getDocument", json!({ "depth": 0 }))
            .await?;
        response
            .pointer("/root/nodeId")
            .and_then(Value::as_i64)
            .ok_or_else(|| AutomationError::Protocol("document without root node".into()))
    }

    async fn request_node(&self, object_id: &str) -> Result<i64> {
        // The backend forgets remote nodes after document churn; asking for
        // the document root first repopulates its node map.
        self.document_root().await?;
        let response = self
            .cdp
            .send("DOM.requestNode", json!({ "objectId": object_id }))
            .await?;
        response
            .get("nodeId")
            .and_then(Value::as_i64)
            .ok_or_else(|| AutomationError::Protocol("requestNode without nodeId".into()))
    }

    async fn node_attributes(&self, node_id: i64) -> Result<HashMap<String, String>> {
        let response = self
            .cdp
            .send("DOM.getAttributes", json!({ "nodeId": node_id }))
            .await?;
        let flat = response
            .get("attributes")
            .and_then(Value::as_array)
            .ok_or_else(|| AutomationError::Protocol("getAttributes without list".into()))?;

        // The protocol interleaves names and values in one flat array.
        let mut map = HashMap::new();
        for pair in flat.chunks(2) {
            if let [name, value] = pair {
                if let (Some(name), Some(value)) = (name.as_str(), value.as_str()) {
                    map.insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(map)
    }

    async fn set_node_attribute(&self, node_id: i64, name: &str, value: &str) -> Result<()> {
        self.cdp
            .send(
                "DOM.setAttributeValue",
                json!({ "nodeId": node_id, "name": name, "value": value }),
            )
            .await?;
        Ok(())
    }

    async fn highlight(&self, target: NodeHandle, color: Rgba) -> Result<()> {
        let fill = json!({ "r": color.r, "g": color.g, "b": color.b, "a": color.a });
        let mut params = json!({
            "highlightConfig": { "contentColor": fill, "borderColor": fill }
        });
        match target {
            NodeHandle::Remote(object_id) => {
                params["objectId"] = Value::String(object_id);
            }
            NodeHandle::Node(node_id) => {
                params["nodeId"] = json!(node_id);
            }
        }
        self.cdp.send("Overlay.highlightNode", params).await?;
        Ok(())
    }

    async fn document_html(&self) -> Result<String> {
        let value = self.evaluate("document.body.innerHTML").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AutomationError::Protocol("body markup was not a string".into()))
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.evaluate("window.location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AutomationError::Protocol("location was not a string".into()))
    }
}
