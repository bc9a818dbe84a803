//! `pagewright enrich`: derive page names and validated XPath locators.
//!
//! Page names are memoized per snapshot, with the previous page's name
//! offered back to the model as a reusable hint. Locators are requested in
//! ranked batches and every candidate is checked against the historical
//! snapshot (loaded into a headless page) before it is accepted.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;
use pagewright::{
    clean_html, parse_json_reply, Browser, BrowserConfig, ChatMessage, ChatModel, EnrichedRecording,
    EnrichedRecordingEvent, EventKind, OpenAiChatModel, Page, Recording, Result as CoreResult,
    NODE_ID_MARKER,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::EnrichArgs;
use crate::naming;

/// Attributes worth keeping when asking for a page name.
const PAGE_NAME_ATTRS: &[&str] = &["href"];

/// Attributes worth keeping when asking for locators: the marker itself (the
/// model must see where the element is), label associations, and a few
/// descriptive ones.
const LOCATOR_ATTRS: &[&str] = &[NODE_ID_MARKER, "for", "id", "href", "title", "alt", "src"];

/// How many candidate batches to request before giving up on an element.
const CANDIDATE_ROUNDS: usize = 10;

/// A locator candidate as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpathData {
    pub xpath: String,
    pub human_readable_element_name: String,
}

/// What the snapshot DOM said about one candidate.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct XpathProbe {
    /// Number of nodes the expression selects.
    pub matches: u64,
    /// The first selected node is the annotated element.
    pub hit: bool,
    /// The single selected node encloses the annotated element within two
    /// levels.
    pub encloses: bool,
}

/// Evaluates candidate locators against a loaded snapshot.
#[async_trait]
pub trait LocatorValidator: Send + Sync {
    async fn load(&self, html: &str) -> CoreResult<()>;
    async fn check(&self, xpath: &str, node_id: &str) -> CoreResult<XpathProbe>;
}

const PROBE_SCRIPT: &str = r#"(() => {
    const xpath = __XPATH__;
    const marker = __MARKER__;
    const wanted = __NODE__;
    let snapshot;
    try {
        snapshot = document.evaluate(xpath, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    } catch (e) {
        return { matches: 0, hit: false, encloses: false };
    }
    const matches = snapshot.snapshotLength;
    let hit = false;
    let encloses = false;
    if (matches > 0) {
        const first = snapshot.snapshotItem(0);
        if (first.getAttribute && first.getAttribute(marker) === wanted) {
            hit = true;
        }
    }
    if (matches === 1) {
        const first = snapshot.snapshotItem(0);
        if (first.querySelectorAll) {
            const nested = first.querySelectorAll('[' + marker + '="' + wanted + '"]');
            for (const el of nested) {
                let depth = 0;
                let cursor = el;
                while (cursor && cursor !== first && depth <= 2) {
                    depth += 1;
                    cursor = cursor.parentElement;
                }
                if (cursor === first && depth <= 2) {
                    encloses = true;
                    break;
                }
            }
        }
    }
    return { matches: matches, hit: hit, encloses: encloses };
})()"#;

/// Validator backed by a real (headless) page: snapshots become the live
/// document and candidates run through the same XPath engine Selenium uses.
pub struct SnapshotValidator {
    page: Page,
}

impl SnapshotValidator {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait]
impl LocatorValidator for SnapshotValidator {
    async fn load(&self, html: &str) -> CoreResult<()> {
        self.page.set_document_content(html).await
    }

    async fn check(&self, xpath: &str, node_id: &str) -> CoreResult<XpathProbe> {
        let script = PROBE_SCRIPT
            .replace("__XPATH__", &serde_json::to_string(xpath)?)
            .replace("__MARKER__", &serde_json::to_string(NODE_ID_MARKER)?)
            .replace("__NODE__", &serde_json::to_string(node_id)?);
        let value = self.page.evaluate(&script).await?;
        Ok(serde_json::from_value(value)?)
    }
}

pub async fn run(args: EnrichArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let recording: Recording = serde_json::from_str(&raw).context("recording is not valid JSON")?;
    info!("recording loaded");

    let model = OpenAiChatModel::from_env("gpt-4o-mini")?;

    let config = BrowserConfig {
        binary: args.chrome.clone(),
        port: args.port,
        headless: true,
    };
    let browser = Browser::launch(&config)
        .await
        .context("failed to launch the validation browser")?;
    let (page, _events) = browser.attach().await?;
    page.enable_scripting().await?;
    let validator = SnapshotValidator::new(page);

    let enriched = enrich_recording(&recording, &model, &validator).await?;
    let enriched = naming::unify_page_names(enriched, &model).await?;

    std::fs::write(&output, serde_json::to_string_pretty(&enriched)?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(output = %output.display(), "enriched recording written");

    browser.close().await?;
    Ok(())
}

fn default_output(input: &std::path::Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "browser-recording.json".to_string());
    input.with_file_name(format!("enriched-{name}"))
}

/// Walk the events in order, deriving a locator and a page name for each.
/// Both are memoized: locators per (snapshot, node), names per snapshot.
pub async fn enrich_recording(
    recording: &Recording,
    model: &dyn ChatModel,
    validator: &dyn LocatorValidator,
) -> anyhow::Result<EnrichedRecording> {
    let mut prev_page_name: Option<String> = None;
    let mut page_names: HashMap<usize, String> = HashMap::new();
    let mut locators: HashMap<(usize, String), XpathData> = HashMap::new();
    let mut events = Vec::with_capacity(recording.events.len());

    for event in &recording.events {
        let html = &recording.html_snapshots[event.html_snapshot_id];
        let key = (event.html_snapshot_id, event.node_id.clone());

        let locator = match locators.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let derived = if event.kind == EventKind::MajorDomChange {
                    // Page-level event: no element to locate, and the next
                    // page should be named without the stale hint.
                    prev_page_name = None;
                    XpathData {
                        xpath: "N/A".to_string(),
                        human_readable_element_name: String::new(),
                    }
                } else {
                    derive_xpath(model, validator, html, &event.node_id, event.kind).await?
                };
                locators.insert(key, derived.clone());
                derived
            }
        };

        let page_name = match page_names.get(&event.html_snapshot_id) {
            Some(cached) => cached.clone(),
            None => {
                let name = extract_page_name(model, html, prev_page_name.as_deref()).await?;
                page_names.insert(event.html_snapshot_id, name.clone());
                name
            }
        };
        prev_page_name = Some(page_name.clone());

        events.push(EnrichedRecordingEvent {
            html_snapshot_id: event.html_snapshot_id,
            page_name: page_name.to_lowercase(),
            kind: event.kind,
            node_id: event.node_id.clone(),
            xpath: locator.xpath,
            human_readable_node_name: locator.human_readable_element_name,
            text: event.text.clone(),
            char_code: event.char_code,
            current_url: event.current_url.clone(),
        });
    }

    Ok(EnrichedRecording {
        html_snapshots: recording.html_snapshots.clone(),
        events,
    })
}

async fn extract_page_name(
    model: &dyn ChatModel,
    html: &str,
    prev_name: Option<&str>,
) -> anyhow::Result<String> {
    let cleaned = clean_html(html, PAGE_NAME_ATTRS);
    let hint = match prev_name {
        Some(prev) => format!("Check this page name '{prev}' maybe it fits? If it does, use it!"),
        None => String::new(),
    };

    let messages = vec![
        ChatMessage::system(
            "You are helpful data extraction agent, with deep HTML/CSS knowledge and expert in Angular and React frameworks",
        ),
        ChatMessage::user(
            "Generate simple and concise page name for the HTML below, provide raw Page name (without quotes, comments, explanation):",
        ),
        ChatMessage::user(format!(
            "If there is a dialog on page, append the dialog name to meaningful page name. {hint}"
        )),
        ChatMessage::user("Do not mix business and technical concepts!"),
        ChatMessage::user(cleaned),
    ];
    Ok(model.generate(&messages).await?.text.trim().to_string())
}

/// Ask for ranked locator batches until one survives validation.
///
/// A candidate is accepted when it selects the annotated element outright,
/// or — the relaxed path — when it is a unique, text-anchored match that
/// encloses the annotated element within two levels. Every rejected
/// candidate is fed back to the model as a WRONG hint.
pub async fn derive_xpath(
    model: &dyn ChatModel,
    validator: &dyn LocatorValidator,
    html: &str,
    node_id: &str,
    kind: EventKind,
) -> anyhow::Result<XpathData> {
    let cleaned = clean_html(html, LOCATOR_ATTRS);
    validator.load(html).await?;

    let mut hints: Vec<ChatMessage> = Vec::new();
    for round in 1..=CANDIDATE_ROUNDS {
        let mut messages = vec![
            ChatMessage::system(
                "You are helpful data extraction agent, XPath professional, with deep HTML/CSS knowledge and expert in Angular and React frameworks",
            ),
            ChatMessage::user(format!(
                "Locate an element having attribute '{NODE_ID_MARKER}' with value '{node_id}' in the provided HTML, memoize its location"
            )),
        ];
        messages.extend(hints.iter().cloned());
        messages.push(ChatMessage::user(candidate_request(node_id, kind, round)));
        messages.push(ChatMessage::user(cleaned.clone()));

        let reply = model.generate(&messages).await?;
        let candidates: Vec<XpathData> = match parse_json_reply(&reply.text) {
            Ok(candidates) => candidates,
            Err(e) => {
                info!("unusable candidate batch: {e}");
                continue;
            }
        };

        for candidate in candidates {
            if candidate.xpath.contains(node_id)
                || candidate.xpath.contains(NODE_ID_MARKER)
                || candidate.xpath.contains("@id")
            {
                info!("basic quality gate failed: {}", candidate.xpath);
                continue;
            }

            info!("trying: {}", candidate.xpath);
            let probe = validator.check(&candidate.xpath, node_id).await?;
            if probe.hit {
                return Ok(candidate);
            }

            let text_anchored = candidate.xpath.contains("text()")
                || candidate.xpath.contains("normalize-space()");
            if probe.matches == 1
                && text_anchored
                && !candidate.xpath.contains("=''")
                && probe.encloses
            {
                info!("afterburner matches: {}", candidate.xpath);
                return Ok(candidate);
            }

            info!("failed xpath: {}, matches {}", candidate.xpath, probe.matches);
            hints.push(ChatMessage::user(format!(
                "Hint: XPath {} is WRONG!{}",
                candidate.xpath,
                if round > 3 {
                    ", Try completely different Xpath structure"
                } else {
                    ""
                }
            )));
        }
    }

    std::fs::write("debug-locator-cleaned-up.html", &cleaned)?;
    std::fs::write("debug-locator-raw.html", html)?;
    bail!("failed to find XPath for {node_id}");
}

fn candidate_request(node_id: &str, kind: EventKind, round: usize) -> String {
    let depth = if round < 3 { 3 } else { 5 };
    let kind_hint = match kind {
        EventKind::Keypress => {
            "The XPath should point to the element that accepts input from keyboard (i.e. input)\n"
        }
        EventKind::MouseClick => "The XPath should point to the clickable element\n",
        _ => "",
    };
    format!(
        "Provide only the JSON Array with 10 XPath locators that are as short as possible (in order from shortest to longest) variants for\n\
         element having '{NODE_ID_MARKER}' with value '{node_id}' that are short and robust to changes (DO NOT USE '{NODE_ID_MARKER}', DO NOT USE 'id' in Xpath, DO NOT USE NUMERIC INDEXES!):\n\
         [{{\"xpath\": string, \"humanReadableElementName\": string}}]\n\
         {kind_hint}Prefer to use element text and try to normalize spaces in XPath, limit XPath depth to {depth}\n\
         If there is <label> with 'for' attribute, associated with for input/element - try to utilize them\n\
         (without quotes, comments, explanation, markdown) to locate it in this HTML:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockModel;
    use pagewright::RecordingEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockValidator {
        probes: Mutex<HashMap<String, XpathProbe>>,
        checked: Mutex<Vec<String>>,
    }

    impl MockValidator {
        fn probe(&self, xpath: &str, probe: XpathProbe) {
            self.probes.lock().unwrap().insert(xpath.to_string(), probe);
        }

        fn checked(&self) -> Vec<String> {
            self.checked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LocatorValidator for MockValidator {
        async fn load(&self, _html: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn check(&self, xpath: &str, _node_id: &str) -> CoreResult<XpathProbe> {
            self.checked.lock().unwrap().push(xpath.to_string());
            Ok(self
                .probes
                .lock()
                .unwrap()
                .get(xpath)
                .copied()
                .unwrap_or_default())
        }
    }

    fn candidates(list: &[(&str, &str)]) -> String {
        let entries: Vec<_> = list
            .iter()
            .map(|(xpath, name)| {
                serde_json::json!({ "xpath": xpath, "humanReadableElementName": name })
            })
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    #[tokio::test]
    async fn quality_gate_rejects_without_dom_check() {
        let model = MockModel::new(vec![candidates(&[
            ("//*[@id='save']", "Save button"),
            ("//button[normalize-space()='Save']", "Save button"),
        ])]);
        let validator = MockValidator::default();
        validator.probe(
            "//button[normalize-space()='Save']",
            XpathProbe {
                matches: 1,
                hit: true,
                encloses: false,
            },
        );

        let found = derive_xpath(&model, &validator, "<button>Save</button>", "node-1", EventKind::MouseClick)
            .await
            .unwrap();
        assert_eq!(found.xpath, "//button[normalize-space()='Save']");
        // The gated candidate never reached the DOM.
        assert_eq!(validator.checked(), vec!["//button[normalize-space()='Save']"]);
    }

    #[tokio::test]
    async fn afterburner_accepts_unique_enclosing_text_match() {
        let model = MockModel::new(vec![candidates(&[(
            "//div[contains(normalize-space(), 'Totals')]",
            "Totals section",
        )])]);
        let validator = MockValidator::default();
        validator.probe(
            "//div[contains(normalize-space(), 'Totals')]",
            XpathProbe {
                matches: 1,
                hit: false,
                encloses: true,
            },
        );

        let found = derive_xpath(&model, &validator, "<div>Totals</div>", "node-2", EventKind::AssertElem)
            .await
            .unwrap();
        assert_eq!(found.human_readable_element_name, "Totals section");
    }

    #[tokio::test]
    async fn rejected_candidates_become_hints() {
        let model = MockModel::new(vec![
            candidates(&[("//span[text()='Misses']", "wrong")]),
            candidates(&[("//a[text()='Cart']", "Cart link")]),
        ]);
        let validator = MockValidator::default();
        validator.probe(
            "//a[text()='Cart']",
            XpathProbe {
                matches: 1,
                hit: true,
                encloses: false,
            },
        );

        let found = derive_xpath(&model, &validator, "<a>Cart</a>", "node-3", EventKind::MouseClick)
            .await
            .unwrap();
        assert_eq!(found.xpath, "//a[text()='Cart']");

        let second_round = &model.calls()[1];
        assert!(second_round
            .iter()
            .any(|m| m.content.contains("Hint: XPath //span[text()='Misses'] is WRONG!")));
    }

    #[tokio::test]
    async fn gives_up_after_all_rounds() {
        let replies: Vec<String> = (0..CANDIDATE_ROUNDS)
            .map(|_| candidates(&[("//div[text()='never']", "never")]))
            .collect();
        let model = MockModel::new(replies);
        let validator = MockValidator::default();

        let tmp = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        let result =
            derive_xpath(&model, &validator, "<div/>", "node-4", EventKind::MouseClick).await;
        std::env::set_current_dir(cwd).unwrap();

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn enrichment_memoizes_names_and_locators() {
        let recording = Recording {
            html_snapshots: vec!["<form node-id-for-tests-only=\"field-1\"></form>".to_string()],
            events: vec![
                RecordingEvent {
                    html_snapshot_id: 0,
                    kind: EventKind::MajorDomChange,
                    node_id: "N/A".to_string(),
                    text: None,
                    char_code: None,
                    current_url: Some("https://shop.test/login".to_string()),
                },
                RecordingEvent {
                    html_snapshot_id: 0,
                    kind: EventKind::MouseClick,
                    node_id: "field-1".to_string(),
                    text: None,
                    char_code: None,
                    current_url: None,
                },
                RecordingEvent {
                    html_snapshot_id: 0,
                    kind: EventKind::MouseClick,
                    node_id: "field-1".to_string(),
                    text: None,
                    char_code: None,
                    current_url: None,
                },
            ],
        };

        // One page-name call, one locator batch; the repeated click reuses
        // both caches.
        let model = MockModel::new(vec![
            "Login Page".to_string(),
            candidates(&[("//form", "Login form")]),
        ]);
        let validator = MockValidator::default();
        validator.probe(
            "//form",
            XpathProbe {
                matches: 1,
                hit: true,
                encloses: false,
            },
        );

        let enriched = enrich_recording(&recording, &model, &validator).await.unwrap();
        assert!(model.is_exhausted());

        assert_eq!(enriched.events.len(), 3);
        assert!(enriched.events.iter().all(|e| e.page_name == "login page"));
        assert_eq!(enriched.events[0].xpath, "N/A");
        assert_eq!(enriched.events[1].xpath, "//form");
        assert_eq!(enriched.events[2].xpath, "//form");
    }
}
