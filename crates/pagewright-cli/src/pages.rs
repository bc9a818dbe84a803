//! `pagewright generate-pages`: page-object classes from an enriched
//! recording. Grouping only; the model does the Java.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pagewright::{
    parse_json_reply, with_retry, ChatMessage, ChatModel, EnrichedRecording,
    EnrichedRecordingEvent, EventKind, MethodRef, OpenAiChatModel, PageObject,
};
use serde::Deserialize;
use tracing::info;

use crate::cli::GeneratePagesArgs;

const JAVA_PERSONA: &str = "You are Senior Java developer and Automation QA with deep Selenium knowledge";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedName {
    class_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedClass {
    class_name: String,
    java_code: String,
}

pub async fn run(args: GeneratePagesArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let recording: EnrichedRecording =
        serde_json::from_str(&raw).context("enriched recording is not valid JSON")?;
    info!("enriched recording loaded");

    let model = OpenAiChatModel::from_env("gpt-4o-mini")?.with_temperature(1.0);
    let pages = generate_page_objects(&recording, &model).await?;

    std::fs::write(&output, serde_json::to_string_pretty(&pages)?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(output = %output.display(), pages = pages.len(), "page objects written");
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "enriched-browser-recording.json".to_string());
    input.with_file_name(format!("page-objects-for-{name}"))
}

/// Group items by key, keeping first-appearance order of the keys.
fn group_in_order<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}

fn has_assert(events: &[&EnrichedRecordingEvent]) -> bool {
    events.iter().any(|e| e.kind == EventKind::AssertElem)
}

fn has_click(events: &[&EnrichedRecordingEvent]) -> bool {
    events.iter().any(|e| e.kind == EventKind::MouseClick)
}

fn has_input(events: &[&EnrichedRecordingEvent]) -> bool {
    events.iter().any(|e| e.kind == EventKind::Keypress)
}

fn url_events_only(events: &[&EnrichedRecordingEvent]) -> bool {
    !events.iter().any(|e| e.kind != EventKind::MajorDomChange)
}

fn element_block(events: &[&EnrichedRecordingEvent], with_usage_hints: bool) -> String {
    let elem_name = &events[0].human_readable_node_name;
    let xpaths: BTreeSet<&str> = events.iter().map(|e| e.xpath.as_str()).collect();
    let listed = xpaths.into_iter().collect::<Vec<_>>().join("\n- ");

    if with_usage_hints {
        let mut hints = String::new();
        if has_assert(events) {
            hints.push_str("element is used to check if it is on page, use hasElement method name format, ");
        }
        if has_click(events) {
            hints.push_str("element is used to click on it, ");
        }
        if has_input(events) {
            hints.push_str("element is used to input text, ");
        }
        format!("There is an element '{elem_name}', that can be located using (\n{hints}):\n- {listed}")
    } else {
        format!("There is an element '{elem_name}', that can be located using:\n- {listed}")
    }
}

pub async fn generate_page_objects(
    recording: &EnrichedRecording,
    model: &dyn ChatModel,
) -> anyhow::Result<Vec<PageObject>> {
    let class_names = generate_class_names(recording, model).await?;
    let by_class = group_in_order(recording.events.iter(), |e| {
        class_names[&e.page_name].clone()
    });

    let mut current_url = String::new();
    let mut result = Vec::new();
    for (class_name, page_events) in by_class {
        let by_node = group_in_order(page_events.iter().copied(), |e| e.node_id.clone());
        if let Some(url) = page_events.iter().filter_map(|e| e.current_url.as_deref()).last() {
            current_url = url.to_string();
        }

        let methods = generate_method_signatures(model, &class_name, &by_node).await?;

        info!("generating page object source for {class_name}");
        let mut messages = vec![
            ChatMessage::system(JAVA_PERSONA),
            ChatMessage::user(format!(
                "Your task is to generate page object with class name '{class_name}'. Use Selenium and Selenium waits and @FindBy."
            )),
            ChatMessage::user(
                "Methods like 'hasElem' are used only to assert certain element is visible, we should only wait for visibility there, they have void type",
            ),
            ChatMessage::user(
                "Use package com.example.tests, FindBy locators should be above constructor. Store WebDriver as class field.",
            ),
            ChatMessage::user("Generate JavaDoc as well. Always include JavaDoc for locator or/and FindBy!"),
            ChatMessage::user("Never pass locator as the method argument!"),
            ChatMessage::user("All locators MUST USE XPath! Each locator must be a class field and be backed with FindBy!"),
            ChatMessage::user(format!("In class-level JavaDoc include page URL: {current_url}")),
            ChatMessage::user(
                "Wait for any element to be visible, for input elements wait for them to be visible and active",
            ),
        ];
        for (_, group) in &by_node {
            if url_events_only(group) {
                if let Some(url) = group[0].current_url.as_deref() {
                    messages.push(ChatMessage::user(format!(
                        "Page URL is: '{url}' that you want to assert hasPageUrl.. like method"
                    )));
                }
                continue;
            }
            messages.push(ChatMessage::user(element_block(group, false)));
        }
        messages.push(ChatMessage::user(format!(
            "WebDriverWait uses Duration class for timeout, use 5 seconds as timeout.\n\
             WebDriverWait MUST be a PageObject class field.\n\
             Page MUST have the following Java methods with signatures, methods MUST be Fluent - they should return 'this', DO NOT use try-catch:\n\
             - {}",
            methods
                .iter()
                .map(|m| m.to_fluent_java(&class_name))
                .collect::<Vec<_>>()
                .join("\n - ")
        )));
        messages.push(ChatMessage::user(
            "Respond with JSON: {\"className\": string, \"javaCode\": string} (no quotes, references, markdown, etc.)",
        ));

        let generated: GeneratedClass = with_retry(3, || async {
            let reply = model.generate(&messages).await?;
            parse_json_reply(&reply.text)
        })
        .await?;

        result.push(PageObject {
            class_name: generated.class_name.clone(),
            page_name: class_name,
            java_code: generated.java_code,
            methods: methods
                .into_iter()
                .map(|m| MethodRef {
                    return_value: Some(generated.class_name.clone()),
                    ..m
                })
                .collect(),
        });
    }

    Ok(result)
}

/// One short model call per page: its page-object class name.
async fn generate_class_names(
    recording: &EnrichedRecording,
    model: &dyn ChatModel,
) -> anyhow::Result<HashMap<String, String>> {
    let mut result = HashMap::new();
    for (page_name, _) in group_in_order(recording.events.iter(), |e| e.page_name.clone()) {
        let messages = vec![
            ChatMessage::system(JAVA_PERSONA),
            ChatMessage::user(format!(
                "Generate class name of page object for page name '{page_name}'"
            )),
            ChatMessage::user(
                "Respond only with JSON {\"className\": \"string\"}, nothing else (no quotes, markdown, explanation)",
            ),
        ];
        let name: GeneratedName = with_retry(3, || async {
            let reply = model.generate(&messages).await?;
            parse_json_reply(&reply.text)
        })
        .await?;
        result.insert(page_name, name.class_name);
    }
    Ok(result)
}

async fn generate_method_signatures(
    model: &dyn ChatModel,
    class_name: &str,
    by_node: &[(String, Vec<&EnrichedRecordingEvent>)],
) -> anyhow::Result<Vec<MethodRef>> {
    info!("generating method signatures for {class_name}");
    let mut messages = vec![
        ChatMessage::system(JAVA_PERSONA),
        ChatMessage::user(format!(
            "Your task is to generate page object method signatures for page object class '{class_name}'"
        )),
    ];
    for (_, group) in by_node {
        if url_events_only(group) {
            if let Some(url) = group[0].current_url.as_deref() {
                messages.push(ChatMessage::user(format!(
                    "Page URL is: '{url}' that you want to assert using hasPageUrl.. like method"
                )));
            }
            continue;
        }
        messages.push(ChatMessage::user(element_block(group, true)));
    }
    messages.push(ChatMessage::user(
        "Never pass WebDriver as method argument!\n\
         Respond with JSON array: [{\"methodName\": string, \"arguments\": [{\"type\": string, \"name\": string}]}] (no quotes, references, etc.)",
    ));

    let methods = with_retry(3, || async {
        let reply = model.generate(&messages).await?;
        parse_json_reply::<Vec<MethodRef>>(&reply.text)
    })
    .await?;
    Ok(methods)
}
