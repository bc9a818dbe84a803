//! `pagewright generate-test`: one JUnit test case driving the generated
//! page objects, assembled from the event narrative.

use std::path::{Path, PathBuf};

use anyhow::Context;
use pagewright::{
    parse_json_reply, with_retry, ChatMessage, ChatModel, EnrichedRecording, EventKind,
    OpenAiChatModel, PageObject, TestCase,
};
use tracing::info;

use crate::cli::GenerateTestArgs;

pub async fn run(args: GenerateTestArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.recording)
        .with_context(|| format!("failed to read {}", args.recording.display()))?;
    let recording: EnrichedRecording =
        serde_json::from_str(&raw).context("enriched recording is not valid JSON")?;
    info!("enriched recording loaded");

    let raw = std::fs::read_to_string(&args.page_objects)
        .with_context(|| format!("failed to read {}", args.page_objects.display()))?;
    let page_objects: Vec<PageObject> =
        serde_json::from_str(&raw).context("page objects are not valid JSON")?;
    info!("page objects loaded");

    let output = args.output.clone().unwrap_or_else(|| default_output(&args.recording));
    let model = OpenAiChatModel::from_env("gpt-4o-mini")?.with_temperature(1.0);

    let test_cases = generate_testcases(&recording, &page_objects, &model).await?;
    write_artifacts(&output, &page_objects, &test_cases)?;
    info!(output = %output.display(), "test case written");
    Ok(())
}

fn default_output(recording: &Path) -> PathBuf {
    let stem = recording
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    recording.with_file_name(format!("full-test-case-{stem}"))
}

/// One step of the narrative the model turns into test code.
fn narrate(event: &pagewright::EnrichedRecordingEvent) -> String {
    match event.kind {
        EventKind::AssertElem => format!(
            "The window has '{}' visible (both hasElem... and click... methods can be used)",
            event.human_readable_node_name
        ),
        EventKind::MouseClick => format!(
            "The user clicks on '{}' with mouse",
            event.human_readable_node_name
        ),
        EventKind::Keypress => format!(
            "The user types text '{}' into '{}'",
            event.text.as_deref().unwrap_or(""),
            event.human_readable_node_name
        ),
        EventKind::MajorDomChange => format!(
            "The page URL is '{}'",
            event.current_url.as_deref().unwrap_or("")
        ),
    }
}

pub async fn generate_testcases(
    recording: &EnrichedRecording,
    page_objects: &[PageObject],
    model: &dyn ChatModel,
) -> anyhow::Result<Vec<TestCase>> {
    let mut messages = vec![
        ChatMessage::system("You are Senior Java developer and Automation QA with deep Selenium knowledge"),
        ChatMessage::user(
            "Your task is to generate Junit5 + Selenium Java test case from textual description and PageObject classes with description",
        ),
        ChatMessage::user("Generate JavaDoc as well"),
    ];
    for page_object in page_objects {
        messages.push(ChatMessage::user(format!(
            "There is following PageObject class - '{}' from package 'com.example.tests.pages'\n\
             The class has the following methods:\n\
             {}",
            page_object.class_name,
            page_object
                .methods
                .iter()
                .map(|m| m.to_java())
                .collect::<Vec<_>>()
                .join("\n - ")
        )));
    }
    messages.push(ChatMessage::user("The test goes the following way:"));
    for event in &recording.events {
        messages.push(ChatMessage::user(narrate(event)));
    }
    messages.push(ChatMessage::user("Use package: 'com.example.tests'"));
    messages.push(ChatMessage::user(
        "Name test class and test according to most suitable business process fitting the used methods and pages",
    ));
    messages.push(ChatMessage::user(
        "Hint: Do not use: String variable = \"TEXT\"; page.input(variable);\n\
         Use instead: page.input(\"TEXT\");",
    ));
    messages.push(ChatMessage::user(
        "All PageObject methods are fluent and have return type same as class, they assert things inside, DO NOT ADD ASSERTIONS",
    ));
    messages.push(ChatMessage::user(
        "Use fluent flow for PageObject method calls. Name tests according to business flow not technical flow",
    ));
    messages.push(ChatMessage::user(
        "DO NOT IMAGINE METHODS FROM PageObject THAT DO NOT EXIST! Use existing methods only!",
    ));
    messages.push(ChatMessage::user("Ensure all test steps are in Java code"));
    messages.push(ChatMessage::user(
        "Use @BeforeAll for initialization and store page objects in test class fields, construct WebDriver and pass it to page object constructor, tear down driver in AfterAll",
    ));
    messages.push(ChatMessage::user(
        "Generate raw JSON having {\"className\": string, \"javaCode\": string} (without quotes, references, markdown)",
    ));

    let test_case: TestCase = with_retry(3, || async {
        let reply = model.generate(&messages).await?;
        parse_json_reply(&reply.text)
    })
    .await?;
    Ok(vec![test_case])
}

/// Lay out the suite: page objects under `pages/`, test classes at the root.
/// The directory is recreated from scratch on every run.
pub fn write_artifacts(
    output: &Path,
    page_objects: &[PageObject],
    test_cases: &[TestCase],
) -> anyhow::Result<()> {
    if output.exists() {
        std::fs::remove_dir_all(output)?;
    }
    let pages_dir = output.join("pages");
    std::fs::create_dir_all(&pages_dir)?;

    for page_object in page_objects {
        std::fs::write(
            pages_dir.join(format!("{}.java", page_object.class_name)),
            &page_object.java_code,
        )?;
    }
    for test_case in test_cases {
        std::fs::write(
            output.join(format!("{}.java", test_case.class_name)),
            &test_case.java_code,
        )?;
    }
    Ok(())
}
