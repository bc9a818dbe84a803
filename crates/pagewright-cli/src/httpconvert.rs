//! `pagewright convert-http-tests`: turn IntelliJ HTTP-client tests into
//! Java integration tests, imitating a provided example template.

use std::path::Path;

use anyhow::Context;
use pagewright::{parse_json_reply, ChatMessage, ChatModel, OpenAiChatModel};
use serde::Deserialize;
use tracing::info;

use crate::cli::ConvertHttpTestsArgs;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub file_name: String,
    pub java_code: String,
}

pub async fn run(args: ConvertHttpTestsArgs) -> anyhow::Result<()> {
    let model = OpenAiChatModel::from_env("gpt-4o")?;

    let template = aggregate_files(&args.template)
        .with_context(|| format!("failed to read template dir {}", args.template.display()))?;
    let test_case = aggregate_files(&args.input)
        .with_context(|| format!("failed to read test dir {}", args.input.display()))?;

    info!("generating");
    let files = convert(&template, &test_case, &model).await?;

    std::fs::create_dir_all(&args.output)?;
    for file in &files {
        std::fs::write(args.output.join(&file.file_name), &file.java_code)?;
    }
    info!(output = %args.output.display(), files = files.len(), "conversion written");
    Ok(())
}

pub async fn convert(
    template: &str,
    test_case: &str,
    model: &dyn ChatModel,
) -> anyhow::Result<Vec<GeneratedFile>> {
    let messages = vec![
        ChatMessage::system(
            "You are an expert Java developer with deep IntelliJ HTTP client test knowledge",
        ),
        ChatMessage::user(
            "Your task is to convert IntelliJ HTTP client test to Java integration test with Spring Boot Test, Testcontainers, JGiven",
        ),
        ChatMessage::user(format!(
            "Here is an example Java testcase template you should follow:\n{template}"
        )),
        ChatMessage::user(format!(
            "Convert the following IntelliJ HTTP client test(s) to Java, generate all necessary Steps and Test files:\n{test_case}"
        )),
        ChatMessage::user(
            "Return result as raw JSON array of this format, follow it strictly!: [{\"fileName\": \"string\", \"javaCode\": \"string\"}]. Ensure JSON is properly quoted, do not use markdown!",
        ),
    ];

    let reply = model.generate(&messages).await?;
    info!(
        prompt_tokens = reply.usage.prompt_tokens,
        completion_tokens = reply.usage.completion_tokens,
        total_tokens = reply.usage.total_tokens,
        "generated"
    );
    let files: Vec<GeneratedFile> =
        parse_json_reply(&reply.text).context("conversion reply was not the expected JSON array")?;
    Ok(files)
}

/// Concatenate every file under `dir` (recursively, name-sorted) into one
/// labeled blob: `<file name>:` header, then the content.
pub fn aggregate_files(dir: &Path) -> std::io::Result<String> {
    let mut blob = String::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            blob.push_str(&aggregate_files(&path)?);
        } else {
            blob.push_str(&format!("{}: \n\n", entry.file_name().to_string_lossy()));
            blob.push_str(&std::fs::read_to_string(&path)?);
        }
    }
    Ok(blob)
}
