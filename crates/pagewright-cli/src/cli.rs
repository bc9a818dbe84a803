use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pagewright")]
#[command(about = "🎬 Pagewright - record browser sessions and grow them into Selenium test suites")]
#[command(
    long_about = "Pagewright records a user's browser interactions over the DevTools protocol, \
enriches the recording with page names and validated XPath locators, and generates Selenium \
page-object classes plus a JUnit test case from it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a browser session into a JSON event log
    Record(RecordArgs),
    /// Derive page names and validated XPath locators for a recording
    Enrich(EnrichArgs),
    /// Generate Selenium page-object classes from an enriched recording
    GeneratePages(GeneratePagesArgs),
    /// Generate a JUnit test case driving the generated page objects
    GenerateTest(GenerateTestArgs),
    /// Convert IntelliJ HTTP-client tests into Java integration tests
    ConvertHttpTests(ConvertHttpTestsArgs),
}

#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// Page to open before the session starts
    #[clap(long, default_value = "about:blank")]
    pub url: String,

    /// Where the finalized recording is written
    #[clap(long, short = 'o', default_value = "browser-recording.json")]
    pub output: PathBuf,

    /// Browser binary to launch
    #[clap(long, env = "PAGEWRIGHT_CHROME")]
    pub chrome: Option<String>,

    /// Remote-debugging port
    #[clap(long, default_value_t = 9222)]
    pub port: u16,
}

#[derive(Parser, Debug)]
pub struct EnrichArgs {
    /// Recording produced by `pagewright record`
    #[clap(long, short = 'i', default_value = "browser-recording.json")]
    pub input: PathBuf,

    /// Output path; `enriched-<input name>` next to the input when unset
    #[clap(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Browser binary used for locator validation (headless)
    #[clap(long, env = "PAGEWRIGHT_CHROME")]
    pub chrome: Option<String>,

    /// Remote-debugging port for the validation browser
    #[clap(long, default_value_t = 9223)]
    pub port: u16,
}

#[derive(Parser, Debug)]
pub struct GeneratePagesArgs {
    /// Enriched recording produced by `pagewright enrich`
    #[clap(long, short = 'i', default_value = "enriched-browser-recording.json")]
    pub input: PathBuf,

    /// Output path; `page-objects-for-<input name>` next to the input when unset
    #[clap(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct GenerateTestArgs {
    /// Enriched recording produced by `pagewright enrich`
    #[clap(long, default_value = "enriched-browser-recording.json")]
    pub recording: PathBuf,

    /// Page objects produced by `pagewright generate-pages`
    #[clap(long, default_value = "page-objects-for-enriched-browser-recording.json")]
    pub page_objects: PathBuf,

    /// Output directory; `full-test-case-<recording stem>` when unset
    #[clap(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ConvertHttpTestsArgs {
    /// Directory with the example Java test to imitate
    #[clap(long, default_value = "test-template")]
    pub template: PathBuf,

    /// Directory with the IntelliJ HTTP-client tests to convert
    #[clap(long, short = 'i', default_value = "intellij-test-case")]
    pub input: PathBuf,

    /// Directory the generated Java files are written into
    #[clap(long, short = 'o', default_value = "output")]
    pub output: PathBuf,
}
