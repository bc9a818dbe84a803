//! `pagewright record`: drive a visible browser and capture one session.

use std::sync::Arc;

use anyhow::Context;
use pagewright::{Browser, BrowserConfig};
use pagewright_recorder::ActionRecorder;
use tracing::info;

use crate::cli::RecordArgs;

pub async fn run(args: RecordArgs) -> anyhow::Result<()> {
    let config = BrowserConfig {
        binary: args.chrome.clone(),
        port: args.port,
        headless: false,
    };
    let browser = Browser::launch(&config)
        .await
        .context("failed to launch the recording browser")?;
    let (page, events) = browser.attach().await?;
    page.enable_monitoring().await?;
    page.navigate(&args.url).await?;

    println!("Use Ctrl+Shift+R to start recording");
    println!("Use Ctrl+Shift+S to stop recording and persist it");
    println!("Use Ctrl+Shift+W to highlight the hovered element as a possible assertion");
    println!("Use Ctrl+Shift+C to confirm the assertion");
    println!("Press Ctrl+C in this terminal when you are done.");

    let mut recorder = ActionRecorder::new(Arc::new(page), args.output);
    tokio::select! {
        result = recorder.run(events) => {
            result.context("recorder loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    browser.close().await?;
    Ok(())
}
