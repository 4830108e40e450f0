use anyhow::{Context, Result};
use console::style;
use reevo::assets::{AssetDownloader, DownloadOutcome, ModelAsset};
use reevo::config::AgentConfig;

pub async fn run(config: &AgentConfig) -> Result<()> {
    let downloader = AssetDownloader::new(config.model_dir());
    println!(
        "Fetching model files into {}",
        style(downloader.dir().display()).cyan()
    );

    let outcomes = downloader
        .fetch_all(&ModelAsset::defaults())
        .await
        .context("Model download failed")?;

    for (name, outcome) in outcomes {
        let detail = match outcome {
            DownloadOutcome::Downloaded { bytes } => format!("downloaded {} bytes", bytes),
            DownloadOutcome::AlreadyPresent => "already present".to_string(),
        };
        println!("  {} {} {}", style("✓").green(), name, style(detail).dim());
    }
    Ok(())
}
