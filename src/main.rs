// maps-harvest: collect Google Maps listings for a keyword and location,
// then export them as CSV and/or a PDF report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;
use maps_harvest::{
    ChromeLauncher, HarvestError, HarvestEvent, HarvestManager, HarvestOptions, HarvestRequest,
    RunStatus, load_config_from, load_yaml_config, suggested_file_name,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "maps-harvest",
    version,
    about = "Harvest business listings from Google Maps search results"
)]
struct Cli {
    /// What to search for, e.g. "coffee shop"
    #[arg(short, long)]
    keyword: String,

    /// Where to search, e.g. "New York"
    #[arg(short, long)]
    location: String,

    #[arg(short, long, value_name = "N", default_value_t = 50)]
    max_results: usize,

    /// CSV destination (file or directory)
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// PDF report destination (file or directory)
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Config file; defaults to config.yaml next to the manifest
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, default_value_t = false)]
    headed: bool,

    /// Skip repeated name/address pairs
    #[arg(long, default_value_t = false)]
    dedup: bool,
}

/// A directory destination gets the suggested file name appended
fn destination(path: &Path, cli: &Cli, ext: &str) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_file_name(&cli.keyword, &cli.location, ext))
    } else {
        path.to_path_buf()
    }
}

fn print_event(event: &HarvestEvent) {
    match event {
        HarvestEvent::Status(message) => println!("{message}"),
        HarvestEvent::Progress(count) => println!("Found {count} businesses..."),
        HarvestEvent::Complete(count) => println!("Done: {count} businesses"),
        HarvestEvent::Error(message) => eprintln!("Error: {message}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_yaml_config()?,
    };
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.dedup {
        config.harvest.dedup = true;
    }

    let options = HarvestOptions::from_config(&config)?;
    let manager = HarvestManager::new(ChromeLauncher::new(config.browser.clone()), options);

    let (tx, mut rx) = mpsc::unbounded_channel::<HarvestEvent>();
    let request = HarvestRequest::new(&cli.keyword, &cli.location, cli.max_results);
    let handle = manager.start_harvest(request, Arc::new(tx)).await?;

    // The worker owns the sender, so the channel closes when the run ends
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                info!("Interrupt received, stopping after the current step");
                manager.cancel(&handle);
                interrupted = true;
            }
        }
    }

    let outcome = manager
        .wait()
        .await
        .ok_or_else(|| anyhow!("harvest task was not started"))?;
    if let RunStatus::Failed(message) = &outcome.status {
        return Err(anyhow!("Harvest failed: {message}"));
    }

    let csv = match (&cli.csv, &cli.pdf) {
        (None, None) => Some(PathBuf::from(".")),
        (csv, _) => csv.clone(),
    };

    let mut exports = Vec::new();
    if let Some(path) = csv {
        let path = destination(&path, &cli, "csv");
        exports.push(manager.export_table(&path).await);
    }
    if let Some(path) = &cli.pdf {
        let path = destination(path, &cli, "pdf");
        exports.push(manager.export_report(&path).await);
    }

    for result in exports {
        match result {
            Ok(report) => println!("{}", report.message),
            Err(HarvestError::EmptyResultSet) => warn!("No data to save"),
            Err(e) => eprintln!("Error saving file: {e}"),
        }
    }

    Ok(())
}
