//! Browser lifecycle for a single harvest run

use std::path::PathBuf;

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::setup::launch_chrome;
use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed; `Drop` does that. The profile directory is only
/// removed by [`BrowserWrapper::shutdown`], after Chrome has released it.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    /// Launch a browser with a per-run profile directory
    ///
    /// The run id keeps concurrent processes off each other's profile locks.
    pub async fn launch(config: &BrowserConfig, run_id: &str) -> Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "maps_harvest_{}_{}",
            std::process::id(),
            run_id
        ));
        let (browser, handler, user_data_dir) = launch_chrome(config, dir).await?;
        Ok(Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        })
    }

    /// Open a blank tab to drive
    pub async fn new_page(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .context("Failed to create blank page")
    }

    /// Close Chrome, wait for the process to exit, then remove the profile
    ///
    /// Both `close()` and `wait()` are needed: dropping only aborts the
    /// handler and leaves a zombie process behind.
    pub async fn shutdown(&mut self) {
        info!("Shutting down browser");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }

        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without shutdown(); profile directory orphaned: {}",
                path.display()
            );
        }
    }
}
