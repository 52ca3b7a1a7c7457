//! Listing harvester for the Google Maps results feed
//!
//! Drives a Chrome session through the scrolling results feed, extracts one
//! record per business card, and exports the accumulated set as CSV or as a
//! paginated PDF report.

mod browser;
pub mod dom;
pub mod export;
pub mod harvest;
mod manager;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::constants::DEFAULT_SEARCH_BASE_URL;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub harvest: HarvestConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,

    /// CDP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Pagination and pacing for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Unchanged-extent rounds before the feed counts as exhausted
    #[serde(default = "default_max_stagnant_rounds")]
    pub max_stagnant_rounds: usize,

    /// Pause after each scroll
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_feed_timeout_ms")]
    pub feed_timeout_ms: u64,

    /// Pause after clicking a "more results" button
    #[serde(default = "default_load_more_pause_ms")]
    pub load_more_pause_ms: u64,

    /// Pause after opening the search page
    #[serde(default = "default_navigation_settle_ms")]
    pub navigation_settle_ms: u64,

    /// Skip repeated (name, address) pairs within a run
    #[serde(default)]
    pub dedup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_rounds() -> usize {
    20
}
fn default_max_stagnant_rounds() -> usize {
    3
}
fn default_settle_ms() -> u64 {
    2_000
}
fn default_feed_timeout_ms() -> u64 {
    10_000
}
fn default_load_more_pause_ms() -> u64 {
    2_000
}
fn default_navigation_settle_ms() -> u64 {
    3_000
}

fn default_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_stagnant_rounds: default_max_stagnant_rounds(),
            settle_ms: default_settle_ms(),
            feed_timeout_ms: default_feed_timeout_ms(),
            load_more_pause_ms: default_load_more_pause_ms(),
            navigation_settle_ms: default_navigation_settle_ms(),
            dedup: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
    load_config_from(&config_path)
}

/// Load config from `path`, falling back to defaults when it does not exist
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserWrapper, download_managed_browser, find_browser_executable};
pub use dom::{ChromeLauncher, ChromeSession, DomCapability, DomLauncher};
pub use export::{ExportReport, ReportContext, suggested_file_name, write_report, write_table};
pub use harvest::{
    Accumulator, FIELD_NAMES, HarvestEvent, HarvestObserver, HarvestOptions, HarvestRequest,
    Listing, NullObserver, Record, RunOutcome, RunStatus,
};
pub use manager::{HarvestManager, RunHandle};
pub use utils::{HarvestError, HarvestResult};
