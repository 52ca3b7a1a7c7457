//! Browser infrastructure for launching and managing Chrome instances

mod setup;
mod wrapper;

pub use setup::{download_managed_browser, find_browser_executable};
pub use wrapper::BrowserWrapper;
