// Shared utilities for the harvesting pipeline
pub mod constants;
mod errors;
mod timeout;
mod wait_for_element;

pub use errors::{HarvestError, HarvestResult};
pub use timeout::{
    MAX_NAVIGATION_TIMEOUT_MS, MAX_SETTLE_MS, validate_navigation_timeout, validate_settle,
};
pub use wait_for_element::wait_for_element;
