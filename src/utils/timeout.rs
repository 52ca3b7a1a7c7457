//! Timeout validation utilities for harvest settings

use std::time::Duration;

use super::errors::{HarvestError, HarvestResult};

/// Maximum timeout for navigation and feed discovery (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000; // 5 minutes

/// Maximum pause between scroll rounds (30 seconds)
pub const MAX_SETTLE_MS: u64 = 30_000; // 30 seconds

/// Validate timeout for navigation operations (navigate, feed discovery)
///
/// # Arguments
/// * `timeout_ms` - Optional timeout in milliseconds
/// * `default_ms` - Default timeout if None provided
///
/// # Example
/// ```rust
/// # use maps_harvest::utils::validate_navigation_timeout;
/// let timeout = validate_navigation_timeout(Some(45000), 30000).unwrap();
/// assert_eq!(timeout.as_millis(), 45000);
/// ```
pub fn validate_navigation_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> HarvestResult<Duration> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(HarvestError::InvalidRequest(format!(
            "Timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(ms))
}

/// Validate a settle pause (scroll settle, load-more pause)
pub fn validate_settle(settle_ms: Option<u64>, default_ms: u64) -> HarvestResult<Duration> {
    let ms = settle_ms.unwrap_or(default_ms);

    if ms > MAX_SETTLE_MS {
        return Err(HarvestError::InvalidRequest(format!(
            "Settle pause cannot exceed {}ms ({} seconds). Received: {}ms ({} seconds)",
            MAX_SETTLE_MS,
            MAX_SETTLE_MS / 1000,
            ms,
            ms / 1000
        )));
    }

    Ok(Duration::from_millis(ms))
}
