//! Element polling utility for SPA support
//!
//! Map results are rendered by JavaScript well after the load event fires,
//! so discovery polls with exponential backoff instead of a single lookup.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::dom::DomCapability;

/// Wait for the first element matching `selector`
///
/// Returns `None` once `timeout` has elapsed without a match. Lookup
/// faults during polling count as "not there yet".
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
pub async fn wait_for_element<D: DomCapability>(
    dom: &D,
    selector: &str,
    timeout: Duration,
) -> Option<D::Handle> {
    let start = Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        match dom.find_all(selector).await {
            Ok(found) => {
                if let Some(first) = found.into_iter().next() {
                    return Some(first);
                }
            }
            Err(e) => debug!("Polling '{}' failed: {}", selector, e),
        }

        if start.elapsed() >= timeout {
            return None;
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
