//! Feed pagination with height-stagnation detection
//!
//! The results feed only materializes items as it is scrolled. Each round
//! scrolls the feed to its current extent, waits for injected content, and
//! re-measures. The loop stops when enough anchors exist, when the extent
//! has not grown for `max_stagnant_rounds` rounds, when `max_rounds` is
//! reached, when cancelled, or when a round faults. None of those is an
//! error: whatever was loaded is still worth extracting.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::HarvestConfig;
use crate::dom::DomCapability;
use crate::utils::constants::{
    FEED_SELECTOR, ITEM_ANCHOR_SELECTOR, LOAD_MORE_LABELS, LOAD_MORE_SELECTOR, SCROLL_EXTENT_JS,
    SCROLL_TO_END_JS,
};
use crate::utils::{HarvestError, HarvestResult, wait_for_element};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub target_count: usize,
    pub max_stagnant_rounds: usize,
    pub max_rounds: usize,
    pub settle: Duration,
    pub feed_timeout: Duration,
    pub load_more_pause: Duration,
}

impl PaginationOptions {
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count,
            max_stagnant_rounds: 3,
            max_rounds: 20,
            settle: Duration::from_secs(2),
            feed_timeout: Duration::from_secs(10),
            load_more_pause: Duration::from_secs(2),
        }
    }

    pub fn from_config(target_count: usize, config: &HarvestConfig) -> HarvestResult<Self> {
        Ok(Self {
            target_count,
            max_stagnant_rounds: config.max_stagnant_rounds.max(1),
            max_rounds: config.max_rounds,
            settle: crate::utils::validate_settle(Some(config.settle_ms), 2_000)?,
            feed_timeout: crate::utils::validate_navigation_timeout(
                Some(config.feed_timeout_ms),
                10_000,
            )?,
            load_more_pause: crate::utils::validate_settle(Some(config.load_more_pause_ms), 2_000)?,
        })
    }
}

/// Why the scroll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// Extent stopped growing
    Exhausted,
    RoundCap,
    Cancelled,
    /// A scroll or measurement failed; carries the fault message
    RoundFault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub rounds: usize,
    pub loaded: usize,
    pub stop: StopReason,
}

/// Drives one feed; borrows the run's DOM session for the duration
pub struct FeedController<'a, D: DomCapability> {
    dom: &'a D,
    options: PaginationOptions,
    cancel: CancellationToken,
}

impl<'a, D: DomCapability> FeedController<'a, D> {
    pub fn new(dom: &'a D, options: PaginationOptions, cancel: CancellationToken) -> Self {
        Self {
            dom,
            options,
            cancel,
        }
    }

    /// Scroll the feed until one of the stop conditions holds
    ///
    /// Fails only with [`HarvestError::FeedNotFound`] when the feed never
    /// appears within `feed_timeout`.
    pub async fn load_feed(&self) -> HarvestResult<FeedReport> {
        let feed = wait_for_element(self.dom, FEED_SELECTOR, self.options.feed_timeout)
            .await
            .ok_or_else(|| HarvestError::FeedNotFound {
                selector: FEED_SELECTOR.to_string(),
                waited_ms: self.options.feed_timeout.as_millis(),
            })?;
        info!("Found results feed");

        let mut last_extent = match self.extent(&feed, SCROLL_EXTENT_JS).await {
            Ok(extent) => extent,
            Err(e) => return Ok(self.fault(0, 0, e).await),
        };

        let mut loaded = 0;
        let mut stagnant = 0;

        for round in 1..=self.options.max_rounds {
            if self.cancel.is_cancelled() {
                return Ok(FeedReport {
                    rounds: round - 1,
                    loaded,
                    stop: StopReason::Cancelled,
                });
            }

            if let Err(e) = self.extent(&feed, SCROLL_TO_END_JS).await {
                return Ok(self.fault(round, loaded, e).await);
            }
            tokio::time::sleep(self.options.settle).await;

            let extent = match self.extent(&feed, SCROLL_EXTENT_JS).await {
                Ok(extent) => extent,
                Err(e) => return Ok(self.fault(round, loaded, e).await),
            };

            if extent == last_extent {
                stagnant += 1;
            } else {
                stagnant = 0;
            }
            last_extent = extent;

            loaded = match self.dom.find_all(ITEM_ANCHOR_SELECTOR).await {
                Ok(items) => items.len(),
                Err(e) => return Ok(self.fault(round, loaded, e).await),
            };
            debug!(
                "Round {}: extent {}, {} results loaded, stagnant for {}",
                round, extent, loaded, stagnant
            );
            info!("Loaded {} results so far...", loaded);

            if loaded >= self.options.target_count {
                return Ok(FeedReport {
                    rounds: round,
                    loaded,
                    stop: StopReason::TargetReached,
                });
            }
            if stagnant >= self.options.max_stagnant_rounds {
                return Ok(FeedReport {
                    rounds: round,
                    loaded,
                    stop: StopReason::Exhausted,
                });
            }

            self.press_load_more().await;
        }

        Ok(FeedReport {
            rounds: self.options.max_rounds,
            loaded,
            stop: StopReason::RoundCap,
        })
    }

    async fn extent(&self, feed: &D::Handle, script: &str) -> HarvestResult<u64> {
        let value = self.dom.execute_script(script, Some(feed)).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
            .ok_or_else(|| HarvestError::Dom(format!("scroll extent was not a number: {value}")))
    }

    async fn fault(&self, rounds: usize, loaded: usize, err: HarvestError) -> FeedReport {
        warn!("Scrolling stopped after {} rounds: {}", rounds, err);
        // Re-count so the report reflects what the page actually holds
        let loaded = match self.dom.find_all(ITEM_ANCHOR_SELECTOR).await {
            Ok(items) => items.len(),
            Err(_) => loaded,
        };
        FeedReport {
            rounds,
            loaded,
            stop: StopReason::RoundFault(err.to_string()),
        }
    }

    /// Click a "more results" button if one is showing; absence is normal
    async fn press_load_more(&self) {
        let buttons = match self.dom.find_all(LOAD_MORE_SELECTOR).await {
            Ok(buttons) => buttons,
            Err(e) => {
                debug!("Load-more lookup failed: {}", e);
                return;
            }
        };

        for button in &buttons {
            let Ok(label) = self.dom.text(button).await else {
                continue;
            };
            if !LOAD_MORE_LABELS.iter().any(|l| label.contains(l)) {
                continue;
            }
            match self.dom.click(button).await {
                Ok(()) => {
                    debug!("Clicked '{}'", label.trim());
                    tokio::time::sleep(self.options.load_more_pause).await;
                }
                Err(e) => debug!("Load-more click failed: {}", e),
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDom, FakeNode, FeedStage};

    fn dom_with_feed(stages: Vec<FeedStage>) -> FakeDom {
        let dom = FakeDom::new();
        let feed = dom.add_node(FakeNode::default());
        dom.on_select(FEED_SELECTOR, vec![feed]);
        dom.with_feed(stages);
        dom
    }

    fn stage(extent: u64, items: usize) -> FeedStage {
        FeedStage { extent, items }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_feed_is_feed_not_found() {
        let dom = FakeDom::new();
        let controller = FeedController::new(&dom, PaginationOptions::new(10), CancellationToken::new());
        let err = controller.load_feed().await.unwrap_err();
        assert!(matches!(err, HarvestError::FeedNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_at_target() {
        let dom = dom_with_feed(vec![stage(100, 5), stage(200, 10), stage(300, 15), stage(400, 20)]);
        let controller = FeedController::new(&dom, PaginationOptions::new(15), CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.stop, StopReason::TargetReached);
        assert_eq!(report.loaded, 15);
        assert_eq!(report.rounds, 2);
        assert_eq!(dom.scrolls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stagnant_extent_means_exhausted() {
        let dom = dom_with_feed(vec![stage(100, 4), stage(200, 8)]);
        let controller = FeedController::new(&dom, PaginationOptions::new(50), CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.loaded, 8);
        // one growing round, then three unchanged ones
        assert_eq!(report.rounds, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn growth_resets_stagnation() {
        let dom = dom_with_feed(vec![
            stage(100, 1),
            stage(100, 1),
            stage(100, 1),
            stage(200, 2),
            stage(200, 2),
        ]);
        let controller = FeedController::new(&dom, PaginationOptions::new(50), CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        // rounds 1-2 stagnant, round 3 grows, rounds 4-6 stagnant
        assert_eq!(report.rounds, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn never_stabilizing_feed_hits_round_cap() {
        let stages = (1..=40).map(|i| stage(i * 100, i as usize)).collect();
        let dom = dom_with_feed(stages);
        let mut options = PaginationOptions::new(1_000);
        options.max_rounds = 20;
        let controller = FeedController::new(&dom, options, CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.stop, StopReason::RoundCap);
        assert_eq!(report.rounds, 20);
        assert_eq!(dom.scrolls(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_feed_is_success() {
        let dom = dom_with_feed(vec![stage(0, 0)]);
        let controller = FeedController::new(&dom, PaginationOptions::new(20), CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.loaded, 0);
        assert_eq!(report.stop, StopReason::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn round_fault_keeps_what_was_loaded() {
        let dom = dom_with_feed(vec![stage(100, 5), stage(200, 10), stage(300, 15)]);
        // initial measure + one full round (scroll, measure) succeed
        dom.fail_scripts_after(3);
        let controller = FeedController::new(&dom, PaginationOptions::new(50), CancellationToken::new());
        let report = controller.load_feed().await.unwrap();
        assert!(matches!(report.stop, StopReason::RoundFault(_)));
        assert_eq!(report.loaded, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_round() {
        let dom = dom_with_feed(vec![stage(100, 5)]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let controller = FeedController::new(&dom, PaginationOptions::new(50), cancel);
        let report = controller.load_feed().await.unwrap();
        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(dom.scrolls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn presses_load_more_when_present() {
        let dom = dom_with_feed(vec![stage(100, 5), stage(200, 10), stage(300, 15), stage(400, 20)]);
        let other = dom.add_node(FakeNode::with_text("Directions"));
        let more = dom.add_node(FakeNode::with_text("Show more results"));
        dom.on_select(LOAD_MORE_SELECTOR, vec![other, more]);
        let controller = FeedController::new(&dom, PaginationOptions::new(20), CancellationToken::new());
        controller.load_feed().await.unwrap();
        // clicked after rounds 1 and 2, not after the target was reached
        assert_eq!(dom.clicks(), vec![more, more]);
    }
}
