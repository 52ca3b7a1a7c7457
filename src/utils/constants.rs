//! Shared configuration constants for the harvester
//!
//! Selectors and scripts describe the one feed shape this crate targets: a
//! scrollable `role="feed"` region whose items are anchors to place pages.

/// Chrome user agent string for stealth mode
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Scrollable results region
pub const FEED_SELECTOR: &str = "div[role='feed']";

/// One anchor per materialized result item
pub const ITEM_ANCHOR_SELECTOR: &str = "a[href*='maps/place']";

/// Card containers, tried in order until one matches anything
pub const CARD_SELECTORS: &[&str] = &[
    "div[role='article']",
    "div.section-result",
    ":has(> * > a[href*='maps/place'])",
];

/// Candidate "load more" affordances
pub const LOAD_MORE_SELECTOR: &str = "button";

/// Button labels that mean "fetch another page"
pub const LOAD_MORE_LABELS: &[&str] = &["Show more results", "More results"];

/// Called with `this` bound to the feed element
pub const SCROLL_TO_END_JS: &str =
    "function() { this.scrollTop = this.scrollHeight; return this.scrollHeight; }";

/// Called with `this` bound to the feed element
pub const SCROLL_EXTENT_JS: &str = "function() { return this.scrollHeight; }";

/// Default map application entry point
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.google.com/maps";
