//! The harvesting pipeline
//!
//! Pagination materializes the feed, extraction turns card handles into
//! listings, and the accumulator numbers them. [`run_harvest`] strings the
//! three together for one keyword/location pass.

mod accumulator;
mod extract;
mod pagination;
mod record;
mod runner;
mod session;

pub use accumulator::Accumulator;
pub use extract::{
    FieldChain, FieldStrategy, Pick, RecordExtractor, Resolution, collapse_whitespace,
    discover_cards, normalize_address, normalize_phone, normalize_rating,
};
pub use pagination::{FeedController, FeedReport, PaginationOptions, StopReason};
pub use record::{CaptureContext, FIELD_NAMES, Listing, Record};
pub use runner::{
    HarvestEvent, HarvestObserver, HarvestOptions, NullObserver, RunOutcome, RunStatus,
    run_harvest, search_url,
};
pub use session::{HarvestRequest, RunSession};
