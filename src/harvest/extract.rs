//! Record extraction through prioritized fallback chains
//!
//! Result cards come in several markup variants, so each field is resolved
//! by an ordered list of [`FieldStrategy`] values. The first strategy that
//! yields non-empty text wins. The outcome of a chain is one of three
//! things, and each maps to a fixed policy:
//!
//! - found: the field is set
//! - absent (nothing matched): the field is left empty; for the name, the
//!   card is skipped without complaint
//! - faulted (every strategy errored): treated as absent for optional
//!   fields; for the name, the card is logged and skipped
//!
//! Nothing a single card does can abort the batch.

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::record::{CaptureContext, Listing};
use crate::dom::DomCapability;
use crate::utils::{HarvestError, HarvestResult};

/// One way of reading a field out of a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStrategy {
    /// Text of the first descendant matching the selector
    Text(&'static str),
    /// Attribute of the first descendant matching the selector
    Attribute {
        selector: &'static str,
        name: &'static str,
    },
    /// Descendant matching the selector whose text contains `needle`
    TextContaining {
        selector: &'static str,
        needle: &'static str,
        pick: Pick,
    },
}

/// Which candidate a [`FieldStrategy::TextContaining`] keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// First in document order
    First,
    /// Shortest text, the innermost of nested matches
    Shortest,
}

impl FieldStrategy {
    async fn read<D: DomCapability>(&self, dom: &D, card: &D::Handle) -> HarvestResult<Option<String>> {
        match self {
            FieldStrategy::Text(selector) => match dom.find_within(card, selector).await? {
                Some(el) => Ok(Some(dom.text(&el).await?)),
                None => Ok(None),
            },
            FieldStrategy::Attribute { selector, name } => {
                match dom.find_within(card, selector).await? {
                    Some(el) => dom.attribute(&el, name).await,
                    None => Ok(None),
                }
            }
            FieldStrategy::TextContaining {
                selector,
                needle,
                pick,
            } => {
                let mut best: Option<String> = None;
                for el in dom.find_all_within(card, selector).await? {
                    // a stale candidate does not spoil its siblings
                    let Ok(text) = dom.text(&el).await else {
                        continue;
                    };
                    if !text.contains(needle) {
                        continue;
                    }
                    if *pick == Pick::First {
                        return Ok(Some(text));
                    }
                    if best.as_ref().is_none_or(|b| text.len() < b.len()) {
                        best = Some(text);
                    }
                }
                Ok(best)
            }
        }
    }
}

/// Outcome of running a chain against one card
#[derive(Debug)]
pub enum Resolution {
    Found(String),
    Absent,
    Faulted(HarvestError),
}

/// Ordered strategies for a single field plus the cleanup applied to hits
#[derive(Debug, Clone)]
pub struct FieldChain {
    pub field: &'static str,
    pub strategies: Vec<FieldStrategy>,
    pub normalize: fn(&str) -> String,
}

impl FieldChain {
    pub fn new(field: &'static str, strategies: Vec<FieldStrategy>) -> Self {
        Self {
            field,
            strategies,
            normalize: collapse_whitespace,
        }
    }

    pub fn normalized(mut self, normalize: fn(&str) -> String) -> Self {
        self.normalize = normalize;
        self
    }

    pub async fn resolve<D: DomCapability>(&self, dom: &D, card: &D::Handle) -> Resolution {
        let mut faults = 0;
        let mut last_fault = None;

        for strategy in &self.strategies {
            match strategy.read(dom, card).await {
                Ok(Some(raw)) => {
                    let value = (self.normalize)(&raw);
                    if !value.is_empty() {
                        return Resolution::Found(value);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    trace!("{} strategy {:?} failed: {}", self.field, strategy, e);
                    faults += 1;
                    last_fault = Some(e);
                }
            }
        }

        match last_fault {
            Some(e) if faults == self.strategies.len() => Resolution::Faulted(e),
            _ => Resolution::Absent,
        }
    }

    async fn optional<D: DomCapability>(&self, dom: &D, card: &D::Handle) -> Option<String> {
        match self.resolve(dom, card).await {
            Resolution::Found(value) => Some(value),
            Resolution::Absent => None,
            Resolution::Faulted(e) => {
                debug!("{} unreadable: {}", self.field, e);
                None
            }
        }
    }
}

/// Trim and collapse internal runs of whitespace
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "4.5 stars" -> "4.5", left as free text
pub fn normalize_rating(raw: &str) -> String {
    collapse_whitespace(&raw.replace("stars", "").replace("star", ""))
}

/// "Bakery · 12 Main St" -> "12 Main St"
pub fn normalize_address(raw: &str) -> String {
    raw.split('·')
        .map(collapse_whitespace)
        .rfind(|part| !part.is_empty())
        .unwrap_or_default()
}

pub fn normalize_phone(raw: &str) -> String {
    collapse_whitespace(raw.trim_start_matches("tel:"))
}

/// Field chains for every column a card can supply
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    pub name: FieldChain,
    pub address: FieldChain,
    pub phone: FieldChain,
    pub website: FieldChain,
    pub rating: FieldChain,
    pub reviews: FieldChain,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        use FieldStrategy::*;

        Self {
            name: FieldChain::new(
                "name",
                vec![
                    Text("div[role='heading'] span"),
                    Text("h3"),
                    Text("div.fontHeadlineSmall"),
                    Attribute {
                        selector: "a[href*='maps/place']",
                        name: "aria-label",
                    },
                ],
            ),
            // the category line ("Bakery · 12 Main St") comes before the
            // opening-hours line, which also carries a separator
            address: FieldChain::new(
                "address",
                vec![
                    TextContaining {
                        selector: "div.W4Efsd",
                        needle: "·",
                        pick: Pick::First,
                    },
                    Text("div.fontBodyMedium"),
                ],
            )
            .normalized(normalize_address),
            phone: FieldChain::new(
                "phone",
                vec![
                    Text("span.UsdlK"),
                    Attribute {
                        selector: "a[href^='tel:']",
                        name: "href",
                    },
                ],
            )
            .normalized(normalize_phone),
            website: FieldChain::new(
                "website",
                vec![
                    Attribute {
                        selector: "a[data-value='Website']",
                        name: "href",
                    },
                    Attribute {
                        selector: "a[aria-label^='Visit']",
                        name: "href",
                    },
                ],
            ),
            rating: FieldChain::new(
                "rating",
                vec![
                    Attribute {
                        selector: "span[aria-label*='stars']",
                        name: "aria-label",
                    },
                    Attribute {
                        selector: "span[role='img']",
                        name: "aria-label",
                    },
                ],
            )
            .normalized(normalize_rating),
            reviews: FieldChain::new(
                "reviews",
                vec![
                    TextContaining {
                        selector: "span",
                        needle: "review",
                        pick: Pick::Shortest,
                    },
                    Text("span.UY7F9"),
                ],
            ),
        }
    }
}

impl RecordExtractor {
    /// Turn card handles into listings, in handle order
    ///
    /// The stream is lazy and checks `cancel` before each card. It borrows
    /// the handles, so re-running means snapshotting the DOM again.
    pub fn extract<'a, D: DomCapability>(
        &'a self,
        dom: &'a D,
        cards: &'a [D::Handle],
        ctx: &'a CaptureContext,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Listing> + Send + 'a {
        stream::iter(cards.iter().enumerate())
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .filter_map(move |(index, card)| self.extract_one(dom, card, index, ctx))
    }

    pub async fn extract_one<D: DomCapability>(
        &self,
        dom: &D,
        card: &D::Handle,
        index: usize,
        ctx: &CaptureContext,
    ) -> Option<Listing> {
        let name = match self.name.resolve(dom, card).await {
            Resolution::Found(name) => name,
            Resolution::Absent => {
                trace!("Card {} has no name, skipping", index);
                return None;
            }
            Resolution::Faulted(e) => {
                warn!("Error extracting data from card {}: {}", index, e);
                return None;
            }
        };

        let mut listing = Listing::named(name, ctx);
        listing.rating = self.rating.optional(dom, card).await;
        listing.review_count = self.reviews.optional(dom, card).await;
        listing.address = self.address.optional(dom, card).await;
        listing.phone = self.phone.optional(dom, card).await;
        listing.website = self.website.optional(dom, card).await;
        Some(listing)
    }
}

/// Snapshot the card containers currently in the DOM
///
/// Selectors are tried in order and the first one that matches anything
/// wins. Fails only when every selector faulted.
pub async fn discover_cards<D: DomCapability>(
    dom: &D,
    selectors: &[&str],
) -> HarvestResult<Vec<D::Handle>> {
    let mut faults = 0;
    let mut last_fault = None;

    for selector in selectors {
        match dom.find_all(selector).await {
            Ok(cards) if !cards.is_empty() => {
                debug!("Card selector '{}' matched {}", selector, cards.len());
                return Ok(cards);
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Card selector '{}' failed: {}", selector, e);
                faults += 1;
                last_fault = Some(e);
            }
        }
    }

    match last_fault {
        Some(e) if faults == selectors.len() => Err(e),
        _ => Ok(Vec::new()),
    }
}
