//! Harvested record types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column headers shared by both exporters, in export order
pub const FIELD_NAMES: [&str; 10] = [
    "Sr No.",
    "Business Name",
    "Address",
    "Phone",
    "Website",
    "Rating",
    "Reviews",
    "Category",
    "Location",
    "Scraped Date",
];

/// Provenance stamped on every record captured in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureContext {
    pub keyword: String,
    pub location: String,
    pub date: NaiveDate,
}

/// One extracted card before it has a place in the accumulated set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub category: String,
    pub location_query: String,
    pub captured_on: NaiveDate,
}

impl Listing {
    /// A listing carrying only a name, stamped with `ctx`
    pub fn named(name: impl Into<String>, ctx: &CaptureContext) -> Self {
        Self {
            name: name.into(),
            address: None,
            phone: None,
            website: None,
            rating: None,
            review_count: None,
            category: ctx.keyword.clone(),
            location_query: ctx.location.clone(),
            captured_on: ctx.date,
        }
    }
}

/// A listing with its 1-based position in the accumulated set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sequence: usize,
    #[serde(flatten)]
    pub listing: Listing,
}

impl Record {
    /// Cell values in [`FIELD_NAMES`] order; absent fields are empty
    pub fn to_row(&self) -> [String; 10] {
        let l = &self.listing;
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            self.sequence.to_string(),
            l.name.clone(),
            opt(&l.address),
            opt(&l.phone),
            opt(&l.website),
            opt(&l.rating),
            opt(&l.review_count),
            l.category.clone(),
            l.location_query.clone(),
            l.captured_on.format("%Y-%m-%d").to_string(),
        ]
    }
}

impl std::ops::Deref for Record {
    type Target = Listing;

    fn deref(&self) -> &Listing {
        &self.listing
    }
}
