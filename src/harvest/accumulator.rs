//! Ordered working set of harvested records

use std::collections::HashSet;

use super::record::{Listing, Record};

/// Append-only record set for one run
///
/// Sequence numbers are assigned on insertion as `count() + 1`, so they are
/// always `1..=count()` in insertion order. Entries are never overwritten or
/// reordered; only [`Accumulator::reset`] removes them.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    records: Vec<Record>,
    dedup: bool,
    seen: HashSet<(String, String)>,
    duplicates: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip listings whose (name, address) pair was already accepted this run
    pub fn with_dedup(dedup: bool) -> Self {
        Self {
            dedup,
            ..Self::default()
        }
    }

    /// Store `listing` and return its sequence number
    ///
    /// Returns `None` without storing anything when the name is blank, or
    /// when duplicate suppression is on and the listing was already seen.
    pub fn append(&mut self, listing: Listing) -> Option<usize> {
        if listing.name.trim().is_empty() {
            return None;
        }

        if self.dedup {
            let key = (
                listing.name.to_lowercase(),
                listing.address.clone().unwrap_or_default().to_lowercase(),
            );
            if !self.seen.insert(key) {
                self.duplicates += 1;
                return None;
            }
        }

        let sequence = self.count() + 1;
        self.records.push(Record { sequence, listing });
        Some(sequence)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Listings rejected as duplicates since the last reset
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Drop every record and counter; the dedup setting survives
    pub fn reset(&mut self) {
        self.records.clear();
        self.seen.clear();
        self.duplicates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::record::CaptureContext;
    use chrono::NaiveDate;

    fn listing(name: &str) -> Listing {
        let ctx = CaptureContext {
            keyword: "bakery".into(),
            location: "Springfield".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        };
        Listing::named(name, &ctx)
    }

    #[test]
    fn sequences_are_contiguous_in_insertion_order() {
        let mut acc = Accumulator::new();
        for name in ["C", "A", "B"] {
            acc.append(listing(name));
        }

        let snapshot = acc.snapshot();
        let seqs: Vec<_> = snapshot.iter().map(|r| r.sequence).collect();
        let names: Vec<_> = snapshot.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(seqs, [1, 2, 3]);
        assert_eq!(names, ["C", "A", "B"]);
        assert_eq!(acc.count(), 3);
    }

    #[test]
    fn blank_names_are_never_stored() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.append(listing("  ")), None);
        assert_eq!(acc.append(listing("Real")), Some(1));
        assert!(acc.records().iter().all(|r| !r.name.is_empty()));
    }

    #[test]
    fn repeated_listings_are_kept_by_default() {
        let mut acc = Accumulator::new();
        acc.append(listing("Same"));
        assert_eq!(acc.append(listing("Same")), Some(2));
    }

    #[test]
    fn dedup_skips_repeats_without_gaps() {
        let mut acc = Accumulator::with_dedup(true);
        assert_eq!(acc.append(listing("Same")), Some(1));
        assert_eq!(acc.append(listing("same")), None);
        assert_eq!(acc.append(listing("Other")), Some(2));
        assert_eq!(acc.duplicates(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = Accumulator::with_dedup(true);
        acc.append(listing("One"));
        acc.append(listing("One"));
        acc.reset();

        assert!(acc.snapshot().is_empty());
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.duplicates(), 0);
        assert_eq!(acc.append(listing("One")), Some(1));
    }
}
