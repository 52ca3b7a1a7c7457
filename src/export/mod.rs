//! Exporters for an accumulated record set
//!
//! Both formats consume the same `&[Record]` slice and neither mutates it,
//! so one finished run can be written to either or both destinations.

mod layout;
mod report;
mod table;

use std::path::{Path, PathBuf};

pub use report::{REPORT_HEADING, ReportContext, write_report};
pub use table::write_table;

use crate::utils::{HarvestError, HarvestResult};

/// Outcome of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    /// Human-readable status line
    pub message: String,
}

pub(crate) fn ensure_parent(path: &Path) -> HarvestResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(path, e))
        }
        _ => Ok(()),
    }
}

/// `google_maps_{keyword}_{location}.{ext}` with spaces turned into underscores
pub fn suggested_file_name(keyword: &str, location: &str, ext: &str) -> String {
    let slug = |s: &str| {
        s.split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .replace(['/', '\\'], "_")
    };
    format!("google_maps_{}_{}.{}", slug(keyword), slug(location), ext)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;
    use crate::harvest::{Accumulator, CaptureContext, Listing, Record};

    /// A fresh, empty directory unique to one test
    pub(crate) fn tmp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "maps_harvest_{}_{}",
            name,
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Records named `names`, in that order, from a "bakery in Springfield" run
    pub(crate) fn records(names: &[&str]) -> Vec<Record> {
        let ctx = CaptureContext {
            keyword: "bakery".into(),
            location: "Springfield".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        };
        let mut acc = Accumulator::new();
        for name in names {
            let mut listing = Listing::named(*name, &ctx);
            listing.rating = Some("4.5".into());
            listing.address = Some("12 Main St".into());
            acc.append(listing);
        }
        acc.snapshot()
    }

    #[test]
    fn file_name_from_search_terms() {
        assert_eq!(
            suggested_file_name("coffee shop", "New York", "csv"),
            "google_maps_coffee_shop_New_York.csv"
        );
        assert_eq!(
            suggested_file_name("bakery", "Springfield", "pdf"),
            "google_maps_bakery_Springfield.pdf"
        );
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tmp_dir("ensure_parent");
        let path = dir.join("a").join("b").join("out.csv");
        ensure_parent(&path).unwrap();
        assert!(dir.join("a").join("b").is_dir());
        ensure_parent(Path::new("bare.csv")).unwrap();
    }
}
