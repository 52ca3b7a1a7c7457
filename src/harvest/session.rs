//! Run session state owned by the orchestrator

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::accumulator::Accumulator;
use super::record::{CaptureContext, Record};
use crate::utils::{HarvestError, HarvestResult};

/// What to harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub keyword: String,
    pub location: String,
    pub max_results: usize,
}

impl HarvestRequest {
    pub fn new(keyword: impl Into<String>, location: impl Into<String>, max_results: usize) -> Self {
        Self {
            keyword: keyword.into(),
            location: location.into(),
            max_results,
        }
    }

    /// Trimmed copy, rejecting blank terms and a zero cap
    pub fn validated(&self) -> HarvestResult<Self> {
        let keyword = self.keyword.trim();
        let location = self.location.trim();
        if keyword.is_empty() || location.is_empty() {
            return Err(HarvestError::InvalidRequest(
                "Please enter both keyword and location".into(),
            ));
        }
        if self.max_results == 0 {
            return Err(HarvestError::InvalidRequest(
                "Max results must be at least 1".into(),
            ));
        }
        Ok(Self::new(keyword, location, self.max_results))
    }

    /// Query typed into the map search box
    pub fn query(&self) -> String {
        format!("{} in {}", self.keyword, self.location)
    }
}

/// One keyword/location pass and everything it accumulated
#[derive(Debug, Clone, Default)]
pub struct RunSession {
    pub request: Option<HarvestRequest>,
    pub captured_on: Option<NaiveDate>,
    pub accumulator: Accumulator,
}

impl RunSession {
    pub fn new(dedup: bool) -> Self {
        Self {
            accumulator: Accumulator::with_dedup(dedup),
            ..Self::default()
        }
    }

    /// Clear the previous run and stamp the new one
    pub fn begin(&mut self, request: HarvestRequest) {
        self.accumulator.reset();
        self.captured_on = Some(Local::now().date_naive());
        self.request = Some(request);
    }

    pub fn context(&self) -> Option<CaptureContext> {
        let request = self.request.as_ref()?;
        Some(CaptureContext {
            keyword: request.keyword.clone(),
            location: request.location.clone(),
            date: self.captured_on?,
        })
    }

    pub fn count(&self) -> usize {
        self.accumulator.count()
    }

    pub fn records(&self) -> &[Record] {
        self.accumulator.records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::record::Listing;

    #[test]
    fn validation_trims_and_rejects_blank() {
        let req = HarvestRequest::new("  bakery ", " Springfield", 50).validated().unwrap();
        assert_eq!(req.query(), "bakery in Springfield");
        assert!(HarvestRequest::new("bakery", "   ", 50).validated().is_err());
        assert!(HarvestRequest::new("bakery", "Springfield", 0).validated().is_err());
    }

    #[test]
    fn begin_discards_previous_run() {
        let mut session = RunSession::new(false);
        session.begin(HarvestRequest::new("bakery", "Springfield", 10));
        let ctx = session.context().unwrap();
        session.accumulator.append(Listing::named("Old", &ctx));

        session.begin(HarvestRequest::new("cafe", "Shelbyville", 10));

        assert_eq!(session.count(), 0);
        assert_eq!(session.context().unwrap().keyword, "cafe");
    }
}
