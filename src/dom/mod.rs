//! DOM capability consumed by the harvesting pipeline
//!
//! The pipeline never talks to chromiumoxide directly. Everything it needs
//! from a browser session goes through [`DomCapability`], which keeps the
//! pagination and extraction logic testable against the scripted `FakeDom`.

mod chrome;

pub use chrome::{ChromeLauncher, ChromeSession};

use async_trait::async_trait;
use serde_json::Value;

use crate::utils::HarvestResult;

/// Browser session operations used by the pipeline
///
/// Every call is a suspension point. Implementations convert their native
/// faults into [`crate::HarvestError::Dom`]. A session is driven by a single
/// harvest worker at a time and is never shared across concurrent callers.
#[async_trait]
pub trait DomCapability: Send + Sync {
    /// Opaque element reference, only valid for the DOM state it came from
    type Handle: Send + Sync;

    async fn navigate(&self, url: &str) -> HarvestResult<()>;

    /// Run a JavaScript function declaration
    ///
    /// With a `target`, the function is called with `this` bound to that
    /// element; otherwise it runs in page context. Returns the JSON value
    /// the function returned, or `Value::Null`.
    async fn execute_script(
        &self,
        function: &str,
        target: Option<&Self::Handle>,
    ) -> HarvestResult<Value>;

    async fn find_all(&self, selector: &str) -> HarvestResult<Vec<Self::Handle>>;

    /// First descendant of `handle` matching `selector`, if any
    ///
    /// No match is `Ok(None)`. A handle that can no longer be queried, such
    /// as a detached card, is an error.
    async fn find_within(
        &self,
        handle: &Self::Handle,
        selector: &str,
    ) -> HarvestResult<Option<Self::Handle>>;

    /// All descendants of `handle` matching `selector`, in document order
    async fn find_all_within(
        &self,
        handle: &Self::Handle,
        selector: &str,
    ) -> HarvestResult<Vec<Self::Handle>>;

    /// Rendered text of the element (empty when it has none)
    async fn text(&self, handle: &Self::Handle) -> HarvestResult<String>;

    async fn attribute(&self, handle: &Self::Handle, name: &str) -> HarvestResult<Option<String>>;

    async fn click(&self, handle: &Self::Handle) -> HarvestResult<()>;

    /// Release the underlying session
    ///
    /// Must be safe to call more than once; calls after the first are no-ops.
    async fn close(&self) -> HarvestResult<()>;
}

/// Opens a fresh DOM session for each harvest run
#[async_trait]
pub trait DomLauncher: Send + Sync + 'static {
    type Dom: DomCapability + 'static;

    async fn launch(&self) -> HarvestResult<Self::Dom>;
}
