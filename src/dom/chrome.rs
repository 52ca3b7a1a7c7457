//! chromiumoxide-backed DOM capability

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::js_protocol::runtime::CallFunctionOnParams;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use super::{DomCapability, DomLauncher};
use crate::BrowserConfig;
use crate::browser::BrowserWrapper;
use crate::utils::{HarvestError, HarvestResult};

/// One browser plus the tab a harvest run drives
pub struct ChromeSession {
    browser: Mutex<Option<BrowserWrapper>>,
    page: Page,
}

impl ChromeSession {
    pub async fn open(config: &BrowserConfig, run_id: &str) -> HarvestResult<Self> {
        let mut wrapper = BrowserWrapper::launch(config, run_id)
            .await
            .map_err(|e| HarvestError::Launch(format!("{e:#}")))?;

        let page = match wrapper.new_page().await {
            Ok(page) => page,
            Err(e) => {
                wrapper.shutdown().await;
                return Err(HarvestError::Launch(format!("{e:#}")));
            }
        };

        Ok(Self {
            browser: Mutex::new(Some(wrapper)),
            page,
        })
    }
}

#[async_trait]
impl DomCapability for ChromeSession {
    type Handle = Element;

    async fn navigate(&self, url: &str) -> HarvestResult<()> {
        info!("Navigating to {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn execute_script(
        &self,
        function: &str,
        target: Option<&Element>,
    ) -> HarvestResult<Value> {
        match target {
            Some(element) => {
                let returns = element.call_js_fn(function, false).await?;
                Ok(returns.result.value.unwrap_or(Value::Null))
            }
            None => {
                let call = CallFunctionOnParams::builder()
                    .function_declaration(function)
                    .build()
                    .map_err(|e| HarvestError::Dom(format!("Failed to build script call: {e}")))?;
                let result = self.page.evaluate_function(call).await?;
                Ok(result.value().cloned().unwrap_or(Value::Null))
            }
        }
    }

    async fn find_all(&self, selector: &str) -> HarvestResult<Vec<Element>> {
        Ok(self.page.find_elements(selector).await?)
    }

    async fn find_within(&self, handle: &Element, selector: &str) -> HarvestResult<Option<Element>> {
        // DOM.querySelector answers "no match" with node 0, which only fails
        // later as "Could not find node"; querySelectorAll answers with an
        // empty list, so any error left is a real fault (stale or detached card)
        let mut matches = handle.find_elements(selector).await?.into_iter();
        let first = matches.next();
        if first.is_none() {
            trace!("No '{}' within element", selector);
        }
        Ok(first)
    }

    async fn find_all_within(&self, handle: &Element, selector: &str) -> HarvestResult<Vec<Element>> {
        Ok(handle.find_elements(selector).await?)
    }

    async fn text(&self, handle: &Element) -> HarvestResult<String> {
        Ok(handle.inner_text().await?.unwrap_or_default())
    }

    async fn attribute(&self, handle: &Element, name: &str) -> HarvestResult<Option<String>> {
        Ok(handle.attribute(name).await?)
    }

    async fn click(&self, handle: &Element) -> HarvestResult<()> {
        handle.click().await?;
        Ok(())
    }

    async fn close(&self) -> HarvestResult<()> {
        let mut guard = self.browser.lock().await;
        match guard.take() {
            Some(mut wrapper) => wrapper.shutdown().await,
            None => debug!("Browser session already closed"),
        }
        Ok(())
    }
}

/// Launches a fresh Chrome for every run
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DomLauncher for ChromeLauncher {
    type Dom = ChromeSession;

    async fn launch(&self) -> HarvestResult<ChromeSession> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        ChromeSession::open(&self.config, &run_id).await
    }
}
