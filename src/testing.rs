//! In-memory DOM capability for exercising the pipeline without a browser
//!
//! Nodes are plain structs addressed by index. Selector lookups are exact
//! string matches against what was registered, and the two feed scripts
//! are recognised by identity, so tests can script a feed that grows,
//! stalls, or faults on a chosen round.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::dom::{DomCapability, DomLauncher};
use crate::utils::constants::{
    CARD_SELECTORS, FEED_SELECTOR, ITEM_ANCHOR_SELECTOR, SCROLL_EXTENT_JS, SCROLL_TO_END_JS,
};
use crate::utils::{HarvestError, HarvestResult};

pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub text: String,
    pub attrs: HashMap<String, String>,
    /// selector -> matching descendants
    pub children: HashMap<String, Vec<NodeId>>,
    /// Every read on a broken node fails, like a detached element
    pub broken: bool,
}

impl FakeNode {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

/// One step of a scripted feed: content extent and anchors after a scroll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStage {
    pub extent: u64,
    pub items: usize,
}

#[derive(Default)]
struct State {
    nodes: Vec<FakeNode>,
    selections: HashMap<String, Vec<NodeId>>,
    feed: Vec<FeedStage>,
    scrolls: usize,
    script_calls: usize,
    fail_scripts_after: Option<usize>,
    navigations: Vec<String>,
    clicks: Vec<NodeId>,
    fail_navigation: bool,
}

/// Scripted DOM; clones share state so tests can inspect a session after a run
#[derive(Clone, Default)]
pub struct FakeDom {
    state: Arc<Mutex<State>>,
    closes: Arc<AtomicUsize>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_node(&self, node: FakeNode) -> NodeId {
        let mut state = self.state();
        state.nodes.push(node);
        state.nodes.len() - 1
    }

    /// Create `child` and make it match `selector` within `parent`
    pub fn add_child(&self, parent: NodeId, selector: &str, child: FakeNode) -> NodeId {
        let id = self.add_node(child);
        let mut state = self.state();
        state.nodes[parent]
            .children
            .entry(selector.to_string())
            .or_default()
            .push(id);
        id
    }

    /// Page-level `find_all(selector)` returns `nodes`
    pub fn on_select(&self, selector: &str, nodes: Vec<NodeId>) {
        self.state().selections.insert(selector.to_string(), nodes);
    }

    /// Script a feed; the last stage repeats once the script runs out
    pub fn with_feed(&self, stages: Vec<FeedStage>) {
        self.state().feed = stages;
    }

    /// Every script call after the first `calls` fails
    pub fn fail_scripts_after(&self, calls: usize) {
        self.state().fail_scripts_after = Some(calls);
    }

    pub fn fail_navigation(&self) {
        self.state().fail_navigation = true;
    }

    /// A loaded results page: a feed already holding one card per name
    ///
    /// Each card carries a heading and a "4.5 stars" rating label. The feed
    /// reports every card on the first scroll, then stops growing.
    pub fn results_page(names: &[&str]) -> Self {
        let dom = Self::new();
        let feed = dom.add_node(FakeNode::default());
        dom.on_select(FEED_SELECTOR, vec![feed]);
        dom.with_feed(vec![FeedStage {
            extent: 100 * names.len() as u64,
            items: names.len(),
        }]);

        let cards = names
            .iter()
            .map(|name| {
                let card = dom.add_node(FakeNode::default());
                dom.add_child(card, "div[role='heading'] span", FakeNode::with_text(name));
                dom.add_child(
                    card,
                    "span[aria-label*='stars']",
                    FakeNode::default().attr("aria-label", "4.5 stars"),
                );
                card
            })
            .collect();
        dom.on_select(CARD_SELECTORS[0], cards);
        dom
    }

    pub fn scrolls(&self) -> usize {
        self.state().scrolls
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.state().clicks.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn current_stage(state: &State) -> Option<FeedStage> {
        if state.feed.is_empty() {
            return None;
        }
        let idx = state.scrolls.min(state.feed.len() - 1);
        Some(state.feed[idx])
    }

    fn node(state: &State, id: NodeId) -> HarvestResult<&FakeNode> {
        let node = state
            .nodes
            .get(id)
            .ok_or_else(|| HarvestError::Dom(format!("no node {id}")))?;
        if node.broken {
            return Err(HarvestError::Dom(format!("node {id} is detached")));
        }
        Ok(node)
    }
}

#[async_trait]
impl DomCapability for FakeDom {
    type Handle = NodeId;

    async fn navigate(&self, url: &str) -> HarvestResult<()> {
        let mut state = self.state();
        if state.fail_navigation {
            return Err(HarvestError::Dom(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn execute_script(&self, function: &str, _target: Option<&NodeId>) -> HarvestResult<Value> {
        let mut state = self.state();
        state.script_calls += 1;
        if let Some(limit) = state.fail_scripts_after
            && state.script_calls > limit
        {
            return Err(HarvestError::Dom("Execution context was destroyed".into()));
        }

        if function == SCROLL_TO_END_JS {
            state.scrolls += 1;
        }
        if function == SCROLL_TO_END_JS || function == SCROLL_EXTENT_JS {
            let extent = Self::current_stage(&state).map(|s| s.extent).unwrap_or(0);
            return Ok(json!(extent));
        }
        Ok(Value::Null)
    }

    async fn find_all(&self, selector: &str) -> HarvestResult<Vec<NodeId>> {
        let state = self.state();
        if selector == ITEM_ANCHOR_SELECTOR
            && let Some(stage) = Self::current_stage(&state)
        {
            return Ok(vec![0; stage.items]);
        }
        Ok(state.selections.get(selector).cloned().unwrap_or_default())
    }

    async fn find_within(&self, handle: &NodeId, selector: &str) -> HarvestResult<Option<NodeId>> {
        let state = self.state();
        let node = Self::node(&state, *handle)?;
        Ok(node
            .children
            .get(selector)
            .and_then(|found| found.first().copied()))
    }

    async fn find_all_within(&self, handle: &NodeId, selector: &str) -> HarvestResult<Vec<NodeId>> {
        let state = self.state();
        let node = Self::node(&state, *handle)?;
        Ok(node.children.get(selector).cloned().unwrap_or_default())
    }

    async fn text(&self, handle: &NodeId) -> HarvestResult<String> {
        let state = self.state();
        Ok(Self::node(&state, *handle)?.text.clone())
    }

    async fn attribute(&self, handle: &NodeId, name: &str) -> HarvestResult<Option<String>> {
        let state = self.state();
        Ok(Self::node(&state, *handle)?.attrs.get(name).cloned())
    }

    async fn click(&self, handle: &NodeId) -> HarvestResult<()> {
        let mut state = self.state();
        Self::node(&state, *handle)?;
        state.clicks.push(*handle);
        Ok(())
    }

    async fn close(&self) -> HarvestResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same [`FakeDom`] for every run
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub dom: FakeDom,
    pub fail: bool,
}

impl FakeLauncher {
    pub fn new(dom: FakeDom) -> Self {
        Self { dom, fail: false }
    }
}

#[async_trait]
impl DomLauncher for FakeLauncher {
    type Dom = FakeDom;

    async fn launch(&self) -> HarvestResult<FakeDom> {
        if self.fail {
            return Err(HarvestError::Launch("Chrome/Chromium executable not found".into()));
        }
        Ok(self.dom.clone())
    }
}
