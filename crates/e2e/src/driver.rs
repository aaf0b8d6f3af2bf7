//! Browser seam: what the scenario layer needs from a live page

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::E2eResult;
use crate::locator::Locator;

/// Snapshot of a located element at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Number of elements the locator matched
    pub count: usize,
    /// Whether the chosen element is rendered and not hidden
    pub visible: bool,
    /// Normalized text content of the chosen element
    pub text: String,
}

impl ElementState {
    pub fn found(&self) -> bool {
        self.count > 0
    }

    /// Human-readable description used in assertion failures
    pub fn describe(&self) -> String {
        match (self.count, self.visible) {
            (0, _) => "no matching element".to_string(),
            (n, true) => format!("{} match(es), visible, text {:?}", n, self.text),
            (n, false) => format!("{} match(es), hidden, text {:?}", n, self.text),
        }
    }
}

/// One live browser page
///
/// Implementations must not wait on their own; polling is done by
/// [`crate::page::Page`] so timeouts stay in one place.
#[async_trait]
pub trait PageDriver: Send {
    /// Load an absolute URL and wait for the document to be ready
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    async fn state(&mut self, locator: &Locator) -> E2eResult<ElementState>;

    /// Computed CSS property of the chosen element, `None` if nothing matches
    async fn computed_style(&mut self, locator: &Locator, property: &str) -> E2eResult<Option<String>>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Visible text of the whole page, used as the "last observed state" in
    /// timeout diagnostics
    async fn page_text(&mut self) -> E2eResult<String>;

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Opens a fresh, isolated page for each scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_page(&self) -> E2eResult<Box<dyn PageDriver>>;
}
