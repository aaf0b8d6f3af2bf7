//! Live page handle owned by one scenario

use std::path::Path;
use tracing::{debug, warn};

use crate::driver::{ElementState, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::wait::WaitPolicy;

/// Longest page excerpt kept in timeout diagnostics
const LAST_OBSERVED_MAX_CHARS: usize = 400;

/// A browser page bound to the application's origin
///
/// Actions auto-wait: `click` and `fill` poll until the target is visible
/// before acting, and fail with [`E2eError::Timeout`] otherwise.
pub struct Page {
    driver: Box<dyn PageDriver>,
    base_url: String,
    wait: WaitPolicy,
    closed: bool,
}

impl Page {
    pub fn new(driver: Box<dyn PageDriver>, base_url: impl Into<String>, wait: WaitPolicy) -> Self {
        Self {
            driver,
            base_url: base_url.into(),
            wait,
            closed: false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }

    /// Resolve `path` against the base URL; absolute URLs pass through
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn goto(&mut self, path: &str) -> E2eResult<()> {
        self.ensure_open()?;
        let url = self.url_for(path);
        debug!("goto {}", url);
        self.driver.goto(&url).await
    }

    pub async fn state(&mut self, locator: &Locator) -> E2eResult<ElementState> {
        self.ensure_open()?;
        self.driver.state(locator).await
    }

    pub async fn computed_style(&mut self, locator: &Locator, property: &str) -> E2eResult<Option<String>> {
        self.ensure_open()?;
        self.driver.computed_style(locator, property).await
    }

    /// Wait until the locator resolves to a visible element
    pub async fn wait_for(&mut self, locator: &Locator) -> E2eResult<ElementState> {
        self.ensure_open()?;
        let mut poller = self.wait.poller();
        loop {
            let state = self.driver.state(locator).await?;
            if state.visible {
                return Ok(state);
            }
            if !poller.wait().await {
                return Err(self
                    .timeout(format!("{} to be visible", locator), poller.elapsed_ms())
                    .await);
            }
        }
    }

    pub async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.wait_for(locator).await?;
        debug!("click {}", locator);
        self.driver.click(locator).await
    }

    pub async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.wait_for(locator).await?;
        debug!("fill {}", locator);
        self.driver.fill(locator, value).await
    }

    /// Visible page text, trimmed for diagnostics
    pub async fn last_observed(&mut self) -> String {
        match self.driver.page_text().await {
            Ok(text) => excerpt(&text, LAST_OBSERVED_MAX_CHARS),
            Err(e) => format!("<page text unavailable: {}>", e),
        }
    }

    /// Build a timeout error carrying the current page text
    pub async fn timeout(&mut self, waiting_for: String, waited_ms: u64) -> E2eError {
        let last_observed = self.last_observed().await;
        E2eError::Timeout {
            waiting_for,
            waited_ms,
            last_observed,
        }
    }

    pub async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.ensure_open()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.driver.screenshot(path).await
    }

    /// Release the page. Safe to call more than once.
    pub async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.driver.close().await {
            warn!("Closing page failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::PageClosed);
        }
        Ok(())
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
