//! Assertions on rendered state
//!
//! ```ignore
//! expect(&mut ctx.page, &Locator::css(".error"))
//!     .to_contain_text("Wrong credentials")
//!     .await?;
//! expect(&mut ctx.page, &Locator::text("logged-in")).not().to_be_visible().await?;
//! ```
//!
//! Every check polls with the page's [`WaitPolicy`] (or the one given to
//! [`Expectation::within`]) and fails with [`E2eError::Assertion`].

use std::time::Duration;
use tracing::debug;

use crate::driver::ElementState;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::Page;
use crate::wait::WaitPolicy;

pub fn expect<'p>(page: &'p mut Page, locator: &Locator) -> Expectation<'p> {
    let wait = *page.wait_policy();
    Expectation {
        page,
        locator: locator.clone(),
        negated: false,
        wait,
    }
}

pub struct Expectation<'p> {
    page: &'p mut Page,
    locator: Locator,
    negated: bool,
    wait: WaitPolicy,
}

impl<'p> Expectation<'p> {
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn within(mut self, timeout: Duration) -> Self {
        self.wait = self.wait.with_timeout(timeout);
        self
    }

    /// Element is rendered and not hidden (negated: absent or hidden)
    pub async fn to_be_visible(self) -> E2eResult<()> {
        let want_visible = !self.negated;
        let expected = if want_visible { "visible" } else { "hidden or absent" };
        self.poll_state("to be visible", expected, |s| s.visible == want_visible, |s| {
            s.describe()
        })
        .await
    }

    /// Element text includes `needle`
    pub async fn to_contain_text(self, needle: &str) -> E2eResult<()> {
        let negated = self.negated;
        let expected = format!("{:?}", needle);
        let needle = needle.to_string();
        self.poll_state(
            "to contain text",
            &expected,
            move |s| {
                if negated {
                    !s.found() || !s.text.contains(needle.as_str())
                } else {
                    s.found() && s.text.contains(needle.as_str())
                }
            },
            |s| {
                if s.found() {
                    format!("{:?}", s.text)
                } else {
                    s.describe()
                }
            },
        )
        .await
    }

    /// Computed style `property` equals `value`
    pub async fn to_have_css(self, property: &str, value: &str) -> E2eResult<()> {
        let Expectation {
            page,
            locator,
            negated,
            wait,
        } = self;
        let mut poller = wait.poller();

        loop {
            let actual = page.computed_style(&locator, property).await?;
            let matched = actual
                .as_deref()
                .map(|v| (v.trim() == value) != negated)
                .unwrap_or(false);
            if matched {
                return Ok(());
            }
            if !poller.wait().await {
                return Err(E2eError::Assertion {
                    locator: locator.to_string(),
                    expectation: format!("{}to have css {}", not_prefix(negated), property),
                    expected: format!("{:?}", value),
                    actual: actual
                        .map(|v| format!("{:?}", v))
                        .unwrap_or_else(|| "no matching element".to_string()),
                    waited_ms: poller.elapsed_ms(),
                });
            }
        }
    }

    /// Element never becomes visible at any probe within the wait window.
    ///
    /// Unlike `not().to_be_visible()`, which passes as soon as the element is
    /// hidden, this keeps probing for the whole window.
    pub async fn to_stay_hidden(self) -> E2eResult<()> {
        let Expectation {
            page, locator, wait, ..
        } = self;
        let mut poller = wait.poller();

        loop {
            let state = page.state(&locator).await?;
            if state.visible {
                return Err(E2eError::Assertion {
                    locator: locator.to_string(),
                    expectation: "to stay hidden".to_string(),
                    expected: "hidden for the whole window".to_string(),
                    actual: format!("became visible after {} ms", poller.elapsed_ms()),
                    waited_ms: poller.elapsed_ms(),
                });
            }
            if !poller.wait().await {
                debug!("{} stayed hidden for {} ms", locator, poller.elapsed_ms());
                return Ok(());
            }
        }
    }

    async fn poll_state<F, D>(
        self,
        what: &str,
        expected: &str,
        mut check: F,
        describe: D,
    ) -> E2eResult<()>
    where
        F: FnMut(&ElementState) -> bool,
        D: Fn(&ElementState) -> String,
    {
        let Expectation {
            page,
            locator,
            negated,
            wait,
        } = self;
        let mut poller = wait.poller();

        loop {
            let state = page.state(&locator).await?;
            if check(&state) {
                return Ok(());
            }
            if !poller.wait().await {
                return Err(E2eError::Assertion {
                    locator: locator.to_string(),
                    expectation: format!("{}{}", not_prefix(negated), what),
                    expected: expected.to_string(),
                    actual: describe(&state),
                    waited_ms: poller.elapsed_ms(),
                });
            }
        }
    }
}

fn not_prefix(negated: bool) -> &'static str {
    if negated {
        "not "
    } else {
        ""
    }
}
