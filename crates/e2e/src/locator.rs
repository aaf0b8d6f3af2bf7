//! Locators: how scenarios name the elements they act on
//!
//! A [`Locator`] is a chain of [`Selector`] steps. Each step searches inside
//! the elements matched by the previous one (or the whole document for the
//! first step). Selectors describe what a user sees (text, role and
//! accessible name, explicit test id, class) so scenarios survive layout
//! changes. [`Selector::Parent`] moves to the enclosing element, which is how
//! a scenario scopes a button to one note among siblings with the same label.
//!
//! Locators are plain data; resolution happens in the page driver. When
//! several elements match, the first visible one in document order wins,
//! otherwise the first match.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Innermost elements whose normalized text contains `text`
    /// (case-insensitive)
    Text { text: String },

    /// ARIA role (explicit or implicit), optionally filtered by accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// `data-testid` attribute
    TestId { id: String },

    /// CSS selector, e.g. `.error`
    Css { selector: String },

    /// Parent element of each current match
    Parent,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Text { text } => write!(f, "text={:?}", text),
            Selector::Role { role, name: Some(name) } => write!(f, "role={}[name={:?}]", role, name),
            Selector::Role { role, name: None } => write!(f, "role={}", role),
            Selector::TestId { id } => write!(f, "test-id={:?}", id),
            Selector::Css { selector } => write!(f, "css={}", selector),
            Selector::Parent => f.write_str(".."),
        }
    }
}

/// Chain of selectors, resolved left to right
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    steps: Vec<Selector>,
}

impl Locator {
    fn single(step: Selector) -> Self {
        Self { steps: vec![step] }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::single(Selector::Text { text: text.into() })
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::single(Selector::Role {
            role: role.into(),
            name: None,
        })
    }

    /// Per Playwright: `page.getByRole('button', { name: 'save' })`
    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::single(Selector::Role {
            role: role.into(),
            name: Some(name.into()),
        })
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::single(Selector::TestId { id: id.into() })
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::single(Selector::Css {
            selector: selector.into(),
        })
    }

    /// Append a step searching inside the current matches
    pub fn then(mut self, step: Selector) -> Self {
        self.steps.push(step);
        self
    }

    /// Nearest enclosing element (`locator('..')`)
    pub fn parent(self) -> Self {
        self.then(Selector::Parent)
    }

    pub fn get_by_text(&self, text: impl Into<String>) -> Self {
        self.clone().then(Selector::Text { text: text.into() })
    }

    pub fn get_by_role(&self, role: impl Into<String>, name: impl Into<String>) -> Self {
        self.clone().then(Selector::Role {
            role: role.into(),
            name: Some(name.into()),
        })
    }

    pub fn get_by_test_id(&self, id: impl Into<String>) -> Self {
        self.clone().then(Selector::TestId { id: id.into() })
    }

    pub fn steps(&self) -> &[Selector] {
        &self.steps
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
