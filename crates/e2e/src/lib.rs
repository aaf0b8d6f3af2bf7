//! Note app E2E scenarios
//!
//! This crate drives a real browser against a running note app and checks
//! what the user would see:
//! - Scenarios are declared in nested groups with `before_each` setup
//! - Each scenario gets its own Playwright page, controlled over a JSON line
//!   protocol with a Node bridge process
//! - Actions and assertions poll the page until a condition holds or a
//!   bounded wait expires
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Suite Runner (Rust)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                                │
//! │    ├── launcher.open_page() -> Page (one per scenario)      │
//! │    ├── before_each hooks, outer group first                 │
//! │    │     ├── backend.reset() / backend.create_user()        │
//! │    │     └── page.goto("/"), login(), create_note()         │
//! │    ├── scenario body: actions + expect(...)                 │
//! │    └── page.close(), result -> SuiteResult                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Locator: text | role[name] | test-id | css | ..            │
//! │  Page:    goto, click, fill, wait_for (auto-waiting)        │
//! │  expect:  to_be_visible, not, to_contain_text, to_have_css  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod api;
pub mod driver;
pub mod error;
pub mod expect;
pub mod locator;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod suite;
pub mod wait;

pub use api::{Backend, HttpBackend, UserFixture};
pub use driver::{BrowserLauncher, ElementState, PageDriver};
pub use error::{E2eError, E2eResult};
pub use expect::expect;
pub use locator::{Locator, Selector};
pub use page::Page;
pub use runner::{Outcome, RunnerConfig, SuiteResult, SuiteRunner};
pub use scenario::{Group, ScenarioContext};
pub use wait::{Backoff, WaitPolicy};
