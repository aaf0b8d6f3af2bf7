//! Error types for E2E scenarios

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("App server failed to start: {0}")]
    ServerStartup(String),

    #[error("App not reachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Setup failed in {hook}: {source}")]
    Setup {
        hook: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Expected {locator} {expectation}: expected {expected}, got {actual} (waited {waited_ms} ms)")]
    Assertion {
        locator: String,
        expectation: String,
        expected: String,
        actual: String,
        waited_ms: u64,
    },

    #[error("Timeout after {waited_ms} ms waiting for {waiting_for}; last observed: {last_observed}")]
    Timeout {
        waiting_for: String,
        waited_ms: u64,
        last_observed: String,
    },

    #[error("Scenario exceeded its {0} ms budget")]
    ScenarioTimeout(u64),

    #[error("Page is closed")]
    PageClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Short category used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::Assertion { .. } => "assertion",
            E2eError::Timeout { .. } | E2eError::ScenarioTimeout(_) => "timeout",
            E2eError::Setup { .. } => "setup",
            E2eError::Api { .. } | E2eError::Http(_) | E2eError::AppUnreachable { .. } => "api",
            E2eError::ServerStartup(_) => "server",
            E2eError::Driver(_) | E2eError::PlaywrightNotFound | E2eError::PageClosed => "driver",
            E2eError::Io(_) | E2eError::Json(_) => "io",
        }
    }

    pub fn is_setup(&self) -> bool {
        matches!(self, E2eError::Setup { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
