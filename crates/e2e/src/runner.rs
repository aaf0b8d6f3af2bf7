//! Suite runner: per-scenario page, setup chain, body, teardown, report

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::driver::BrowserLauncher;
use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::scenario::{Group, PlannedScenario, ScenarioContext};
use crate::wait::WaitPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// The body failed: assertion, action timeout or driver error
    Failed,
    /// A `before_each` hook failed; the body never ran
    SetupFailed,
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

impl ScenarioResult {
    fn skipped(name: String, reason: &str) -> Self {
        Self {
            name,
            outcome: Outcome::Skipped,
            duration_ms: 0,
            error: Some(reason.to_string()),
            error_kind: None,
            screenshot_path: None,
        }
    }
}

/// Result of running a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub setup_failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.setup_failed == 0
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Configuration for the suite runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Application origin pages navigate against
    pub base_url: String,
    pub wait: WaitPolicy,
    /// Scenarios run at the same time. Above 1 the app's store must be
    /// isolated per scenario, since every scenario resets it.
    pub jobs: usize,
    /// Budget for setup + body of one scenario
    pub scenario_timeout: Duration,
    pub output_dir: PathBuf,
    pub screenshot_on_failure: bool,
    /// Only scenarios whose full name contains this substring run
    pub grep: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            wait: WaitPolicy::default(),
            jobs: 1,
            scenario_timeout: Duration::from_secs(30),
            output_dir: PathBuf::from("test-results"),
            screenshot_on_failure: true,
            grep: None,
        }
    }
}

/// Main E2E suite runner
pub struct SuiteRunner {
    config: RunnerConfig,
    launcher: Arc<dyn BrowserLauncher>,
    backend: Arc<dyn Backend>,
}

impl SuiteRunner {
    pub fn new(config: RunnerConfig, launcher: Arc<dyn BrowserLauncher>, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            launcher,
            backend,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every scenario of `suite` selected by the filters
    pub async fn run(&self, suite: &Group) -> SuiteResult {
        self.run_planned(suite.plan()).await
    }

    /// Apply grep, focus and skip. Grep-filtered scenarios are dropped;
    /// skipped and unfocused ones come back with a reason.
    pub fn select(&self, plan: Vec<PlannedScenario>) -> Vec<(PlannedScenario, Option<&'static str>)> {
        let plan: Vec<_> = plan
            .into_iter()
            .filter(|s| match &self.config.grep {
                Some(pattern) => s.name.contains(pattern.as_str()),
                None => true,
            })
            .collect();

        let any_focused = plan.iter().any(|s| s.focused && !s.skipped);

        plan.into_iter()
            .map(|s| {
                let reason = if s.skipped {
                    Some("marked skip")
                } else if any_focused && !s.focused {
                    Some("not focused")
                } else {
                    None
                };
                (s, reason)
            })
            .collect()
    }

    pub async fn run_planned(&self, plan: Vec<PlannedScenario>) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut slots: Vec<Option<ScenarioResult>> = Vec::new();
        let mut runnable = Vec::new();
        for (index, (scenario, reason)) in self.select(plan).into_iter().enumerate() {
            match reason {
                Some(reason) => {
                    debug!("Skipping {} ({})", scenario.name, reason);
                    slots.push(Some(ScenarioResult::skipped(scenario.name, reason)));
                }
                None => {
                    slots.push(None);
                    runnable.push((index, scenario));
                }
            }
        }

        info!("Running {} scenario(s) with {} job(s)...", runnable.len(), self.config.jobs.max(1));

        let finished: Vec<(usize, ScenarioResult)> = stream::iter(runnable)
            .map(|(index, scenario)| async move { (index, self.run_scenario(scenario).await) })
            .buffer_unordered(self.config.jobs.max(1))
            .collect()
            .await;

        for (index, result) in finished {
            slots[index] = Some(result);
        }
        let results: Vec<ScenarioResult> = slots.into_iter().flatten().collect();

        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let passed = count(Outcome::Passed);
        let failed = count(Outcome::Failed);
        let setup_failed = count(Outcome::SetupFailed);
        let skipped = count(Outcome::Skipped);
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario Results: {} passed, {} failed, {} setup failed, {} skipped ({} ms)",
            passed, failed, setup_failed, skipped, duration_ms
        );

        SuiteResult {
            started_at,
            total: results.len(),
            passed,
            failed,
            setup_failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run one scenario on its own page. The page is closed whatever happens.
    pub async fn run_scenario(&self, scenario: PlannedScenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let driver = match self.launcher.open_page().await {
            Ok(driver) => driver,
            Err(e) => {
                let e = E2eError::Setup {
                    hook: "open page".to_string(),
                    source: Box::new(e),
                };
                return self.finish(scenario.name, start, Some(e), None);
            }
        };

        let mut ctx = ScenarioContext {
            name: scenario.name.clone(),
            page: Page::new(driver, self.config.base_url.clone(), self.config.wait),
            backend: self.backend.clone(),
        };

        let budget = self.config.scenario_timeout;
        // label of the hook in progress; None once the body has started
        let mut running_hook = None;
        let outcome = timeout(budget, execute(&scenario, &mut ctx, &mut running_hook)).await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => {
                let e = E2eError::ScenarioTimeout(budget.as_millis() as u64);
                Some(match running_hook {
                    Some(hook) => E2eError::Setup {
                        hook,
                        source: Box::new(e),
                    },
                    None => e,
                })
            }
        };

        let screenshot = match &error {
            Some(_) if self.config.screenshot_on_failure => self.capture(&mut ctx).await,
            _ => None,
        };

        if let Err(e) = ctx.page.close().await {
            warn!("{}: page close failed: {}", scenario.name, e);
        }

        self.finish(scenario.name, start, error, screenshot)
    }

    fn finish(
        &self,
        name: String,
        start: Instant,
        error: Option<E2eError>,
        screenshot_path: Option<PathBuf>,
    ) -> ScenarioResult {
        let duration_ms = start.elapsed().as_millis() as u64;

        match error {
            None => {
                info!("✓ {} ({} ms)", name, duration_ms);
                ScenarioResult {
                    name,
                    outcome: Outcome::Passed,
                    duration_ms,
                    error: None,
                    error_kind: None,
                    screenshot_path: None,
                }
            }
            Some(e) => {
                let outcome = if e.is_setup() {
                    Outcome::SetupFailed
                } else {
                    Outcome::Failed
                };
                error!("✗ {} - {}", name, e);
                ScenarioResult {
                    name,
                    outcome,
                    duration_ms,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind().to_string()),
                    screenshot_path,
                }
            }
        }
    }

    async fn capture(&self, ctx: &mut ScenarioContext) -> Option<PathBuf> {
        let path = self
            .config
            .output_dir
            .join("screenshots")
            .join(format!("{}.png", slug(&ctx.name)));

        match ctx.page.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("{}: screenshot failed: {}", ctx.name, e);
                None
            }
        }
    }

    /// Write suite results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Setup chain outer-to-inner, then the body. A hook error becomes
/// [`E2eError::Setup`] and the body is not run.
async fn execute(
    scenario: &PlannedScenario,
    ctx: &mut ScenarioContext,
    running_hook: &mut Option<String>,
) -> E2eResult<()> {
    for (label, hook) in &scenario.hooks {
        *running_hook = Some(label.clone());
        hook(&mut *ctx).await.map_err(|source| E2eError::Setup {
            hook: label.clone(),
            source: Box::new(source),
        })?;
    }
    *running_hook = None;
    (scenario.body)(&mut *ctx).await
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
