//! Playwright browser automation
//!
//! Each page is a small Node program (the "bridge") that launches a browser,
//! opens one page and then serves JSON commands read line by line from stdin,
//! answering each on stdout. Locators are sent as data and resolved by
//! [`RESOLVE_IN_PAGE`] inside the browser, so no selector text is ever spliced
//! into JavaScript source.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::driver::{BrowserLauncher, ElementState, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Unknown names fall back to Chromium
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// `node_modules` directory that contains the `playwright` package
    pub node_modules: PathBuf,
    /// Playwright's own actionability timeout for click/fill
    pub action_timeout: Duration,
    /// Upper bound for one bridge round trip
    pub command_timeout: Duration,
    /// Upper bound for launching the browser
    pub startup_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_modules: PathBuf::from("node_modules"),
            action_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// Launches one bridge process (one browser, one page) per scenario
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.node_modules)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(node_modules: &Path) -> E2eResult<()> {
        let project_dir = node_modules
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let output = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the bridge script for this configuration
    pub fn build_script(&self) -> String {
        BRIDGE_TEMPLATE
            .replace("__BROWSER__", self.config.browser.as_str())
            .replace("__HEADLESS__", if self.config.headless { "true" } else { "false" })
            .replace("__WIDTH__", &self.config.viewport_width.to_string())
            .replace("__HEIGHT__", &self.config.viewport_height.to_string())
            .replace(
                "__ACTION_TIMEOUT_MS__",
                &self.config.action_timeout.as_millis().to_string(),
            )
            .replace("__RESOLVE_IN_PAGE__", RESOLVE_IN_PAGE)
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn open_page(&self) -> E2eResult<Box<dyn PageDriver>> {
        let page = PlaywrightPage::spawn(&self.config, &self.build_script()).await?;
        Ok(Box::new(page))
    }
}

/// Command sent to the bridge, one JSON object per line
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    State { locator: &'a Locator },
    Style { locator: &'a Locator, property: &'a str },
    Click { locator: &'a Locator },
    Fill { locator: &'a Locator, value: &'a str },
    PageText,
    Screenshot { path: &'a Path },
    Close,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Id of the unsolicited reply the bridge sends once the page is open
const READY_ID: u64 = 0;

/// One live Playwright page
pub struct PlaywrightPage {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    command_timeout: Duration,
    _script_dir: TempDir,
}

impl PlaywrightPage {
    pub async fn spawn(config: &PlaywrightConfig, script: &str) -> E2eResult<Self> {
        // Write script to temp file
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, script)?;

        let node_modules = std::fs::canonicalize(&config.node_modules)
            .unwrap_or_else(|_| config.node_modules.clone());

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env("NODE_PATH", &node_modules)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Driver(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut page = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: READY_ID,
            command_timeout: config.command_timeout,
            _script_dir: script_dir,
        };

        let ready = timeout(config.startup_timeout, page.read_reply(READY_ID))
            .await
            .map_err(|_| {
                E2eError::Driver(format!(
                    "{} did not start within {:?}",
                    config.browser.as_str(),
                    config.startup_timeout
                ))
            })??;
        Self::into_value(ready)?;

        info!("Opened {} page", config.browser.as_str());
        Ok(page)
    }

    async fn request(&mut self, command: BridgeCommand<'_>) -> E2eResult<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;

        let mut message = serde_json::to_value(&command)?;
        if let Some(fields) = message.as_object_mut() {
            fields.insert("id".to_string(), id.into());
        }
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let reply = timeout(self.command_timeout, self.read_reply(id))
            .await
            .map_err(|_| {
                E2eError::Driver(format!(
                    "no reply to {:?} within {:?}",
                    command, self.command_timeout
                ))
            })??;

        Self::into_value(reply)
    }

    async fn read_reply(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Driver("Playwright bridge exited".to_string()))?;

            match serde_json::from_str::<BridgeReply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!("Ignoring stale bridge reply {}", reply.id),
                // console output from the page or node itself
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }

    fn into_value(reply: BridgeReply) -> E2eResult<serde_json::Value> {
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Driver(
                reply.error.unwrap_or_else(|| "unknown bridge error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Goto { url }).await?;
        Ok(())
    }

    async fn state(&mut self, locator: &Locator) -> E2eResult<ElementState> {
        let value = self.request(BridgeCommand::State { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn computed_style(&mut self, locator: &Locator, property: &str) -> E2eResult<Option<String>> {
        let value = self.request(BridgeCommand::Style { locator, property }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.request(BridgeCommand::Click { locator }).await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Fill { locator, value }).await?;
        Ok(())
    }

    async fn page_text(&mut self) -> E2eResult<String> {
        let value = self.request(BridgeCommand::PageText).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.request(BridgeCommand::Screenshot { path }).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if let Err(e) = self.request(BridgeCommand::Close).await {
            warn!("Bridge close failed, killing it: {}", e);
            let _ = self.child.kill().await;
            return Ok(());
        }

        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                debug!("Bridge exited: {:?}", status?);
            }
            Err(_) => {
                warn!("Bridge did not exit after close, killing it");
                let _ = self.child.kill().await;
            }
        }
        Ok(())
    }
}

/// Runs inside the page. `mode` is `state`, `style` or `element`.
///
/// Text matching is case-insensitive on whitespace-normalized text and keeps
/// only the innermost matching elements. Role matching understands explicit
/// `role` attributes and the implicit roles of buttons, links, headings and
/// text inputs (password inputs have no role, as in ARIA).
const RESOLVE_IN_PAGE: &str = r#"
function resolveInPage({ steps, mode, property }) {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const lower = (s) => norm(s).toLowerCase();
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD']);

  const isVisible = (el) => {
    if (!el || !el.isConnected) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    return el.getClientRects().length > 0;
  };

  const roleOf = (el) => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit.trim().toLowerCase();
    const tag = el.tagName.toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'input') {
      const type = (el.getAttribute('type') || 'text').toLowerCase();
      if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
      if (type === 'checkbox' || type === 'radio') return type;
      if (['text', 'email', 'search', 'tel', 'url', 'number'].includes(type)) return 'textbox';
    }
    return null;
  };

  const accessibleName = (el) => {
    const label = el.getAttribute('aria-label');
    if (label) return norm(label);
    if (el.tagName === 'INPUT') {
      const type = (el.getAttribute('type') || '').toLowerCase();
      if (['button', 'submit', 'reset'].includes(type)) return norm(el.value);
      return norm(el.getAttribute('placeholder'));
    }
    return norm(el.textContent);
  };

  const descendants = (scope) =>
    Array.from(scope.querySelectorAll('*')).filter((el) => !SKIP.has(el.tagName));

  const byText = (scope, needle) => {
    const want = lower(needle);
    const hits = descendants(scope).filter((el) => lower(el.textContent).includes(want));
    return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
  };

  const step = (scopes, s) => {
    const out = [];
    const push = (el) => { if (el && !out.includes(el)) out.push(el); };
    for (const scope of scopes) {
      switch (s.kind) {
        case 'text':
          byText(scope, s.text).forEach(push);
          break;
        case 'role':
          descendants(scope)
            .filter((el) => roleOf(el) === s.role)
            .filter((el) => s.name == null || lower(accessibleName(el)).includes(lower(s.name)))
            .forEach(push);
          break;
        case 'test_id':
          scope.querySelectorAll(`[data-testid="${CSS.escape(s.id)}"]`).forEach(push);
          break;
        case 'css':
          scope.querySelectorAll(s.selector).forEach(push);
          break;
        case 'parent':
          push(scope.parentElement);
          break;
        default:
          throw new Error('unknown selector kind: ' + s.kind);
      }
    }
    return out;
  };

  let matches = [document.documentElement];
  for (const s of steps) matches = step(matches, s);
  const chosen = matches.find(isVisible) || matches[0] || null;

  if (mode === 'element') return chosen;
  if (mode === 'style') {
    return chosen ? window.getComputedStyle(chosen).getPropertyValue(property) : null;
  }
  return {
    count: matches.length,
    visible: isVisible(chosen),
    text: chosen ? norm(chosen.textContent) : '',
  };
}
"#;

const BRIDGE_TEMPLATE: &str = r#"
const { chromium, firefox, webkit } = require('playwright');
const readline = require('readline');

__RESOLVE_IN_PAGE__

const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {
  const browser = await __BROWSER__.launch({ headless: __HEADLESS__ });
  const context = await browser.newContext({
    viewport: { width: __WIDTH__, height: __HEIGHT__ }
  });
  const page = await context.newPage();
  page.setDefaultTimeout(__ACTION_TIMEOUT_MS__);

  const element = async (locator) => {
    const handle = await page.evaluateHandle(resolveInPage, { steps: locator.steps, mode: 'element' });
    const el = handle.asElement();
    if (!el) throw new Error('no element matches locator');
    return el;
  };

  reply({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (error) {
      continue;
    }
    try {
      let value = null;
      switch (cmd.op) {
        case 'goto':
          await page.goto(cmd.url);
          break;
        case 'state':
          value = await page.evaluate(resolveInPage, { steps: cmd.locator.steps, mode: 'state' });
          break;
        case 'style':
          value = await page.evaluate(resolveInPage, { steps: cmd.locator.steps, mode: 'style', property: cmd.property });
          break;
        case 'click':
          await (await element(cmd.locator)).click();
          break;
        case 'fill':
          await (await element(cmd.locator)).fill(cmd.value);
          break;
        case 'page_text':
          value = await page.evaluate(() => (document.body ? document.body.innerText : ''));
          break;
        case 'screenshot':
          await page.screenshot({ path: cmd.path, fullPage: true });
          break;
        case 'close':
          await browser.close();
          reply({ id: cmd.id, ok: true, value: null });
          process.exit(0);
        default:
          throw new Error('unknown op: ' + cmd.op);
      }
      reply({ id: cmd.id, ok: true, value });
    } catch (error) {
      reply({ id: cmd.id, ok: false, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  reply({ id: 0, ok: false, error: error.message });
  process.exit(1);
});
"#;
