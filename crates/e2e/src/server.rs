//! App server management - optionally spawning the app under test and
//! waiting until it answers

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running app process
pub struct AppServer {
    child: Child,
    pub base_url: String,
    stopped: bool,
}

impl AppServer {
    /// Spawn `config.command` through the shell and wait for `base_url`
    pub async fn spawn(config: AppServerConfig) -> E2eResult<Self> {
        info!("Spawning app: {}", config.command);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&config.command);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        // the app's test mode exposes /api/testing/reset
        cmd.env("NODE_ENV", "test")
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // the app runs as a grandchild (npm, compound commands); give the
        // whole tree its own process group so stop() can signal all of it
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {:?}: {}", config.command, e))
        })?;

        let mut handle = AppServer {
            child,
            base_url: config.base_url.clone(),
            stopped: false,
        };

        if let Err(e) = wait_until_reachable(&config.base_url, config.startup_timeout).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("App is reachable at {}", config.base_url);
        Ok(handle)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the app and every process it started. Safe to call twice.
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("Stopping app (pid: {})", self.child.id());

        // Try graceful shutdown first. The group leader is not reaped until
        // wait() below, so the group id cannot be reused in between.
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(self.child.id() as i32);
            if killpg(pgid, Signal::SIGTERM).is_ok() {
                // Give it a moment to shut down gracefully
                std::thread::sleep(Duration::from_millis(500));
                // Force kill whatever is left in the group
                let _ = killpg(pgid, Signal::SIGKILL);
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning the app
#[derive(Debug, Clone)]
pub struct AppServerConfig {
    /// Shell command, e.g. `npm run start:test`
    pub command: String,
    pub working_dir: Option<PathBuf>,
    /// URL polled until it answers
    pub base_url: String,
    pub startup_timeout: Duration,
}

impl Default for AppServerConfig {
    fn default() -> Self {
        Self {
            command: "npm run start:test".to_string(),
            working_dir: None,
            base_url: "http://localhost:5173".to_string(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// Poll `url` until any HTTP response arrives
pub async fn wait_until_reachable(url: &str, timeout_duration: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .no_proxy()
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for app at {}...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Reachability check error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            return Err(E2eError::AppUnreachable {
                url: url.to_string(),
                attempts,
            });
        }
        sleep(Duration::from_millis(100)).await;
    }
}
