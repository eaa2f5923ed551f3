//! External MCP server process supervision.
//!
//! Spawns the child process hosting an external MCP server, polls its health
//! endpoint until it answers or the startup budget runs out, and tears it
//! down with a graceful-termination window before force-killing.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::mcp::client::ExternalMcpClient;

/// Grace period for voluntary exit before force-kill.
const STOP_GRACE: Duration = Duration::from_secs(5);
/// Interval between health polls during startup.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// How much captured child output to keep in error messages.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Supervisor for one external MCP server child process.
#[derive(Debug)]
pub struct ExternalMcpProcess {
    program: PathBuf,
    args: Vec<String>,
    startup_timeout: Duration,
    server_url: String,
    child: Option<Child>,
}

impl ExternalMcpProcess {
    /// Create a supervisor for `program` serving on `host:port`.
    pub fn new(
        program: PathBuf,
        args: Vec<String>,
        host: &str,
        port: u16,
        startup_timeout: Duration,
    ) -> Self {
        Self {
            program,
            args,
            startup_timeout,
            server_url: format!("http://{host}:{port}"),
            child: None,
        }
    }

    /// Base URL the spawned server listens on.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Replace the argument list before the next start.
    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    /// Start the child and wait for it to answer health checks.
    ///
    /// Polls every second up to the startup timeout. If the child dies during
    /// startup the tail of its output is captured into the error; on timeout
    /// the child is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalProcess`] on spawn failure, early child
    /// death, or startup timeout.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            info!("external MCP server already running");
            return Ok(());
        }

        let command_line = self.command_line();
        info!(cmd = %command_line, "starting external MCP server");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalProcess {
                command: command_line.clone(),
                reason: format!("spawn failed: {e}"),
                exit_code: None,
            })?;

        let client = ExternalMcpClient::new(&self.server_url, Duration::from_secs(2), 1)?;
        let deadline = tokio::time::Instant::now() + self.startup_timeout;

        loop {
            if client.health_check().await {
                info!("external MCP server started successfully");
                self.child = Some(child);
                return Ok(());
            }

            if let Ok(Some(status)) = child.try_wait() {
                let output = Self::capture_output_tail(&mut child).await;
                error!(%status, output = %output, "external MCP server process died");
                return Err(Error::ExternalProcess {
                    command: command_line,
                    reason: format!("process died during startup: {output}"),
                    exit_code: status.code(),
                });
            }

            if tokio::time::Instant::now() >= deadline {
                error!("external MCP server startup timeout");
                let _ = child.kill().await;
                return Err(Error::ExternalProcess {
                    command: command_line,
                    reason: format!(
                        "startup timeout after {}s",
                        self.startup_timeout.as_secs()
                    ),
                    exit_code: None,
                });
            }

            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Stop the child: graceful termination first, force-kill after the
    /// grace period. Safe to call when not running.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            info!(pid, "stopping external MCP process");
            Self::request_termination(pid);
        }

        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(_)) => info!("external MCP process stopped gracefully"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for process exit"),
            Err(_) => {
                warn!("graceful shutdown timed out, forcing termination");
                let _ = child.kill().await;
            }
        }
    }

    /// Stop and start again; used when the server stops answering health
    /// checks mid-session.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::ExternalProcess`] from the restart.
    pub async fn restart(&mut self) -> Result<()> {
        self.stop().await;
        self.start().await
    }

    /// Whether the child process is currently alive.
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    #[cfg(unix)]
    fn request_termination(pid: u32) {
        // tokio exposes no SIGTERM; ask the platform to deliver one so the
        // child gets its graceful-shutdown window before the hard kill.
        let _ = std::process::Command::new("kill")
            .arg(pid.to_string())
            .status();
    }

    #[cfg(not(unix))]
    fn request_termination(_pid: u32) {}

    async fn capture_output_tail(child: &mut Child) -> String {
        let mut output = String::new();

        if let Some(mut stdout) = child.stdout.take() {
            let mut buf = String::new();
            if stdout.read_to_string(&mut buf).await.is_ok() && !buf.is_empty() {
                output.push_str("stdout: ");
                output.push_str(&buf);
            }
        }
        if let Some(mut stderr) = child.stderr.take() {
            let mut buf = String::new();
            if stderr.read_to_string(&mut buf).await.is_ok() && !buf.is_empty() {
                if !output.is_empty() {
                    output.push_str("; ");
                }
                output.push_str("stderr: ");
                output.push_str(&buf);
            }
        }

        if output.chars().count() > OUTPUT_TAIL_CHARS {
            let skip = output.chars().count().saturating_sub(OUTPUT_TAIL_CHARS);
            output = output.chars().skip(skip).collect();
        }
        output
    }
}
