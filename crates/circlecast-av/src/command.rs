//! Builder for executing external tool commands under a hard timeout.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long to wait for the output pipes to close once the process is gone.
///
/// A grandchild that inherited the pipes can keep them open after the direct
/// child exits; we stop reading after this grace period.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// How a bounded run ended, when the process could at least be started.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// The process exited on its own (successfully or not).
    Exited(ToolOutput),
    /// The wall-clock bound fired; the process was killed and reaped.
    TimedOut(Duration),
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use circlecast_av::{ToolCommand, ToolOutcome};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> circlecast_core::Result<()> {
/// let outcome = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .timeout(Duration::from_secs(10))
///     .run()
///     .await?;
/// if let ToolOutcome::Exited(out) = outcome {
///     println!("{}", out.stdout);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command under the configured timeout.
    ///
    /// Standard input is closed; standard output and error are captured. A
    /// non-zero exit is *not* an error here: it is reported as
    /// [`ToolOutcome::Exited`] with the failing status so callers can tell it
    /// apart from a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`circlecast_core::Error::Tool`] if the process cannot be
    /// spawned or waiting on it fails.
    pub async fn run(&self) -> circlecast_core::Result<ToolOutcome> {
        let program_name = self.program_name();

        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            circlecast_core::Error::tool(&program_name, format!("failed to spawn: {e}"))
        })?;

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout = drain(stdout_task).await;
                let stderr = drain(stderr_task).await;
                Ok(ToolOutcome::Exited(ToolOutput {
                    status,
                    stdout,
                    stderr,
                }))
            }
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                Err(circlecast_core::Error::tool(
                    program_name,
                    format!("I/O error waiting for process: {e}"),
                ))
            }
            Err(_elapsed) => {
                // Kill and reap so no zombie or runaway encoder is left behind.
                if let Err(e) = child.kill().await {
                    tracing::warn!("{program_name}: failed to kill timed-out process: {e}");
                }
                stdout_task.abort();
                stderr_task.abort();
                Ok(ToolOutcome::TimedOut(self.timeout))
            }
        }
    }

    /// Execute the command and require a successful exit.
    ///
    /// # Errors
    ///
    /// - Returns [`circlecast_core::Error::Tool`] if the process times out
    ///   (message includes the timeout duration).
    /// - Returns [`circlecast_core::Error::Tool`] if the process exits with a
    ///   non-zero status (message includes stderr).
    /// - Returns [`circlecast_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> circlecast_core::Result<ToolOutput> {
        match self.run().await? {
            ToolOutcome::Exited(output) if output.status.success() => Ok(output),
            ToolOutcome::Exited(output) => Err(circlecast_core::Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            )),
            ToolOutcome::TimedOut(after) => Err(circlecast_core::Error::tool(
                self.program_name(),
                format!("timed out after {after:?}"),
            )),
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error just truncates the captured text.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

async fn drain(task: JoinHandle<Vec<u8>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(PIPE_DRAIN_GRACE, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}
