//! Subprocess-backed renderer.
//!
//! Argument conventions (after the configured base args):
//!
//! | Job | Arguments |
//! |-----|-----------|
//! | bulk report | `<payload-json> <output>` |
//! | bulk report, payload over the inline ceiling | `--payload-file <intermediate> <output>` |
//! | single PDF | `<intermediate> --out <output>` |
//!
//! The child runs in its own process group with stdin closed and both output
//! streams piped. A timeout kills the whole group.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use invoicedesk_core::RenderJobId;

use super::job::{RenderJob, RenderJobKind};
use super::outcome::{Diagnostics, RenderOutcome};
use super::Renderer;

/// Largest bulk payload passed as a command-line argument.
pub const DEFAULT_MAX_INLINE_PAYLOAD: usize = 96 * 1024;

/// Retained tail of each captured stream.
pub const CAPTURE_LIMIT: usize = 64 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// How long to wait for capture tasks once the child is gone.
const CAPTURE_GRACE: Duration = Duration::from_secs(2);

/// Program plus fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RendererCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

/// Runs one external program per job kind.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    bulk: RendererCommand,
    single: RendererCommand,
    max_inline_payload: usize,
}

impl ProcessRenderer {
    pub fn new(bulk: RendererCommand, single: RendererCommand) -> Self {
        Self {
            bulk,
            single,
            max_inline_payload: DEFAULT_MAX_INLINE_PAYLOAD,
        }
    }

    pub fn with_max_inline_payload(mut self, bytes: usize) -> Self {
        self.max_inline_payload = bytes;
        self
    }

    fn command_for(&self, kind: RenderJobKind) -> &RendererCommand {
        match kind {
            RenderJobKind::BulkReport => &self.bulk,
            RenderJobKind::SinglePdf => &self.single,
        }
    }

    /// Serialize the payload and decide how it reaches the child.
    async fn stage(&self, job: &RenderJob) -> std::io::Result<(Vec<OsString>, Option<IntermediateFile>)> {
        let json = serde_json::to_string(job.payload())?;
        let output = job.output_path().as_os_str().to_owned();

        let inline = job.kind() == RenderJobKind::BulkReport && json.len() <= self.max_inline_payload;
        if inline {
            return Ok((vec![OsString::from(json), output], None));
        }

        let file = IntermediateFile::write(job.intermediate_path(), json.as_bytes()).await?;
        let path = file.path().as_os_str().to_owned();
        let args = match job.kind() {
            RenderJobKind::BulkReport => vec![OsString::from("--payload-file"), path, output],
            RenderJobKind::SinglePdf => vec![path, OsString::from("--out"), output],
        };
        Ok((args, Some(file)))
    }

    async fn run(&self, command: &RendererCommand, args: Vec<OsString>, job: &RenderJob) -> RenderOutcome {
        let started = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RenderOutcome::ProcessSpawnFailure {
                    program: command.display_program(),
                    message: e.to_string(),
                };
            }
        };
        let pid = child.id();
        debug!(job_id = %job.id(), pid = ?pid, "renderer spawned");

        let stdout = child
            .stdout
            .take()
            .map(|s| tokio::spawn(capture(s, "stdout", job.id())));
        let stderr = child
            .stderr
            .take()
            .map(|s| tokio::spawn(capture(s, "stderr", job.id())));

        let waited = tokio::time::timeout(job.budget(), child.wait()).await;
        let status: Option<std::io::Result<ExitStatus>> = match waited {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(job_id = %job.id(), pid = ?pid, budget_secs = job.budget().as_secs_f64(), "renderer timed out; killing");
                #[cfg(unix)]
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                if let Err(e) = child.kill().await {
                    debug!(job_id = %job.id(), error = %e, "kill after timeout failed");
                }
                None
            }
        };

        let diagnostics = Diagnostics {
            stdout: join_capture(stdout).await,
            stderr: join_capture(stderr).await,
            elapsed: started.elapsed(),
        };

        match status {
            None => RenderOutcome::Timeout {
                budget: job.budget(),
                diagnostics,
            },
            Some(Err(e)) => RenderOutcome::NonZeroExit {
                code: None,
                diagnostics: Diagnostics {
                    stderr: format!("{}\nwait failed: {e}", diagnostics.stderr),
                    ..diagnostics
                },
            },
            Some(Ok(status)) if status.success() => {
                if output_exists(job.output_path()).await {
                    RenderOutcome::Success {
                        output_path: job.output_path().to_path_buf(),
                        diagnostics,
                    }
                } else {
                    RenderOutcome::OutputMissing {
                        output_path: job.output_path().to_path_buf(),
                        diagnostics,
                    }
                }
            }
            Some(Ok(status)) => RenderOutcome::NonZeroExit {
                code: status.code(),
                diagnostics,
            },
        }
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    #[instrument(skip(self, job), fields(job_id = %job.id(), kind = %job.kind()))]
    async fn render(&self, job: &RenderJob) -> RenderOutcome {
        let command = self.command_for(job.kind());
        info!(
            program = %command.program.display(),
            invoices = job.payload().invoice_count(),
            "render job started"
        );

        let (args, intermediate) = match self.stage(job).await {
            Ok(staged) => staged,
            Err(e) => {
                let outcome = RenderOutcome::ProcessSpawnFailure {
                    program: command.display_program(),
                    message: format!("could not stage payload: {e}"),
                };
                warn!(outcome = outcome.kind(), error = %e, "render job failed");
                return outcome;
            }
        };

        let outcome = self.run(command, args, job).await;

        if let Some(file) = intermediate {
            file.remove().await;
        }

        let elapsed_ms = outcome
            .diagnostics()
            .map(|d| d.elapsed.as_millis() as u64)
            .unwrap_or_default();
        if outcome.is_success() {
            info!(elapsed_ms, "render job finished");
        } else {
            warn!(
                outcome = outcome.kind(),
                elapsed_ms,
                stderr = outcome.diagnostics().map(|d| d.stderr.as_str()).unwrap_or_default(),
                "render job failed"
            );
        }
        outcome
    }
}

async fn output_exists(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not stat renderer output");
            false
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pid, "sent SIGKILL to renderer process group"),
        Err(e) => debug!(pid, error = %e, "SIGKILL to process group failed"),
    }
}

/// Fixed-size tail of a byte stream.
#[derive(Debug)]
struct CaptureBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl CaptureBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.limit {
            let excess = self.bytes.len() - self.limit;
            self.bytes.drain(..excess);
            self.truncated = true;
        }
    }

    fn into_string(self) -> String {
        let text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            format!("[earlier output truncated]\n{text}")
        } else {
            text
        }
    }
}

async fn capture<R>(mut reader: R, stream: &'static str, job_id: RenderJobId) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buffer = CaptureBuffer::new(CAPTURE_LIMIT);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                trace!(
                    job_id = %job_id,
                    stream,
                    output = %String::from_utf8_lossy(&chunk[..n]),
                    "renderer output"
                );
                buffer.push(&chunk[..n]);
            }
            Err(e) => {
                debug!(job_id = %job_id, stream, error = %e, "renderer stream read failed");
                break;
            }
        }
    }
    buffer.into_string()
}

async fn join_capture(handle: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(CAPTURE_GRACE, &mut handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!(error = %e, "capture task failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

/// Scratch file owned by one job.
///
/// Removed explicitly once the child is gone; `Drop` removes it on any
/// early exit (error, cancelled future, panic).
#[derive(Debug)]
pub struct IntermediateFile {
    path: PathBuf,
    armed: bool,
}

impl IntermediateFile {
    pub async fn write(path: &Path, contents: &[u8]) -> std::io::Result<Self> {
        let file = Self {
            path: path.to_path_buf(),
            armed: true,
        };
        tokio::fs::write(&file.path, contents).await?;
        debug!(path = %file.path.display(), bytes = contents.len(), "intermediate file written");
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "intermediate file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove intermediate file"),
        }
    }
}

impl Drop for IntermediateFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
