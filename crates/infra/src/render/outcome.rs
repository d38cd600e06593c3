use std::path::PathBuf;
use std::time::Duration;

use crate::error::RenderError;

/// Captured renderer output. Attached to outcomes, never parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// How one renderer invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Success {
        output_path: PathBuf,
        diagnostics: Diagnostics,
    },
    Timeout {
        budget: Duration,
        diagnostics: Diagnostics,
    },
    /// `code` is `None` when the process died from a signal.
    NonZeroExit {
        code: Option<i32>,
        diagnostics: Diagnostics,
    },
    ProcessSpawnFailure {
        program: String,
        message: String,
    },
    OutputMissing {
        output_path: PathBuf,
        diagnostics: Diagnostics,
    },
}

impl RenderOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderOutcome::Success { .. } => "success",
            RenderOutcome::Timeout { .. } => "timeout",
            RenderOutcome::NonZeroExit { .. } => "nonzero_exit",
            RenderOutcome::ProcessSpawnFailure { .. } => "process_spawn_failure",
            RenderOutcome::OutputMissing { .. } => "output_missing",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success { .. })
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            RenderOutcome::Success { diagnostics, .. }
            | RenderOutcome::Timeout { diagnostics, .. }
            | RenderOutcome::NonZeroExit { diagnostics, .. }
            | RenderOutcome::OutputMissing { diagnostics, .. } => Some(diagnostics),
            RenderOutcome::ProcessSpawnFailure { .. } => None,
        }
    }

    /// The produced file, or the error this outcome maps to.
    pub fn into_result(self) -> Result<PathBuf, RenderError> {
        match self {
            RenderOutcome::Success { output_path, .. } => Ok(output_path),
            RenderOutcome::Timeout { budget, diagnostics } => Err(RenderError::Timeout {
                budget,
                stderr: diagnostics.stderr,
            }),
            RenderOutcome::NonZeroExit { code, diagnostics } => Err(RenderError::NonZeroExit {
                code,
                stderr: diagnostics.stderr,
            }),
            RenderOutcome::ProcessSpawnFailure { program, message } => {
                Err(RenderError::ProcessSpawnFailure { program, message })
            }
            RenderOutcome::OutputMissing {
                output_path,
                diagnostics,
            } => Err(RenderError::OutputMissing {
                path: output_path,
                stderr: diagnostics.stderr,
            }),
        }
    }
}
