use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use invoicedesk_invoicing::SchemaViolation;

use crate::source::SourceError;

/// Terminal failure of one render request.
///
/// Every variant aborts the request; nothing is retried.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invoice {invoice_id} not found")]
    NotFound { invoice_id: String },

    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    #[error("renderer `{program}` could not be started: {message}")]
    ProcessSpawnFailure { program: String, message: String },

    #[error("renderer exceeded its {}s budget{}", budget.as_secs(), diagnostic_suffix(stderr))]
    Timeout { budget: Duration, stderr: String },

    #[error("renderer exited with {}{}", exit_label(*code), diagnostic_suffix(stderr))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("renderer reported success but produced no file at {}{}", path.display(), diagnostic_suffix(stderr))]
    OutputMissing { path: PathBuf, stderr: String },

    #[error("could not deliver {}: {message}", path.display())]
    DeliveryFailed { path: PathBuf, message: String },

    #[error(transparent)]
    DataSource(#[from] SourceError),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn diagnostic_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl RenderError {
    /// Stable machine-readable code for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::NotFound { .. } => "not_found",
            RenderError::SchemaViolation(_) => "schema_violation",
            RenderError::ProcessSpawnFailure { .. } => "process_spawn_failure",
            RenderError::Timeout { .. } => "timeout",
            RenderError::NonZeroExit { .. } => "nonzero_exit",
            RenderError::OutputMissing { .. } => "output_missing",
            RenderError::DeliveryFailed { .. } => "delivery_failed",
            RenderError::DataSource(_) => "data_source",
        }
    }
}
