use std::path::{Path, PathBuf};
use std::time::Duration;

use invoicedesk_core::{InvoiceId, RenderJobId};
use invoicedesk_invoicing::{BulkPayload, DocumentPayload, SingleDocument};

/// Default wall-clock budget for one renderer invocation.
pub const DEFAULT_RENDER_BUDGET: Duration = Duration::from_secs(60);

/// What a render job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderJobKind {
    /// Spreadsheet over many invoices.
    BulkReport,
    /// PDF for one invoice.
    SinglePdf,
}

impl RenderJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderJobKind::BulkReport => "bulk_report",
            RenderJobKind::SinglePdf => "single_pdf",
        }
    }
}

impl core::fmt::Display for RenderJobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub budget: Duration,
}

impl RenderSettings {
    pub fn new(output_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            scratch_dir: scratch_dir.into(),
            budget: DEFAULT_RENDER_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }
}

/// One renderer invocation. Created per request, never persisted.
///
/// Every path embeds the job id, so concurrent jobs never share files. The
/// intermediate path is only materialized when the payload travels by file.
#[derive(Debug, Clone)]
pub struct RenderJob {
    id: RenderJobId,
    kind: RenderJobKind,
    payload: DocumentPayload,
    output_path: PathBuf,
    intermediate_path: PathBuf,
    /// Name offered to the client, without the job id.
    download_name: String,
    budget: Duration,
}

impl RenderJob {
    pub fn bulk(payload: BulkPayload, settings: &RenderSettings) -> Self {
        let id = RenderJobId::new();
        Self {
            id,
            kind: RenderJobKind::BulkReport,
            payload: DocumentPayload::Bulk(payload),
            output_path: settings
                .output_dir
                .join(format!("invoices_report_{id}.xlsx")),
            intermediate_path: intermediate_path(&settings.scratch_dir, id),
            download_name: "invoices_report.xlsx".to_string(),
            budget: settings.budget,
        }
    }

    pub fn single(invoice_id: &InvoiceId, document: SingleDocument, settings: &RenderSettings) -> Self {
        let id = RenderJobId::new();
        let stem = invoice_id.file_stem();
        Self {
            id,
            kind: RenderJobKind::SinglePdf,
            payload: DocumentPayload::Single(document),
            output_path: settings.output_dir.join(format!("Invoice_{stem}_{id}.pdf")),
            intermediate_path: intermediate_path(&settings.scratch_dir, id),
            download_name: format!("Invoice_{stem}.pdf"),
            budget: settings.budget,
        }
    }

    pub fn id(&self) -> RenderJobId {
        self.id
    }

    pub fn kind(&self) -> RenderJobKind {
        self.kind
    }

    pub fn payload(&self) -> &DocumentPayload {
        &self.payload
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn intermediate_path(&self) -> &Path {
        &self.intermediate_path
    }

    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

fn intermediate_path(scratch_dir: &Path, id: RenderJobId) -> PathBuf {
    scratch_dir.join(format!("invoicedesk-{id}.json"))
}
