//! Per-request render orchestration: aggregate → normalize → render → deliver.
//!
//! A pipeline holds no per-request state; concurrent calls share only the
//! read-only source and renderer configuration.

use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use invoicedesk_core::InvoiceId;
use invoicedesk_invoicing::{FilingReport, build_filing_report, normalize_bulk, normalize_single};

use crate::aggregator::DocumentAggregator;
use crate::delivery::{Artifact, content_type, deliver};
use crate::error::RenderError;
use crate::render::{RenderJob, RenderSettings, Renderer};
use crate::source::InvoiceSource;

pub struct RenderPipeline<S, R> {
    aggregator: DocumentAggregator<S>,
    renderer: R,
    settings: RenderSettings,
}

impl<S: InvoiceSource, R: Renderer> RenderPipeline<S, R> {
    pub fn new(aggregator: DocumentAggregator<S>, renderer: R, settings: RenderSettings) -> Self {
        Self {
            aggregator,
            renderer,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Spreadsheet over every invoice in the store.
    #[instrument(skip(self))]
    pub async fn render_bulk_report(&self) -> Result<Artifact, RenderError> {
        let aggregates = self.aggregator.aggregate_all().await?;
        let payload = normalize_bulk(&aggregates)?;
        let job = RenderJob::bulk(payload, &self.settings);
        self.execute(job).await
    }

    /// PDF for one invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn render_invoice_pdf(&self, invoice_id: &InvoiceId) -> Result<Artifact, RenderError> {
        let aggregate = self.aggregator.aggregate_one(invoice_id).await?;
        let document = normalize_single(&aggregate)?;
        let job = RenderJob::single(invoice_id, document, &self.settings);
        self.execute(job).await
    }

    /// Period totals and filing hints; no renderer involved.
    #[instrument(skip(self))]
    pub async fn filing_report(&self, pay_threshold: Decimal) -> Result<FilingReport, RenderError> {
        let aggregates = self.aggregator.aggregate_all().await?;
        Ok(build_filing_report(&aggregates, pay_threshold)?)
    }

    async fn execute(&self, job: RenderJob) -> Result<Artifact, RenderError> {
        let started = Instant::now();
        let outcome = self.renderer.render(&job).await;
        let output = outcome.into_result()?;

        let artifact = deliver(&output, job.download_name().to_string(), content_type(job.kind())).await?;
        info!(
            job_id = %job.id(),
            kind = %job.kind(),
            bytes = artifact.len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "artifact delivered"
        );
        Ok(artifact)
    }
}
