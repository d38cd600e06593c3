use std::sync::Arc;

use rust_decimal::Decimal;

use invoicedesk_core::InvoiceId;
use invoicedesk_infra::{
    AppConfig, Artifact, DocumentAggregator, InMemoryInvoiceSource, PostgresInvoiceSource,
    ProcessRenderer, RenderError, RenderPipeline, RenderSettings, Renderer, SupplierProfile,
};
use invoicedesk_invoicing::FilingReport;

pub type InMemoryPipeline = RenderPipeline<Arc<InMemoryInvoiceSource>, Arc<dyn Renderer>>;
pub type PostgresPipeline = RenderPipeline<PostgresInvoiceSource, Arc<dyn Renderer>>;

/// Pipeline wiring, chosen once at startup.
pub enum AppServices {
    InMemory {
        pipeline: InMemoryPipeline,
        source: Arc<InMemoryInvoiceSource>,
    },
    Postgres {
        pipeline: PostgresPipeline,
    },
}

impl AppServices {
    /// In-memory wiring (dev/test); `source` stays writable through
    /// [`AppServices::in_memory_source`].
    pub fn in_memory(
        source: Arc<InMemoryInvoiceSource>,
        renderer: Arc<dyn Renderer>,
        supplier: SupplierProfile,
        settings: RenderSettings,
    ) -> Self {
        let pipeline = RenderPipeline::new(
            DocumentAggregator::new(source.clone(), supplier),
            renderer,
            settings,
        );
        Self::InMemory { pipeline, source }
    }

    pub fn in_memory_source(&self) -> Option<&Arc<InMemoryInvoiceSource>> {
        match self {
            AppServices::InMemory { source, .. } => Some(source),
            AppServices::Postgres { .. } => None,
        }
    }

    pub async fn render_bulk_report(&self) -> Result<Artifact, RenderError> {
        match self {
            AppServices::InMemory { pipeline, .. } => pipeline.render_bulk_report().await,
            AppServices::Postgres { pipeline } => pipeline.render_bulk_report().await,
        }
    }

    pub async fn render_invoice_pdf(&self, id: &InvoiceId) -> Result<Artifact, RenderError> {
        match self {
            AppServices::InMemory { pipeline, .. } => pipeline.render_invoice_pdf(id).await,
            AppServices::Postgres { pipeline } => pipeline.render_invoice_pdf(id).await,
        }
    }

    pub async fn filing_report(&self, pay_threshold: Decimal) -> Result<FilingReport, RenderError> {
        match self {
            AppServices::InMemory { pipeline, .. } => pipeline.filing_report(pay_threshold).await,
            AppServices::Postgres { pipeline } => pipeline.filing_report(pay_threshold).await,
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let renderer: Arc<dyn Renderer> = Arc::new(ProcessRenderer::new(
        config.bulk_renderer.clone(),
        config.pdf_renderer.clone(),
    ));

    match &config.database_url {
        Some(url) => {
            let source = PostgresInvoiceSource::connect(url).await?;
            tracing::info!("serving invoices from Postgres");
            let pipeline = RenderPipeline::new(
                DocumentAggregator::new(source, config.supplier.clone()),
                renderer,
                config.render_settings(),
            );
            Ok(AppServices::Postgres { pipeline })
        }
        None => Ok(AppServices::in_memory(
            Arc::new(InMemoryInvoiceSource::new()),
            renderer,
            config.supplier.clone(),
            config.render_settings(),
        )),
    }
}
