//! Read-only invoice data source abstractions.
//!
//! Rows carry numeric columns as optional text exactly as the store returns
//! them; interpretation (coercion, defaults) belongs to the aggregator.

use async_trait::async_trait;
use thiserror::Error;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryInvoiceSource;
pub use postgres::PostgresInvoiceSource;

/// One invoice header joined with its customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceRow {
    pub id: String,
    pub invoice_date: Option<String>,
    pub customer_name: Option<String>,
    pub customer_gstin: Option<String>,
    pub place_of_supply: Option<String>,
    pub taxable_amount: Option<String>,
    pub cgst: Option<String>,
    pub sgst: Option<String>,
    pub igst: Option<String>,
    pub total_amount: Option<String>,
}

/// One invoice line, in invoice order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineItemRow {
    pub description: Option<String>,
    pub hsn: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub gst_rate: Option<String>,
    pub gst_amount: Option<String>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("data source query `{operation}` failed: {message}")]
    Query {
        operation: &'static str,
        message: String,
    },
}

/// Read operations the pipeline needs from the invoice store.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn fetch_invoice(&self, id: &str) -> Result<Option<InvoiceRow>, SourceError>;

    /// All invoices, in the store's listing order.
    async fn fetch_all_invoices(&self) -> Result<Vec<InvoiceRow>, SourceError>;

    /// Lines of one invoice, in their recorded order.
    async fn fetch_items(&self, invoice_id: &str) -> Result<Vec<LineItemRow>, SourceError>;
}

#[async_trait]
impl<T: InvoiceSource + ?Sized> InvoiceSource for std::sync::Arc<T> {
    async fn fetch_invoice(&self, id: &str) -> Result<Option<InvoiceRow>, SourceError> {
        (**self).fetch_invoice(id).await
    }

    async fn fetch_all_invoices(&self) -> Result<Vec<InvoiceRow>, SourceError> {
        (**self).fetch_all_invoices().await
    }

    async fn fetch_items(&self, invoice_id: &str) -> Result<Vec<LineItemRow>, SourceError> {
        (**self).fetch_items(invoice_id).await
    }
}
