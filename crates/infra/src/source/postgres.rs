//! Postgres-backed invoice source.
//!
//! Expected relations:
//!
//! | Table | Columns used |
//! |-------|--------------|
//! | `invoices` | `id`, `invoice_date`, `customer_id`, `place_of_supply`, `taxable_amount`, `cgst`, `sgst`, `igst`, `total_amount` |
//! | `customers` | `id`, `name`, `gstin` |
//! | `invoice_items` | `invoice_id`, `position`, `description`, `hsn`, `quantity`, `unit_price`, `gst_rate`, `gst_amount` |
//!
//! Every date and numeric column is selected as `::text`; legacy rows hold
//! formatted strings (`"₹1,200.00"`, `"05/11/2024"`) and coercion happens in
//! the aggregator, not in SQL.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, Span};

use super::{InvoiceRow, InvoiceSource, LineItemRow, SourceError};

const INVOICE_COLUMNS: &str = r#"
    i.id::text              AS id,
    i.invoice_date::text    AS invoice_date,
    c.name                  AS customer_name,
    c.gstin                 AS customer_gstin,
    i.place_of_supply       AS place_of_supply,
    i.taxable_amount::text  AS taxable_amount,
    i.cgst::text            AS cgst,
    i.sgst::text            AS sgst,
    i.igst::text            AS igst,
    i.total_amount::text    AS total_amount
"#;

#[derive(Debug, Clone)]
pub struct PostgresInvoiceSource {
    pool: Arc<PgPool>,
}

impl PostgresInvoiceSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a small read-only pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl InvoiceSource for PostgresInvoiceSource {
    #[instrument(skip(self), fields(operation = "fetch_invoice"), err)]
    async fn fetch_invoice(&self, id: &str) -> Result<Option<InvoiceRow>, SourceError> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices i \
             LEFT JOIN customers c ON c.id = i.customer_id \
             WHERE i.id::text = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_invoice", e))?;

        row.map(|r| InvoiceRow::from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("fetch_invoice", e))
    }

    #[instrument(skip(self), fields(operation = "fetch_all_invoices", invoice_count), err)]
    async fn fetch_all_invoices(&self) -> Result<Vec<InvoiceRow>, SourceError> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices i \
             LEFT JOIN customers c ON c.id = i.customer_id \
             ORDER BY i.invoice_date, i.id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_all_invoices", e))?;

        let invoices = rows
            .iter()
            .map(InvoiceRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("fetch_all_invoices", e))?;

        Span::current().record("invoice_count", invoices.len());
        Ok(invoices)
    }

    #[instrument(skip(self), fields(operation = "fetch_items"), err)]
    async fn fetch_items(&self, invoice_id: &str) -> Result<Vec<LineItemRow>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT
                description,
                hsn,
                quantity::text   AS quantity,
                unit_price::text AS unit_price,
                gst_rate::text   AS gst_rate,
                gst_amount::text AS gst_amount
            FROM invoice_items
            WHERE invoice_id::text = $1
            ORDER BY position ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_items", e))?;

        rows.iter()
            .map(LineItemRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("fetch_items", e))
    }
}

impl<'r> FromRow<'r, PgRow> for InvoiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            invoice_date: row.try_get("invoice_date")?,
            customer_name: row.try_get("customer_name")?,
            customer_gstin: row.try_get("customer_gstin")?,
            place_of_supply: row.try_get("place_of_supply")?,
            taxable_amount: row.try_get("taxable_amount")?,
            cgst: row.try_get("cgst")?,
            sgst: row.try_get("sgst")?,
            igst: row.try_get("igst")?,
            total_amount: row.try_get("total_amount")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for LineItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            description: row.try_get("description")?,
            hsn: row.try_get("hsn")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            gst_rate: row.try_get("gst_rate")?,
            gst_amount: row.try_get("gst_amount")?,
        })
    }
}

/// Map SQLx errors to SourceError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            SourceError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => SourceError::Query {
            operation,
            message: db_err.message().to_string(),
        },
        other => SourceError::Query {
            operation,
            message: other.to_string(),
        },
    }
}
