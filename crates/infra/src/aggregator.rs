//! Document aggregator: data-source rows → `InvoiceAggregate`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use invoicedesk_core::{DomainError, InvoiceId};
use invoicedesk_invoicing::{
    CoercionPolicy, InvoiceAggregate, InvoiceHeader, LineItem, NewLineItem, NumericField,
    SchemaViolation, TaxSplit,
};

use crate::error::RenderError;
use crate::source::{InvoiceRow, InvoiceSource, LineItemRow};

/// Date layouts found in upstream rows, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
];

/// Parse an upstream date leniently; `None` when no layout matches.
pub fn parse_invoice_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            // `timestamp::text` renders as `YYYY-MM-DD hh:mm:ss`
            raw.get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}

/// Supplier identity injected into every aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierProfile {
    pub gstin: Option<String>,
    pub name: Option<String>,
}

/// Builds complete aggregates from an invoice source.
///
/// Numeric cells are coerced through the configured [`CoercionPolicy`]:
/// absent or unparsable values take the field default (amounts and rates
/// `0`, quantity `1`). Each substitution is logged at `debug`.
pub struct DocumentAggregator<S> {
    source: S,
    policy: CoercionPolicy,
    supplier: SupplierProfile,
}

impl<S: InvoiceSource> DocumentAggregator<S> {
    pub fn new(source: S, supplier: SupplierProfile) -> Self {
        Self {
            source,
            policy: CoercionPolicy::lenient(),
            supplier,
        }
    }

    pub fn with_policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CoercionPolicy {
        &self.policy
    }

    /// Aggregate one invoice; `NotFound` when the id matches nothing.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn aggregate_one(&self, id: &InvoiceId) -> Result<InvoiceAggregate, RenderError> {
        let row = self
            .source
            .fetch_invoice(id.as_str())
            .await?
            .ok_or_else(|| RenderError::NotFound {
                invoice_id: id.to_string(),
            })?;
        self.assemble(row).await
    }

    /// Aggregate every invoice. An empty store yields an empty vector.
    #[instrument(skip(self))]
    pub async fn aggregate_all(&self) -> Result<Vec<InvoiceAggregate>, RenderError> {
        let rows = self.source.fetch_all_invoices().await?;
        let mut aggregates = Vec::with_capacity(rows.len());
        for row in rows {
            aggregates.push(self.assemble(row).await?);
        }
        debug!(invoice_count = aggregates.len(), "aggregated invoices");
        Ok(aggregates)
    }

    async fn assemble(&self, row: InvoiceRow) -> Result<InvoiceAggregate, RenderError> {
        let item_rows = self.source.fetch_items(&row.id).await?;
        let header = self.header(row)?;
        let kind = header.supply_kind();

        let rejected = |field: &'static str, error: DomainError| {
            debug!(invoice_id = %header.id, field, %error, "invoice rejected");
            SchemaViolation {
                invoice_id: header.id.to_string(),
                field,
            }
        };

        let items = item_rows
            .into_iter()
            .map(|item| self.line_item(header.id.as_str(), item))
            .map(|input| LineItem::new(input, kind).map_err(|e| rejected("items", e)))
            .collect::<Result<Vec<_>, _>>()?;

        let id = header.id.clone();
        InvoiceAggregate::assemble(header, items).map_err(|error| {
            debug!(invoice_id = %id, %error, "invoice totals rejected");
            RenderError::from(SchemaViolation {
                invoice_id: id.to_string(),
                field: "total_amount",
            })
        })
    }

    fn header(&self, row: InvoiceRow) -> Result<InvoiceHeader, SchemaViolation> {
        let id = InvoiceId::new(&row.id).map_err(|_| SchemaViolation {
            invoice_id: row.id.clone(),
            field: "invoice_id",
        })?;

        let issue_date = row.invoice_date.as_deref().and_then(parse_invoice_date);
        if issue_date.is_none() && row.invoice_date.is_some() {
            debug!(invoice_id = %id, raw = ?row.invoice_date, "unparsable invoice date treated as absent");
        }

        let num = |field, raw: &Option<String>| self.number(id.as_str(), field, raw.as_deref());
        let declared_taxes = TaxSplit {
            cgst: num(NumericField::Cgst, &row.cgst),
            sgst: num(NumericField::Sgst, &row.sgst),
            igst: num(NumericField::Igst, &row.igst),
        };
        let declared_taxable = num(NumericField::TaxableAmount, &row.taxable_amount);
        let declared_grand_total = num(NumericField::TotalAmount, &row.total_amount);

        Ok(InvoiceHeader {
            id,
            issue_date,
            customer_name: row.customer_name,
            customer_gstin: row.customer_gstin,
            supplier_name: self.supplier.name.clone(),
            supplier_gstin: self.supplier.gstin.clone(),
            place_of_supply: row.place_of_supply,
            declared_taxable,
            declared_taxes,
            declared_grand_total,
        })
    }

    fn line_item(&self, invoice_id: &str, row: LineItemRow) -> NewLineItem {
        NewLineItem {
            description: row.description.unwrap_or_default(),
            hsn: row.hsn,
            quantity: self.number(invoice_id, NumericField::Quantity, row.quantity.as_deref()),
            unit_price: self.number(invoice_id, NumericField::UnitPrice, row.unit_price.as_deref()),
            gst_rate: self.number(invoice_id, NumericField::GstRate, row.gst_rate.as_deref()),
            gst_amount: self.number(invoice_id, NumericField::GstAmount, row.gst_amount.as_deref()),
        }
    }

    fn number(&self, invoice_id: &str, field: NumericField, raw: Option<&str>) -> Decimal {
        let coerced = self.policy.coerce(field, raw);
        if coerced.defaulted {
            debug!(
                invoice_id,
                field = %field,
                raw = ?raw,
                default = %coerced.value,
                "numeric field defaulted"
            );
        }
        coerced.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryInvoiceSource;
    use invoicedesk_invoicing::SupplyKind;
    use rust_decimal_macros::dec;

    fn supplier() -> SupplierProfile {
        SupplierProfile {
            gstin: Some("24AAACG1234F1Z5".to_string()),
            name: Some("Gujarat Freight Tools".to_string()),
        }
    }

    fn invoice(id: &str, date: &str, customer_gstin: &str) -> InvoiceRow {
        InvoiceRow {
            id: id.to_string(),
            invoice_date: Some(date.to_string()),
            customer_name: Some("M/S Shiv Engineering".to_string()),
            customer_gstin: Some(customer_gstin.to_string()),
            ..InvoiceRow::default()
        }
    }

    fn item(qty: Option<&str>, price: &str, rate: &str) -> LineItemRow {
        LineItemRow {
            description: Some("Socket set".to_string()),
            hsn: Some("8204".to_string()),
            quantity: qty.map(str::to_string),
            unit_price: Some(price.to_string()),
            gst_rate: Some(rate.to_string()),
            gst_amount: None,
        }
    }

    #[test]
    fn lenient_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 11, 5);
        for raw in ["2024-11-05", "05/11/2024", "05-11-2024", "05 Nov 2024", "05-Nov-2024", "05 November 2024", "2024-11-05 10:30:00"] {
            assert_eq!(parse_invoice_date(raw), expected, "layout {raw}");
        }
        assert_eq!(parse_invoice_date("soon"), None);
        assert_eq!(parse_invoice_date("  "), None);
    }

    #[tokio::test]
    async fn single_invoice_is_assembled_with_coercion() {
        let source = InMemoryInvoiceSource::new().with_invoice(
            invoice("INV-1", "05/11/2024", "27BBBCS9876K1Z2"),
            vec![
                item(Some("2"), "₹1,000.00", "18%"),
                item(None, "n/a", "5"),
            ],
        );
        let aggregator = DocumentAggregator::new(source, supplier());

        let agg = aggregator.aggregate_one(&InvoiceId::new("INV-1").unwrap()).await.unwrap();
        assert_eq!(agg.supply_kind(), SupplyKind::InterState);
        assert_eq!(agg.supplier_gstin(), Some("24AAACG1234F1Z5"));
        assert_eq!(agg.items().len(), 2);
        assert_eq!(agg.items()[0].line_total(), dec!(2000));
        assert_eq!(agg.items()[1].quantity(), Decimal::ONE);
        assert!(agg.items()[1].unit_price().is_zero());
        assert_eq!(agg.taxable_subtotal(), dec!(2000));
        assert_eq!(agg.taxes().igst, dec!(360));
        assert_eq!(agg.grand_total(), dec!(2360));
        assert!(agg.is_balanced());
    }

    #[tokio::test]
    async fn missing_single_invoice_is_not_found() {
        let aggregator = DocumentAggregator::new(InMemoryInvoiceSource::new(), supplier());
        let err = aggregator
            .aggregate_one(&InvoiceId::new("nope").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn empty_store_yields_empty_bulk() {
        let aggregator = DocumentAggregator::new(InMemoryInvoiceSource::new(), supplier());
        assert!(aggregator.aggregate_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_header_totals_are_forwarded() {
        let mut row = invoice("INV-2", "2024-04-02", "24BBBCS9876K1Z2");
        row.cgst = Some("9.00".to_string());
        row.sgst = Some("9.00".to_string());
        row.total_amount = Some("118.00".to_string());
        let source = InMemoryInvoiceSource::new().with_invoice(row, vec![item(Some("1"), "100", "18")]);

        let aggs = DocumentAggregator::new(source, supplier()).aggregate_all().await.unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].taxes().cgst, dec!(9.00));
        assert_eq!(aggs[0].grand_total(), dec!(118.00));
        assert!(aggs[0].is_balanced());
    }

    #[tokio::test]
    async fn oversized_line_amounts_are_a_schema_violation() {
        let source = InMemoryInvoiceSource::new()
            .with_invoice(invoice("INV-4", "2024-04-02", "24BBBCS9876K1Z2"), vec![item(Some("2"), "100", "18")])
            .with_invoice(
                invoice("INV-5", "2024-04-03", "24BBBCS9876K1Z2"),
                vec![item(Some("1000000000000000"), "1000000000000000", "18")],
            );
        let aggregator = DocumentAggregator::new(source, supplier());

        match aggregator.aggregate_all().await.unwrap_err() {
            RenderError::SchemaViolation(violation) => {
                assert_eq!(violation.invoice_id, "INV-5");
                assert_eq!(violation.field, "items");
            }
            other => panic!("Expected SchemaViolation, got {other:?}"),
        }
        assert!(aggregator.aggregate_one(&InvoiceId::new("INV-4").unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn overflowing_invoice_totals_are_a_schema_violation() {
        let mut row = invoice("INV-6", "2024-04-02", "24BBBCS9876K1Z2");
        row.taxable_amount = Some("79228162514264337593543950335".to_string());
        let source = InMemoryInvoiceSource::new().with_invoice(row, vec![item(Some("1"), "100", "18")]);

        let err = DocumentAggregator::new(source, supplier())
            .aggregate_one(&InvoiceId::new("INV-6").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "schema_violation");
        assert!(err.to_string().contains("total_amount"));
    }

    #[tokio::test]
    async fn custom_policy_default_is_applied() {
        let source = InMemoryInvoiceSource::new().with_invoice(
            invoice("INV-3", "2024-04-02", "24BBBCS9876K1Z2"),
            vec![item(Some("1"), "100", "")],
        );
        let aggregator = DocumentAggregator::new(source, supplier())
            .with_policy(CoercionPolicy::lenient().with_default(NumericField::GstRate, dec!(18)));
        assert_eq!(aggregator.policy().default_for(NumericField::GstRate), dec!(18));

        let agg = aggregator.aggregate_one(&InvoiceId::new("INV-3").unwrap()).await.unwrap();
        assert_eq!(agg.total_tax(), dec!(18));
    }
}
