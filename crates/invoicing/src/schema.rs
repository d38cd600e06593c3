//! Renderer document schemas.
//!
//! Field names here are the contract with the external renderers and must
//! match byte-for-byte; do not rename them for style.
//!
//! Normalization forwards or rejects, it never invents: a missing required
//! field is a [`SchemaViolation`], optional fields travel as `null`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::aggregate::InvoiceAggregate;
use crate::line_item::LineItem;

/// A required field has no value and no defined default, or an amount does
/// not fit a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invoice {invoice_id}: field `{field}` is missing or invalid")]
pub struct SchemaViolation {
    pub invoice_id: String,
    pub field: &'static str,
}

/// Simplified line for the spreadsheet report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItem {
    pub name: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub gst_rate: Decimal,
}

/// One spreadsheet row per invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkRecord {
    pub invoice_id: String,
    /// ISO `YYYY-MM-DD`.
    pub invoice_date: Option<String>,
    pub customer_name: String,
    pub customer_gstin: Option<String>,
    pub place_of_supply: Option<String>,
    pub taxable_total: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
    pub grand_total: Decimal,
    pub items: Vec<BulkItem>,
}

pub type BulkPayload = Vec<BulkRecord>;

/// Full line for the PDF document, with its tax split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleItem {
    pub hsn: Option<String>,
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub gst_rate: Decimal,
    pub gst_amount: Decimal,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
}

/// The PDF document model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleDocument {
    pub invoice_id: String,
    /// `DD/MM/YYYY`.
    pub invoice_date: String,
    pub place_of_supply: Option<String>,
    pub customer_gstin: Option<String>,
    pub supplier_gstin: String,
    pub supplier_name: Option<String>,
    pub customer_name: String,
    pub items: Vec<SingleItem>,
    pub taxable_total: Decimal,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub total_tax: Decimal,
    pub grand_total: Decimal,
    /// Free-form display fields (label → text).
    pub extracted: BTreeMap<String, String>,
}

impl SingleDocument {
    pub fn with_extracted(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extracted.insert(key.into(), value.into());
        self
    }
}

/// Normalized payload for one render job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentPayload {
    Bulk(BulkPayload),
    Single(SingleDocument),
}

impl DocumentPayload {
    /// Number of invoices carried.
    pub fn invoice_count(&self) -> usize {
        match self {
            DocumentPayload::Bulk(records) => records.len(),
            DocumentPayload::Single(_) => 1,
        }
    }
}

fn required<'a>(
    agg: &'a InvoiceAggregate,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, SchemaViolation> {
    value.ok_or_else(|| SchemaViolation {
        invoice_id: agg.id().to_string(),
        field,
    })
}

fn bulk_item(item: &LineItem) -> BulkItem {
    BulkItem {
        name: item.description().to_string(),
        qty: item.quantity(),
        unit_price: item.unit_price(),
        line_total: item.line_total(),
        gst_rate: item.gst_rate(),
    }
}

fn single_item(item: &LineItem) -> SingleItem {
    let split = item.split();
    SingleItem {
        hsn: item.hsn().map(str::to_string),
        description: item.description().to_string(),
        qty: item.quantity(),
        unit_price: item.unit_price(),
        line_total: item.line_total(),
        gst_rate: item.gst_rate(),
        gst_amount: item.tax_amount(),
        igst: split.igst,
        cgst: split.cgst,
        sgst: split.sgst,
    }
}

/// Map aggregates to spreadsheet rows, preserving order.
pub fn normalize_bulk(aggregates: &[InvoiceAggregate]) -> Result<BulkPayload, SchemaViolation> {
    aggregates
        .iter()
        .map(|agg| {
            let customer_name = required(agg, "customer_name", agg.customer_name())?;
            let taxes = agg.taxes();
            Ok(BulkRecord {
                invoice_id: agg.id().to_string(),
                invoice_date: agg.issue_date().map(|d| d.format("%Y-%m-%d").to_string()),
                customer_name: customer_name.to_string(),
                customer_gstin: agg.customer_gstin().map(str::to_string),
                place_of_supply: agg.place_of_supply().map(str::to_string),
                taxable_total: agg.taxable_subtotal(),
                cgst: taxes.cgst,
                sgst: taxes.sgst,
                igst: taxes.igst,
                total_tax: agg.total_tax(),
                grand_total: agg.grand_total(),
                items: agg.items().iter().map(bulk_item).collect(),
            })
        })
        .collect()
}

/// Map one aggregate to the PDF document model.
pub fn normalize_single(agg: &InvoiceAggregate) -> Result<SingleDocument, SchemaViolation> {
    let customer_name = required(agg, "customer_name", agg.customer_name())?;
    let supplier_gstin = required(agg, "supplier_gstin", agg.supplier_gstin())?;
    let issue_date = agg.issue_date().ok_or_else(|| SchemaViolation {
        invoice_id: agg.id().to_string(),
        field: "invoice_date",
    })?;
    let taxes = agg.taxes();

    let mut extracted = BTreeMap::new();
    extracted.insert("Customer Name".to_string(), customer_name.to_string());
    extracted.insert("Supply Type".to_string(), agg.supply_kind().label().to_string());

    Ok(SingleDocument {
        invoice_id: agg.id().to_string(),
        invoice_date: issue_date.format("%d/%m/%Y").to_string(),
        place_of_supply: agg.place_of_supply().map(str::to_string),
        customer_gstin: agg.customer_gstin().map(str::to_string),
        supplier_gstin: supplier_gstin.to_string(),
        supplier_name: agg.supplier_name().map(str::to_string),
        customer_name: customer_name.to_string(),
        items: agg.items().iter().map(single_item).collect(),
        taxable_total: agg.taxable_subtotal(),
        igst: taxes.igst,
        cgst: taxes.cgst,
        sgst: taxes.sgst,
        total_tax: agg.total_tax(),
        grand_total: agg.grand_total(),
        extracted,
    })
}
