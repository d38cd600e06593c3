//! Invoicing document model.
//!
//! This crate contains the invoice aggregate, its tax rules and the mapping into
//! the renderer document schemas, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage, no subprocesses).

pub mod aggregate;
pub mod coercion;
pub mod line_item;
pub mod report;
pub mod schema;
pub mod tax;

pub use aggregate::{InvoiceAggregate, InvoiceHeader};
pub use coercion::{Coerced, CoercionPolicy, NumericField, parse_amount};
pub use line_item::{LineItem, NewLineItem};
pub use report::{FilingAnomaly, FilingReport, PeriodFiling, PeriodSummary, build_filing_report};
pub use schema::{
    BulkItem, BulkPayload, BulkRecord, DocumentPayload, SchemaViolation, SingleDocument,
    SingleItem, normalize_bulk, normalize_single,
};
pub use tax::{SupplyKind, TaxSplit, classify_supply, round2, state_code_from_gstin};
