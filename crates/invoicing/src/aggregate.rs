use chrono::NaiveDate;
use rust_decimal::Decimal;

use invoicedesk_core::{DomainError, DomainResult, InvoiceId};

use crate::line_item::LineItem;
use crate::tax::{SupplyKind, TaxSplit, classify_supply, round2};

/// Tolerance for the grand-total invariant.
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Invoice header fields as recorded upstream.
///
/// Declared amounts are forwarded when non-zero; zero means "not recorded"
/// and the aggregate computes the value from its lines instead.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceHeader {
    pub id: InvoiceId,
    pub issue_date: Option<NaiveDate>,
    pub customer_name: Option<String>,
    pub customer_gstin: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_gstin: Option<String>,
    pub place_of_supply: Option<String>,
    pub declared_taxable: Decimal,
    pub declared_taxes: TaxSplit,
    pub declared_grand_total: Decimal,
}

impl InvoiceHeader {
    pub fn supply_kind(&self) -> SupplyKind {
        classify_supply(
            self.supplier_gstin.as_deref(),
            self.customer_gstin.as_deref(),
            self.place_of_supply.as_deref(),
        )
    }
}

/// An invoice plus its computed totals and joined customer fields.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceAggregate {
    id: InvoiceId,
    issue_date: Option<NaiveDate>,
    customer_name: Option<String>,
    customer_gstin: Option<String>,
    supplier_name: Option<String>,
    supplier_gstin: Option<String>,
    place_of_supply: Option<String>,
    supply_kind: SupplyKind,
    items: Vec<LineItem>,
    lines_subtotal: Decimal,
    taxable_subtotal: Decimal,
    taxes: TaxSplit,
    total_tax: Decimal,
    grand_total: Decimal,
}

fn overflow() -> DomainError {
    DomainError::invariant("invoice total overflow")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl InvoiceAggregate {
    /// Assemble an aggregate from its header and ordered lines.
    ///
    /// Fails with an invariant violation when a sum does not fit a `Decimal`.
    pub fn assemble(header: InvoiceHeader, items: Vec<LineItem>) -> DomainResult<Self> {
        let supply_kind = header.supply_kind();

        let lines_subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()))
            .map(round2)
            .ok_or_else(overflow)?;
        let taxable_subtotal = if header.declared_taxable.is_zero() {
            lines_subtotal
        } else {
            header.declared_taxable
        };

        let taxes = if header.declared_taxes.is_zero() {
            items
                .iter()
                .try_fold(TaxSplit::zero(), |acc, item| acc.checked_add(item.split()))
                .ok_or_else(overflow)?
        } else {
            header.declared_taxes
        };
        let total_tax = taxes.checked_total().ok_or_else(overflow)?;

        let grand_total = if header.declared_grand_total.is_zero() {
            taxable_subtotal.checked_add(total_tax).ok_or_else(overflow)?
        } else {
            header.declared_grand_total
        };

        Ok(Self {
            id: header.id,
            issue_date: header.issue_date,
            customer_name: non_blank(header.customer_name),
            customer_gstin: non_blank(header.customer_gstin),
            supplier_name: non_blank(header.supplier_name),
            supplier_gstin: non_blank(header.supplier_gstin),
            place_of_supply: non_blank(header.place_of_supply),
            supply_kind,
            items,
            lines_subtotal,
            taxable_subtotal,
            taxes,
            total_tax,
            grand_total,
        })
    }

    pub fn id(&self) -> &InvoiceId {
        &self.id
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn customer_gstin(&self) -> Option<&str> {
        self.customer_gstin.as_deref()
    }

    pub fn supplier_name(&self) -> Option<&str> {
        self.supplier_name.as_deref()
    }

    pub fn supplier_gstin(&self) -> Option<&str> {
        self.supplier_gstin.as_deref()
    }

    pub fn place_of_supply(&self) -> Option<&str> {
        self.place_of_supply.as_deref()
    }

    pub fn supply_kind(&self) -> SupplyKind {
        self.supply_kind
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn taxable_subtotal(&self) -> Decimal {
        self.taxable_subtotal
    }

    /// Σ line totals, independent of any declared taxable value.
    pub fn lines_subtotal(&self) -> Decimal {
        self.lines_subtotal
    }

    pub fn taxes(&self) -> TaxSplit {
        self.taxes
    }

    pub fn total_tax(&self) -> Decimal {
        self.total_tax
    }

    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }

    /// Invariant: `grand_total == taxable_subtotal + Σ taxes` within 0.01.
    ///
    /// Only upstream data defects (a declared total that disagrees with its
    /// parts) can make this false.
    pub fn is_balanced(&self) -> bool {
        self.taxable_subtotal
            .checked_add(self.total_tax)
            .and_then(|parts| self.grand_total.checked_sub(parts))
            .is_some_and(|gap| gap.abs() <= TOTAL_TOLERANCE)
    }
}
