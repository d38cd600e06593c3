use rust_decimal::Decimal;

use invoicedesk_core::{DomainError, DomainResult, ValueObject};

use crate::tax::{SupplyKind, TaxSplit, round2};

/// Unvalidated line-item input, as assembled from a source row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub description: String,
    /// HSN/SAC tax classification code.
    pub hsn: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percentage, e.g. `18` for 18 %.
    pub gst_rate: Decimal,
    /// Recorded tax for the line; zero means "not recorded" and is derived
    /// from the rate.
    pub gst_amount: Decimal,
}

/// One invoice line.
///
/// The line total is always `quantity × unit_price`, computed once at
/// construction where it is checked for overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    description: String,
    hsn: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    line_total: Decimal,
    gst_rate: Decimal,
    tax_amount: Decimal,
    split: TaxSplit,
}

impl ValueObject for LineItem {}

impl LineItem {
    pub fn new(input: NewLineItem, supply: SupplyKind) -> DomainResult<Self> {
        if input.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("line item quantity must be positive"));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(DomainError::validation(
                "line item unit_price must not be negative",
            ));
        }
        if input.gst_rate < Decimal::ZERO || input.gst_amount < Decimal::ZERO {
            return Err(DomainError::validation("line item tax must not be negative"));
        }

        let line_total = input
            .quantity
            .checked_mul(input.unit_price)
            .ok_or_else(|| DomainError::invariant("line item amount overflow"))?;

        let tax_amount = if input.gst_amount.is_zero() && !input.gst_rate.is_zero() {
            let tax = line_total
                .checked_mul(input.gst_rate)
                .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
                .ok_or_else(|| DomainError::invariant("line item tax overflow"))?;
            round2(tax)
        } else {
            input.gst_amount
        };

        let hsn = input
            .hsn
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        Ok(Self {
            description: input.description.trim().to_string(),
            hsn,
            quantity: input.quantity,
            unit_price: input.unit_price,
            line_total,
            gst_rate: input.gst_rate,
            tax_amount,
            split: TaxSplit::for_supply(supply, tax_amount),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn hsn(&self) -> Option<&str> {
        self.hsn.as_deref()
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }

    pub fn gst_rate(&self) -> Decimal {
        self.gst_rate
    }

    pub fn tax_amount(&self) -> Decimal {
        self.tax_amount
    }

    pub fn split(&self) -> TaxSplit {
        self.split
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn input(quantity: Decimal, unit_price: Decimal) -> NewLineItem {
        NewLineItem {
            description: " Bench vice 6\" ".to_string(),
            hsn: Some("8205".to_string()),
            quantity,
            unit_price,
            gst_rate: dec!(18),
            gst_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn tax_is_derived_from_rate_when_not_recorded() {
        let item = LineItem::new(input(dec!(2), dec!(100.00)), SupplyKind::InterState).unwrap();
        assert_eq!(item.line_total(), dec!(200.00));
        assert_eq!(item.tax_amount(), dec!(36.00));
        assert_eq!(item.split().igst, dec!(36.00));
        assert_eq!(item.description(), "Bench vice 6\"");
    }

    #[test]
    fn recorded_tax_is_kept() {
        let mut raw = input(dec!(1), dec!(100));
        raw.gst_amount = dec!(17.5);
        let item = LineItem::new(raw, SupplyKind::IntraState).unwrap();
        assert_eq!(item.tax_amount(), dec!(17.5));
        assert_eq!(item.split().cgst, dec!(8.75));
        assert_eq!(item.split().sgst, dec!(8.75));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = LineItem::new(input(Decimal::ZERO, dec!(1)), SupplyKind::IntraState).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("quantity must be positive") => {}
            _ => panic!("Expected Validation for zero quantity"),
        }
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(LineItem::new(input(dec!(1), dec!(-1)), SupplyKind::IntraState).is_err());
    }

    #[test]
    fn oversized_amounts_are_rejected_without_panicking() {
        let huge = dec!(1000000000000000);
        let err = LineItem::new(input(huge, huge), SupplyKind::IntraState).unwrap_err();
        assert_eq!(err, DomainError::invariant("line item amount overflow"));

        // The product fits but applying the rate does not.
        let near_max = input(Decimal::ONE, Decimal::MAX);
        let err = LineItem::new(near_max, SupplyKind::IntraState).unwrap_err();
        assert_eq!(err, DomainError::invariant("line item tax overflow"));
    }

    #[test]
    fn blank_hsn_is_absent() {
        let mut raw = input(dec!(1), dec!(1));
        raw.hsn = Some("  ".to_string());
        let item = LineItem::new(raw, SupplyKind::IntraState).unwrap();
        assert_eq!(item.hsn(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the line total is exactly quantity × unit price.
        #[test]
        fn line_total_is_exact_product(
            qty_milli in 1i64..10_000_000i64,
            price_paise in 0i64..100_000_000i64,
        ) {
            let quantity = Decimal::new(qty_milli, 3);
            let unit_price = Decimal::new(price_paise, 2);
            let item = LineItem::new(input(quantity, unit_price), SupplyKind::InterState).unwrap();
            prop_assert_eq!(item.line_total(), quantity * unit_price);
            prop_assert_eq!(item.split().checked_total(), Some(item.tax_amount()));
        }
    }
}
