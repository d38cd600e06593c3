//! Lenient numeric coercion for source rows.
//!
//! The relational store hands numeric columns over as optional text (money
//! strings such as `"₹ 1,200.50"`, percentages such as `"18%"`, or `NULL`).
//! Instead of failing a whole document on one bad cell, every numeric field is
//! passed through a declared [`CoercionPolicy`]: parseable text is used as-is,
//! anything absent, unparseable or out of range takes the field's declared
//! default. Callers get the default substitution reported back through
//! [`Coerced::defaulted`] so it is never silent.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Numeric fields read from invoice and line-item rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Quantity,
    UnitPrice,
    GstRate,
    GstAmount,
    TaxableAmount,
    Cgst,
    Sgst,
    Igst,
    TotalAmount,
}

impl NumericField {
    pub const ALL: [NumericField; 9] = [
        NumericField::Quantity,
        NumericField::UnitPrice,
        NumericField::GstRate,
        NumericField::GstAmount,
        NumericField::TaxableAmount,
        NumericField::Cgst,
        NumericField::Sgst,
        NumericField::Igst,
        NumericField::TotalAmount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::Quantity => "quantity",
            NumericField::UnitPrice => "unit_price",
            NumericField::GstRate => "gst_rate",
            NumericField::GstAmount => "gst_amount",
            NumericField::TaxableAmount => "taxable_amount",
            NumericField::Cgst => "cgst",
            NumericField::Sgst => "sgst",
            NumericField::Igst => "igst",
            NumericField::TotalAmount => "total_amount",
        }
    }

    /// Quantity must be strictly positive; every other field non-negative.
    fn accepts(&self, value: Decimal) -> bool {
        match self {
            NumericField::Quantity => value > Decimal::ZERO,
            _ => value >= Decimal::ZERO,
        }
    }
}

impl core::fmt::Display for NumericField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of coercing one raw cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced {
    pub value: Decimal,
    /// `true` when the policy default replaced the raw value.
    pub defaulted: bool,
}

/// Declared field → default mapping applied to absent or unusable numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionPolicy {
    defaults: HashMap<NumericField, Decimal>,
}

impl CoercionPolicy {
    /// The policy used by the document aggregator.
    ///
    /// All amounts and rates default to zero. Quantity defaults to one: a
    /// line with no recorded quantity is a single unit, and zero would break
    /// the positive-quantity invariant of [`crate::LineItem`].
    pub fn lenient() -> Self {
        let mut defaults: HashMap<NumericField, Decimal> = NumericField::ALL
            .iter()
            .map(|f| (*f, Decimal::ZERO))
            .collect();
        defaults.insert(NumericField::Quantity, Decimal::ONE);
        Self { defaults }
    }

    pub fn with_default(mut self, field: NumericField, value: Decimal) -> Self {
        self.defaults.insert(field, value);
        self
    }

    pub fn default_for(&self, field: NumericField) -> Decimal {
        self.defaults.get(&field).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn coerce(&self, field: NumericField, raw: Option<&str>) -> Coerced {
        match raw.and_then(parse_amount) {
            Some(value) if field.accepts(value) => Coerced {
                value,
                defaulted: false,
            },
            _ => Coerced {
                value: self.default_for(field),
                defaulted: true,
            },
        }
    }
}

impl Default for CoercionPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

/// Parse a money/number string, ignoring currency symbols, separators, `%`
/// and whitespace. Returns `None` when nothing numeric is left.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "." {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lenient_policy_declares_every_field() {
        let policy = CoercionPolicy::lenient();
        for field in NumericField::ALL {
            let expected = if field == NumericField::Quantity {
                Decimal::ONE
            } else {
                Decimal::ZERO
            };
            assert_eq!(policy.default_for(field), expected, "{field}");
        }
    }

    #[test]
    fn null_takes_default() {
        let c = CoercionPolicy::lenient().coerce(NumericField::Cgst, None);
        assert_eq!(c, Coerced { value: Decimal::ZERO, defaulted: true });
    }

    #[test]
    fn money_text_is_parsed() {
        let c = CoercionPolicy::lenient().coerce(NumericField::UnitPrice, Some("₹ 1,200.50"));
        assert_eq!(c, Coerced { value: dec!(1200.50), defaulted: false });
    }

    #[test]
    fn percent_text_is_parsed() {
        let c = CoercionPolicy::lenient().coerce(NumericField::GstRate, Some("18%"));
        assert_eq!(c.value, dec!(18));
        assert!(!c.defaulted);
    }

    #[test]
    fn garbage_takes_default() {
        let policy = CoercionPolicy::lenient();
        assert!(policy.coerce(NumericField::Igst, Some("n/a")).defaulted);
        assert!(policy.coerce(NumericField::Igst, Some("1.2.3")).defaulted);
    }

    #[test]
    fn zero_quantity_takes_default() {
        let c = CoercionPolicy::lenient().coerce(NumericField::Quantity, Some("0"));
        assert_eq!(c, Coerced { value: Decimal::ONE, defaulted: true });
    }

    #[test]
    fn negative_price_takes_default() {
        let c = CoercionPolicy::lenient().coerce(NumericField::UnitPrice, Some("-5"));
        assert_eq!(c, Coerced { value: Decimal::ZERO, defaulted: true });
    }

    #[test]
    fn overridden_default_is_used() {
        let policy = CoercionPolicy::lenient().with_default(NumericField::GstRate, dec!(18));
        assert_eq!(policy.coerce(NumericField::GstRate, None).value, dec!(18));
    }
}
