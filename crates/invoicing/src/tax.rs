//! GST split rules: intra-state supplies carry CGST + SGST, inter-state
//! supplies carry IGST.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use invoicedesk_core::ValueObject;

/// Round half away from zero to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether a supply crosses a state boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyKind {
    IntraState,
    InterState,
    /// Neither GSTIN nor place of supply gave a usable state code.
    Unknown,
}

impl SupplyKind {
    pub fn label(&self) -> &'static str {
        match self {
            SupplyKind::IntraState => "Intra-State",
            SupplyKind::InterState => "Inter-State",
            SupplyKind::Unknown => "Unknown",
        }
    }
}

/// Per-component tax amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaxSplit {
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

impl ValueObject for TaxSplit {}

impl TaxSplit {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Split a tax amount according to the supply kind.
    ///
    /// SGST takes the remainder of the halving so `cgst + sgst == amount`.
    /// Unknown supplies are split as intra-state.
    pub fn for_supply(kind: SupplyKind, amount: Decimal) -> Self {
        match kind {
            SupplyKind::InterState => Self {
                cgst: Decimal::ZERO,
                sgst: Decimal::ZERO,
                igst: amount,
            },
            SupplyKind::IntraState | SupplyKind::Unknown => {
                let cgst = round2(amount / Decimal::TWO);
                Self {
                    cgst,
                    sgst: amount - cgst,
                    igst: Decimal::ZERO,
                }
            }
        }
    }

    /// Sum of the three components; `None` when it overflows.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.cgst.checked_add(self.sgst)?.checked_add(self.igst)
    }

    /// Component-wise sum; `None` on overflow.
    pub fn checked_add(self, rhs: TaxSplit) -> Option<TaxSplit> {
        Some(TaxSplit {
            cgst: self.cgst.checked_add(rhs.cgst)?,
            sgst: self.sgst.checked_add(rhs.sgst)?,
            igst: self.igst.checked_add(rhs.igst)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.cgst.is_zero() && self.sgst.is_zero() && self.igst.is_zero()
    }

    /// At most one of {domestic pair, interstate} is non-zero.
    pub fn is_consistent(&self) -> bool {
        let domestic = !self.cgst.is_zero() || !self.sgst.is_zero();
        !(domestic && !self.igst.is_zero())
    }
}

/// Two-digit state code of a GSTIN: its leading digits, or the first digit
/// pair anywhere in the string.
pub fn state_code_from_gstin(gstin: &str) -> Option<String> {
    let gstin = gstin.trim();
    let bytes = gstin.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() {
        return Some(gstin[..2].to_string());
    }
    bytes
        .windows(2)
        .find(|w| w[0].is_ascii_digit() && w[1].is_ascii_digit())
        .map(|w| String::from_utf8_lossy(w).into_owned())
}

/// State code written in a place-of-supply string, e.g. `"Gujarat (24)"` or
/// a bare `"7"`; padded to two digits.
fn state_code_from_place(place: &str) -> Option<String> {
    let place = place.trim();
    let code = match (place.rfind('('), place.rfind(')')) {
        (Some(open), Some(close)) if close > open => place[open + 1..close].trim(),
        _ => place,
    };
    if (1..=2).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{code:0>2}"))
    } else {
        None
    }
}

/// Classify a supply from the supplier GSTIN against the customer GSTIN,
/// falling back to the place of supply.
pub fn classify_supply(
    supplier_gstin: Option<&str>,
    customer_gstin: Option<&str>,
    place_of_supply: Option<&str>,
) -> SupplyKind {
    let Some(supplier) = supplier_gstin.and_then(state_code_from_gstin) else {
        return SupplyKind::Unknown;
    };
    let other = customer_gstin
        .and_then(state_code_from_gstin)
        .or_else(|| place_of_supply.and_then(state_code_from_place));
    match other {
        Some(code) if code == supplier => SupplyKind::IntraState,
        Some(_) => SupplyKind::InterState,
        None => SupplyKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interstate_goes_to_igst() {
        let split = TaxSplit::for_supply(SupplyKind::InterState, dec!(36));
        assert_eq!(split.igst, dec!(36));
        assert!(split.cgst.is_zero() && split.sgst.is_zero());
    }

    #[test]
    fn intrastate_halves_and_keeps_the_remainder() {
        let split = TaxSplit::for_supply(SupplyKind::IntraState, dec!(10.01));
        assert_eq!(split.cgst, dec!(5.01));
        assert_eq!(split.sgst, dec!(5.00));
        assert_eq!(split.checked_total(), Some(dec!(10.01)));
        assert!(split.igst.is_zero());
    }

    #[test]
    fn mixed_split_is_inconsistent() {
        let split = TaxSplit {
            cgst: dec!(1),
            sgst: dec!(1),
            igst: dec!(2),
        };
        assert!(!split.is_consistent());
        assert!(TaxSplit::for_supply(SupplyKind::IntraState, dec!(2)).is_consistent());
    }

    #[test]
    fn checked_sums_report_overflow() {
        let huge = TaxSplit {
            cgst: Decimal::MAX,
            sgst: dec!(1),
            igst: Decimal::ZERO,
        };
        assert_eq!(huge.checked_total(), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(
            TaxSplit::for_supply(SupplyKind::IntraState, dec!(3)).checked_add(TaxSplit::zero()),
            Some(TaxSplit::for_supply(SupplyKind::IntraState, dec!(3)))
        );
        assert!(!huge.is_zero());
    }

    #[test]
    fn gstin_state_code() {
        assert_eq!(state_code_from_gstin("24AAACG1234F1Z5").as_deref(), Some("24"));
        assert_eq!(state_code_from_gstin("GST 27ABC").as_deref(), Some("27"));
        assert_eq!(state_code_from_gstin("Unregistered"), None);
    }

    #[test]
    fn classification_uses_customer_gstin_first() {
        assert_eq!(
            classify_supply(Some("24AAACG1234F1Z5"), Some("24BBBCS9876K1Z2"), None),
            SupplyKind::IntraState
        );
        assert_eq!(
            classify_supply(Some("24AAACG1234F1Z5"), Some("27BBBCS9876K1Z2"), None),
            SupplyKind::InterState
        );
    }

    #[test]
    fn classification_falls_back_to_place_of_supply() {
        assert_eq!(
            classify_supply(Some("07AAACG1234F1Z5"), None, Some("Delhi (7)")),
            SupplyKind::IntraState
        );
        assert_eq!(
            classify_supply(Some("24AAACG1234F1Z5"), Some("Unregistered"), Some("Maharashtra (27)")),
            SupplyKind::InterState
        );
    }

    #[test]
    fn classification_without_codes_is_unknown() {
        assert_eq!(classify_supply(None, Some("24X"), None), SupplyKind::Unknown);
        assert_eq!(
            classify_supply(Some("24AAACG1234F1Z5"), None, Some("Gujarat")),
            SupplyKind::Unknown
        );
    }
}
