//! Value object trait: equality by value, not identity.
//!
//! Line items and tax splits have no identity of their own; two line items with
//! the same description, code, quantity and price are the same line.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one with the new values.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct TaxSplit { cgst: Decimal, sgst: Decimal, igst: Decimal }
///
/// impl ValueObject for TaxSplit {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
