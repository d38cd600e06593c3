//! Period summaries and GST filing hints over a set of aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregate::InvoiceAggregate;
use crate::schema::SchemaViolation;
use crate::tax::{SupplyKind, round2};

/// Period key used when an invoice has no issue date.
pub const UNKNOWN_PERIOD: &str = "unknown";

/// Allowed gap between Σ line totals and the recorded taxable value.
const TAXABLE_MISMATCH_TOLERANCE: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    /// `YYYY-MM` or `unknown`.
    pub period: String,
    pub invoice_count: usize,
    pub total_taxable_value: Decimal,
    pub total_igst: Decimal,
    pub total_cgst: Decimal,
    pub total_sgst: Decimal,
    pub total_tax: Decimal,
    pub total_invoice_value: Decimal,
}

impl PeriodSummary {
    fn empty(period: &str) -> Self {
        Self {
            period: period.to_string(),
            invoice_count: 0,
            total_taxable_value: Decimal::ZERO,
            total_igst: Decimal::ZERO,
            total_cgst: Decimal::ZERO,
            total_sgst: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total_invoice_value: Decimal::ZERO,
        }
    }

    /// Fold one aggregate into the totals. On overflow returns `None` and
    /// leaves the totals untouched.
    fn add(&mut self, agg: &InvoiceAggregate) -> Option<()> {
        let taxes = agg.taxes();
        let taxable = self.total_taxable_value.checked_add(agg.taxable_subtotal())?;
        let igst = self.total_igst.checked_add(taxes.igst)?;
        let cgst = self.total_cgst.checked_add(taxes.cgst)?;
        let sgst = self.total_sgst.checked_add(taxes.sgst)?;
        let tax = self.total_tax.checked_add(agg.total_tax())?;
        let invoice_value = self.total_invoice_value.checked_add(agg.grand_total())?;

        self.invoice_count += 1;
        self.total_taxable_value = taxable;
        self.total_igst = igst;
        self.total_cgst = cgst;
        self.total_sgst = sgst;
        self.total_tax = tax;
        self.total_invoice_value = invoice_value;
        Some(())
    }

    fn rounded(mut self) -> Self {
        self.total_taxable_value = round2(self.total_taxable_value);
        self.total_igst = round2(self.total_igst);
        self.total_cgst = round2(self.total_cgst);
        self.total_sgst = round2(self.total_sgst);
        self.total_tax = round2(self.total_tax);
        self.total_invoice_value = round2(self.total_invoice_value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingAnomaly {
    pub invoice_id: String,
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodFiling {
    pub summary: PeriodSummary,
    pub tax_to_pay: Decimal,
    pub recommendation: String,
    /// Taxable value per GST rate (`"18"`, `"5"`, … or `unknown`).
    pub rate_breakdown: BTreeMap<String, Decimal>,
    pub anomalies: Vec<FilingAnomaly>,
    pub summary_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingReport {
    /// Ordered by period key.
    pub periods: Vec<PeriodFiling>,
}

fn period_of(agg: &InvoiceAggregate) -> String {
    agg.issue_date()
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_else(|| UNKNOWN_PERIOD.to_string())
}

fn anomalies_of(agg: &InvoiceAggregate) -> Vec<FilingAnomaly> {
    let id = agg.id().to_string();
    let issue = |text: String| FilingAnomaly {
        invoice_id: id.clone(),
        issue: text,
    };

    let mut found = Vec::new();
    if agg.supplier_gstin().is_none() {
        found.push(issue("Missing supplier GSTIN".to_string()));
    }
    if agg.customer_gstin().is_none() {
        found.push(issue("Missing customer GSTIN".to_string()));
    }
    for item in agg.items().iter().filter(|i| i.hsn().is_none()) {
        found.push(issue(format!("Missing HSN for item '{}'", item.description())));
    }
    if !agg.items().is_empty() && !agg.taxable_subtotal().is_zero() {
        let lines = agg.lines_subtotal();
        let taxable = round2(agg.taxable_subtotal());
        if (lines - taxable).abs() > TAXABLE_MISMATCH_TOLERANCE {
            found.push(issue(format!(
                "Taxable mismatch: sum(items)={lines} vs taxable_total={taxable}"
            )));
        }
    }
    if !agg.taxes().is_consistent() {
        found.push(issue(
            "Both domestic (CGST/SGST) and interstate (IGST) tax recorded".to_string(),
        ));
    }
    if !agg.is_balanced() {
        found.push(issue(format!(
            "Grand total {} does not equal taxable {} plus tax {}",
            agg.grand_total(),
            agg.taxable_subtotal(),
            agg.total_tax()
        )));
    }
    if agg.supply_kind() == SupplyKind::Unknown {
        found.push(issue(
            "Inter/intra classification unknown (missing GSTIN or place of supply). Please review."
                .to_string(),
        ));
    }
    found
}

fn recommendation(summary: &PeriodSummary, pay_threshold: Decimal) -> String {
    if summary.total_tax > pay_threshold && !summary.total_tax.is_zero() {
        format!(
            "File return and pay ₹{:.2} for period {}.",
            summary.total_tax, summary.period
        )
    } else if summary.invoice_count > 0 || !summary.total_tax.is_zero() {
        "File return for this period.".to_string()
    } else {
        "No filing required (nil).".to_string()
    }
}

/// Group aggregates by issue month and derive per-period totals, rate
/// breakdown, anomalies and a filing recommendation.
///
/// An empty input yields a single nil `unknown` period. A period total that
/// overflows is reported against the invoice that pushed it over.
pub fn build_filing_report(
    aggregates: &[InvoiceAggregate],
    pay_threshold: Decimal,
) -> Result<FilingReport, SchemaViolation> {
    let mut summaries: BTreeMap<String, PeriodSummary> = BTreeMap::new();
    let mut rates: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
    let mut anomalies: BTreeMap<String, Vec<FilingAnomaly>> = BTreeMap::new();

    for agg in aggregates {
        let overflow = |field| SchemaViolation {
            invoice_id: agg.id().to_string(),
            field,
        };
        let period = period_of(agg);
        summaries
            .entry(period.clone())
            .or_insert_with(|| PeriodSummary::empty(&period))
            .add(agg)
            .ok_or_else(|| overflow("total_amount"))?;

        let breakdown = rates.entry(period.clone()).or_default();
        for item in agg.items() {
            let rate = if item.gst_rate().is_zero() {
                UNKNOWN_PERIOD.to_string()
            } else {
                item.gst_rate().normalize().to_string()
            };
            let value = breakdown.entry(rate).or_default();
            *value = value
                .checked_add(item.line_total())
                .ok_or_else(|| overflow("items"))?;
        }

        anomalies.entry(period).or_default().extend(anomalies_of(agg));
    }

    if summaries.is_empty() {
        summaries.insert(UNKNOWN_PERIOD.to_string(), PeriodSummary::empty(UNKNOWN_PERIOD));
    }

    let periods = summaries
        .into_values()
        .map(|summary| {
            let summary = summary.rounded();
            let rate_breakdown = rates
                .remove(&summary.period)
                .unwrap_or_default()
                .into_iter()
                .map(|(rate, value)| (rate, round2(value)))
                .collect();
            let summary_text = format!(
                "Period {}: {} invoices, taxable ₹{:.2}, tax ₹{:.2}.",
                summary.period, summary.invoice_count, summary.total_taxable_value, summary.total_tax
            );
            PeriodFiling {
                tax_to_pay: summary.total_tax,
                recommendation: recommendation(&summary, pay_threshold),
                rate_breakdown,
                anomalies: anomalies.remove(&summary.period).unwrap_or_default(),
                summary_text,
                summary,
            }
        })
        .collect();

    Ok(FilingReport { periods })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::InvoiceHeader;
    use crate::line_item::{LineItem, NewLineItem};
    use crate::tax::TaxSplit;
    use chrono::NaiveDate;
    use invoicedesk_core::InvoiceId;
    use rust_decimal_macros::dec;

    fn invoice(id: &str, date: Option<NaiveDate>, customer_gstin: Option<&str>, hsn: Option<&str>) -> InvoiceAggregate {
        let header = InvoiceHeader {
            id: InvoiceId::new(id).unwrap(),
            issue_date: date,
            customer_name: Some("Acme".to_string()),
            customer_gstin: customer_gstin.map(str::to_string),
            supplier_name: None,
            supplier_gstin: Some("24AAACG1234F1Z5".to_string()),
            place_of_supply: None,
            declared_taxable: Decimal::ZERO,
            declared_taxes: TaxSplit::zero(),
            declared_grand_total: Decimal::ZERO,
        };
        let kind = header.supply_kind();
        let item = LineItem::new(
            NewLineItem {
                description: "Spanner set".to_string(),
                hsn: hsn.map(str::to_string),
                quantity: dec!(1),
                unit_price: dec!(1000),
                gst_rate: dec!(18),
                gst_amount: Decimal::ZERO,
            },
            kind,
        )
        .unwrap();
        InvoiceAggregate::assemble(header, vec![item]).unwrap()
    }

    #[test]
    fn groups_by_month() {
        let april = NaiveDate::from_ymd_opt(2024, 4, 10);
        let may = NaiveDate::from_ymd_opt(2024, 5, 1);
        let report = build_filing_report(
            &[
                invoice("A", april, Some("24BBB"), Some("8204")),
                invoice("B", april, Some("27BBB"), Some("8204")),
                invoice("C", may, Some("24BBB"), Some("8204")),
            ],
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(report.periods.len(), 2);
        let apr = &report.periods[0];
        assert_eq!(apr.summary.period, "2024-04");
        assert_eq!(apr.summary.invoice_count, 2);
        assert_eq!(apr.summary.total_taxable_value, dec!(2000));
        assert_eq!(apr.summary.total_igst, dec!(180));
        assert_eq!(apr.summary.total_cgst, dec!(90));
        assert_eq!(apr.summary.total_tax, dec!(360));
        assert_eq!(apr.summary.total_invoice_value, dec!(2360));
        assert_eq!(apr.rate_breakdown.get("18"), Some(&dec!(2000)));
        assert_eq!(apr.recommendation, "File return and pay ₹360.00 for period 2024-04.");
        assert!(apr.anomalies.is_empty());
    }

    #[test]
    fn flags_missing_fields() {
        let report = build_filing_report(&[invoice("X", None, None, None)], Decimal::ZERO).unwrap();
        let period = &report.periods[0];
        assert_eq!(period.summary.period, UNKNOWN_PERIOD);

        let issues: Vec<&str> = period.anomalies.iter().map(|a| a.issue.as_str()).collect();
        assert!(issues.contains(&"Missing customer GSTIN"));
        assert!(issues.contains(&"Missing HSN for item 'Spanner set'"));
        assert!(issues.iter().any(|i| i.starts_with("Inter/intra classification unknown")));
    }

    #[test]
    fn flags_taxable_mismatch() {
        let agg_header = InvoiceHeader {
            id: InvoiceId::new("M").unwrap(),
            issue_date: None,
            customer_name: Some("Acme".to_string()),
            customer_gstin: Some("24BBB".to_string()),
            supplier_name: None,
            supplier_gstin: Some("24AAA".to_string()),
            place_of_supply: None,
            declared_taxable: dec!(900),
            declared_taxes: TaxSplit::zero(),
            declared_grand_total: Decimal::ZERO,
        };
        let kind = agg_header.supply_kind();
        let item = LineItem::new(
            NewLineItem {
                description: "Vice".to_string(),
                hsn: Some("8205".to_string()),
                quantity: dec!(1),
                unit_price: dec!(1000),
                gst_rate: dec!(18),
                gst_amount: Decimal::ZERO,
            },
            kind,
        )
        .unwrap();
        let agg = InvoiceAggregate::assemble(agg_header, vec![item]).unwrap();
        let report = build_filing_report(&[agg], Decimal::ZERO).unwrap();
        assert!(report.periods[0]
            .anomalies
            .iter()
            .any(|a| a.issue.starts_with("Taxable mismatch")));
    }

    #[test]
    fn threshold_changes_recommendation() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 10);
        let report =
            build_filing_report(&[invoice("A", date, Some("24BBB"), Some("8204"))], dec!(1000)).unwrap();
        assert_eq!(report.periods[0].recommendation, "File return for this period.");
    }

    #[test]
    fn recorded_tax_without_invoices_still_files() {
        let mut summary = PeriodSummary::empty("2024-06");
        summary.total_tax = dec!(12);
        assert_eq!(recommendation(&summary, dec!(100)), "File return for this period.");
        assert_eq!(
            recommendation(&PeriodSummary::empty("2024-06"), dec!(100)),
            "No filing required (nil)."
        );
    }

    #[test]
    fn overflowing_period_totals_name_the_invoice() {
        let huge = |id: &str| {
            let header = InvoiceHeader {
                id: InvoiceId::new(id).unwrap(),
                issue_date: NaiveDate::from_ymd_opt(2024, 4, 10),
                customer_name: Some("Acme".to_string()),
                customer_gstin: Some("24BBB".to_string()),
                supplier_name: None,
                supplier_gstin: Some("24AAA".to_string()),
                place_of_supply: None,
                declared_taxable: dec!(50000000000000000000000000000),
                declared_taxes: TaxSplit::zero(),
                declared_grand_total: Decimal::ZERO,
            };
            InvoiceAggregate::assemble(header, vec![]).unwrap()
        };

        let err = build_filing_report(&[huge("A"), huge("B")], Decimal::ZERO).unwrap_err();
        assert_eq!(err.invoice_id, "B");
        assert_eq!(err.field, "total_amount");
    }

    #[test]
    fn empty_input_is_a_nil_period() {
        let report = build_filing_report(&[], Decimal::ZERO).unwrap();
        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.periods[0].recommendation, "No filing required (nil).");
        assert_eq!(report.periods[0].summary_text, "Period unknown: 0 invoices, taxable ₹0.00, tax ₹0.00.");
    }
}
