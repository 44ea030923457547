//! Invoice-level aggregation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gstbook_core::ValidationError;

use crate::line::{LineFigures, LineItemInput, LineItemResult};
use crate::money::{max_currency_amount, round_currency};
use crate::supply::SupplyType;

/// Invoice-level aggregates at currency precision.
///
/// Invariant: `total == subtotal + tax_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    fn from_sums(amount_sum: Decimal, tax_sum: Decimal) -> Self {
        let subtotal = round_currency(amount_sum);
        let tax_total = round_currency(tax_sum);
        Self {
            subtotal,
            tax_total,
            total: round_currency(subtotal + tax_total),
        }
    }
}

/// Result of running the engine over a whole invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceComputation {
    /// One result per input line, in input order.
    pub lines: Vec<LineItemResult>,
    pub totals: InvoiceTotals,
}

/// Compute every line and the invoice totals.
///
/// `subtotal` and `tax_total` are rounded from the sums of the full-precision
/// line figures, not re-summed from the rounded lines. The first invalid line
/// fails the whole computation; its error field is prefixed with
/// `items.<index>`.
pub fn compute_totals(
    lines: &[LineItemInput],
    supply: SupplyType,
) -> Result<InvoiceComputation, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::new("items", "at least one line item required"));
    }

    let mut figures = Vec::with_capacity(lines.len());
    let mut amount_sum = Decimal::ZERO;
    let mut tax_sum = Decimal::ZERO;

    for (idx, input) in lines.iter().enumerate() {
        let f = LineFigures::evaluate(input).map_err(|e| e.at(format!("items.{idx}")))?;
        amount_sum = amount_sum
            .checked_add(f.amount)
            .ok_or_else(|| ValidationError::new("subtotal", "invoice subtotal is out of range"))?;
        tax_sum = tax_sum
            .checked_add(f.tax_amount)
            .ok_or_else(|| ValidationError::new("tax_total", "invoice tax is out of range"))?;
        figures.push(f);
    }

    let totals = InvoiceTotals::from_sums(amount_sum, tax_sum);
    if totals.total > max_currency_amount() {
        return Err(ValidationError::new("total", "invoice total is out of range"));
    }

    let lines = figures
        .into_iter()
        .zip(lines)
        .map(|(f, input)| f.settle(input, supply))
        .collect();

    Ok(InvoiceComputation { lines, totals })
}
