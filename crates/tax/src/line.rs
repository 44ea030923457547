//! Per-line GST computation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gstbook_core::{ValidationError, ValueObject};

use crate::money::{max_currency_amount, round_currency};
use crate::supply::SupplyType;

/// GST slabs in everyday use. Other non-negative rates are still accepted.
pub const STANDARD_GST_RATES: [u32; 5] = [0, 5, 12, 18, 28];

/// Whether `rate` is one of the standard GST slabs.
pub fn is_standard_gst_rate(rate: Decimal) -> bool {
    STANDARD_GST_RATES.iter().any(|slab| Decimal::from(*slab) == rate)
}

/// One invoice row as entered, before any tax is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    /// HSN/SAC classification code; free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn: Option<String>,
    pub quantity: Decimal,
    /// Unit price in rupees.
    pub rate: Decimal,
    /// GST percentage (e.g. 18 for 18%).
    pub gst_rate: Decimal,
}

impl ValueObject for LineItemInput {}

/// Derived values for one row, rounded to currency precision.
///
/// Echoes the input fields so the row can be persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemResult {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn: Option<String>,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub gst_rate: Decimal,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

impl LineItemResult {
    /// The input this row was computed from.
    pub fn input(&self) -> LineItemInput {
        LineItemInput {
            description: self.description.clone(),
            hsn: self.hsn.clone(),
            quantity: self.quantity,
            rate: self.rate,
            gst_rate: self.gst_rate,
        }
    }
}

/// Full-precision figures for a line; aggregates are summed from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineFigures {
    pub(crate) amount: Decimal,
    pub(crate) tax_amount: Decimal,
}

impl LineFigures {
    pub(crate) fn evaluate(input: &LineItemInput) -> Result<Self, ValidationError> {
        validate(input)?;

        let amount = input
            .quantity
            .checked_mul(input.rate)
            .ok_or_else(|| ValidationError::new("amount", "line amount is out of range"))?;
        let tax_amount = amount
            .checked_mul(input.gst_rate)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(|| ValidationError::new("gst_rate", "line tax is out of range"))?;

        if round_currency(amount) > max_currency_amount() {
            return Err(ValidationError::new("amount", "line amount is out of range"));
        }
        if round_currency(tax_amount) > max_currency_amount() {
            return Err(ValidationError::new("gst_rate", "line tax is out of range"));
        }

        Ok(Self { amount, tax_amount })
    }

    pub(crate) fn settle(self, input: &LineItemInput, supply: SupplyType) -> LineItemResult {
        let tax_amount = round_currency(self.tax_amount);
        let zero = round_currency(Decimal::ZERO);

        let (cgst, sgst, igst) = match supply {
            SupplyType::IntraState => {
                // Equal halves of the unrounded tax; their sum may be a paisa off tax_amount.
                let half = round_currency(self.tax_amount / Decimal::TWO);
                (half, half, zero)
            }
            SupplyType::InterState => (zero, zero, tax_amount),
        };

        LineItemResult {
            description: input.description.clone(),
            hsn: input.hsn.clone(),
            quantity: input.quantity,
            rate: input.rate,
            gst_rate: input.gst_rate,
            amount: round_currency(self.amount),
            tax_amount,
            cgst,
            sgst,
            igst,
        }
    }
}

fn validate(input: &LineItemInput) -> Result<(), ValidationError> {
    if input.description.trim().is_empty() {
        return Err(ValidationError::new("description", "must not be empty"));
    }
    if input.quantity <= Decimal::ZERO {
        return Err(ValidationError::new("quantity", "must be greater than zero"));
    }
    if input.rate < Decimal::ZERO {
        return Err(ValidationError::new("rate", "must not be negative"));
    }
    if input.gst_rate < Decimal::ZERO {
        return Err(ValidationError::new("gst_rate", "must not be negative"));
    }
    Ok(())
}

/// Compute amount and GST split for a single line.
///
/// Out-of-range input (empty description, non-positive quantity, negative rate
/// or GST rate) is rejected with a [`ValidationError`] naming the field.
pub fn compute_line(
    input: &LineItemInput,
    supply: SupplyType,
) -> Result<LineItemResult, ValidationError> {
    Ok(LineFigures::evaluate(input)?.settle(input, supply))
}
