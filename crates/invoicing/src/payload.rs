//! Wire payloads and their validation into typed invoice input.
//!
//! Numeric fields arrive as JSON numbers or numeric strings (form inputs);
//! they are coerced into [`Decimal`] here so the tax engine only ever sees
//! typed values. Every failure names the offending field.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use gstbook_core::validate::{optional_text, required_text};
use gstbook_core::{CustomerId, ValidationError};
use gstbook_tax::{InvoiceTotals, LineItemInput, SupplyType};

use crate::invoice::InvoiceStatus;
use crate::number::InvoiceNumber;

/// Raw line item as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemPayload {
    pub description: Option<String>,
    pub hsn: Option<String>,
    pub quantity: Option<Value>,
    pub rate: Option<Value>,
    pub gst_rate: Option<Value>,
}

/// Raw create-invoice request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePayload {
    pub customer_id: Option<String>,
    pub number: Option<String>,
    pub date: Option<String>,
    pub due_date: Option<String>,
    pub place_of_supply: Option<String>,
    pub supply_type: Option<String>,
    pub status: Option<String>,
    pub is_b2c: Option<bool>,
    pub items: Option<Vec<LineItemPayload>>,
    /// Totals as displayed by the submitting form; never persisted.
    pub subtotal: Option<Value>,
    pub tax_total: Option<Value>,
    pub total: Option<Value>,
}

/// Raw update-invoice request body; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePatchPayload {
    pub customer_id: Option<String>,
    pub number: Option<String>,
    pub date: Option<String>,
    pub due_date: Option<String>,
    pub place_of_supply: Option<String>,
    pub supply_type: Option<String>,
    pub status: Option<String>,
    pub is_b2c: Option<bool>,
    pub items: Option<Vec<LineItemPayload>>,
    pub subtotal: Option<Value>,
    pub tax_total: Option<Value>,
    pub total: Option<Value>,
}

/// Raw live-preview request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewPayload {
    pub customer_id: Option<String>,
    pub place_of_supply: Option<String>,
    pub supply_type: Option<String>,
    pub items: Option<Vec<LineItemPayload>>,
}

/// Totals a client claimed for its submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTotals {
    pub subtotal: Option<Decimal>,
    pub tax_total: Option<Decimal>,
    pub total: Option<Decimal>,
}

impl SubmittedTotals {
    fn from_wire(subtotal: Option<Value>, tax_total: Option<Value>, total: Option<Value>) -> Option<Self> {
        // Hints only: unreadable values are simply dropped.
        let read = |v: Option<Value>| v.and_then(|v| to_decimal(&v).ok().flatten());
        let totals = Self {
            subtotal: read(subtotal),
            tax_total: read(tax_total),
            total: read(total),
        };
        (totals.subtotal.is_some() || totals.tax_total.is_some() || totals.total.is_some())
            .then_some(totals)
    }

    /// Whether any submitted figure differs from the authoritative totals.
    pub fn disagrees_with(&self, computed: &InvoiceTotals) -> bool {
        let differs = |claimed: Option<Decimal>, actual: Decimal| claimed.is_some_and(|c| c != actual);
        differs(self.subtotal, computed.subtotal)
            || differs(self.tax_total, computed.tax_total)
            || differs(self.total, computed.total)
    }
}

/// Validated create-invoice input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub customer_id: CustomerId,
    pub number: Option<InvoiceNumber>,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub place_of_supply: Option<String>,
    pub supply_type: Option<SupplyType>,
    pub status: InvoiceStatus,
    pub is_b2c: Option<bool>,
    pub items: Vec<LineItemInput>,
    pub submitted_totals: Option<SubmittedTotals>,
}

/// Validated update. For the optional header fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoicePatch {
    pub customer_id: Option<CustomerId>,
    pub number: Option<InvoiceNumber>,
    pub date: Option<NaiveDate>,
    pub due_date: Option<Option<NaiveDate>>,
    pub place_of_supply: Option<Option<String>>,
    pub supply_type: Option<SupplyType>,
    pub status: Option<InvoiceStatus>,
    pub is_b2c: Option<bool>,
    pub items: Option<Vec<LineItemInput>>,
    pub submitted_totals: Option<SubmittedTotals>,
}

impl InvoicePatch {
    /// Whether the patch touches anything besides the status.
    pub fn edits_content(&self) -> bool {
        self.customer_id.is_some()
            || self.number.is_some()
            || self.date.is_some()
            || self.due_date.is_some()
            || self.place_of_supply.is_some()
            || self.supply_type.is_some()
            || self.is_b2c.is_some()
            || self.items.is_some()
    }
}

/// Validated live-preview input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub customer_id: Option<CustomerId>,
    pub place_of_supply: Option<String>,
    pub supply_type: Option<SupplyType>,
    pub items: Vec<LineItemInput>,
}

/// `Ok(None)` for JSON null / blank strings, `Err(())` for anything unreadable.
fn to_decimal(value: &Value) -> Result<Option<Decimal>, ()> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(()),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| ())
}

fn decimal_field(field: &str, value: Option<Value>) -> Result<Decimal, ValidationError> {
    match value.as_ref().map(to_decimal) {
        None | Some(Ok(None)) => Err(ValidationError::required(field)),
        Some(Ok(Some(v))) => Ok(v),
        Some(Err(())) => Err(ValidationError::new(field, "must be a number")),
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ValidationError::new(field, "must be a date (YYYY-MM-DD or RFC 3339)"))
}

fn optional_date(field: &str, raw: Option<String>) -> Result<Option<NaiveDate>, ValidationError> {
    optional_text(raw).map(|v| parse_date(field, &v)).transpose()
}

fn parse_customer_id(raw: Option<String>) -> Result<CustomerId, ValidationError> {
    required_text("customer_id", raw)?
        .parse()
        .map_err(|_| ValidationError::new("customer_id", "is not a valid id"))
}

fn parse_supply_type(raw: Option<String>) -> Result<Option<SupplyType>, ValidationError> {
    optional_text(raw)
        .map(|v| v.parse().map_err(|msg: String| ValidationError::new("supply_type", msg)))
        .transpose()
}

fn parse_status(raw: Option<String>) -> Result<Option<InvoiceStatus>, ValidationError> {
    optional_text(raw)
        .map(|v| v.parse().map_err(|msg: String| ValidationError::new("status", msg)))
        .transpose()
}

fn parse_number(raw: Option<String>) -> Result<Option<InvoiceNumber>, ValidationError> {
    optional_text(raw).map(|v| InvoiceNumber::parse(&v)).transpose()
}

fn validate_line(payload: LineItemPayload) -> Result<LineItemInput, ValidationError> {
    Ok(LineItemInput {
        description: required_text("description", payload.description)?,
        hsn: optional_text(payload.hsn),
        quantity: decimal_field("quantity", payload.quantity)?,
        rate: decimal_field("rate", payload.rate)?,
        gst_rate: decimal_field("gst_rate", payload.gst_rate)?,
    })
}

fn validate_items(items: Option<Vec<LineItemPayload>>) -> Result<Vec<LineItemInput>, ValidationError> {
    let items = items.ok_or_else(|| ValidationError::required("items"))?;
    if items.is_empty() {
        return Err(ValidationError::new("items", "at least one line item required"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| validate_line(item).map_err(|e| e.at(format!("items.{idx}"))))
        .collect()
}

/// Validate a create-invoice payload. Shape and coercion only; amounts and
/// tax are derived later by the engine.
pub fn validate_invoice(payload: InvoicePayload) -> Result<InvoiceDraft, ValidationError> {
    let customer_id = parse_customer_id(payload.customer_id)?;
    let number = parse_number(payload.number)?;
    let date = parse_date("date", &required_text("date", payload.date)?)?;
    let due_date = optional_date("due_date", payload.due_date)?;
    let status = parse_status(payload.status)?.unwrap_or(InvoiceStatus::Draft);
    let items = validate_items(payload.items)?;

    Ok(InvoiceDraft {
        customer_id,
        number,
        date,
        due_date,
        place_of_supply: optional_text(payload.place_of_supply),
        supply_type: parse_supply_type(payload.supply_type)?,
        status,
        is_b2c: payload.is_b2c,
        items,
        submitted_totals: SubmittedTotals::from_wire(payload.subtotal, payload.tax_total, payload.total),
    })
}

pub fn validate_invoice_patch(payload: InvoicePatchPayload) -> Result<InvoicePatch, ValidationError> {
    Ok(InvoicePatch {
        customer_id: payload.customer_id.map(|v| parse_customer_id(Some(v))).transpose()?,
        number: parse_number(payload.number)?,
        date: optional_date("date", payload.date)?,
        due_date: payload
            .due_date
            .map(|v| optional_date("due_date", Some(v)))
            .transpose()?,
        place_of_supply: payload.place_of_supply.map(|v| optional_text(Some(v))),
        supply_type: parse_supply_type(payload.supply_type)?,
        status: parse_status(payload.status)?,
        is_b2c: payload.is_b2c,
        items: payload.items.map(|items| validate_items(Some(items))).transpose()?,
        submitted_totals: SubmittedTotals::from_wire(payload.subtotal, payload.tax_total, payload.total),
    })
}

pub fn validate_preview(payload: PreviewPayload) -> Result<PreviewRequest, ValidationError> {
    Ok(PreviewRequest {
        customer_id: payload.customer_id.map(|v| parse_customer_id(Some(v))).transpose()?,
        place_of_supply: optional_text(payload.place_of_supply),
        supply_type: parse_supply_type(payload.supply_type)?,
        items: validate_items(payload.items)?,
    })
}
