//! Response DTOs and JSON mapping helpers.
//!
//! Request bodies are the raw payload types from the domain crates
//! (`ClientPayload`, `InvoicePayload`, ...); their validation lives there.

use serde::Serialize;

use gstbook_invoicing::Invoice;
use gstbook_tax::{InvoiceComputation, InvoiceTotals, LineItemResult, SupplyType};

/// List envelope: `{ "items": [...] }`.
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Live totals for an invoice being edited; nothing is persisted.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub supply_type: SupplyType,
    pub lines: Vec<LineItemResult>,
    pub totals: InvoiceTotals,
}

impl PreviewResponse {
    pub fn new(supply_type: SupplyType, computation: InvoiceComputation) -> Self {
        Self {
            supply_type,
            lines: computation.lines,
            totals: computation.totals,
        }
    }
}

/// Compact row for invoice listings.
#[derive(Debug, Serialize)]
pub struct InvoiceSummary<'a> {
    pub id: String,
    pub number: &'a str,
    pub customer_id: String,
    pub date: chrono::NaiveDate,
    pub due_date: Option<chrono::NaiveDate>,
    pub status: gstbook_invoicing::InvoiceStatus,
    pub supply_type: SupplyType,
    pub line_count: usize,
    #[serde(flatten)]
    pub totals: InvoiceTotals,
}

pub fn invoice_summary(invoice: &Invoice) -> InvoiceSummary<'_> {
    InvoiceSummary {
        id: invoice.id.to_string(),
        number: invoice.number.as_str(),
        customer_id: invoice.customer_id.to_string(),
        date: invoice.date,
        due_date: invoice.due_date,
        status: invoice.status,
        supply_type: invoice.supply_type,
        line_count: invoice.items.len(),
        totals: invoice.totals,
    }
}
