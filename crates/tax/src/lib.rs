//! GST tax engine.
//!
//! Pure, deterministic computation of per-line GST splits and invoice totals
//! (no IO or logging). The same functions back the live
//! totals preview and the authoritative values persisted with an invoice, so
//! both always agree to the paisa.

pub mod line;
pub mod money;
pub mod supply;
pub mod totals;

pub use line::{compute_line, is_standard_gst_rate, LineItemInput, LineItemResult, STANDARD_GST_RATES};
pub use money::{max_currency_amount, round_currency, CURRENCY_DECIMAL_PLACES};
pub use supply::SupplyType;
pub use totals::{compute_totals, InvoiceComputation, InvoiceTotals};

pub use gstbook_core::ValidationError;
