//! Invoicing domain module.
//!
//! Business rules for GST invoices, implemented purely as deterministic domain
//! logic without IO. Totals are always recomputed from the
//! submitted line items through `gstbook-tax`; client-submitted totals are
//! treated as display hints only.

pub mod invoice;
pub mod number;
pub mod payload;
pub mod supply;

pub use invoice::{preview, Invoice, InvoiceItem, InvoiceParties, InvoiceStatus, DEFAULT_PAYMENT_TERM_DAYS};
pub use number::InvoiceNumber;
pub use payload::{
    validate_invoice, validate_invoice_patch, validate_preview, InvoiceDraft, InvoicePatch,
    InvoicePatchPayload, InvoicePayload, LineItemPayload, PreviewPayload, PreviewRequest,
    SubmittedTotals,
};
pub use supply::resolve_supply_type;
