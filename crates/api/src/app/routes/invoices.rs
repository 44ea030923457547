use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use gstbook_core::InvoiceId;
use gstbook_infra::InvoiceStore;
use gstbook_invoicing::{
    resolve_supply_type, validate_invoice, validate_invoice_patch, validate_preview, Invoice,
    InvoiceParties, InvoicePatchPayload, InvoicePayload, PreviewPayload, SubmittedTotals,
};
use gstbook_tax::is_standard_gst_rate;

use crate::app::services::{parse_id, AppServices};
use crate::app::{dto, errors};
use crate::context::{ClientContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/preview", post(preview_invoice))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
}

/// Submitted totals are display hints from the form; the engine's figures win.
fn note_submitted_totals(ctx: &ClientContext, invoice: &Invoice, submitted: Option<SubmittedTotals>) {
    if let Some(submitted) = submitted {
        if submitted.disagrees_with(&invoice.totals) {
            tracing::debug!(
                client_id = %ctx.client_id(),
                invoice_id = %invoice.id,
                submitted = ?submitted,
                computed = ?invoice.totals,
                "discarding client-submitted totals"
            );
        }
    }
}

/// Rates outside the standard slabs are accepted but traced.
fn note_unusual_rates(ctx: &ClientContext, invoice: &Invoice) {
    for item in invoice.items.iter().filter(|i| !is_standard_gst_rate(i.line.gst_rate)) {
        tracing::debug!(
            client_id = %ctx.client_id(),
            invoice_id = %invoice.id,
            line_no = item.line_no,
            gst_rate = %item.line.gst_rate,
            "non-standard GST rate"
        );
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match services.store().list_invoices(ctx.client_id()).await {
        Ok(invoices) => {
            let items = invoices.iter().map(dto::invoice_summary).collect::<Vec<_>>();
            (StatusCode::OK, Json(dto::ItemsResponse::from(items))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
    body: Result<Json<InvoicePayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let draft = match validate_invoice(payload) {
        Ok(d) => d,
        Err(e) => return errors::validation_error(e),
    };
    let submitted = draft.submitted_totals;

    let invoice = match services.create_invoice(&ctx, draft).await {
        Ok(inv) => inv,
        Err(resp) => return resp,
    };
    note_submitted_totals(&ctx, &invoice, submitted);
    note_unusual_rates(&ctx, &invoice);

    tracing::info!(
        client_id = %ctx.client_id(),
        invoice_id = %invoice.id,
        number = %invoice.number,
        lines = invoice.items.len(),
        supply_type = %invoice.supply_type,
        total = %invoice.totals.total,
        "invoice created"
    );
    (StatusCode::CREATED, Json(invoice)).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let invoice_id: InvoiceId = match parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.invoice(&ctx, invoice_id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
    body: Result<Json<InvoicePatchPayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let invoice_id: InvoiceId = match parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let patch = match validate_invoice_patch(payload) {
        Ok(p) => p,
        Err(e) => return errors::validation_error(e),
    };

    let mut invoice = match services.invoice(&ctx, invoice_id).await {
        Ok(inv) => inv,
        Err(resp) => return resp,
    };
    let customer_id = patch.customer_id.unwrap_or(invoice.customer_id);
    let customer = match services.invoice_customer(&ctx, customer_id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let parties = match InvoiceParties::new(ctx.client(), &customer) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let submitted = patch.submitted_totals;
    if let Err(e) = invoice.revise(patch, parties, Utc::now()) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.store().replace_invoice(&invoice).await {
        return errors::store_error_to_response(e);
    }
    note_submitted_totals(&ctx, &invoice, submitted);
    note_unusual_rates(&ctx, &invoice);

    tracing::info!(
        client_id = %ctx.client_id(),
        invoice_id = %invoice.id,
        status = %invoice.status,
        lines = invoice.items.len(),
        total = %invoice.totals.total,
        "invoice updated"
    );
    (StatusCode::OK, Json(invoice)).into_response()
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let invoice_id: InvoiceId = match parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store().delete_invoice(ctx.client_id(), invoice_id).await {
        Ok(()) => {
            tracing::info!(client_id = %ctx.client_id(), invoice_id = %invoice_id, "invoice deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Live totals while an invoice is being edited. Same engine as persistence.
pub async fn preview_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
    body: Result<Json<PreviewPayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let request = match validate_preview(payload) {
        Ok(r) => r,
        Err(e) => return errors::validation_error(e),
    };

    let customer_state = match request.customer_id {
        Some(customer_id) => match services.invoice_customer(&ctx, customer_id).await {
            Ok(customer) => customer.state_code(),
            Err(resp) => return resp,
        },
        None => None,
    };

    let supply = match resolve_supply_type(
        request.supply_type,
        ctx.client().state_code(),
        request.place_of_supply.as_deref(),
        customer_state,
    ) {
        Ok(s) => s,
        Err(e) => return errors::validation_error(e),
    };

    match gstbook_invoicing::preview(&request.items, supply) {
        Ok(computation) => (StatusCode::OK, Json(dto::PreviewResponse::new(supply, computation))).into_response(),
        Err(e) => errors::validation_error(e),
    }
}
