//! Service wiring shared by all handlers: storage plus the request-scoped
//! lookups every client route starts with.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;

use gstbook_core::{ClientId, CustomerId, InvoiceId, ValidationError};
use gstbook_infra::{ClientStore, CustomerStore, InMemoryStore, InvoiceStore, Store, StoreError};
use gstbook_invoicing::{Invoice, InvoiceDraft, InvoiceNumber, InvoiceParties};
use gstbook_parties::Customer;

use crate::app::errors;
use crate::authz;
use crate::config::ApiConfig;
use crate::context::{ClientContext, PrincipalContext};

/// How many sequence numbers to try when a generated invoice number is taken
/// (gaps left by deleted invoices).
const NUMBERING_ATTEMPTS: u64 = 16;

pub struct AppServices {
    store: Arc<dyn Store>,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Load a client and check the caller owns it.
    pub async fn client_context(
        &self,
        principal: &PrincipalContext,
        raw_client_id: &str,
    ) -> Result<ClientContext, Response> {
        let client_id: ClientId = parse_id(raw_client_id, "client")?;
        let client = self
            .store
            .get_client(client_id)
            .await
            .map_err(errors::store_error_to_response)?
            .ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "not_found", "client not found"))?;
        authz::authorize_client(principal, client).map_err(errors::authz_error_to_response)
    }

    pub async fn customer(&self, ctx: &ClientContext, customer_id: CustomerId) -> Result<Customer, Response> {
        self.store
            .get_customer(ctx.client_id(), customer_id)
            .await
            .map_err(errors::store_error_to_response)?
            .ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found"))
    }

    /// A customer named in a request body; unknown ids are a field error.
    pub async fn invoice_customer(&self, ctx: &ClientContext, customer_id: CustomerId) -> Result<Customer, Response> {
        self.store
            .get_customer(ctx.client_id(), customer_id)
            .await
            .map_err(errors::store_error_to_response)?
            .ok_or_else(|| errors::validation_error(ValidationError::new("customer_id", "unknown customer")))
    }

    pub async fn invoice(&self, ctx: &ClientContext, invoice_id: InvoiceId) -> Result<Invoice, Response> {
        self.store
            .get_invoice(ctx.client_id(), invoice_id)
            .await
            .map_err(errors::store_error_to_response)?
            .ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"))
    }

    /// Compute and persist a new invoice.
    ///
    /// Without an explicit number the client's next sequence number is used,
    /// skipping numbers that are already taken.
    pub async fn create_invoice(&self, ctx: &ClientContext, draft: InvoiceDraft) -> Result<Invoice, Response> {
        let customer = self.invoice_customer(ctx, draft.customer_id).await?;
        let parties = InvoiceParties::new(ctx.client(), &customer).map_err(errors::domain_error_to_response)?;
        let explicit_number = draft.number.is_some();

        let count = self
            .store
            .count_invoices(ctx.client_id())
            .await
            .map_err(errors::store_error_to_response)?;

        let mut sequence = count + 1;
        loop {
            let default_number = InvoiceNumber::next(&ctx.client().invoice_prefix, sequence)
                .map_err(errors::validation_error)?;
            let invoice = Invoice::create(InvoiceId::new(), parties, draft.clone(), default_number, Utc::now())
                .map_err(errors::domain_error_to_response)?;

            match self.store.insert_invoice(&invoice).await {
                Ok(()) => return Ok(invoice),
                Err(StoreError::Conflict(_))
                    if !explicit_number && sequence < count + NUMBERING_ATTEMPTS =>
                {
                    sequence += 1;
                }
                Err(e) => return Err(errors::store_error_to_response(e)),
            }
        }
    }
}

/// Parse a path id, answering 400 when it is not one.
pub fn parse_id<T: core::str::FromStr>(raw: &str, what: &str) -> Result<T, Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

/// Pick the storage backend from configuration.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            use anyhow::Context;

            let store = gstbook_infra::PostgresStore::connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            tracing::info!("using postgres store");
            Ok(AppServices::new(Arc::new(store)))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but built without the `postgres` feature; using in-memory store");
            Ok(AppServices::in_memory())
        }
        None => {
            tracing::info!("using in-memory store");
            Ok(AppServices::in_memory())
        }
    }
}
