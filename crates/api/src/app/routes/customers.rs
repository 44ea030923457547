use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use gstbook_core::CustomerId;
use gstbook_infra::CustomerStore;
use gstbook_parties::{validate_customer, validate_customer_patch, Customer, CustomerPatchPayload, CustomerPayload};

use crate::app::services::{parse_id, AppServices};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match services.store().list_customers(ctx.client_id()).await {
        Ok(customers) => (StatusCode::OK, Json(dto::ItemsResponse::from(customers))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
    body: Result<Json<CustomerPayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let new = match validate_customer(payload) {
        Ok(v) => v,
        Err(e) => return errors::validation_error(e),
    };

    let customer = Customer::register(CustomerId::new(), ctx.client_id(), new, Utc::now());
    if let Err(e) = services.store().insert_customer(&customer).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(client_id = %ctx.client_id(), customer_id = %customer.id, b2c = customer.is_b2c(), "customer added");
    (StatusCode::CREATED, Json(customer)).into_response()
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let customer_id: CustomerId = match parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.customer(&ctx, customer_id).await {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
    body: Result<Json<CustomerPatchPayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let customer_id: CustomerId = match parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let patch = match validate_customer_patch(payload) {
        Ok(p) => p,
        Err(e) => return errors::validation_error(e),
    };

    let mut customer = match services.customer(&ctx, customer_id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    customer.apply(patch);
    if let Err(e) = services.store().update_customer(&customer).await {
        return errors::store_error_to_response(e);
    }

    (StatusCode::OK, Json(customer)).into_response()
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((client_id, id)): Path<(String, String)>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let customer_id: CustomerId = match parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store().delete_customer(ctx.client_id(), customer_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
