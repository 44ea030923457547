use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use gstbook_core::ClientId;
use gstbook_infra::ClientStore;
use gstbook_parties::{validate_client, validate_client_patch, Client, ClientPatchPayload, ClientPayload};

use crate::app::routes::{customers, invoices};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route(
            "/:client_id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .nest("/:client_id/customers", customers::router())
        .nest("/:client_id/invoices", invoices::router())
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.store().list_clients(principal.user_id()).await {
        Ok(clients) => (StatusCode::OK, Json(dto::ItemsResponse::from(clients))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<ClientPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let new = match validate_client(payload) {
        Ok(v) => v,
        Err(e) => return errors::validation_error(e),
    };

    let client = Client::register(ClientId::new(), principal.user_id(), new, Utc::now());
    if let Err(e) = services.store().insert_client(&client).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(client_id = %client.id, owner = %client.owner, "client registered");
    (StatusCode::CREATED, Json(client)).into_response()
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
) -> Response {
    match services.client_context(&principal, &client_id).await {
        Ok(ctx) => (StatusCode::OK, Json(ctx.client())).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
    body: Result<Json<ClientPatchPayload>, JsonRejection>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let Json(payload) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let patch = match validate_client_patch(payload) {
        Ok(p) => p,
        Err(e) => return errors::validation_error(e),
    };

    let mut client = ctx.client().clone();
    client.apply(patch);
    if let Err(e) = services.store().update_client(&client).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(client_id = %client.id, "client updated");
    (StatusCode::OK, Json(client)).into_response()
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(client_id): Path<String>,
) -> Response {
    let ctx = match services.client_context(&principal, &client_id).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match services.store().delete_client(ctx.client_id()).await {
        Ok(()) => {
            tracing::info!(client_id = %ctx.client_id(), "client deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
