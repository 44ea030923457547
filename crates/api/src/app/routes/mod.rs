use axum::{routing::get, Router};

pub mod clients;
pub mod customers;
pub mod invoices;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/clients", clients::router())
}
