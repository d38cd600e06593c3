use axum::{routing::get, Router};

pub mod invoices;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/invoices", invoices::router())
}
