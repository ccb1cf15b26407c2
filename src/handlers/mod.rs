pub mod metrics;
pub mod payment_response;
pub mod payments;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::services::PaymentService;

pub fn router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/payments", post(payments::create_payment))
        .route(
            "/payments/response",
            get(payment_response::response_query).post(payment_response::response_form),
        )
        .route("/metrics", get(metrics::get_metrics))
        .with_state(service)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
