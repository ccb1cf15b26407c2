use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::services::PaymentService;

pub async fn get_metrics(
    State(payment_service): State<Arc<PaymentService>>,
) -> Json<serde_json::Value> {
    Json(payment_service.get_metrics())
}
