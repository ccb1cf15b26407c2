use axum::{
    extract::{Form, Query, State},
    response::Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::payment::PaymentOutcome;
use crate::services::PaymentService;

/// Return and notify callbacks arriving as query parameters.
pub async fn response_query(
    State(service): State<Arc<PaymentService>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<PaymentOutcome> {
    Json(service.process_response(&params))
}

pub async fn response_form(
    State(service): State<Arc<PaymentService>>,
    Form(params): Form<HashMap<String, String>>,
) -> Json<PaymentOutcome> {
    Json(service.process_response(&params))
}
