use axum::{extract::State, http::StatusCode, response::Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::payment::{PaymentStart, StartPaymentRequest};
use crate::services::{PaymentService, ServiceError};

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    Json(request): Json<StartPaymentRequest>,
) -> Result<Json<PaymentStart>, StatusCode> {
    info!(
        "Received payment request for patron {} ({} fines)",
        request.patron_id,
        request.fines.len()
    );

    match service.start_payment(request).await {
        Ok(start) => Ok(Json(start)),
        Err(ServiceError::NothingToPay) => Err(StatusCode::BAD_REQUEST),
        Err(ServiceError::Transport(e)) => {
            error!("Payment gateway request failed: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
        Err(e) => {
            error!("Failed to start payment: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
