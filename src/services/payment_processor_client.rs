use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::app::config::Config;
use crate::models::payment::{GatewayResponse, SignedRequest};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment gateway returned HTTP {0}")]
    Status(u16),
    #[error("payment gateway response is missing '{0}'")]
    MalformedResponse(&'static str),
}

/// Sends a signed payment request and returns the gateway page to redirect to.
///
/// One attempt only; retrying is up to the caller.
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    async fn send_payment(&self, url: &str, request: &SignedRequest)
        -> Result<String, TransportError>;
}

pub struct PaymentProcessorClient {
    client: Client,
}

impl PaymentProcessorClient {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PaymentTransport for PaymentProcessorClient {
    async fn send_payment(
        &self,
        url: &str,
        request: &SignedRequest,
    ) -> Result<String, TransportError> {
        let mut builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            error!("Payment gateway returned HTTP {}", status);
            return Err(TransportError::Status(status.as_u16()));
        }

        let parsed: GatewayResponse = response.json().await?;
        let order_number = parsed
            .order_number
            .ok_or(TransportError::MalformedResponse("orderNumber"))?;
        let redirect = parsed
            .url
            .ok_or(TransportError::MalformedResponse("url"))?;

        info!("Payment gateway accepted order {}", order_number);
        Ok(redirect)
    }
}
