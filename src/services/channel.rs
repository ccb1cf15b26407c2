use thiserror::Error;

use crate::models::order::{OrderDetails, ProductType};

/// Longest product title either gateway accepts.
pub const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    #[error("Order number must be specified")]
    MissingOrderNumber,
    #[error("Channel payment must have products")]
    NoProducts,
    #[error("Either total amount or products must be specified")]
    MissingAmount,
    #[error("Total amount and products can not be used at the same time")]
    AmountWithProducts,
    #[error("Contact is missing field '{0}'")]
    MissingContactField(String),
    #[error("Timestamp must be generated before hashing")]
    MissingTimestamp,
    #[error("Request body must be serialized before hashing")]
    MissingRequestBody,
    #[error("Request must be hashed before generating headers")]
    NotSigned,
    #[error("Request hash does not cover the current timestamp and body")]
    StaleSignature,
    #[error("Failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A configured integration with one payment gateway.
pub trait PaymentChannel: Send {
    fn name(&self) -> &'static str;

    fn order_mut(&mut self) -> &mut OrderDetails;

    /// Records the callback URLs. No validation is done.
    fn set_urls(&mut self, success_url: &str, cancel_url: &str, notify_url: &str) {
        let order = self.order_mut();
        order.success_url = success_url.to_string();
        order.cancel_url = cancel_url.to_string();
        order.notify_url = notify_url.to_string();
    }

    fn set_order_number(&mut self, order_number: &str) {
        self.order_mut().order_number = Some(order_number.to_string());
    }

    fn set_currency(&mut self, currency: &str) {
        self.order_mut().currency = currency.to_string();
    }

    /// Appends a line item. `unit_price_cents` is in minor currency units.
    fn add_product(
        &mut self,
        name: &str,
        code: &str,
        quantity: u32,
        unit_price_cents: i64,
        vat_percent: f64,
        product_type: ProductType,
    );

    fn product_count(&self) -> usize;

    /// Checks the signature of a return or notify request.
    ///
    /// Never fails: a forged or mismatching request just yields `false`.
    fn validate_request(
        &self,
        order_number: &str,
        payment_id: &str,
        timestamp: &str,
        status: &str,
        auth_code: &str,
    ) -> bool;
}

/// Prefixes the merchant item code onto the product name.
pub(crate) fn coded_name(name: &str, code: &str) -> String {
    if code.is_empty() {
        name.to_string()
    } else {
        format!("{code} {name}")
    }
}
