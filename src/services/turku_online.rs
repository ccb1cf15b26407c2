//! JSON/REST payment gateway.
//!
//! A request is signed in a fixed sequence: generate the timestamp, serialize
//! the body, hash `sha256("finna" + timestamp + body + secret)`, then build
//! the headers. Headers are refused unless the hash covers the current
//! timestamp and body.

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::models::order::{Locale, OrderDetails, ProductType};
use crate::models::payment::{
    JsonProduct, OrderDetailsPayload, PaymentPayload, PaymentRequestBody, SignedRequest, UrlSet,
};
use crate::services::channel::{coded_name, ChannelError, PaymentChannel, MAX_TITLE_LENGTH};
use crate::services::crypto::{hex_digest, Md5, Sha256};
use crate::utils::money::format_cents;
use crate::utils::text::{sanitize_product_name, truncate_chars};

/// Service point, also the first part of the signed message.
pub const SERVICE_PROVIDER: &str = "finna";
pub const ANONYMOUS_ORDER_ID: &str = "ANONYYMI";
pub const CHARSET: &str = "utf-8";
/// Hour is written with the 12-hour token.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%I:%M:%SZ";

const SAP_CODE: &str = "000000000000011151";
const VAT: &str = "23.00";
const DISCOUNT: &str = "0.00";
const PRODUCT_TYPE: &str = "1";
const CURRENCY: &str = "EUR";

/// Characters the gateway does not accept in product titles.
const DISALLOWED_TITLE_CHARS: &str = r##"[^\p{L}\-0-9 "',()\[\]\{\}*/+_.:\&!?@\#\$£=;\~]+"##;

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DISALLOWED_TITLE_CHARS).expect("valid title pattern"))
}

#[derive(Debug, Clone)]
struct Signature {
    timestamp: String,
    body: String,
    hash: String,
}

pub struct TurkuOnlineChannel {
    merchant_id: String,
    secret: String,
    order: OrderDetails,
    products: Vec<JsonProduct>,
    timestamp: Option<String>,
    request_body: Option<String>,
    signature: Option<Signature>,
}

impl TurkuOnlineChannel {
    pub fn new(merchant_id: &str, secret: &str, locale: &str) -> Result<Self, ChannelError> {
        let locale: Locale = locale.parse()?;
        Ok(Self {
            merchant_id: merchant_id.to_string(),
            secret: secret.to_string(),
            order: OrderDetails::new(locale),
            products: Vec::new(),
            timestamp: None,
            request_body: None,
            signature: None,
        })
    }

    /// Pays a lump sum instead of line items. The amount only decides which
    /// body is valid; the gateway body has no field for it.
    pub fn set_total_amount(&mut self, amount_cents: i64) {
        self.order.total_amount = Some(amount_cents);
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn request_body(&self) -> Option<&str> {
        self.request_body.as_deref()
    }

    pub fn generate_timestamp(&mut self) -> &str {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.timestamp.insert(timestamp).as_str()
    }

    pub fn set_timestamp(&mut self, timestamp: &str) {
        self.timestamp = Some(timestamp.to_string());
    }

    pub fn generate_body(&self) -> Result<PaymentRequestBody, ChannelError> {
        let order = &self.order;
        let order_number = order.require_order_number()?;
        match (order.total_amount, self.products.is_empty()) {
            (None, true) => return Err(ChannelError::MissingAmount),
            (Some(_), false) => return Err(ChannelError::AmountWithProducts),
            _ => {}
        }

        Ok(PaymentRequestBody {
            payment: PaymentPayload {
                order_number: order_number.to_string(),
                locale: order.locale,
                currency: CURRENCY.to_string(),
                url_set: UrlSet {
                    success: order.success_url.clone(),
                    failure: order.cancel_url.clone(),
                    pending: String::new(),
                    notification: order.notify_url.clone(),
                },
                order_details: OrderDetailsPayload {
                    include_vat: "0".to_string(),
                    products: vec![self.products.clone()],
                },
            },
        })
    }

    /// Serializes the body that is hashed and sent.
    pub fn serialize_body(&mut self) -> Result<&str, ChannelError> {
        let body = serde_json::to_string(&self.generate_body()?)?;
        Ok(self.request_body.insert(body).as_str())
    }

    pub fn generate_hash(&mut self) -> Result<&str, ChannelError> {
        let timestamp = self.timestamp.clone().ok_or(ChannelError::MissingTimestamp)?;
        let body = self
            .request_body
            .clone()
            .ok_or(ChannelError::MissingRequestBody)?;

        let message = format!("{}{}{}{}", SERVICE_PROVIDER, timestamp, body, self.secret);
        let hash = hex_digest(Sha256, message.as_bytes());
        let signature = self.signature.insert(Signature {
            timestamp,
            body,
            hash,
        });
        Ok(signature.hash.as_str())
    }

    pub fn generate_headers(&self) -> Result<Vec<(String, String)>, ChannelError> {
        let signature = self.signature.as_ref().ok_or(ChannelError::NotSigned)?;
        if self.timestamp.as_deref() != Some(signature.timestamp.as_str())
            || self.request_body.as_deref() != Some(signature.body.as_str())
        {
            return Err(ChannelError::StaleSignature);
        }

        Ok(vec![
            ("Authorization".to_string(), signature.hash.clone()),
            ("X-TURKU-TS".to_string(), signature.timestamp.clone()),
            ("charset".to_string(), CHARSET.to_string()),
            ("X-TURKU-SP".to_string(), SERVICE_PROVIDER.to_string()),
            ("X-MERCHANT-ID".to_string(), self.merchant_id.clone()),
            ("X-TURKU-OID".to_string(), ANONYMOUS_ORDER_ID.to_string()),
        ])
    }

    /// Runs timestamp, body, hash and headers in order.
    pub fn prepare_request(&mut self) -> Result<SignedRequest, ChannelError> {
        let timestamp = self.generate_timestamp().to_string();
        let body = self.serialize_body()?.to_string();
        self.generate_hash()?;
        let headers = self.generate_headers()?;

        debug!(
            "TurkuOnline: signed request for order {:?} at {}",
            self.order.order_number, timestamp
        );
        Ok(SignedRequest {
            timestamp,
            body,
            headers,
        })
    }
}

impl PaymentChannel for TurkuOnlineChannel {
    fn name(&self) -> &'static str {
        "turku_online"
    }

    fn order_mut(&mut self) -> &mut OrderDetails {
        &mut self.order
    }

    fn add_product(
        &mut self,
        name: &str,
        code: &str,
        quantity: u32,
        unit_price_cents: i64,
        _vat_percent: f64,
        _product_type: ProductType,
    ) {
        let title = sanitize_product_name(title_pattern(), &coded_name(name, code));
        self.products.push(JsonProduct {
            title: truncate_chars(&title, MAX_TITLE_LENGTH),
            code: code.to_string(),
            sap_code: SAP_CODE.to_string(),
            amount: quantity,
            price: format_cents(unit_price_cents),
            vat: VAT.to_string(),
            discount: DISCOUNT.to_string(),
            product_type: PRODUCT_TYPE.to_string(),
        });
    }

    fn product_count(&self) -> usize {
        self.products.len()
    }

    /// `md5(order|timestamp|paid|method|secret)`, lowercase hex.
    fn validate_request(
        &self,
        order_number: &str,
        paid: &str,
        timestamp: &str,
        method: &str,
        auth_code: &str,
    ) -> bool {
        let response = format!(
            "{}|{}|{}|{}|{}",
            order_number, timestamp, paid, method, self.secret
        );
        hex_digest(Md5, response.as_bytes()) == auth_code
    }
}
