use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::order::Locale;

/// Ordered `(name, value)` pairs of a form-encoded gateway request.
///
/// Insertion order is the order the values are signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn extend(&mut self, other: &FormFields) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the fields as an `application/x-www-form-urlencoded` body.
    pub fn to_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

/// Line item of the JSON gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonProduct {
    pub title: String,
    pub code: String,
    pub sap_code: String,
    pub amount: u32,
    pub price: String,
    pub vat: String,
    pub discount: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSet {
    pub success: String,
    pub failure: String,
    pub pending: String,
    pub notification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsPayload {
    pub include_vat: String,
    /// The gateway expects the product list wrapped in one more list.
    pub products: Vec<Vec<JsonProduct>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub order_number: String,
    pub locale: Locale,
    pub currency: String,
    pub url_set: UrlSet,
    pub order_details: OrderDetailsPayload,
}

/// JSON body posted to the REST gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestBody {
    pub payment: PaymentPayload,
}

/// A serialized body together with the headers that sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub timestamp: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

/// Successful answer of the REST gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub order_number: Option<String>,
    pub url: Option<String>,
}

/// Fine to be paid, as reported by the library system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    #[serde(rename = "fine", default)]
    pub fine_type: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub title: String,
    pub balance: i64,
}

/// Payment start request received from the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPaymentRequest {
    #[serde(rename = "patronId")]
    pub patron_id: String,
    pub driver: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub language: String,
    pub fines: Vec<Fine>,
}

/// How the patron continues to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentStart {
    /// Fields the browser posts to `action`.
    Form { action: String, fields: FormFields },
    /// Gateway page to redirect to.
    Redirect { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid {
        #[serde(rename = "transactionId")]
        transaction_id: String,
        amount: i64,
    },
    Cancelled,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TransactionState {
    InProgress,
    Paid,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub order_number: String,
    pub driver: String,
    pub patron_id: String,
    pub amount: i64,
    pub transaction_fee: i64,
    pub currency: String,
    pub fines: Vec<Fine>,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<String>,
}
