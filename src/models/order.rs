use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::services::channel::ChannelError;

/// Locales accepted by both payment gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "fi_FI")]
    FiFi,
    #[serde(rename = "sv_SE")]
    SvSe,
    #[serde(rename = "en_US")]
    EnUs,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::FiFi => "fi_FI",
            Locale::SvSe => "sv_SE",
            Locale::EnUs => "en_US",
        }
    }

    /// Maps a UI language tag such as `sv` or `en-gb` to a gateway locale,
    /// falling back to Finnish.
    pub fn from_language_tag(tag: &str) -> Self {
        match tag.split('-').next().unwrap_or_default() {
            "sv" => Locale::SvSe,
            "en" => Locale::EnUs,
            _ => Locale::FiFi,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fi_FI" => Ok(Locale::FiFi),
            "sv_SE" => Ok(Locale::SvSe),
            "en_US" => Ok(Locale::EnUs),
            other => Err(ChannelError::InvalidLocale(other.to_string())),
        }
    }
}

/// Payment type of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Normal = 1,
    Handling = 2,
}

/// One line item, before a channel turns it into wire fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub code: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub vat_percent: f64,
    pub product_type: ProductType,
}

/// Order-level state shared by both channels.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order_number: Option<String>,
    pub currency: String,
    pub locale: Locale,
    pub success_url: String,
    pub cancel_url: String,
    pub notify_url: String,
    pub total_amount: Option<i64>,
}

impl OrderDetails {
    pub fn new(locale: Locale) -> Self {
        Self {
            order_number: None,
            currency: "EUR".to_string(),
            locale,
            success_url: String::new(),
            cancel_url: String::new(),
            notify_url: String::new(),
            total_amount: None,
        }
    }

    pub fn require_order_number(&self) -> Result<&str, ChannelError> {
        self.order_number
            .as_deref()
            .ok_or(ChannelError::MissingOrderNumber)
    }
}

/// Billing contact sent with legacy channel payments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: String,
}

impl Contact {
    pub const KEYS: [&'static str; 7] = [
        "email",
        "firstname",
        "lastname",
        "street",
        "zip",
        "city",
        "country",
    ];

    /// Builds a contact from its map form. Every key in [`Contact::KEYS`] must
    /// be present, values are copied as-is.
    pub fn from_map(contact: &HashMap<String, String>) -> Result<Self, ChannelError> {
        let get = |key: &str| {
            contact
                .get(key)
                .cloned()
                .ok_or_else(|| ChannelError::MissingContactField(key.to_string()))
        };

        Ok(Self {
            email: get("email")?,
            first_name: get("firstname")?,
            last_name: get("lastname")?,
            street: get("street")?,
            zip: get("zip")?,
            city: get("city")?,
            country: get("country")?,
        })
    }
}
