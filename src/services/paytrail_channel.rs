//! Legacy form-based channel payment gateway (E2 interface).
//!
//! The request is a flat list of form fields signed with
//! `AUTHCODE = upper(md5(secret|value1|value2|...))`, where the values are
//! taken in the exact order the fields were added.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::models::order::{Contact, Locale, OrderDetails, ProductType};
use crate::models::payment::FormFields;
use crate::services::channel::{coded_name, ChannelError, PaymentChannel, MAX_TITLE_LENGTH};
use crate::services::crypto::{upper_hex_digest, Md5};
use crate::utils::money::format_cents;
use crate::utils::text::{sanitize_product_name, truncate_chars};

const VERSION: &str = "1";
const AUTHCODE: &str = "AUTHCODE";

/// Characters the E2 interface does not accept in item titles.
const DISALLOWED_TITLE_CHARS: &str = r##"[^\p{L}\-0-9 "',()\[\]\{\}*/+_.:\&!?@\#\$£=;\~]+"##;

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DISALLOWED_TITLE_CHARS).expect("valid title pattern"))
}

pub struct PaytrailChannel {
    channel_id: String,
    secret: String,
    order: OrderDetails,
    contact: Contact,
    missing_contact_field: Option<String>,
    include_vat: u8,
    products: Vec<FormFields>,
}

impl PaytrailChannel {
    pub fn new(channel_id: &str, secret: &str, locale: &str) -> Result<Self, ChannelError> {
        let locale: Locale = locale.parse()?;
        Ok(Self {
            channel_id: channel_id.to_string(),
            secret: secret.to_string(),
            order: OrderDetails::new(locale),
            contact: Contact::default(),
            missing_contact_field: None,
            include_vat: 0,
            products: Vec::new(),
        })
    }

    /// Copies the contact fields. A missing key fails the form build later.
    pub fn set_contact(&mut self, contact: &HashMap<String, String>) {
        match Contact::from_map(contact) {
            Ok(contact) => {
                self.contact = contact;
                self.missing_contact_field = None;
            }
            Err(err) => {
                warn!("Paytrail: {}", err);
                if let ChannelError::MissingContactField(field) = err {
                    self.missing_contact_field = Some(field);
                }
            }
        }
    }

    /// Builds the signed form posted to the gateway.
    pub fn create_payment_form_data(&self) -> Result<FormFields, ChannelError> {
        let order_number = self.order.require_order_number()?;
        if self.products.is_empty() {
            return Err(ChannelError::NoProducts);
        }
        if let Some(field) = &self.missing_contact_field {
            return Err(ChannelError::MissingContactField(field.clone()));
        }

        let order = &self.order;
        let contact = &self.contact;
        let mut request = FormFields::new();
        request.push("CHANNEL_ID", self.channel_id.as_str());
        request.push("ORDER_NUMBER", order_number);
        request.push("CURRENCY", order.currency.as_str());
        request.push("RETURN_ADDRESS", order.success_url.as_str());
        request.push("CANCEL_ADDRESS", order.cancel_url.as_str());
        request.push("NOTIFY_ADDRESS", order.notify_url.as_str());
        request.push("VERSION", VERSION);
        request.push("CULTURE", order.locale.as_str());
        request.push("PRESELECTED_METHOD", "");
        request.push("CONTACT_TELNO", "");
        request.push("CONTACT_CELLNO", "");
        request.push("CONTACT_EMAIL", contact.email.as_str());
        request.push("CONTACT_FIRSTNAME", contact.first_name.as_str());
        request.push("CONTACT_LASTNAME", contact.last_name.as_str());
        request.push("CONTACT_COMPANY", "");
        request.push("CONTACT_ADDR_STREET", contact.street.as_str());
        request.push("CONTACT_ADDR_ZIP", contact.zip.as_str());
        request.push("CONTACT_ADDR_CITY", contact.city.as_str());
        request.push("CONTACT_ADDR_COUNTRY", contact.country.as_str());
        request.push("INCLUDE_VAT", self.include_vat.to_string());
        request.push("ITEMS", self.products.len().to_string());

        for product in &self.products {
            request.extend(product);
        }

        let auth_code = self.auth_code(&request);
        request.push(AUTHCODE, auth_code);

        debug!(
            "Paytrail: created form for order {} with {} items",
            order_number,
            self.products.len()
        );
        Ok(request)
    }

    /// `upper(md5(secret|v1|v2|...))` over the values in insertion order.
    pub fn auth_code(&self, fields: &FormFields) -> String {
        let message = std::iter::once(self.secret.as_str())
            .chain(fields.values())
            .collect::<Vec<_>>()
            .join("|");
        upper_hex_digest(Md5, message.as_bytes())
    }
}

impl PaymentChannel for PaytrailChannel {
    fn name(&self) -> &'static str {
        "paytrail"
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
        vat_percent: f64,
        _product_type: ProductType,
    ) {
        let index = self.products.len();
        let title = sanitize_product_name(title_pattern(), &coded_name(name, code));

        // Fields the channel does not use are sent empty
        let mut item = FormFields::new();
        item.push(format!("ITEM_TITLE[{index}]"), truncate_chars(&title, MAX_TITLE_LENGTH));
        item.push(format!("ITEM_NO[{index}]"), "");
        item.push(format!("ITEM_AMOUNT[{index}]"), quantity.to_string());
        item.push(format!("ITEM_PRICE[{index}]"), format_cents(unit_price_cents));
        item.push(format!("ITEM_TAX[{index}]"), vat_percent.to_string());
        item.push(format!("ITEM_MERCHANT_ID[{index}]"), code);
        item.push(format!("ITEM_CP[{index}]"), "1");
        item.push(format!("ITEM_DISCOUNT[{index}]"), "");
        item.push(format!("ITEM_TYPE[{index}]"), "");
        self.products.push(item);
    }

    fn product_count(&self) -> usize {
        self.products.len()
    }

    /// `status` is not part of the signed message.
    fn validate_request(
        &self,
        order_number: &str,
        payment_id: &str,
        timestamp: &str,
        _status: &str,
        auth_code: &str,
    ) -> bool {
        let response = format!("{}|{}|{}|{}", order_number, payment_id, timestamp, self.secret);
        upper_hex_digest(Md5, response.as_bytes()) == auth_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> PaytrailChannel {
        let mut channel = PaytrailChannel::new("1234", "s3cr3t", "fi_FI").unwrap();
        channel.set_order_number("1001");
        channel.set_urls("https://ok", "https://cancel", "https://notify");
        channel
    }

    fn contact_map() -> HashMap<String, String> {
        Contact::KEYS
            .iter()
            .map(|k| (k.to_string(), String::new()))
            .collect()
    }

    #[test]
    fn test_invalid_locale_is_rejected() {
        assert!(matches!(
            PaytrailChannel::new("1234", "s3cr3t", "de_DE"),
            Err(ChannelError::InvalidLocale(_))
        ));
    }

    #[test]
    fn test_form_requires_order_number_and_products() {
        let mut channel = PaytrailChannel::new("1234", "s3cr3t", "en_US").unwrap();
        channel.add_product("Fine", "", 1, 100, 0.0, ProductType::Normal);
        assert!(matches!(
            channel.create_payment_form_data(),
            Err(ChannelError::MissingOrderNumber)
        ));

        let channel = self::channel();
        assert!(matches!(
            channel.create_payment_form_data(),
            Err(ChannelError::NoProducts)
        ));
    }

    #[test]
    fn test_form_fields_and_authcode() {
        let mut channel = channel();
        channel.add_product("Overdue", "A1", 2, 150, 24.0, ProductType::Normal);

        let form = channel.create_payment_form_data().unwrap();
        assert_eq!(form.get("CHANNEL_ID"), Some("1234"));
        assert_eq!(form.get("VERSION"), Some("1"));
        assert_eq!(form.get("CULTURE"), Some("fi_FI"));
        assert_eq!(form.get("INCLUDE_VAT"), Some("0"));
        assert_eq!(form.get("ITEMS"), Some("1"));
        assert_eq!(form.get("ITEM_TITLE[0]"), Some("A1 Overdue"));
        assert_eq!(form.get("ITEM_AMOUNT[0]"), Some("2"));
        assert_eq!(form.get("ITEM_PRICE[0]"), Some("1.50"));
        assert_eq!(form.get("ITEM_TAX[0]"), Some("24"));
        assert_eq!(form.get("ITEM_MERCHANT_ID[0]"), Some("A1"));
        assert_eq!(form.get("ITEM_CP[0]"), Some("1"));

        let (last_name, last_value) = form.iter().last().unwrap();
        assert_eq!(last_name, "AUTHCODE");

        let mut values = vec!["s3cr3t"];
        values.extend(form.values().take(form.len() - 1));
        let expected = upper_hex_digest(Md5, values.join("|").as_bytes());
        assert_eq!(last_value, expected);
    }

    #[test]
    fn test_header_fields_come_first_in_declared_order() {
        let mut channel = channel();
        channel.add_product("Fine", "", 1, 100, 0.0, ProductType::Normal);
        let form = channel.create_payment_form_data().unwrap();
        let names: Vec<&str> = form.iter().map(|(n, _)| n).take(3).collect();
        assert_eq!(names, ["CHANNEL_ID", "ORDER_NUMBER", "CURRENCY"]);
        assert_eq!(form.len(), 21 + 9 + 1);
    }

    #[test]
    fn test_contact_fields_are_copied() {
        let mut channel = channel();
        let mut contact = contact_map();
        contact.insert("email".into(), "patron@example.org".into());
        contact.insert("city".into(), "Turku".into());
        channel.set_contact(&contact);
        channel.add_product("Fine", "", 1, 100, 0.0, ProductType::Normal);

        let form = channel.create_payment_form_data().unwrap();
        assert_eq!(form.get("CONTACT_EMAIL"), Some("patron@example.org"));
        assert_eq!(form.get("CONTACT_ADDR_CITY"), Some("Turku"));
        assert_eq!(form.get("CONTACT_COMPANY"), Some(""));
    }

    #[test]
    fn test_missing_contact_key_fails_build() {
        let mut channel = channel();
        let mut contact = contact_map();
        contact.remove("zip");
        channel.set_contact(&contact);
        channel.add_product("Fine", "", 1, 100, 0.0, ProductType::Normal);

        assert!(matches!(
            channel.create_payment_form_data(),
            Err(ChannelError::MissingContactField(f)) if f == "zip"
        ));
    }

    #[test]
    fn test_title_sanitization_and_truncation() {
        let mut channel = channel();
        channel.add_product("Bad\u{0}\u{7}name<>|", "", 1, 100, 0.0, ProductType::Normal);
        channel.add_product(&"ä".repeat(300), "", 1, 100, 0.0, ProductType::Normal);
        assert_eq!(channel.product_count(), 2);
        let form = channel.create_payment_form_data().unwrap();

        assert_eq!(form.get("ITEM_TITLE[0]"), Some("Bad name "));
        assert_eq!(form.get("ITEM_TITLE[1]").unwrap().chars().count(), 255);
    }

    #[test]
    fn test_validate_request_known_vector() {
        let channel = channel();
        let auth_code = "669C620E52C79094D057A1768A82C632";
        assert!(channel.validate_request("1001", "P1", "20240101", "PAID", auth_code));
        assert!(!channel.validate_request("1001", "P1", "20240102", "PAID", auth_code));
        assert!(!channel.validate_request(
            "1001",
            "P1",
            "20240101",
            "PAID",
            &auth_code.to_lowercase()
        ));
    }
}
