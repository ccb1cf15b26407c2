use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::app::config::{Config, HandlerKind};
use crate::models::order::{Locale, Product, ProductType};
use crate::models::payment::{
    Fine, PaymentOutcome, PaymentStart, StartPaymentRequest, Transaction, TransactionState,
};
use crate::services::atomic_metrics::AtomicMetrics;
use crate::services::channel::{ChannelError, PaymentChannel};
use crate::services::crypto::{hex_digest, Md5};
use crate::services::payment_processor_client::{PaymentTransport, TransportError};
use crate::services::paytrail_channel::PaytrailChannel;
use crate::services::transaction_store::TransactionStore;
use crate::services::turku_online::TurkuOnlineChannel;
use crate::utils::money::total_cents;
use crate::utils::text::{parse_code_mappings, split_patron_name, truncate_bytes};

pub const PAYMENT_SUCCESS: &str = "success";
pub const PAYMENT_FAILURE: &str = "failure";
pub const PAYMENT_NOTIFY: &str = "notify";

pub const TRANSACTION_FEE_NAME: &str = "Palvelumaksu / Serviceavgift / Transaction fee";
const MAX_PRODUCT_CODE_LENGTH: usize = 16;
const MAX_DESCRIPTION_LENGTH: usize = 255;

const PAYMENT_FAILED: &str = "online_payment_failed";
const ALREADY_PROCESSED: &str = "online_payment_transaction_already_processed_or_unknown";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid callback URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("no fines to pay")]
    NothingToPay,
    #[error("transaction {0} already exists")]
    DuplicateTransaction(String),
}

/// `md5("{patron_id}_{unix time with microseconds}")`, lowercase hex.
pub fn generate_transaction_id(patron_id: &str) -> String {
    let now = Utc::now();
    let microtime = format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros());
    hex_digest(Md5, format!("{}_{}", patron_id, microtime).as_bytes())
}

fn add_products(channel: &mut dyn PaymentChannel, products: &[Product]) {
    for product in products {
        channel.add_product(
            &product.name,
            &product.code,
            product.quantity,
            product.unit_price_cents,
            product.vat_percent,
            product.product_type,
        );
    }
}

pub struct PaymentService {
    config: Config,
    store: Arc<TransactionStore>,
    transport: Arc<dyn PaymentTransport>,
    metrics: Arc<AtomicMetrics>,
}

impl PaymentService {
    pub fn new(
        config: Config,
        store: Arc<TransactionStore>,
        transport: Arc<dyn PaymentTransport>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            metrics: Arc::new(AtomicMetrics::new()),
        }
    }

    pub fn transaction(&self, order_number: &str) -> Option<Transaction> {
        self.store.get(order_number)
    }

    /// Turns the patron's fines into a signed gateway request.
    pub async fn start_payment(
        &self,
        request: StartPaymentRequest,
    ) -> Result<PaymentStart, ServiceError> {
        if request.fines.is_empty() {
            return Err(ServiceError::NothingToPay);
        }

        let order_number = generate_transaction_id(&request.patron_id);
        let locale = Locale::from_language_tag(&request.language);
        let (success_url, cancel_url, notify_url) = self.callback_urls(&request.driver)?;
        let amount = total_cents(request.fines.iter().map(|fine| fine.balance), 0);
        let products = self.products(&request.fines);

        match self.config.handler {
            HandlerKind::Paytrail => {
                let mut channel = PaytrailChannel::new(
                    &self.config.merchant_id,
                    &self.config.secret,
                    locale.as_str(),
                )?;
                channel.set_urls(&success_url, &cancel_url, &notify_url);
                channel.set_order_number(&order_number);
                channel.set_currency(&self.config.currency);
                channel.set_contact(&Self::contact(&request));
                add_products(&mut channel, &products);

                let fields = channel.create_payment_form_data()?;
                self.register(&order_number, &request, amount)?;

                Ok(PaymentStart::Form {
                    action: self.config.gateway_url.clone(),
                    fields,
                })
            }
            HandlerKind::TurkuOnline => {
                let mut channel = TurkuOnlineChannel::new(
                    &self.config.merchant_id,
                    &self.config.secret,
                    locale.as_str(),
                )?;
                channel.set_urls(&success_url, &cancel_url, &notify_url);
                channel.set_order_number(&order_number);
                channel.set_currency(&self.config.currency);
                if self.uses_total_amount() {
                    channel.set_total_amount(total_cents([amount], self.config.transaction_fee));
                } else {
                    add_products(&mut channel, &products);
                }

                if let Err(e) = channel.generate_body() {
                    error!("TurkuOnline: error creating payment request body: {}", e);
                    return Err(e.into());
                }
                self.register(&order_number, &request, amount)?;

                let signed = channel.prepare_request()?;
                match self
                    .transport
                    .send_payment(&self.config.gateway_url, &signed)
                    .await
                {
                    Ok(url) => Ok(PaymentStart::Redirect { url }),
                    Err(e) => {
                        error!("TurkuOnline: payment request for {} failed: {}", order_number, e);
                        if self.store.set_failed(&order_number, &e.to_string()) {
                            self.metrics.increment_failed();
                        }
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Handles a return or notify callback.
    pub fn process_response(&self, params: &HashMap<String, String>) -> PaymentOutcome {
        let param = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();
        let status = param(&self.config.status_param);
        let order_number = param("ORDER_NUMBER");

        if !self.store.is_in_progress(order_number) {
            return Self::already_processed(order_number);
        }

        match status {
            PAYMENT_SUCCESS | PAYMENT_NOTIFY => {
                let channel = match self.validation_channel() {
                    Ok(channel) => channel,
                    Err(e) => {
                        error!("Payment channel init failed: {}", e);
                        return self.fail(order_number, "channel init failed");
                    }
                };

                let (payment_id, method) = match self.config.handler {
                    HandlerKind::Paytrail => (param("PAYMENT_ID"), param("STATUS")),
                    HandlerKind::TurkuOnline => (param("PAID"), param("METHOD")),
                };
                let timestamp = param("TIMESTAMP");

                if !channel.validate_request(
                    order_number,
                    payment_id,
                    timestamp,
                    method,
                    param("RETURN_AUTHCODE"),
                ) {
                    error!(
                        "{}: error processing response: invalid checksum for {}",
                        channel.name(),
                        order_number
                    );
                    return self.fail(order_number, "invalid checksum");
                }

                if !self.store.set_paid(order_number, timestamp) {
                    return Self::already_processed(order_number);
                }
                self.metrics.increment_paid();
                info!("Transaction {} paid", order_number);

                PaymentOutcome::Paid {
                    transaction_id: order_number.to_string(),
                    amount: self
                        .store
                        .get(order_number)
                        .map(|t| t.amount)
                        .unwrap_or_default(),
                }
            }
            PAYMENT_FAILURE => {
                if !self.store.set_cancelled(order_number) {
                    return Self::already_processed(order_number);
                }
                self.metrics.increment_cancelled();
                info!("Transaction {} cancelled", order_number);
                PaymentOutcome::Cancelled
            }
            other => self.fail(order_number, &format!("unknown status {}", other)),
        }
    }

    pub fn get_metrics(&self) -> serde_json::Value {
        serde_json::json!({
            "handler": self.config.handler.to_string(),
            "started": self.metrics.get_started(),
            "paid": self.metrics.get_paid(),
            "cancelled": self.metrics.get_cancelled(),
            "failed": self.metrics.get_failed(),
            "transactions": {
                "total": self.store.len(),
                "in_progress": self.store.count_in_state(&TransactionState::InProgress),
            }
        })
    }

    fn fail(&self, order_number: &str, reason: &str) -> PaymentOutcome {
        if !self.store.set_failed(order_number, reason) {
            return Self::already_processed(order_number);
        }
        self.metrics.increment_failed();
        PaymentOutcome::Failed {
            message: PAYMENT_FAILED.to_string(),
        }
    }

    fn already_processed(order_number: &str) -> PaymentOutcome {
        warn!(
            "Payment response for unknown or processed transaction '{}'",
            order_number
        );
        PaymentOutcome::Failed {
            message: ALREADY_PROCESSED.to_string(),
        }
    }

    fn validation_channel(&self) -> Result<Box<dyn PaymentChannel>, ChannelError> {
        let locale = Locale::FiFi.as_str();
        Ok(match self.config.handler {
            HandlerKind::Paytrail => Box::new(PaytrailChannel::new(
                &self.config.merchant_id,
                &self.config.secret,
                locale,
            )?),
            HandlerKind::TurkuOnline => Box::new(TurkuOnlineChannel::new(
                &self.config.merchant_id,
                &self.config.secret,
                locale,
            )?),
        })
    }

    fn register(
        &self,
        order_number: &str,
        request: &StartPaymentRequest,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let transaction = Transaction {
            order_number: order_number.to_string(),
            driver: request.driver.clone(),
            patron_id: request.patron_id.clone(),
            amount,
            transaction_fee: self.config.transaction_fee,
            currency: self.config.currency.clone(),
            fines: request.fines.clone(),
            state: TransactionState::InProgress,
            created_at: Utc::now(),
            paid_at: None,
        };
        if !self.store.create(transaction) {
            return Err(ServiceError::DuplicateTransaction(order_number.to_string()));
        }
        self.metrics.increment_started();
        Ok(())
    }

    fn callback_urls(&self, driver: &str) -> Result<(String, String, String), ServiceError> {
        let with_status = |base: &str, status: &str| -> Result<String, url::ParseError> {
            let mut url = Url::parse(base)?;
            url.query_pairs_mut()
                .append_pair("driver", driver)
                .append_pair(&self.config.status_param, status);
            Ok(url.into())
        };

        let notify_base = format!(
            "{}/onlinePaymentNotify",
            self.config.ajax_url.trim_end_matches('/')
        );
        Ok((
            with_status(&self.config.fines_url, PAYMENT_SUCCESS)?,
            with_status(&self.config.fines_url, PAYMENT_FAILURE)?,
            with_status(&notify_base, PAYMENT_NOTIFY)?,
        ))
    }

    fn contact(request: &StartPaymentRequest) -> HashMap<String, String> {
        let (firstname, lastname) = split_patron_name(&request.firstname, &request.lastname);
        [
            ("email", request.email.clone()),
            ("firstname", firstname),
            ("lastname", lastname),
            ("street", request.street.clone()),
            ("zip", request.zip.clone()),
            ("city", request.city.clone()),
            ("country", request.country.clone()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    /// Without any product code configured, but with both mapping tables set,
    /// the REST gateway is sent a total amount instead of line items.
    fn uses_total_amount(&self) -> bool {
        self.config.product_code.is_none()
            && self.config.transaction_fee_product_code.is_none()
            && self.config.product_code_mappings.is_some()
            && self.config.organization_product_code_mappings.is_some()
    }

    fn products(&self, fines: &[Fine]) -> Vec<Product> {
        let product_code = self.config.product_code.clone().unwrap_or_default();
        let mappings =
            parse_code_mappings(self.config.product_code_mappings.as_deref().unwrap_or_default());
        let organization_mappings = parse_code_mappings(
            self.config
                .organization_product_code_mappings
                .as_deref()
                .unwrap_or_default(),
        );

        let mut products: Vec<Product> = fines
            .iter()
            .map(|fine| {
                let mapped = mappings.get(&fine.fine_type);
                let mut code = match mapped {
                    Some(code) => code.clone(),
                    None if !product_code.is_empty() => product_code.clone(),
                    None => fine.fine_type.clone(),
                };
                if let Some(organization_code) = organization_mappings.get(&fine.organization) {
                    code = format!(
                        "{}{}",
                        organization_code,
                        mapped.map(String::as_str).unwrap_or_default()
                    );
                }

                let mut description = fine.fine_type.clone();
                if !fine.title.is_empty() {
                    let room = MAX_DESCRIPTION_LENGTH.saturating_sub(4 + description.len());
                    description = format!("{} ({})", description, truncate_bytes(&fine.title, room));
                }

                Product {
                    name: description,
                    code: truncate_bytes(&code, MAX_PRODUCT_CODE_LENGTH).to_string(),
                    quantity: 1,
                    unit_price_cents: fine.balance,
                    vat_percent: 0.0,
                    product_type: ProductType::Normal,
                }
            })
            .collect();

        if self.config.transaction_fee != 0 {
            let code = self
                .config
                .transaction_fee_product_code
                .clone()
                .unwrap_or(product_code);
            products.push(Product {
                name: TRANSACTION_FEE_NAME.to_string(),
                code: truncate_bytes(&code, MAX_PRODUCT_CODE_LENGTH).to_string(),
                quantity: 1,
                unit_price_cents: self.config.transaction_fee,
                vat_percent: 0.0,
                product_type: ProductType::Handling,
            });
        }

        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::SignedRequest;
    use async_trait::async_trait;

    struct NoTransport;

    #[async_trait]
    impl PaymentTransport for NoTransport {
        async fn send_payment(
            &self,
            _url: &str,
            _request: &SignedRequest,
        ) -> Result<String, TransportError> {
            Err(TransportError::Status(500))
        }
    }

    fn service(config: Config) -> PaymentService {
        PaymentService::new(config, Arc::new(TransactionStore::new()), Arc::new(NoTransport))
    }

    fn fine(fine_type: &str, organization: &str, title: &str, balance: i64) -> Fine {
        Fine {
            fine_type: fine_type.to_string(),
            organization: organization.to_string(),
            title: title.to_string(),
            balance,
        }
    }

    #[test]
    fn test_transaction_id_is_md5_hex() {
        let id = generate_transaction_id("patron");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_callback_urls_carry_driver_and_status() {
        let service = service(Config::default());
        let (success, cancel, notify) = service.callback_urls("Voyager").unwrap();
        assert_eq!(
            success,
            "http://localhost:9999/MyResearch/Fines?driver=Voyager&payment=success"
        );
        assert!(cancel.ends_with("payment=failure"));
        assert_eq!(
            notify,
            "http://localhost:9999/AJAX/onlinePaymentNotify?driver=Voyager&payment=notify"
        );
    }

    #[test]
    fn test_product_codes_and_descriptions() {
        let config = Config {
            product_code: Some("DEFAULT".to_string()),
            product_code_mappings: Some("Overdue=100".to_string()),
            organization_product_code_mappings: Some("lib2=ORG".to_string()),
            transaction_fee: 50,
            transaction_fee_product_code: Some("FEE".to_string()),
            ..Config::default()
        };
        let service = service(config);
        let products = service.products(&[
            fine("Overdue", "lib1", "Moby Dick", 100),
            fine("Lost", "lib1", "", 200),
            fine("Overdue", "lib2", "", 300),
            fine("Lost", "lib2", "", 400),
        ]);

        assert_eq!(products.len(), 5);
        assert_eq!(products[0].code, "100");
        assert_eq!(products[0].name, "Overdue (Moby Dick)");
        assert_eq!(products[1].code, "DEFAULT");
        assert_eq!(products[2].code, "ORG100");
        assert_eq!(products[3].code, "ORG");
        assert_eq!(products[4].code, "FEE");
        assert_eq!(products[4].name, TRANSACTION_FEE_NAME);
        assert_eq!(products[4].product_type, ProductType::Handling);
        assert_eq!(products[4].unit_price_cents, 50);
    }

    #[test]
    fn test_product_code_falls_back_to_fine_type_and_is_truncated() {
        let service = service(Config::default());
        let products = service.products(&[fine("AVeryLongFineTypeName", "", "", 100)]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].code, "AVeryLongFineTyp");
    }

    #[test]
    fn test_total_amount_mode() {
        let mut config = Config {
            product_code_mappings: Some("a=b".to_string()),
            organization_product_code_mappings: Some("c=d".to_string()),
            ..Config::default()
        };
        assert!(service(config.clone()).uses_total_amount());
        config.product_code = Some("X".to_string());
        assert!(!service(config).uses_total_amount());
    }

    #[test]
    fn test_response_for_unknown_transaction() {
        let service = service(Config::default());
        let params = HashMap::from([
            ("payment".to_string(), "success".to_string()),
            ("ORDER_NUMBER".to_string(), "nope".to_string()),
        ]);
        assert_eq!(
            service.process_response(&params),
            PaymentOutcome::Failed {
                message: ALREADY_PROCESSED.to_string()
            }
        );
    }
}
