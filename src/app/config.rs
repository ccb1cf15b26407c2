use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown payment handler '{0}'")]
    UnknownHandler(String),
    #[error("missing parameter {0}")]
    MissingParameter(&'static str),
}

/// Which gateway the handler talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Paytrail,
    TurkuOnline,
}

impl FromStr for HandlerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paytrail" => Ok(HandlerKind::Paytrail),
            "turku_online" => Ok(HandlerKind::TurkuOnline),
            other => Err(ConfigError::UnknownHandler(other.to_string())),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Paytrail => f.write_str("paytrail"),
            HandlerKind::TurkuOnline => f.write_str("turku_online"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_port: u16,
    pub handler: HandlerKind,
    /// Gateway endpoint: the form action or the REST URL.
    pub gateway_url: String,
    /// Channel id for the form gateway, merchant id for the REST gateway.
    pub merchant_id: String,
    pub secret: String,
    pub currency: String,
    /// Transaction fee in cents.
    pub transaction_fee: i64,
    pub product_code: Option<String>,
    pub transaction_fee_product_code: Option<String>,
    pub product_code_mappings: Option<String>,
    pub organization_product_code_mappings: Option<String>,
    /// Fines page the patron returns to.
    pub fines_url: String,
    /// Base URL of the notify endpoint.
    pub ajax_url: String,
    /// Query parameter carrying the payment status on callbacks.
    pub status_param: String,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 9999,
            handler: HandlerKind::Paytrail,
            gateway_url: "https://payment.paytrail.com/channel-payment".to_string(),
            merchant_id: String::new(),
            secret: String::new(),
            currency: "EUR".to_string(),
            transaction_fee: 0,
            product_code: None,
            transaction_fee_product_code: None,
            product_code_mappings: None,
            organization_product_code_mappings: None,
            fines_url: "http://localhost:9999/MyResearch/Fines".to_string(),
            ajax_url: "http://localhost:9999/AJAX".to_string(),
            status_param: "payment".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let optional = |name: &str| var(name).filter(|value| !value.is_empty());
        let handler = match optional("PAYMENT_HANDLER") {
            Some(value) => value.parse()?,
            None => defaults.handler,
        };

        let config = Self {
            server_port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            handler,
            gateway_url: var("PAYMENT_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            merchant_id: var("PAYMENT_MERCHANT_ID").unwrap_or(defaults.merchant_id),
            secret: var("PAYMENT_SECRET").unwrap_or(defaults.secret),
            currency: var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            transaction_fee: var("PAYMENT_TRANSACTION_FEE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.transaction_fee),
            product_code: optional("PAYMENT_PRODUCT_CODE"),
            transaction_fee_product_code: optional("PAYMENT_TRANSACTION_FEE_PRODUCT_CODE"),
            product_code_mappings: optional("PAYMENT_PRODUCT_CODE_MAPPINGS"),
            organization_product_code_mappings: optional(
                "PAYMENT_ORGANIZATION_PRODUCT_CODE_MAPPINGS",
            ),
            fines_url: var("FINES_URL").unwrap_or(defaults.fines_url),
            ajax_url: var("AJAX_URL").unwrap_or(defaults.ajax_url),
            status_param: var("PAYMENT_STATUS_PARAM").unwrap_or(defaults.status_param),
            request_timeout_ms: var("PAYMENT_REQUEST_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the TOML file when one is given, otherwise the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Both gateway credentials must be set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant_id.is_empty() {
            return Err(ConfigError::MissingParameter("merchant_id"));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::MissingParameter("secret"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
handler = "turku_online"
gateway_url = "https://gateway.example/api"
merchant_id = "TURKU"
secret = "s3cr3t"
transaction_fee = 50
product_code_mappings = "Overdue=100"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.handler, HandlerKind::TurkuOnline);
        assert_eq!(config.merchant_id, "TURKU");
        assert_eq!(config.transaction_fee, 50);
        assert_eq!(config.product_code_mappings.as_deref(), Some("Overdue=100"));
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.status_param, "payment");
        assert!(config.product_code.is_none());
    }

    #[test]
    fn test_from_file_requires_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"merchant_id = "13466""#).unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::MissingParameter("secret"))
        ));
    }

    #[test]
    fn test_default_config_is_not_usable() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::MissingParameter("merchant_id"))
        ));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_from_vars() {
        let config = Config::from_vars(vars(&[
            ("PAYMENT_HANDLER", "turku_online"),
            ("PAYMENT_MERCHANT_ID", "TURKU"),
            ("PAYMENT_SECRET", "s3cr3t"),
            ("PAYMENT_TRANSACTION_FEE", "50"),
            ("PAYMENT_PRODUCT_CODE", ""),
        ]))
        .unwrap();
        assert_eq!(config.handler, HandlerKind::TurkuOnline);
        assert_eq!(config.transaction_fee, 50);
        assert!(config.product_code.is_none());
        assert_eq!(config.server_port, 9999);
    }

    #[test]
    fn test_from_vars_rejects_unknown_handler() {
        let result = Config::from_vars(vars(&[
            ("PAYMENT_HANDLER", "turku-online"),
            ("PAYMENT_MERCHANT_ID", "TURKU"),
            ("PAYMENT_SECRET", "s3cr3t"),
        ]));
        assert!(matches!(result, Err(ConfigError::UnknownHandler(h)) if h == "turku-online"));
    }

    #[test]
    fn test_from_vars_requires_secret() {
        let result = Config::from_vars(vars(&[("PAYMENT_MERCHANT_ID", "13466")]));
        assert!(matches!(result, Err(ConfigError::MissingParameter("secret"))));
    }

    #[test]
    fn test_from_file_rejects_unknown_handler() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"handler = "cpu""#).unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_handler_kind_parsing() {
        assert_eq!("paytrail".parse::<HandlerKind>().unwrap(), HandlerKind::Paytrail);
        assert!("cpu".parse::<HandlerKind>().is_err());
    }
}
