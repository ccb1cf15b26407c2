//! Online payment channels for library fines.
//!
//! Two gateways are supported: a legacy form-based channel payment gateway
//! signed with an MD5 `AUTHCODE`, and a JSON/REST gateway signed with a
//! SHA-256 `Authorization` header. Around them sit the fines payment handler,
//! an in-memory transaction registry and the HTTP front end used by `main`.

pub mod app;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use app::config::{Config, HandlerKind};
pub use services::channel::{ChannelError, PaymentChannel};
pub use services::paytrail_channel::PaytrailChannel;
pub use services::turku_online::TurkuOnlineChannel;
