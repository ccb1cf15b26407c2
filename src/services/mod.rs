pub mod atomic_metrics;
pub mod channel;
pub mod crypto;
pub mod payment_processor_client;
pub mod payment_service;
pub mod paytrail_channel;
pub mod transaction_store;
pub mod turku_online;

pub use payment_processor_client::{PaymentProcessorClient, PaymentTransport, TransportError};
pub use payment_service::{PaymentService, ServiceError};
pub use transaction_store::TransactionStore;
