//! Payment Screening Pipeline Library
//!
//! Screens card payments for implausible travel between consecutive
//! payments of the same payer, using a last-payment cache in front of the
//! payment ledger, and routes every payment to a checked or suspicious
//! subject.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod consumer;
pub mod geo;
pub mod ledger;
pub mod metrics;
pub mod producer;
pub mod screening;
pub mod types;

pub use cache::LastPaymentCache;
pub use classifier::VelocityClassifier;
pub use config::AppConfig;
pub use consumer::PaymentConsumer;
pub use producer::OutcomePublisher;
pub use screening::ScreeningOrchestrator;
pub use types::{outcome::ScreeningResult, payment::PaymentEvent};
