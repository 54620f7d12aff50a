//! Upstream ledger: the authoritative store of payments per payer card.
//!
//! Expected business answers (no history, duplicate, invalid input) come back
//! as variants; only infrastructure trouble is an `Err`.

pub mod http;

use crate::types::payment::PaymentEvent;
use async_trait::async_trait;
use thiserror::Error;

pub use self::http::HttpLedgerClient;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Answer to a last-payment lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LastPaymentLookup {
    Found(PaymentEvent),
    /// The payer has no payment on record
    NotFound,
    /// The ledger refused the lookup as a bad request
    Rejected(String),
}

/// Answer to a payment write
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved,
    /// The payment is already stored
    Conflict(String),
    InvalidInput(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_last_payment(&self, payer_card: &str) -> Result<LastPaymentLookup, LedgerError>;

    async fn save_payment(&self, payment: &PaymentEvent) -> Result<SaveOutcome, LedgerError>;
}
