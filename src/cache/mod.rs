//! Cache-aside store of each payer's last known payment.
//!
//! Freshness is computed here from the stored `cached_at` stamp rather than by
//! backend expiry, so a stale entry stays readable as an explicit fallback.

pub mod memory;
pub mod store_redis;

use crate::types::payment::LastPaymentRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub use self::memory::InMemoryCacheStore;
pub use self::store_redis::RedisCacheStore;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or answered with an error
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    /// An entry exists but could not be decoded
    #[error("corrupt cache entry for payer card {card}: {reason}")]
    Corrupt { card: String, reason: String },
}

/// Raw key-value backend keyed by payer card
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, payer_card: &str) -> Result<Option<LastPaymentRecord>, CacheError>;

    /// Overwrite whatever is stored for `record.payer_card`
    async fn set(&self, record: &LastPaymentRecord) -> Result<(), CacheError>;
}

/// What the cache knows about a payer
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub record: Option<LastPaymentRecord>,
    /// Always true when `record` is absent
    pub is_stale: bool,
}

impl CacheLookup {
    /// The record, if present and still within the freshness window
    pub fn fresh(&self) -> Option<&LastPaymentRecord> {
        if self.is_stale {
            None
        } else {
            self.record.as_ref()
        }
    }
}

#[derive(Clone)]
pub struct LastPaymentCache {
    store: Arc<dyn CacheStore>,
    freshness: Duration,
}

impl LastPaymentCache {
    pub fn new(store: Arc<dyn CacheStore>, freshness: Duration) -> Self {
        Self { store, freshness }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub async fn resolve(&self, payer_card: &str) -> Result<CacheLookup, CacheError> {
        self.resolve_at(payer_card, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        payer_card: &str,
        now: DateTime<Utc>,
    ) -> Result<CacheLookup, CacheError> {
        let record = match self.store.get(payer_card).await {
            Ok(record) => record,
            // An undecodable entry is superseded by the next refresh
            Err(e @ CacheError::Corrupt { .. }) => {
                warn!(payer_card = %payer_card, error = %e, "Ignoring corrupt cache entry");
                None
            }
            Err(e) => return Err(e),
        };
        let is_stale = match &record {
            Some(record) => is_stale(record, now, self.freshness),
            None => true,
        };

        debug!(
            payer_card = %payer_card,
            present = record.is_some(),
            is_stale,
            "Resolved cached last payment"
        );

        Ok(CacheLookup { record, is_stale })
    }

    pub async fn put(&self, record: LastPaymentRecord) -> Result<(), CacheError> {
        self.store.set(&record).await?;
        debug!(
            payer_card = %record.payer_card,
            payment_id = record.payment_id,
            cached_at = %record.cached_at,
            "Cached last payment"
        );
        Ok(())
    }
}

/// A record is stale once more than `freshness` has passed since it was cached.
pub fn is_stale(record: &LastPaymentRecord, now: DateTime<Utc>, freshness: Duration) -> bool {
    now - record.cached_at > freshness
}
