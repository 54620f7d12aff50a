use super::{CacheError, CacheStore};
use crate::types::payment::LastPaymentRecord;
use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Last-payment entries kept as fields of a single Redis hash, one field per
/// payer card. No TTL is set on the hash: staleness is judged from `cached_at`.
#[derive(Clone)]
pub struct RedisCacheStore {
    pub client: redis::Client,
    pub hash_key: String,
}

impl RedisCacheStore {
    pub fn new(redis_url: &str, hash_key: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            hash_key: hash_key.to_string(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, payer_card: &str) -> Result<Option<LastPaymentRecord>, CacheError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .hget(&self.hash_key, payer_card)
            .await
            .map_err(unavailable)?;

        match payload {
            Some(payload) => serde_json::from_str::<LastPaymentRecord>(&payload)
                .map(Some)
                .map_err(|e| CacheError::Corrupt {
                    card: payer_card.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &LastPaymentRecord) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record).map_err(|e| CacheError::Corrupt {
            card: record.payer_card.clone(),
            reason: e.to_string(),
        })?;

        let mut conn = self.connection().await?;
        let _: () = conn
            .hset(&self.hash_key, &record.payer_card, payload)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
