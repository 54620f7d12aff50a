use super::{CacheError, CacheStore};
use crate::types::payment::LastPaymentRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local cache backend, used for local runs without Redis
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    inner: Arc<RwLock<HashMap<String, LastPaymentRecord>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, payer_card: &str) -> Result<Option<LastPaymentRecord>, CacheError> {
        Ok(self.inner.read().await.get(payer_card).cloned())
    }

    async fn set(&self, record: &LastPaymentRecord) -> Result<(), CacheError> {
        self.inner
            .write()
            .await
            .insert(record.payer_card.clone(), record.clone());
        Ok(())
    }
}
