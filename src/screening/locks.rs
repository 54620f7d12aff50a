use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Sharded mutex keyed by payer card.
///
/// Holding the guard across resolve and cache put serializes events for the
/// same card. Unrelated cards that land on the same shard also wait.
pub struct PayerLocks {
    shards: Vec<Mutex<()>>,
}

impl PayerLocks {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, payer_card: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        payer_card.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub async fn lock(&self, payer_card: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(payer_card)].lock().await
    }
}
