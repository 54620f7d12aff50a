//! In-process fakes for the cache backend, the ledger and the output sink
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use payment_screening_pipeline::cache::{CacheError, CacheStore, InMemoryCacheStore, LastPaymentCache};
use payment_screening_pipeline::ledger::{LastPaymentLookup, LedgerClient, LedgerError, SaveOutcome};
use payment_screening_pipeline::metrics::PipelineMetrics;
use payment_screening_pipeline::producer::OutcomeSink;
use payment_screening_pipeline::screening::ScreeningOrchestrator;
use payment_screening_pipeline::types::outcome::{OutcomeChannel, ScreeningResult};
use payment_screening_pipeline::types::payment::{GeoPoint, LastPaymentRecord, PaymentEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PAYER: &str = "123456";
pub const RECEIVER: &str = "654321";

pub fn payment(id: i64, location: GeoPoint, occurred_at: DateTime<Utc>) -> PaymentEvent {
    PaymentEvent::new(id, PAYER, RECEIVER, location, occurred_at)
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

#[derive(Default)]
struct LedgerState {
    last: HashMap<String, PaymentEvent>,
    saved: HashSet<i64>,
}

/// Ledger double keeping the last payment per payer card.
///
/// A successful save becomes the payer's last payment; saving an id twice is a
/// conflict.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    lookups: AtomicUsize,
    saves: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_saves: AtomicBool,
    reject_lookups: AtomicBool,
    reject_saves: AtomicBool,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that already holds `last` for its payer
    pub fn with_last(last: PaymentEvent) -> Self {
        let ledger = Self::default();
        {
            let mut state = ledger.state.lock().unwrap();
            state.saved.insert(last.id);
            state.last.insert(last.payer_card.clone(), last);
        }
        ledger
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn reject_lookups(&self, reject: bool) {
        self.reject_lookups.store(reject, Ordering::SeqCst);
    }

    pub fn reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn is_saved(&self, id: i64) -> bool {
        self.state.lock().unwrap().saved.contains(&id)
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn get_last_payment(&self, payer_card: &str) -> Result<LastPaymentLookup, LedgerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        if self.reject_lookups.load(Ordering::SeqCst) {
            return Ok(LastPaymentLookup::Rejected("payerCardNumber: invalid".to_string()));
        }

        Ok(match self.state.lock().unwrap().last.get(payer_card) {
            Some(last) => LastPaymentLookup::Found(last.clone()),
            None => LastPaymentLookup::NotFound,
        })
    }

    async fn save_payment(&self, payment: &PaymentEvent) -> Result<SaveOutcome, LedgerError> {
        self.saves.fetch_add(1, Ordering::SeqCst);

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        if self.reject_saves.load(Ordering::SeqCst) {
            return Ok(SaveOutcome::InvalidInput("coordinates: out of range".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        if !state.saved.insert(payment.id) {
            return Ok(SaveOutcome::Conflict(format!("payment {} already exists", payment.id)));
        }
        state.last.insert(payment.payer_card.clone(), payment.clone());
        Ok(SaveOutcome::Saved)
    }
}

/// Cache backend that counts trait calls and can be told to fail
#[derive(Default)]
pub struct CountingCacheStore {
    inner: InMemoryCacheStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl CountingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record without counting it as a pipeline write
    pub async fn seed(&self, record: LastPaymentRecord) {
        self.inner.set(&record).await.unwrap();
    }

    pub async fn entry(&self, payer_card: &str) -> Option<LastPaymentRecord> {
        self.inner.get(payer_card).await.unwrap()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingCacheStore {
    async fn get(&self, payer_card: &str) -> Result<Option<LastPaymentRecord>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection reset".to_string()));
        }
        self.inner.get(payer_card).await
    }

    async fn set(&self, record: &LastPaymentRecord) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection reset".to_string()));
        }
        self.inner.set(record).await
    }
}

/// Sink that keeps every emitted result in order
#[derive(Default)]
pub struct RecordingSink {
    emitted: Mutex<Vec<(OutcomeChannel, ScreeningResult)>>,
}

impl RecordingSink {
    pub fn emitted(&self) -> Vec<(OutcomeChannel, ScreeningResult)> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn on(&self, channel: OutcomeChannel) -> Vec<ScreeningResult> {
        self.emitted()
            .into_iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, result)| result)
            .collect()
    }
}

impl OutcomeSink for RecordingSink {
    fn emit(&self, channel: OutcomeChannel, result: ScreeningResult) {
        self.emitted.lock().unwrap().push((channel, result));
    }
}

/// Everything a screening test needs to inspect afterwards
pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<CountingCacheStore>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<PipelineMetrics>,
}

impl Harness {
    pub fn new(ledger: FakeLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            store: Arc::new(CountingCacheStore::new()),
            sink: Arc::new(RecordingSink::default()),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Orchestrator with the default 24h freshness window and tiers
    pub fn orchestrator(&self) -> ScreeningOrchestrator {
        let cache = LastPaymentCache::new(self.store.clone(), Duration::hours(24));
        ScreeningOrchestrator::new(
            cache,
            self.ledger.clone(),
            self.sink.clone(),
            self.metrics.clone(),
        )
    }
}
