//! Per-event screening state machine.
//!
//! `Received -> Validated -> Resolved -> Classified -> Persisted -> Routed`.
//! Every stage either hands its output to the next one or routes the event to
//! the suspicious channel. Only cache or ledger outages abort an event, as a
//! [`ProcessingFailure`], in which case nothing is published.

use crate::cache::{CacheError, LastPaymentCache};
use crate::classifier::VelocityClassifier;
use crate::config::AppConfig;
use crate::ledger::{LastPaymentLookup, LedgerClient, LedgerError, SaveOutcome};
use crate::metrics::PipelineMetrics;
use crate::producer::OutcomeSink;
use crate::screening::locks::PayerLocks;
use crate::screening::validation::validate;
use crate::types::outcome::{ScreeningResult, SuspicionReason, Verdict};
use crate::types::payment::{LastPaymentRecord, PaymentEvent, Sighting};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Infrastructure failure that aborts screening of one event.
///
/// The event should be redelivered; no verdict has been published for it.
#[derive(Debug, Error)]
pub enum ProcessingFailure {
    #[error("payment {payment_id}: {source}")]
    CacheUnavailable {
        payment_id: i64,
        source: CacheError,
    },
    #[error("payment {payment_id}: {source}")]
    UpstreamUnavailable {
        payment_id: i64,
        source: LedgerError,
    },
}

/// Furthest state an event reached before it was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Received,
    Validated,
    Resolved,
    Classified,
    Persisted,
}

/// Where the "last payment" used for the velocity check came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Fresh cache entry
    Cache,
    /// Ledger lookup
    Upstream,
    /// Stale cache entry used because the ledger was unavailable
    StaleCache,
}

/// Output of the resolve stage
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPayment {
    pub last: PaymentEvent,
    pub source: ResolutionSource,
    /// The cache must be refreshed if this event ends up stored upstream
    pub refresh_needed: bool,
}

/// A stage either passes its output on or settles the event as suspicious
#[derive(Debug)]
enum Step<T> {
    Next(T),
    Suspicious(SuspicionReason),
}

/// How a routed event was decided
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningReport {
    pub result: ScreeningResult,
    /// Set for every suspicious verdict
    pub reason: Option<SuspicionReason>,
    pub stage: PipelineStage,
    pub source: Option<ResolutionSource>,
}

impl ScreeningReport {
    fn trusted(event: PaymentEvent, source: ResolutionSource) -> Self {
        Self {
            result: ScreeningResult::trusted(event),
            reason: None,
            stage: PipelineStage::Persisted,
            source: Some(source),
        }
    }

    fn suspicious(
        event: PaymentEvent,
        reason: SuspicionReason,
        stage: PipelineStage,
        source: Option<ResolutionSource>,
    ) -> Self {
        Self {
            result: ScreeningResult::suspicious(event),
            reason: Some(reason),
            stage,
            source,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.result.verdict
    }
}

pub struct ScreeningOrchestrator {
    cache: LastPaymentCache,
    ledger: Arc<dyn LedgerClient>,
    classifier: VelocityClassifier,
    sink: Arc<dyn OutcomeSink>,
    metrics: Arc<PipelineMetrics>,
    min_card_length: usize,
    stale_fallback: bool,
    locks: Option<PayerLocks>,
}

impl ScreeningOrchestrator {
    pub fn new(
        cache: LastPaymentCache,
        ledger: Arc<dyn LedgerClient>,
        sink: Arc<dyn OutcomeSink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            cache,
            ledger,
            classifier: VelocityClassifier::default(),
            sink,
            metrics,
            min_card_length: 6,
            stale_fallback: false,
            locks: None,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        cache: LastPaymentCache,
        ledger: Arc<dyn LedgerClient>,
        sink: Arc<dyn OutcomeSink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let orchestrator = Self::new(cache, ledger, sink, metrics)
            .with_classifier(VelocityClassifier::new(config.screening.tiers.clone()))
            .with_min_card_length(config.screening.min_card_length)
            .with_stale_fallback(config.cache.stale_fallback);

        if config.pipeline.serialize_per_payer {
            orchestrator.with_payer_locks(config.pipeline.lock_shards)
        } else {
            orchestrator
        }
    }

    pub fn with_classifier(mut self, classifier: VelocityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_min_card_length(mut self, min_card_length: usize) -> Self {
        self.min_card_length = min_card_length;
        self
    }

    pub fn with_stale_fallback(mut self, stale_fallback: bool) -> Self {
        self.stale_fallback = stale_fallback;
        self
    }

    /// Serialize events for the same payer card between resolve and cache put
    pub fn with_payer_locks(mut self, shards: usize) -> Self {
        self.locks = Some(PayerLocks::new(shards));
        self
    }

    /// Screen one event and route the verdict.
    ///
    /// Exactly one result is emitted on success; none on failure.
    pub async fn process(&self, event: PaymentEvent) -> Result<ScreeningReport, ProcessingFailure> {
        let started = Instant::now();
        let payment_id = event.id;

        match self.screen_at(event, Utc::now()).await {
            Ok(report) => {
                self.route(&report);
                self.metrics
                    .record_routed(report.verdict(), report.reason, started.elapsed());
                Ok(report)
            }
            Err(failure) => {
                self.metrics.record_failure();
                error!(payment_id, error = %failure, "Screening aborted, no verdict published");
                Err(failure)
            }
        }
    }

    /// Run every stage up to, but not including, routing
    pub async fn screen_at(
        &self,
        event: PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<ScreeningReport, ProcessingFailure> {
        debug!(
            payment_id = event.id,
            payer_card = %event.payer_card,
            receiver_card = %event.receiver_card,
            latitude = event.location.latitude,
            longitude = event.location.longitude,
            occurred_at = %event.occurred_at,
            "Screening payment"
        );

        // Received -> Validated
        if let Err(reason) = validate(&event, now, self.min_card_length) {
            warn!(payment_id = event.id, reason = %reason, "Payment failed validation");
            return Ok(ScreeningReport::suspicious(
                event,
                reason,
                PipelineStage::Received,
                None,
            ));
        }

        let _guard = match &self.locks {
            Some(locks) => Some(locks.lock(&event.payer_card).await),
            None => None,
        };

        // Validated -> Resolved
        let resolved = match self.resolve(&event, now).await? {
            Step::Next(resolved) => resolved,
            Step::Suspicious(reason) => {
                warn!(payment_id = event.id, reason = %reason, "No usable last payment");
                return Ok(ScreeningReport::suspicious(
                    event,
                    reason,
                    PipelineStage::Validated,
                    None,
                ));
            }
        };

        // Resolved -> Classified
        let assessment = self
            .classifier
            .assess(Sighting::from(&resolved.last), Sighting::from(&event));
        if assessment.verdict == Verdict::Suspicious {
            warn!(
                payment_id = event.id,
                last_payment_id = resolved.last.id,
                distance_km = assessment.distance_km,
                elapsed_secs = assessment.elapsed.num_seconds(),
                "Implausible travel since last payment"
            );
            return Ok(ScreeningReport::suspicious(
                event,
                SuspicionReason::ImpossibleTravel,
                PipelineStage::Classified,
                Some(resolved.source),
            ));
        }

        // Classified -> Persisted
        match self.persist(&event, &resolved).await? {
            Step::Next(()) => Ok(ScreeningReport::trusted(event, resolved.source)),
            Step::Suspicious(reason) => {
                warn!(payment_id = event.id, reason = %reason, "Ledger refused trusted payment");
                Ok(ScreeningReport::suspicious(
                    event,
                    reason,
                    PipelineStage::Classified,
                    Some(resolved.source),
                ))
            }
        }
    }

    async fn resolve(
        &self,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Step<ResolvedPayment>, ProcessingFailure> {
        // A cache outage aborts before any ledger call
        let lookup = self
            .cache
            .resolve_at(&event.payer_card, now)
            .await
            .map_err(|source| ProcessingFailure::CacheUnavailable {
                payment_id: event.id,
                source,
            })?;

        if let Some(record) = lookup.fresh() {
            self.metrics.record_cache_hit();
            return Ok(Step::Next(ResolvedPayment {
                last: record.to_event(),
                source: ResolutionSource::Cache,
                refresh_needed: false,
            }));
        }

        if lookup.record.is_some() {
            self.metrics.record_cache_stale();
        } else {
            self.metrics.record_cache_miss();
        }

        match self.ledger.get_last_payment(&event.payer_card).await {
            Ok(LastPaymentLookup::Found(last)) => Ok(Step::Next(ResolvedPayment {
                last,
                source: ResolutionSource::Upstream,
                refresh_needed: true,
            })),
            Ok(LastPaymentLookup::NotFound) => Ok(Step::Suspicious(SuspicionReason::NoHistory)),
            Ok(LastPaymentLookup::Rejected(reason)) => {
                debug!(payment_id = event.id, reason = %reason, "Last payment lookup rejected");
                Ok(Step::Suspicious(SuspicionReason::LookupRejected))
            }
            Err(e) => match lookup.record {
                Some(stale) if self.stale_fallback => {
                    warn!(
                        payment_id = event.id,
                        error = %e,
                        cached_at = %stale.cached_at,
                        "Ledger unavailable, using stale cache entry"
                    );
                    Ok(Step::Next(ResolvedPayment {
                        last: stale.to_event(),
                        source: ResolutionSource::StaleCache,
                        refresh_needed: true,
                    }))
                }
                _ => Err(ProcessingFailure::UpstreamUnavailable {
                    payment_id: event.id,
                    source: e,
                }),
            },
        }
    }

    async fn persist(
        &self,
        event: &PaymentEvent,
        resolved: &ResolvedPayment,
    ) -> Result<Step<()>, ProcessingFailure> {
        let outcome = self.ledger.save_payment(event).await.map_err(|source| {
            ProcessingFailure::UpstreamUnavailable {
                payment_id: event.id,
                source,
            }
        })?;

        match outcome {
            SaveOutcome::Saved => {}
            SaveOutcome::Conflict(reason) => {
                debug!(payment_id = event.id, reason = %reason, "Payment already in ledger");
                return Ok(Step::Suspicious(SuspicionReason::DuplicatePayment));
            }
            SaveOutcome::InvalidInput(reason) => {
                debug!(payment_id = event.id, reason = %reason, "Ledger rejected payment");
                return Ok(Step::Suspicious(SuspicionReason::InvalidPayment));
            }
        }

        if resolved.refresh_needed {
            let record = LastPaymentRecord::from_event(event, Utc::now());
            self.cache
                .put(record)
                .await
                .map_err(|source| ProcessingFailure::CacheUnavailable {
                    payment_id: event.id,
                    source,
                })?;
        }

        Ok(Step::Next(()))
    }

    fn route(&self, report: &ScreeningReport) {
        let result = &report.result;
        let channel = result.channel();

        info!(
            payment_id = result.event.id,
            verdict = ?result.verdict,
            reason = report.reason.map(|r| r.as_str()).unwrap_or("none"),
            channel = ?channel,
            "Routing screened payment"
        );

        self.sink.emit(channel, result.clone());
    }
}
