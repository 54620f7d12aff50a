//! Performance metrics and statistics tracking for the screening pipeline.

use crate::types::outcome::{SuspicionReason, Verdict};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Events that reached a routed verdict
    pub events_routed: AtomicU64,
    /// Events routed to the checked channel
    pub trusted: AtomicU64,
    /// Events routed to the suspicious channel
    pub suspicious: AtomicU64,
    /// Events aborted by an infrastructure failure
    pub processing_failures: AtomicU64,
    /// Results the broker did not accept
    pub publish_failures: AtomicU64,
    /// Last payment served from a fresh cache entry
    pub cache_hits: AtomicU64,
    /// No cache entry for the payer
    pub cache_misses: AtomicU64,
    /// Cache entry present but past the freshness window
    pub cache_stale: AtomicU64,
    /// Suspicious verdicts by reason
    suspicious_by_reason: RwLock<HashMap<SuspicionReason, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            events_routed: AtomicU64::new(0),
            trusted: AtomicU64::new(0),
            suspicious: AtomicU64::new(0),
            processing_failures: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_stale: AtomicU64::new(0),
            suspicious_by_reason: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a routed event
    pub fn record_routed(
        &self,
        verdict: Verdict,
        reason: Option<SuspicionReason>,
        processing_time: Duration,
    ) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);

        match verdict {
            Verdict::Trusted => {
                self.trusted.fetch_add(1, Ordering::Relaxed);
            }
            Verdict::Suspicious => {
                self.suspicious.fetch_add(1, Ordering::Relaxed);
                if let Some(reason) = reason {
                    if let Ok(mut by_reason) = self.suspicious_by_reason.write() {
                        *by_reason.entry(reason).or_insert(0) += 1;
                    }
                }
            }
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn record_failure(&self) {
        self.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_stale(&self) {
        self.cache_stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (events per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.events_routed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get suspicious verdicts by reason
    pub fn get_suspicious_by_reason(&self) -> HashMap<SuspicionReason, u64> {
        self.suspicious_by_reason
            .read()
            .map(|by_reason| by_reason.clone())
            .unwrap_or_default()
    }

    /// Share of resolutions served from a fresh cache entry
    pub fn get_cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits
            + self.cache_misses.load(Ordering::Relaxed)
            + self.cache_stale.load(Ordering::Relaxed);
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let routed = self.events_routed.load(Ordering::Relaxed);
        let trusted = self.trusted.load(Ordering::Relaxed);
        let suspicious = self.suspicious.load(Ordering::Relaxed);
        let failures = self.processing_failures.load(Ordering::Relaxed);
        let publish_failures = self.publish_failures.load(Ordering::Relaxed);
        let suspicious_rate = if routed > 0 {
            (suspicious as f64 / routed as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();

        info!(
            routed,
            trusted,
            suspicious,
            suspicious_rate = format!("{:.1}%", suspicious_rate),
            processing_failures = failures,
            publish_failures,
            throughput = format!("{:.1} ev/s", self.get_throughput()),
            "Screening summary"
        );
        info!(
            hits = self.cache_hits.load(Ordering::Relaxed),
            misses = self.cache_misses.load(Ordering::Relaxed),
            stale = self.cache_stale.load(Ordering::Relaxed),
            hit_rate = format!("{:.1}%", self.get_cache_hit_rate() * 100.0),
            "Last-payment cache"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
        for (reason, count) in self.get_suspicious_by_reason() {
            info!(reason = %reason, count, "Suspicious verdicts");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_routed(Verdict::Trusted, None, Duration::from_micros(100));
        metrics.record_routed(
            Verdict::Suspicious,
            Some(SuspicionReason::ImpossibleTravel),
            Duration::from_micros(200),
        );
        metrics.record_routed(
            Verdict::Suspicious,
            Some(SuspicionReason::ImpossibleTravel),
            Duration::from_micros(300),
        );
        metrics.record_failure();

        assert_eq!(metrics.events_routed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.trusted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.suspicious.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.processing_failures.load(Ordering::Relaxed), 1);
        assert_eq!(
            metrics.get_suspicious_by_reason().get(&SuspicionReason::ImpossibleTravel),
            Some(&2)
        );

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_cache_hit_rate(), 0.0);

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_stale();

        assert!((metrics.get_cache_hit_rate() - 0.5).abs() < 1e-9);
    }
}
