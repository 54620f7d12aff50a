//! Configuration management for the payment screening pipeline

use crate::classifier::{default_tiers, VelocityTier};
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub cache: CacheConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject carrying incoming payment events
    pub payment_subject: String,
    /// Subject for payments judged trusted
    pub checked_subject: String,
    /// Subject for payments judged suspicious
    pub suspicious_subject: String,
    /// JetStream stream that captures the payment subject
    #[serde(default = "default_stream")]
    pub stream: String,
    /// Durable consumer name shared by all screening workers
    #[serde(default = "default_durable_name")]
    pub durable_name: String,
}

fn default_stream() -> String {
    "PAYMENTS".to_string()
}

fn default_durable_name() -> String {
    "payment-screening".to_string()
}

/// Last-payment cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL; when absent an in-process cache is used
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Redis hash holding one field per payer card
    #[serde(default = "default_hash_key")]
    pub hash_key: String,
    /// Entries older than this are refreshed from the ledger
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: i64,
    /// Use a stale entry when the ledger lookup is unavailable
    #[serde(default)]
    pub stale_fallback: bool,
}

fn default_hash_key() -> String {
    "Payment".to_string()
}

fn default_freshness_hours() -> i64 {
    24
}

/// Upstream ledger service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the payment ledger API
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_ledger_timeout_ms() -> u64 {
    2500
}

/// Screening rules
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScreeningConfig {
    /// Shorter payer or receiver card numbers are rejected outright
    #[serde(default = "default_min_card_length")]
    pub min_card_length: usize,
    /// Implausible-travel tiers, checked independently
    #[serde(default = "default_tiers")]
    pub tiers: Vec<VelocityTier>,
}

fn default_min_card_length() -> usize {
    6
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_card_length: default_min_card_length(),
            tiers: default_tiers(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of events screened concurrently
    pub workers: usize,
    /// Serialize events for the same payer card through a sharded lock
    #[serde(default)]
    pub serialize_per_payer: bool,
    /// Number of lock shards when `serialize_per_payer` is on
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,
}

fn default_lock_shards() -> usize {
    64
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Periodic metrics summary
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_report_interval_secs() -> u64 {
    30
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `SCREENING__*`
    /// environment variables taking precedence
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("SCREENING").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot represent or act on
    pub fn validate(&self) -> Result<()> {
        self.freshness()?;

        for tier in &self.screening.tiers {
            ensure!(
                tier.max_elapsed_secs >= 0
                    && chrono::Duration::try_seconds(tier.max_elapsed_secs).is_some(),
                "screening tier window of {}s is out of range",
                tier.max_elapsed_secs
            );
            ensure!(
                tier.min_distance_km.is_finite() && tier.min_distance_km >= 0.0,
                "screening tier distance {} km is out of range",
                tier.min_distance_km
            );
        }

        ensure!(self.pipeline.workers > 0, "pipeline.workers must be at least 1");
        Ok(())
    }

    /// Cache freshness window
    pub fn freshness(&self) -> Result<chrono::Duration> {
        let hours = self.cache.freshness_hours;
        ensure!(hours >= 0, "cache.freshness_hours must not be negative, got {}", hours);
        chrono::Duration::try_hours(hours)
            .with_context(|| format!("cache.freshness_hours of {} is out of range", hours))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                payment_subject: "payments".to_string(),
                checked_subject: "checked-payments".to_string(),
                suspicious_subject: "suspicious-payments".to_string(),
                stream: default_stream(),
                durable_name: default_durable_name(),
            },
            cache: CacheConfig {
                redis_url: Some("redis://127.0.0.1:6379/".to_string()),
                hash_key: default_hash_key(),
                freshness_hours: default_freshness_hours(),
                stale_fallback: false,
            },
            ledger: LedgerConfig {
                base_url: "http://localhost:8082/payment".to_string(),
                timeout_ms: default_ledger_timeout_ms(),
            },
            screening: ScreeningConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                serialize_per_payer: false,
                lock_shards: default_lock_shards(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            metrics: MetricsConfig::default(),
        }
    }
}
