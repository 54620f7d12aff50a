//! Test Payment Producer
//!
//! Generates and publishes test payment events to NATS for pipeline testing.
//! Each payer card gets a home location; a share of the payments jump to the
//! far side of the globe seconds after the previous one.

use async_nats::HeaderMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Coordinates in the pipeline's wire format
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Coordinates {
    latitude: f64,
    longitude: f64,
}

/// Payment structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payment {
    id: i64,
    payer_card_number: String,
    receiver_card_number: String,
    coordinates: Coordinates,
    date: DateTime<Utc>,
}

struct PaymentGenerator {
    rng: rand::rngs::ThreadRng,
    next_id: i64,
    clock: DateTime<Utc>,
    homes: HashMap<String, Coordinates>,
    cards: Vec<String>,
}

impl PaymentGenerator {
    fn new(card_count: usize) -> Self {
        let mut rng = rand::thread_rng();
        let cards: Vec<String> = (0..card_count.max(1))
            .map(|_| format!("{:016}", rng.gen_range(4_000_000_000_000_000u64..5_000_000_000_000_000)))
            .collect();
        let homes = cards
            .iter()
            .map(|card| {
                let home = Coordinates {
                    latitude: rng.gen_range(-60.0..60.0),
                    longitude: rng.gen_range(-170.0..170.0),
                };
                (card.clone(), home)
            })
            .collect();

        Self {
            rng,
            next_id: Utc::now().timestamp_millis(),
            // Start in the past so no generated payment is future-dated
            clock: Utc::now() - ChronoDuration::days(7),
            homes,
            cards,
        }
    }

    fn next_payment(&mut self, location: Coordinates, payer: String, gap_secs: i64) -> Payment {
        self.next_id += 1;
        self.clock += ChronoDuration::seconds(gap_secs);
        Payment {
            id: self.next_id,
            payer_card_number: payer,
            receiver_card_number: self.random_card(),
            coordinates: location,
            date: self.clock,
        }
    }

    /// Payment within a few kilometres of the payer's home, minutes later
    fn generate_legitimate(&mut self) -> Payment {
        let payer = self.random_payer();
        let home = self.homes[&payer];
        let location = Coordinates {
            latitude: (home.latitude + self.rng.gen_range(-0.05..0.05)).clamp(-90.0, 90.0),
            longitude: (home.longitude + self.rng.gen_range(-0.05..0.05)).clamp(-180.0, 180.0),
        };
        let gap = self.rng.gen_range(120..600);
        self.next_payment(location, payer, gap)
    }

    /// Payment on the opposite side of the globe, seconds after the last one
    fn generate_impossible_travel(&mut self) -> Payment {
        let payer = self.random_payer();
        let home = self.homes[&payer];
        let location = Coordinates {
            latitude: -home.latitude,
            longitude: if home.longitude > 0.0 {
                home.longitude - 180.0
            } else {
                home.longitude + 180.0
            },
        };
        let gap = self.rng.gen_range(1..60);
        self.next_payment(location, payer, gap)
    }

    fn random_payer(&mut self) -> String {
        self.cards[self.rng.gen_range(0..self.cards.len())].clone()
    }

    fn random_card(&mut self) -> String {
        format!("{:016}", self.rng.gen_range(5_000_000_000_000_000u64..6_000_000_000_000_000))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Payment Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("payments");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let travel_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let cards: usize = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(20);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        travel_rate = travel_rate,
        delay_ms = delay_ms,
        cards = cards,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, travel_rate, delay_ms, cards).await;
        }
    };

    let mut generator = PaymentGenerator::new(cards);
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} payments...", count);

    let mut local_count = 0;
    let mut travel_count = 0;

    for i in 0..count {
        let payment = if rng.gen_bool(travel_rate.clamp(0.0, 1.0)) {
            travel_count += 1;
            generator.generate_impossible_travel()
        } else {
            local_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&payment)?;
        let mut headers = HeaderMap::new();
        headers.insert("Message-Key", payment.payer_card_number.as_str());

        client
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} payments ({} local, {} impossible travel)",
                i + 1,
                count,
                local_count,
                travel_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;

    info!(
        "Completed! Published {} payments ({} local, {} impossible travel)",
        count, local_count, travel_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, travel_rate: f64, delay_ms: u64, cards: usize) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = PaymentGenerator::new(cards);
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let payment = if rng.gen_bool(travel_rate.clamp(0.0, 1.0)) {
            generator.generate_impossible_travel()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&payment)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample payment {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
