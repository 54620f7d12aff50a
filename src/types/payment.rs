//! Payment event data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic coordinates of a payment terminal or device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, range `[-90, 90]`
    pub latitude: f64,
    /// Longitude in degrees, range `[-180, 180]`
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates finite and within their degree ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A card payment delivered on the input channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// Payment identifier assigned by the upstream source
    pub id: i64,

    /// Card number of the payer
    #[serde(rename = "payerCardNumber")]
    pub payer_card: String,

    /// Card number of the receiver
    #[serde(rename = "receiverCardNumber")]
    pub receiver_card: String,

    /// Where the payment happened
    #[serde(rename = "coordinates")]
    pub location: GeoPoint,

    /// When the payment happened
    #[serde(rename = "date", alias = "occurredAt")]
    pub occurred_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new(
        id: i64,
        payer_card: impl Into<String>,
        receiver_card: impl Into<String>,
        location: GeoPoint,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payer_card: payer_card.into(),
            receiver_card: receiver_card.into(),
            location,
            occurred_at,
        }
    }
}

/// The part of a payment the velocity check looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub location: GeoPoint,
    pub occurred_at: DateTime<Utc>,
}

impl From<&PaymentEvent> for Sighting {
    fn from(event: &PaymentEvent) -> Self {
        Self {
            location: event.location,
            occurred_at: event.occurred_at,
        }
    }
}

/// Most recently observed payment for a payer card.
///
/// This is both what the ledger returns for a last-payment lookup and what the
/// cache stores, one entry per payer card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastPaymentRecord {
    pub payer_card: String,
    pub payment_id: i64,
    pub receiver_card: String,
    pub location: GeoPoint,
    pub payment_at: DateTime<Utc>,
    /// Wall-clock time of the write that created or refreshed this entry
    pub cached_at: DateTime<Utc>,
}

impl LastPaymentRecord {
    /// Build a cache entry from a screened payment, stamped with `cached_at`.
    pub fn from_event(event: &PaymentEvent, cached_at: DateTime<Utc>) -> Self {
        Self {
            payer_card: event.payer_card.clone(),
            payment_id: event.id,
            receiver_card: event.receiver_card.clone(),
            location: event.location,
            payment_at: event.occurred_at,
            cached_at,
        }
    }

    /// The cached payment as the ledger would have described it
    pub fn to_event(&self) -> PaymentEvent {
        PaymentEvent {
            id: self.payment_id,
            payer_card: self.payer_card.clone(),
            receiver_card: self.receiver_card.clone(),
            location: self.location,
            occurred_at: self.payment_at,
        }
    }
}
