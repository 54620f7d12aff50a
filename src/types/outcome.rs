//! Screening verdicts and the messages routed to the output channels

use crate::types::payment::{GeoPoint, PaymentEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust decision for a single payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Trusted,
    Suspicious,
}

impl Verdict {
    pub fn is_trusted(self) -> bool {
        matches!(self, Verdict::Trusted)
    }

    /// Output channel a payment with this verdict is routed to
    pub fn channel(self) -> OutcomeChannel {
        match self {
            Verdict::Trusted => OutcomeChannel::Checked,
            Verdict::Suspicious => OutcomeChannel::Suspicious,
        }
    }
}

/// Why a payment ended up on the suspicious channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionReason {
    /// Card number too short
    MalformedCard,
    /// Coordinates outside the latitude/longitude ranges
    MalformedLocation,
    /// Payment dated after processing time
    FutureDated,
    /// Ledger has no prior payment for the payer
    NoHistory,
    /// Ledger refused the last-payment lookup as a bad request
    LookupRejected,
    /// Implausible travel between the last and current payment
    ImpossibleTravel,
    /// Ledger already holds this payment
    DuplicatePayment,
    /// Ledger refused the payment as invalid
    InvalidPayment,
}

impl SuspicionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuspicionReason::MalformedCard => "malformed_card",
            SuspicionReason::MalformedLocation => "malformed_location",
            SuspicionReason::FutureDated => "future_dated",
            SuspicionReason::NoHistory => "no_history",
            SuspicionReason::LookupRejected => "lookup_rejected",
            SuspicionReason::ImpossibleTravel => "impossible_travel",
            SuspicionReason::DuplicatePayment => "duplicate_payment",
            SuspicionReason::InvalidPayment => "invalid_payment",
        }
    }
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical output destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeChannel {
    /// "checked-payments"
    Checked,
    /// "suspicious-payments"
    Suspicious,
}

/// The only artifact handed to the outcome publisher
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningResult {
    pub event: PaymentEvent,
    pub verdict: Verdict,
}

impl ScreeningResult {
    pub fn trusted(event: PaymentEvent) -> Self {
        Self {
            event,
            verdict: Verdict::Trusted,
        }
    }

    pub fn suspicious(event: PaymentEvent) -> Self {
        Self {
            event,
            verdict: Verdict::Suspicious,
        }
    }

    pub fn channel(&self) -> OutcomeChannel {
        self.verdict.channel()
    }

    /// Message key on the output channel
    pub fn key(&self) -> String {
        self.event.id.to_string()
    }
}

/// Wire form of a screening result on the output channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub id: i64,
    pub payer_card_number: String,
    pub receiver_card_number: String,
    pub coordinates: GeoPoint,
    pub date: DateTime<Utc>,
    pub trusted: bool,
}

impl From<&ScreeningResult> for PaymentOutcome {
    fn from(result: &ScreeningResult) -> Self {
        let event = &result.event;
        Self {
            id: event.id,
            payer_card_number: event.payer_card.clone(),
            receiver_card_number: event.receiver_card.clone(),
            coordinates: event.location,
            date: event.occurred_at,
            trusted: result.verdict.is_trusted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_channel() {
        assert_eq!(Verdict::Trusted.channel(), OutcomeChannel::Checked);
        assert_eq!(Verdict::Suspicious.channel(), OutcomeChannel::Suspicious);
    }

    #[test]
    fn test_outcome_message_fields() {
        let event = PaymentEvent::new(
            99,
            "123456",
            "654321",
            GeoPoint::new(10.0, 20.0),
            Utc::now(),
        );
        let result = ScreeningResult::trusted(event);

        let value = serde_json::to_value(PaymentOutcome::from(&result)).unwrap();

        assert_eq!(value["id"], 99);
        assert_eq!(value["payerCardNumber"], "123456");
        assert_eq!(value["receiverCardNumber"], "654321");
        assert_eq!(value["coordinates"]["latitude"], 10.0);
        assert_eq!(value["trusted"], true);
        assert_eq!(result.key(), "99");
    }
}
