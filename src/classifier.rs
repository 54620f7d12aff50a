//! Geo-velocity trust classification.
//!
//! A payment is suspicious when the payer would have had to cover an
//! implausible distance since their previous payment. Several tiers are
//! checked independently; any one of them firing marks the payment.

use crate::geo::distance_km;
use crate::types::outcome::Verdict;
use crate::types::payment::Sighting;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One implausible-travel rule: covering more than `min_distance_km`
/// within `max_elapsed_secs` (inclusive) is suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityTier {
    pub max_elapsed_secs: i64,
    pub min_distance_km: f64,
}

impl VelocityTier {
    pub const fn new(max_elapsed_secs: i64, min_distance_km: f64) -> Self {
        Self {
            max_elapsed_secs,
            min_distance_km,
        }
    }

    /// Whether this tier fires for the given elapsed time and distance.
    ///
    /// A window too large for `chrono::Duration` covers any elapsed time.
    pub fn triggers(&self, elapsed: Duration, distance_km: f64) -> bool {
        let within = match Duration::try_seconds(self.max_elapsed_secs) {
            Some(max) => elapsed <= max,
            None => self.max_elapsed_secs > 0,
        };
        within && distance_km > self.min_distance_km
    }
}

/// Default tier table: 10 000 km in an hour, 50 km in a minute, 1 km in a second.
pub fn default_tiers() -> Vec<VelocityTier> {
    vec![
        VelocityTier::new(60 * 60, 10_000.0),
        VelocityTier::new(60, 50.0),
        VelocityTier::new(1, 1.0),
    ]
}

/// Outcome of a velocity check with the numbers that led to it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityAssessment {
    pub verdict: Verdict,
    pub elapsed: Duration,
    pub distance_km: f64,
    /// First tier that fired, if any
    pub triggered: Option<VelocityTier>,
}

/// Pure classifier over a previous and a current payment sighting.
#[derive(Debug, Clone)]
pub struct VelocityClassifier {
    tiers: Vec<VelocityTier>,
}

impl VelocityClassifier {
    pub fn new(tiers: Vec<VelocityTier>) -> Self {
        Self { tiers }
    }

    pub fn evaluate(&self, last: Sighting, current: Sighting) -> Verdict {
        self.assess(last, current).verdict
    }

    pub fn assess(&self, last: Sighting, current: Sighting) -> VelocityAssessment {
        let elapsed = current.occurred_at - last.occurred_at;
        let distance = distance_km(last.location, current.location);

        let triggered = self
            .tiers
            .iter()
            .copied()
            .find(|tier| tier.triggers(elapsed, distance));

        let verdict = if triggered.is_some() {
            Verdict::Suspicious
        } else {
            Verdict::Trusted
        };

        debug!(
            elapsed_secs = elapsed.num_seconds(),
            distance_km = distance,
            verdict = ?verdict,
            "Velocity check evaluated"
        );

        VelocityAssessment {
            verdict,
            elapsed,
            distance_km: distance,
            triggered,
        }
    }

    pub fn tiers(&self) -> &[VelocityTier] {
        &self.tiers
    }
}

impl Default for VelocityClassifier {
    fn default() -> Self {
        Self::new(default_tiers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payment::GeoPoint;
    use chrono::{TimeZone, Utc};

    fn sighting(lat: f64, lon: f64, offset_secs: i64) -> Sighting {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Sighting {
            location: GeoPoint::new(lat, lon),
            occurred_at: base + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_far_payment_within_the_hour_is_suspicious() {
        let classifier = VelocityClassifier::default();
        let last = sighting(-20.0, 20.0, 0);
        let current = sighting(80.0, 80.0, 59 * 60);

        assert_eq!(classifier.evaluate(last, current), Verdict::Suspicious);
    }

    #[test]
    fn test_same_trip_after_two_hours_is_trusted() {
        let classifier = VelocityClassifier::default();
        let last = sighting(-20.0, 20.0, 0);
        let current = sighting(80.0, 80.0, 2 * 60 * 60);

        assert_eq!(classifier.evaluate(last, current), Verdict::Trusted);
    }

    #[test]
    fn test_instant_relocation_is_suspicious() {
        let classifier = VelocityClassifier::default();
        // ~2.2 km apart, half a second later
        let last = sighting(55.75, 37.61, 0);
        let current = Sighting {
            occurred_at: last.occurred_at + Duration::milliseconds(500),
            location: GeoPoint::new(55.77, 37.61),
        };

        let assessment = classifier.assess(last, current);
        assert_eq!(assessment.verdict, Verdict::Suspicious);
        assert_eq!(assessment.triggered, Some(VelocityTier::new(1, 1.0)));
    }

    #[test]
    fn test_minute_tier() {
        let classifier = VelocityClassifier::default();
        // Moscow to Tver is roughly 160 km
        let last = sighting(55.75, 37.61, 0);
        let current = sighting(56.86, 35.90, 45);

        assert_eq!(classifier.evaluate(last, current), Verdict::Suspicious);

        let later = sighting(56.86, 35.90, 61);
        assert_eq!(classifier.evaluate(last, later), Verdict::Trusted);
    }

    #[test]
    fn test_boundary_elapsed_is_inclusive() {
        let classifier = VelocityClassifier::default();
        let last = sighting(55.75, 37.61, 0);
        let exactly_one_minute = sighting(56.86, 35.90, 60);

        assert_eq!(
            classifier.evaluate(last, exactly_one_minute),
            Verdict::Suspicious
        );
    }

    #[test]
    fn test_long_gap_short_distance_is_trusted() {
        let classifier = VelocityClassifier::default();
        let last = sighting(55.75, 37.61, 0);

        for (lat, lon) in [(55.75, 37.61), (59.93, 30.36), (40.71, -74.0)] {
            let current = sighting(lat, lon, 60 * 60 + 1);
            assert_eq!(classifier.evaluate(last, current), Verdict::Trusted);
        }
    }

    #[test]
    fn test_same_place_is_always_trusted() {
        let classifier = VelocityClassifier::default();
        let last = sighting(55.75, 37.61, 0);
        let current = sighting(55.75, 37.61, 0);

        let assessment = classifier.assess(last, current);
        assert_eq!(assessment.verdict, Verdict::Trusted);
        assert_eq!(assessment.distance_km, 0.0);
        assert!(assessment.triggered.is_none());
    }

    #[test]
    fn test_oversized_window_does_not_panic() {
        let unbounded = VelocityTier::new(i64::MAX, 100.0);
        assert!(unbounded.triggers(Duration::days(365), 101.0));
        assert!(!unbounded.triggers(Duration::days(365), 99.0));

        let never = VelocityTier::new(i64::MIN, 100.0);
        assert!(!never.triggers(Duration::zero(), 101.0));
    }
}
