use crate::types::outcome::SuspicionReason;
use crate::types::payment::PaymentEvent;
use chrono::{DateTime, Utc};

/// Structural sanity checks run before any lookup.
///
/// Card numbers are measured in characters. Coordinates must lie within
/// `[-90, 90]` / `[-180, 180]`. A payment dated exactly `now` is accepted;
/// anything later is rejected.
pub fn validate(
    event: &PaymentEvent,
    now: DateTime<Utc>,
    min_card_length: usize,
) -> Result<(), SuspicionReason> {
    if event.payer_card.chars().count() < min_card_length {
        return Err(SuspicionReason::MalformedCard);
    }
    if event.receiver_card.chars().count() < min_card_length {
        return Err(SuspicionReason::MalformedCard);
    }
    if !event.location.is_valid() {
        return Err(SuspicionReason::MalformedLocation);
    }
    if event.occurred_at > now {
        return Err(SuspicionReason::FutureDated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payment::GeoPoint;
    use chrono::Duration;

    fn event(payer: &str, receiver: &str, occurred_at: DateTime<Utc>) -> PaymentEvent {
        PaymentEvent::new(1, payer, receiver, GeoPoint::new(0.0, 0.0), occurred_at)
    }

    #[test]
    fn test_valid_event() {
        let now = Utc::now();
        assert_eq!(validate(&event("123456", "654321", now), now, 6), Ok(()));
    }

    #[test]
    fn test_short_cards_rejected() {
        let now = Utc::now();
        assert_eq!(
            validate(&event("fake", "654321", now), now, 6),
            Err(SuspicionReason::MalformedCard)
        );
        assert_eq!(
            validate(&event("123456", "12345", now), now, 6),
            Err(SuspicionReason::MalformedCard)
        );
        assert_eq!(
            validate(&event("", "", now), now, 6),
            Err(SuspicionReason::MalformedCard)
        );
    }

    #[test]
    fn test_future_dated_rejected() {
        let now = Utc::now();
        let ahead = now + Duration::milliseconds(1);
        assert_eq!(
            validate(&event("123456", "654321", ahead), now, 6),
            Err(SuspicionReason::FutureDated)
        );
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let now = Utc::now();
        for location in [
            GeoPoint::new(1000.0, 0.0),
            GeoPoint::new(-90.5, 0.0),
            GeoPoint::new(0.0, 180.5),
            GeoPoint::new(f64::NAN, 0.0),
            GeoPoint::new(0.0, f64::INFINITY),
        ] {
            let mut payment = event("123456", "654321", now);
            payment.location = location;
            assert_eq!(
                validate(&payment, now, 6),
                Err(SuspicionReason::MalformedLocation),
                "{:?}",
                location
            );
        }
    }

    #[test]
    fn test_range_edges_accepted() {
        let now = Utc::now();
        let mut payment = event("123456", "654321", now);
        payment.location = GeoPoint::new(-90.0, 180.0);
        assert_eq!(validate(&payment, now, 6), Ok(()));
    }

    #[test]
    fn test_card_length_counts_characters() {
        let now = Utc::now();
        // Six characters, twelve bytes
        assert_eq!(validate(&event("ДДДДДД", "654321", now), now, 6), Ok(()));
    }
}
