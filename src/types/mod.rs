//! Type definitions for the payment screening pipeline

pub mod outcome;
pub mod payment;

pub use outcome::{OutcomeChannel, PaymentOutcome, ScreeningResult, SuspicionReason, Verdict};
pub use payment::{GeoPoint, LastPaymentRecord, PaymentEvent, Sighting};
