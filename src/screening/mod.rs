//! Screening orchestration: validation, last-payment resolution,
//! classification, ledger write-back and routing.

pub mod locks;
pub mod orchestrator;
pub mod validation;

pub use locks::PayerLocks;
pub use orchestrator::{
    PipelineStage, ProcessingFailure, ResolutionSource, ResolvedPayment, ScreeningOrchestrator,
    ScreeningReport,
};
pub use validation::validate;
