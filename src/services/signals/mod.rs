//! Trading signals service module.
//!
//! Provides technical indicator calculations, composite scoring,
//! and outcome tracking for emitted signals.

pub mod history;
pub mod indicators;
pub mod scoring;

pub use history::SignalHistory;
pub use indicators::{compute_snapshot, Indicator, IndicatorError};
pub use scoring::{ScoreBreakdown, ScoringEngine};
