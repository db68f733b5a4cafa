//! Doubles rating system
//!
//! This module provides the rating formula, the calculator interface it is
//! exposed through, and the history replay that rebuilds ratings from the
//! full match log.

pub mod calculator;
pub mod engine;
pub mod replay;

// Re-export commonly used types
pub use calculator::RatingCalculator;
pub use engine::{DoublesRatingEngine, MatchPreview, PreviewScenario};
pub use replay::{HistoryReplayer, ReplayOutcome, SkipReason, SkippedMatch};
