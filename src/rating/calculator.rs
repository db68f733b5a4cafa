//! Rating calculator trait
//!
//! This module defines the interface the history replayer folds matches
//! through, so the replay logic stays independent of the concrete formula.

use crate::types::{MatchOutcome, Rating};

/// Trait for calculating new ratings after a doubles match
pub trait RatingCalculator: Send + Sync {
    /// Compute the four post-match ratings
    ///
    /// # Arguments
    /// * `team_a` - Current ratings of the two team A players
    /// * `team_b` - Current ratings of the two team B players
    /// * `outcome` - Result of the match
    /// * `sets_won` - Sets won by team A and team B
    ///
    /// # Returns
    /// New ratings in participant order: team A first, then team B
    fn apply_match(
        &self,
        team_a: [Rating; 2],
        team_b: [Rating; 2],
        outcome: MatchOutcome,
        sets_won: (u32, u32),
    ) -> [Rating; 4];

    /// Rating every player starts from
    fn initial_rating(&self) -> Rating;
}
