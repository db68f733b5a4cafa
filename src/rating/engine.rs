//! Doubles rating formula
//!
//! Elo-style expectation between the two team averages, scaled per match by
//! how decisive the set score was and per player by how far they sit from
//! their team's average.

use crate::config::RatingConfig;
use crate::rating::calculator::RatingCalculator;
use crate::types::{MatchOutcome, PlayerId, Rating, RatingChange, Team};
use serde::{Deserialize, Serialize};

/// Logistic expectation of `rating_a` scoring against `rating_b`
pub fn expected_score(rating_a: Rating, rating_b: Rating) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) as f64 / 400.0))
}

/// Rounded mean of the two partners' ratings
pub fn team_rating(p1: Rating, p2: Rating) -> Rating {
    ((p1 + p2) as f64 / 2.0).round() as Rating
}

/// Multiplier from the set margin; closer matches move ratings less
pub fn result_factor(sets_won_a: u32, sets_won_b: u32) -> f64 {
    match sets_won_a.abs_diff(sets_won_b) {
        0 => 1.0,
        1 => 1.1,
        2 => 1.4,
        _ => 1.8,
    }
}

/// Per-player multiplier from the gap to the team average
///
/// The weaker partner swings more (capped at 1.8), the stronger one less
/// (floored at 0.5).
pub fn reward_factor(player_rating: Rating, team_rating: Rating) -> f64 {
    let gap = (team_rating - player_rating) as f64;
    if gap > 0.0 {
        (1.0 + (gap / 200.0) * 0.8).min(1.8)
    } else if gap < 0.0 {
        (1.0 + (gap / 200.0) * 0.5).max(0.5)
    } else {
        1.0
    }
}

/// Rounded rating change for one player
pub fn rating_delta(
    expected: f64,
    actual: f64,
    result_factor: f64,
    reward_factor: f64,
    k_factor: f64,
) -> Rating {
    (k_factor * (actual - expected) * result_factor * reward_factor).round() as Rating
}

/// Score credited to team A for an outcome (team B gets the complement)
pub fn actual_score(outcome: MatchOutcome) -> f64 {
    match outcome {
        MatchOutcome::TeamA => 1.0,
        MatchOutcome::TeamB => 0.0,
        MatchOutcome::Tie => 0.5,
    }
}

/// Rating engine applying the doubles formula under a `RatingConfig`
#[derive(Debug, Clone)]
pub struct DoublesRatingEngine {
    config: RatingConfig,
}

impl DoublesRatingEngine {
    /// Create a new engine, validating the configuration
    pub fn new(config: RatingConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn rating_config(&self) -> &RatingConfig {
        &self.config
    }

    /// Apply the rating floor
    pub fn clamp(&self, rating: Rating) -> Rating {
        rating.max(self.config.rating_floor)
    }

    /// Progression relative to the shared initial rating
    pub fn progression(&self, rating: Rating) -> Rating {
        rating - self.config.initial_rating
    }

    /// Predict win probabilities and the rating change for each plausible
    /// best-of-three result
    pub fn preview(
        &self,
        team_a: [(PlayerId, Rating); 2],
        team_b: [(PlayerId, Rating); 2],
    ) -> MatchPreview {
        let a_ratings = [team_a[0].1, team_a[1].1];
        let b_ratings = [team_b[0].1, team_b[1].1];
        let team_a_rating = team_rating(a_ratings[0], a_ratings[1]);
        let team_b_rating = team_rating(b_ratings[0], b_ratings[1]);
        let participants = [team_a[0], team_a[1], team_b[0], team_b[1]];

        let scenarios = [
            (Team::A, (2, 0)),
            (Team::A, (2, 1)),
            (Team::B, (1, 2)),
            (Team::B, (0, 2)),
        ]
        .into_iter()
        .map(|(winner, sets_won)| {
            let updated = self.apply_match(a_ratings, b_ratings, winner.into(), sets_won);
            PreviewScenario {
                winner,
                sets_won_a: sets_won.0,
                sets_won_b: sets_won.1,
                changes: participants
                    .iter()
                    .zip(updated)
                    .map(|(&(player_id, old_rating), new_rating)| RatingChange {
                        player_id,
                        old_rating,
                        new_rating,
                    })
                    .collect(),
            }
        })
        .collect();

        let team_a_win_probability = expected_score(team_a_rating, team_b_rating);
        MatchPreview {
            team_a_rating,
            team_b_rating,
            team_a_win_probability,
            team_b_win_probability: 1.0 - team_a_win_probability,
            scenarios,
        }
    }
}

impl Default for DoublesRatingEngine {
    fn default() -> Self {
        Self {
            config: RatingConfig::default(),
        }
    }
}

impl RatingCalculator for DoublesRatingEngine {
    fn apply_match(
        &self,
        team_a: [Rating; 2],
        team_b: [Rating; 2],
        outcome: MatchOutcome,
        sets_won: (u32, u32),
    ) -> [Rating; 4] {
        let rating_a = team_rating(team_a[0], team_a[1]);
        let rating_b = team_rating(team_b[0], team_b[1]);
        let expected_a = expected_score(rating_a, rating_b);
        let expected_b = expected_score(rating_b, rating_a);
        let actual_a = actual_score(outcome);
        let actual_b = 1.0 - actual_a;
        let factor = result_factor(sets_won.0, sets_won.1);
        let k = self.config.k_factor;

        let update = |current: Rating, team: Rating, expected: f64, actual: f64| {
            let delta = rating_delta(
                expected,
                actual,
                factor,
                reward_factor(current, team),
                k,
            );
            self.clamp(current + delta)
        };

        [
            update(team_a[0], rating_a, expected_a, actual_a),
            update(team_a[1], rating_a, expected_a, actual_a),
            update(team_b[0], rating_b, expected_b, actual_b),
            update(team_b[1], rating_b, expected_b, actual_b),
        ]
    }

    fn initial_rating(&self) -> Rating {
        self.config.initial_rating
    }
}

/// Predicted outcome table for a prospective match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPreview {
    pub team_a_rating: Rating,
    pub team_b_rating: Rating,
    pub team_a_win_probability: f64,
    pub team_b_win_probability: f64,
    pub scenarios: Vec<PreviewScenario>,
}

/// Rating changes if the match ends with the given set count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewScenario {
    pub winner: Team,
    pub sets_won_a: u32,
    pub sets_won_b: u32,
    pub changes: Vec<RatingChange>,
}
