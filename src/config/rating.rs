//! Rating system configuration

use crate::types::Rating;
use serde::{Deserialize, Serialize};

/// Parameters of the doubles rating formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating every player starts from; progression is measured against it
    pub initial_rating: Rating,
    /// Lowest rating a player can ever hold
    pub rating_floor: Rating,
    /// Base sensitivity scaling all deltas
    pub k_factor: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1200,
            rating_floor: 100,
            k_factor: 48.0,
        }
    }
}

impl RatingConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.k_factor <= 0.0 || !self.k_factor.is_finite() {
            return Err(crate::error::LadderError::ConfigurationError {
                message: "K factor must be a positive number".to_string(),
            }
            .into());
        }

        if self.rating_floor < 0 {
            return Err(crate::error::LadderError::ConfigurationError {
                message: "Rating floor cannot be negative".to_string(),
            }
            .into());
        }

        if self.initial_rating < self.rating_floor {
            return Err(crate::error::LadderError::ConfigurationError {
                message: format!(
                    "Initial rating {} is below the rating floor {}",
                    self.initial_rating, self.rating_floor
                ),
            }
            .into());
        }

        Ok(())
    }
}
