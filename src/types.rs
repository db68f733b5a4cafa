//! Common types used throughout the ladder service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for players
pub type PlayerId = i64;

/// Unique identifier for matches
pub type MatchId = i64;

/// Integer skill rating
pub type Rating = i32;

/// One side of a doubles match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Team::A => write!(f, "A"),
            Team::B => write!(f, "B"),
        }
    }
}

/// Outcome of a match as reported by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    #[serde(rename = "A")]
    TeamA,
    #[serde(rename = "B")]
    TeamB,
    Tie,
}

impl MatchOutcome {
    /// The winning team, if the match was decided
    pub fn winning_team(self) -> Option<Team> {
        match self {
            MatchOutcome::TeamA => Some(Team::A),
            MatchOutcome::TeamB => Some(Team::B),
            MatchOutcome::Tie => None,
        }
    }
}

impl From<Team> for MatchOutcome {
    fn from(team: Team) -> Self {
        match team {
            Team::A => MatchOutcome::TeamA,
            Team::B => MatchOutcome::TeamB,
        }
    }
}

/// Roster entry as served by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Games won by each team in a single set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub team_a: u8,
    pub team_b: u8,
}

impl SetScore {
    pub fn new(team_a: u8, team_b: u8) -> Self {
        Self { team_a, team_b }
    }

    /// Team that took the set; level sets count for neither side
    pub fn winner(&self) -> Option<Team> {
        match self.team_a.cmp(&self.team_b) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Maximum number of sets recorded per match
pub const MAX_SETS: usize = 3;

/// A recorded doubles match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub team_a: [PlayerId; 2],
    pub team_b: [PlayerId; 2],
    pub sets: Vec<SetScore>,
    #[serde(default)]
    pub winner: Option<MatchOutcome>,
}

impl Match {
    /// Build a match whose winner is derived from the set scores
    pub fn from_sets(
        id: MatchId,
        timestamp: DateTime<Utc>,
        team_a: [PlayerId; 2],
        team_b: [PlayerId; 2],
        sets: Vec<SetScore>,
    ) -> Self {
        let mut record = Self {
            id,
            timestamp,
            team_a,
            team_b,
            sets,
            winner: None,
        };
        record.winner = Some(record.outcome_from_sets());
        record
    }

    /// Sets won by team A and team B
    pub fn sets_won(&self) -> (u32, u32) {
        self.sets
            .iter()
            .fold((0, 0), |(a, b), set| match set.winner() {
                Some(Team::A) => (a + 1, b),
                Some(Team::B) => (a, b + 1),
                None => (a, b),
            })
    }

    /// Outcome implied by the set scores alone
    pub fn outcome_from_sets(&self) -> MatchOutcome {
        let (a, b) = self.sets_won();
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => MatchOutcome::TeamA,
            std::cmp::Ordering::Less => MatchOutcome::TeamB,
            std::cmp::Ordering::Equal => MatchOutcome::Tie,
        }
    }

    /// All four participants, team A first
    pub fn participants(&self) -> [PlayerId; 4] {
        [self.team_a[0], self.team_a[1], self.team_b[0], self.team_b[1]]
    }

    pub fn fingerprint(&self) -> MatchFingerprint {
        MatchFingerprint {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// Identity of the chronologically latest known match
///
/// Ordering is by timestamp, then id, matching the replay order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchFingerprint {
    pub timestamp: DateTime<Utc>,
    pub id: MatchId,
}

/// Derived statistics for a single player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub id: PlayerId,
    pub name: String,
    pub current_rating: Rating,
    pub wins: u32,
    pub losses: u32,
    pub progression: Rating,
}

impl PlayerStats {
    pub fn matches_played(&self) -> u32 {
        self.wins + self.losses
    }
}

/// Rating of a player right after a match was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub rating: Rating,
}

/// Rating change information for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: Rating,
    pub new_rating: Rating,
}

impl RatingChange {
    pub fn delta(&self) -> Rating {
        self.new_rating - self.old_rating
    }
}

/// The four rating changes produced by one applied match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRatingChanges {
    pub match_id: MatchId,
    pub changes: Vec<RatingChange>,
}

/// Which part of the snapshot a caller is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Players,
    Matches,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Players => "players",
            DataKind::Matches => "matches",
        }
    }
}

/// Cache state summary for consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub has_data: bool,
    pub is_valid: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub latest_match: Option<MatchFingerprint>,
    pub player_count: usize,
    pub match_count: usize,
    pub skipped_matches: usize,
    pub persistence_degraded: bool,
}
