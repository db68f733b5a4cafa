//! Immutable snapshot of derived ladder state
//!
//! A snapshot is built from one replay and replaced wholesale by the next.
//! Persisted form is a handful of JSON values under fixed keys; the
//! timestamp key is written last, so a snapshot without it is incomplete.

use crate::error::LadderError;
use crate::rating::{ReplayOutcome, SkippedMatch};
use crate::types::{
    Match, MatchFingerprint, MatchId, MatchRatingChanges, PlayerId, PlayerStats, RatingPoint,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived ladder state served to consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Player statistics in standings order
    pub players: Vec<PlayerStats>,
    /// Match log, newest first
    pub matches: Vec<Match>,
    pub histories: BTreeMap<PlayerId, Vec<RatingPoint>>,
    pub match_changes: BTreeMap<MatchId, MatchRatingChanges>,
    pub skipped: Vec<SkippedMatch>,
    pub created_at: DateTime<Utc>,
    /// Chronologically latest match at refill time
    pub latest_match: Option<MatchFingerprint>,
}

impl Snapshot {
    /// Build a snapshot from a replay of `matches`
    pub fn from_replay(
        replay: ReplayOutcome,
        mut matches: Vec<Match>,
        created_at: DateTime<Utc>,
    ) -> Self {
        matches.sort_by(|a, b| b.fingerprint().cmp(&a.fingerprint()));
        let latest_match = matches.first().map(Match::fingerprint);
        let players = replay.standings();

        Self {
            players,
            matches,
            histories: replay.histories,
            match_changes: replay.match_changes,
            skipped: replay.skipped,
            created_at,
            latest_match,
        }
    }

    /// Whether the snapshot is still within its time to live at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at < ttl
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerStats> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn history(&self, player_id: PlayerId) -> &[RatingPoint] {
        self.histories
            .get(&player_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn changes_for(&self, match_id: MatchId) -> Option<&MatchRatingChanges> {
        self.match_changes.get(&match_id)
    }
}

/// Keys a snapshot is persisted under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKeys {
    pub players: String,
    pub matches: String,
    pub latest_match: String,
    pub derived: String,
    pub timestamp: String,
}

impl SnapshotKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            players: format!("{}:players", prefix),
            matches: format!("{}:matches", prefix),
            latest_match: format!("{}:latest_match", prefix),
            derived: format!("{}:derived", prefix),
            timestamp: format!("{}:timestamp", prefix),
        }
    }

    /// Every key, timestamp last
    pub fn all(&self) -> [&str; 5] {
        [
            &self.players,
            &self.matches,
            &self.latest_match,
            &self.derived,
            &self.timestamp,
        ]
    }
}

#[derive(Serialize, Deserialize)]
struct DerivedState {
    histories: BTreeMap<PlayerId, Vec<RatingPoint>>,
    match_changes: BTreeMap<MatchId, MatchRatingChanges>,
    skipped: Vec<SkippedMatch>,
}

/// Raw persisted values, one per key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSnapshot {
    pub players: Option<String>,
    pub matches: Option<String>,
    pub latest_match: Option<String>,
    pub derived: Option<String>,
    pub timestamp: Option<String>,
}

fn encode_value<T: Serialize>(key: &str, value: &T) -> Result<String, LadderError> {
    serde_json::to_string(value)
        .map_err(|e| LadderError::persistence(format!("cannot encode {}: {}", key, e)))
}

fn decode_value<T: for<'de> Deserialize<'de>>(key: &str, raw: &str) -> Result<T, LadderError> {
    serde_json::from_str(raw)
        .map_err(|e| LadderError::persistence(format!("corrupt value under {}: {}", key, e)))
}

impl PersistedSnapshot {
    /// Encode a snapshot; entries come back in write order
    pub fn encode(
        snapshot: &Snapshot,
        keys: &SnapshotKeys,
    ) -> Result<Vec<(String, String)>, LadderError> {
        let derived = DerivedState {
            histories: snapshot.histories.clone(),
            match_changes: snapshot.match_changes.clone(),
            skipped: snapshot.skipped.clone(),
        };

        Ok(vec![
            (keys.players.clone(), encode_value(&keys.players, &snapshot.players)?),
            (keys.matches.clone(), encode_value(&keys.matches, &snapshot.matches)?),
            (
                keys.latest_match.clone(),
                encode_value(&keys.latest_match, &snapshot.latest_match)?,
            ),
            (keys.derived.clone(), encode_value(&keys.derived, &derived)?),
            (keys.timestamp.clone(), snapshot.created_at.to_rfc3339()),
        ])
    }

    /// Decode into a snapshot
    ///
    /// Returns `Ok(None)` when any entry is missing and a `Persistence` error
    /// when an entry cannot be parsed.
    pub fn decode(&self, keys: &SnapshotKeys) -> Result<Option<Snapshot>, LadderError> {
        let (Some(players), Some(matches), Some(latest_match), Some(derived), Some(timestamp)) = (
            &self.players,
            &self.matches,
            &self.latest_match,
            &self.derived,
            &self.timestamp,
        ) else {
            return Ok(None);
        };

        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                LadderError::persistence(format!("corrupt value under {}: {}", keys.timestamp, e))
            })?
            .with_timezone(&Utc);
        let derived: DerivedState = decode_value(&keys.derived, derived)?;

        Ok(Some(Snapshot {
            players: decode_value(&keys.players, players)?,
            matches: decode_value(&keys.matches, matches)?,
            histories: derived.histories,
            match_changes: derived.match_changes,
            skipped: derived.skipped,
            created_at,
            latest_match: decode_value(&keys.latest_match, latest_match)?,
        }))
    }
}
