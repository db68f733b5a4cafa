//! History replay
//!
//! Rebuilds every player's rating, record and rating history from the full
//! match log. The log is sorted by (timestamp, id) before folding, so the
//! output depends only on the sets of players and matches handed in.

use crate::error::LadderError;
use crate::rating::calculator::RatingCalculator;
use crate::types::{
    Match, MatchId, MatchOutcome, MatchRatingChanges, PlayerId, PlayerRecord, PlayerStats, Rating,
    RatingChange, RatingPoint, Team, MAX_SETS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a match was left out of the replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// No winner was recorded
    MissingWinner,
    /// The match was recorded as a tie
    Undecided,
    /// A participant id is not on the roster
    UnknownPlayer { player_id: PlayerId },
    /// The same player appears twice among the four participants
    DuplicateParticipant { player_id: PlayerId },
    /// More set scores than a best-of-three allows
    TooManySets { count: usize },
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::MissingWinner => "missing_winner",
            SkipReason::Undecided => "undecided",
            SkipReason::UnknownPlayer { .. } => "unknown_player",
            SkipReason::DuplicateParticipant { .. } => "duplicate_participant",
            SkipReason::TooManySets { .. } => "too_many_sets",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingWinner => write!(f, "no winner recorded"),
            SkipReason::Undecided => write!(f, "match recorded as a tie"),
            SkipReason::UnknownPlayer { player_id } => {
                write!(f, "references unknown player {}", player_id)
            }
            SkipReason::DuplicateParticipant { player_id } => {
                write!(f, "player {} appears more than once", player_id)
            }
            SkipReason::TooManySets { count } => {
                write!(f, "{} sets recorded, at most {} allowed", count, MAX_SETS)
            }
        }
    }
}

/// A match excluded from the fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMatch {
    pub match_id: MatchId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl From<&SkippedMatch> for LadderError {
    fn from(skipped: &SkippedMatch) -> Self {
        LadderError::DataIntegrity {
            match_id: skipped.match_id,
            reason: skipped.reason.to_string(),
        }
    }
}

/// Everything derived from one replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// Final statistics keyed by player id
    pub records: BTreeMap<PlayerId, PlayerStats>,
    /// Rating after every applied match, per player, oldest first
    pub histories: BTreeMap<PlayerId, Vec<RatingPoint>>,
    /// Rating changes of every applied match, keyed by match id
    pub match_changes: BTreeMap<MatchId, MatchRatingChanges>,
    /// Matches left out of the fold, in replay order
    pub skipped: Vec<SkippedMatch>,
}

impl ReplayOutcome {
    /// Player statistics ordered by rating (highest first), then id
    pub fn standings(&self) -> Vec<PlayerStats> {
        let mut standings: Vec<PlayerStats> = self.records.values().cloned().collect();
        standings.sort_by(|a, b| {
            b.current_rating
                .cmp(&a.current_rating)
                .then_with(|| a.id.cmp(&b.id))
        });
        standings
    }

    pub fn applied_count(&self) -> usize {
        self.match_changes.len()
    }
}

struct WorkingRecord {
    rating: Rating,
    wins: u32,
    losses: u32,
}

/// Folds the match log through a rating calculator
pub struct HistoryReplayer {
    calculator: Arc<dyn RatingCalculator>,
}

impl HistoryReplayer {
    /// Create a replayer over the given calculator
    pub fn new(calculator: Arc<dyn RatingCalculator>) -> Self {
        Self { calculator }
    }

    /// Replay the full history from a cold start
    ///
    /// Fails only when ids are not unique, since the result could then depend
    /// on input order. Malformed matches are skipped and reported.
    pub fn replay(
        &self,
        players: &[PlayerRecord],
        matches: &[Match],
    ) -> crate::error::Result<ReplayOutcome> {
        let initial = self.calculator.initial_rating();

        let mut table: HashMap<PlayerId, WorkingRecord> = HashMap::with_capacity(players.len());
        for player in players {
            let previous = table.insert(
                player.id,
                WorkingRecord {
                    rating: initial,
                    wins: 0,
                    losses: 0,
                },
            );
            if previous.is_some() {
                return Err(LadderError::ReplayFailed {
                    reason: format!(
                        "player id {} appears more than once in the roster",
                        player.id
                    ),
                }
                .into());
            }
        }

        let mut ordered: Vec<&Match> = matches.iter().collect();
        ordered.sort_by_key(|m| (m.timestamp, m.id));
        let mut seen_ids = HashSet::with_capacity(ordered.len());
        if let Some(duplicate) = ordered.iter().find(|m| !seen_ids.insert(m.id)) {
            return Err(LadderError::ReplayFailed {
                reason: format!("match id {} appears more than once", duplicate.id),
            }
            .into());
        }

        let mut outcome = ReplayOutcome::default();

        for m in ordered {
            let winner = match self.check_match(m, &table) {
                Ok(winner) => winner,
                Err(reason) => {
                    let skipped = SkippedMatch {
                        match_id: m.id,
                        reason,
                    };
                    warn!("Skipping match: {}", LadderError::from(&skipped));
                    outcome.skipped.push(skipped);
                    continue;
                }
            };

            let ids = m.participants();
            let current = ids.map(|id| table.get(&id).map(|r| r.rating).unwrap_or(initial));
            let updated = self.calculator.apply_match(
                [current[0], current[1]],
                [current[2], current[3]],
                MatchOutcome::from(winner),
                m.sets_won(),
            );

            let mut changes = Vec::with_capacity(4);
            for (slot, &player_id) in ids.iter().enumerate() {
                let on_winning_side = match winner {
                    Team::A => slot < 2,
                    Team::B => slot >= 2,
                };
                if let Some(record) = table.get_mut(&player_id) {
                    record.rating = updated[slot];
                    if on_winning_side {
                        record.wins += 1;
                    } else {
                        record.losses += 1;
                    }
                }
                changes.push(RatingChange {
                    player_id,
                    old_rating: current[slot],
                    new_rating: updated[slot],
                });
                outcome
                    .histories
                    .entry(player_id)
                    .or_default()
                    .push(RatingPoint {
                        match_id: m.id,
                        timestamp: m.timestamp,
                        rating: updated[slot],
                    });
            }

            debug!("Applied match {} (winner {})", m.id, winner);
            outcome.match_changes.insert(
                m.id,
                MatchRatingChanges {
                    match_id: m.id,
                    changes,
                },
            );
        }

        for player in players {
            if let Some(record) = table.get(&player.id) {
                outcome.records.insert(
                    player.id,
                    PlayerStats {
                        id: player.id,
                        name: player.name.clone(),
                        current_rating: record.rating,
                        wins: record.wins,
                        losses: record.losses,
                        progression: record.rating - initial,
                    },
                );
            }
        }

        info!(
            "Replayed {} matches for {} players ({} skipped)",
            outcome.applied_count(),
            outcome.records.len(),
            outcome.skipped.len()
        );

        Ok(outcome)
    }

    fn check_match(
        &self,
        m: &Match,
        table: &HashMap<PlayerId, WorkingRecord>,
    ) -> Result<Team, SkipReason> {
        let winner = match m.winner {
            None => return Err(SkipReason::MissingWinner),
            Some(outcome) => outcome.winning_team().ok_or(SkipReason::Undecided)?,
        };

        if m.sets.len() > MAX_SETS {
            return Err(SkipReason::TooManySets {
                count: m.sets.len(),
            });
        }

        let ids = m.participants();
        for (i, player_id) in ids.iter().enumerate() {
            if !table.contains_key(player_id) {
                return Err(SkipReason::UnknownPlayer {
                    player_id: *player_id,
                });
            }
            if ids[..i].contains(player_id) {
                return Err(SkipReason::DuplicateParticipant {
                    player_id: *player_id,
                });
            }
        }

        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::engine::DoublesRatingEngine;
    use crate::types::SetScore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn replayer() -> HistoryReplayer {
        HistoryReplayer::new(Arc::new(DoublesRatingEngine::default()))
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn roster() -> Vec<PlayerRecord> {
        vec![
            PlayerRecord::new(1, "Ana"),
            PlayerRecord::new(2, "Bruno"),
            PlayerRecord::new(3, "Carla"),
            PlayerRecord::new(4, "Duarte"),
            PlayerRecord::new(5, "Eva"),
            PlayerRecord::new(6, "Filipe"),
        ]
    }

    fn played(
        id: MatchId,
        minutes: i64,
        team_a: [PlayerId; 2],
        team_b: [PlayerId; 2],
        sets: &[(u8, u8)],
    ) -> Match {
        Match::from_sets(
            id,
            base_time() + Duration::minutes(minutes),
            team_a,
            team_b,
            sets.iter().map(|&(a, b)| SetScore::new(a, b)).collect(),
        )
    }

    fn season() -> Vec<Match> {
        vec![
            played(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)]),
            played(2, 30, [1, 3], [5, 6], &[(4, 6), (6, 4), (7, 5)]),
            played(3, 60, [2, 4], [5, 6], &[(2, 6), (3, 6)]),
            played(4, 90, [1, 5], [2, 6], &[(6, 1), (6, 0)]),
            played(5, 120, [3, 4], [1, 2], &[(7, 6), (4, 6), (6, 4)]),
            played(6, 150, [5, 6], [1, 4], &[(6, 3), (6, 4)]),
        ]
    }

    #[test]
    fn test_single_sweep_worked_example() {
        let matches = vec![played(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)])];
        let outcome = replayer().replay(&roster()[..4], &matches).unwrap();

        for id in [1, 2] {
            let stats = &outcome.records[&id];
            assert_eq!(stats.current_rating, 1234);
            assert_eq!(stats.wins, 1);
            assert_eq!(stats.losses, 0);
            assert_eq!(stats.progression, 34);
        }
        for id in [3, 4] {
            let stats = &outcome.records[&id];
            assert_eq!(stats.current_rating, 1166);
            assert_eq!(stats.wins, 0);
            assert_eq!(stats.losses, 1);
            assert_eq!(stats.progression, -34);
        }
    }

    #[test]
    fn test_ratings_compound_across_matches() {
        let matches = vec![
            played(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)]),
            played(2, 10, [1, 2], [3, 4], &[(6, 2), (6, 3)]),
        ];
        let outcome = replayer().replay(&roster()[..4], &matches).unwrap();

        // Second match starts from 1234 vs 1166, so the favourites gain less
        let first = &outcome.match_changes[&1];
        let second = &outcome.match_changes[&2];
        assert_eq!(second.changes[0].old_rating, first.changes[0].new_rating);
        assert!(second.changes[0].delta() < first.changes[0].delta());
        assert_eq!(outcome.records[&1].wins, 2);
        assert_eq!(outcome.histories[&1].len(), 2);
        assert_eq!(outcome.histories[&1][1].rating, outcome.records[&1].current_rating);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let matches = season();
        let mut reversed = matches.clone();
        reversed.reverse();
        let mut roster_shuffled = roster();
        roster_shuffled.rotate_left(2);

        let forward = replayer().replay(&roster(), &matches).unwrap();
        let backward = replayer().replay(&roster_shuffled, &reversed).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_same_timestamp_ordered_by_id() {
        let first = played(10, 0, [1, 2], [3, 4], &[(6, 0), (6, 0)]);
        let second = played(11, 0, [3, 4], [1, 2], &[(6, 4), (4, 6), (6, 3)]);

        let outcome = replayer()
            .replay(&roster()[..4], &[second, first])
            .unwrap();
        // Match 10 must have been applied on fresh ratings
        assert_eq!(outcome.match_changes[&10].changes[0].old_rating, 1200);
        assert_eq!(outcome.match_changes[&11].changes[0].old_rating, 1166);
    }

    #[test]
    fn test_skips_missing_winner_and_unknown_player() {
        let mut no_winner = played(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)]);
        no_winner.winner = None;
        let unknown = played(2, 10, [1, 2], [3, 99], &[(6, 2), (6, 3)]);
        let mut tie = played(3, 20, [1, 2], [3, 4], &[(6, 4), (4, 6)]);
        tie.winner = Some(MatchOutcome::Tie);
        let twice = played(4, 30, [1, 2], [2, 4], &[(6, 4), (6, 4)]);
        let valid = played(5, 40, [1, 2], [3, 4], &[(6, 2), (6, 3)]);

        let outcome = replayer()
            .replay(&roster()[..4], &[valid, unknown, no_winner, tie, twice])
            .unwrap();

        assert_eq!(outcome.applied_count(), 1);
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedMatch {
                    match_id: 1,
                    reason: SkipReason::MissingWinner
                },
                SkippedMatch {
                    match_id: 2,
                    reason: SkipReason::UnknownPlayer { player_id: 99 }
                },
                SkippedMatch {
                    match_id: 3,
                    reason: SkipReason::Undecided
                },
                SkippedMatch {
                    match_id: 4,
                    reason: SkipReason::DuplicateParticipant { player_id: 2 }
                },
            ]
        );
        assert_eq!(outcome.records[&1].current_rating, 1234);
        assert_eq!(outcome.records[&4].losses, 1);
    }

    #[test]
    fn test_too_many_sets_is_skipped() {
        let m = played(1, 0, [1, 2], [3, 4], &[(6, 2), (2, 6), (6, 3), (6, 1)]);
        let outcome = replayer().replay(&roster()[..4], &[m]).unwrap();
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::TooManySets { count: 4 }
        );
        assert_eq!(outcome.records[&1].current_rating, 1200);
    }

    #[test]
    fn test_players_without_matches_keep_initial_rating() {
        let outcome = replayer().replay(&roster(), &[]).unwrap();
        assert_eq!(outcome.records.len(), 6);
        assert!(outcome
            .records
            .values()
            .all(|s| s.current_rating == 1200 && s.progression == 0 && s.matches_played() == 0));
        assert!(outcome.histories.is_empty());
    }

    #[test]
    fn test_duplicate_ids_fail_replay() {
        let mut players = roster();
        players.push(PlayerRecord::new(1, "Ana again"));
        let err = replayer().replay(&players, &season()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ReplayFailed { .. })
        ));

        let mut matches = season();
        let mut copy = matches[0].clone();
        copy.timestamp = copy.timestamp + Duration::days(1);
        matches.push(copy);
        let err = replayer().replay(&roster(), &matches).unwrap_err();
        assert!(err.to_string().contains("match id 1"));
    }

    #[test]
    fn test_standings_order() {
        let outcome = replayer().replay(&roster(), &season()).unwrap();
        let standings = outcome.standings();
        assert_eq!(standings.len(), 6);
        assert!(standings
            .windows(2)
            .all(|w| w[0].current_rating >= w[1].current_rating));
    }

    #[test]
    fn test_replay_twice_is_identical() {
        let r = replayer();
        let first = r.replay(&roster(), &season()).unwrap();
        let second = r.replay(&roster(), &season()).unwrap();
        assert_eq!(first, second);
    }

    fn arbitrary_match() -> impl Strategy<Value = (i64, [PlayerId; 2], [PlayerId; 2], Vec<(u8, u8)>)>
    {
        (
            0i64..500,
            prop_oneof![Just([1, 2]), Just([3, 5])],
            prop_oneof![Just([4, 6]), Just([7, 8])],
            prop::collection::vec((0u8..8, 0u8..8), 0..=3),
        )
    }

    proptest! {
        #[test]
        fn prop_replay_is_order_independent(
            raw in prop::collection::vec(arbitrary_match(), 0..40),
            seed in any::<u64>(),
        ) {
            let players: Vec<PlayerRecord> =
                (1..=8).map(|id| PlayerRecord::new(id, format!("p{}", id))).collect();
            let matches: Vec<Match> = raw
                .iter()
                .enumerate()
                .map(|(i, (minutes, a, b, sets))| {
                    Match::from_sets(
                        i as MatchId,
                        base_time() + Duration::minutes(*minutes),
                        *a,
                        *b,
                        sets.iter().map(|&(x, y)| SetScore::new(x, y)).collect(),
                    )
                })
                .collect();

            let mut shuffled = matches.clone();
            // deterministic Fisher-Yates from the seed
            let mut state = seed;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }

            let r = replayer();
            let original = r.replay(&players, &matches).unwrap();
            let permuted = r.replay(&players, &shuffled).unwrap();
            prop_assert_eq!(&original, &permuted);

            for stats in original.records.values() {
                prop_assert!(stats.current_rating >= 100);
                prop_assert_eq!(stats.progression, stats.current_rating - 1200);
            }
        }

        #[test]
        fn prop_losing_streak_respects_floor(losses in 1usize..120) {
            let players: Vec<PlayerRecord> =
                (1..=4).map(|id| PlayerRecord::new(id, format!("p{}", id))).collect();
            let matches: Vec<Match> = (0..losses)
                .map(|i| {
                    Match::from_sets(
                        i as MatchId,
                        base_time() + Duration::minutes(i as i64),
                        [1, 2],
                        [3, 4],
                        vec![SetScore::new(0, 6), SetScore::new(0, 6)],
                    )
                })
                .collect();

            let outcome = replayer().replay(&players, &matches).unwrap();
            for id in [1, 2] {
                prop_assert!(outcome.records[&id].current_rating >= 100);
                prop_assert!(outcome.histories[&id].iter().all(|p| p.rating >= 100));
            }
        }
    }
}
