//! Turn bag scheduling: a shuffled queue of active players that is drained
//! one turn at a time and refilled once empty.

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};

use crate::state::session::PlayerId;

/// Minimum number of active players needed to run turns.
pub const MIN_ACTIVE_PLAYERS: usize = 2;

/// Result of a scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// `player_id` takes the next turn and `bag` holds the remaining order.
    Next {
        /// Player whose turn starts.
        player_id: PlayerId,
        /// Residual bag after popping the head.
        bag: Vec<PlayerId>,
    },
    /// Too few active players; the caller pauses and keeps its bag untouched.
    Pause,
}

/// Pick the next player from `bag`, reshuffling from `active` when needed.
///
/// Stale ids (players no longer in `active`) are dropped, never scheduled.
pub fn next_turn<R: Rng + ?Sized>(
    bag: &[PlayerId],
    last_player_id: Option<&str>,
    active: &[PlayerId],
    rng: &mut R,
) -> Schedule {
    if active.len() < MIN_ACTIVE_PLAYERS {
        return Schedule::Pause;
    }

    let mut seen = HashSet::new();
    let mut remaining: Vec<PlayerId> = bag
        .iter()
        .filter(|id| active.contains(id) && seen.insert(id.as_str()))
        .cloned()
        .collect();

    if remaining.is_empty() {
        remaining = reshuffle(active, last_player_id, rng);
    }

    let player_id = remaining.remove(0);
    Schedule::Next {
        player_id,
        bag: remaining,
    }
}

/// Uniformly shuffle `active`, then keep `last_player_id` off the head when possible.
pub fn reshuffle<R: Rng + ?Sized>(
    active: &[PlayerId],
    last_player_id: Option<&str>,
    rng: &mut R,
) -> Vec<PlayerId> {
    let mut bag = active.to_vec();
    bag.shuffle(rng);

    if bag.len() >= 2 && last_player_id.is_some_and(|last| bag[0] == last) {
        bag.swap(0, 1);
    }

    bag
}

/// First order of a session: a plain shuffle with no previous player to avoid.
pub fn initial_order<R: Rng + ?Sized>(active: &[PlayerId], rng: &mut R) -> Vec<PlayerId> {
    let mut bag = active.to_vec();
    bag.shuffle(rng);
    bag
}

/// Insert a late joiner at a uniformly random position of `bag`.
///
/// Players already queued, or currently playing, are left where they are.
pub fn insert_late_joiner<R: Rng + ?Sized>(
    bag: &mut Vec<PlayerId>,
    player_id: &str,
    current_player_id: Option<&str>,
    rng: &mut R,
) {
    if current_player_id == Some(player_id) || bag.iter().any(|id| id == player_id) {
        return;
    }
    let position = rng.random_range(0..=bag.len());
    bag.insert(position, player_id.to_string());
}
