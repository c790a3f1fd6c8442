//! Fairness ledger: per-player response time bookkeeping and the derived
//! speed leaderboard.

use std::cmp::Ordering;

use crate::state::session::{Player, Session, TurnClock};

/// Credit a completed submission to `player`.
///
/// Returns the response time measured against the authoritative turn anchor.
pub fn record_response(player: &mut Player, clock: &TurnClock, now: u64) -> u64 {
    let response_time = now.saturating_sub(clock.started_at);
    credit(player, response_time);
    response_time
}

/// Charge a skipped turn to `player` using the full countdown as penalty.
///
/// The elapsed time is ignored so a slow skip never under-penalizes.
pub fn record_penalty(player: &mut Player, clock: &TurnClock) -> u64 {
    let penalty = clock.limit_ms();
    credit(player, penalty);
    penalty
}

fn credit(player: &mut Player, amount: u64) {
    player.total_response_time = player.total_response_time.saturating_add(amount);
    player.turn_count = player.turn_count.saturating_add(1);
    player.last_turn_time = Some(amount);
}

/// Initial `total_response_time` for a brand-new player.
///
/// Equal to the slowest active total so late joiners cannot lead by default.
pub fn late_joiner_seed(session: &Session) -> u64 {
    session
        .players
        .values()
        .filter(|player| player.is_active)
        .map(|player| player.total_response_time)
        .max()
        .unwrap_or(0)
}

/// Active players, fastest first; ties go to the player with fewer turns.
pub fn leaderboard(session: &Session) -> Vec<&Player> {
    let mut ranking: Vec<&Player> = session
        .players
        .values()
        .filter(|player| player.is_active)
        .collect();
    ranking.sort_by(|left, right| compare(left, right));
    ranking
}

fn compare(left: &Player, right: &Player) -> Ordering {
    left.total_response_time
        .cmp(&right.total_response_time)
        .then(left.turn_count.cmp(&right.turn_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::Settings;

    fn player(id: &str, total: u64, turns: u32, active: bool) -> Player {
        Player {
            id: id.into(),
            name: id.into(),
            color: "#000000".into(),
            is_active: active,
            last_seen: 0,
            total_response_time: total,
            turn_count: turns,
            last_turn_time: None,
        }
    }

    fn session_with(players: Vec<Player>) -> Session {
        let mut session = Session::new("ABC234".into(), "token".into(), Settings::default(), 0);
        for player in players {
            session.players.insert(player.id.clone(), player);
        }
        session
    }

    #[test]
    fn submission_credits_elapsed_time() {
        let mut alice = player("alice", 1_000, 1, true);
        let clock = TurnClock::start(10_000, &Settings::default());

        let response = record_response(&mut alice, &clock, 14_500);

        assert_eq!(response, 4_500);
        assert_eq!(alice.total_response_time, 5_500);
        assert_eq!(alice.turn_count, 2);
        assert_eq!(alice.last_turn_time, Some(4_500));
    }

    #[test]
    fn skip_charges_full_limit_regardless_of_elapsed_time() {
        let mut carol = player("carol", 0, 0, true);
        let settings = Settings {
            word_limit: 1,
            turn_time_limit: 20,
        };
        let clock = TurnClock::start(0, &settings);

        assert_eq!(record_penalty(&mut carol, &clock), 20_000);
        assert_eq!(carol.total_response_time, 20_000);
        assert_eq!(carol.turn_count, 1);
        assert_eq!(carol.last_turn_time, Some(20_000));
    }

    #[test]
    fn late_joiner_takes_the_slowest_active_total() {
        let session = session_with(vec![
            player("a", 4_000, 1, true),
            player("b", 12_000, 2, true),
            player("c", 90_000, 5, false),
        ]);
        assert_eq!(late_joiner_seed(&session), 12_000);
    }

    #[test]
    fn late_joiner_seed_is_zero_in_empty_room() {
        assert_eq!(late_joiner_seed(&session_with(vec![])), 0);
    }

    #[test]
    fn leaderboard_sorts_active_players_with_turn_count_tiebreak() {
        let session = session_with(vec![
            player("slow", 9_000, 3, true),
            player("tied-many", 5_000, 4, true),
            player("gone", 100, 1, false),
            player("tied-few", 5_000, 2, true),
        ]);
        let ranking: Vec<&str> = leaderboard(&session)
            .into_iter()
            .map(|player| player.id.as_str())
            .collect();
        assert_eq!(ranking, vec!["tied-few", "tied-many", "slow"]);
    }
}
