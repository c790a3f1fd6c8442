//! The per-room session document: the single shared aggregate every client
//! mutates through the transition protocol.

use std::{
    ops::RangeInclusive,
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::state::state_machine::SessionStatus;

/// Six-character room code addressing a session.
pub type RoomCode = String;
/// Stable identifier of a player inside a room.
pub type PlayerId = String;
/// Stable identifier of a story segment.
pub type SegmentId = String;

/// Symbols room codes are drawn from; visually ambiguous glyphs are excluded.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFHJKLMNPQRSTUVWXYZ23456789";
/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Allowed values for [`Settings::word_limit`].
pub const WORD_LIMIT_RANGE: RangeInclusive<u8> = 1..=5;
/// Allowed values for [`Settings::turn_time_limit`], in seconds.
pub const TURN_TIME_LIMIT_RANGE: RangeInclusive<u32> = 10..=60;
/// Maximum number of characters in a player name.
pub const MAX_PLAYER_NAME_CHARS: usize = 12;

/// Host-tunable rules applied from the next turn onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum number of words per submission.
    pub word_limit: u8,
    /// Countdown length of a turn, in seconds.
    pub turn_time_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            word_limit: 3,
            turn_time_limit: 30,
        }
    }
}

impl Settings {
    /// Check both values against their allowed ranges.
    pub fn check(&self) -> Result<(), String> {
        if !WORD_LIMIT_RANGE.contains(&self.word_limit) {
            return Err(format!(
                "word limit must be between {} and {} (got {})",
                WORD_LIMIT_RANGE.start(),
                WORD_LIMIT_RANGE.end(),
                self.word_limit
            ));
        }
        if !TURN_TIME_LIMIT_RANGE.contains(&self.turn_time_limit) {
            return Err(format!(
                "turn time limit must be between {} and {} seconds (got {})",
                TURN_TIME_LIMIT_RANGE.start(),
                TURN_TIME_LIMIT_RANGE.end(),
                self.turn_time_limit
            ));
        }
        Ok(())
    }
}

/// Countdown anchor of the running turn.
///
/// The limits are captured when the turn starts so a settings change made
/// mid-turn only applies to the following turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnClock {
    /// Wall-clock milliseconds at which the countdown started (`timerStartedAt`).
    pub started_at: u64,
    /// Countdown length for this turn, in seconds.
    pub time_limit: u32,
    /// Word limit for this turn.
    pub word_limit: u8,
}

impl TurnClock {
    /// Start a countdown at `now` using the current settings.
    pub fn start(now: u64, settings: &Settings) -> Self {
        Self {
            started_at: now,
            time_limit: settings.turn_time_limit,
            word_limit: settings.word_limit,
        }
    }

    /// Full countdown length in milliseconds.
    pub fn limit_ms(&self) -> u64 {
        u64::from(self.time_limit) * 1_000
    }
}

/// Participant of a room together with their fairness ledger fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier, reused when the player rejoins.
    pub id: PlayerId,
    /// Display name (at most [`MAX_PLAYER_NAME_CHARS`] characters).
    pub name: String,
    /// Palette color assigned on first join.
    pub color: String,
    /// Whether the player currently takes part in the rotation.
    pub is_active: bool,
    /// Last heartbeat or join, in wall-clock milliseconds.
    pub last_seen: u64,
    /// Accumulated response time in milliseconds (lower is better).
    pub total_response_time: u64,
    /// Number of completed or skipped turns.
    pub turn_count: u32,
    /// Response time of the most recent turn.
    pub last_turn_time: Option<u64>,
}

/// Who wrote a story segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SegmentAuthor {
    /// Submitted by a player during their turn.
    Player(PlayerId),
    /// Rewritten by the host.
    Host,
}

/// Sentinel stored in place of a player id for host-edited segments.
pub const HOST_AUTHOR: &str = "HOST";

/// Longest player id a client may choose.
pub const MAX_PLAYER_ID_CHARS: usize = 64;

/// Check a client-chosen player id, already trimmed.
///
/// Ids must be non-empty, bounded and distinct from [`HOST_AUTHOR`], which
/// would read back as a host-authored segment.
pub fn check_player_id(id: &str) -> Result<(), String> {
    if id.is_empty() || id.chars().count() > MAX_PLAYER_ID_CHARS {
        return Err(format!(
            "player id must be between 1 and {MAX_PLAYER_ID_CHARS} characters"
        ));
    }
    if id.eq_ignore_ascii_case(HOST_AUTHOR) {
        return Err(format!("player id `{id}` is reserved"));
    }
    Ok(())
}

impl From<String> for SegmentAuthor {
    fn from(value: String) -> Self {
        if value == HOST_AUTHOR {
            SegmentAuthor::Host
        } else {
            SegmentAuthor::Player(value)
        }
    }
}

impl From<SegmentAuthor> for String {
    fn from(value: SegmentAuthor) -> Self {
        match value {
            SegmentAuthor::Player(id) => id,
            SegmentAuthor::Host => HOST_AUTHOR.to_string(),
        }
    }
}

/// Extra data attached to a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Response time of the submission that produced this segment.
    pub response_time: Option<u64>,
}

/// One contribution to the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySegment {
    /// Identifier used by host edits and deletions.
    pub id: SegmentId,
    /// Normalized text.
    pub text: String,
    /// Author of the current text.
    pub author: SegmentAuthor,
    /// Color of the author at submission time.
    pub color: String,
    /// Submission time in wall-clock milliseconds.
    pub timestamp: u64,
    /// Timing metadata.
    #[serde(default)]
    pub metadata: SegmentMetadata,
}

/// Aggregate state of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Room code this document is stored under.
    pub room_code: RoomCode,
    /// Secret required by host-only operations.
    pub host_token: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Host-tunable rules.
    pub settings: Settings,
    /// Player whose turn it is; set iff the status is playing.
    pub current_player_id: Option<PlayerId>,
    /// Remaining randomized order before a reshuffle.
    #[serde(default)]
    pub turn_bag: Vec<PlayerId>,
    /// Player who completed the previous turn.
    pub last_player_id: Option<PlayerId>,
    /// Countdown of the running turn; `None` when no timer runs.
    pub turn: Option<TurnClock>,
    /// Ordered story segments.
    #[serde(default)]
    pub story: Vec<StorySegment>,
    /// Known players, active or not.
    #[serde(default)]
    pub players: IndexMap<PlayerId, Player>,
    /// Creation time in wall-clock milliseconds.
    pub created_at: u64,
    /// Time of the last committed transition.
    pub updated_at: u64,
    /// Number of committed transitions; orders published snapshots.
    #[serde(default)]
    pub version: u64,
}

impl Session {
    /// Build a fresh lobby for `room_code`.
    pub fn new(room_code: RoomCode, host_token: String, settings: Settings, now: u64) -> Self {
        Self {
            room_code,
            host_token,
            status: SessionStatus::Lobby,
            settings,
            current_player_id: None,
            turn_bag: Vec::new(),
            last_player_id: None,
            turn: None,
            story: Vec::new(),
            players: IndexMap::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Identifiers of active players in join order.
    pub fn active_player_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|player| player.is_active)
            .map(|player| player.id.clone())
            .collect()
    }

    /// Number of active players.
    pub fn active_count(&self) -> usize {
        self.players.values().filter(|player| player.is_active).count()
    }

    /// The player whose turn it is, if any.
    pub fn current_player(&self) -> Option<&Player> {
        self.current_player_id
            .as_ref()
            .and_then(|id| self.players.get(id))
    }

    /// Whether `token` grants host rights on this session.
    pub fn is_host(&self, token: &str) -> bool {
        !self.host_token.is_empty() && self.host_token == token
    }

    /// Plain-text rendering of the story.
    pub fn story_text(&self) -> String {
        self.story
            .iter()
            .map(|segment| segment.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check the structural invariants of the document.
    pub fn check_invariants(&self) -> Result<(), String> {
        let playing = self.status == SessionStatus::Playing;
        if playing != self.current_player_id.is_some() {
            return Err(format!(
                "current player must be set iff playing (status {:?}, current {:?})",
                self.status, self.current_player_id
            ));
        }
        if playing != self.turn.is_some() {
            return Err(format!(
                "turn clock must run iff playing (status {:?})",
                self.status
            ));
        }
        if let Some(current) = self.current_player() {
            if !current.is_active {
                return Err(format!("current player `{}` is inactive", current.id));
            }
        } else if let Some(id) = &self.current_player_id {
            return Err(format!("current player `{id}` is unknown"));
        }
        if playing && self.active_count() < 2 {
            return Err("a playing session needs at least two active players".into());
        }
        Ok(())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_ranges_are_enforced() {
        assert!(Settings::default().check().is_ok());
        assert!(
            Settings {
                word_limit: 0,
                turn_time_limit: 30
            }
            .check()
            .is_err()
        );
        assert!(
            Settings {
                word_limit: 6,
                turn_time_limit: 30
            }
            .check()
            .is_err()
        );
        assert!(
            Settings {
                word_limit: 5,
                turn_time_limit: 9
            }
            .check()
            .is_err()
        );
        assert!(
            Settings {
                word_limit: 1,
                turn_time_limit: 60
            }
            .check()
            .is_ok()
        );
    }

    #[test]
    fn segment_author_uses_host_sentinel() {
        let host = serde_json::to_value(SegmentAuthor::Host).unwrap();
        assert_eq!(host, serde_json::json!("HOST"));

        let player: SegmentAuthor = serde_json::from_value(serde_json::json!("p-1")).unwrap();
        assert_eq!(player, SegmentAuthor::Player("p-1".into()));
    }

    #[test]
    fn story_text_joins_segments() {
        let mut session = Session::new("ABC234".into(), "t".into(), Settings::default(), 0);
        for text in ["Once", "upon", "a time."] {
            session.story.push(StorySegment {
                id: text.into(),
                text: text.into(),
                author: SegmentAuthor::Host,
                color: "#fff".into(),
                timestamp: 0,
                metadata: SegmentMetadata::default(),
            });
        }
        assert_eq!(session.story_text(), "Once upon a time.");
    }

    #[test]
    fn turn_clock_captures_the_settings() {
        let clock = TurnClock::start(1_000, &Settings::default());
        assert_eq!(clock.limit_ms(), 30_000);
        assert_eq!(clock.word_limit, 3);
    }
}
