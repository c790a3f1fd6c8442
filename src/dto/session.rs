//! Request and response payloads of the room endpoints.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        format_millis,
        validation::{validate_player_id, validate_player_name},
    },
    state::{
        session::{Player, Session, Settings, StorySegment, TurnClock},
        state_machine::SessionStatus,
    },
};

/// Host-tunable settings as exchanged over HTTP.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, Validate)]
pub struct SettingsDto {
    /// Maximum words per submission.
    #[validate(range(min = 1, max = 5))]
    pub word_limit: u8,
    /// Turn countdown in seconds.
    #[validate(range(min = 10, max = 60))]
    pub turn_time_limit: u32,
}

impl From<Settings> for SettingsDto {
    fn from(value: Settings) -> Self {
        Self {
            word_limit: value.word_limit,
            turn_time_limit: value.turn_time_limit,
        }
    }
}

impl From<SettingsDto> for Settings {
    fn from(value: SettingsDto) -> Self {
        Self {
            word_limit: value.word_limit,
            turn_time_limit: value.turn_time_limit,
        }
    }
}

/// Payload used to open a new room.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Initial settings; defaults to 3 words and 30 seconds.
    #[serde(default)]
    #[validate(nested)]
    pub settings: Option<SettingsDto>,
}

/// Returned once when a room is created. The host token is never shown again.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomCreatedResponse {
    pub room_code: String,
    /// Secret to send in the `X-Host-Token` header of host operations.
    pub host_token: String,
    pub session: SessionSnapshot,
}

/// Join or rejoin a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
    /// Identifier from a previous join to keep color and statistics.
    #[serde(default)]
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: Option<String>,
}

/// Identity granted to a joining player.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub player_id: String,
    pub color: String,
    /// Whether an existing player was reactivated.
    pub rejoined: bool,
    /// Expected heartbeat cadence on the presence socket.
    pub heartbeat_interval_secs: u64,
}

/// Words submitted by the current player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitTurnRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
    #[validate(length(min = 1, max = 512))]
    pub text: String,
}

/// Result of a submission; a stale submission is accepted as a no-op.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitTurnResponse {
    /// `false` when the turn had already moved on.
    pub accepted: bool,
    pub segment: Option<SegmentDto>,
    pub session: SessionSnapshot,
}

/// Optional description of the turn a skip targets.
///
/// Countdown observers send both fields so a late duplicate skip is ignored;
/// a host skip may omit them.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(default)]
pub struct SkipTurnRequest {
    pub expected_player_id: Option<String>,
    /// `timer_started_at` of the targeted turn, in epoch milliseconds.
    pub expected_started_at: Option<u64>,
}

/// Result of a skip.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SkipTurnResponse {
    /// Player charged with the penalty, absent when the skip was redundant.
    pub skipped_player_id: Option<String>,
    pub session: SessionSnapshot,
}

/// New text for a story segment.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EditSegmentRequest {
    #[validate(length(min = 1, max = 512))]
    pub text: String,
}

/// Generic acknowledgement carrying the resulting snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Whether the document changed.
    pub changed: bool,
    pub session: SessionSnapshot,
}

/// Public view of a player.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerDto {
    pub id: String,
    pub name: String,
    pub color: String,
    pub is_active: bool,
    pub last_seen: String,
    pub total_response_time: u64,
    pub turn_count: u32,
    pub last_turn_time: Option<u64>,
}

impl From<&Player> for PlayerDto {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            color: value.color.clone(),
            is_active: value.is_active,
            last_seen: format_millis(value.last_seen),
            total_response_time: value.total_response_time,
            turn_count: value.turn_count,
            last_turn_time: value.last_turn_time,
        }
    }
}

/// Public view of a story segment.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SegmentDto {
    pub id: String,
    pub text: String,
    /// Player id, or `HOST` for host-edited segments.
    pub author_id: String,
    pub color: String,
    pub timestamp: String,
    pub response_time: Option<u64>,
}

impl From<&StorySegment> for SegmentDto {
    fn from(value: &StorySegment) -> Self {
        Self {
            id: value.id.clone(),
            text: value.text.clone(),
            author_id: String::from(value.author.clone()),
            color: value.color.clone(),
            timestamp: format_millis(value.timestamp),
            response_time: value.metadata.response_time,
        }
    }
}

/// Countdown of the running turn; clients derive the remaining time from it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurnDto {
    /// Countdown anchor in epoch milliseconds.
    pub timer_started_at: u64,
    /// Countdown end in epoch milliseconds.
    pub deadline: u64,
    pub time_limit: u32,
    pub word_limit: u8,
}

impl From<&TurnClock> for TurnDto {
    fn from(value: &TurnClock) -> Self {
        Self {
            timer_started_at: value.started_at,
            deadline: value.started_at.saturating_add(value.limit_ms()),
            time_limit: value.time_limit,
            word_limit: value.word_limit,
        }
    }
}

/// Full public state of a room; the host token is never included.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub room_code: String,
    #[schema(value_type = String, example = "PLAYING")]
    pub status: SessionStatus,
    pub settings: SettingsDto,
    pub current_player_id: Option<String>,
    pub last_player_id: Option<String>,
    /// Turns left before the next reshuffle.
    pub turns_until_reshuffle: usize,
    pub turn: Option<TurnDto>,
    pub story: Vec<SegmentDto>,
    pub players: Vec<PlayerDto>,
    pub created_at: String,
    pub updated_at: String,
    /// Grows with every committed change; older snapshots can be discarded.
    pub version: u64,
}

impl From<&Session> for SessionSnapshot {
    fn from(value: &Session) -> Self {
        Self {
            room_code: value.room_code.clone(),
            status: value.status,
            settings: value.settings.into(),
            current_player_id: value.current_player_id.clone(),
            last_player_id: value.last_player_id.clone(),
            turns_until_reshuffle: value.turn_bag.len(),
            turn: value.turn.as_ref().map(TurnDto::from),
            story: value.story.iter().map(SegmentDto::from).collect(),
            players: value.players.values().map(PlayerDto::from).collect(),
            created_at: format_millis(value.created_at),
            updated_at: format_millis(value.updated_at),
            version: value.version,
        }
    }
}

/// One leaderboard row; lower totals rank first.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: String,
    pub name: String,
    pub color: String,
    pub total_response_time: u64,
    pub turn_count: u32,
    pub average_response_time: Option<u64>,
}

impl LeaderboardEntry {
    pub fn new(rank: usize, player: &Player) -> Self {
        Self {
            rank,
            player_id: player.id.clone(),
            name: player.name.clone(),
            color: player.color.clone(),
            total_response_time: player.total_response_time,
            turn_count: player.turn_count,
            average_response_time: (player.turn_count > 0)
                .then(|| player.total_response_time / u64::from(player.turn_count)),
        }
    }
}

/// Plain-text export of the story.
#[derive(Debug, Serialize, ToSchema)]
pub struct StoryTextResponse {
    pub room_code: String,
    pub text: String,
    pub segments: usize,
    pub words: usize,
}

/// Codes of every stored room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    pub rooms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut session = Session::new("ABC234".into(), "secret".into(), Settings::default(), 0);
        session.players.insert(
            "p1".into(),
            Player {
                id: "p1".into(),
                name: "Alice".into(),
                color: "#E53935".into(),
                is_active: true,
                last_seen: 0,
                total_response_time: 9_000,
                turn_count: 3,
                last_turn_time: Some(1_000),
            },
        );
        session
    }

    #[test]
    fn snapshot_never_exposes_the_host_token() {
        let value = serde_json::to_value(SessionSnapshot::from(&session())).unwrap();
        assert!(!value.to_string().contains("secret"));
        assert_eq!(value["status"], "LOBBY");
        assert!(value.get("current_player_id").is_none());
        assert!(value.get("turn").is_none());
    }

    #[test]
    fn leaderboard_entry_averages_turns() {
        let session = session();
        let entry = LeaderboardEntry::new(1, &session.players["p1"]);
        assert_eq!(entry.average_response_time, Some(3_000));
    }

    #[test]
    fn settings_are_range_checked() {
        let settings = SettingsDto {
            word_limit: 6,
            turn_time_limit: 30,
        };
        assert!(settings.validate().is_err());
        let request = JoinRoomRequest {
            name: "a name far too long".into(),
            player_id: None,
        };
        assert!(request.validate().is_err());
    }
}
