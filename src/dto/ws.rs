use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from presence WebSocket clients.
#[serde(tag = "type")]
pub enum PresenceInbound {
    #[serde(rename = "identification")]
    Identification { player_id: String },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(other)]
    Unknown,
}

impl PresenceInbound {
    pub fn identification_id(&self) -> Option<&str> {
        match self {
            Self::Identification { player_id } => Some(player_id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgement sent once a presence socket has identified its player.
pub struct PresenceAck {
    pub player_id: String,
    pub status: String,
    /// Expected delay between two heartbeats.
    pub heartbeat_interval_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed to a player whose turn just started.
#[serde(tag = "type", rename = "your_turn")]
pub struct TurnNotice {
    pub room_code: String,
    /// Countdown anchor in epoch milliseconds.
    pub timer_started_at: u64,
    pub time_limit: u32,
    pub word_limit: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_messages_do_not_fail() {
        let msg: PresenceInbound = serde_json::from_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(msg, PresenceInbound::Unknown));

        let msg: PresenceInbound =
            serde_json::from_str(r#"{"type":"identification","player_id":"p1"}"#).unwrap();
        assert_eq!(msg.identification_id(), Some("p1"));
    }

    #[test]
    fn turn_notice_is_tagged() {
        let notice = TurnNotice {
            room_code: "ABC234".into(),
            timer_started_at: 5,
            time_limit: 30,
            word_limit: 3,
        };
        let value = serde_json::to_value(notice).unwrap();
        assert_eq!(value["type"], "your_turn");
    }
}
