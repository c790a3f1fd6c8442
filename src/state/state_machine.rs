use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Players gather; no turn is running.
    Lobby,
    /// A turn is running for the current player.
    Playing,
    /// Gameplay is suspended, either by the host or because too few players are active.
    Paused,
    /// Terminal status; a new room is needed to play again.
    Ended,
}

/// Why a session entered the paused status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// The host paused manually.
    Manual,
    /// Fewer than two players remain active.
    NotEnoughPlayers,
}

/// Events that change the lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the session from the lobby.
    Start,
    /// Gameplay is suspended.
    Pause(PauseReason),
    /// Host resumes a paused session.
    Resume,
    /// Host ends the session.
    End,
}

/// Error returned when an event cannot be applied from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the session was in.
    pub from: SessionStatus,
    /// Rejected event.
    pub event: SessionEvent,
}

impl SessionStatus {
    /// Compute the status reached by applying `event`, if the transition exists.
    pub fn next(self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        let next = match (self, event) {
            (SessionStatus::Lobby, SessionEvent::Start) => SessionStatus::Playing,
            (SessionStatus::Playing, SessionEvent::Pause(_)) => SessionStatus::Paused,
            (SessionStatus::Paused, SessionEvent::Resume) => SessionStatus::Playing,
            (SessionStatus::Playing | SessionStatus::Paused, SessionEvent::End) => {
                SessionStatus::Ended
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(status: SessionStatus, event: SessionEvent) -> SessionStatus {
        status.next(event).unwrap()
    }

    #[test]
    fn full_happy_path_through_session() {
        let status = SessionStatus::Lobby;
        let status = apply(status, SessionEvent::Start);
        assert_eq!(status, SessionStatus::Playing);

        let status = apply(status, SessionEvent::Pause(PauseReason::Manual));
        assert_eq!(status, SessionStatus::Paused);

        let status = apply(status, SessionEvent::Resume);
        assert_eq!(status, SessionStatus::Playing);

        let status = apply(status, SessionEvent::Pause(PauseReason::NotEnoughPlayers));
        assert_eq!(apply(status, SessionEvent::End), SessionStatus::Ended);
    }

    #[test]
    fn lobby_cannot_end() {
        let err = SessionStatus::Lobby.next(SessionEvent::End).unwrap_err();
        assert_eq!(err.from, SessionStatus::Lobby);
        assert_eq!(err.event, SessionEvent::End);
    }

    #[test]
    fn ended_is_terminal() {
        for event in [
            SessionEvent::Start,
            SessionEvent::Pause(PauseReason::Manual),
            SessionEvent::Resume,
            SessionEvent::End,
        ] {
            assert!(SessionStatus::Ended.next(event).is_err());
        }
    }

    #[test]
    fn resume_requires_pause() {
        assert!(SessionStatus::Playing.next(SessionEvent::Resume).is_err());
        assert!(SessionStatus::Lobby.next(SessionEvent::Resume).is_err());
    }

    #[test]
    fn serializes_in_screaming_case() {
        let value = serde_json::to_value(SessionStatus::Paused).unwrap();
        assert_eq!(value, serde_json::json!("PAUSED"));
    }
}
