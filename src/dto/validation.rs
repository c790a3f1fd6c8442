//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::session::{
    MAX_PLAYER_NAME_CHARS, ROOM_CODE_ALPHABET, ROOM_CODE_LEN, check_player_id,
};

/// Validates that a room code has the expected length and alphabet.
///
/// Lowercase input is accepted; callers normalize with [`normalize_room_code`].
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().count() != ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LEN} characters (got {})",
                code.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if !normalize_room_code(code)
        .bytes()
        .all(|c| ROOM_CODE_ALPHABET.contains(&c))
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains characters outside the room alphabet".into());
        return Err(err);
    }

    Ok(())
}

/// Uppercase a room code as typed by a player.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validates a display name: 1 to 12 characters once trimmed.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 || length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be between 1 and {MAX_PLAYER_NAME_CHARS} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates a client-chosen player id (trimmed, bounded, not reserved).
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    check_player_id(id.trim()).map_err(|reason| {
        let mut err = ValidationError::new("player_id");
        err.message = Some(reason.into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("ABC234").is_ok());
        assert!(validate_room_code("abc234").is_ok());
        assert!(validate_room_code("ZZZZZZ").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid() {
        assert!(validate_room_code("ABC23").is_err()); // too short
        assert!(validate_room_code("ABC2345").is_err()); // too long
        assert!(validate_room_code("ABCI01").is_err()); // ambiguous glyphs
        assert!(validate_room_code("ABC-34").is_err());
    }

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Alice").is_ok());
        assert!(validate_player_name("twelve chars").is_ok());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name("thirteen char").is_err());
    }

    #[test]
    fn test_validate_player_id() {
        assert!(validate_player_id("alice").is_ok());
        assert!(validate_player_id(" alice ").is_ok());
        assert!(validate_player_id("HOST").is_err());
        assert!(validate_player_id("host").is_err());
        assert!(validate_player_id("  ").is_err());
        assert!(validate_player_id(&"p".repeat(65)).is_err());
    }
}
