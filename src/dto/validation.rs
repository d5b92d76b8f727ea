//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::RoomCode;

/// Validates that a room code is made of exactly
/// [`ROOM_CODE_LENGTH`](crate::state::room::ROOM_CODE_LENGTH) ASCII alphanumeric characters.
///
/// Case is irrelevant; codes are uppercased before being stored.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    RoomCode::parse(code).map(|_| ()).map_err(|err| {
        let mut error = ValidationError::new("room_code");
        error.message = Some(err.to_string().into());
        error
    })
}

/// Validates that a display name is not blank.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("name must not be blank".into());
        return Err(err);
    }
    Ok(())
}
