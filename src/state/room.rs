//! Value types describing rooms and the identities that join them.

use std::fmt;

use rand::Rng;
use thiserror::Error;

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// User id attached to synthesized chat messages.
pub const SYSTEM_USER_ID: &str = "system";
/// Display name attached to synthesized chat messages.
pub const SYSTEM_USERNAME: &str = "System";

/// Reasons a room code is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    /// Missing or blank code.
    #[error("No room ID provided.")]
    Empty,
    /// Wrong number of characters.
    #[error("room code must be 6 characters long")]
    Length,
    /// Characters outside of ASCII letters and digits.
    #[error("room code must only contain letters and digits")]
    Charset,
}

/// Canonical (uppercase) room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalize and validate a client-provided code.
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoomCodeError::Empty);
        }
        if trimmed.chars().count() != ROOM_CODE_LENGTH {
            return Err(RoomCodeError::Length);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoomCodeError::Charset);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Draw a random code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the code into an owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Who is behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: Option<String>,
    display_name: String,
}

impl Identity {
    /// Build an identity, deriving a display name from the user id when none is given.
    pub fn new(user_id: Option<String>, display_name: Option<String>) -> Self {
        let user_id = user_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());
        let display_name = display_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_display_name(user_id.as_deref()));
        Self {
            user_id,
            display_name,
        }
    }

    /// Persistent identifier supplied by the client, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Name shown to other members.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Key stored in a room's member set and compared against its host.
    pub fn member_key(&self) -> &str {
        &self.display_name
    }

    /// Same user under a different display name; blank names are ignored.
    pub fn with_display_name(&self, display_name: Option<String>) -> Self {
        match display_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
        {
            Some(name) => Self {
                user_id: self.user_id.clone(),
                display_name: name,
            },
            None => self.clone(),
        }
    }
}

fn default_display_name(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => format!("User-{}", id.chars().take(4).collect::<String>()),
        None => "User-Anon".to_string(),
    }
}

/// Why a room was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The host's connection left the room.
    HostLeft,
    /// The host deleted the room through the REST API.
    DeletedByHost,
    /// The room stayed idle past the inactivity threshold.
    Inactivity,
}

impl TeardownReason {
    /// Notice sent to every connection of the room.
    pub fn message(self) -> &'static str {
        match self {
            TeardownReason::HostLeft => "Room closed because the host left.",
            TeardownReason::DeletedByHost => "Room has been deleted by the host.",
            TeardownReason::Inactivity => "Room closed due to inactivity.",
        }
    }

    /// Short label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TeardownReason::HostLeft => "host_left",
            TeardownReason::DeletedByHost => "deleted_by_host",
            TeardownReason::Inactivity => "inactivity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uppercases_and_trims() {
        let code = RoomCode::parse("  abc123 ").unwrap();
        assert_eq!(code.as_str(), "ABC123");
    }

    #[test]
    fn parse_rejects_bad_codes() {
        assert_eq!(RoomCode::parse("   "), Err(RoomCodeError::Empty));
        assert_eq!(RoomCode::parse("ABC"), Err(RoomCodeError::Length));
        assert_eq!(RoomCode::parse("AB C12"), Err(RoomCodeError::Charset));
    }

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..32 {
            let code = RoomCode::generate();
            assert_eq!(RoomCode::parse(code.as_str()), Ok(code));
        }
    }

    #[test]
    fn identity_defaults_display_name() {
        let named = Identity::new(Some("u-42abcdef".into()), None);
        assert_eq!(named.display_name(), "User-u-42");
        let anon = Identity::new(None, Some("  ".into()));
        assert_eq!(anon.display_name(), "User-Anon");
        assert_eq!(anon.user_id(), None);
    }

    #[test]
    fn with_display_name_keeps_user_id() {
        let base = Identity::new(Some("42".into()), Some("alice".into()));
        let renamed = base.with_display_name(Some("bob".into()));
        assert_eq!(renamed.member_key(), "bob");
        assert_eq!(renamed.user_id(), Some("42"));
        assert_eq!(base.with_display_name(None), base);
    }
}
