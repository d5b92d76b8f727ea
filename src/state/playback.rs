//! Transitions of the shared player applied by playback actions.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::dao::models::PlaybackUpdate;

/// Action requested by a client on the shared player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Start playing, optionally from a position.
    Play,
    /// Pause, optionally at a position.
    Pause,
    /// Jump to a position without changing the playing flag.
    Seek,
    /// Load another video, rewound and paused.
    ChangeVideo,
}

/// Raised for action names outside of the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown playback action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for PlaybackAction {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "seek" => Ok(Self::Seek),
            "changeVideo" => Ok(Self::ChangeVideo),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl PlaybackAction {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek => "seek",
            Self::ChangeVideo => "changeVideo",
        }
    }

    /// Fields to persist for this action.
    ///
    /// Positions that are negative or not finite are dropped. A video change
    /// always rewinds and pauses, whatever time was sent along.
    pub fn transition(self, time: Option<f64>, video_id: Option<&str>) -> PlaybackUpdate {
        let position = time.filter(|t| t.is_finite() && *t >= 0.0);
        match self {
            Self::Play => PlaybackUpdate {
                playing: Some(true),
                position,
                video_id: None,
            },
            Self::Pause => PlaybackUpdate {
                playing: Some(false),
                position,
                video_id: None,
            },
            Self::Seek => PlaybackUpdate {
                playing: None,
                position,
                video_id: None,
            },
            Self::ChangeVideo => PlaybackUpdate {
                playing: Some(false),
                position: Some(0.0),
                video_id: video_id.map(str::to_owned),
            },
        }
    }
}

impl fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        for action in [
            PlaybackAction::Play,
            PlaybackAction::Pause,
            PlaybackAction::Seek,
            PlaybackAction::ChangeVideo,
        ] {
            assert_eq!(action.as_str().parse::<PlaybackAction>(), Ok(action));
        }
        assert!("rewind".parse::<PlaybackAction>().is_err());
        assert!("Play".parse::<PlaybackAction>().is_err());
    }

    #[test]
    fn play_sets_position_when_given() {
        let update = PlaybackAction::Play.transition(Some(10.0), None);
        assert_eq!(update.playing, Some(true));
        assert_eq!(update.position, Some(10.0));

        let update = PlaybackAction::Play.transition(None, None);
        assert_eq!(update.position, None);
    }

    #[test]
    fn seek_leaves_playing_untouched() {
        let update = PlaybackAction::Seek.transition(Some(42.5), None);
        assert_eq!(update.playing, None);
        assert_eq!(update.position, Some(42.5));
    }

    #[test]
    fn change_video_rewinds_and_pauses() {
        let update = PlaybackAction::ChangeVideo.transition(Some(99.0), Some("xyz"));
        assert_eq!(
            update,
            PlaybackUpdate {
                playing: Some(false),
                position: Some(0.0),
                video_id: Some("xyz".into()),
            }
        );
    }

    #[test]
    fn invalid_positions_are_ignored() {
        assert_eq!(PlaybackAction::Pause.transition(Some(-1.0), None).position, None);
        assert_eq!(PlaybackAction::Seek.transition(Some(f64::NAN), None).position, None);
        assert!(PlaybackAction::Seek.transition(Some(f64::INFINITY), None).is_empty());
    }
}
