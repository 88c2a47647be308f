use serde::{Deserialize, Serialize};

/// Playback state of an evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing is advancing; a bound animation can still be scrubbed
    #[default]
    Stopped,
    Playing,
    Paused,
    /// The loop count ran out; the last frame is held
    Ended,
    /// A fatal error stopped evaluation; the last good output is kept
    Error,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    #[inline]
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused | Self::Stopped)
    }

    #[inline]
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Playing)
    }

    #[inline]
    pub fn can_stop(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}
