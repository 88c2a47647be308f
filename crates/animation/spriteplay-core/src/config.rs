//! Evaluator configuration and playback options.

use serde::{Deserialize, Serialize};

use crate::flags::LoopFlags;

/// Host-level settings passed down to every evaluation pass.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvalConfig {
    /// Global content scale used when resolving on-screen sizes.
    pub content_scale: f32,
    /// Advance by `dt * fps * step` (skipping frames as needed). When false
    /// every tick advances exactly `step` frames.
    pub frame_skip: bool,
    /// Sample at the fractional frame position instead of the whole frame.
    pub sub_frame: bool,
    /// Host opacity (0..255) applied on top of every root part.
    pub alpha: u8,
    /// Host color tint (RGB 0..255) reported on every part.
    pub tint: [u8; 3],
    /// Host rotation offset in degrees (X, Y, Z) applied to root parts.
    pub rotation_offset: [f32; 3],
    /// Events retained per tick; extra crossings are dropped with a warning.
    pub max_events_per_tick: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            content_scale: 1.0,
            frame_skip: true,
            sub_frame: false,
            alpha: 255,
            tint: [255, 255, 255],
            rotation_offset: [0.0; 3],
            max_events_per_tick: 1024,
        }
    }
}

/// Options for [`AnimationEvaluator::play_with`](crate::AnimationEvaluator::play_with).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayOptions {
    /// Passes before playback ends; 0 loops forever.
    pub loop_count: u32,
    pub start_frame: i32,
    /// Only `REVERSE` and `PINGPONG` are meaningful for the main clock.
    pub flags: LoopFlags,
}

impl PlayOptions {
    #[inline]
    pub fn new(loop_count: u32, start_frame: i32) -> Self {
        Self {
            loop_count,
            start_frame,
            flags: LoopFlags::empty(),
        }
    }

    #[inline]
    pub fn with_reverse(mut self) -> Self {
        self.flags |= LoopFlags::REVERSE;
        self
    }

    #[inline]
    pub fn with_ping_pong(mut self) -> Self {
        self.flags |= LoopFlags::PINGPONG;
        self
    }
}
