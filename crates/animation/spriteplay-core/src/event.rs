//! Events produced while advancing playback.
//!
//! Each event fires once, when evaluation crosses the frame it belongs to, and
//! is handed to the caller in the `Vec` returned by `advance`.

use serde::{Deserialize, Serialize};

use crate::data::UserData;

/// Discrete signals emitted during stepping, in playback order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum EvalEvent {
    /// User data keyed on a crossed frame. `part` is `None` for root-level data.
    UserData {
        part: Option<String>,
        frame: i32,
        data: UserData,
    },
    LabelReached {
        label: String,
        frame: i32,
    },
    /// The main clock finished a pass; `loops` is the running total.
    LoopCompleted {
        animation: String,
        loops: u32,
    },
    PlaybackEnded {
        animation: String,
        frame: i32,
    },
    InstanceLoopCompleted {
        part: String,
        animation: String,
        loops: u32,
    },
    InstanceEnded {
        part: String,
        animation: String,
    },
}

impl EvalEvent {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserData { .. } => "user_data",
            Self::LabelReached { .. } => "label_reached",
            Self::LoopCompleted { .. } => "loop_completed",
            Self::PlaybackEnded { .. } => "playback_ended",
            Self::InstanceLoopCompleted { .. } => "instance_loop_completed",
            Self::InstanceEnded { .. } => "instance_ended",
        }
    }
}
