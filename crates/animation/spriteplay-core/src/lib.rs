//! spriteplay-core: runtime evaluator for 2D cell/part sprite animations.
//!
//! Given an already-loaded [`ProjectData`] (cell atlases, part trees and
//! per-part keyframes), an [`AnimationEvaluator`] plays one animation and
//! produces a [`PartState`] per part every tick: world transform, opacity,
//! UVs, color blend, visibility and bounds, plus the nested results of
//! instance parts running on their own sub-clocks.
//!
//! The crate is engine-agnostic. Rendering, texture loading and binary
//! project parsing belong to the host.

pub mod cells;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod flags;
pub mod hierarchy;
pub mod interp;
pub mod playback;
pub mod project_json;
mod runtime;
pub mod state;
pub mod track;

pub use cells::{CellEntry, CellTable};
pub use clock::{ClockCrossings, ClockPosition, InstanceClock, LoopPolicy};
pub use config::{EvalConfig, PlayOptions};
pub use data::{
    AnimRef, Animation, AnimationPack, BlendType, BoundsType, Cell, CellMap, ColorBlend, Curve,
    InstanceKey, InstanceRef, KeyValue, Keyframe, Label, LocalAttributes, PartDef, PartType,
    ProjectData, UserData, UserDataKey, VertexOffsets,
};
pub use error::{EvalError, ResourceKind};
pub use evaluator::AnimationEvaluator;
pub use event::EvalEvent;
pub use flags::{LoopFlags, PartFlags};
pub use hierarchy::{HierarchyResolver, ParentContext};
pub use playback::PlaybackState;
pub use project_json::parse_project_json;
pub use state::{Bounds, InstanceState, PartState};
pub use track::{KeyframeTrack, TrackSample};

/// Result type for evaluator operations
pub type Result<T> = std::result::Result<T, EvalError>;
