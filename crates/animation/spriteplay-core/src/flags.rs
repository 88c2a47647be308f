//! Attribute and loop-mode bit sets.
//!
//! Bit positions follow the compiled project format so that hosts which still
//! carry raw flag words can convert them with `from_bits_truncate`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Attributes carried by a keyframe, or present in a sampled result.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PartFlags: u32 {
        const INVISIBLE = 1 << 0;
        const FLIP_H = 1 << 1;
        const FLIP_V = 1 << 2;

        const CELL_INDEX = 1 << 3;
        const POSITION_X = 1 << 4;
        const POSITION_Y = 1 << 5;
        const POSITION_Z = 1 << 6;
        const ANCHOR_X = 1 << 7;
        const ANCHOR_Y = 1 << 8;
        const ROTATION_X = 1 << 9;
        const ROTATION_Y = 1 << 10;
        const ROTATION_Z = 1 << 11;
        const SCALE_X = 1 << 12;
        const SCALE_Y = 1 << 13;
        const OPACITY = 1 << 14;
        const COLOR_BLEND = 1 << 15;
        const VERTEX_TRANSFORM = 1 << 16;

        const SIZE_X = 1 << 17;
        const SIZE_Y = 1 << 18;

        const U_MOVE = 1 << 19;
        const V_MOVE = 1 << 20;
        const UV_ROTATION = 1 << 21;
        const U_SCALE = 1 << 22;
        const V_SCALE = 1 << 23;
        const BOUNDING_RADIUS = 1 << 24;

        const INSTANCE_KEYFRAME = 1 << 25;
    }
}

impl PartFlags {
    /// Attributes that never interpolate; the left key holds until the next key.
    pub const DISCRETE: PartFlags = PartFlags::INVISIBLE
        .union(PartFlags::FLIP_H)
        .union(PartFlags::FLIP_V)
        .union(PartFlags::CELL_INDEX)
        .union(PartFlags::INSTANCE_KEYFRAME);
}

bitflags! {
    /// Loop behaviour of an instance sub-clock (and of the main clock).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LoopFlags: u32 {
        /// Wrap forever regardless of the loop count.
        const INFINITY = 1 << 0;
        /// Play each pass from the end frame towards the start frame.
        const REVERSE = 1 << 1;
        /// Toggle direction at every boundary instead of wrapping.
        const PINGPONG = 1 << 2;
        /// Advance with the owner's frame delta instead of the owner's absolute frame.
        const INDEPENDENT = 1 << 3;
    }
}
