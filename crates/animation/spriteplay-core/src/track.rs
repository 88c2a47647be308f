//! Keyframe track decoding and sampling.
//!
//! Model:
//! - A part's keyframes are sparse: each one carries a subset of attributes.
//!   On construction they are split into one channel per attribute.
//! - Sampling a channel at `frame` clamps to the first/last key outside the
//!   keyed range; between keys `t = (frame - f0) / (f1 - f0)` is eased by the
//!   left key's curve, then blended linearly.
//! - Discrete attributes (cell, visibility, flips, instance parameters) hold
//!   the left key.
//! - Attributes never keyed keep the part default and leave their present bit clear.

use crate::data::{
    ColorBlend, Curve, InstanceKey, KeyValue, Keyframe, LocalAttributes, VertexOffsets,
};
use crate::error::EvalError;
use crate::flags::PartFlags;
use crate::interp::ease;
use crate::interp::functions::{lerp_color_blend, lerp_f32, lerp_vertex};

/// Numeric attributes that interpolate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
    PositionX,
    PositionY,
    PositionZ,
    AnchorX,
    AnchorY,
    RotationX,
    RotationY,
    RotationZ,
    ScaleX,
    ScaleY,
    Opacity,
    SizeX,
    SizeY,
    UMove,
    VMove,
    UvRotation,
    UScale,
    VScale,
    BoundingRadius,
}

const SCALAR_COUNT: usize = 19;

impl Scalar {
    const ALL: [Scalar; SCALAR_COUNT] = [
        Scalar::PositionX,
        Scalar::PositionY,
        Scalar::PositionZ,
        Scalar::AnchorX,
        Scalar::AnchorY,
        Scalar::RotationX,
        Scalar::RotationY,
        Scalar::RotationZ,
        Scalar::ScaleX,
        Scalar::ScaleY,
        Scalar::Opacity,
        Scalar::SizeX,
        Scalar::SizeY,
        Scalar::UMove,
        Scalar::VMove,
        Scalar::UvRotation,
        Scalar::UScale,
        Scalar::VScale,
        Scalar::BoundingRadius,
    ];

    fn of(value: &KeyValue) -> Option<(Scalar, f32)> {
        let pair = match *value {
            KeyValue::PositionX(v) => (Scalar::PositionX, v),
            KeyValue::PositionY(v) => (Scalar::PositionY, v),
            KeyValue::PositionZ(v) => (Scalar::PositionZ, v),
            KeyValue::AnchorX(v) => (Scalar::AnchorX, v),
            KeyValue::AnchorY(v) => (Scalar::AnchorY, v),
            KeyValue::RotationX(v) => (Scalar::RotationX, v),
            KeyValue::RotationY(v) => (Scalar::RotationY, v),
            KeyValue::RotationZ(v) => (Scalar::RotationZ, v),
            KeyValue::ScaleX(v) => (Scalar::ScaleX, v),
            KeyValue::ScaleY(v) => (Scalar::ScaleY, v),
            KeyValue::Opacity(v) => (Scalar::Opacity, v),
            KeyValue::SizeX(v) => (Scalar::SizeX, v),
            KeyValue::SizeY(v) => (Scalar::SizeY, v),
            KeyValue::UMove(v) => (Scalar::UMove, v),
            KeyValue::VMove(v) => (Scalar::VMove, v),
            KeyValue::UvRotation(v) => (Scalar::UvRotation, v),
            KeyValue::UScale(v) => (Scalar::UScale, v),
            KeyValue::VScale(v) => (Scalar::VScale, v),
            KeyValue::BoundingRadius(v) => (Scalar::BoundingRadius, v),
            _ => return None,
        };
        Some(pair)
    }

    fn flag(self) -> PartFlags {
        match self {
            Scalar::PositionX => PartFlags::POSITION_X,
            Scalar::PositionY => PartFlags::POSITION_Y,
            Scalar::PositionZ => PartFlags::POSITION_Z,
            Scalar::AnchorX => PartFlags::ANCHOR_X,
            Scalar::AnchorY => PartFlags::ANCHOR_Y,
            Scalar::RotationX => PartFlags::ROTATION_X,
            Scalar::RotationY => PartFlags::ROTATION_Y,
            Scalar::RotationZ => PartFlags::ROTATION_Z,
            Scalar::ScaleX => PartFlags::SCALE_X,
            Scalar::ScaleY => PartFlags::SCALE_Y,
            Scalar::Opacity => PartFlags::OPACITY,
            Scalar::SizeX => PartFlags::SIZE_X,
            Scalar::SizeY => PartFlags::SIZE_Y,
            Scalar::UMove => PartFlags::U_MOVE,
            Scalar::VMove => PartFlags::V_MOVE,
            Scalar::UvRotation => PartFlags::UV_ROTATION,
            Scalar::UScale => PartFlags::U_SCALE,
            Scalar::VScale => PartFlags::V_SCALE,
            Scalar::BoundingRadius => PartFlags::BOUNDING_RADIUS,
        }
    }

    fn write(self, attrs: &mut LocalAttributes, v: f32) {
        match self {
            Scalar::PositionX => attrs.position[0] = v,
            Scalar::PositionY => attrs.position[1] = v,
            Scalar::PositionZ => attrs.position[2] = v,
            Scalar::AnchorX => attrs.anchor[0] = v,
            Scalar::AnchorY => attrs.anchor[1] = v,
            Scalar::RotationX => attrs.rotation[0] = v,
            Scalar::RotationY => attrs.rotation[1] = v,
            Scalar::RotationZ => attrs.rotation[2] = v,
            Scalar::ScaleX => attrs.scale[0] = v,
            Scalar::ScaleY => attrs.scale[1] = v,
            Scalar::Opacity => attrs.opacity = v,
            Scalar::SizeX => attrs.size[0] = v,
            Scalar::SizeY => attrs.size[1] = v,
            Scalar::UMove => attrs.uv_move[0] = v,
            Scalar::VMove => attrs.uv_move[1] = v,
            Scalar::UvRotation => attrs.uv_rotation = v,
            Scalar::UScale => attrs.uv_scale[0] = v,
            Scalar::VScale => attrs.uv_scale[1] = v,
            Scalar::BoundingRadius => attrs.bounding_radius = v,
        }
    }
}

#[derive(Clone, Debug)]
struct ChannelKey<T> {
    frame: i32,
    curve: Curve,
    value: T,
}

/// Ordered keys of a single attribute.
#[derive(Clone, Debug)]
struct Channel<T> {
    keys: Vec<ChannelKey<T>>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

enum Span<'k, T> {
    Hold(&'k ChannelKey<T>),
    Blend {
        left: &'k ChannelKey<T>,
        right: &'k ChannelKey<T>,
        t: f32,
    },
}

impl<T: Clone> Channel<T> {
    fn push(&mut self, frame: i32, curve: Curve, value: T) {
        self.keys.push(ChannelKey {
            frame,
            curve,
            value,
        });
    }

    /// Locate the segment containing `frame`, clamping outside the keyed range.
    fn span(&self, frame: f32) -> Option<Span<'_, T>> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame <= first.frame as f32 {
            return Some(Span::Hold(first));
        }
        if frame >= last.frame as f32 {
            return Some(Span::Hold(last));
        }
        // first.frame < frame < last.frame, so 1 <= idx < len
        let idx = self.keys.partition_point(|k| k.frame as f32 <= frame);
        let left = &self.keys[idx - 1];
        let right = &self.keys[idx];
        let t = (frame - left.frame as f32) / (right.frame - left.frame) as f32;
        Some(Span::Blend { left, right, t })
    }

    /// Left key at `frame` (discrete semantics).
    fn hold(&self, frame: f32) -> Option<&ChannelKey<T>> {
        self.span(frame).map(|s| match s {
            Span::Hold(k) => k,
            Span::Blend { left, .. } => left,
        })
    }

    fn blend(&self, frame: f32, mix: impl Fn(&T, &T, f32) -> T) -> Option<T> {
        self.span(frame).map(|s| match s {
            Span::Hold(k) => k.value.clone(),
            Span::Blend { left, right, t } => mix(&left.value, &right.value, ease(&left.curve, t)),
        })
    }
}

/// Result of sampling one part's track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackSample {
    pub attributes: LocalAttributes,
    /// Attributes that came from keys rather than part defaults.
    pub present: PartFlags,
    /// Frame of the instance key in effect, when instance parameters are keyed.
    pub instance_frame: Option<i32>,
}

impl TrackSample {
    /// Sample of a part that has no keys at all.
    pub fn from_defaults(defaults: &LocalAttributes) -> Self {
        Self {
            attributes: *defaults,
            present: PartFlags::empty(),
            instance_frame: None,
        }
    }
}

/// Decoded keyframes of one part.
#[derive(Clone, Debug)]
pub struct KeyframeTrack {
    scalars: Vec<Channel<f32>>,
    cell: Channel<i32>,
    invisible: Channel<bool>,
    flip_h: Channel<bool>,
    flip_v: Channel<bool>,
    color: Channel<ColorBlend>,
    vertex: Channel<VertexOffsets>,
    instance: Channel<InstanceKey>,
    keyed: PartFlags,
}

impl Default for KeyframeTrack {
    fn default() -> Self {
        Self {
            scalars: (0..SCALAR_COUNT).map(|_| Channel::default()).collect(),
            cell: Channel::default(),
            invisible: Channel::default(),
            flip_h: Channel::default(),
            flip_v: Channel::default(),
            color: Channel::default(),
            vertex: Channel::default(),
            instance: Channel::default(),
            keyed: PartFlags::empty(),
        }
    }
}

impl KeyframeTrack {
    /// Decode a part's keyframes. Frames must be strictly increasing.
    pub fn new(animation: &str, part: &str, keys: &[Keyframe]) -> Result<Self, EvalError> {
        let mut track = Self::default();
        let mut last: Option<i32> = None;
        for key in keys {
            if let Some(prev) = last {
                if key.frame <= prev {
                    return Err(EvalError::structure(
                        animation,
                        format!(
                            "keyframes of part '{part}' are not strictly increasing \
                             ({prev} then {})",
                            key.frame
                        ),
                    ));
                }
            }
            last = Some(key.frame);
            track.push_keyframe(key);
        }
        Ok(track)
    }

    fn push_keyframe(&mut self, key: &Keyframe) {
        let (frame, curve) = (key.frame, key.curve);
        for value in &key.values {
            self.keyed |= value.flag();
            if let Some((scalar, v)) = Scalar::of(value) {
                self.scalars[scalar as usize].push(frame, curve, v);
                continue;
            }
            match *value {
                KeyValue::CellIndex(i) => self.cell.push(frame, curve, i),
                KeyValue::Invisible(b) => self.invisible.push(frame, curve, b),
                KeyValue::FlipH(b) => self.flip_h.push(frame, curve, b),
                KeyValue::FlipV(b) => self.flip_v.push(frame, curve, b),
                KeyValue::ColorBlend(c) => self.color.push(frame, curve, c),
                KeyValue::VertexTransform(v) => self.vertex.push(frame, curve, v),
                KeyValue::Instance(k) => self.instance.push(frame, curve, k),
                _ => {}
            }
        }
    }

    /// Attributes that have at least one key.
    #[inline]
    pub fn keyed(&self) -> PartFlags {
        self.keyed
    }

    /// Sample every attribute at `frame`.
    pub fn sample(&self, defaults: &LocalAttributes, frame: f32) -> TrackSample {
        self.sample_masked(PartFlags::all(), defaults, frame)
    }

    /// Sample only the attributes in `mask`; everything else keeps `defaults`.
    pub fn sample_masked(
        &self,
        mask: PartFlags,
        defaults: &LocalAttributes,
        frame: f32,
    ) -> TrackSample {
        let wanted = self.keyed & mask;
        let mut attrs = *defaults;
        let mut instance_frame = None;

        for scalar in Scalar::ALL {
            if !wanted.contains(scalar.flag()) {
                continue;
            }
            let channel = &self.scalars[scalar as usize];
            if let Some(v) = channel.blend(frame, |a, b, t| lerp_f32(*a, *b, t)) {
                scalar.write(&mut attrs, v);
            }
        }

        if wanted.contains(PartFlags::CELL_INDEX) {
            if let Some(k) = self.cell.hold(frame) {
                attrs.cell_index = k.value;
            }
        }
        if wanted.contains(PartFlags::INVISIBLE) {
            if let Some(k) = self.invisible.hold(frame) {
                attrs.invisible = k.value;
            }
        }
        if wanted.contains(PartFlags::FLIP_H) {
            if let Some(k) = self.flip_h.hold(frame) {
                attrs.flip_h = k.value;
            }
        }
        if wanted.contains(PartFlags::FLIP_V) {
            if let Some(k) = self.flip_v.hold(frame) {
                attrs.flip_v = k.value;
            }
        }
        if wanted.contains(PartFlags::COLOR_BLEND) {
            attrs.color_blend = self.color.blend(frame, lerp_color_blend);
        }
        if wanted.contains(PartFlags::VERTEX_TRANSFORM) {
            if let Some(v) = self.vertex.blend(frame, lerp_vertex) {
                attrs.vertex = v;
            }
        }
        if wanted.contains(PartFlags::INSTANCE_KEYFRAME) {
            if let Some(k) = self.instance.hold(frame) {
                attrs.instance = Some(k.value);
                instance_frame = Some(k.frame);
            }
        }

        TrackSample {
            attributes: attrs,
            present: wanted,
            instance_frame,
        }
    }
}
