//! Project data model: cell maps, animation packs, parts and keyframes.
//!
//! These types are produced by an external loader and are immutable while an
//! evaluator is bound to them. They derive serde so hosts (and the test
//! fixtures) can author projects as JSON.

use serde::{Deserialize, Serialize};

use crate::flags::{LoopFlags, PartFlags};

/// A named sub-rectangle of a texture atlas.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub name: String,
    /// Source rectangle in atlas pixels.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Local origin offset, normalized to the cell size (0,0 is the centre).
    #[serde(default)]
    pub pivot: [f32; 2],
}

/// One texture atlas and the cells cut from it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CellMap {
    pub name: String,
    /// Atlas size in pixels, used for UV derivation.
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    /// Transform-only anchor; no drawable area.
    #[default]
    Null,
    Normal,
    Text,
    /// Plays another animation on its own sub-clock.
    Instance,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BoundsType {
    #[default]
    None,
    Quad,
    Aabb,
    Circle,
    CircleScaleMin,
    CircleScaleMax,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlendType {
    #[default]
    Mix,
    Mul,
    Add,
    Sub,
}

/// Interpolation curve of a keyframe. Applies to the segment that starts at the key.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Curve {
    #[default]
    Linear,
    /// Quadratic ease-in.
    Acceleration,
    /// Quadratic ease-out.
    Deceleration,
    /// Unit Hermite with normalized start/end slopes.
    Hermite { start_slope: f32, end_slope: f32 },
    /// Cubic-bezier timing with control points (x1, y1) and (x2, y2) in [0,1].
    Bezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

/// Per-vertex color blend (LT, RT, LB, RB), RGBA in [0,1].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ColorBlend {
    #[serde(default)]
    pub func: BlendType,
    /// When false only `colors[0]` is meaningful and applies to the whole quad.
    #[serde(default)]
    pub per_vertex: bool,
    pub colors: [[f32; 4]; 4],
}

/// Corner offsets applied to the part quad (LT, RT, LB, RB).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VertexOffsets {
    #[serde(default)]
    pub lt: [f32; 2],
    #[serde(default)]
    pub rt: [f32; 2],
    #[serde(default)]
    pub lb: [f32; 2],
    #[serde(default)]
    pub rb: [f32; 2],
}

impl VertexOffsets {
    #[inline]
    pub fn corners(&self) -> [[f32; 2]; 4] {
        [self.lt, self.rt, self.lb, self.rb]
    }
}

fn default_end_frame() -> i32 {
    -1
}

fn default_root_part() -> i32 {
    -1
}

fn default_speed() -> f32 {
    1.0
}

fn default_instance_loops() -> u32 {
    1
}

/// Sub-clock parameters of an instance part.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct InstanceKey {
    /// First frame of the referenced animation that is played.
    #[serde(default)]
    pub start_frame: i32,
    /// Last frame played; -1 means the referenced animation's last frame.
    #[serde(default = "default_end_frame")]
    pub end_frame: i32,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Number of passes before the clock holds; 0 = unlimited.
    #[serde(default = "default_instance_loops")]
    pub loop_count: u32,
    #[serde(default)]
    pub flags: LoopFlags,
}

impl Default for InstanceKey {
    fn default() -> Self {
        Self {
            start_frame: 0,
            end_frame: default_end_frame(),
            speed: default_speed(),
            loop_count: default_instance_loops(),
            flags: LoopFlags::empty(),
        }
    }
}

/// One keyed attribute value. A keyframe carries any subset of these.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "attr", content = "value", rename_all = "snake_case")]
pub enum KeyValue {
    Invisible(bool),
    FlipH(bool),
    FlipV(bool),
    CellIndex(i32),
    PositionX(f32),
    PositionY(f32),
    PositionZ(f32),
    AnchorX(f32),
    AnchorY(f32),
    RotationX(f32),
    RotationY(f32),
    RotationZ(f32),
    ScaleX(f32),
    ScaleY(f32),
    /// 0..255
    Opacity(f32),
    ColorBlend(ColorBlend),
    VertexTransform(VertexOffsets),
    SizeX(f32),
    SizeY(f32),
    UMove(f32),
    VMove(f32),
    UvRotation(f32),
    UScale(f32),
    VScale(f32),
    BoundingRadius(f32),
    Instance(InstanceKey),
}

impl KeyValue {
    pub fn flag(&self) -> PartFlags {
        match self {
            KeyValue::Invisible(_) => PartFlags::INVISIBLE,
            KeyValue::FlipH(_) => PartFlags::FLIP_H,
            KeyValue::FlipV(_) => PartFlags::FLIP_V,
            KeyValue::CellIndex(_) => PartFlags::CELL_INDEX,
            KeyValue::PositionX(_) => PartFlags::POSITION_X,
            KeyValue::PositionY(_) => PartFlags::POSITION_Y,
            KeyValue::PositionZ(_) => PartFlags::POSITION_Z,
            KeyValue::AnchorX(_) => PartFlags::ANCHOR_X,
            KeyValue::AnchorY(_) => PartFlags::ANCHOR_Y,
            KeyValue::RotationX(_) => PartFlags::ROTATION_X,
            KeyValue::RotationY(_) => PartFlags::ROTATION_Y,
            KeyValue::RotationZ(_) => PartFlags::ROTATION_Z,
            KeyValue::ScaleX(_) => PartFlags::SCALE_X,
            KeyValue::ScaleY(_) => PartFlags::SCALE_Y,
            KeyValue::Opacity(_) => PartFlags::OPACITY,
            KeyValue::ColorBlend(_) => PartFlags::COLOR_BLEND,
            KeyValue::VertexTransform(_) => PartFlags::VERTEX_TRANSFORM,
            KeyValue::SizeX(_) => PartFlags::SIZE_X,
            KeyValue::SizeY(_) => PartFlags::SIZE_Y,
            KeyValue::UMove(_) => PartFlags::U_MOVE,
            KeyValue::VMove(_) => PartFlags::V_MOVE,
            KeyValue::UvRotation(_) => PartFlags::UV_ROTATION,
            KeyValue::UScale(_) => PartFlags::U_SCALE,
            KeyValue::VScale(_) => PartFlags::V_SCALE,
            KeyValue::BoundingRadius(_) => PartFlags::BOUNDING_RADIUS,
            KeyValue::Instance(_) => PartFlags::INSTANCE_KEYFRAME,
        }
    }
}

/// A sparse keyframe: the attributes it keys at `frame`, and the curve of the
/// segment that starts here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Keyframe {
    pub frame: i32,
    #[serde(default)]
    pub curve: Curve,
    pub values: Vec<KeyValue>,
}

impl Keyframe {
    pub fn new(frame: i32, values: Vec<KeyValue>) -> Self {
        Self {
            frame,
            curve: Curve::Linear,
            values,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Union of the attribute bits this keyframe carries.
    pub fn flags(&self) -> PartFlags {
        self.values
            .iter()
            .fold(PartFlags::empty(), |acc, v| acc | v.flag())
    }
}

/// Local (pre-hierarchy) attribute values of one part.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalAttributes {
    /// Global cell index; -1 selects no cell.
    pub cell_index: i32,
    pub position: [f32; 3],
    pub anchor: [f32; 2],
    /// Degrees about X, Y, Z.
    pub rotation: [f32; 3],
    pub scale: [f32; 2],
    /// 0..255
    pub opacity: f32,
    pub size: [f32; 2],
    pub uv_move: [f32; 2],
    pub uv_rotation: f32,
    pub uv_scale: [f32; 2],
    pub bounding_radius: f32,
    pub invisible: bool,
    pub flip_h: bool,
    pub flip_v: bool,
    pub color_blend: Option<ColorBlend>,
    pub vertex: VertexOffsets,
    pub instance: Option<InstanceKey>,
}

impl Default for LocalAttributes {
    fn default() -> Self {
        Self {
            cell_index: -1,
            position: [0.0; 3],
            anchor: [0.0; 2],
            rotation: [0.0; 3],
            scale: [1.0, 1.0],
            opacity: 255.0,
            size: [0.0; 2],
            uv_move: [0.0; 2],
            uv_rotation: 0.0,
            uv_scale: [1.0, 1.0],
            bounding_radius: 0.0,
            invisible: false,
            flip_h: false,
            flip_v: false,
            color_blend: None,
            vertex: VertexOffsets::default(),
            instance: None,
        }
    }
}

/// Animation referenced by an instance part, plus its sub-clock defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InstanceRef {
    /// `"pack/animation"` or a bare animation name (same pack preferred).
    pub animation: String,
    #[serde(default)]
    pub defaults: InstanceKey,
}

/// Static definition of one node of the part tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PartDef {
    pub name: String,
    /// Index of the parent part; -1 for a root.
    pub parent_index: i32,
    #[serde(default)]
    pub part_type: PartType,
    #[serde(default)]
    pub bounds_type: BoundsType,
    #[serde(default)]
    pub blend_type: BlendType,
    /// Cell shown when the cell index is never keyed.
    #[serde(default)]
    pub cell: Option<String>,
    #[serde(default)]
    pub defaults: LocalAttributes,
    #[serde(default)]
    pub instance: Option<InstanceRef>,
}

impl PartDef {
    pub fn new(name: impl Into<String>, parent_index: i32, part_type: PartType) -> Self {
        Self {
            name: name.into(),
            parent_index,
            part_type,
            bounds_type: BoundsType::None,
            blend_type: BlendType::Mix,
            cell: None,
            defaults: LocalAttributes::default(),
            instance: None,
        }
    }
}

/// Payload of a user-data key; any combination of fields may be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<i32>,
    /// Left, top, right, bottom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<[i32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

/// User data attached to one frame of a part (or of the root track when `part_index` is -1).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserDataKey {
    pub frame: i32,
    #[serde(default = "default_root_part")]
    pub part_index: i32,
    pub data: UserData,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub name: String,
    pub frame: i32,
}

/// One named animation of a pack.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Animation {
    pub name: String,
    /// Authored frame rate.
    pub fps: u32,
    pub frame_count: u32,
    /// Keyframes per part, indexed by part index. Missing entries are never keyed.
    #[serde(default)]
    pub keyframes: Vec<Vec<Keyframe>>,
    #[serde(default)]
    pub user_data: Vec<UserDataKey>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Animation {
    #[inline]
    pub fn last_frame(&self) -> i32 {
        self.frame_count as i32 - 1
    }
}

/// A part tree shared by several animations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnimationPack {
    pub name: String,
    pub parts: Vec<PartDef>,
    #[serde(default)]
    pub animations: Vec<Animation>,
}

/// Fully loaded project.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cell_maps: Vec<CellMap>,
    #[serde(default)]
    pub packs: Vec<AnimationPack>,
}

/// Borrowed view of one animation together with its pack.
#[derive(Clone, Copy, Debug)]
pub struct AnimRef<'a> {
    pub pack: &'a AnimationPack,
    pub animation: &'a Animation,
}

impl<'a> AnimRef<'a> {
    /// Canonical `"pack/animation"` key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.pack.name, self.animation.name)
    }

    #[inline]
    pub fn parts(&self) -> &'a [PartDef] {
        &self.pack.parts
    }
}

impl ProjectData {
    /// Look up `"pack/animation"`, or a bare animation name (first match wins).
    pub fn find_animation(&self, key: &str) -> Option<AnimRef<'_>> {
        self.find_animation_from(None, key)
    }

    /// Like [`find_animation`](Self::find_animation) but a bare name is searched in
    /// `preferred` first.
    pub fn find_animation_from(&self, preferred: Option<&str>, key: &str) -> Option<AnimRef<'_>> {
        if let Some((pack_name, anim_name)) = key.split_once('/') {
            let pack = self.packs.iter().find(|p| p.name == pack_name)?;
            let animation = pack.animations.iter().find(|a| a.name == anim_name)?;
            return Some(AnimRef { pack, animation });
        }
        preferred
            .and_then(|name| self.packs.iter().find(|p| p.name == name))
            .and_then(|pack| anim_in_pack(pack, key))
            .or_else(|| self.packs.iter().find_map(|pack| anim_in_pack(pack, key)))
    }
}

fn anim_in_pack<'a>(pack: &'a AnimationPack, name: &str) -> Option<AnimRef<'a>> {
    pack.animations
        .iter()
        .find(|a| a.name == name)
        .map(|animation| AnimRef { pack, animation })
}
