//! Resolved per-frame output records.
//!
//! A `PartState` is rebuilt from scratch on every evaluation; nothing in it
//! carries identity across frames.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::data::{BlendType, BoundsType, ColorBlend, PartType};
use crate::flags::PartFlags;

/// Collision shape in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Bounds {
    #[default]
    None,
    /// LT, RT, LB, RB corners after vertex offsets.
    Quad { corners: [[f32; 2]; 4] },
    Aabb { min: [f32; 2], max: [f32; 2] },
    Circle { center: [f32; 2], radius: f32 },
}

impl Bounds {
    /// Whether `point` lies inside the shape. `None` never contains anything.
    pub fn contains(&self, point: [f32; 2]) -> bool {
        match *self {
            Bounds::None => false,
            Bounds::Aabb { min, max } => {
                point[0] >= min[0] && point[0] <= max[0] && point[1] >= min[1] && point[1] <= max[1]
            }
            Bounds::Circle { center, radius } => {
                let dx = point[0] - center[0];
                let dy = point[1] - center[1];
                dx * dx + dy * dy <= radius * radius
            }
            Bounds::Quad { corners } => {
                // LT, RT, RB, LB walks the outline.
                let ring = [corners[0], corners[1], corners[3], corners[2]];
                let mut sign = 0.0f32;
                for i in 0..4 {
                    let a = ring[i];
                    let b = ring[(i + 1) % 4];
                    let cross =
                        (b[0] - a[0]) * (point[1] - a[1]) - (b[1] - a[1]) * (point[0] - a[0]);
                    if cross == 0.0 {
                        continue;
                    }
                    if sign == 0.0 {
                        sign = cross.signum();
                    } else if cross.signum() != sign {
                        return false;
                    }
                }
                true
            }
        }
    }
}

/// Nested result of an instance part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    /// `"pack/animation"` key of the nested animation.
    pub animation: String,
    /// Sub-frame shown this evaluation.
    pub frame: i32,
    pub loops_completed: u32,
    /// The sub-clock reached its loop limit and holds.
    pub finished: bool,
    pub parts: Vec<PartState>,
}

/// Fully resolved world-space state of one part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartState {
    pub index: usize,
    pub name: String,
    pub part_type: PartType,
    pub bounds_type: BoundsType,
    pub blend_type: BlendType,
    /// Attributes that came from keys this frame.
    pub present: PartFlags,
    /// Global cell index, when the part shows a cell.
    pub cell_index: Option<usize>,

    pub position: [f32; 3],
    /// Degrees; Z is negated when exactly one mirror axis is active.
    pub rotation: [f32; 3],
    pub scale: [f32; 2],
    /// Local anchor plus the cell pivot.
    pub anchor: [f32; 2],
    /// Composed opacity, 0..255.
    pub opacity: u8,
    /// Source size (keyed size or cell size).
    pub size: [f32; 2],
    /// Size after local scale and content scale.
    pub scaled_size: [f32; 2],

    /// Normalized atlas rectangle (left, top, right, bottom).
    pub uv_rect: [f32; 4],
    pub uv_move: [f32; 2],
    pub uv_rotation: f32,
    pub uv_scale: [f32; 2],

    pub color_blend: Option<ColorBlend>,
    /// Host tint, RGB 0..255.
    pub tint: [u8; 3],

    pub flip_x: bool,
    pub flip_y: bool,
    pub visible: bool,

    pub bounding_radius: f32,
    pub bounds: Bounds,

    /// World matrix (parent world * local).
    pub matrix: Mat4,

    pub instance: Option<Box<InstanceState>>,
}

impl PartState {
    /// Visible and backed by a cell.
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.visible
            && self.cell_index.is_some()
            && matches!(self.part_type, PartType::Normal | PartType::Text)
    }

    #[inline]
    pub fn position_2d(&self) -> [f32; 2] {
        [self.position[0], self.position[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_and_circle_containment() {
        let b = Bounds::Aabb {
            min: [-1.0, -1.0],
            max: [1.0, 1.0],
        };
        assert!(b.contains([0.5, -0.5]));
        assert!(!b.contains([1.5, 0.0]));

        let c = Bounds::Circle {
            center: [10.0, 0.0],
            radius: 2.0,
        };
        assert!(c.contains([11.0, 1.0]));
        assert!(!c.contains([0.0, 0.0]));
        assert!(!Bounds::None.contains([0.0, 0.0]));
    }

    #[test]
    fn quad_containment_is_winding_independent() {
        let quad = Bounds::Quad {
            corners: [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]],
        };
        assert!(quad.contains([0.0, 0.0]));
        assert!(!quad.contains([2.0, 0.0]));

        let mirrored = Bounds::Quad {
            corners: [[1.0, 1.0], [-1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]],
        };
        assert!(mirrored.contains([0.2, 0.3]));
    }
}
