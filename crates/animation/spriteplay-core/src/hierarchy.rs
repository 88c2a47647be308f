//! Parent-before-child composition of sampled local attributes.
//!
//! Parts are resolved in index order in a single pass; every parent must have
//! a smaller index than its children.

use glam::{Mat4, Vec3, Vec4};
use log::warn;

use crate::cells::{CellEntry, CellTable};
use crate::config::EvalConfig;
use crate::data::{BoundsType, LocalAttributes, PartDef};
use crate::error::{EvalError, ResourceKind};
use crate::flags::PartFlags;
use crate::state::{Bounds, PartState};
use crate::track::TrackSample;

/// World state a part hands down to its children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParentContext {
    pub matrix: Mat4,
    /// Accumulated degrees per axis (not mirrored).
    pub rotation: [f32; 3],
    pub scale: [f32; 2],
    /// 0..1
    pub opacity: f32,
    pub visible: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub tint: [u8; 3],
}

impl ParentContext {
    /// Context of root parts: host alpha, tint and rotation offset.
    pub fn root(cfg: &EvalConfig) -> Self {
        Self {
            matrix: rotation_matrix(cfg.rotation_offset),
            rotation: cfg.rotation_offset,
            scale: [1.0, 1.0],
            opacity: cfg.alpha as f32 / 255.0,
            visible: true,
            flip_x: false,
            flip_y: false,
            tint: cfg.tint,
        }
    }
}

fn rotation_matrix(degrees: [f32; 3]) -> Mat4 {
    Mat4::from_rotation_x(degrees[0].to_radians())
        * Mat4::from_rotation_y(degrees[1].to_radians())
        * Mat4::from_rotation_z(degrees[2].to_radians())
}

/// T(position) * Rx * Ry * Rz * S(scale)
pub fn local_matrix(attrs: &LocalAttributes) -> Mat4 {
    Mat4::from_translation(Vec3::from(attrs.position))
        * rotation_matrix(attrs.rotation)
        * Mat4::from_scale(Vec3::new(attrs.scale[0], attrs.scale[1], 1.0))
}

/// Output of one resolve: the states plus the contexts children were built from.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub states: Vec<PartState>,
    pub contexts: Vec<ParentContext>,
}

pub struct HierarchyResolver<'c, 'a> {
    cells: &'c CellTable<'a>,
    content_scale: f32,
    hidden: &'c [bool],
}

impl<'c, 'a> HierarchyResolver<'c, 'a> {
    pub fn new(cells: &'c CellTable<'a>, content_scale: f32) -> Self {
        Self {
            cells,
            content_scale,
            hidden: &[],
        }
    }

    /// Host visibility overrides, indexed by part.
    pub fn with_hidden(mut self, hidden: &'c [bool]) -> Self {
        self.hidden = hidden;
        self
    }

    /// Resolve every part. Unknown cells are pushed to `warnings` and hide the part.
    pub fn resolve(
        &self,
        animation: &str,
        parts: &[PartDef],
        samples: &[TrackSample],
        root: &ParentContext,
        warnings: &mut Vec<EvalError>,
    ) -> Result<Resolved, EvalError> {
        if samples.len() != parts.len() {
            return Err(EvalError::structure(
                animation,
                format!("{} samples for {} parts", samples.len(), parts.len()),
            ));
        }

        let mut states = Vec::with_capacity(parts.len());
        let mut contexts: Vec<ParentContext> = Vec::with_capacity(parts.len());

        for (index, (part, sample)) in parts.iter().zip(samples).enumerate() {
            let parent = match part.parent_index {
                -1 => root,
                p if p >= 0 && (p as usize) < index => &contexts[p as usize],
                p => {
                    return Err(EvalError::structure(
                        animation,
                        format!("part '{}' (#{index}) has parent index {p}", part.name),
                    ))
                }
            };
            let hidden = self.hidden.get(index).copied().unwrap_or(false);

            let cell = match self.lookup_cell(part, sample) {
                Ok(cell) => cell,
                Err(err) => {
                    warn!("{animation}: part '{}' hidden: {err}", part.name);
                    warnings.push(err);
                    None
                }
            };
            let cell_missing = cell.is_none() && self.expects_cell(part, sample);

            let (state, ctx) =
                self.compose(index, part, sample, parent, hidden, cell, cell_missing);
            states.push(state);
            contexts.push(ctx);
        }

        Ok(Resolved { states, contexts })
    }

    fn expects_cell(&self, part: &PartDef, sample: &TrackSample) -> bool {
        sample.attributes.cell_index >= 0
            || (!sample.present.contains(PartFlags::CELL_INDEX) && part.cell.is_some())
    }

    /// Keyed index first, then the part's default cell name. Index -1 selects nothing.
    fn lookup_cell(
        &self,
        part: &PartDef,
        sample: &TrackSample,
    ) -> Result<Option<CellEntry<'a>>, EvalError> {
        let index = sample.attributes.cell_index;
        if sample.present.contains(PartFlags::CELL_INDEX) || index >= 0 {
            if index < 0 {
                return Ok(None);
            }
            return self
                .cells
                .get(index)
                .map(Some)
                .ok_or_else(|| EvalError::resource(ResourceKind::Cell, format!("#{index}")));
        }
        match part.cell.as_deref() {
            Some(name) => self
                .cells
                .find(name)
                .map(Some)
                .ok_or_else(|| EvalError::resource(ResourceKind::Cell, name)),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compose(
        &self,
        index: usize,
        part: &PartDef,
        sample: &TrackSample,
        parent: &ParentContext,
        hidden: bool,
        cell: Option<CellEntry<'a>>,
        cell_missing: bool,
    ) -> (PartState, ParentContext) {
        let attrs = &sample.attributes;
        let present = sample.present;

        let matrix = parent.matrix * local_matrix(attrs);
        let rotation = [
            parent.rotation[0] + attrs.rotation[0],
            parent.rotation[1] + attrs.rotation[1],
            parent.rotation[2] + attrs.rotation[2],
        ];
        let scale = [
            parent.scale[0] * attrs.scale[0],
            parent.scale[1] * attrs.scale[1],
        ];
        let opacity = parent.opacity * (attrs.opacity / 255.0).clamp(0.0, 1.0);
        let visible = parent.visible && !attrs.invisible && !hidden;
        let flip_x = parent.flip_x || attrs.flip_h;
        let flip_y = parent.flip_y || attrs.flip_v;

        let ctx = ParentContext {
            matrix,
            rotation,
            scale,
            opacity,
            visible,
            flip_x,
            flip_y,
            tint: parent.tint,
        };

        let cell_size = cell.map(|c| c.size());
        let size = [
            pick_size(present.contains(PartFlags::SIZE_X), attrs.size[0], cell_size.map(|s| s[0])),
            pick_size(present.contains(PartFlags::SIZE_Y), attrs.size[1], cell_size.map(|s| s[1])),
        ];
        let scaled_size = [
            size[0] * attrs.scale[0] * self.content_scale,
            size[1] * attrs.scale[1] * self.content_scale,
        ];
        let pivot = cell.map(|c| c.cell.pivot).unwrap_or([0.0, 0.0]);

        let mut reported = rotation;
        if flip_x != flip_y {
            reported[2] = -reported[2];
        }

        // Part defaults are already folded into `attrs`.
        let radius = if present.contains(PartFlags::BOUNDING_RADIUS) || attrs.bounding_radius > 0.0
        {
            Some(attrs.bounding_radius)
        } else {
            None
        };
        let anchor = [attrs.anchor[0] + pivot[0], attrs.anchor[1] + pivot[1]];
        let bounds = derive_bounds(
            part.bounds_type,
            &matrix,
            size,
            anchor,
            attrs,
            scale,
            scaled_size,
            radius,
        );
        let bounding_radius = match bounds {
            Bounds::Circle { radius, .. } => radius,
            _ => attrs.bounding_radius,
        };

        let position = matrix.w_axis.truncate().to_array();
        let state = PartState {
            index,
            name: part.name.clone(),
            part_type: part.part_type,
            bounds_type: part.bounds_type,
            blend_type: part.blend_type,
            present,
            cell_index: cell.map(|c| c.index),
            position,
            rotation: reported,
            scale,
            anchor,
            opacity: (opacity * 255.0).round().clamp(0.0, 255.0) as u8,
            size,
            scaled_size,
            uv_rect: cell.map(|c| c.uv_rect()).unwrap_or([0.0; 4]),
            uv_move: attrs.uv_move,
            uv_rotation: attrs.uv_rotation,
            uv_scale: attrs.uv_scale,
            color_blend: attrs.color_blend,
            tint: parent.tint,
            flip_x,
            flip_y,
            visible: visible && !cell_missing,
            bounding_radius,
            bounds,
            matrix,
            instance: None,
        };
        (state, ctx)
    }
}

fn pick_size(keyed: bool, value: f32, cell: Option<f32>) -> f32 {
    match (keyed, cell) {
        (false, Some(c)) => c,
        _ => value,
    }
}

/// Local quad corners (LT, RT, LB, RB), y up, origin shifted by the anchor.
fn local_corners(size: [f32; 2], origin: [f32; 2], flip_h: bool, flip_v: bool) -> [[f32; 2]; 4] {
    let x0 = -(0.5 + origin[0]) * size[0];
    let x1 = (0.5 - origin[0]) * size[0];
    let y0 = -(0.5 + origin[1]) * size[1];
    let y1 = (0.5 - origin[1]) * size[1];
    let (l, r) = if flip_h { (-x0, -x1) } else { (x0, x1) };
    let (b, t) = if flip_v { (-y0, -y1) } else { (y0, y1) };
    [[l, t], [r, t], [l, b], [r, b]]
}

fn to_world(matrix: &Mat4, p: [f32; 2]) -> [f32; 2] {
    let v = *matrix * Vec4::new(p[0], p[1], 0.0, 1.0);
    [v.x, v.y]
}

#[allow(clippy::too_many_arguments)]
fn derive_bounds(
    kind: BoundsType,
    matrix: &Mat4,
    size: [f32; 2],
    origin: [f32; 2],
    attrs: &LocalAttributes,
    world_scale: [f32; 2],
    scaled_size: [f32; 2],
    radius: Option<f32>,
) -> Bounds {
    let center = || {
        let t = matrix.w_axis;
        [t.x, t.y]
    };
    let half_extents = [scaled_size[0].abs() * 0.5, scaled_size[1].abs() * 0.5];
    let scale_abs = [world_scale[0].abs(), world_scale[1].abs()];

    match kind {
        BoundsType::None => Bounds::None,
        BoundsType::Quad => {
            let base = local_corners(size, origin, attrs.flip_h, attrs.flip_v);
            let offsets = attrs.vertex.corners();
            let mut corners = [[0.0; 2]; 4];
            for (i, out) in corners.iter_mut().enumerate() {
                let p = [base[i][0] + offsets[i][0], base[i][1] + offsets[i][1]];
                *out = to_world(matrix, p);
            }
            Bounds::Quad { corners }
        }
        BoundsType::Aabb => {
            let base = local_corners(size, origin, attrs.flip_h, attrs.flip_v);
            let mut min = [f32::INFINITY; 2];
            let mut max = [f32::NEG_INFINITY; 2];
            for corner in base {
                let w = to_world(matrix, corner);
                for axis in 0..2 {
                    min[axis] = min[axis].min(w[axis]);
                    max[axis] = max[axis].max(w[axis]);
                }
            }
            Bounds::Aabb { min, max }
        }
        BoundsType::Circle => Bounds::Circle {
            center: center(),
            radius: radius.unwrap_or_else(|| half_extents[0].max(half_extents[1])),
        },
        BoundsType::CircleScaleMin => Bounds::Circle {
            center: center(),
            radius: match radius {
                Some(r) => r * scale_abs[0].min(scale_abs[1]),
                None => half_extents[0].min(half_extents[1]),
            },
        },
        BoundsType::CircleScaleMax => Bounds::Circle {
            center: center(),
            radius: match radius {
                Some(r) => r * scale_abs[0].max(scale_abs[1]),
                None => half_extents[0].max(half_extents[1]),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Cell, CellMap, PartType, ProjectData};

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-4, "left={a} right={b}");
    }

    fn sample(attrs: LocalAttributes, present: PartFlags) -> TrackSample {
        TrackSample {
            attributes: attrs,
            present,
            instance_frame: None,
        }
    }

    fn project() -> ProjectData {
        ProjectData {
            name: "h".into(),
            cell_maps: vec![CellMap {
                name: "atlas".into(),
                width: 64.0,
                height: 64.0,
                cells: vec![Cell {
                    name: "box".into(),
                    x: 0.0,
                    y: 0.0,
                    width: 20.0,
                    height: 10.0,
                    pivot: [0.0, 0.0],
                }],
            }],
            packs: vec![],
        }
    }

    #[test]
    fn child_follows_rotated_parent() {
        let p = project();
        let cells = CellTable::new(&p);
        let parts = vec![
            PartDef::new("root", -1, PartType::Null),
            PartDef::new("child", 0, PartType::Null),
        ];
        let spun = LocalAttributes {
            rotation: [0.0, 0.0, 90.0],
            ..LocalAttributes::default()
        };
        let child = LocalAttributes {
            position: [10.0, 0.0, 0.0],
            ..LocalAttributes::default()
        };
        let samples = vec![
            sample(spun, PartFlags::ROTATION_Z),
            sample(child, PartFlags::POSITION_X),
        ];
        let mut warnings = Vec::new();
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &parts, &samples, &root, &mut warnings)
            .unwrap();
        approx(out.states[1].position[0], 0.0);
        approx(out.states[1].position[1], 10.0);
        approx(out.states[1].rotation[2], 90.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn opacity_multiplies_and_visibility_propagates() {
        let p = project();
        let cells = CellTable::new(&p);
        let parts = vec![
            PartDef::new("root", -1, PartType::Null),
            PartDef::new("mid", 0, PartType::Null),
            PartDef::new("leaf", 1, PartType::Null),
        ];
        let half = LocalAttributes {
            opacity: 127.5,
            ..LocalAttributes::default()
        };
        let hidden = LocalAttributes {
            invisible: true,
            ..LocalAttributes::default()
        };
        let samples = vec![
            sample(half, PartFlags::OPACITY),
            sample(hidden, PartFlags::INVISIBLE),
            sample(half, PartFlags::OPACITY),
        ];
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &parts, &samples, &root, &mut Vec::new())
            .unwrap();
        assert_eq!(out.states[0].opacity, 128);
        assert_eq!(out.states[2].opacity, 64);
        assert!(out.states[0].visible);
        assert!(!out.states[1].visible);
        assert!(!out.states[2].visible);
    }

    #[test]
    fn parent_after_child_is_structure_error() {
        let p = project();
        let cells = CellTable::new(&p);
        let parts = vec![
            PartDef::new("a", 1, PartType::Null),
            PartDef::new("b", -1, PartType::Null),
        ];
        let samples = vec![TrackSample::from_defaults(&LocalAttributes::default()); 2];
        let root = ParentContext::root(&EvalConfig::default());
        let err = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &parts, &samples, &root, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.category(), "structure");
    }

    #[test]
    fn unknown_cell_hides_part_and_records_warning() {
        let p = project();
        let cells = CellTable::new(&p);
        let mut part = PartDef::new("img", -1, PartType::Normal);
        part.cell = Some("nope".into());
        let samples = vec![TrackSample::from_defaults(&LocalAttributes::default())];
        let mut warnings = Vec::new();
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &[part], &samples, &root, &mut warnings)
            .unwrap();
        assert!(!out.states[0].visible);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_recoverable());
    }

    #[test]
    fn cell_size_scaled_and_bounds_derived() {
        let p = project();
        let cells = CellTable::new(&p);
        let mut part = PartDef::new("img", -1, PartType::Normal);
        part.cell = Some("box".into());
        part.bounds_type = BoundsType::Aabb;
        let attrs = LocalAttributes {
            position: [100.0, 0.0, 0.0],
            scale: [2.0, 1.0],
            ..LocalAttributes::default()
        };
        let samples = vec![sample(attrs, PartFlags::POSITION_X | PartFlags::SCALE_X)];
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 0.5)
            .resolve("p/a", &[part], &samples, &root, &mut Vec::new())
            .unwrap();
        let s = &out.states[0];
        assert_eq!(s.cell_index, Some(0));
        assert_eq!(s.size, [20.0, 10.0]);
        assert_eq!(s.scaled_size, [20.0, 5.0]);
        assert!(s.is_drawable());
        match s.bounds {
            Bounds::Aabb { min, max } => {
                approx(min[0], 80.0);
                approx(max[0], 120.0);
                approx(min[1], -5.0);
                approx(max[1], 5.0);
            }
            other => panic!("unexpected bounds {other:?}"),
        }
    }

    #[test]
    fn single_mirror_negates_reported_z() {
        let p = project();
        let cells = CellTable::new(&p);
        let attrs = LocalAttributes {
            rotation: [0.0, 0.0, 30.0],
            flip_h: true,
            ..LocalAttributes::default()
        };
        let samples = vec![sample(attrs, PartFlags::ROTATION_Z | PartFlags::FLIP_H)];
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve(
                "p/a",
                &[PartDef::new("r", -1, PartType::Null)],
                &samples,
                &ParentContext::root(&EvalConfig::default()),
                &mut Vec::new(),
            )
            .unwrap();
        approx(out.states[0].rotation[2], -30.0);
        assert!(out.states[0].flip_x);
        approx(out.contexts[0].rotation[2], 30.0);
    }

    #[test]
    fn circle_radius_scales_with_world_scale() {
        let p = project();
        let cells = CellTable::new(&p);
        let mut part = PartDef::new("hit", -1, PartType::Null);
        part.bounds_type = BoundsType::CircleScaleMax;
        let attrs = LocalAttributes {
            scale: [3.0, 0.5],
            bounding_radius: 4.0,
            ..LocalAttributes::default()
        };
        let samples = vec![sample(attrs, PartFlags::BOUNDING_RADIUS | PartFlags::SCALE_X)];
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &[part], &samples, &root, &mut Vec::new())
            .unwrap();
        assert_eq!(
            out.states[0].bounds,
            Bounds::Circle {
                center: [0.0, 0.0],
                radius: 12.0
            }
        );
    }

    #[test]
    fn default_radius_and_cell_pivot_reach_the_state() {
        let mut p = project();
        p.cell_maps[0].cells[0].pivot = [0.25, -0.5];
        let cells = CellTable::new(&p);
        let mut part = PartDef::new("hit", -1, PartType::Normal);
        part.cell = Some("box".into());
        part.bounds_type = BoundsType::Circle;
        let defaults = LocalAttributes {
            anchor: [0.5, 0.0],
            bounding_radius: 6.0,
            ..LocalAttributes::default()
        };
        let samples = vec![TrackSample::from_defaults(&defaults)];
        let root = ParentContext::root(&EvalConfig::default());
        let out = HierarchyResolver::new(&cells, 1.0)
            .resolve("p/a", &[part], &samples, &root, &mut Vec::new())
            .unwrap();
        let s = &out.states[0];
        assert!(!s.present.contains(PartFlags::BOUNDING_RADIUS));
        assert_eq!(s.anchor, [0.75, -0.5]);
        assert_eq!(
            s.bounds,
            Bounds::Circle {
                center: [0.0, 0.0],
                radius: 6.0
            }
        );
    }
}
