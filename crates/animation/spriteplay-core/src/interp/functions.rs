//! Interpolation helpers:
//! - lerp_* (component-wise linear blend)
//! - ease (curve kind -> eased t)
//! - bezier timing inverted by bisection

use crate::data::{ColorBlend, Curve, VertexOffsets};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [lerp_f32(a[0], b[0], t), lerp_f32(a[1], b[1], t)]
}

#[inline]
pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// Blend function holds the left key; colors blend per vertex.
pub fn lerp_color_blend(a: &ColorBlend, b: &ColorBlend, t: f32) -> ColorBlend {
    let mut colors = a.colors;
    for (out, (ca, cb)) in colors.iter_mut().zip(a.colors.iter().zip(b.colors.iter())) {
        *out = lerp_vec4(*ca, *cb, t);
    }
    ColorBlend {
        func: a.func,
        per_vertex: a.per_vertex,
        colors,
    }
}

pub fn lerp_vertex(a: &VertexOffsets, b: &VertexOffsets, t: f32) -> VertexOffsets {
    VertexOffsets {
        lt: lerp_vec2(a.lt, b.lt, t),
        rt: lerp_vec2(a.rt, b.rt, t),
        lb: lerp_vec2(a.lb, b.lb, t),
        rb: lerp_vec2(a.rb, b.rb, t),
    }
}

/// Cubic Bezier basis function
#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Given control points (x1, y1, x2, y2) and an input t in [0,1],
/// compute the eased y by inverting the x bezier via binary search.
#[inline]
fn bezier_ease_t(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    // Bezier(0,0,1,1) is exactly linear
    if x1 == 0.0 && y1 == 0.0 && x2 == 1.0 && y2 == 1.0 {
        return t;
    }
    // Monotonic X in [0,1] assumed for x1/x2 in [0,1]
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = t;
    for _ in 0..24 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

/// Unit Hermite from 0 to 1 with slopes m0 and m1.
#[inline]
fn hermite_ease_t(t: f32, m0: f32, m1: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (t3 - 2.0 * t2 + t) * m0 + (-2.0 * t3 + 3.0 * t2) + (t3 - t2) * m1
}

/// Map a segment-local `t` through the curve of the segment's left key.
pub fn ease(curve: &Curve, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match *curve {
        Curve::Linear => t,
        Curve::Acceleration => t * t,
        Curve::Deceleration => {
            let u = 1.0 - t;
            1.0 - u * u
        }
        Curve::Hermite {
            start_slope,
            end_slope,
        } => hermite_ease_t(t, start_slope, end_slope),
        Curve::Bezier { x1, y1, x2, y2 } => bezier_ease_t(t, x1, y1, x2, y2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-4, "left={a} right={b}");
    }

    #[test]
    fn endpoints_are_fixed_for_every_curve() {
        let curves = [
            Curve::Linear,
            Curve::Acceleration,
            Curve::Deceleration,
            Curve::Hermite {
                start_slope: 0.0,
                end_slope: 0.0,
            },
            Curve::Bezier {
                x1: 0.42,
                y1: 0.0,
                x2: 0.58,
                y2: 1.0,
            },
        ];
        for c in &curves {
            approx(ease(c, 0.0), 0.0);
            approx(ease(c, 1.0), 1.0);
        }
    }

    #[test]
    fn acceleration_and_deceleration_bracket_linear() {
        approx(ease(&Curve::Acceleration, 0.5), 0.25);
        approx(ease(&Curve::Deceleration, 0.5), 0.75);
    }

    #[test]
    fn hermite_with_unit_slopes_is_linear() {
        let c = Curve::Hermite {
            start_slope: 1.0,
            end_slope: 1.0,
        };
        approx(ease(&c, 0.3), 0.3);
    }

    #[test]
    fn symmetric_bezier_passes_through_midpoint() {
        let c = Curve::Bezier {
            x1: 0.42,
            y1: 0.0,
            x2: 0.58,
            y2: 1.0,
        };
        approx(ease(&c, 0.5), 0.5);
        assert!(ease(&c, 0.25) < 0.25);
    }

    #[test]
    fn color_blend_keeps_left_function() {
        let a = ColorBlend {
            func: crate::data::BlendType::Add,
            per_vertex: false,
            colors: [[0.0; 4]; 4],
        };
        let b = ColorBlend {
            func: crate::data::BlendType::Mul,
            per_vertex: false,
            colors: [[1.0; 4]; 4],
        };
        let mid = lerp_color_blend(&a, &b, 0.5);
        assert_eq!(mid.func, crate::data::BlendType::Add);
        approx(mid.colors[2][3], 0.5);
    }
}
