//! Utilities for numerics.

use nalgebra::Vector2;

/// Clamps `v` to the unit interval.
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Linearly interpolates between `a` and `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Hermite smoothstep between `edge0` and `edge1`.
///
/// Returns 0.0 for `v <= edge0`, 1.0 for `v >= edge1`, and eases smoothly in between.
/// Degenerate edges (`edge0 >= edge1`) turn this into a hard step at `edge0`.
pub fn smoothstep(edge0: f32, edge1: f32, v: f32) -> f32 {
    if edge0 >= edge1 {
        return if v < edge0 { 0.0 } else { 1.0 };
    }
    let t = clamp01((v - edge0) / (edge1 - edge0));
    t * t * (3.0 - 2.0 * t)
}

/// Normalizes `v`, flooring the denominator so near-zero vectors return `fallback`
/// instead of NaN.
pub fn normalize_or(v: Vector2<f32>, fallback: Vector2<f32>) -> Vector2<f32> {
    let len = v.norm();
    if len > 1e-6 {
        v / len
    } else {
        fallback
    }
}
