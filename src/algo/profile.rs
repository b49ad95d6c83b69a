//! Bevel profile generation.
//!
//! Builds the normalized cross-section a rebuilt bevel follows, as a
//! superellipse arc in the unit corner frame spanned by (1,0,0), (1,1,0)
//! and (0,1,0), and maps it barycentrically onto an actual corner (edge
//! vertex, bevel target, edge vertex).
//!
//! # Tension
//!
//! `0` is a flat chamfer, `0.5` a quarter circle, `1` a sharp corner
//! through the target. Between `0.5` and `1` the superellipse exponent
//! grows exponentially so the profile tightens into the corner. Negative
//! tension mirrors the profile to the far side of the chord.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use nalgebra::{Point3, Vector3};

const A10: Point3<f64> = Point3::new(1.0, 0.0, 0.0);
const A11: Point3<f64> = Point3::new(1.0, 1.0, 0.0);
const A01: Point3<f64> = Point3::new(0.0, 1.0, 0.0);

fn lerp(a: &Point3<f64>, b: &Point3<f64>, t: f64) -> Point3<f64> {
    a + (b - a) * t
}

/// Normalized profile points in the unit corner frame.
///
/// Returns `segments` points running from `(1,0,0)` to `(0,1,0)`.
/// `segments` must be at least 2.
pub fn superellipse(tension: f64, segments: usize) -> Vec<Point3<f64>> {
    let tension = tension.abs();
    let last = (segments - 1) as f64;

    if tension == 1.0 {
        // Sharp corner: sample the two corner edges directly.
        return (0..segments)
            .map(|i| {
                let t = i as f64 / last;
                if t < 0.5 {
                    lerp(&A10, &A11, t * 2.0)
                } else {
                    lerp(&A11, &A01, (t - 0.5) * 2.0)
                }
            })
            .collect();
    }

    if tension < 0.5 {
        // Blend between the flat chord and a quarter circle.
        return (0..segments)
            .map(|i| {
                let t = i as f64 / last;
                let flat = lerp(&A10, &A01, t);
                let angle = FRAC_PI_2 * t;
                let circle = Point3::new(angle.cos(), angle.sin(), 0.0);
                lerp(&flat, &circle, tension * 2.0)
            })
            .collect();
    }

    // Superellipse, exponent mapped from (0.5, 1) to (2, inf).
    let n_pow = 2.0 * tension + 1.0 + 2f64.powf((tension - 0.5) * 10.0) - 1.0;
    let mut first_pass: Vec<Point3<f64>> = (0..segments)
        .map(|i| {
            let t = i as f64 / last;
            let t_remapped = FRAC_PI_4 * t.powf(n_pow / 2.0);
            Point3::new(
                t_remapped.cos().powf(2.0 / n_pow),
                t_remapped.sin().powf(2.0 / n_pow),
                0.0,
            )
        })
        .collect();
    // Only the 0..45 degree range was sampled; mirror around y = x for the
    // rest, excluding the diagonal point itself.
    for i in (0..segments - 1).rev() {
        let p = first_pass[i];
        first_pass.push(Point3::new(p.y, p.x, p.z));
    }
    resample(&first_pass, segments)
}

/// Linear per-component resampling of a polyline to `count` points over a
/// uniform parameter range.
fn resample(points: &[Point3<f64>], count: usize) -> Vec<Point3<f64>> {
    let n = points.len();
    let step_in = 1.0 / (n - 1) as f64;
    (0..count)
        .map(|i| {
            let x = i as f64 / (count - 1) as f64;
            let pos = x / step_in;
            let idx = (pos.floor() as usize).min(n - 2);
            let frac = pos - idx as f64;
            lerp(&points[idx], &points[idx + 1], frac)
        })
        .collect()
}

/// Reflect `pt` across the line through `v1` and `v2`.
pub fn reflect_point(v1: &Point3<f64>, v2: &Point3<f64>, pt: &Point3<f64>) -> Point3<f64> {
    let dir = v2 - v1;
    let len = dir.norm();
    if len == 0.0 {
        return *pt;
    }
    let dir = dir / len;
    let rel = pt - v1;
    let parallel = dir.dot(&rel) * dir;
    let perp = rel - parallel;
    v1 + parallel - perp
}

/// Map one point from the unit corner frame onto an actual corner.
fn barycentric_map(
    p: &Point3<f64>,
    d1: &Point3<f64>,
    d2: &Point3<f64>,
    d3: &Point3<f64>,
) -> Point3<f64> {
    // Source triangle is (A10, A11, A01); solve for the coefficients of p
    // in its edge basis with 2x2 normal equations.
    let e1: Vector3<f64> = A11 - A10;
    let e2: Vector3<f64> = A01 - A10;
    let rel = p - A10;
    let a = e1.dot(&e1);
    let b = e1.dot(&e2);
    let c = e2.dot(&e2);
    let det = a * c - b * b;
    let r1 = rel.dot(&e1);
    let r2 = rel.dot(&e2);
    let s = (r1 * c - r2 * b) / det;
    let t = (a * r2 - b * r1) / det;
    d1 + (d2 - d1) * s + (d3 - d1) * t
}

/// Map a normalized profile onto the corner `(v1, target, v2)`.
///
/// Negative tension reflects the target across the chord first, bulging
/// the profile outward instead of inward.
pub fn map_profile(
    profile: &[Point3<f64>],
    v1: &Point3<f64>,
    target: &Point3<f64>,
    v2: &Point3<f64>,
    tension: f64,
) -> Vec<Point3<f64>> {
    let target = if tension < 0.0 {
        reflect_point(v1, v2, target)
    } else {
        *target
    };
    profile
        .iter()
        .map(|p| barycentric_map(p, v1, &target, v2))
        .collect()
}
