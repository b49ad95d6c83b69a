//! Spline fitting and evaluation.
//!
//! Fits a natural cubic or linear spline through a sequence of knot
//! positions parametrized by arc length, and evaluates it at arbitrary
//! parameters. This is the numerical core shared by the curve, relax and
//! space operations.
//!
//! # Algorithm
//!
//! The cubic fit solves the natural cubic spline system per axis with the
//! Thomas algorithm (tridiagonal back substitution). Circular loops are
//! handled by padding four wrap-around knots on each end before solving, so
//! the seam picks up curvature from both sides; the padded segments simply
//! become part of the evaluable range.
//!
//! Degenerate intervals (coincident knots) are floored at `1e-8` instead of
//! rejected, so stacked vertices never poison the solve with NaN.

use nalgebra::{Point3, Vector3};

use crate::error::{LoopError, Result};

/// Interpolation mode for spline fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Natural cubic interpolation.
    #[default]
    Cubic,
    /// Piecewise linear interpolation.
    Linear,
}

/// One cubic segment: `a + b*dt + c*dt^2 + d*dt^3` with `dt = m - t`.
#[derive(Debug, Clone, Copy)]
pub struct CubicSegment {
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
    d: Vector3<f64>,
    t: f64,
}

/// One linear segment: `a + d * (m - t) / u`.
#[derive(Debug, Clone, Copy)]
pub struct LinearSegment {
    a: Vector3<f64>,
    d: Vector3<f64>,
    t: f64,
    u: f64,
}

/// A fitted spline, evaluable at any parameter value.
///
/// Parameters outside the knot range are clamped to the first or last
/// segment, which extrapolates.
#[derive(Debug, Clone)]
pub enum Spline {
    /// Natural cubic segments.
    Cubic(Vec<CubicSegment>),
    /// Linear segments.
    Linear(Vec<LinearSegment>),
}

impl Spline {
    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        match self {
            Spline::Cubic(segs) => segs.len(),
            Spline::Linear(segs) => segs.len(),
        }
    }

    /// Evaluate the spline at parameter `m`.
    ///
    /// The segment is chosen as the one whose start parameter is the largest
    /// not exceeding `m`, clamped to the valid range.
    pub fn evaluate(&self, m: f64) -> Point3<f64> {
        match self {
            Spline::Cubic(segs) => {
                let n = segment_index(segs.iter().map(|s| s.t), segs.len(), m);
                let seg = &segs[n];
                let dt = m - seg.t;
                Point3::from(seg.a + seg.b * dt + seg.c * (dt * dt) + seg.d * (dt * dt * dt))
            }
            Spline::Linear(segs) => {
                let n = segment_index(segs.iter().map(|s| s.t), segs.len(), m);
                let seg = &segs[n];
                let u = if seg.u == 0.0 { 1e-8 } else { seg.u };
                Point3::from(seg.a + seg.d * ((m - seg.t) / u))
            }
        }
    }
}

fn segment_index(starts: impl Iterator<Item = f64>, len: usize, m: f64) -> usize {
    let mut n = 0usize;
    for (i, t) in starts.enumerate() {
        if t <= m {
            n = i;
        } else {
            break;
        }
    }
    n.min(len.saturating_sub(1))
}

/// Cumulative chord-length parameters for a sequence of positions.
///
/// `tknots[0]` is `0.0` and each following entry adds the distance to the
/// previous position.
pub fn chord_parametrize(points: &[Point3<f64>]) -> Vec<f64> {
    let mut tknots = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += (p - points[i - 1]).norm();
        }
        tknots.push(total);
    }
    tknots
}

/// Fit a spline through `knots` using chord-length parametrization.
///
/// For circular loops the knot sequence is closed by repeating the first
/// knot at the end before fitting.
pub fn fit_spline(
    knots: &[Point3<f64>],
    interpolation: Interpolation,
    circular: bool,
) -> Result<Spline> {
    if knots.len() < 2 {
        return Err(LoopError::invalid_selection(
            "spline fitting needs at least two knots",
        ));
    }
    let mut closed: Vec<Point3<f64>> = knots.to_vec();
    if circular && closed.first() != closed.last() {
        closed.push(closed[0]);
    }
    let tknots = chord_parametrize(&closed);
    fit_spline_with_knots(&closed, &tknots, interpolation)
}

/// Fit a spline through `knots` with explicit parameter values.
///
/// A circular loop is recognized by the first and last knot positions being
/// equal. `tknots` must have one entry per knot.
pub fn fit_spline_with_knots(
    knots: &[Point3<f64>],
    tknots: &[f64],
    interpolation: Interpolation,
) -> Result<Spline> {
    if knots.len() < 2 {
        return Err(LoopError::invalid_selection(
            "spline fitting needs at least two knots",
        ));
    }
    if knots.len() != tknots.len() {
        return Err(LoopError::invalid_param(
            "tknots",
            tknots.len() as f64,
            "one parameter value per knot required",
        ));
    }
    match interpolation {
        Interpolation::Cubic => fit_cubic(knots, tknots),
        Interpolation::Linear => Ok(fit_linear(knots, tknots)),
    }
}

fn fit_linear(knots: &[Point3<f64>], tknots: &[f64]) -> Spline {
    let mut segs = Vec::with_capacity(knots.len() - 1);
    for i in 0..knots.len() - 1 {
        segs.push(LinearSegment {
            a: knots[i].coords,
            d: knots[i + 1] - knots[i],
            t: tknots[i],
            u: tknots[i + 1] - tknots[i],
        });
    }
    Spline::Linear(segs)
}

fn fit_cubic(knots: &[Point3<f64>], tknots: &[f64]) -> Result<Spline> {
    let mut knots = knots.to_vec();
    let mut tknots = tknots.to_vec();

    // Circular loops get four wrap-around knots on each side so the seam
    // carries curvature from both directions.
    let circular = knots.len() > 1 && knots.first() == knots.last();
    if circular {
        pad_circular(&mut knots, &mut tknots);
    }

    let n = knots.len();
    let x = &tknots;

    let mut h = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let step = x[i + 1] - x[i];
        h.push(if step == 0.0 { 1e-8 } else { step });
    }

    // One tridiagonal solve per axis.
    let mut coeffs: [Vec<[f64; 4]>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (axis, out) in coeffs.iter_mut().enumerate() {
        let a: Vec<f64> = knots.iter().map(|k| k[axis]).collect();

        let mut q = vec![0.0; n];
        for i in 1..n - 1 {
            q[i] = 3.0 / h[i] * (a[i + 1] - a[i]) - 3.0 / h[i - 1] * (a[i] - a[i - 1]);
        }

        let mut l = vec![1.0; n];
        let mut u = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            let mut li = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * u[i - 1];
            if li == 0.0 {
                li = 1e-8;
            }
            l[i] = li;
            u[i] = h[i] / li;
            z[i] = (q[i] - h[i - 1] * z[i - 1]) / li;
        }

        let mut b = vec![0.0; n - 1];
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n - 1];
        for i in (0..n - 1).rev() {
            c[i] = z[i] - u[i] * c[i + 1];
            b[i] = (a[i + 1] - a[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0;
            d[i] = (c[i + 1] - c[i]) / (3.0 * h[i]);
        }

        for i in 0..n - 1 {
            out.push([a[i], b[i], c[i], d[i]]);
        }
    }

    let mut segs = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let pick = |part: usize| {
            Vector3::new(coeffs[0][i][part], coeffs[1][i][part], coeffs[2][i][part])
        };
        segs.push(CubicSegment {
            a: pick(0),
            b: pick(1),
            c: pick(2),
            d: pick(3),
            t: x[i],
        });
    }
    Ok(Spline::Cubic(segs))
}

fn pad_circular(knots: &mut Vec<Point3<f64>>, tknots: &mut Vec<f64>) {
    let n = knots.len() as isize;
    let wrap = |i: isize| -> usize { (((i % n) + n) % n) as usize };

    let front: Vec<Point3<f64>> = (1..=4).map(|k| knots[wrap(-k - 1)]).collect();
    let back: Vec<Point3<f64>> = (0..4).map(|k| knots[wrap(k + 1)]).collect();

    let mut t_front = Vec::with_capacity(4);
    let mut total = 0.0;
    for t in 1..=4 {
        total += tknots[wrap(-t)] - tknots[wrap(-t - 1)];
        t_front.push(tknots[0] - total);
    }
    let mut t_back = Vec::with_capacity(4);
    let mut total = 0.0;
    for t in 0..4 {
        total += tknots[wrap(t + 1)] - tknots[wrap(t)];
        t_back.push(tknots[tknots.len() - 1] + total);
    }

    for (k, t) in front.into_iter().zip(t_front) {
        knots.insert(0, k);
        tknots.insert(0, t);
    }
    knots.extend(back);
    tknots.extend(t_back);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolates_knots() {
        let knots = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let spline = fit_spline(&knots, Interpolation::Linear, false).unwrap();
        let tknots = chord_parametrize(&knots);
        for (k, &t) in knots.iter().zip(&tknots) {
            assert!((spline.evaluate(t) - k).norm() < 1e-12);
        }
        // Halfway along the first segment.
        let mid = spline.evaluate(tknots[1] / 2.0);
        assert!((mid - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cubic_interpolates_knots() {
        let knots = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, -1.0, 0.5),
        ];
        let spline = fit_spline(&knots, Interpolation::Cubic, false).unwrap();
        let tknots = chord_parametrize(&knots);
        for (k, &t) in knots.iter().zip(&tknots) {
            assert!((spline.evaluate(t) - k).norm() < 1e-9);
        }
    }

    #[test]
    fn test_cubic_circular_seam_continuity() {
        let knots = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        ];
        let spline = fit_spline(&knots, Interpolation::Cubic, true).unwrap();
        let mut closed = knots.clone();
        closed.push(closed[0]);
        let tknots = chord_parametrize(&closed);
        let total = tknots[tknots.len() - 1];

        // Passes through all knots including the closing one.
        for (k, &t) in closed.iter().zip(&tknots) {
            assert!((spline.evaluate(t) - k).norm() < 1e-9);
        }
        // Approaching the seam from both sides lands near the first knot.
        let before = spline.evaluate(total - 1e-6);
        let after = spline.evaluate(1e-6);
        assert!((before - knots[0]).norm() < 1e-3);
        assert!((after - knots[0]).norm() < 1e-3);
    }

    #[test]
    fn test_evaluate_clamps_out_of_range() {
        let knots = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let spline = fit_spline(&knots, Interpolation::Linear, false).unwrap();
        // Out-of-range parameters extrapolate along the end segments.
        assert!((spline.evaluate(2.0) - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((spline.evaluate(-1.0) - Point3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_stacked_knots_stay_finite() {
        let knots = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let spline = fit_spline(&knots, Interpolation::Cubic, false).unwrap();
        let p = spline.evaluate(0.5);
        assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
    }

    #[test]
    fn test_too_few_knots_rejected() {
        let knots = vec![Point3::new(0.0, 0.0, 0.0)];
        assert!(fit_spline(&knots, Interpolation::Cubic, false).is_err());
    }
}
