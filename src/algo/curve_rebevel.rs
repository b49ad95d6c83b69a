//! Bevel and bevel reconstruction on curve splines.
//!
//! Curve points carry no face topology, so corner recovery works directly
//! on the polyline: the corner a selected run of points was beveled from is
//! the crossing of the two lines entering the run from its unselected
//! neighbors. Beveling goes the other way and replaces a selected corner
//! point with a profile arc between offsets along its two edges.

use std::collections::HashSet;

use nalgebra::Point3;

use crate::algo::geom::intersect_line_line;
use crate::algo::profile::{map_profile, superellipse};
use crate::algo::rebevel::ResizeMode;
use crate::error::{LoopError, Result};

/// One control point of a polyline spline.
#[derive(Debug, Clone, Copy)]
pub struct CurvePoint {
    /// Position.
    pub position: Point3<f64>,
    /// Selection flag.
    pub select: bool,
    /// Point radius, carried through bevel surgery.
    pub radius: f64,
    /// Point tilt, carried through bevel surgery.
    pub tilt: f64,
}

impl CurvePoint {
    /// Point at `position` with default radius and tilt.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            select: false,
            radius: 1.0,
            tilt: 0.0,
        }
    }

    /// Mark the point selected.
    pub fn selected(mut self) -> Self {
        self.select = true;
        self
    }
}

/// A polyline spline.
#[derive(Debug, Clone, Default)]
pub struct CurveSpline {
    /// Control points in order.
    pub points: Vec<CurvePoint>,
    /// Whether the spline closes back on itself.
    pub cyclic: bool,
}

impl CurveSpline {
    /// Open spline through the given positions, nothing selected.
    pub fn open(positions: &[Point3<f64>]) -> Self {
        Self {
            points: positions.iter().map(|&p| CurvePoint::new(p)).collect(),
            cyclic: false,
        }
    }
}

/// Options for beveling selected curve points.
#[derive(Debug, Clone, Copy)]
pub struct CurveBevelOptions {
    /// Bevel width; uniform mode measures it against the curve extent,
    /// proportional mode against each point's edge lengths.
    pub size: f64,
    /// Inserted segment count; the arc gets `segments + 2` points.
    pub segments: usize,
    /// Profile tension in `-1.0..=1.0`.
    pub tension: f64,
    /// Width interpretation.
    pub resize: ResizeMode,
}

impl Default for CurveBevelOptions {
    fn default() -> Self {
        Self {
            size: 0.5,
            segments: 2,
            tension: 0.5,
            resize: ResizeMode::Uniform,
        }
    }
}

/// Options for rebuilding an existing curve bevel.
#[derive(Debug, Clone, Copy)]
pub struct CurveRebevelOptions {
    /// New bevel width relative to the reconstructed corner; below `0.001`
    /// the run collapses into the corner point.
    pub size: f64,
    /// Segment count of the rebuilt arc; see [`chain_segments`] for the
    /// count the selection currently has.
    pub segments: usize,
    /// Profile tension in `-1.0..=1.0`.
    pub tension: f64,
}

impl Default for CurveRebevelOptions {
    fn default() -> Self {
        Self {
            size: 1.0,
            segments: 2,
            tension: 0.5,
        }
    }
}

/// One run of consecutive selected points, skipping `ignored` indices.
///
/// Wraps past the seam when the run starts at index zero. Returns an empty
/// run when the whole spline or only a single point is selected; neither
/// leaves two boundary points to rebuild against.
fn selected_chain(spline: &CurveSpline, ignored: &HashSet<usize>) -> Vec<usize> {
    let count = spline.points.len();
    let mut chain = Vec::new();
    for (idx, pt) in spline.points.iter().enumerate() {
        if pt.select && !ignored.contains(&idx) {
            chain.push(idx);
        } else if !chain.is_empty() {
            break;
        }
    }
    if chain.len() == count || chain.len() == 1 {
        return Vec::new();
    }
    if chain.first() == Some(&0) {
        for idx in (0..count).rev() {
            let pt = &spline.points[idx];
            if pt.select && !ignored.contains(&idx) {
                chain.insert(0, idx);
            } else {
                break;
            }
        }
    }
    chain
}

/// Segment count of the first selected run on `spline`, if any.
///
/// This is the count that leaves the selection's shape unchanged when
/// passed to [`curve_rebevel`].
pub fn chain_segments(spline: &CurveSpline) -> Option<usize> {
    let chain = selected_chain(spline, &HashSet::new());
    if chain.len() < 2 {
        None
    } else {
        Some(chain.len() - 2)
    }
}

fn bounding_diagonal(splines: &[CurveSpline]) -> f64 {
    let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for pt in splines.iter().flat_map(|s| &s.points) {
        min = min.inf(&pt.position);
        max = max.sup(&pt.position);
    }
    if min.x > max.x {
        return 0.0;
    }
    (max - min).norm()
}

fn any_selected(splines: &[CurveSpline]) -> bool {
    splines
        .iter()
        .any(|s| s.points.iter().any(|p| p.select))
}

/// Bevel every selected point of the given splines.
///
/// Each selected point is replaced by a `segments + 2` point profile arc
/// spanning offsets along its two edges; offsets are clamped so the arc
/// never overshoots a neighboring point.
pub fn curve_bevel(splines: &mut [CurveSpline], opts: &CurveBevelOptions) -> Result<()> {
    if !any_selected(splines) {
        return Err(LoopError::invalid_selection(
            "no selected points on any spline",
        ));
    }
    if opts.size <= 0.0 {
        return Ok(());
    }
    let extent = bounding_diagonal(splines) / 4.0;
    let profile = superellipse(opts.tension, opts.segments + 2);

    for spline in splines.iter_mut() {
        let count = spline.points.len();
        let original: Vec<Point3<f64>> = spline.points.iter().map(|p| p.position).collect();
        let mut offset = 0;
        for idx in 0..count {
            let at = idx + offset;
            if !spline.points[at].select {
                continue;
            }
            let template = spline.points[at];
            let target = template.position;
            let to_prev = original[(idx + count - 1) % count] - target;
            let to_next = original[(idx + 1) % count] - target;

            let (mut off_prev, mut off_next) = match opts.resize {
                ResizeMode::Uniform => (
                    to_prev.normalize() * opts.size * extent,
                    to_next.normalize() * opts.size * extent,
                ),
                ResizeMode::Proportional => (to_prev * opts.size, to_next * opts.size),
            };
            // Never reach past the neighboring point.
            if off_prev.norm() >= to_prev.norm() {
                off_prev = to_prev;
            }
            if off_next.norm() >= to_next.norm() {
                off_next = to_next;
            }

            let arc = map_profile(
                &profile,
                &(target + off_prev),
                &target,
                &(target + off_next),
                opts.tension,
            );
            // The selected point becomes the last arc point; the rest are
            // inserted before it.
            spline.points[at].position = arc[arc.len() - 1];
            let inserted = arc[..arc.len() - 1]
                .iter()
                .map(|&p| CurvePoint {
                    position: p,
                    ..template
                });
            spline.points.splice(at..at, inserted);
            offset += opts.segments + 1;
        }
    }
    Ok(())
}

/// Rebuild or collapse every selected run of points on the given splines.
///
/// The corner each run was beveled from is recovered by crossing the two
/// boundary lines entering the run; parallel boundaries fall back to an
/// offset past the run midpoint.
pub fn curve_rebevel(splines: &mut [CurveSpline], opts: &CurveRebevelOptions) -> Result<()> {
    if !any_selected(splines) {
        return Err(LoopError::invalid_selection(
            "no selected points on any spline",
        ));
    }
    let target_count = opts.segments + 2;
    let profile = superellipse(opts.tension, target_count);

    for spline in splines.iter_mut() {
        let mut ignored: HashSet<usize> = HashSet::new();
        loop {
            let count = spline.points.len();
            let chain = selected_chain(spline, &ignored);
            if chain.is_empty() {
                break;
            }
            let first = chain[0];
            let last = chain[chain.len() - 1];
            let v1 = spline.points[first].position;
            let vn = spline.points[last].position;
            let prev = spline.points[(first + count - 1) % count].position;
            let next = spline.points[(last + 1) % count].position;

            let target = match intersect_line_line(&prev, &v1, &next, &vn) {
                Some((a, b)) => nalgebra::center(&a, &b),
                None => {
                    // Parallel boundaries: push the midpoint outward along
                    // the incoming direction by half the run width.
                    let dir = (v1 - prev).normalize();
                    nalgebra::center(&v1, &vn) + dir * (v1 - vn).norm() / 2.0
                }
            };

            let mut run: Vec<CurvePoint> = chain.iter().map(|&i| spline.points[i]).collect();
            let mut removed: Vec<usize> = chain.clone();
            removed.sort_unstable_by(|a, b| b.cmp(a));
            for i in removed {
                spline.points.remove(i);
            }
            // Insert where the run started, accounting for removed indices
            // before it (wrapped runs remove points on both sides).
            let insert_at = first - chain.iter().filter(|&&i| i < first).count();

            if opts.size < 0.001 {
                run[0].position = target;
                spline.points.insert(insert_at, run[0]);
                ignored = renumbered(&ignored, insert_at, 1);
                ignored.insert(insert_at);
            } else {
                run.truncate(target_count);
                while run.len() < target_count {
                    run.push(run[run.len() - 1]);
                }
                let offset_v1 = target + (v1 - target) * opts.size;
                let offset_v2 = target + (vn - target) * opts.size;
                let arc = map_profile(&profile, &offset_v1, &target, &offset_v2, opts.tension);
                for (pt, pos) in run.iter_mut().zip(arc) {
                    pt.position = pos;
                }
                spline
                    .points
                    .splice(insert_at..insert_at, run.into_iter());
                ignored = renumbered(&ignored, insert_at, target_count);
                ignored.extend(insert_at..insert_at + target_count);
            }
        }
    }
    Ok(())
}

/// Shift ignored indices at or past an insertion point.
fn renumbered(ignored: &HashSet<usize>, at: usize, inserted: usize) -> HashSet<usize> {
    ignored
        .iter()
        .map(|&i| if i >= at { i + inserted } else { i })
        .collect()
}
