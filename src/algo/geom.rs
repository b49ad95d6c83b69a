//! Small geometric intersection helpers.
//!
//! Shared by the circle re-projection chain and the bevel target solver.
//! All functions operate on `f64` points and vectors and return `None` for
//! parallel or degenerate configurations instead of producing NaN.

use nalgebra::{Point3, Vector3};

const EPSILON: f64 = 1e-12;

/// Closest point on the infinite line through `a` and `b` to `p`, together
/// with the interpolation factor along `a -> b`.
pub fn intersect_point_line(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
) -> (Point3<f64>, f64) {
    let dir = b - a;
    let len2 = dir.norm_squared();
    if len2 < EPSILON {
        return (*a, 0.0);
    }
    let t = (p - a).dot(&dir) / len2;
    (a + dir * t, t)
}

/// Closest points between two infinite lines, each given by two points.
///
/// Returns `None` when the lines are parallel or either is degenerate.
pub fn intersect_line_line(
    a1: &Point3<f64>,
    a2: &Point3<f64>,
    b1: &Point3<f64>,
    b2: &Point3<f64>,
) -> Option<(Point3<f64>, Point3<f64>)> {
    let d1 = a2 - a1;
    let d2 = b2 - b1;
    let r = a1 - b1;

    let a = d1.norm_squared();
    let e = d2.norm_squared();
    if a < EPSILON || e < EPSILON {
        return None;
    }
    let b = d1.dot(&d2);
    let c = d1.dot(&r);
    let f = d2.dot(&r);

    let denom = a * e - b * b;
    if denom.abs() < EPSILON {
        return None;
    }
    let s = (b * f - c * e) / denom;
    let t = (a * f - b * c) / denom;
    Some((a1 + d1 * s, b1 + d2 * t))
}

/// Intersection of the line through `l1` and `l2` with a plane.
///
/// Returns `None` when the line is parallel to the plane.
pub fn intersect_line_plane(
    l1: &Point3<f64>,
    l2: &Point3<f64>,
    plane_co: &Point3<f64>,
    plane_no: &Vector3<f64>,
) -> Option<Point3<f64>> {
    let dir = l2 - l1;
    let denom = dir.dot(plane_no);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = (plane_co - l1).dot(plane_no) / denom;
    Some(l1 + dir * t)
}

/// Intersection line of two planes as a point and direction.
///
/// Returns `None` when the planes are parallel.
pub fn intersect_plane_plane(
    co1: &Point3<f64>,
    no1: &Vector3<f64>,
    co2: &Point3<f64>,
    no2: &Vector3<f64>,
) -> Option<(Point3<f64>, Vector3<f64>)> {
    let dir = no1.cross(no2);
    let det = dir.norm_squared();
    if det < EPSILON {
        return None;
    }
    let d1 = no1.dot(&co1.coords);
    let d2 = no2.dot(&co2.coords);
    let point = Point3::from((dir.cross(no2) * d1 + no1.cross(&dir) * d2) / det);
    Some((point, dir))
}

/// Forward ray/triangle intersection (Moeller-Trumbore).
///
/// Returns the intersection point when the ray from `origin` along `ray`
/// hits the triangle at a non-negative parameter, `None` otherwise.
pub fn intersect_ray_tri(
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    v3: &Point3<f64>,
    ray: &Vector3<f64>,
    origin: &Point3<f64>,
) -> Option<Point3<f64>> {
    let edge1 = v2 - v1;
    let edge2 = v3 - v1;
    let pvec = ray.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v1;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&edge1);
    let v = ray.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some(origin + ray * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_line() {
        let (p, t) = intersect_point_line(
            &Point3::new(0.5, 1.0, 0.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
        );
        assert!((p - Point3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
        assert!((t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_line_line_skew() {
        // Lines along x and y, offset in z.
        let (p1, p2) = intersect_line_line(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, -1.0, 1.0),
            &Point3::new(0.0, 1.0, 1.0),
        )
        .unwrap();
        assert!((p1 - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((p2 - Point3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_line_line_parallel() {
        let result = intersect_line_line(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_line_plane() {
        let hit = intersect_line_plane(
            &Point3::new(0.0, 0.0, -1.0),
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::new(5.0, 5.0, 0.25),
            &Vector3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        assert!((hit - Point3::new(0.0, 0.0, 0.25)).norm() < 1e-12);
    }

    #[test]
    fn test_plane_plane() {
        let (point, dir) = intersect_plane_plane(
            &Point3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        // Intersection is the line x = 0, z = 1 along y.
        assert!(point.x.abs() < 1e-12);
        assert!((point.z - 1.0).abs() < 1e-12);
        assert!(dir.normalize().x.abs() < 1e-12);
        assert!(dir.normalize().z.abs() < 1e-12);
    }

    #[test]
    fn test_ray_tri() {
        let v1 = Point3::new(0.0, 0.0, 0.0);
        let v2 = Point3::new(1.0, 0.0, 0.0);
        let v3 = Point3::new(0.0, 1.0, 0.0);
        let hit = intersect_ray_tri(
            &v1,
            &v2,
            &v3,
            &Vector3::new(0.0, 0.0, -1.0),
            &Point3::new(0.25, 0.25, 1.0),
        )
        .unwrap();
        assert!((hit - Point3::new(0.25, 0.25, 0.0)).norm() < 1e-12);

        // Behind the origin.
        let miss = intersect_ray_tri(
            &v1,
            &v2,
            &v3,
            &Vector3::new(0.0, 0.0, 1.0),
            &Point3::new(0.25, 0.25, 1.0),
        );
        assert!(miss.is_none());

        // Outside the triangle.
        let miss = intersect_ray_tri(
            &v1,
            &v2,
            &v3,
            &Vector3::new(0.0, 0.0, -1.0),
            &Point3::new(0.9, 0.9, 1.0),
        );
        assert!(miss.is_none());
    }
}
