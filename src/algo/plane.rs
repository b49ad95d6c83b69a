//! Best-fit plane calculation.
//!
//! Fits a plane through the vertices of a loop, either by principal
//! component analysis of the vertex positions or by averaging the vertex
//! normals. The flatten and circle operations both project onto the result.
//!
//! # Algorithm
//!
//! The best-fit normal is the eigenvector of the covariance matrix with the
//! smallest eigenvalue, found by power iteration on the inverted covariance
//! matrix. The inversion is done with an explicit adjugate-over-determinant
//! formula; a singular matrix (perfectly flat or collinear input) falls back
//! to the coordinate axis with the smallest covariance row sum.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::algo::loops::Loop;
use crate::mesh::EditMesh;

/// How the plane orientation is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneFitMethod {
    /// Principal component analysis of the loop vertex positions.
    #[default]
    BestFit,
    /// Average of the loop vertex normals.
    Normal,
}

/// A plane through `com` with unit-ish `normal`.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Center of mass of the fitted vertices.
    pub com: Point3<f64>,
    /// Plane normal. Not guaranteed to be exactly unit length for
    /// degenerate input.
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Project a point onto the plane along the normal.
    pub fn project(&self, p: &Point3<f64>) -> Point3<f64> {
        p - (p - self.com).dot(&self.normal) * self.normal
    }
}

/// Fit a plane through the vertices of `lp`.
pub fn fit_plane(mesh: &EditMesh, lp: &Loop, method: PlaneFitMethod) -> Plane {
    let locs: Vec<Point3<f64>> = lp.verts.iter().map(|&v| *mesh.position(v)).collect();
    let com = centroid(&locs);
    let normal = match method {
        PlaneFitMethod::BestFit => best_fit_normal(&locs, &com),
        PlaneFitMethod::Normal => {
            let normals = mesh.vertex_normals();
            let mut normal = Vector3::zeros();
            for &v in &lp.verts {
                normal += normals[v.index()];
            }
            normal /= lp.verts.len() as f64;
            let len = normal.norm();
            if len > 0.0 {
                normal /= len;
            }
            normal
        }
    };
    Plane { com, normal }
}

/// Center of mass of a point set.
pub fn centroid(locs: &[Point3<f64>]) -> Point3<f64> {
    let mut com = Vector3::zeros();
    for loc in locs {
        com += loc.coords;
    }
    Point3::from(com / locs.len() as f64)
}

/// Smallest-eigenvalue direction of the covariance matrix of `locs`.
pub fn best_fit_normal(locs: &[Point3<f64>], com: &Point3<f64>) -> Vector3<f64> {
    let mut mat = Matrix3::zeros();
    for loc in locs {
        let d = loc - com;
        for row in 0..3 {
            for col in 0..3 {
                mat[(row, col)] += d[row] * d[col];
            }
        }
    }

    let inv = match adjugate_invert(&mat) {
        Some(inv) => inv,
        None => {
            // Singular covariance: pick the axis with the smallest row sum.
            let sums: Vec<f64> = (0..3)
                .map(|r| (mat[(r, 0)] + mat[(r, 1)] + mat[(r, 2)]).abs())
                .collect();
            let mut ax = 2;
            if sums[0] < sums[1] {
                if sums[0] < sums[2] {
                    ax = 0;
                }
            } else if sums[1] < sums[2] {
                ax = 1;
            }
            let mut normal = Vector3::zeros();
            normal[ax] = 1.0;
            return normal;
        }
    };

    // Power iteration on the inverse converges on the smallest eigenvector.
    let mut vec2 = Vector3::new(1.0, 1.0, 1.0);
    for _ in 0..500 {
        let vec = vec2;
        vec2 = inv * vec;
        let len = (vec2.x * vec2.x + vec2.y * vec2.y + vec2.z * vec2.z).sqrt();
        if len != 0.0 {
            vec2 /= len;
        }
        if vec2 == vec {
            break;
        }
    }
    if vec2.norm() == 0.0 {
        vec2 = Vector3::new(1.0, 1.0, 1.0);
    }
    vec2
}

/// Explicit adjugate-over-determinant inverse. `None` for a singular
/// matrix.
fn adjugate_invert(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let r = Matrix3::new(
        m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
        m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
        m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
        m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
        m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
        m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
        m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
        m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
    );
    let det = m[(0, 0)] * r[(0, 0)] + m[(0, 1)] * r[(1, 0)] + m[(0, 2)] * r[(2, 0)];
    if det == 0.0 {
        return None;
    }
    Some(r / det)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;

    #[test]
    fn test_best_fit_planar_points() {
        // Slightly noisy ring around z = 0.
        let locs: Vec<Point3<f64>> = (0..8)
            .map(|i| {
                let a = i as f64 / 8.0 * std::f64::consts::TAU;
                Point3::new(a.cos(), a.sin(), if i % 2 == 0 { 0.01 } else { -0.01 })
            })
            .collect();
        let com = centroid(&locs);
        let n = best_fit_normal(&locs, &com);
        assert!(n.z.abs() / n.norm() > 0.999);
    }

    #[test]
    fn test_singular_falls_back_to_axis() {
        // Collinear along x: covariance is singular.
        let locs = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let com = centroid(&locs);
        let n = best_fit_normal(&locs, &com);
        // A unit axis is returned, never a zero vector.
        assert!((n.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_onto_plane() {
        let plane = Plane {
            com: Point3::new(0.0, 0.0, 1.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        };
        let p = plane.project(&Point3::new(3.0, 4.0, 7.0));
        assert!((p - Point3::new(3.0, 4.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_normal_method_averages_vertex_normals() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = EditMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        let lp = Loop::new(
            vec![VertexId::new(0), VertexId::new(1), VertexId::new(2)],
            false,
        );
        let plane = fit_plane(&mesh, &lp, PlaneFitMethod::Normal);
        assert!((plane.normal.z.abs() - 1.0).abs() < 1e-9);
    }
}
