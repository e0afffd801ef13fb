//! Delaunay triangulation and piecewise-affine evaluation
//!
//! The rubber-sheet strategy triangulates the control-point sources
//! (Bowyer-Watson insertion) and carries one exact affine map per triangle,
//! derived from the three vertex correspondences. Queries walk the triangle
//! list and evaluate the map of the containing triangle.

use crate::affine::AffineTransform;
use crate::error::{BuildError, Result};
use crate::point::{ControlPoint, Position};

/// Barycentric tolerance for point-in-triangle tests; nodes exactly on a
/// shared edge must land in one of the adjacent triangles.
const EDGE_EPS: f64 = 1e-9;

/// A triangulated piecewise-affine mapping between two point sets.
pub struct Triangulation {
    vertices: Vec<Position>,
    triangles: Vec<[usize; 3]>,
    maps: Vec<AffineTransform>,
}

impl Triangulation {
    /// Triangulate `vertices` and attach the affine map of each triangle from
    /// its source vertices to the corresponding `targets`.
    pub fn new(vertices: Vec<Position>, targets: Vec<Position>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(BuildError::InsufficientPoints {
                required: 3,
                found: vertices.len(),
            });
        }
        debug_assert_eq!(vertices.len(), targets.len());

        let triangles = delaunay(&vertices)?;
        let mut maps = Vec::with_capacity(triangles.len());
        for tri in &triangles {
            let points: Vec<ControlPoint> = tri
                .iter()
                .map(|&v| ControlPoint::new(vertices[v], targets[v]))
                .collect();
            maps.push(AffineTransform::least_squares_fit(&points)?);
        }

        Ok(Self {
            vertices,
            triangles,
            maps,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Map a position through the triangle containing it, or `None` when the
    /// position falls outside the triangulated region.
    pub fn map(&self, p: Position) -> Option<Position> {
        for (tri, map) in self.triangles.iter().zip(&self.maps) {
            let (a, b, c) = (
                self.vertices[tri[0]],
                self.vertices[tri[1]],
                self.vertices[tri[2]],
            );
            if contains(a, b, c, p) {
                return Some(map.apply(p));
            }
        }
        None
    }
}

/// Barycentric point-in-triangle test with a small edge tolerance.
fn contains(a: Position, b: Position, c: Position, p: Position) -> bool {
    let denom = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if denom.abs() < f64::MIN_POSITIVE {
        return false;
    }
    let w0 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / denom;
    let w1 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / denom;
    let w2 = 1.0 - w0 - w1;
    w0 >= -EDGE_EPS && w1 >= -EDGE_EPS && w2 >= -EDGE_EPS
}

/// Circumcircle center and squared radius, or `None` for collinear corners.
fn circumcircle(a: Position, b: Position, c: Position) -> Option<(f64, f64, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let dx = a.x - ux;
    let dy = a.y - uy;
    Some((ux, uy, dx * dx + dy * dy))
}

/// Bowyer-Watson incremental Delaunay triangulation.
fn delaunay(points: &[Position]) -> Result<Vec<[usize; 3]>> {
    // Super-triangle comfortably containing every point.
    let mut min = Position::new(f64::INFINITY, f64::INFINITY);
    let mut max = Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    let span = (max.x - min.x).max(max.y - min.y).max(1.0);
    let mid = Position::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);

    let n = points.len();
    let mut verts: Vec<Position> = points.to_vec();
    verts.push(Position::new(mid.x - 20.0 * span, mid.y - span));
    verts.push(Position::new(mid.x + 20.0 * span, mid.y - span));
    verts.push(Position::new(mid.x, mid.y + 20.0 * span));

    let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for idx in 0..n {
        let p = verts[idx];

        // Triangles whose circumcircle contains the new point.
        let mut bad = Vec::new();
        for (t, tri) in triangles.iter().enumerate() {
            if let Some((cx, cy, r2)) = circumcircle(verts[tri[0]], verts[tri[1]], verts[tri[2]])
            {
                let dx = p.x - cx;
                let dy = p.y - cy;
                if dx * dx + dy * dy <= r2 {
                    bad.push(t);
                }
            }
        }

        // Boundary of the cavity: edges belonging to exactly one bad triangle.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &t in &bad {
            let tri = triangles[t];
            for e in 0..3 {
                let edge = (tri[e], tri[(e + 1) % 3]);
                let shared = bad.iter().any(|&o| {
                    o != t && {
                        let other = triangles[o];
                        other.contains(&edge.0) && other.contains(&edge.1)
                    }
                });
                if !shared {
                    boundary.push(edge);
                }
            }
        }

        for &t in bad.iter().rev() {
            triangles.swap_remove(t);
        }
        for (a, b) in boundary {
            triangles.push([a, b, idx]);
        }
    }

    // Strip triangles that still touch the super-triangle.
    triangles.retain(|tri| tri.iter().all(|&v| v < n));
    if triangles.is_empty() {
        return Err(BuildError::SingularSystem);
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_triangulates_into_two() {
        let pts = vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 1.0),
        ];
        let tri = Triangulation::new(pts.clone(), pts).unwrap();
        assert_eq!(tri.triangle_count(), 2);
    }

    #[test]
    fn test_identity_mapping() {
        let pts = vec![
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(10.0, 10.0),
            Position::new(0.0, 10.0),
            Position::new(5.0, 5.0),
        ];
        let tri = Triangulation::new(pts.clone(), pts).unwrap();
        let q = Position::new(3.0, 4.0);
        let mapped = tri.map(q).unwrap();
        assert!(mapped.dist(q) < 1e-9);
    }

    #[test]
    fn test_piecewise_shift() {
        // Shift every vertex right by 2; interior points shift identically.
        let src = vec![
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(10.0, 10.0),
            Position::new(0.0, 10.0),
        ];
        let dst: Vec<Position> = src.iter().map(|p| Position::new(p.x + 2.0, p.y)).collect();
        let tri = Triangulation::new(src, dst).unwrap();
        let mapped = tri.map(Position::new(4.0, 6.0)).unwrap();
        assert!((mapped.x - 6.0).abs() < 1e-9);
        assert!((mapped.y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_region_is_none() {
        let pts = vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(0.0, 1.0),
        ];
        let tri = Triangulation::new(pts.clone(), pts).unwrap();
        assert!(tri.map(Position::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn test_collinear_points_rejected() {
        let pts = vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(2.0, 0.0),
        ];
        assert!(Triangulation::new(pts.clone(), pts).is_err());
    }
}
