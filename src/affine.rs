//! 2D affine transforms and the closed-form least-squares fit
//!
//! The transform is stored as the top two rows of a 3x3 matrix in row-major
//! order. The geometric six-parameter form (two scales, two rotations, two
//! translations) used by the constrained solver lives here too, together with
//! the conversion in each direction.

use nalgebra::{DMatrix, DVector};

use crate::error::{BuildError, Result};
use crate::point::{ControlPoint, Position};

/// A 2D affine transform: `x' = m0·x + m1·y + m2`, `y' = m3·x + m4·y + m5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: [f64; 6],
}

impl AffineTransform {
    pub fn new(matrix: [f64; 6]) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    /// A pure scaling about the origin.
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new([sx, 0.0, 0.0, 0.0, sy, 0.0])
    }

    pub fn matrix(&self) -> &[f64; 6] {
        &self.matrix
    }

    /// Apply the transform to a position.
    #[inline]
    pub fn apply(&self, p: Position) -> Position {
        let m = &self.matrix;
        Position::new(
            m[0] * p.x + m[1] * p.y + m[2],
            m[3] * p.x + m[4] * p.y + m[5],
        )
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[0] * m[4] - m[1] * m[3]
    }

    /// Scale factor along each axis (length of each column of the linear part).
    pub fn axis_scales(&self) -> (f64, f64) {
        let m = &self.matrix;
        ((m[0] * m[0] + m[3] * m[3]).sqrt(), (m[1] * m[1] + m[4] * m[4]).sqrt())
    }

    /// The inverse transform, or `Transform` error when the linear part is
    /// not invertible.
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return Err(BuildError::Transform(
                "affine transform is not invertible".to_string(),
            ));
        }
        let m = &self.matrix;
        let i0 = m[4] / det;
        let i1 = -m[1] / det;
        let i3 = -m[3] / det;
        let i4 = m[0] / det;
        Ok(Self::new([
            i0,
            i1,
            -(i0 * m[2] + i1 * m[5]),
            i3,
            i4,
            -(i3 * m[2] + i4 * m[5]),
        ]))
    }

    /// Closed-form unconstrained least-squares fit from control points.
    ///
    /// Stacks two rows per point (x and y equations, six unknowns) and solves
    /// via SVD. Exact for three non-collinear points.
    pub fn least_squares_fit(points: &[ControlPoint]) -> Result<Self> {
        if points.len() < 3 {
            return Err(BuildError::InsufficientPoints {
                required: 3,
                found: points.len(),
            });
        }

        let nrows = points.len() * 2;
        let mut a = DMatrix::<f64>::zeros(nrows, 6);
        let mut b = DVector::<f64>::zeros(nrows);

        for (i, cp) in points.iter().enumerate() {
            let row = i * 2;
            a[(row, 0)] = cp.source.x;
            a[(row, 1)] = cp.source.y;
            a[(row, 2)] = 1.0;
            b[row] = cp.target.x;

            a[(row + 1, 3)] = cp.source.x;
            a[(row + 1, 4)] = cp.source.y;
            a[(row + 1, 5)] = 1.0;
            b[row + 1] = cp.target.y;
        }

        let svd = a.svd(true, true);
        let x = svd
            .solve(&b, 1e-12)
            .map_err(|_| BuildError::SingularSystem)?;

        Ok(Self::new([x[0], x[1], x[2], x[3], x[4], x[5]]))
    }
}

/// The six geometric parameters of an affine transform:
///
/// ```text
/// x' = sx·cos(φx)·x − sy·sin(φy)·y + tx
/// y' = sx·sin(φx)·x + sy·cos(φy)·y + ty
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParameters {
    pub sx: f64,
    pub sy: f64,
    pub phi_x: f64,
    pub phi_y: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineParameters {
    /// Decompose a matrix-form transform into geometric parameters.
    pub fn from_transform(t: &AffineTransform) -> Self {
        let m = t.matrix();
        Self {
            sx: (m[0] * m[0] + m[3] * m[3]).sqrt(),
            sy: (m[1] * m[1] + m[4] * m[4]).sqrt(),
            phi_x: f64::atan2(m[3], m[0]),
            phi_y: f64::atan2(-m[1], m[4]),
            tx: m[2],
            ty: m[5],
        }
    }

    /// Assemble the matrix-form transform from the parameters.
    pub fn to_transform(&self) -> AffineTransform {
        AffineTransform::new([
            self.sx * self.phi_x.cos(),
            -self.sy * self.phi_y.sin(),
            self.tx,
            self.sx * self.phi_x.sin(),
            self.sy * self.phi_y.cos(),
            self.ty,
        ])
    }

    /// Derived skew: the difference between the two rotations.
    pub fn skew(&self) -> f64 {
        self.phi_x - self.phi_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(sx: f64, sy: f64, tx: f64, ty: f64) -> ControlPoint {
        ControlPoint::new(Position::new(sx, sy), Position::new(tx, ty))
    }

    #[test]
    fn test_identity_apply() {
        let t = AffineTransform::identity();
        let p = t.apply(Position::new(3.5, -1.0));
        assert_eq!(p, Position::new(3.5, -1.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::new([2.0, 0.5, 10.0, -0.25, 1.5, -4.0]);
        let inv = t.inverse().unwrap();
        let p = Position::new(7.0, 11.0);
        let q = inv.apply(t.apply(p));
        assert!((q.x - p.x).abs() < 1e-9);
        assert!((q.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_singular() {
        let t = AffineTransform::new([1.0, 2.0, 0.0, 2.0, 4.0, 0.0]);
        assert!(matches!(t.inverse(), Err(BuildError::Transform(_))));
    }

    #[test]
    fn test_fit_exact_three_points() {
        // Known transform: scale 2, translate (3, -1)
        let truth = AffineTransform::new([2.0, 0.0, 3.0, 0.0, 2.0, -1.0]);
        let sources = [
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(0.0, 10.0),
        ];
        let points: Vec<ControlPoint> = sources
            .iter()
            .map(|&s| ControlPoint::new(s, truth.apply(s)))
            .collect();

        let fitted = AffineTransform::least_squares_fit(&points).unwrap();
        for (a, b) in fitted.matrix().iter().zip(truth.matrix()) {
            assert!((a - b).abs() < 1e-9, "fitted={:?}", fitted);
        }
    }

    #[test]
    fn test_fit_insufficient_points() {
        let points = vec![cp(0.0, 0.0, 1.0, 1.0), cp(1.0, 0.0, 2.0, 1.0)];
        assert!(matches!(
            AffineTransform::least_squares_fit(&points),
            Err(BuildError::InsufficientPoints {
                required: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_parameter_round_trip() {
        let params = AffineParameters {
            sx: 1.5,
            sy: 0.8,
            phi_x: 0.3,
            phi_y: 0.25,
            tx: 100.0,
            ty: -50.0,
        };
        let back = AffineParameters::from_transform(&params.to_transform());
        assert!((back.sx - params.sx).abs() < 1e-12);
        assert!((back.sy - params.sy).abs() < 1e-12);
        assert!((back.phi_x - params.phi_x).abs() < 1e-12);
        assert!((back.phi_y - params.phi_y).abs() < 1e-12);
        assert!((back.skew() - 0.05).abs() < 1e-12);
    }
}
