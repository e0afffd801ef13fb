//! Iterative constrained least-squares fit of affine parameters
//!
//! Estimates the six geometric parameters (two scales, two rotations, two
//! translations) minimizing squared residuals over the control points, subject
//! to optional equality constraints among the parameters. Each iteration
//! linearizes the model, borders the normal equations with the constraint rows
//! and solves the augmented system:
//!
//! ```text
//! [ AᵗA  Bᵗ ] [ Δ ]   [ AᵗL ]
//! [  B   0  ] [ λ ] = [  U  ]
//! ```
//!
//! with `L = observed − predicted` and `U = required − current`. The bordered
//! solve is isolated in [`solve_constrained`] so it can be unit-tested on its
//! own, independent of the geometric model.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::affine::{AffineParameters, AffineTransform};
use crate::error::{BuildError, Result};
use crate::point::ControlPoint;

/// Component-wise convergence tolerance on the parameter update.
const TOLERANCE: f64 = 1e-9;

/// Iteration cap before the fit is declared divergent.
const MAX_ITERATIONS: usize = 300;

/// A constrainable affine parameter.
///
/// `Skew` is the derived quantity `φx − φy`; it can carry a value constraint
/// but cannot be tied to another parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffineParam {
    Sx,
    Sy,
    PhiX,
    PhiY,
    Tx,
    Ty,
    Skew,
}

impl AffineParam {
    /// Column index in the parameter vector, or `None` for the derived skew.
    fn index(self) -> Option<usize> {
        match self {
            AffineParam::Sx => Some(0),
            AffineParam::Sy => Some(1),
            AffineParam::PhiX => Some(2),
            AffineParam::PhiY => Some(3),
            AffineParam::Tx => Some(4),
            AffineParam::Ty => Some(5),
            AffineParam::Skew => None,
        }
    }
}

fn component(params: &AffineParameters, p: AffineParam) -> f64 {
    match p {
        AffineParam::Sx => params.sx,
        AffineParam::Sy => params.sy,
        AffineParam::PhiX => params.phi_x,
        AffineParam::PhiY => params.phi_y,
        AffineParam::Tx => params.tx,
        AffineParam::Ty => params.ty,
        AffineParam::Skew => params.skew(),
    }
}

/// Constrained least-squares estimator of a six-parameter affine transform.
pub struct AffineSolver {
    points: Vec<ControlPoint>,
    value_constraints: HashMap<AffineParam, f64>,
    ties: Vec<(AffineParam, AffineParam)>,
    initial: Option<AffineTransform>,
    solved: Option<AffineParameters>,
}

impl AffineSolver {
    /// Minimum control points required for a six-parameter fit.
    pub const MIN_POINTS: usize = 3;

    pub fn new(points: Vec<ControlPoint>) -> Result<Self> {
        if points.len() < Self::MIN_POINTS {
            return Err(BuildError::InsufficientPoints {
                required: Self::MIN_POINTS,
                found: points.len(),
            });
        }
        Ok(Self {
            points,
            value_constraints: HashMap::new(),
            ties: Vec::new(),
            initial: None,
            solved: None,
        })
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Replace the control points wholesale, dropping the solved estimate.
    pub fn set_control_points(&mut self, points: Vec<ControlPoint>) -> Result<()> {
        if points.len() < Self::MIN_POINTS {
            return Err(BuildError::InsufficientPoints {
                required: Self::MIN_POINTS,
                found: points.len(),
            });
        }
        self.points = points;
        self.solved = None;
        Ok(())
    }

    /// Require `param` to equal `value` in the converged solution.
    pub fn set_constraint(&mut self, param: AffineParam, value: f64) {
        self.value_constraints.insert(param, value);
        self.solved = None;
    }

    /// Require two parameters to converge to the same value.
    pub fn tie_parameters(&mut self, a: AffineParam, b: AffineParam) -> Result<()> {
        if a.index().is_none() || b.index().is_none() {
            return Err(BuildError::Transform(
                "skew cannot participate in a parameter tie".to_string(),
            ));
        }
        self.ties.push((a, b));
        self.solved = None;
        Ok(())
    }

    /// Drop every accumulated constraint.
    pub fn clear_constraints(&mut self) {
        self.value_constraints.clear();
        self.ties.clear();
        self.solved = None;
    }

    /// Supply an approximate transform to seed the iteration, replacing the
    /// default closed-form initial guess. Needed when the default guess is far
    /// enough off that the iteration would diverge.
    pub fn set_initial_transform(&mut self, transform: AffineTransform) {
        self.initial = Some(transform);
        self.solved = None;
    }

    /// Run (or return the cached) constrained fit.
    pub fn solve(&mut self) -> Result<AffineParameters> {
        if let Some(p) = self.solved {
            return Ok(p);
        }

        let seed = match self.initial {
            Some(t) => t,
            None => AffineTransform::least_squares_fit(&self.points)?,
        };
        let mut params = AffineParameters::from_transform(&seed);

        for iter in 0..MAX_ITERATIONS {
            let (a, l) = self.build_observations(&params);
            let (b, u) = self.build_constraints(&params);
            let (delta, _lambda) = solve_constrained(&a, &l, &b, &u)?;

            params.sx += delta[0];
            params.sy += delta[1];
            params.phi_x += delta[2];
            params.phi_y += delta[3];
            params.tx += delta[4];
            params.ty += delta[5];

            if delta.iter().all(|d| d.abs() <= TOLERANCE) {
                debug!(
                    "affine fit converged after {} iterations: sx={:.6}, sy={:.6}, \
                     phi_x={:.6}, phi_y={:.6}, tx={:.3}, ty={:.3}",
                    iter + 1,
                    params.sx,
                    params.sy,
                    params.phi_x,
                    params.phi_y,
                    params.tx,
                    params.ty
                );
                self.solved = Some(params);
                return Ok(params);
            }
        }

        Err(BuildError::Divergence {
            iterations: MAX_ITERATIONS,
        })
    }

    /// The converged transform in matrix form.
    pub fn transform(&mut self) -> Result<AffineTransform> {
        Ok(self.solve()?.to_transform())
    }

    /// Jacobian of the model at the current estimate plus the residual vector
    /// (observed minus predicted), two rows per control point.
    fn build_observations(&self, p: &AffineParameters) -> (DMatrix<f64>, DVector<f64>) {
        let n = self.points.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 6);
        let mut l = DVector::<f64>::zeros(2 * n);

        let (cos_x, sin_x) = (p.phi_x.cos(), p.phi_x.sin());
        let (cos_y, sin_y) = (p.phi_y.cos(), p.phi_y.sin());

        for (i, cp) in self.points.iter().enumerate() {
            let (x, y) = (cp.source.x, cp.source.y);
            let row = 2 * i;

            // x' = sx·cos(φx)·x − sy·sin(φy)·y + tx
            a[(row, 0)] = cos_x * x;
            a[(row, 1)] = -sin_y * y;
            a[(row, 2)] = -p.sx * sin_x * x;
            a[(row, 3)] = -p.sy * cos_y * y;
            a[(row, 4)] = 1.0;
            l[row] = cp.target.x - (p.sx * cos_x * x - p.sy * sin_y * y + p.tx);

            // y' = sx·sin(φx)·x + sy·cos(φy)·y + ty
            a[(row + 1, 0)] = sin_x * x;
            a[(row + 1, 1)] = cos_y * y;
            a[(row + 1, 2)] = p.sx * cos_x * x;
            a[(row + 1, 3)] = -p.sy * sin_y * y;
            a[(row + 1, 5)] = 1.0;
            l[row + 1] = cp.target.y - (p.sx * sin_x * x + p.sy * cos_y * y + p.ty);
        }

        (a, l)
    }

    /// One row per active constraint: unit rows for plain value constraints,
    /// `+1/−1` rows for skew and ties. `U` holds each constraint's residual at
    /// the current estimate.
    fn build_constraints(&self, p: &AffineParameters) -> (DMatrix<f64>, DVector<f64>) {
        let count = self.value_constraints.len() + self.ties.len();
        let mut b = DMatrix::<f64>::zeros(count, 6);
        let mut u = DVector::<f64>::zeros(count);

        let mut row = 0;
        for (&param, &required) in &self.value_constraints {
            match param.index() {
                Some(idx) => {
                    b[(row, idx)] = 1.0;
                }
                None => {
                    // Skew: φx − φy
                    b[(row, 2)] = 1.0;
                    b[(row, 3)] = -1.0;
                }
            }
            u[row] = required - component(p, param);
            row += 1;
        }
        for &(pa, pb) in &self.ties {
            // index() checked at insertion time
            let (ia, ib) = (pa.index().unwrap_or(0), pb.index().unwrap_or(0));
            b[(row, ia)] = 1.0;
            b[(row, ib)] -= 1.0;
            u[row] = component(p, pb) - component(p, pa);
            row += 1;
        }

        (b, u)
    }
}

impl crate::TransformBuilder for AffineSolver {
    fn min_points(&self) -> usize {
        Self::MIN_POINTS
    }

    fn control_points(&self) -> &[ControlPoint] {
        AffineSolver::control_points(self)
    }

    fn set_control_points(&mut self, points: Vec<ControlPoint>) -> Result<()> {
        AffineSolver::set_control_points(self, points)
    }

    fn evaluate(&mut self, source: crate::point::Position) -> Result<crate::point::Position> {
        Ok(self.transform()?.apply(source))
    }
}

/// Solve the bordered normal-equation system for one Gauss-Newton step.
///
/// `a` is the 2N×6 Jacobian, `l` the 2N residual vector, `b` the C×6
/// constraint matrix and `u` the C constraint residuals. Returns the parameter
/// update and the Lagrange multipliers. With zero constraint rows this reduces
/// to ordinary least squares.
pub(crate) fn solve_constrained(
    a: &DMatrix<f64>,
    l: &DVector<f64>,
    b: &DMatrix<f64>,
    u: &DVector<f64>,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let n = a.ncols();
    let c = b.nrows();

    let ata = a.transpose() * a;
    let atl = a.transpose() * l;

    let mut system = DMatrix::<f64>::zeros(n + c, n + c);
    system.view_mut((0, 0), (n, n)).copy_from(&ata);
    if c > 0 {
        system.view_mut((0, n), (n, c)).copy_from(&b.transpose());
        system.view_mut((n, 0), (c, n)).copy_from(b);
    }

    let mut rhs = DVector::<f64>::zeros(n + c);
    rhs.view_mut((0, 0), (n, 1)).copy_from(&atl);
    if c > 0 {
        rhs.view_mut((n, 0), (c, 1)).copy_from(u);
    }

    let inverse = system
        .try_inverse()
        .ok_or(BuildError::SingularSystem)?;
    let solution = inverse * rhs;

    Ok((
        solution.rows(0, n).into_owned(),
        solution.rows(n, c).into_owned(),
    ))
}
