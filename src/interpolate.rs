//! Scattered-data interpolation over control-point deltas
//!
//! Both estimators answer the same question: given a set of (position, scalar)
//! samples, what is the estimated value at an arbitrary query point? IDW is
//! locally supported and distance-weighted; TPS fits a globally supported
//! smooth surface minimizing bending energy.

use nalgebra::{DMatrix, DVector};

use crate::error::{BuildError, Result};
use crate::point::Position;

/// Distance below which a query is treated as coincident with a sample.
const COINCIDENT_EPS: f64 = 1e-12;

/// Inverse-distance-weighted estimator.
pub struct IdwInterpolator {
    samples: Vec<(Position, f64)>,
    power: f64,
}

impl IdwInterpolator {
    pub fn new(samples: Vec<(Position, f64)>) -> Self {
        Self {
            samples,
            power: 2.0,
        }
    }

    /// Override the default inverse-distance exponent of 2.
    pub fn with_power(samples: Vec<(Position, f64)>, power: f64) -> Self {
        Self { samples, power }
    }

    /// Weighted estimate at `p`; exact at sample positions.
    pub fn estimate(&self, p: Position) -> f64 {
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;

        for &(sample, value) in &self.samples {
            let d2 = sample.dist_sq(p);
            if d2 < COINCIDENT_EPS {
                return value;
            }
            let w = 1.0 / d2.powf(self.power / 2.0);
            weight_sum += w;
            value_sum += w * value;
        }

        if weight_sum == 0.0 {
            0.0
        } else {
            value_sum / weight_sum
        }
    }
}

/// The TPS radial basis: U(r) = r² ln r, with U(0) = 0.
#[inline]
fn tps_basis(r2: f64) -> f64 {
    if r2 <= 0.0 {
        0.0
    } else {
        // r² ln r = r²/2 · ln r²
        0.5 * r2 * r2.ln()
    }
}

/// Thin-plate-spline estimator.
///
/// Solves the standard bordered system once at construction:
///
/// ```text
/// [ K  P ] [ w ]   [ v ]
/// [ Pᵗ 0 ] [ a ] = [ 0 ]
/// ```
///
/// where `K` holds pairwise basis values and `P` rows are `[1, x, y]`. The
/// affine part `a` carries the trend, the weights `w` the local bending.
pub struct TpsInterpolator {
    centers: Vec<Position>,
    weights: DVector<f64>,
}

impl TpsInterpolator {
    pub fn new(samples: Vec<(Position, f64)>) -> Result<Self> {
        let n = samples.len();
        if n == 0 {
            return Err(BuildError::InsufficientPoints {
                required: 1,
                found: 0,
            });
        }

        let mut system = DMatrix::<f64>::zeros(n + 3, n + 3);
        let mut rhs = DVector::<f64>::zeros(n + 3);

        for i in 0..n {
            let (pi, vi) = samples[i];
            for j in 0..n {
                system[(i, j)] = tps_basis(pi.dist_sq(samples[j].0));
            }
            system[(i, n)] = 1.0;
            system[(i, n + 1)] = pi.x;
            system[(i, n + 2)] = pi.y;
            system[(n, i)] = 1.0;
            system[(n + 1, i)] = pi.x;
            system[(n + 2, i)] = pi.y;
            rhs[i] = vi;
        }

        let weights = system
            .lu()
            .solve(&rhs)
            .ok_or(BuildError::SingularSystem)?;

        Ok(Self {
            centers: samples.into_iter().map(|(p, _)| p).collect(),
            weights,
        })
    }

    /// Spline value at `p`.
    pub fn estimate(&self, p: Position) -> f64 {
        let n = self.centers.len();
        let mut value = self.weights[n]
            + self.weights[n + 1] * p.x
            + self.weights[n + 2] * p.y;
        for (i, center) in self.centers.iter().enumerate() {
            value += self.weights[i] * tps_basis(center.dist_sq(p));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<(Position, f64)> {
        vec![
            (Position::new(0.0, 0.0), 1.0),
            (Position::new(10.0, 0.0), 2.0),
            (Position::new(10.0, 10.0), 3.0),
            (Position::new(0.0, 10.0), 4.0),
        ]
    }

    #[test]
    fn test_idw_exact_at_samples() {
        let idw = IdwInterpolator::new(samples());
        assert_eq!(idw.estimate(Position::new(10.0, 0.0)), 2.0);
    }

    #[test]
    fn test_idw_bounded_by_samples() {
        let idw = IdwInterpolator::new(samples());
        let v = idw.estimate(Position::new(5.0, 5.0));
        assert!(v > 1.0 && v < 4.0, "v={}", v);
    }

    #[test]
    fn test_idw_empty_is_zero() {
        let idw = IdwInterpolator::new(Vec::new());
        assert_eq!(idw.estimate(Position::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_tps_exact_at_samples() {
        let tps = TpsInterpolator::new(samples()).unwrap();
        for (p, v) in samples() {
            assert!(
                (tps.estimate(p) - v).abs() < 1e-8,
                "at {:?}: {} != {}",
                p,
                tps.estimate(p),
                v
            );
        }
    }

    #[test]
    fn test_tps_reproduces_planar_trend() {
        // Samples lying on z = 2x + 3y + 1 must be reproduced everywhere.
        let plane = |p: Position| 2.0 * p.x + 3.0 * p.y + 1.0;
        let pts = vec![
            Position::new(0.0, 0.0),
            Position::new(8.0, 1.0),
            Position::new(3.0, 7.0),
            Position::new(9.0, 9.0),
        ];
        let tps =
            TpsInterpolator::new(pts.iter().map(|&p| (p, plane(p))).collect()).unwrap();

        let q = Position::new(4.0, 4.0);
        assert!((tps.estimate(q) - plane(q)).abs() < 1e-6);
    }

    #[test]
    fn test_tps_empty_rejected() {
        assert!(matches!(
            TpsInterpolator::new(Vec::new()),
            Err(BuildError::InsufficientPoints { .. })
        ));
    }
}
