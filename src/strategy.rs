//! Concrete grid-fill strategies
//!
//! Each strategy turns the grid-space control points into one estimator per
//! axis (or a triangulated map) and writes a target position for every grid
//! node: the node's nominal position minus the estimated source-minus-target
//! delta at that node.

use crate::error::{BuildError, Result};
use crate::grid::GridGeometry;
use crate::interpolate::{IdwInterpolator, TpsInterpolator};
use crate::point::{ControlPoint, Envelope, Position};
use crate::triangulation::Triangulation;
use crate::warpgrid::GridFillStrategy;

/// Degrees to arc-seconds, the unit convention of the legacy datum grids.
const DEGREES_TO_SECONDS: f64 = 3600.0;

/// Per-axis source-minus-target deltas, optionally scaled.
fn axis_deltas(points: &[ControlPoint], scale: f64) -> (Vec<(Position, f64)>, Vec<(Position, f64)>) {
    let xs = points
        .iter()
        .map(|cp| (cp.source, (cp.source.x - cp.target.x) * scale))
        .collect();
    let ys = points
        .iter()
        .map(|cp| (cp.source, (cp.source.y - cp.target.y) * scale))
        .collect();
    (xs, ys)
}

/// Write one target per node from a per-axis delta estimator.
fn fill_from_estimates<F>(grid: &GridGeometry, estimate: F) -> Vec<f32>
where
    F: Fn(Position) -> (f64, f64),
{
    let mut targets = Vec::with_capacity(2 * grid.rows() * grid.columns());
    for i in 0..grid.rows() {
        for j in 0..grid.columns() {
            let node = grid.node_position(i, j);
            let (dx, dy) = estimate(node);
            targets.push((node.x - dx) as f32);
            targets.push((node.y - dy) as f32);
        }
    }
    targets
}

/// Inverse-distance-weighted fill.
pub struct IdwStrategy {
    /// Inverse-distance exponent.
    pub power: f64,
}

impl Default for IdwStrategy {
    fn default() -> Self {
        Self { power: 2.0 }
    }
}

impl GridFillStrategy for IdwStrategy {
    fn name(&self) -> &'static str {
        "idw"
    }

    fn fill(&self, grid: &GridGeometry, points: &[ControlPoint]) -> Result<Vec<f32>> {
        let (xs, ys) = axis_deltas(points, 1.0);
        let ix = IdwInterpolator::with_power(xs, self.power);
        let iy = IdwInterpolator::with_power(ys, self.power);
        Ok(fill_from_estimates(grid, |p| {
            (ix.estimate(p), iy.estimate(p))
        }))
    }
}

/// Thin-plate-spline fill.
pub struct TpsStrategy;

impl GridFillStrategy for TpsStrategy {
    fn name(&self) -> &'static str {
        "tps"
    }

    fn fill(&self, grid: &GridGeometry, points: &[ControlPoint]) -> Result<Vec<f32>> {
        let (xs, ys) = axis_deltas(points, 1.0);
        let ix = TpsInterpolator::new(xs)?;
        let iy = TpsInterpolator::new(ys)?;
        Ok(fill_from_estimates(grid, |p| {
            (ix.estimate(p), iy.estimate(p))
        }))
    }
}

/// TPS fill with deltas pre-scaled from degrees to arc-seconds, matching the
/// legacy datum-correction grid convention.
pub struct NadconStrategy;

impl GridFillStrategy for NadconStrategy {
    fn name(&self) -> &'static str {
        "nadcon"
    }

    fn fill(&self, grid: &GridGeometry, points: &[ControlPoint]) -> Result<Vec<f32>> {
        let (xs, ys) = axis_deltas(points, DEGREES_TO_SECONDS);
        let ix = TpsInterpolator::new(xs)?;
        let iy = TpsInterpolator::new(ys)?;
        Ok(fill_from_estimates(grid, |p| {
            (ix.estimate(p), iy.estimate(p))
        }))
    }
}

/// Triangulated piecewise-affine (rubber-sheet) fill.
///
/// The control points are triangulated together with the four corners of the
/// grid extent enlarged by 1% of its span; the corners map identically, so
/// every grid node is guaranteed to fall inside the triangulated region. The
/// triangulation is rebuilt from scratch on every fill.
pub struct RubberSheetStrategy;

impl GridFillStrategy for RubberSheetStrategy {
    fn name(&self) -> &'static str {
        "rubber-sheet"
    }

    fn fill(&self, grid: &GridGeometry, points: &[ControlPoint]) -> Result<Vec<f32>> {
        let extent = Envelope::new(
            grid.x_start,
            grid.y_start,
            grid.x_start + grid.x_step * grid.x_count as f64,
            grid.y_start + grid.y_step * grid.y_count as f64,
        );
        let quad = extent.expanded_by_fraction(0.01);

        let mut sources: Vec<Position> = quad.corners().to_vec();
        let mut targets: Vec<Position> = quad.corners().to_vec();
        for cp in points {
            sources.push(cp.source);
            targets.push(cp.target);
        }

        let triangulation = Triangulation::new(sources, targets)?;

        let mut out = Vec::with_capacity(2 * grid.rows() * grid.columns());
        for i in 0..grid.rows() {
            for j in 0..grid.columns() {
                let node = grid.node_position(i, j);
                let mapped = triangulation.map(node).ok_or_else(|| {
                    BuildError::Transform(format!(
                        "grid node ({}, {}) outside the triangulated region",
                        i, j
                    ))
                })?;
                out.push(mapped.x as f32);
                out.push(mapped.y as f32);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_3x3() -> GridGeometry {
        GridGeometry::with_counts(0.0, 0.0, 1.0, 1.0, 3, 3)
    }

    fn shift_points() -> Vec<ControlPoint> {
        [(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]
            .iter()
            .map(|&(x, y)| {
                ControlPoint::new(Position::new(x, y), Position::new(x + 0.5, y - 0.25))
            })
            .collect()
    }

    fn check_uniform_shift(targets: &[f32], grid: &GridGeometry) {
        for i in 0..grid.rows() {
            for j in 0..grid.columns() {
                let node = grid.node_position(i, j);
                let off = grid.offset(i, j);
                assert!(
                    (targets[off] as f64 - (node.x + 0.5)).abs() < 1e-3,
                    "node ({}, {})",
                    i,
                    j
                );
                assert!((targets[off + 1] as f64 - (node.y - 0.25)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_idw_uniform_shift() {
        let grid = grid_3x3();
        let targets = IdwStrategy::default()
            .fill(&grid, &shift_points())
            .unwrap();
        assert_eq!(targets.len(), 2 * 16);
        check_uniform_shift(&targets, &grid);
    }

    #[test]
    fn test_tps_uniform_shift() {
        let grid = grid_3x3();
        let targets = TpsStrategy.fill(&grid, &shift_points()).unwrap();
        check_uniform_shift(&targets, &grid);
    }

    #[test]
    fn test_nadcon_scales_deltas() {
        let grid = grid_3x3();
        let targets = NadconStrategy.fill(&grid, &shift_points()).unwrap();
        // Deltas scaled by 3600: a +0.5 degree shift becomes 1800 seconds.
        let node = grid.node_position(0, 0);
        let off = grid.offset(0, 0);
        assert!(
            (targets[off] as f64 - (node.x + 0.5 * 3600.0)).abs() < 0.5,
            "got {}",
            targets[off]
        );
    }

    #[test]
    fn test_rubber_sheet_covers_all_nodes() {
        let grid = grid_3x3();
        let targets = RubberSheetStrategy.fill(&grid, &shift_points()).unwrap();
        assert_eq!(targets.len(), 2 * 16);
        // Control points sit at the grid corners, so the corner nodes must
        // reproduce the shift exactly.
        let off = grid.offset(0, 0);
        assert!((targets[off] as f64 - 0.5).abs() < 1e-3);
        assert!((targets[off + 1] as f64 - (-0.25)).abs() < 1e-3);
    }

    #[test]
    fn test_rubber_sheet_single_point() {
        let grid = grid_3x3();
        let points = vec![ControlPoint::new(
            Position::new(1.5, 1.5),
            Position::new(1.6, 1.5),
        )];
        let targets = RubberSheetStrategy.fill(&grid, &points).unwrap();
        // The lone control point pulls its neighborhood; the quad corners pin
        // the boundary, so far nodes stay put.
        let center_off = grid.offset(1, 1);
        assert!(targets[center_off] as f64 > 1.0);
    }
}
