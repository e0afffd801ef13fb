//! Warp grid orchestration
//!
//! [`WarpGridBuilder`] owns the pipeline: control points are transformed into
//! grid space once, a pluggable [`GridFillStrategy`] populates the node target
//! array, and every derived view (displacement rasters, bilinear evaluation,
//! the legacy grid-file export) is served from that cache. Any change to the
//! control points or the grid shape drops every cached artifact.
//!
//! All computation after construction happens in grid space; world coordinates
//! only appear at the `evaluate` boundary. The two spaces are never mixed
//! inside one computation.

use tracing::debug;

use crate::affine::AffineTransform;
use crate::error::{BuildError, Result};
use crate::grid::GridGeometry;
use crate::point::{ControlPoint, Envelope, Position};
use crate::TransformBuilder;

/// A concrete grid-fill algorithm: a pure function of the grid geometry and
/// the grid-space control points.
pub trait GridFillStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Minimum number of control points the strategy needs.
    fn min_points(&self) -> usize {
        1
    }

    /// Produce the flat node target array for `grid`.
    fn fill(&self, grid: &GridGeometry, points: &[ControlPoint]) -> Result<Vec<f32>>;
}

/// Builds a dense warp grid approximating the non-rigid mapping defined by a
/// set of control points.
pub struct WarpGridBuilder {
    points: Vec<ControlPoint>,
    world_to_grid: AffineTransform,
    strategy: Box<dyn GridFillStrategy>,
    geometry: GridGeometry,
    /// Control points mapped into grid space, computed once per point set.
    grid_points: Option<Vec<ControlPoint>>,
    filled: bool,
    dx_grid: Option<Vec<Vec<f32>>>,
    dy_grid: Option<Vec<Vec<f32>>>,
}

impl WarpGridBuilder {
    /// Build over a continuous grid derived from `envelope` with the given
    /// cell spacing, working directly in world coordinates.
    pub fn new(
        points: Vec<ControlPoint>,
        envelope: &Envelope,
        dx: f64,
        dy: f64,
        strategy: Box<dyn GridFillStrategy>,
    ) -> Result<Self> {
        let geometry = GridGeometry::from_envelope(envelope, dx, dy)?;
        Self::with_geometry(points, AffineTransform::identity(), geometry, strategy)
    }

    /// Build over an integer-snapped grid, as required by the legacy
    /// fixed-grid export. Control points are transformed through
    /// `world_to_grid` before any computation.
    pub fn snapped(
        points: Vec<ControlPoint>,
        envelope: &Envelope,
        dx: f64,
        dy: f64,
        world_to_grid: AffineTransform,
        strategy: Box<dyn GridFillStrategy>,
    ) -> Result<Self> {
        let geometry = GridGeometry::snapped(envelope, dx, dy, &world_to_grid)?;
        Self::with_geometry(points, world_to_grid, geometry, strategy)
    }

    fn with_geometry(
        points: Vec<ControlPoint>,
        world_to_grid: AffineTransform,
        geometry: GridGeometry,
        strategy: Box<dyn GridFillStrategy>,
    ) -> Result<Self> {
        if points.len() < strategy.min_points() {
            return Err(BuildError::InsufficientPoints {
                required: strategy.min_points(),
                found: points.len(),
            });
        }
        Ok(Self {
            points,
            world_to_grid,
            strategy,
            geometry,
            grid_points: None,
            filled: false,
            dx_grid: None,
            dy_grid: None,
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Resize the grid to `cells` columns over the same span.
    pub fn set_width(&mut self, cells: usize) {
        let span = self.geometry.x_step * self.geometry.x_count as f64;
        self.geometry = GridGeometry::with_counts(
            self.geometry.x_start,
            self.geometry.y_start,
            span / cells as f64,
            self.geometry.y_step,
            cells,
            self.geometry.y_count,
        );
        self.invalidate();
    }

    /// Resize the grid to `cells` rows over the same span.
    pub fn set_height(&mut self, cells: usize) {
        let span = self.geometry.y_step * self.geometry.y_count as f64;
        self.geometry = GridGeometry::with_counts(
            self.geometry.x_start,
            self.geometry.y_start,
            self.geometry.x_step,
            span / cells as f64,
            self.geometry.x_count,
            cells,
        );
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.filled = false;
        self.dx_grid = None;
        self.dy_grid = None;
    }

    /// Control points in grid space, mapped once and cached.
    fn grid_points(&mut self) -> &[ControlPoint] {
        if self.grid_points.is_none() {
            let mapped = self
                .points
                .iter()
                .map(|cp| {
                    ControlPoint::new(
                        self.world_to_grid.apply(cp.source),
                        self.world_to_grid.apply(cp.target),
                    )
                })
                .collect();
            self.grid_points = Some(mapped);
        }
        self.grid_points.as_deref().unwrap_or_default()
    }

    /// Fill (or return the cached) node target array.
    pub fn build_grid(&mut self) -> Result<&[f32]> {
        if !self.filled {
            let points = self.grid_points().to_vec();
            debug!(
                "filling {}x{} cell grid with {} strategy from {} control points",
                self.geometry.x_count,
                self.geometry.y_count,
                self.strategy.name(),
                points.len()
            );
            let targets = self.strategy.fill(&self.geometry, &points)?;
            self.geometry.set_targets(targets);
            self.filled = true;
        }
        Ok(self.geometry.targets())
    }

    /// Per-node x displacement (target minus nominal node position), rows
    /// emitted top-down: row 0 is the maximum-y grid row.
    pub fn dx_grid(&mut self) -> Result<&[Vec<f32>]> {
        if self.dx_grid.is_none() {
            let raster = self.displacement_raster(0)?;
            self.dx_grid = Some(raster);
        }
        Ok(self.dx_grid.as_deref().unwrap_or_default())
    }

    /// Per-node y displacement, same layout as [`dx_grid`](Self::dx_grid).
    pub fn dy_grid(&mut self) -> Result<&[Vec<f32>]> {
        if self.dy_grid.is_none() {
            let raster = self.displacement_raster(1)?;
            self.dy_grid = Some(raster);
        }
        Ok(self.dy_grid.as_deref().unwrap_or_default())
    }

    fn displacement_raster(&mut self, axis: usize) -> Result<Vec<Vec<f32>>> {
        self.build_grid()?;
        let grid = &self.geometry;
        let mut rows = Vec::with_capacity(grid.rows());
        for i in (0..grid.rows()).rev() {
            let mut row = Vec::with_capacity(grid.columns());
            for j in 0..grid.columns() {
                let node = grid.node_position(i, j);
                let target = grid.target(i, j);
                let d = if axis == 0 {
                    target.x - node.x
                } else {
                    target.y - node.y
                };
                row.push(d as f32);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Evaluate the warp at a world position by bilinear interpolation of the
    /// surrounding node targets, mapping back to world coordinates afterwards.
    pub fn warp(&mut self, p: Position) -> Result<Position> {
        let grid_to_world = self.world_to_grid.inverse()?;
        self.build_grid()?;
        let grid = &self.geometry;

        let g = self.world_to_grid.apply(p);
        let u = (g.x - grid.x_start) / grid.x_step;
        let v = (g.y - grid.y_start) / grid.y_step;

        let j0 = (u.floor().max(0.0) as usize).min(grid.x_count.saturating_sub(1));
        let i0 = (v.floor().max(0.0) as usize).min(grid.y_count.saturating_sub(1));
        let j1 = (j0 + 1).min(grid.x_count);
        let i1 = (i0 + 1).min(grid.y_count);
        let fx = (u - j0 as f64).clamp(0.0, 1.0);
        let fy = (v - i0 as f64).clamp(0.0, 1.0);

        let t00 = grid.target(i0, j0);
        let t10 = grid.target(i0, j1);
        let t01 = grid.target(i1, j0);
        let t11 = grid.target(i1, j1);

        let gx = t00.x * (1.0 - fx) * (1.0 - fy)
            + t10.x * fx * (1.0 - fy)
            + t01.x * (1.0 - fx) * fy
            + t11.x * fx * fy;
        let gy = t00.y * (1.0 - fx) * (1.0 - fy)
            + t10.y * fx * (1.0 - fy)
            + t01.y * (1.0 - fx) * fy
            + t11.y * fx * fy;

        Ok(grid_to_world.apply(Position::new(gx, gy)))
    }
}

impl TransformBuilder for WarpGridBuilder {
    fn min_points(&self) -> usize {
        self.strategy.min_points()
    }

    fn control_points(&self) -> &[ControlPoint] {
        &self.points
    }

    fn set_control_points(&mut self, points: Vec<ControlPoint>) -> Result<()> {
        if points.len() < self.strategy.min_points() {
            return Err(BuildError::InsufficientPoints {
                required: self.strategy.min_points(),
                found: points.len(),
            });
        }
        self.points = points;
        self.grid_points = None;
        self.invalidate();
        Ok(())
    }

    fn evaluate(&mut self, source: Position) -> Result<Position> {
        self.warp(source)
    }
}
