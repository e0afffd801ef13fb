//! Regular grid geometry derived from an envelope and a desired spacing
//!
//! A grid with `x_count` by `y_count` cells has `x_count+1` by `y_count+1`
//! nodes. The flat `targets` array stores one (x, y) pair of 32-bit floats per
//! node in row-major order starting at the minimum-y row: node `(i, j)` (row i
//! from the bottom, column j from the left) lives at offset
//! `2·(i·(x_count+1)+j)`. This ordering is shared with the legacy grid-file
//! format and any downstream piecewise-warp consumer.

use serde::{Deserialize, Serialize};

use crate::affine::AffineTransform;
use crate::error::{BuildError, Result};
use crate::point::{Envelope, Position};

/// Geometry of a regular warp grid plus its per-node target positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridGeometry {
    pub x_step: f64,
    pub y_step: f64,
    pub x_start: f64,
    pub y_start: f64,
    /// Number of cells along each axis (nodes are counts + 1).
    pub x_count: usize,
    pub y_count: usize,
    /// Flat (x, y) target pairs, one per node, bottom row first.
    targets: Vec<f32>,
}

impl GridGeometry {
    /// Derive a grid with continuous origin and steps.
    pub fn from_envelope(envelope: &Envelope, dx: f64, dy: f64) -> Result<Self> {
        if !envelope.is_valid() || dx <= 0.0 || dy <= 0.0 {
            return Err(BuildError::InvalidEnvelope);
        }
        let x_count = (envelope.width() / dx).floor() as usize;
        let y_count = (envelope.height() / dy).floor() as usize;
        Ok(Self::with_counts(
            envelope.min_x,
            envelope.min_y,
            dx,
            dy,
            x_count,
            y_count,
        ))
    }

    /// Derive a grid snapped to integer grid-space coordinates, as required by
    /// the legacy fixed-grid export. The envelope is mapped through
    /// `world_to_grid`, steps are scaled by the transform's axis scale factors
    /// and rounded to the nearest integer (at least 1), and the origin is
    /// floored to an integer.
    pub fn snapped(
        envelope: &Envelope,
        dx: f64,
        dy: f64,
        world_to_grid: &AffineTransform,
    ) -> Result<Self> {
        if !envelope.is_valid() || dx <= 0.0 || dy <= 0.0 {
            return Err(BuildError::InvalidEnvelope);
        }
        let lo = world_to_grid.apply(Position::new(envelope.min_x, envelope.min_y));
        let hi = world_to_grid.apply(Position::new(envelope.max_x, envelope.max_y));
        let grid_env = Envelope::new(
            lo.x.min(hi.x),
            lo.y.min(hi.y),
            lo.x.max(hi.x),
            lo.y.max(hi.y),
        );
        if !grid_env.is_valid() {
            return Err(BuildError::InvalidEnvelope);
        }

        let (scale_x, scale_y) = world_to_grid.axis_scales();
        let x_step = (dx * scale_x).round().max(1.0);
        let y_step = (dy * scale_y).round().max(1.0);
        let x_count = (grid_env.width() / x_step).floor() as usize;
        let y_count = (grid_env.height() / y_step).floor() as usize;

        Ok(Self::with_counts(
            grid_env.min_x.floor(),
            grid_env.min_y.floor(),
            x_step,
            y_step,
            x_count,
            y_count,
        ))
    }

    /// Build directly from an origin, steps and cell counts, allocating the
    /// node target array.
    pub fn with_counts(
        x_start: f64,
        y_start: f64,
        x_step: f64,
        y_step: f64,
        x_count: usize,
        y_count: usize,
    ) -> Self {
        let nodes = (x_count + 1) * (y_count + 1);
        Self {
            x_step,
            y_step,
            x_start,
            y_start,
            x_count,
            y_count,
            targets: vec![0.0; nodes * 2],
        }
    }

    /// Node columns (`x_count + 1`).
    pub fn columns(&self) -> usize {
        self.x_count + 1
    }

    /// Node rows (`y_count + 1`).
    pub fn rows(&self) -> usize {
        self.y_count + 1
    }

    /// Nominal position of node `(i, j)`, row i counted from the minimum-y row.
    #[inline]
    pub fn node_position(&self, i: usize, j: usize) -> Position {
        Position::new(
            self.x_start + j as f64 * self.x_step,
            self.y_start + i as f64 * self.y_step,
        )
    }

    /// Offset of node `(i, j)` into the flat target array.
    #[inline]
    pub fn offset(&self, i: usize, j: usize) -> usize {
        2 * (i * self.columns() + j)
    }

    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    pub fn set_targets(&mut self, targets: Vec<f32>) {
        debug_assert_eq!(targets.len(), self.targets.len());
        self.targets = targets;
    }

    /// Target position stored at node `(i, j)`.
    #[inline]
    pub fn target(&self, i: usize, j: usize) -> Position {
        let off = self.offset(i, j);
        Position::new(self.targets[off] as f64, self.targets[off + 1] as f64)
    }

    #[inline]
    pub fn set_target(&mut self, i: usize, j: usize, p: Position) {
        let off = self.offset(i, j);
        self.targets[off] = p.x as f32;
        self.targets[off + 1] = p.y as f32;
    }
}
