//! # warpgrid
//!
//! Geometric transform construction from ground control points (GCPs): pairs
//! of corresponding positions in a source and a target coordinate space.
//!
//! Two families of builders are provided:
//!
//! - [`AffineSolver`] — iterative constrained least squares over the six
//!   geometric affine parameters (two scales, two rotations, two
//!   translations), with optional equality constraints among them.
//! - [`WarpGridBuilder`] — a dense regular displacement grid approximating a
//!   non-rigid mapping, filled by a pluggable [`GridFillStrategy`]:
//!   inverse-distance weighting ([`IdwStrategy`]), thin-plate splines
//!   ([`TpsStrategy`]), an arc-second-scaled TPS variant for legacy datum
//!   grids ([`NadconStrategy`]), or triangulated rubber-sheeting
//!   ([`RubberSheetStrategy`]). Built grids export to the legacy text
//!   correction-grid format via [`write_correction_grid`].
//!
//! Both builders implement [`TransformBuilder`], which is enough for the
//! leave-one-out accuracy diagnostic in [`estimate_error`].
//!
//! ## Example
//!
//! ```no_run
//! use warpgrid::{
//!     AffineParam, AffineSolver, ControlPoint, Envelope, Position,
//!     TpsStrategy, WarpGridBuilder,
//! };
//!
//! let points = vec![
//!     ControlPoint::new(Position::new(0.0, 0.0), Position::new(3.0, 1.0)),
//!     ControlPoint::new(Position::new(10.0, 0.0), Position::new(13.0, 1.0)),
//!     ControlPoint::new(Position::new(10.0, 10.0), Position::new(13.0, 11.0)),
//!     ControlPoint::new(Position::new(0.0, 10.0), Position::new(3.0, 11.0)),
//! ];
//!
//! // Constrained affine fit: force unit x-scale.
//! let mut solver = AffineSolver::new(points.clone()).unwrap();
//! solver.set_constraint(AffineParam::Sx, 1.0);
//! let transform = solver.transform().unwrap();
//!
//! // Non-rigid warp grid over the same points.
//! let envelope = Envelope::new(0.0, 0.0, 10.0, 10.0);
//! let mut builder =
//!     WarpGridBuilder::new(points, &envelope, 1.0, 1.0, Box::new(TpsStrategy)).unwrap();
//! let targets = builder.build_grid().unwrap();
//! # let _ = (transform, targets);
//! ```

pub mod affine;
pub mod error;
pub mod grid;
pub mod gridfile;
pub mod interpolate;
pub mod point;
pub mod solver;
pub mod strategy;
pub mod tester;
pub mod triangulation;
pub mod warpgrid;

pub use affine::{AffineParameters, AffineTransform};
pub use error::{BuildError, Result};
pub use grid::GridGeometry;
pub use gridfile::{write_correction_grid, GridAxis};
pub use interpolate::{IdwInterpolator, TpsInterpolator};
pub use point::{ControlPoint, Envelope, Position};
pub use solver::{AffineParam, AffineSolver};
pub use strategy::{IdwStrategy, NadconStrategy, RubberSheetStrategy, TpsStrategy};
pub use tester::estimate_error;
pub use triangulation::Triangulation;
pub use warpgrid::{GridFillStrategy, WarpGridBuilder};

/// Common surface of every GCP-driven transform builder: enough to swap the
/// point set, rebuild, and evaluate, which is all the cross-validation
/// diagnostic needs.
pub trait TransformBuilder {
    /// Minimum number of control points this builder accepts.
    fn min_points(&self) -> usize;

    /// The current control points.
    fn control_points(&self) -> &[ControlPoint];

    /// Replace the control points wholesale, invalidating every cached
    /// derived artifact.
    fn set_control_points(&mut self, points: Vec<ControlPoint>) -> Result<()>;

    /// Evaluate the built transform at a source position.
    fn evaluate(&mut self, source: Position) -> Result<Position>;
}
