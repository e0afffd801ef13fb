//! Leave-one-out cross-validation of a constructed transform
//!
//! Diagnostic only: each control point is withheld in turn, the transform is
//! rebuilt from the remaining points and evaluated at the withheld source, and
//! the distance to the known target is accumulated. O(N) full rebuilds.

use tracing::debug;

use crate::error::{BuildError, Result};
use crate::TransformBuilder;

/// Mean leave-one-out positional error across all control points.
///
/// The builder's point set is restored before returning, on success and
/// failure alike.
pub fn estimate_error<B: TransformBuilder>(builder: &mut B) -> Result<f64> {
    let points = builder.control_points().to_vec();
    let n = points.len();
    // Each rebuild must still satisfy the builder's own minimum.
    if n <= builder.min_points() {
        return Err(BuildError::InsufficientPoints {
            required: builder.min_points() + 1,
            found: n,
        });
    }

    let result = (|| {
        let mut total = 0.0;
        for i in 0..n {
            let mut rest = points.clone();
            let removed = rest.remove(i);
            builder.set_control_points(rest)?;
            let predicted = builder.evaluate(removed.source)?;
            let err = predicted.dist(removed.target);
            debug!("leave-one-out {}: error {:.6}", i, err);
            total += err;
        }
        Ok(total / n as f64)
    })();

    builder.set_control_points(points)?;
    result
}
