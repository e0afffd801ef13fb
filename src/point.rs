//! Control points and the value types they are built from

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// A 2D position in either world or grid coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another position
    #[inline]
    pub fn dist_sq(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another position
    #[inline]
    pub fn dist(&self, other: Position) -> f64 {
        self.dist_sq(other).sqrt()
    }
}

/// A ground control point: a known correspondence between a source and a
/// target position. Immutable once handed to a builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlPoint {
    pub source: Position,
    pub target: Position,
    /// Optional coordinate-reference tag carried through unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_system: Option<String>,
}

impl ControlPoint {
    pub fn new(source: Position, target: Position) -> Self {
        Self {
            source,
            target,
            reference_system: None,
        }
    }

    pub fn with_reference_system(source: Position, target: Position, rs: &str) -> Self {
        Self {
            source,
            target,
            reference_system: Some(rs.to_string()),
        }
    }

    /// Per-axis offset from source to target.
    #[inline]
    pub fn shift(&self) -> (f64, f64) {
        (
            self.target.x - self.source.x,
            self.target.y - self.source.y,
        )
    }
}

/// Axis-aligned bounding envelope of the working area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest envelope containing all source positions.
    pub fn of_sources(points: &[ControlPoint]) -> Result<Self> {
        if points.is_empty() {
            return Err(BuildError::InvalidEnvelope);
        }
        let mut env = Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for p in points {
            env.min_x = env.min_x.min(p.source.x);
            env.min_y = env.min_y.min(p.source.y);
            env.max_x = env.max_x.max(p.source.x);
            env.max_y = env.max_y.max(p.source.y);
        }
        Ok(env)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the envelope spans a non-empty area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0 && self.min_x.is_finite() && self.min_y.is_finite()
    }

    /// A copy grown on every side by `fraction` of the corresponding span.
    /// Used to build the enlarged quadrilateral around rubber-sheet points.
    pub fn expanded_by_fraction(&self, fraction: f64) -> Self {
        let fx = self.width() * fraction;
        let fy = self.height() * fraction;
        Self {
            min_x: self.min_x - fx,
            min_y: self.min_y - fy,
            max_x: self.max_x + fx,
            max_y: self.max_y + fy,
        }
    }

    /// Corner positions, counter-clockwise from the minimum corner.
    pub fn corners(&self) -> [Position; 4] {
        [
            Position::new(self.min_x, self.min_y),
            Position::new(self.max_x, self.min_y),
            Position::new(self.max_x, self.max_y),
            Position::new(self.min_x, self.max_y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift() {
        let cp = ControlPoint::new(Position::new(1.0, 2.0), Position::new(4.0, 0.0));
        assert_eq!(cp.shift(), (3.0, -2.0));
    }

    #[test]
    fn test_envelope_of_sources() {
        let pts = vec![
            ControlPoint::new(Position::new(0.0, 1.0), Position::new(0.0, 1.0)),
            ControlPoint::new(Position::new(5.0, -2.0), Position::new(5.0, -2.0)),
        ];
        let env = Envelope::of_sources(&pts).unwrap();
        assert_eq!(env.min_x, 0.0);
        assert_eq!(env.min_y, -2.0);
        assert_eq!(env.max_x, 5.0);
        assert_eq!(env.max_y, 1.0);
        assert!(env.is_valid());
    }

    #[test]
    fn test_envelope_of_no_sources() {
        assert!(matches!(
            Envelope::of_sources(&[]),
            Err(BuildError::InvalidEnvelope)
        ));
    }

    #[test]
    fn test_expanded_corners() {
        let env = Envelope::new(0.0, 0.0, 100.0, 200.0).expanded_by_fraction(0.01);
        assert_eq!(env.min_x, -1.0);
        assert_eq!(env.max_y, 202.0);
        assert_eq!(env.corners()[2], Position::new(101.0, 202.0));
    }

    #[test]
    fn test_degenerate_envelope() {
        assert!(!Envelope::new(3.0, 0.0, 3.0, 5.0).is_valid());
    }
}
