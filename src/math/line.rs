use super::{Point2d, Vector2d};
use crate::error::{Error, Result};
use cgmath::prelude::*;

/// An infinite line through a point.
#[derive(Clone, Copy, Debug)]
pub struct Line2d {
    /// A point on the line.
    pub origin: Point2d,
    /// The direction of the line.
    pub direction: Vector2d,
}

impl Line2d {
    /// Creates a line through `origin` running along `direction`.
    pub const fn new(origin: Point2d, direction: Vector2d) -> Self {
        Self { origin, direction }
    }

    /// Computes the point where this line crosses another.
    pub fn intersection(&self, other: &Line2d) -> Result<Point2d> {
        let denom = self.direction.perp_dot(other.direction);
        let scale = self.direction.magnitude() * other.direction.magnitude();
        if denom.abs() <= 1e-9 * scale || scale == 0.0 {
            return Err(Error::DegenerateGeometry("intersection of parallel lines"));
        }
        let t = (other.origin - self.origin).perp_dot(other.direction) / denom;
        Ok(self.origin + self.direction * t)
    }
}
