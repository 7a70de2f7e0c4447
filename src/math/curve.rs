use super::{unit, Point2d, Vector2d};
use crate::error::Result;
use cgmath::prelude::*;
use itertools::Itertools;

/// A parametric curve in 2D space, defined for t in [0, 1].
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Samples the derivative of the parametric curve.
    fn sample_dt(&self, t: f64) -> Vector2d;

    /// Samples the second derivative of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt2(&self, t: f64) -> Vector2d {
        let delta = 0.0001;
        let p1 = self.sample_dt(t);
        let p2 = self.sample_dt(t + delta);
        (p2 - p1) / delta
    }

    /// Samples the third derivative (jerk) of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt3(&self, t: f64) -> Vector2d {
        let delta = 0.0001;
        let p1 = self.sample_dt2(t);
        let p2 = self.sample_dt2(t + delta);
        (p2 - p1) / delta
    }

    /// The unit tangent of the curve.
    fn direction(&self, t: f64) -> Result<Vector2d> {
        unit(self.sample_dt(t))
    }

    /// Approximates the arc length by summing a polyline of `segments` pieces.
    fn polyline_length(&self, segments: usize) -> f64 {
        (0..=segments)
            .map(|i| self.sample(i as f64 / segments as f64))
            .tuple_windows()
            .map(|(a, b)| (b - a).magnitude())
            .sum()
    }
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        (**self).sample_dt(t)
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        (**self).sample_dt2(t)
    }

    fn sample_dt3(&self, t: f64) -> Vector2d {
        (**self).sample_dt3(t)
    }
}
