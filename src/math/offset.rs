//! Approximate offsetting of cubic bézier curves.
//!
//! A cubic has no closed form offset, so the inner control points are nudged along the
//! end tangents until the curve passes close to three calibration points sampled from
//! the exact offset.

use std::collections::HashSet;

use super::{side_normal, CubicBezier2d, ParametricCurve2d, Point2d, Vector2d};
use crate::error::Result;
use cgmath::prelude::*;

/// The distance an inner control point is moved per refinement, in m.
const STEP: f64 = 0.01;

/// The maximum number of refinements.
const MAX_ITERATIONS: usize = 1000;

/// The parameters at which the offset curve is compared with the exact offset.
const CALIBRATION_TS: [f64; 3] = [0.25, 0.5, 0.75];

/// Offsets a cubic by `distance` to the right of its direction of travel,
/// optionally reversing it.
pub(crate) fn offset_cubic(curve: &CubicBezier2d, distance: f64, reverse: bool) -> Result<CubicBezier2d> {
    let [p0, p1, p2, p3] = curve.points();
    let dir0 = curve.direction(0.0)?;
    let dir1 = curve.direction(1.0)?;
    let normal = |dir: Vector2d| distance * side_normal(dir, reverse);

    // Each inner control point is translated along the normal of its nearest endpoint
    let (mut points, tangents) = if reverse {
        (
            [p3 + normal(dir1), p2 + normal(dir1), p1 + normal(dir0), p0 + normal(dir0)],
            [dir1, dir0],
        )
    } else {
        (
            [p0 + normal(dir0), p1 + normal(dir0), p2 + normal(dir1), p3 + normal(dir1)],
            [dir0, dir1],
        )
    };

    let mut calibration = [Point2d::origin(); 3];
    for (point, t) in calibration.iter_mut().zip(CALIBRATION_TS) {
        let t = if reverse { 1.0 - t } else { t };
        *point = curve.sample(t) + normal(curve.direction(t)?);
    }

    let error_of = |points: &[Point2d; 4]| -> f64 {
        let candidate = CubicBezier2d::new(points);
        CALIBRATION_TS
            .iter()
            .zip(&calibration)
            .map(|(t, target)| (candidate.sample(*t) - *target).magnitude())
            .sum()
    };

    let moves = [
        (1, tangents[0] * STEP),
        (1, tangents[0] * -STEP),
        (2, tangents[1] * STEP),
        (2, tangents[1] * -STEP),
    ];

    let mut error = error_of(&points);
    let mut best = (points, error);
    let mut seen = HashSet::new();

    for _ in 0..MAX_ITERATIONS {
        if !seen.insert(error.to_bits()) {
            break;
        }
        let (next_points, next_error) = moves
            .iter()
            .map(|(idx, delta)| {
                let mut trial = points;
                trial[*idx] += *delta;
                (trial, error_of(&trial))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((points, error));
        points = next_points;
        error = next_error;
        if error < best.1 {
            best = (points, error);
        }
    }

    Ok(CubicBezier2d::new(&best.0))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    /// Measures the worst deviation of `offset` from the true offset of `curve`.
    fn max_deviation(curve: &CubicBezier2d, offset: &CubicBezier2d, distance: f64) -> f64 {
        (1..100)
            .map(|i| i as f64 / 100.0)
            .map(|t| {
                let ideal = curve.sample(t) + distance * side_normal(curve.direction(t).unwrap(), false);
                (0..=20_000)
                    .map(|j| (offset.sample(j as f64 / 20_000.0) - ideal).magnitude())
                    .fold(f64::INFINITY, f64::min)
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn straight_cubic_offsets_exactly() {
        let line = CubicBezier2d::line(p(0.0, 0.0), p(90.0, 0.0));
        let offset = offset_cubic(&line, 3.5, false).unwrap();
        for (a, b) in offset.points().iter().zip(line.points()) {
            assert_approx_eq!(a.x, b.x);
            assert_approx_eq!(a.y, b.y + 3.5);
        }
    }

    #[test]
    fn refinement_tracks_the_true_offset() {
        let curve = CubicBezier2d::new(&[p(-3500.0, -2500.0), p(-3000.0, -2500.0), p(-2500.0, -2000.0), p(-2000.0, -2000.0)]);
        let offset = offset_cubic(&curve, 7.0, false).unwrap();
        assert!(max_deviation(&curve, &offset, 7.0) < 0.5);
    }

    #[test]
    fn reversed_offset_runs_backwards() {
        let curve = CubicBezier2d::new(&[p(0.0, 0.0), p(100.0, 0.0), p(200.0, 100.0), p(200.0, 200.0)]);
        let offset = offset_cubic(&curve, 5.0, true).unwrap();
        let [q0, _, _, q3] = offset.points();
        assert_approx_eq!(q0.x, 205.0);
        assert_approx_eq!(q0.y, 200.0);
        assert_approx_eq!(q3.x, 0.0);
        assert_approx_eq!(q3.y, -5.0);
    }
}
