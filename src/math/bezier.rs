use super::offset::offset_cubic;
use super::{side_normal, signed_angle, Line2d, ParametricCurve2d, Point2d, Vector2d};
use crate::error::{Error, Result};
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The number of polyline segments used to measure a curved bézier.
const LENGTH_SEGMENTS: usize = 10_000;

/// Curves shorter than this, in m, are rejected as degenerate.
const MIN_LENGTH: f64 = 1e-6;

/// A straight line segment.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearBezier2d {
    points: [Point2d; 2],
}

impl LinearBezier2d {
    pub const fn new(points: &[Point2d; 2]) -> Self {
        Self { points: *points }
    }

    pub fn points(&self) -> [Point2d; 2] {
        self.points
    }
}

impl ParametricCurve2d for LinearBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        self.points[0] + t * (self.points[1] - self.points[0])
    }

    fn sample_dt(&self, _t: f64) -> Vector2d {
        self.points[1] - self.points[0]
    }

    fn sample_dt2(&self, _t: f64) -> Vector2d {
        Vector2d::zero()
    }

    fn sample_dt3(&self, _t: f64) -> Vector2d {
        Vector2d::zero()
    }
}

/// A quadratic bezier curve
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuadraticBezier2d {
    points: [Point2d; 3],
}

impl QuadraticBezier2d {
    pub const fn new(points: &[Point2d; 3]) -> Self {
        Self { points: *points }
    }

    pub fn points(&self) -> [Point2d; 3] {
        self.points
    }
}

impl ParametricCurve2d for QuadraticBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        let t1 = 1.0 - t;
        Point2d::from_vec(
            t1 * t1 * self.points[0].to_vec()
                + 2.0 * t1 * t * self.points[1].to_vec()
                + t * t * self.points[2].to_vec(),
        )
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let [p0, p1, p2] = self.points;
        2.0 * (1.0 - t) * (p1 - p0) + 2.0 * t * (p2 - p1)
    }

    fn sample_dt2(&self, _t: f64) -> Vector2d {
        let [p0, p1, p2] = self.points;
        2.0 * ((p2 - p1) - (p1 - p0))
    }

    fn sample_dt3(&self, _t: f64) -> Vector2d {
        Vector2d::zero()
    }
}

/// A cubic bezier curve
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CubicBezier2d {
    points: [Point2d; 4],
}

impl CubicBezier2d {
    pub const fn new(points: &[Point2d; 4]) -> Self {
        Self { points: *points }
    }

    /// A straight cubic with its inner control points at the thirds.
    pub fn line(start: Point2d, end: Point2d) -> Self {
        let s = start.to_vec();
        let e = end.to_vec();
        let ps = [s, s.lerp(e, 1. / 3.), s.lerp(e, 2. / 3.), e];
        Self {
            points: ps.map(Point2d::from_vec),
        }
    }

    pub fn points(&self) -> [Point2d; 4] {
        self.points
    }
}

impl ParametricCurve2d for CubicBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        let t1 = 1.0 - t;
        Point2d::from_vec(
            t1 * t1 * t1 * self.points[0].to_vec()
                + 3.0 * t1 * t1 * t * self.points[1].to_vec()
                + 3.0 * t1 * t * t * self.points[2].to_vec()
                + t * t * t * self.points[3].to_vec(),
        )
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let [p0, p1, p2, p3] = self.points;
        let t1 = 1.0 - t;
        3.0 * t1 * t1 * (p1 - p0) + 6.0 * t1 * t * (p2 - p1) + 3.0 * t * t * (p3 - p2)
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        let [p0, p1, p2, p3] = self.points;
        6.0 * (1.0 - t) * ((p2 - p1) - (p1 - p0)) + 6.0 * t * ((p3 - p2) - (p2 - p1))
    }

    fn sample_dt3(&self, _t: f64) -> Vector2d {
        let [p0, p1, p2, p3] = self.points;
        6.0 * ((p3 - p0) + 3.0 * (p1 - p2))
    }
}

/// A circular arc, stored as its standard four point cubic approximation.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CircularBezier2d {
    centre: Point2d,
    curve: CubicBezier2d,
}

impl CircularBezier2d {
    /// Creates an arc around `centre` from `start` to `end`, sweeping the smaller angle.
    pub fn new(start: Point2d, centre: Point2d, end: Point2d) -> Result<Self> {
        let from = start - centre;
        let to = end - centre;
        let radius = from.magnitude();
        let sweep = signed_angle(from, to);
        if radius < MIN_LENGTH || to.magnitude() < MIN_LENGTH || sweep.abs() < 1e-9 {
            return Err(Error::DegenerateGeometry("circular arc without a sweep"));
        }

        // Unit arc symmetric about the x-axis, rotated onto the start vector
        let phi = 0.5 * sweep;
        let (sin, cos) = phi.sin_cos();
        let x1 = (4.0 - cos) / 3.0;
        let y1 = (1.0 - cos) * (3.0 - cos) / (3.0 * sin);
        let (rot_sin, rot_cos) = (from.y.atan2(from.x) + phi).sin_cos();
        let place = |x: f64, y: f64| {
            centre + radius * Vector2d::new(x * rot_cos - y * rot_sin, x * rot_sin + y * rot_cos)
        };

        Ok(Self {
            centre,
            curve: CubicBezier2d::new(&[start, place(x1, -y1), place(x1, y1), end]),
        })
    }

    pub fn centre(&self) -> Point2d {
        self.centre
    }

    pub fn cubic(&self) -> &CubicBezier2d {
        &self.curve
    }
}

impl ParametricCurve2d for CircularBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        self.curve.sample(t)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        self.curve.sample_dt(t)
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        self.curve.sample_dt2(t)
    }

    fn sample_dt3(&self, t: f64) -> Vector2d {
        self.curve.sample_dt3(t)
    }
}

/// The shape of a [Bezier].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BezierKind {
    Linear(LinearBezier2d),
    Quadratic(QuadraticBezier2d),
    Cubic(CubicBezier2d),
    Circular(CircularBezier2d),
}

/// A curve segment that lanes and vehicles follow, with its arc length cached.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bezier {
    kind: BezierKind,
    length: f64,
}

impl Bezier {
    /// Creates a straight segment.
    pub fn linear(start: Point2d, end: Point2d) -> Result<Self> {
        Self::from_kind(BezierKind::Linear(LinearBezier2d::new(&[start, end])))
    }

    /// Creates a quadratic bezier.
    pub fn quadratic(p0: Point2d, p1: Point2d, p2: Point2d) -> Result<Self> {
        Self::from_kind(BezierKind::Quadratic(QuadraticBezier2d::new(&[p0, p1, p2])))
    }

    /// Creates a cubic bezier.
    pub fn cubic(p0: Point2d, p1: Point2d, p2: Point2d, p3: Point2d) -> Result<Self> {
        Self::from_kind(BezierKind::Cubic(CubicBezier2d::new(&[p0, p1, p2, p3])))
    }

    /// Creates a circular arc from `start` to `end` around `centre`.
    pub fn circular(start: Point2d, centre: Point2d, end: Point2d) -> Result<Self> {
        Self::from_kind(BezierKind::Circular(CircularBezier2d::new(start, centre, end)?))
    }

    /// Wraps a curve, measuring its length.
    pub fn from_kind(kind: BezierKind) -> Result<Self> {
        let length = match &kind {
            BezierKind::Linear(c) => (c.points[1] - c.points[0]).magnitude(),
            BezierKind::Quadratic(c) => c.polyline_length(LENGTH_SEGMENTS),
            BezierKind::Cubic(c) => c.polyline_length(LENGTH_SEGMENTS),
            BezierKind::Circular(c) => c.polyline_length(LENGTH_SEGMENTS),
        };
        if !length.is_finite() || length < MIN_LENGTH {
            return Err(Error::DegenerateGeometry("zero length curve"));
        }
        Ok(Self { kind, length })
    }

    /// Gets the shape of the curve.
    pub fn kind(&self) -> &BezierKind {
        &self.kind
    }

    /// Gets the arc length of the curve in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn first_point(&self) -> Point2d {
        self.sample(0.0)
    }

    pub fn last_point(&self) -> Point2d {
        self.sample(1.0)
    }

    /// The control points of an equivalent cubic, used for drawing.
    pub fn control_points(&self) -> [Point2d; 4] {
        match &self.kind {
            BezierKind::Linear(c) => CubicBezier2d::line(c.points[0], c.points[1]).points,
            BezierKind::Quadratic(c) => {
                let [p0, p1, p2] = c.points;
                [p0, p0 + (2.0 / 3.0) * (p1 - p0), p2 + (2.0 / 3.0) * (p1 - p2), p2]
            }
            BezierKind::Cubic(c) => c.points,
            BezierKind::Circular(c) => c.curve.points,
        }
    }

    /// Creates a copy of the curve translated `distance` to the right of its direction
    /// of travel. A reversed copy runs the other way and is translated to the
    /// right of the reversed direction.
    pub fn offset(&self, distance: f64, reverse: bool) -> Result<Self> {
        let normal = |t: f64| -> Result<Vector2d> {
            Ok(distance * side_normal(self.direction(t)?, reverse))
        };
        let start = self.first_point() + normal(0.0)?;
        let end = self.last_point() + normal(1.0)?;
        let (start, end) = if reverse { (end, start) } else { (start, end) };

        match &self.kind {
            BezierKind::Linear(_) => Self::linear(start, end),
            BezierKind::Quadratic(c) => {
                let [v0, v1] = if reverse {
                    [c.sample_dt(1.0), c.sample_dt(0.0)]
                } else {
                    [c.sample_dt(0.0), c.sample_dt(1.0)]
                };
                let middle = if super::is_colinear(v0, v1) {
                    c.points[1] + normal(0.5)?
                } else {
                    Line2d::new(start, v0).intersection(&Line2d::new(end, v1))?
                };
                Self::quadratic(start, middle, end)
            }
            BezierKind::Cubic(c) => Self::from_kind(BezierKind::Cubic(offset_cubic(c, distance, reverse)?)),
            BezierKind::Circular(c) => Self::circular(start, c.centre, end),
        }
    }
}

impl ParametricCurve2d for Bezier {
    fn sample(&self, t: f64) -> Point2d {
        match &self.kind {
            BezierKind::Linear(c) => c.sample(t),
            BezierKind::Quadratic(c) => c.sample(t),
            BezierKind::Cubic(c) => c.sample(t),
            BezierKind::Circular(c) => c.sample(t),
        }
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        match &self.kind {
            BezierKind::Linear(c) => c.sample_dt(t),
            BezierKind::Quadratic(c) => c.sample_dt(t),
            BezierKind::Cubic(c) => c.sample_dt(t),
            BezierKind::Circular(c) => c.sample_dt(t),
        }
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        match &self.kind {
            BezierKind::Linear(c) => c.sample_dt2(t),
            BezierKind::Quadratic(c) => c.sample_dt2(t),
            BezierKind::Cubic(c) => c.sample_dt2(t),
            BezierKind::Circular(c) => c.sample_dt2(t),
        }
    }

    fn sample_dt3(&self, t: f64) -> Vector2d {
        match &self.kind {
            BezierKind::Linear(c) => c.sample_dt3(t),
            BezierKind::Quadratic(c) => c.sample_dt3(t),
            BezierKind::Cubic(c) => c.sample_dt3(t),
            BezierKind::Circular(c) => c.sample_dt3(t),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    fn assert_points_eq(a: Point2d, b: Point2d, tol: f64) {
        assert!((a - b).magnitude() < tol, "{:?} != {:?}", a, b);
    }

    fn samples() -> Vec<Bezier> {
        vec![
            Bezier::linear(p(0.0, 0.0), p(100.0, 0.0)).unwrap(),
            Bezier::quadratic(p(0.0, 0.0), p(50.0, 0.0), p(50.0, 50.0)).unwrap(),
            Bezier::cubic(p(-3500.0, -2500.0), p(-3000.0, -2500.0), p(-2500.0, -2000.0), p(-2000.0, -2000.0)).unwrap(),
            Bezier::circular(p(-2000.0, -2000.0), p(-2000.0, -1500.0), p(-1500.0, -1500.0)).unwrap(),
        ]
    }

    #[test]
    fn endpoints_match_control_points() {
        for curve in samples() {
            let points = curve.control_points();
            assert_points_eq(curve.sample(0.0), points[0], 1e-9);
            assert_points_eq(curve.sample(1.0), points[3], 1e-9);
        }
    }

    #[test]
    fn linear_length_and_velocity() {
        let line = Bezier::linear(p(0.0, 0.0), p(100.0, 0.0)).unwrap();
        assert_eq!(line.length(), 100.0);
        for t in [0.0, 0.3, 0.7, 1.0] {
            assert_eq!(line.sample_dt(t), Vector2d::new(100.0, 0.0));
            assert_eq!(line.sample_dt2(t), Vector2d::zero());
        }
    }

    #[test]
    fn quarter_circle_is_close_to_an_arc() {
        let arc = Bezier::circular(p(500.0, 0.0), p(0.0, 0.0), p(0.0, 500.0)).unwrap();
        let expected = 0.5 * std::f64::consts::PI * 500.0;
        assert!((arc.length() - expected).abs() / expected < 1e-3);
        assert_approx_eq!((arc.sample(0.5) - p(0.0, 0.0)).magnitude(), 500.0, 0.2);
    }

    #[test]
    fn cubic_derivatives() {
        let c = CubicBezier2d::new(&[p(0.0, 0.0), p(1.0, 2.0), p(3.0, 3.0), p(4.0, 0.0)]);
        let h = 1e-6;
        for t in [0.1, 0.5, 0.9] {
            let numeric = (c.sample(t + h) - c.sample(t - h)) / (2.0 * h);
            assert_approx_eq!(numeric.x, c.sample_dt(t).x, 1e-4);
            assert_approx_eq!(numeric.y, c.sample_dt(t).y, 1e-4);
            let numeric = (c.sample_dt(t + h) - c.sample_dt(t - h)) / (2.0 * h);
            assert_approx_eq!(numeric.x, c.sample_dt2(t).x, 1e-4);
            assert_approx_eq!(numeric.y, c.sample_dt2(t).y, 1e-4);
        }
        let numeric = (c.sample_dt2(0.6) - c.sample_dt2(0.4)) / 0.2;
        assert_approx_eq!(numeric.x, c.sample_dt3(0.5).x, 1e-6);
        assert_approx_eq!(numeric.y, c.sample_dt3(0.5).y, 1e-6);
    }

    #[test]
    fn zero_length_curves_are_rejected() {
        assert!(matches!(
            Bezier::linear(p(1.0, 1.0), p(1.0, 1.0)),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(Bezier::circular(p(1.0, 0.0), p(0.0, 0.0), p(2.0, 0.0)).is_err());
    }

    #[test]
    fn linear_offset_is_exact() {
        let line = Bezier::linear(p(0.0, 0.0), p(100.0, 0.0)).unwrap();
        let right = line.offset(2.0, false).unwrap();
        assert_points_eq(right.first_point(), p(0.0, 2.0), 1e-12);
        assert_points_eq(right.last_point(), p(100.0, 2.0), 1e-12);
        let back = line.offset(2.0, true).unwrap();
        assert_points_eq(back.first_point(), p(100.0, -2.0), 1e-12);
        assert_points_eq(back.last_point(), p(0.0, -2.0), 1e-12);
    }

    #[test]
    fn offset_round_trip() {
        for curve in samples() {
            for d in [-5.25, 1.75, 3.5] {
                let there = curve.offset(d, false).unwrap();
                let back = there.offset(-d, false).unwrap();
                assert_points_eq(back.first_point(), curve.first_point(), 1e-6);
                assert_points_eq(back.last_point(), curve.last_point(), 1e-6);

                let reversed = there.offset(d, true).unwrap();
                assert_points_eq(reversed.first_point(), curve.last_point(), 1e-6);
                assert_points_eq(reversed.last_point(), curve.first_point(), 1e-6);
            }
        }
    }

    #[test]
    fn arc_offset_keeps_its_centre() {
        let arc = Bezier::circular(p(500.0, 0.0), p(0.0, 0.0), p(0.0, 500.0)).unwrap();
        let inner = arc.offset(10.0, false).unwrap();
        match inner.kind() {
            BezierKind::Circular(c) => assert_eq!(c.centre(), p(0.0, 0.0)),
            other => panic!("unexpected {:?}", other),
        }
        assert_approx_eq!((inner.first_point() - p(0.0, 0.0)).magnitude(), 490.0, 1e-9);
    }
}
