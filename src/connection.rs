//! Lane changes in progress.

use crate::error::Result;
use crate::math::{is_colinear, unit, Bezier, Line2d, ParametricCurve2d, Point2d, Vector2d};
use crate::network::Lane;
use crate::LaneId;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The duration of a lane change in s.
const CHANGE_TIME: f64 = 2.0; // s

/// A lane change may not end this close to the end of a lane with successors, in m.
const END_CLEARANCE: f64 = 50.0; // m

/// A curve carrying a vehicle from one lane to a neighbouring one.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Connection {
    start_lane: LaneId,
    end_lane: LaneId,
    start_segment: usize,
    start_time: f64,
    end_segment: usize,
    end_time: f64,
    /// The path between the lanes.
    curve: Bezier,
    /// How far along the curve the vehicle is, from 0 to 1.
    time: f64,
}

impl Connection {
    /// Plans a lane change for a vehicle at `segment` and `time` on `start`, moving at `speed`.
    ///
    /// Returns `Ok(None)` if the change would end past the last segment of `end`, or too
    /// close to its end for the vehicle to merge before the next lane.
    pub fn plan(start: &Lane, end: &Lane, segment: usize, time: f64, speed: f64) -> Result<Option<Self>> {
        let mut end_segment = segment;
        let mut end_time = time + CHANGE_TIME * speed / end.segment(end_segment).length();
        while end_time > 1.0 {
            let leftover = (end_time - 1.0) * end.segment(end_segment).length();
            end_segment += 1;
            if end_segment > end.last_segment() {
                return Ok(None);
            }
            end_time = leftover / end.segment(end_segment).length();
        }
        if end_segment == end.last_segment() && !end.next().is_empty() {
            let last = end.segment(end_segment).length();
            if end_time > 1.0 - END_CLEARANCE / last {
                return Ok(None);
            }
        }

        let start_curve = start.segment(segment);
        let end_curve = end.segment(end_segment);
        let curve = Self::path(
            start_curve.sample(time),
            start_curve.sample_dt(time),
            end_curve.sample(end_time),
            end_curve.sample_dt(end_time),
        )?;

        Ok(Some(Self {
            start_lane: start.id(),
            end_lane: end.id(),
            start_segment: segment,
            start_time: time,
            end_segment,
            end_time,
            curve,
            time: 0.0,
        }))
    }

    /// Builds a smooth path from `p0` heading along `v0` to `p3` heading along `v3`.
    ///
    /// Parallel headings give an S-shaped cubic. Otherwise the path is a quadratic through
    /// the point where the two headings meet, unless that point lies further away than
    /// the end of the path.
    fn path(p0: Point2d, v0: Vector2d, p3: Point2d, v3: Vector2d) -> Result<Bezier> {
        let cubic = || -> Result<Bezier> {
            let handle = 2.0 * (p3 - p0).magnitude() / 3.0;
            Bezier::cubic(p0, p0 + unit(v0)? * handle, p3 - unit(v3)? * handle, p3)
        };
        if is_colinear(v0, v3) {
            return cubic();
        }
        match Line2d::new(p0, v0).intersection(&Line2d::new(p3, v3)) {
            Ok(middle) if (middle - p0).magnitude() <= (p3 - p0).magnitude() => {
                Bezier::quadratic(p0, middle, p3)
            }
            _ => cubic(),
        }
    }

    /// Moves along the curve by `distance` m.
    ///
    /// Returns the distance travelled past the end of the curve once it is complete.
    pub fn advance(&mut self, distance: f64) -> Option<f64> {
        self.time += distance / self.curve.length();
        (self.time > 1.0).then(|| (self.time - 1.0) * self.curve.length())
    }

    /// The time index on the end lane matching the progress along the curve.
    pub fn time_index(&self) -> f64 {
        let start = self.start_segment as f64 + self.start_time;
        let end = self.end_segment as f64 + self.end_time;
        start + self.time.min(1.0) * (end - start)
    }

    pub fn start_lane(&self) -> LaneId {
        self.start_lane
    }

    pub fn end_lane(&self) -> LaneId {
        self.end_lane
    }

    pub fn start_segment(&self) -> usize {
        self.start_segment
    }

    pub fn end_segment(&self) -> usize {
        self.end_segment
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Gets the path between the lanes.
    pub fn curve(&self) -> &Bezier {
        &self.curve
    }

    /// Gets the progress along the curve, from 0 to 1.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The position along the curve.
    pub fn position(&self) -> Point2d {
        self.curve.sample(self.time.min(1.0))
    }

    /// The velocity of the curve at the current position.
    pub fn velocity(&self) -> Vector2d {
        self.curve.sample_dt(self.time.min(1.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{LaneDirection, Network, RoadData, SpeedTable};
    use assert_approx_eq::assert_approx_eq;

    fn two_lanes(length: f64) -> (Network, LaneId, LaneId) {
        let data = RoadData {
            forward_lanes: 2,
            backward_lanes: 0,
            forward_shoulder: false,
            backward_shoulder: false,
            lane_width: 3.5,
            dash_length: 3.0,
            dash_width: 0.15,
            gap_length: 9.0,
            speeds: SpeedTable {
                bus: 20.0,
                car: 20.0,
                motorcycle: 20.0,
                truck: 20.0,
                vehicle: 20.0,
            },
        };
        let mut network = Network::new();
        let segments = vec![
            Bezier::linear(Point2d::new(0.0, 0.0), Point2d::new(length / 2.0, 0.0)).unwrap(),
            Bezier::linear(Point2d::new(length / 2.0, 0.0), Point2d::new(length, 0.0)).unwrap(),
        ];
        let road = network.add_road(&data, segments).unwrap();
        let lanes = network.road(road).lanes_in(LaneDirection::Forward).to_vec();
        (network, lanes[0], lanes[1])
    }

    #[test]
    fn parallel_lanes_are_joined_by_a_cubic() {
        let (network, left, right) = two_lanes(1000.0);
        let (start, end) = (network.lane(left), network.lane(right));
        let connection = Connection::plan(start, end, 0, 0.1, 20.0).unwrap().unwrap();
        assert_eq!(connection.end_segment(), 0);
        assert_approx_eq!(connection.end_time(), 0.1 + 40.0 / 500.0);
        let (first, last) = (connection.curve().first_point(), connection.curve().last_point());
        assert_approx_eq!(first.x, 100.0);
        assert_approx_eq!(first.y, 1.75);
        assert_approx_eq!(last.x, 180.0);
        assert_approx_eq!(last.y, 5.25);
        assert!(matches!(connection.curve().kind(), crate::math::BezierKind::Cubic(_)));
        assert_approx_eq!(connection.time_index(), 0.1);
    }

    #[test]
    fn changes_carry_into_the_next_segment() {
        let (network, left, right) = two_lanes(1000.0);
        let connection = Connection::plan(network.lane(left), network.lane(right), 0, 0.95, 20.0)
            .unwrap()
            .unwrap();
        assert_eq!(connection.end_segment(), 1);
        assert_approx_eq!(connection.end_time(), 15.0 / 500.0);
    }

    #[test]
    fn changes_past_the_lane_end_are_vetoed() {
        let (network, left, right) = two_lanes(100.0);
        let result = Connection::plan(network.lane(left), network.lane(right), 1, 0.5, 20.0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn advancing_reports_the_overshoot() {
        let (network, left, right) = two_lanes(1000.0);
        let mut connection = Connection::plan(network.lane(left), network.lane(right), 0, 0.0, 10.0)
            .unwrap()
            .unwrap();
        let length = connection.curve().length();
        assert_eq!(connection.advance(0.5 * length), None);
        assert_approx_eq!(connection.time(), 0.5);
        assert_approx_eq!(connection.time_index(), 0.5 * 20.0 / 500.0);
        let overshoot = connection.advance(0.6 * length).unwrap();
        assert_approx_eq!(overshoot, 0.1 * length);
        assert_approx_eq!(connection.time_index(), 20.0 / 500.0);
    }
}
