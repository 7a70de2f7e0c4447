use std::collections::BTreeMap;

use super::{Lane, LaneDirection, LaneType, Network, Road};
use crate::error::{Error, Result};
use crate::light::TrafficLightSystem;
use crate::math::{
    is_colinear, left_normal, right_normal, unit, Bezier, CubicBezier2d, Line2d, Point2d,
};
use crate::{CrossingId, LaneId, LaneSet, RoadId};
use cgmath::prelude::*;
use itertools::Itertools;
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// The destination of a connector: a road, counted from the source road in
/// crossing order, and a lane on it heading away from the crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadLaneIndex {
    pub road_offset: usize,
    pub lane: usize,
}

impl RoadLaneIndex {
    pub const fn new(road_offset: usize, lane: usize) -> Self {
        Self { road_offset, lane }
    }
}

/// A road joining a crossing, with the connectors out of each of its incoming lanes.
#[derive(Clone, Debug)]
pub struct RoadConnection {
    /// The road.
    pub road: RoadId,
    /// Maps the index of each lane heading toward the crossing to its destinations.
    pub lanes: BTreeMap<usize, Vec<RoadLaneIndex>>,
}

impl RoadConnection {
    pub fn new(road: RoadId, lanes: BTreeMap<usize, Vec<RoadLaneIndex>>) -> Self {
        Self { road, lanes }
    }
}

/// The appearance of a crossing.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossingData {
    /// The width of the stop lines in m.
    pub line_width: f64,
}

/// An intersection where roads meet.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Crossing {
    /// The crossing ID.
    id: CrossingId,
    /// The centre of the crossing.
    location: Point2d,
    /// The roads meeting at the crossing, sorted by descending angle around it.
    roads: Vec<RoadId>,
    /// Two corner points per road, at the edges of the road's end.
    corners: Vec<Point2d>,
    /// The outline of the crossing as cubic bezier control points.
    outline: Vec<[Point2d; 4]>,
    /// The connectors.
    lanes: Vec<LaneId>,
    /// The traffic lights.
    lights: TrafficLightSystem,
    /// The appearance of the crossing.
    data: CrossingData,
}

/// A connector that will be added to the network.
pub(crate) struct ConnectorPlan {
    pub source: LaneId,
    pub target: LaneId,
    pub segment: Bezier,
    /// The direction and index of the target lane, which the connector takes on.
    pub direction: LaneDirection,
    pub index: usize,
    /// The width of the source lane.
    pub width: f64,
}

/// A traffic light that will be added to the network.
pub(crate) struct LightPlan {
    pub road: RoadId,
    pub lane: LaneId,
    pub location: Point2d,
    pub exits: Vec<LaneId>,
}

/// Everything needed to add a crossing, computed before the network is changed.
pub(crate) struct CrossingPlan {
    /// Each road and whether it runs toward the crossing.
    pub roads: Vec<(RoadId, bool)>,
    pub corners: Vec<Point2d>,
    pub outline: Vec<[Point2d; 4]>,
    pub connectors: Vec<ConnectorPlan>,
    pub lights: Vec<LightPlan>,
}

impl Crossing {
    /// Works out the geometry and wiring of a crossing without changing anything.
    pub(crate) fn plan(
        location: Point2d,
        connections: &[RoadConnection],
        roads: &SlotMap<RoadId, Road>,
        lanes: &LaneSet,
    ) -> Result<CrossingPlan> {
        if connections.is_empty() {
            return Err(Error::InvalidNetwork("crossing without roads".into()));
        }
        let mut sorted = Vec::with_capacity(connections.len());
        for connection in connections {
            let road = roads
                .get(connection.road)
                .ok_or_else(|| Error::InvalidNetwork(format!("unknown road {:?}", connection.road)))?;
            let toward = road.is_toward(location);
            let end = if toward { road.next() } else { road.previous() };
            if end.is_some() {
                return Err(Error::InvalidNetwork(format!(
                    "road {:?} is already connected at that end",
                    connection.road
                )));
            }
            let sort_point = road.toward_point(location);
            let angle = (sort_point.y - location.y).atan2(sort_point.x - location.x);
            sorted.push((connection, road, toward, angle));
        }
        sorted.sort_by(|a, b| b.3.total_cmp(&a.3));
        let count = sorted.len();

        let mut corners = Vec::with_capacity(2 * count);
        for (_, road, toward, _) in &sorted {
            let half_width = 0.5 * road.width();
            if *toward {
                let dir = road.last_direction()?;
                corners.push(road.last_point() + left_normal(dir) * half_width);
                corners.push(road.last_point() + right_normal(dir) * half_width);
            } else {
                let dir = road.first_direction()?;
                corners.push(road.first_point() + right_normal(dir) * half_width);
                corners.push(road.first_point() + left_normal(dir) * half_width);
            }
        }

        let mut connectors = vec![];
        let mut lights = vec![];
        for (i, (connection, road, _, _)) in sorted.iter().enumerate() {
            let sources = road.toward_lanes(location);
            for (source_index, targets) in &connection.lanes {
                let source = *sources.get(*source_index).ok_or_else(|| {
                    Error::InvalidNetwork(format!("road {:?} has no lane {}", connection.road, source_index))
                })?;
                let mut exits = vec![];
                for target in targets {
                    let (_, exit_road, _, _) = sorted[(i + target.road_offset) % count];
                    let target = *exit_road.offward_lanes(location).get(target.lane).ok_or_else(|| {
                        Error::InvalidNetwork(format!("road {:?} has no lane {}", exit_road.id(), target.lane))
                    })?;
                    let segment = connector_curve(&lanes[source], &lanes[target])?;
                    exits.push(target);
                    connectors.push(ConnectorPlan {
                        source,
                        target,
                        segment,
                        direction: lanes[target].direction(),
                        index: lanes[target].index(),
                        width: lanes[source].width(),
                    });
                }
                if lanes[source].lane_type() != LaneType::Shoulder {
                    lights.push(LightPlan {
                        road: connection.road,
                        lane: source,
                        location: lanes[source].last_point(),
                        exits,
                    });
                }
            }
        }

        Ok(CrossingPlan {
            roads: sorted.iter().map(|(c, _, toward, _)| (c.road, *toward)).collect(),
            outline: outline(&corners),
            corners,
            connectors,
            lights,
        })
    }

    pub(crate) fn new(
        id: CrossingId,
        location: Point2d,
        data: CrossingData,
        plan: &CrossingPlan,
    ) -> Self {
        Self {
            id,
            location,
            roads: plan.roads.iter().map(|(road, _)| *road).collect(),
            corners: plan.corners.clone(),
            outline: plan.outline.clone(),
            lanes: vec![],
            lights: TrafficLightSystem::new(),
            data,
        }
    }

    /// Gets the crossing ID.
    pub fn id(&self) -> CrossingId {
        self.id
    }

    /// Gets the centre of the crossing.
    pub fn location(&self) -> Point2d {
        self.location
    }

    /// Gets the roads meeting at the crossing, in crossing order.
    pub fn roads(&self) -> &[RoadId] {
        &self.roads
    }

    /// Gets the corner points, two per road.
    pub fn corners(&self) -> &[Point2d] {
        &self.corners
    }

    /// Gets the outline as cubic bezier control points.
    pub fn outline(&self) -> &[[Point2d; 4]] {
        &self.outline
    }

    /// Gets the connectors.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// Gets the traffic light system.
    pub fn lights(&self) -> &TrafficLightSystem {
        &self.lights
    }

    pub(crate) fn lights_mut(&mut self) -> &mut TrafficLightSystem {
        &mut self.lights
    }

    pub(crate) fn add_lane(&mut self, lane: LaneId) {
        self.lanes.push(lane);
    }

    pub fn data(&self) -> &CrossingData {
        &self.data
    }

    /// Picks the road out of the crossing that leads toward `point`.
    ///
    /// A road whose far end is within a road width of the point is taken directly.
    /// Otherwise the roads that do not end at the edge of the map are ranked by the
    /// distance from their far end to the point, and the least busy road within
    /// 20% of the best distance is chosen.
    pub fn road_to(&self, network: &Network, source: RoadId, point: Point2d) -> Option<RoadId> {
        let mut candidates = vec![];
        for road in self.roads.iter().filter(|id| **id != source).map(|id| network.road(*id)) {
            let distance = road.offward_point(self.location).distance(point);
            if distance < road.width() {
                return Some(road.id());
            }
            let end_of_map = if road.is_toward(self.location) {
                road.previous().is_none()
            } else {
                road.next().is_none()
            };
            candidates.push((road, distance, end_of_map));
        }

        let min = candidates
            .iter()
            .filter(|(_, _, end_of_map)| !end_of_map)
            .map(|(_, distance, _)| *distance)
            .min_by(f64::total_cmp);
        let best = min.and_then(|min| {
            candidates
                .iter()
                .filter(|(_, distance, end_of_map)| !end_of_map && *distance <= 1.2 * min)
                .min_by_key(|(road, _, _)| road.vehicle_count(network.lanes()))
        });
        match best {
            Some((road, _, _)) => Some(road.id()),
            None => {
                let closest = candidates
                    .iter()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(road, _, _)| road.id());
                if closest.is_some() {
                    warn!("no road out of crossing {:?} leads inland, taking the closest", self.id);
                }
                closest
            }
        }
    }

    /// The index of the lane on `source` to be in to leave the crossing toward `point`.
    pub fn lane_index_to(&self, network: &Network, source: RoadId, point: Point2d) -> Option<usize> {
        let exit = self.road_to(network, source, point)?;
        self.lanes
            .iter()
            .map(|id| network.lane(*id))
            .find(|lane| {
                let from = lane.previous().first().and_then(|id| network.lane(*id).road());
                let to = lane.next().first().and_then(|id| network.lane(*id).road());
                from == Some(source) && to == Some(exit)
            })
            .and_then(|lane| lane.previous().first())
            .map(|id| network.lane(*id).index())
    }
}

/// Builds the curve of a connector from the end of one lane to the start of another.
/// Lanes heading the same way are joined by an S-shaped cubic, others by a
/// quadratic through the intersection of their tangents.
fn connector_curve(from: &Lane, to: &Lane) -> Result<Bezier> {
    let (p1, p2) = (from.last_point(), to.first_point());
    let (v1, v2) = (from.last_velocity(), to.first_velocity());
    if is_colinear(v1, v2) {
        let v3 = unit(v1)? * (p2 - p1).magnitude() / 3.0;
        Bezier::cubic(p1, p1 + v3, p2 - v3, p2)
    } else {
        let middle = Line2d::new(p1, v1).intersection(&Line2d::new(p2, v2))?;
        Bezier::quadratic(p1, middle, p2)
    }
}

/// Traces the outline of a crossing through its corner points. The mouth of each
/// road is a straight line; the kerb between two roads is rounded where they meet
/// at an angle.
fn outline(corners: &[Point2d]) -> Vec<[Point2d; 4]> {
    let len = corners.len();
    let straight = |a: Point2d, b: Point2d| CubicBezier2d::line(a, b).points();
    corners
        .iter()
        .enumerate()
        .circular_tuple_windows()
        .map(|((i, a), (_, b))| {
            if i % 2 == 0 {
                return straight(*a, *b);
            }
            let v1 = right_normal(*a - corners[(i + len - 1) % len]);
            let v2 = right_normal(corners[(i + 2) % len] - *b);
            if is_colinear(v1, v2) {
                return straight(*a, *b);
            }
            Line2d::new(*a, v1)
                .intersection(&Line2d::new(*b, v2))
                .and_then(|middle| Bezier::quadratic(*a, middle, *b))
                .map(|curve| curve.control_points())
                .unwrap_or_else(|_| straight(*a, *b))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn outline_of_a_square() {
        let corners = [
            Point2d::new(10.0, -5.0),
            Point2d::new(10.0, 5.0),
            Point2d::new(5.0, 10.0),
            Point2d::new(-5.0, 10.0),
        ];
        let outline = outline(&corners);
        assert_eq!(outline.len(), 4);
        // Road mouths are straight
        assert_eq!(outline[0][0], corners[0]);
        assert_eq!(outline[0][3], corners[1]);
        // The kerb between the roads bends through the corner of the kerb lines
        assert_eq!(outline[1][0], corners[1]);
        assert_eq!(outline[1][3], corners[2]);
        let control = outline[1][1];
        assert_approx_eq!(control.x, 10.0 - 10.0 / 3.0);
        assert_approx_eq!(control.y, 5.0);
        // The closing piece wraps round to the first corner
        assert_eq!(outline[3][3], corners[0]);
    }
}
