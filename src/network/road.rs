use super::{LaneContainer, LaneDirection, LaneType, Network};
use crate::error::{Error, Result};
use crate::math::{Bezier, ParametricCurve2d, Point2d, Vector2d};
use crate::vehicle::VehicleKind;
use crate::{LaneId, LaneSet, RoadId, VehicleId, VehicleSet};
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The maximum speed of each kind of vehicle on a road, in m/s.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedTable {
    pub bus: f64,
    pub car: f64,
    pub motorcycle: f64,
    pub truck: f64,
    /// The maximum speed of any vehicle.
    pub vehicle: f64,
}

impl SpeedTable {
    /// Gets the maximum speed for a kind of vehicle.
    pub fn get(&self, kind: VehicleKind) -> f64 {
        match kind {
            VehicleKind::Bus => self.bus,
            VehicleKind::Car => self.car,
            VehicleKind::Motorcycle => self.motorcycle,
            VehicleKind::Truck => self.truck,
        }
    }

    /// Gets the maximum speed of any vehicle.
    pub fn maximum(&self) -> f64 {
        self.vehicle
    }
}

/// The cross section and markings of a road.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadData {
    /// The number of lanes running along the centre line.
    pub forward_lanes: usize,
    /// The number of lanes running against the centre line.
    pub backward_lanes: usize,
    /// Whether the outermost forward lane is a shoulder.
    pub forward_shoulder: bool,
    /// Whether the outermost backward lane is a shoulder.
    pub backward_shoulder: bool,
    /// The lane width in m.
    pub lane_width: f64,
    /// The length of a dash in m.
    pub dash_length: f64,
    /// The width of the lane markings in m.
    pub dash_width: f64,
    /// The nominal gap between dashes in m.
    pub gap_length: f64,
    /// The speed limits.
    pub speeds: SpeedTable,
}

/// The geometry of a lane, computed before it is added to the network.
pub(crate) struct LanePlan {
    pub direction: LaneDirection,
    pub lane_type: LaneType,
    pub index: usize,
    pub segments: Vec<Bezier>,
    pub edges: Vec<Bezier>,
    pub gaps: Option<Vec<f64>>,
    pub spawn_zone: f64,
}

/// A road, made up of a centre line and lanes on either side of it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Road {
    /// The road ID.
    id: RoadId,
    /// The centre line segments.
    segments: Vec<Bezier>,
    /// The cross section.
    data: RoadData,
    /// The forward lanes, from the centre outwards.
    forward: Vec<LaneId>,
    /// The backward lanes, from the centre outwards.
    backward: Vec<LaneId>,
    /// The container at the start of the centre line.
    previous: Option<LaneContainer>,
    /// The container at the end of the centre line.
    next: Option<LaneContainer>,
}

impl Road {
    /// Computes the lanes of a road with the given cross section and centre line.
    pub(crate) fn plan_lanes(data: &RoadData, segments: &[Bezier]) -> Result<Vec<LanePlan>> {
        if segments.is_empty() {
            return Err(Error::InvalidNetwork("road without segments".into()));
        }
        if !(data.lane_width > 0.0) {
            return Err(Error::InvalidNetwork("lane width must be positive".into()));
        }
        let sides = [
            (LaneDirection::Forward, data.forward_lanes, data.forward_shoulder),
            (LaneDirection::Backward, data.backward_lanes, data.backward_shoulder),
        ];

        let mut plans = vec![];
        for (direction, count, shoulder) in sides {
            let reverse = direction == LaneDirection::Backward;
            for index in 0..count {
                let lane_type = if shoulder && index == count - 1 {
                    LaneType::Shoulder
                } else {
                    LaneType::Normal
                };
                let translation = (index as f64 + 0.5) * data.lane_width;
                let offset = |distance: f64| -> Result<Vec<Bezier>> {
                    let mut curves = segments
                        .iter()
                        .map(|s| s.offset(distance, reverse))
                        .collect::<Result<Vec<_>>>()?;
                    if reverse {
                        curves.reverse();
                    }
                    Ok(curves)
                };
                let lane_segments = offset(translation)?;
                let edges = offset(translation + 0.5 * data.lane_width)?;
                let gaps = (index + 2 < count).then(|| {
                    edges
                        .iter()
                        .map(|edge| dash_gap(edge.length(), data.dash_length, data.gap_length))
                        .collect()
                });
                let spawn_zone = 2.0 * data.speeds.maximum() / lane_segments[0].length();
                plans.push(LanePlan {
                    direction,
                    lane_type,
                    index,
                    segments: lane_segments,
                    edges,
                    gaps,
                    spawn_zone,
                });
            }
        }
        Ok(plans)
    }

    pub(crate) fn new(id: RoadId, data: &RoadData, segments: Vec<Bezier>) -> Self {
        Self {
            id,
            segments,
            data: data.clone(),
            forward: vec![],
            backward: vec![],
            previous: None,
            next: None,
        }
    }

    /// Registers a lane. Lanes must be added from the centre outwards.
    pub(crate) fn add_lane(&mut self, direction: LaneDirection, lane: LaneId) {
        match direction {
            LaneDirection::Forward => self.forward.push(lane),
            LaneDirection::Backward => self.backward.push(lane),
        }
    }

    /// Gets the road ID.
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// Gets the centre line segments.
    pub fn segments(&self) -> &[Bezier] {
        &self.segments
    }

    /// Gets the cross section.
    pub fn data(&self) -> &RoadData {
        &self.data
    }

    /// Gets the speed limits.
    pub fn speeds(&self) -> &SpeedTable {
        &self.data.speeds
    }

    /// Gets the IDs of all the lanes, forward lanes first.
    pub fn lanes(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.forward.iter().chain(self.backward.iter()).copied()
    }

    /// Gets the lanes running in one direction, from the centre outwards.
    pub fn lanes_in(&self, direction: LaneDirection) -> &[LaneId] {
        match direction {
            LaneDirection::Forward => &self.forward,
            LaneDirection::Backward => &self.backward,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.forward.len() + self.backward.len()
    }

    /// Gets the total width of the road in m.
    pub fn width(&self) -> f64 {
        self.lane_count() as f64 * self.data.lane_width
    }

    /// Gets the length of the centre line in m.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    /// Gets the summed length of all lanes in m.
    pub fn lane_length(&self, lanes: &LaneSet) -> f64 {
        self.lanes().map(|id| lanes[id].length()).sum()
    }

    /// The container at the start of the centre line.
    pub fn previous(&self) -> Option<LaneContainer> {
        self.previous
    }

    /// The container at the end of the centre line.
    pub fn next(&self) -> Option<LaneContainer> {
        self.next
    }

    pub(crate) fn set_previous(&mut self, container: LaneContainer) {
        self.previous = Some(container);
    }

    pub(crate) fn set_next(&mut self, container: LaneContainer) {
        self.next = Some(container);
    }

    /// The container that lanes in the given direction lead into.
    pub fn container_after(&self, direction: LaneDirection) -> Option<LaneContainer> {
        match direction {
            LaneDirection::Forward => self.next,
            LaneDirection::Backward => self.previous,
        }
    }

    pub fn first_point(&self) -> Point2d {
        self.segments[0].first_point()
    }

    pub fn last_point(&self) -> Point2d {
        self.segments[self.segments.len() - 1].last_point()
    }

    pub fn first_direction(&self) -> Result<Vector2d> {
        self.segments[0].direction(0.0)
    }

    pub fn last_direction(&self) -> Result<Vector2d> {
        self.segments[self.segments.len() - 1].direction(1.0)
    }

    /// Checks whether the centre line runs toward the given point.
    pub fn is_toward(&self, point: Point2d) -> bool {
        self.first_point().distance(point) > self.last_point().distance(point)
    }

    /// The end of the road nearest to the given point.
    pub fn toward_point(&self, point: Point2d) -> Point2d {
        if self.is_toward(point) {
            self.last_point()
        } else {
            self.first_point()
        }
    }

    /// The end of the road furthest from the given point.
    pub fn offward_point(&self, point: Point2d) -> Point2d {
        if self.is_toward(point) {
            self.first_point()
        } else {
            self.last_point()
        }
    }

    /// The lanes heading toward the given point.
    pub fn toward_lanes(&self, point: Point2d) -> &[LaneId] {
        if self.is_toward(point) {
            &self.forward
        } else {
            &self.backward
        }
    }

    /// The lanes heading away from the given point.
    pub fn offward_lanes(&self, point: Point2d) -> &[LaneId] {
        if self.is_toward(point) {
            &self.backward
        } else {
            &self.forward
        }
    }

    /// The normal lanes at the map edge, where vehicles enter the network.
    pub fn spawn_lanes<'a>(&'a self, lanes: &'a LaneSet) -> impl Iterator<Item = LaneId> + 'a {
        let forward = self.previous.is_none().then_some(&self.forward);
        let backward = self.next.is_none().then_some(&self.backward);
        normal_lanes(forward, backward, lanes)
    }

    /// The normal lanes at the map edge, where vehicles leave the network.
    pub fn unspawn_lanes<'a>(&'a self, lanes: &'a LaneSet) -> impl Iterator<Item = LaneId> + 'a {
        let backward = self.previous.is_none().then_some(&self.backward);
        let forward = self.next.is_none().then_some(&self.forward);
        normal_lanes(forward, backward, lanes)
    }

    /// Iterates over the vehicles on all lanes of the road.
    pub fn vehicles<'a>(&'a self, lanes: &'a LaneSet) -> impl Iterator<Item = VehicleId> + 'a {
        self.lanes().flat_map(move |id| lanes[id].vehicles().iter().copied())
    }

    /// Counts the vehicles on the road.
    pub fn vehicle_count(&self, lanes: &LaneSet) -> usize {
        self.lanes().map(|id| lanes[id].vehicles().len()).sum()
    }

    /// Counts the vehicles within `length` m of the end of the lanes heading toward the point.
    pub fn vehicles_at_end_toward(
        &self,
        lanes: &LaneSet,
        vehicles: &VehicleSet,
        point: Point2d,
        length: f64,
    ) -> usize {
        self.toward_lanes(point)
            .iter()
            .map(|id| lanes[*id].vehicles_at_end(vehicles, length))
            .sum()
    }

    /// The index of the lane nearest the given point among the lanes running in `direction`.
    pub(crate) fn nearest_lane_index(&self, lanes: &LaneSet, direction: LaneDirection, point: Point2d) -> usize {
        self.lanes_in(direction)
            .iter()
            .map(|id| &lanes[*id])
            .min_by(|a, b| {
                a.last_point()
                    .distance(point)
                    .total_cmp(&b.last_point().distance(point))
            })
            .map(|lane| lane.index())
            .unwrap_or(0)
    }

    /// The index of the lane to be in, among those running in `direction`, to head toward `point`.
    ///
    /// The crossing at the end of the lanes is asked first. Without one, or when it has no
    /// route toward the point, the lane ending nearest the point is taken.
    pub fn lane_index_to(&self, network: &Network, direction: LaneDirection, point: Point2d) -> usize {
        let via_crossing = match self.container_after(direction) {
            Some(LaneContainer::Crossing(id)) => network.crossing(id).lane_index_to(network, self.id, point),
            _ => None,
        };
        via_crossing.unwrap_or_else(|| self.nearest_lane_index(network.lanes(), direction, point))
    }
}

fn normal_lanes<'a>(
    forward: Option<&'a Vec<LaneId>>,
    backward: Option<&'a Vec<LaneId>>,
    lanes: &'a LaneSet,
) -> impl Iterator<Item = LaneId> + 'a {
    forward
        .into_iter()
        .chain(backward)
        .flatten()
        .copied()
        .filter(move |id| lanes[*id].lane_type() == LaneType::Normal)
}

/// The gap between dashes that fits a whole number of dashes onto an edge.
fn dash_gap(length: f64, dash_length: f64, gap_length: f64) -> f64 {
    let count = (length / (dash_length + gap_length)).round().max(1.0);
    ((length - count * dash_length) / count).max(0.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn data(forward: usize, backward: usize) -> RoadData {
        RoadData {
            forward_lanes: forward,
            backward_lanes: backward,
            forward_shoulder: true,
            backward_shoulder: false,
            lane_width: 3.5,
            dash_length: 3.0,
            dash_width: 0.15,
            gap_length: 9.0,
            speeds: SpeedTable {
                bus: 20.0,
                car: 30.0,
                motorcycle: 30.0,
                truck: 20.0,
                vehicle: 30.0,
            },
        }
    }

    #[test]
    fn lanes_are_offset_from_the_centre_line() {
        let centre = Bezier::linear(Point2d::new(0.0, 0.0), Point2d::new(1000.0, 0.0)).unwrap();
        let plans = Road::plan_lanes(&data(3, 2), &[centre]).unwrap();
        assert_eq!(plans.len(), 5);

        let ys: Vec<_> = plans.iter().map(|p| p.segments[0].first_point().y).collect();
        assert_approx_eq!(ys[0], 1.75);
        assert_approx_eq!(ys[1], 5.25);
        assert_approx_eq!(ys[2], 8.75);
        assert_approx_eq!(ys[3], -1.75);
        assert_approx_eq!(ys[4], -5.25);

        // Backward lanes run the other way
        assert_approx_eq!(plans[3].segments[0].first_point().x, 1000.0);
        assert_approx_eq!(plans[0].edges[0].first_point().y, 3.5);

        assert_eq!(plans[2].lane_type, LaneType::Shoulder);
        assert_eq!(plans[4].lane_type, LaneType::Normal);
        assert!(plans[0].gaps.is_some());
        assert!(plans[1].gaps.is_none());
        assert_approx_eq!(plans[0].spawn_zone, 0.06);
    }

    #[test]
    fn backward_segments_are_reversed() {
        let segments = vec![
            Bezier::linear(Point2d::new(0.0, 0.0), Point2d::new(100.0, 0.0)).unwrap(),
            Bezier::linear(Point2d::new(100.0, 0.0), Point2d::new(100.0, 100.0)).unwrap(),
        ];
        let plans = Road::plan_lanes(&data(1, 1), &segments).unwrap();
        let backward = &plans[1];
        assert_eq!(backward.direction, LaneDirection::Backward);
        assert_approx_eq!(backward.segments[0].first_point().y, 100.0);
        assert_approx_eq!(backward.segments[1].last_point().x, 0.0);
    }

    #[test]
    fn dash_gaps_fit_the_edge() {
        assert_approx_eq!(dash_gap(120.0, 3.0, 9.0), 9.0);
        assert_approx_eq!(dash_gap(125.0, 3.0, 9.0), 9.5);
        assert_approx_eq!(dash_gap(2.0, 3.0, 9.0), 0.0);
    }

    #[test]
    fn empty_roads_are_rejected() {
        assert!(Road::plan_lanes(&data(1, 1), &[]).is_err());
    }
}
