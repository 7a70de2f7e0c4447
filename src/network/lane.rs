use super::crossing::ConnectorPlan;
use crate::math::{Bezier, ParametricCurve2d, Point2d, Vector2d};
use crate::{CrossingId, LaneId, RoadId, TrafficLightId, VehicleId, VehicleSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The direction of a lane relative to its road's centre line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneDirection {
    Forward,
    Backward,
}

/// Whether a lane carries traffic or is a hard shoulder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneType {
    Normal,
    Shoulder,
}

/// The road or crossing that owns a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneContainer {
    Road(RoadId),
    Crossing(CrossingId),
}

/// The attributes of a lane that belongs to a road.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadLane {
    /// The road the lane belongs to.
    pub road: RoadId,
    /// The neighbouring lane to the left, in the same direction.
    pub left: Option<LaneId>,
    /// The neighbouring lane to the right, in the same direction.
    pub right: Option<LaneId>,
    /// The traffic light at the end of the lane.
    pub light: Option<TrafficLightId>,
    /// No vehicle may spawn while another vehicle's back is within this
    /// time index of the start of the lane.
    pub spawn_zone: f64,
    /// The lane's right hand marking, one curve per segment.
    pub edges: Vec<Bezier>,
    /// The gap between dashes on each edge, in m, if the marking is dashed.
    pub gaps: Option<Vec<f64>>,
}

/// The attributes of a lane that crosses an intersection.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossingLane {
    /// The crossing the lane belongs to.
    pub crossing: CrossingId,
}

/// The kind of a lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneKind {
    Road(RoadLane),
    Crossing(CrossingLane),
}

/// A single lane of traffic, made up of one or more curve segments.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// Road or crossing specific attributes.
    kind: LaneKind,
    /// The direction of travel relative to the owning road.
    direction: LaneDirection,
    /// Whether the lane is a shoulder.
    lane_type: LaneType,
    /// The index of the lane, counted from the centre of the road outwards.
    index: usize,
    /// The lane width in m.
    width: f64,
    /// The curve segments in the direction of travel.
    segments: Vec<Bezier>,
    /// The total length in m.
    length: f64,
    /// The vehicles on the lane, sorted by ascending time index.
    vehicles: Vec<VehicleId>,
    /// The lanes that succeed this one.
    next: SmallVec<[LaneId; 4]>,
    /// The lanes that precede this one.
    previous: SmallVec<[LaneId; 4]>,
}

impl Lane {
    /// Creates a lane belonging to a road.
    pub(crate) fn new_road_lane(
        id: LaneId,
        road: RoadLane,
        direction: LaneDirection,
        lane_type: LaneType,
        index: usize,
        width: f64,
        segments: Vec<Bezier>,
    ) -> Self {
        Self::new(id, LaneKind::Road(road), direction, lane_type, index, width, segments)
    }

    /// Creates a lane across a crossing from a connector plan.
    /// Its index is the index of the lane it leads to.
    pub(crate) fn crossing_lane(id: LaneId, crossing: CrossingId, plan: &ConnectorPlan) -> Self {
        let mut lane = Self::new(
            id,
            LaneKind::Crossing(CrossingLane { crossing }),
            plan.direction,
            LaneType::Normal,
            plan.index,
            plan.width,
            vec![plan.segment],
        );
        lane.previous.push(plan.source);
        lane.next.push(plan.target);
        lane
    }

    fn new(
        id: LaneId,
        kind: LaneKind,
        direction: LaneDirection,
        lane_type: LaneType,
        index: usize,
        width: f64,
        segments: Vec<Bezier>,
    ) -> Self {
        debug_assert!(!segments.is_empty(), "lane without segments");
        Self {
            id,
            kind,
            direction,
            lane_type,
            index,
            width,
            length: segments.iter().map(|s| s.length()).sum(),
            segments,
            vehicles: vec![],
            next: SmallVec::new(),
            previous: SmallVec::new(),
        }
    }

    /// Gets the lane ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the road or crossing specific attributes.
    pub fn kind(&self) -> &LaneKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut LaneKind {
        &mut self.kind
    }

    /// Gets the road lane attributes, if this lane belongs to a road.
    pub fn road_lane(&self) -> Option<&RoadLane> {
        match &self.kind {
            LaneKind::Road(road_lane) => Some(road_lane),
            LaneKind::Crossing(_) => None,
        }
    }

    /// Gets the road or crossing the lane belongs to.
    pub fn container(&self) -> LaneContainer {
        match &self.kind {
            LaneKind::Road(lane) => LaneContainer::Road(lane.road),
            LaneKind::Crossing(lane) => LaneContainer::Crossing(lane.crossing),
        }
    }

    /// Gets the road the lane belongs to, if any.
    pub fn road(&self) -> Option<RoadId> {
        self.road_lane().map(|lane| lane.road)
    }

    /// Gets the traffic light at the end of the lane, if any.
    pub fn light(&self) -> Option<TrafficLightId> {
        self.road_lane().and_then(|lane| lane.light)
    }

    pub fn direction(&self) -> LaneDirection {
        self.direction
    }

    pub fn lane_type(&self) -> LaneType {
        self.lane_type
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets the lane width in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Gets the curve segments of the lane.
    pub fn segments(&self) -> &[Bezier] {
        &self.segments
    }

    /// Gets a single curve segment. Out of range indices give the last segment.
    pub fn segment(&self, index: usize) -> &Bezier {
        &self.segments[index.min(self.segments.len() - 1)]
    }

    /// The index of the final segment.
    pub fn last_segment(&self) -> usize {
        self.segments.len() - 1
    }

    /// Gets the IDs of the vehicles on the lane, in ascending time index order.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Gets the lanes that succeed this one.
    pub fn next(&self) -> &[LaneId] {
        &self.next
    }

    /// Gets the lanes that precede this one.
    pub fn previous(&self) -> &[LaneId] {
        &self.previous
    }

    pub fn first_point(&self) -> Point2d {
        self.segments[0].first_point()
    }

    pub fn last_point(&self) -> Point2d {
        self.segments[self.segments.len() - 1].last_point()
    }

    /// The velocity of the lane curve at its start.
    pub fn first_velocity(&self) -> Vector2d {
        self.segments[0].sample_dt(0.0)
    }

    /// The velocity of the lane curve at its end.
    pub fn last_velocity(&self) -> Vector2d {
        self.segments[self.segments.len() - 1].sample_dt(1.0)
    }

    /// The length in m from a position on the lane to its end.
    pub fn distance_to_end(&self, segment: usize, time: f64) -> f64 {
        let segment = segment.min(self.last_segment());
        let rest: f64 = self.segments[segment + 1..].iter().map(|s| s.length()).sum();
        (1.0 - time) * self.segments[segment].length() + rest
    }

    /// The time index a given distance before the end of the lane.
    pub(crate) fn time_index_before_end(&self, mut length: f64) -> f64 {
        let mut time_index = self.segments.len() as f64;
        for segment in self.segments.iter().rev() {
            if length <= 0.0 {
                break;
            }
            if length < segment.length() {
                time_index -= length / segment.length();
                length = 0.0;
            } else {
                time_index -= 1.0;
                length -= segment.length();
            }
        }
        time_index
    }

    /// Checks whether a new vehicle can be placed at the start of the lane.
    pub fn can_spawn(&self, vehicles: &VehicleSet) -> bool {
        let zone = match &self.kind {
            LaneKind::Road(lane) => lane.spawn_zone,
            LaneKind::Crossing(_) => return false,
        };
        !self
            .vehicles
            .iter()
            .any(|id| vehicles[*id].back_time_index() < zone)
    }

    /// Counts the vehicles whose centre is within `length` m of the end of the lane.
    pub fn vehicles_at_end(&self, vehicles: &VehicleSet, length: f64) -> usize {
        let min = self.time_index_before_end(length);
        self.vehicles
            .iter()
            .filter(|id| vehicles[**id].time_index() > min)
            .count()
    }

    /// Adds a successor lane.
    pub(crate) fn add_next(&mut self, lane: LaneId) {
        self.next.push(lane);
    }

    /// Adds a predecessor lane.
    pub(crate) fn add_previous(&mut self, lane: LaneId) {
        self.previous.push(lane);
    }

    /// Inserts the vehicle with the given ID into the lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        if self.vehicles.contains(&id) {
            return;
        }
        let time_index = vehicles[id].time_index();
        let idx = self
            .vehicles
            .iter()
            .position(|v| vehicles[*v].time_index() > time_index)
            .unwrap_or(self.vehicles.len());
        self.vehicles.insert(idx, id);
    }

    /// Removes the vehicle with the given ID from the lane.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(idx) = self.vehicles.iter().rposition(|v| *v == id) {
            self.vehicles.remove(idx);
        }
    }

    /// Restores the time index ordering of the vehicles after they have moved.
    pub(crate) fn sort_vehicles(&mut self, vehicles: &VehicleSet) {
        self.vehicles
            .sort_by(|a, b| vehicles[*a].time_index().total_cmp(&vehicles[*b].time_index()));
    }

    /// Removes all vehicles from the lane.
    pub(crate) fn clear_vehicles(&mut self) {
        self.vehicles.clear();
    }
}
