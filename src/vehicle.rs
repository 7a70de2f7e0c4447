use crate::connection::Connection;
use crate::error::Result;
use crate::math::{ParametricCurve2d, Point2d, Vector2d};
use crate::network::{Lane, LaneKind, Network};
use crate::render::Colour;
use crate::util::Interval;
use crate::{LaneId, LaneSet, VehicleId, VehicleSet};
use driving::{Driver, Outlook};
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use driving::DrivingState;
pub use model::{VehicleKind, VehicleModel};

mod driving;
mod model;

/// A vehicle must be this much faster than one it pulls in front of.
const OVERTAKE_MARGIN: f64 = 0.98;

/// A simulated vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// The production serial number.
    serial: u64,
    /// The make and performance of the vehicle.
    model: VehicleModel,
    colour: Colour,
    /// The lane the vehicle is on, or changing into.
    lane: LaneId,
    /// The index of the lane segment the vehicle is on.
    segment: usize,
    /// The position of the vehicle's centre along the segment, from 0 to 1.
    time: f64,
    /// The length of the current segment in m.
    segment_length: f64,
    /// The speed in m/s.
    speed: f64,
    /// The desired speed in m/s.
    target_speed: f64,
    /// The factor applied to the speed limit to get the desired speed.
    speed_factor: f64,
    /// The index of the lane the vehicle wants to be in.
    target_lane: usize,
    /// The lane the vehicle is heading for.
    destination: LaneId,
    /// The lane change in progress.
    connection: Option<Connection>,
    /// The rule that last decided the speed.
    state: DrivingState,
    /// The distance driven in m.
    distance: f64,
    /// The time spent in the network in s.
    total_time: f64,
    /// The time spent moving in s.
    moving_time: f64,
}

/// The outcome of advancing a vehicle by one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleStep {
    /// The distance travelled in m.
    pub distance: f64,
    /// Whether the vehicle left the network.
    pub remove: bool,
    /// Whether the vehicle left the network through its destination lane.
    pub destination_reached: bool,
    /// The lanes the vehicle left and entered, if it moved onto another lane.
    pub handoff: Option<(LaneId, LaneId)>,
}

/// Where and how a new vehicle enters the network.
#[derive(Clone, Debug)]
pub struct VehicleSpawn {
    /// The lane to place the vehicle on.
    pub lane: LaneId,
    /// The lane the vehicle is heading for.
    pub destination: LaneId,
    pub model: VehicleModel,
    /// The factor applied to the speed limit to get the desired speed.
    pub speed_factor: f64,
    /// The segment and time to place the vehicle at.
    pub segment: usize,
    pub time: f64,
}

impl Vehicle {
    /// Creates a vehicle on the spawn lane, already moving at its desired speed.
    pub(crate) fn new(id: VehicleId, serial: u64, colour: Colour, spawn: VehicleSpawn, network: &Network) -> Self {
        let lane = network.lane(spawn.lane);
        let segment = spawn.segment.min(lane.last_segment());
        let mut vehicle = Self {
            id,
            serial,
            model: spawn.model,
            colour,
            lane: spawn.lane,
            segment,
            time: spawn.time,
            segment_length: lane.segment(segment).length(),
            speed: 0.0,
            target_speed: 0.0,
            speed_factor: spawn.speed_factor,
            target_lane: lane.index(),
            destination: spawn.destination,
            connection: None,
            state: DrivingState::Free,
            distance: 0.0,
            total_time: 0.0,
            moving_time: 0.0,
        };
        vehicle.retarget(network);
        vehicle.speed = vehicle.target_speed;
        vehicle
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Gets the production serial number.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn model(&self) -> &VehicleModel {
        &self.model
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    /// Gets the lane the vehicle is on, or changing into.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn segment(&self) -> usize {
        self.segment
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gets the speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Gets the desired speed in m/s.
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Gets the index of the lane the vehicle wants to be in.
    pub fn target_lane(&self) -> usize {
        self.target_lane
    }

    pub fn destination(&self) -> LaneId {
        self.destination
    }

    /// Gets the lane change in progress.
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn state(&self) -> DrivingState {
        self.state
    }

    /// Gets the distance driven in m.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Gets the time spent in the network in s.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Gets the time spent moving in s.
    pub fn moving_time(&self) -> f64 {
        self.moving_time
    }

    /// The position of the vehicle's centre as segment index plus time.
    pub fn time_index(&self) -> f64 {
        self.segment as f64 + self.time
    }

    /// The vehicle's length expressed in segment time.
    fn half_length_time(&self) -> f64 {
        0.5 * self.model.length / self.segment_length
    }

    fn front_time(&self) -> f64 {
        self.time + self.half_length_time()
    }

    fn back_time(&self) -> f64 {
        self.time - self.half_length_time()
    }

    /// The time index of the front of the vehicle.
    pub fn front_time_index(&self) -> f64 {
        self.segment as f64 + self.front_time()
    }

    /// The time index of the back of the vehicle.
    pub fn back_time_index(&self) -> f64 {
        self.segment as f64 + self.back_time()
    }

    /// The position and heading of the vehicle's centre.
    pub fn position(&self, lanes: &LaneSet) -> (Point2d, Vector2d) {
        match &self.connection {
            Some(connection) => (connection.position(), connection.velocity()),
            None => {
                let segment = lanes[self.lane].segment(self.segment);
                let time = self.time.clamp(0.0, 1.0);
                (segment.sample(time), segment.sample_dt(time))
            }
        }
    }

    /// Recomputes the lane and speed the vehicle aims for after entering a lane.
    pub(crate) fn retarget(&mut self, network: &Network) {
        let lane = network.lane(self.lane);
        match lane.kind() {
            LaneKind::Road(road_lane) => {
                let road = network.road(road_lane.road);
                let point = network.lane(self.destination).last_point();
                self.target_lane = road.lane_index_to(network, lane.direction(), point);
                let limit = self.speed_factor * road.speeds().get(self.model.kind);
                self.target_speed = limit.min(self.model.top_speed);
            }
            LaneKind::Crossing(_) => {
                self.target_lane = lane.index();
            }
        }
    }

    /// Finds the vehicle ahead on `lane`, looking into the next lanes at the end of it.
    fn leader<'a>(&self, lane: &Lane, lanes: &LaneSet, vehicles: &'a VehicleSet) -> Option<&'a Vehicle> {
        let ids = lane.vehicles();
        let ahead = match ids.iter().position(|id| *id == self.id) {
            Some(idx) => ids.get(idx + 1),
            None => {
                let time_index = self.time_index();
                ids.iter().find(|id| vehicles[**id].time_index() > time_index)
            }
        };
        if let Some(id) = ahead {
            return Some(&vehicles[*id]);
        }
        lane.next()
            .iter()
            .filter_map(|id| lanes[*id].vehicles().first())
            .map(|id| &vehicles[*id])
            .min_by(|a, b| a.time_index().total_cmp(&b.time_index()))
    }

    /// The gap in m between the vehicle's front and the back of `leader`.
    ///
    /// Only leaders on the same segment or the next one are considered; further
    /// leaders are too far away to matter.
    fn gap_to(&self, leader: &Vehicle, lane: &Lane) -> Option<f64> {
        let next_segment = || leader.back_time() * leader.segment_length + (1.0 - self.front_time()) * self.segment_length;
        if leader.lane == lane.id() {
            if leader.segment == self.segment {
                Some((leader.back_time() - self.front_time()) * self.segment_length)
            } else if leader.segment == self.segment + 1 {
                Some(next_segment())
            } else {
                None
            }
        } else if self.segment == lane.last_segment() && leader.segment == 0 {
            Some(next_segment())
        } else {
            None
        }
    }

    /// Looks down `lane` for its light and the vehicle ahead.
    fn outlook(&self, lane: &Lane, network: &Network, vehicles: &VehicleSet) -> Outlook {
        let light = lane.light().map(|id| {
            let distance = lane.distance_to_end(self.segment, self.front_time());
            (network.light(id).state(), distance)
        });
        let leader = self
            .leader(lane, network.lanes(), vehicles)
            .and_then(|leader| self.gap_to(leader, lane).map(|gap| (gap, leader.speed)));
        Outlook { light, leader }
    }

    /// Computes the change in speed over a step of `seconds` and the rule that decided it.
    ///
    /// During the first half of a lane change the vehicle respects both lanes.
    pub(crate) fn speed_change(&self, seconds: f64, network: &Network, vehicles: &VehicleSet) -> (f64, DrivingState) {
        let driver = Driver {
            speed: self.speed,
            target_speed: self.target_speed,
            acceleration: self.model.acceleration,
            deceleration: self.model.deceleration,
        };
        let lane = network.lane(self.lane);
        let (change, state) = driver.speed_change(seconds, &self.outlook(lane, network, vehicles));
        match &self.connection {
            Some(connection) if connection.time() < 0.5 => {
                let start = network.lane(connection.start_lane());
                let (start_change, _) = driver.speed_change(seconds, &self.outlook(start, network, vehicles));
                (change.min(start_change), DrivingState::LaneChanging)
            }
            Some(_) => (change, DrivingState::LaneChanging),
            None => (change, state),
        }
    }

    /// Applies a change in speed. The speed never goes negative.
    pub(crate) fn apply_speed_change(&mut self, change: f64, state: DrivingState) {
        self.speed = (self.speed + change).max(0.0);
        self.state = state;
    }

    /// Decides whether to start moving one lane toward the target lane.
    ///
    /// Every vehicle overlapping a window around this one on the neighbouring lane must
    /// either be behind and slower, or ahead and faster.
    pub(crate) fn plan_lane_change(&self, network: &Network, vehicles: &VehicleSet) -> Result<Option<Connection>> {
        let lane = network.lane(self.lane);
        let road_lane = match lane.kind() {
            LaneKind::Road(road_lane) => road_lane,
            LaneKind::Crossing(_) => return Ok(None),
        };
        if self.connection.is_some() || self.speed <= 0.0 || self.target_lane == lane.index() {
            return Ok(None);
        }
        let candidate = if self.target_lane < lane.index() {
            road_lane.left
        } else {
            road_lane.right
        };
        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let road = network.road(road_lane.road);
        let window = 0.5 * road.speeds().maximum() / self.segment_length;
        let (back, front) = (self.back_time_index(), self.front_time_index());
        let zone = Interval::new(back - window, front + window);
        let safe = network.lane(candidate).vehicles().iter().all(|id| {
            let other = &vehicles[*id];
            let extent = Interval::new(other.back_time_index(), other.front_time_index());
            if other.id == self.id || !extent.overlaps(&zone) {
                return true;
            }
            let behind = extent.max < back && OVERTAKE_MARGIN * self.speed > other.speed;
            let ahead = extent.min > front && self.speed < OVERTAKE_MARGIN * other.speed;
            behind || ahead
        });
        if !safe {
            return Ok(None);
        }

        Connection::plan(lane, network.lane(candidate), self.segment, self.time, self.speed)
    }

    /// Starts a planned lane change. The vehicle now belongs to the end lane.
    pub(crate) fn begin_lane_change(&mut self, connection: Connection, network: &Network) {
        let end = network.lane(connection.end_lane());
        self.lane = end.id();
        self.segment = connection.end_segment();
        self.segment_length = end.segment(self.segment).length();
        self.time = connection.time_index() - self.segment as f64;
        self.connection = Some(connection);
    }

    /// Moves the vehicle along its lane at its current speed for `seconds`.
    ///
    /// The vehicle moves onto at most one new lane per step. It is flagged for removal
    /// when it reaches the end of a lane without successors.
    pub(crate) fn advance<R: Rng + ?Sized>(&mut self, seconds: f64, network: &Network, rng: &mut R) -> VehicleStep {
        let distance = self.speed * seconds;
        self.distance += distance;
        self.total_time += seconds;
        if self.speed > 0.0 {
            self.moving_time += seconds;
        }
        let mut step = VehicleStep {
            distance,
            ..Default::default()
        };

        match &mut self.connection {
            Some(connection) => match connection.advance(distance) {
                None => {
                    self.time = connection.time_index() - self.segment as f64;
                    return step;
                }
                Some(leftover) => {
                    self.segment = connection.end_segment();
                    self.time = connection.end_time() + leftover / self.segment_length;
                    self.connection = None;
                }
            },
            None => self.time += distance / self.segment_length,
        }

        let mut lane = network.lane(self.lane);
        while self.time > 1.0 {
            let leftover = (self.time - 1.0) * self.segment_length;
            if self.segment < lane.last_segment() {
                self.segment += 1;
            } else if step.handoff.is_some() {
                self.time = 1.0;
                break;
            } else {
                match self.choose_next_lane(network, rng) {
                    Some(next) => {
                        step.handoff = Some((self.lane, next));
                        self.lane = next;
                        self.segment = 0;
                        lane = network.lane(next);
                    }
                    None => {
                        step.remove = true;
                        step.destination_reached = self.lane == self.destination;
                        return step;
                    }
                }
            }
            self.segment_length = lane.segment(self.segment).length();
            self.time = leftover / self.segment_length;
        }

        if step.handoff.is_some() {
            self.retarget(network);
        }
        step
    }

    /// Picks the lane to move onto at the end of the current one.
    ///
    /// Approaching a crossing, a connector onto the road toward the destination is
    /// preferred, ideally one leading to the lane to be in on that road. Otherwise the
    /// next lane is chosen at random.
    fn choose_next_lane<R: Rng + ?Sized>(&self, network: &Network, rng: &mut R) -> Option<LaneId> {
        let lane = network.lane(self.lane);
        if lane.next().is_empty() {
            return None;
        }
        if let (Some(crossing), Some(road)) = (network.lane_end_crossing(self.lane), lane.road()) {
            let point = network.lane(self.destination).last_point();
            if let Some(exit) = crossing.road_to(network, road, point) {
                let exit_road = network.road(exit);
                let connectors: Vec<_> = lane
                    .next()
                    .iter()
                    .map(|id| network.lane(*id))
                    .filter(|connector| {
                        connector.next().first().and_then(|id| network.lane(*id).road()) == Some(exit)
                    })
                    .collect();
                let preferred = connectors.iter().find(|connector| {
                    connector.next().first().map_or(false, |id| {
                        let next = network.lane(*id);
                        next.index() == exit_road.lane_index_to(network, next.direction(), point)
                    })
                });
                if let Some(connector) = preferred.or_else(|| connectors.choose(rng)) {
                    return Some(connector.id());
                }
            }
        }
        lane.next().choose(rng).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Bezier;
    use crate::network::{LaneDirection, RoadData, SpeedTable};
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn road(network: &mut Network, segments: &[(f64, f64)]) -> Vec<LaneId> {
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
        let segments = segments
            .windows(2)
            .map(|w| Bezier::linear(Point2d::new(w[0].0, w[0].1), Point2d::new(w[1].0, w[1].1)).unwrap())
            .collect();
        let road = network.add_road(&data, segments).unwrap();
        network.road(road).lanes_in(LaneDirection::Forward).to_vec()
    }

    fn car() -> VehicleModel {
        VehicleModel::new("Test", VehicleKind::Car, (1.8, 4.0), 50.0, 3.0, 6.0)
    }

    fn spawn(network: &Network, vehicles: &mut VehicleSet, lane: LaneId, time: f64) -> VehicleId {
        let spawn = VehicleSpawn {
            lane,
            destination: lane,
            model: car(),
            speed_factor: 1.0,
            segment: 0,
            time,
        };
        vehicles.insert_with_key(|id| Vehicle::new(id, 1, Colour::WHITE, spawn, network))
    }

    #[test]
    fn spawned_vehicles_drive_at_the_limit() {
        let mut network = Network::new();
        let lanes = road(&mut network, &[(0.0, 0.0), (1000.0, 0.0)]);
        let mut vehicles = VehicleSet::with_key();
        let id = spawn(&network, &mut vehicles, lanes[0], 0.0);
        let vehicle = &vehicles[id];
        assert_approx_eq!(vehicle.speed(), 20.0);
        assert_eq!(vehicle.target_lane(), 0);
        assert_approx_eq!(vehicle.front_time_index() - vehicle.back_time_index(), 4.0 / 1000.0);
    }

    #[test]
    fn time_carries_across_segments() {
        let mut network = Network::new();
        let lanes = road(&mut network, &[(0.0, 0.0), (100.0, 0.0), (300.0, 0.0)]);
        let mut vehicles = VehicleSet::with_key();
        let id = spawn(&network, &mut vehicles, lanes[0], 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let step = vehicles[id].advance(5.0, &network, &mut rng);
        assert_approx_eq!(step.distance, 100.0);
        assert!(!step.remove);
        assert_eq!(vehicles[id].segment(), 1);
        assert_approx_eq!(vehicles[id].time(), 0.25);

        let step = vehicles[id].advance(10.0, &network, &mut rng);
        assert!(step.remove);
        assert!(step.destination_reached);
    }

    #[test]
    fn leader_gap_is_measured_bumper_to_bumper() {
        let mut network = Network::new();
        let lanes = road(&mut network, &[(0.0, 0.0), (1000.0, 0.0)]);
        let mut vehicles = VehicleSet::with_key();
        let back = spawn(&network, &mut vehicles, lanes[0], 0.1);
        let front = spawn(&network, &mut vehicles, lanes[0], 0.12);
        network.insert_vehicle(lanes[0], &vehicles, front);
        network.insert_vehicle(lanes[0], &vehicles, back);
        assert_eq!(network.lane(lanes[0]).vehicles(), &[back, front]);

        let outlook = vehicles[back].outlook(network.lane(lanes[0]), &network, &vehicles);
        let (gap, speed) = outlook.leader.unwrap();
        assert_approx_eq!(gap, 16.0);
        assert_approx_eq!(speed, 20.0);
        assert!(vehicles[front].outlook(network.lane(lanes[0]), &network, &vehicles).leader.is_none());

        // Closing in at the same speed, the follower brakes
        let (change, state) = vehicles[back].speed_change(0.1, &network, &vehicles);
        assert_eq!(state, DrivingState::Following);
        assert!(change < 0.0);
    }

    #[test]
    fn lane_changes_wait_for_a_gap() {
        let mut network = Network::new();
        let lanes = road(&mut network, &[(0.0, 0.0), (2000.0, 0.0)]);
        let mut vehicles = VehicleSet::with_key();
        let changer = spawn(&network, &mut vehicles, lanes[0], 0.1);
        network.insert_vehicle(lanes[0], &vehicles, changer);
        vehicles[changer].target_lane = 1;

        // A vehicle alongside at the same speed blocks the change
        let blocker = spawn(&network, &mut vehicles, lanes[1], 0.1);
        network.insert_vehicle(lanes[1], &vehicles, blocker);
        assert!(vehicles[changer].plan_lane_change(&network, &vehicles).unwrap().is_none());

        // Once it is gone the change goes ahead
        network.remove_vehicle(lanes[1], blocker);
        let connection = vehicles[changer]
            .plan_lane_change(&network, &vehicles)
            .unwrap()
            .unwrap();
        assert_eq!(connection.start_lane(), lanes[0]);
        assert_eq!(connection.end_lane(), lanes[1]);

        vehicles[changer].begin_lane_change(connection, &network);
        let vehicle = &vehicles[changer];
        assert_eq!(vehicle.lane(), lanes[1]);
        assert_approx_eq!(vehicle.time_index(), 0.1);
        assert_eq!(vehicle.state(), DrivingState::Free);

        // Two seconds later the vehicle has settled on the new lane
        let mut rng = StdRng::seed_from_u64(1);
        let mut moved = 0.0;
        for _ in 0..25 {
            moved += vehicles[changer].advance(0.1, &network, &mut rng).distance;
        }
        let vehicle = &vehicles[changer];
        assert!(vehicle.connection().is_none());
        assert_eq!(vehicle.lane(), lanes[1]);
        assert!(vehicle.time_index() > 0.1 + 40.0 / 2000.0);
        assert!(vehicle.time_index() < 0.1 + moved / 2000.0 + 1e-9);
    }
}
