//! The road network: roads, their lanes, the crossings joining them and buildings.

use crate::error::{Error, Result};
use crate::light::{LightState, TrafficLight, TrafficLightSystem};
use crate::math::{Bezier, Point2d};
use crate::render::Colour;
use crate::util::Interval;
use crate::{CrossingId, LaneId, LaneSet, RoadId, TrafficLightId, VehicleId, VehicleSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

pub use crossing::{Crossing, CrossingData, RoadConnection, RoadLaneIndex};
pub use lane::{CrossingLane, Lane, LaneContainer, LaneDirection, LaneKind, LaneType, RoadLane};
pub use road::{Road, RoadData, SpeedTable};

mod crossing;
mod lane;
mod road;

/// Vehicles within this distance of the end of a lane queue at its traffic light, in m.
const QUEUE_LENGTH: f64 = 200.0;

/// A coloured polygon drawn beneath the roads.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Building {
    pub colour: Colour,
    pub points: Vec<Point2d>,
}

/// The arena holding every static part of a simulation.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Network {
    roads: SlotMap<RoadId, Road>,
    lanes: LaneSet,
    crossings: SlotMap<CrossingId, Crossing>,
    lights: SlotMap<TrafficLightId, TrafficLight>,
    buildings: Vec<Building>,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a road along the given centre line, creating its lanes.
    ///
    /// Nothing is added if any lane cannot be built.
    pub fn add_road(&mut self, data: &RoadData, segments: Vec<Bezier>) -> Result<RoadId> {
        let plans = Road::plan_lanes(data, &segments)?;
        let road_id = self
            .roads
            .insert_with_key(|id| Road::new(id, data, segments));

        for plan in plans {
            let road_lane = RoadLane {
                road: road_id,
                left: None,
                right: None,
                light: None,
                spawn_zone: plan.spawn_zone,
                edges: plan.edges,
                gaps: plan.gaps,
            };
            let lane = self.lanes.insert_with_key(|id| {
                Lane::new_road_lane(
                    id,
                    road_lane,
                    plan.direction,
                    plan.lane_type,
                    plan.index,
                    data.lane_width,
                    plan.segments,
                )
            });
            self.roads[road_id].add_lane(plan.direction, lane);
        }

        // Link neighbours, counting outwards from the centre line
        for direction in [LaneDirection::Forward, LaneDirection::Backward] {
            let ids = self.roads[road_id].lanes_in(direction).to_vec();
            for pair in ids.windows(2) {
                let (inner, outer) = (pair[0], pair[1]);
                if self.lanes[outer].lane_type() == LaneType::Shoulder {
                    continue;
                }
                if let LaneKind::Road(lane) = self.lanes[inner].kind_mut() {
                    lane.right = Some(outer);
                }
                if let LaneKind::Road(lane) = self.lanes[outer].kind_mut() {
                    lane.left = Some(inner);
                }
            }
        }

        Ok(road_id)
    }

    /// Adds a crossing joining the ends of the given roads.
    ///
    /// A connector lane and, for every normal lane entering the crossing, a traffic light
    /// are created from the connection tables. Nothing is added if a table refers to a
    /// lane that does not exist or a road that is already connected.
    pub fn add_crossing(
        &mut self,
        location: Point2d,
        data: CrossingData,
        connections: &[RoadConnection],
    ) -> Result<CrossingId> {
        let plan = Crossing::plan(location, connections, &self.roads, &self.lanes)?;
        let crossing_id = self
            .crossings
            .insert_with_key(|id| Crossing::new(id, location, data, &plan));

        for (road, toward) in &plan.roads {
            let container = LaneContainer::Crossing(crossing_id);
            if *toward {
                self.roads[*road].set_next(container);
            } else {
                self.roads[*road].set_previous(container);
            }
        }

        for connector in &plan.connectors {
            let lane = self
                .lanes
                .insert_with_key(|id| Lane::crossing_lane(id, crossing_id, connector));
            self.lanes[connector.source].add_next(lane);
            self.lanes[connector.target].add_previous(lane);
            self.crossings[crossing_id].add_lane(lane);
        }

        let mut system = TrafficLightSystem::new();
        for light in plan.lights {
            let light_id = self
                .lights
                .insert(TrafficLight::new(light.lane, light.location, light.exits));
            if let LaneKind::Road(lane) = self.lanes[light.lane].kind_mut() {
                lane.light = Some(light_id);
            }
            system.add_light(light.road, light_id);
        }
        *self.crossings[crossing_id].lights_mut() = system;

        Ok(crossing_id)
    }

    /// Adds a building.
    pub fn add_building(&mut self, colour: Colour, points: Vec<Point2d>) -> Result<()> {
        if points.len() < 3 {
            return Err(Error::InvalidNetwork("building with fewer than three points".into()));
        }
        self.buildings.push(Building { colour, points });
        Ok(())
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> &Road {
        &self.roads[id]
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id]
    }

    /// Gets a reference to the crossing with the given ID.
    pub fn crossing(&self, id: CrossingId) -> &Crossing {
        &self.crossings[id]
    }

    /// Gets a reference to the traffic light with the given ID.
    pub fn light(&self, id: TrafficLightId) -> &TrafficLight {
        &self.lights[id]
    }

    pub fn roads(&self) -> &SlotMap<RoadId, Road> {
        &self.roads
    }

    pub fn lanes(&self) -> &LaneSet {
        &self.lanes
    }

    pub fn crossings(&self) -> &SlotMap<CrossingId, Crossing> {
        &self.crossings
    }

    pub fn lights(&self) -> &SlotMap<TrafficLightId, TrafficLight> {
        &self.lights
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// The lanes where vehicles enter the network.
    pub fn spawn_lanes(&self) -> Vec<LaneId> {
        self.roads
            .values()
            .flat_map(|road| road.spawn_lanes(&self.lanes))
            .collect()
    }

    /// The lanes where vehicles leave the network.
    pub fn unspawn_lanes(&self) -> Vec<LaneId> {
        self.roads
            .values()
            .flat_map(|road| road.unspawn_lanes(&self.lanes))
            .collect()
    }

    /// The number of lanes, connectors included.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// The summed length of every lane in m.
    pub fn lane_length(&self) -> f64 {
        self.lanes.values().map(|lane| lane.length()).sum()
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// The summed length of every road centre line in m.
    pub fn road_length(&self) -> f64 {
        self.roads.values().map(|road| road.length()).sum()
    }

    /// The extent of the network along the x and y axes, if it has any roads.
    pub fn bounds(&self) -> Option<(Interval<f64>, Interval<f64>)> {
        let mut points = self
            .lanes
            .values()
            .flat_map(|lane| lane.segments().iter().flat_map(|s| s.control_points()))
            .chain(self.buildings.iter().flat_map(|b| b.points.iter().copied()));
        let first = points.next()?;
        let init = (Interval::new(first.x, first.x), Interval::new(first.y, first.y));
        Some(points.fold(init, |(x, y), p| {
            (
                Interval::new(x.min.min(p.x), x.max.max(p.x)),
                Interval::new(y.min.min(p.y), y.max.max(p.y)),
            )
        }))
    }

    /// The crossing a lane leads into, if it belongs to a road that ends at one.
    pub fn lane_end_crossing(&self, lane: LaneId) -> Option<&Crossing> {
        let lane = &self.lanes[lane];
        let road = &self.roads[lane.road()?];
        match road.container_after(lane.direction()) {
            Some(LaneContainer::Crossing(id)) => Some(&self.crossings[id]),
            _ => None,
        }
    }

    /// Advances every crossing's lights and updates the state of the individual lights.
    pub(crate) fn step_lights(&mut self, seconds: f64, green_time: f64, yellow_time: f64, vehicles: &VehicleSet) {
        let Self {
            roads,
            lanes,
            crossings,
            lights,
            ..
        } = self;
        for crossing in crossings.values_mut() {
            let location = crossing.location();
            crossing.lights_mut().step(seconds, green_time, yellow_time, |road| {
                roads[road].vehicles_at_end_toward(lanes, vehicles, location, QUEUE_LENGTH)
            });
            for (light, state) in crossing.lights().light_states() {
                lights[light].set_state(state);
            }
        }
    }

    /// Returns every crossing's lights to their initial state.
    pub(crate) fn reset_lights(&mut self) {
        for crossing in self.crossings.values_mut() {
            crossing.lights_mut().reset();
        }
        for light in self.lights.values_mut() {
            light.set_state(LightState::Red);
        }
    }

    /// Adds a vehicle to a lane's occupancy list.
    pub(crate) fn insert_vehicle(&mut self, lane: LaneId, vehicles: &VehicleSet, id: VehicleId) {
        self.lanes[lane].insert_vehicle(vehicles, id);
    }

    /// Removes a vehicle from a lane's occupancy list.
    pub(crate) fn remove_vehicle(&mut self, lane: LaneId, id: VehicleId) {
        self.lanes[lane].remove_vehicle(id);
    }

    /// Restores the ordering of every lane's occupancy list.
    pub(crate) fn sort_vehicles(&mut self, vehicles: &VehicleSet) {
        for lane in self.lanes.values_mut() {
            lane.sort_vehicles(vehicles);
        }
    }

    /// Empties every lane's occupancy list.
    pub(crate) fn clear_vehicles(&mut self) {
        for lane in self.lanes.values_mut() {
            lane.clear_vehicles();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::{default_map, highway};
    use std::collections::BTreeMap;

    fn straight(network: &mut Network, from: (f64, f64), to: (f64, f64)) -> RoadId {
        let segment = Bezier::linear(Point2d::new(from.0, from.1), Point2d::new(to.0, to.1)).unwrap();
        network.add_road(&highway(), vec![segment]).unwrap()
    }

    #[test]
    fn neighbours_skip_the_shoulder() {
        let mut network = Network::new();
        let road = straight(&mut network, (0.0, 0.0), (1000.0, 0.0));
        let lanes = network.road(road).lanes_in(LaneDirection::Forward).to_vec();
        assert_eq!(lanes.len(), 4);
        let road_lane = |id: LaneId| network.lane(id).road_lane().unwrap().clone();
        assert_eq!(road_lane(lanes[0]).left, None);
        assert_eq!(road_lane(lanes[0]).right, Some(lanes[1]));
        assert_eq!(road_lane(lanes[2]).left, Some(lanes[1]));
        assert_eq!(road_lane(lanes[2]).right, None);
        assert_eq!(road_lane(lanes[3]).left, None);
        assert_eq!(network.lane(lanes[3]).lane_type(), LaneType::Shoulder);
    }

    #[test]
    fn crossings_wire_connectors_and_lights() {
        let mut network = Network::new();
        let west = straight(&mut network, (-500.0, 0.0), (-50.0, 0.0));
        let east = straight(&mut network, (50.0, 0.0), (500.0, 0.0));
        let table: BTreeMap<_, _> = [(0, vec![RoadLaneIndex::new(1, 0)]), (1, vec![RoadLaneIndex::new(1, 1)])]
            .into_iter()
            .collect();
        let crossing = network
            .add_crossing(
                Point2d::new(0.0, 0.0),
                CrossingData { line_width: 0.15 },
                &[RoadConnection::new(west, table.clone()), RoadConnection::new(east, table)],
            )
            .unwrap();

        let crossing = network.crossing(crossing);
        assert_eq!(crossing.lanes().len(), 4);
        assert_eq!(crossing.lights().approach_count(), 2);
        assert_eq!(network.lights().len(), 4);
        assert_eq!(network.road(west).next(), Some(LaneContainer::Crossing(crossing.id())));
        assert_eq!(network.road(east).previous(), Some(LaneContainer::Crossing(crossing.id())));

        for id in crossing.lanes() {
            let lane = network.lane(*id);
            assert_eq!(lane.next().len(), 1);
            assert_eq!(lane.previous().len(), 1);
            assert_eq!(lane.index(), network.lane(lane.next()[0]).index());
            assert!(network.lane(lane.previous()[0]).light().is_some());
        }

        // Only the outer ends of the two roads are at the edge of the map
        assert_eq!(network.spawn_lanes().len(), 6);
        assert_eq!(network.unspawn_lanes().len(), 6);
    }

    #[test]
    fn bad_tables_are_rejected() {
        let mut network = Network::new();
        let west = straight(&mut network, (-500.0, 0.0), (-50.0, 0.0));
        let east = straight(&mut network, (50.0, 0.0), (500.0, 0.0));
        let table: BTreeMap<_, _> = [(7, vec![RoadLaneIndex::new(1, 0)])].into_iter().collect();
        let result = network.add_crossing(
            Point2d::new(0.0, 0.0),
            CrossingData { line_width: 0.15 },
            &[RoadConnection::new(west, table), RoadConnection::new(east, BTreeMap::new())],
        );
        assert!(matches!(result, Err(Error::InvalidNetwork(_))));
        assert!(network.crossings().is_empty());
        assert_eq!(network.road(west).next(), None);
    }

    #[test]
    fn default_map_totals() {
        let network = default_map().unwrap();
        assert_eq!(network.road_count(), 15);
        assert_eq!(network.crossings().len(), 6);
        assert_eq!(network.buildings().len(), 2);
        let (x, y) = network.bounds().unwrap();
        assert!(x.min <= -3500.0 && x.max >= 1500.0);
        assert!(y.min <= -2500.0 && y.max >= 2000.0);
        assert!(!network.spawn_lanes().is_empty());
        assert_eq!(network.spawn_lanes().len(), network.unspawn_lanes().len());
    }
}
