use std::sync::Arc;
use std::time::Instant;

use crate::config::{ParameterChange, Parameters, TerminationStatistic};
use crate::error::{Error, Result};
use crate::factory::{sample_normal, VehicleFactory};
use crate::network::Network;
use crate::render::{Colour, Frame, Scene, ViewTransform};
use crate::stats::{Statistics, VehicleDetail};
use crate::vehicle::{Vehicle, VehicleSpawn};
use crate::{LaneId, VehicleId, VehicleSet};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The viewport size in pixels until one is set.
const DEFAULT_VIEWPORT: (f64, f64) = (800.0, 800.0);

/// What happened during a step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// The simulated length of the step in s.
    pub seconds: f64,
    /// The number of vehicles that entered the network.
    pub spawned: usize,
    /// The number of vehicles that left the network.
    pub removed: usize,
    /// Whether the termination condition has been met.
    pub terminated: bool,
}

/// A traffic simulation: a road network, the vehicles on it and the parameters driving it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Simulation {
    /// The road network.
    network: Network,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// Produces new vehicles.
    factory: VehicleFactory,
    /// The parameters in effect.
    parameters: Parameters,
    statistics: Statistics,
    /// The vehicle whose details are reported.
    selected: Option<VehicleId>,
    /// The size of the viewport in pixels.
    viewport: (f64, f64),
    /// Whether the termination condition has been met.
    terminated: bool,
    /// The lanes vehicles can enter the network on.
    #[cfg_attr(feature = "serde", serde(skip))]
    spawn_lanes: Vec<LaneId>,
    /// The lanes vehicles can leave the network through.
    #[cfg_attr(feature = "serde", serde(skip))]
    unspawn_lanes: Vec<LaneId>,
    #[cfg_attr(feature = "serde", serde(skip, default = "entropy_rng"))]
    rng: StdRng,
    /// The draw points of the static network, for the current view.
    #[cfg_attr(feature = "serde", serde(skip))]
    scene: Option<Arc<Scene>>,
    /// The wall clock time of the end of the last step.
    #[cfg_attr(feature = "serde", serde(skip))]
    last_step: Option<Instant>,
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

impl Simulation {
    /// Creates a simulation on a network.
    ///
    /// # Parameters
    /// * `network` - The road network
    /// * `parameters` - The initial parameters, which are sanitized first
    /// * `seed` - Seeds the random number generator, for reproducible runs
    pub fn new(network: Network, parameters: Parameters, seed: Option<u64>) -> Self {
        let parameters = parameters.sanitized();
        let mut simulation = Self {
            statistics: Statistics::new(&network),
            factory: VehicleFactory::new(&parameters.vehicle_set),
            network,
            vehicles: VehicleSet::with_key(),
            parameters,
            selected: None,
            viewport: DEFAULT_VIEWPORT,
            terminated: false,
            spawn_lanes: vec![],
            unspawn_lanes: vec![],
            rng: seed.map_or_else(entropy_rng, StdRng::seed_from_u64),
            scene: None,
            last_step: None,
        };
        simulation.repopulate();
        simulation
    }

    /// Rebuilds everything that is derived from the network rather than stored.
    pub(crate) fn repopulate(&mut self) {
        self.spawn_lanes = self.network.spawn_lanes();
        self.unspawn_lanes = self.network.unspawn_lanes();
        self.factory.repopulate();
        self.rebuild_scene();
    }

    fn rebuild_scene(&mut self) {
        self.scene = Some(Arc::new(Scene::new(&self.network, self.transform())));
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn vehicles(&self) -> &VehicleSet {
        &self.vehicles
    }

    /// Gets a reference to the vehicle with the given ID, if it is still in the network.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn factory(&self) -> &VehicleFactory {
        &self.factory
    }

    /// Gets the lanes vehicles can enter the network on.
    pub fn spawn_lanes(&self) -> &[LaneId] {
        &self.spawn_lanes
    }

    /// Gets the lanes vehicles can leave the network through.
    pub fn unspawn_lanes(&self) -> &[LaneId] {
        &self.unspawn_lanes
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Replaces the parameters, reacting to whatever changed.
    pub fn apply_parameters(&mut self, parameters: Parameters) -> Vec<ParameterChange> {
        let parameters = parameters.sanitized();
        let changes = parameters.changes_from(&self.parameters);
        self.parameters = parameters;
        for change in &changes {
            match change {
                ParameterChange::VehicleSet | ParameterChange::VehicleFractions => {
                    let name = self.parameters.vehicle_set.clone();
                    self.factory.load(&name);
                }
                ParameterChange::View => self.rebuild_scene(),
                ParameterChange::Termination => self.terminated = false,
                ParameterChange::LightTiming => {}
            }
        }
        if !changes.is_empty() {
            debug!("parameters changed: {:?}", changes);
        }
        changes
    }

    /// Centres the view on the network and zooms to fit it.
    pub fn fit_view(&mut self) {
        if let Some((x, y)) = self.network.bounds() {
            let mut parameters = self.parameters.clone();
            parameters.view.centre = crate::math::Point2d::new(x.lerp(0.5), y.lerp(0.5));
            parameters.view.size = x.length().max(y.length());
            self.apply_parameters(parameters);
        }
    }

    /// Sets the size of the viewport in pixels.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 && (width, height) != self.viewport {
            self.viewport = (width, height);
            self.rebuild_scene();
        }
    }

    /// Gets the transform from world coordinates to the viewport.
    pub fn transform(&self) -> ViewTransform {
        ViewTransform::new(&self.parameters.view, self.viewport.0, self.viewport.1)
    }

    /// Selects a vehicle to report the details of.
    pub fn select(&mut self, vehicle: Option<VehicleId>) {
        self.selected = vehicle.filter(|id| self.vehicles.contains_key(*id));
    }

    pub fn selected(&self) -> Option<VehicleId> {
        self.selected
    }

    /// Gets the details of the selected vehicle.
    pub fn selected_detail(&self) -> Option<VehicleDetail> {
        let vehicle = self.vehicles.get(self.selected?)?;
        Some(VehicleDetail::new(vehicle, self.network.lanes()))
    }

    /// Gets the draw points of the current state.
    pub fn frame(&self) -> Frame {
        let scene = self
            .scene
            .clone()
            .unwrap_or_else(|| Arc::new(Scene::new(&self.network, self.transform())));
        Frame::new(scene, &self.network, &self.vehicles, self.selected)
    }

    /// Removes every vehicle and restarts the clock, lights and statistics.
    pub fn reset(&mut self) {
        self.vehicles.clear();
        self.network.clear_vehicles();
        self.network.reset_lights();
        let name = self.parameters.vehicle_set.clone();
        self.factory = VehicleFactory::new(&name);
        self.statistics = Statistics::new(&self.network);
        self.selected = None;
        self.terminated = false;
        self.last_step = None;
        info!("simulation reset");
    }

    /// Places a vehicle on the network.
    pub fn spawn_vehicle(&mut self, spawn: VehicleSpawn) -> Result<VehicleId> {
        for lane in [spawn.lane, spawn.destination] {
            if !self.network.lanes().contains_key(lane) {
                return Err(Error::UnknownLane(lane));
            }
        }
        let serial = self.factory.register();
        let colour = Colour::random(&mut self.rng);
        Ok(self.insert_vehicle(serial, colour, spawn))
    }

    fn insert_vehicle(&mut self, serial: u64, colour: Colour, spawn: VehicleSpawn) -> VehicleId {
        let lane = spawn.lane;
        let network = &self.network;
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, serial, colour, spawn, network));
        self.network.insert_vehicle(lane, &self.vehicles, id);
        id
    }

    /// Removes a vehicle from the network.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(vehicle) = self.vehicles.remove(id) {
            self.network.remove_vehicle(vehicle.lane(), id);
            if self.selected == Some(id) {
                self.selected = None;
            }
        }
    }

    /// Forgets the time of the last step, so a pause is not simulated.
    pub(crate) fn restart_clock(&mut self) {
        self.last_step = None;
    }

    /// Advances the simulation by a step measured on the wall clock since the last one.
    pub fn step_wall_clock(&mut self) -> StepReport {
        let now = Instant::now();
        let wall_seconds = self
            .last_step
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_step = Some(now);
        self.step(wall_seconds)
    }

    /// Advances the simulation by `wall_seconds`, scaled by the speed factor.
    ///
    /// Vehicles are spawned first, then the lights are switched, then every vehicle
    /// considers a lane change, adjusts its speed and moves. Steps of zero length
    /// do nothing.
    pub fn step(&mut self, wall_seconds: f64) -> StepReport {
        let seconds = wall_seconds * self.parameters.speed_factor;
        if !(seconds > 0.0) {
            return StepReport {
                terminated: self.terminated,
                ..Default::default()
            };
        }
        let started = Instant::now();

        let spawned = self.spawn_vehicles(seconds);
        self.network.step_lights(
            seconds,
            self.parameters.green_time,
            self.parameters.yellow_time,
            &self.vehicles,
        );

        let mut distance = 0.0;
        let mut exits = vec![];
        let ids: Vec<_> = self.vehicles.keys().collect();
        for id in ids {
            match self.vehicles[id].plan_lane_change(&self.network, &self.vehicles) {
                Ok(Some(connection)) => {
                    let (start, end) = (connection.start_lane(), connection.end_lane());
                    self.network.remove_vehicle(start, id);
                    self.vehicles[id].begin_lane_change(connection, &self.network);
                    self.network.insert_vehicle(end, &self.vehicles, id);
                }
                Ok(None) => {}
                Err(err) => debug!("lane change of vehicle {:?} aborted: {}", id, err),
            }

            let (change, state) = self.vehicles[id].speed_change(seconds, &self.network, &self.vehicles);
            self.vehicles[id].apply_speed_change(change, state);

            let step = self.vehicles[id].advance(seconds, &self.network, &mut self.rng);
            distance += step.distance;
            if let Some((from, to)) = step.handoff {
                self.network.remove_vehicle(from, id);
                self.network.insert_vehicle(to, &self.vehicles, id);
            }
            if step.remove {
                exits.push((id, step.destination_reached));
            }
        }

        for (id, destination_reached) in &exits {
            self.statistics.record_exit(*destination_reached);
            self.remove_vehicle(*id);
        }
        self.network.sort_vehicles(&self.vehicles);

        self.statistics.record_step(
            seconds,
            wall_seconds,
            distance,
            &self.vehicles,
            self.factory.production_count(),
        );
        self.check_termination();
        trace!(
            "step {} took {:?} for {} vehicles",
            self.statistics.step_count,
            started.elapsed(),
            self.vehicles.len()
        );

        StepReport {
            seconds,
            spawned,
            removed: exits.len(),
            terminated: self.terminated,
        }
    }

    /// Spawns the vehicles ordered from the factory, each on a different free spawn lane
    /// and with a random destination.
    fn spawn_vehicles(&mut self, seconds: f64) -> usize {
        if self.unspawn_lanes.is_empty() {
            return 0;
        }
        let mut lanes: Vec<_> = self
            .spawn_lanes
            .iter()
            .copied()
            .filter(|id| self.network.lane(*id).can_spawn(&self.vehicles))
            .collect();
        let orders = self.factory.order(
            seconds,
            self.vehicles.len(),
            lanes.len(),
            &self.parameters,
            &mut self.rng,
        );

        let mut count = 0;
        for (serial, model) in orders {
            if lanes.is_empty() {
                break;
            }
            let lane = lanes.swap_remove(self.rng.gen_range(0..lanes.len()));
            let Some(destination) = self.unspawn_lanes.choose(&mut self.rng).copied() else {
                break;
            };
            let speed_factor = sample_normal(
                self.parameters.speed_mean,
                self.parameters.speed_std_dev,
                &mut self.rng,
            )
            .abs();
            let colour = Colour::random(&mut self.rng);
            let spawn = VehicleSpawn {
                lane,
                destination,
                model,
                speed_factor,
                segment: 0,
                time: 0.0,
            };
            self.insert_vehicle(serial, colour, spawn);
            count += 1;
        }
        if count > 0 {
            debug!("spawned {} vehicles", count);
        }
        count
    }

    fn check_termination(&mut self) {
        let termination = self.parameters.termination;
        if self.terminated || termination.statistic == TerminationStatistic::None {
            return;
        }
        if let Some(value) = self.statistics.value(termination.statistic) {
            if termination.comparison.holds(value, termination.threshold) {
                info!(
                    "termination condition reached: {:?} is {:?} than {} at {}",
                    termination.statistic, termination.comparison, termination.threshold, value
                );
                self.terminated = true;
            }
        }
    }
}

#[cfg(feature = "serde")]
impl Simulation {
    /// Serialises the network and the live state of every vehicle as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a simulation saved with [Simulation::to_json].
    pub fn from_json(json: &str) -> Result<Self> {
        let mut simulation: Self = serde_json::from_str(json)?;
        simulation.repopulate();
        Ok(simulation)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Comparison, Termination};
    use crate::scenario::default_map;

    fn simulation() -> Simulation {
        let parameters = Parameters {
            spawn_mean: 20.0,
            spawn_std_dev: 0.0,
            ..Default::default()
        };
        Simulation::new(default_map().unwrap(), parameters, Some(7))
    }

    #[test]
    fn zero_length_steps_do_nothing() {
        let mut sim = simulation();
        let report = sim.step(0.0);
        assert_eq!(report.spawned, 0);
        assert_eq!(sim.statistics().step_count, 0);
        assert!(sim.vehicles().is_empty());
    }

    #[test]
    fn vehicles_spawn_on_distinct_lanes() {
        let mut sim = simulation();
        let lanes = sim.spawn_lanes().len();
        let report = sim.step(0.01);
        assert_eq!(report.spawned, 0);
        let report = sim.step(1.0);
        assert_eq!(report.spawned, lanes.min(20));
        let mut occupied: Vec<_> = sim.vehicles().values().map(|v| v.lane()).collect();
        occupied.sort();
        occupied.dedup();
        assert_eq!(occupied.len(), report.spawned);
        assert_eq!(sim.statistics().total_vehicle_count, report.spawned as u64);
        assert_eq!(sim.statistics().vehicle_count, report.spawned);
    }

    #[test]
    fn parameter_changes_are_applied() {
        let mut sim = simulation();
        let mut parameters = sim.parameters().clone();
        parameters.vehicle_set = "Porsche 911 (993)".into();
        parameters.green_time = -3.0;
        let changes = sim.apply_parameters(parameters);
        assert_eq!(changes, vec![ParameterChange::VehicleSet, ParameterChange::LightTiming]);
        assert_eq!(sim.factory().vehicle_set(), "Porsche 911 (993)");
        assert_eq!(sim.parameters().green_time, 0.1);
    }

    #[test]
    fn termination_is_reported() {
        let mut sim = simulation();
        let mut parameters = sim.parameters().clone();
        parameters.termination = Termination {
            statistic: TerminationStatistic::Time,
            comparison: Comparison::EqualOrGreater,
            threshold: 1.5,
        };
        sim.apply_parameters(parameters);
        assert!(!sim.step(1.0).terminated);
        assert!(sim.step(1.0).terminated);
        assert!(sim.is_terminated());
    }

    #[test]
    fn reset_clears_the_vehicles() {
        let mut sim = simulation();
        sim.step(1.0);
        let id = sim.vehicles().keys().next().unwrap();
        sim.select(Some(id));
        assert!(sim.selected_detail().is_some());
        sim.reset();
        assert!(sim.vehicles().is_empty());
        assert!(sim.network().lanes().values().all(|lane| lane.vehicles().is_empty()));
        assert_eq!(sim.selected(), None);
        assert_eq!(sim.statistics().step_count, 0);
    }
}
