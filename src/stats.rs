//! Counters describing the state of a simulation.

use crate::config::TerminationStatistic;
use crate::math::Point2d;
use crate::network::Network;
use crate::{LaneSet, Vehicle, VehicleSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Converts m/s to km/h.
const KMH: f64 = 3.6;

/// Statistics gathered over the lifetime of a simulation.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statistics {
    /// The number of lanes, connectors included.
    pub lane_count: usize,
    /// The summed length of all lanes in m.
    pub lane_length: f64,
    pub road_count: usize,
    /// The summed length of all road centre lines in m.
    pub road_length: f64,
    /// The number of vehicles in the network.
    pub vehicle_count: usize,
    /// The number of vehicles produced so far.
    pub total_vehicle_count: u64,
    /// The number of vehicles that left through their destination lane.
    pub destination_reached: u64,
    /// The number of vehicles that left through another lane.
    pub destination_missed: u64,
    /// The mean speed of the vehicles in the network in km/h.
    pub mean_speed: f64,
    /// The fraction of vehicles that are moving.
    pub moving_fraction: f64,
    /// The moving fraction averaged over simulated time.
    pub mean_moving_fraction: f64,
    /// The distance driven by all vehicles in m.
    pub total_distance: f64,
    pub step_count: u64,
    /// The number of steps per wall clock second.
    pub step_rate: f64,
    /// The simulated time in s.
    pub time: f64,
    /// The sum of moving fraction times step length, for the time average.
    moving_time: f64,
}

impl Statistics {
    /// Creates statistics for a network without vehicles.
    pub fn new(network: &Network) -> Self {
        Self {
            lane_count: network.lane_count(),
            lane_length: network.lane_length(),
            road_count: network.road_count(),
            road_length: network.road_length(),
            moving_fraction: 1.0,
            mean_moving_fraction: 1.0,
            ..Default::default()
        }
    }

    /// Gets the value of a termination statistic, or `None` if nothing is measured.
    pub fn value(&self, statistic: TerminationStatistic) -> Option<f64> {
        match statistic {
            TerminationStatistic::None => None,
            TerminationStatistic::DestinationReached => Some(self.destination_reached as f64),
            TerminationStatistic::MeanMovingFraction => Some(self.mean_moving_fraction),
            TerminationStatistic::MovingFraction => Some(self.moving_fraction),
            TerminationStatistic::Time => Some(self.time),
            TerminationStatistic::VehicleCount => Some(self.vehicle_count as f64),
            TerminationStatistic::TotalVehicleCount => Some(self.total_vehicle_count as f64),
        }
    }

    /// Counts a vehicle leaving the network.
    pub(crate) fn record_exit(&mut self, destination_reached: bool) {
        if destination_reached {
            self.destination_reached += 1;
        } else {
            self.destination_missed += 1;
        }
    }

    /// Updates the statistics at the end of a step.
    ///
    /// # Parameters
    /// * `seconds` - The simulated length of the step in s
    /// * `wall_seconds` - The wall clock length of the step in s
    /// * `distance` - The distance driven by all vehicles during the step in m
    /// * `vehicles` - The vehicles still in the network
    /// * `production_count` - The number of vehicles produced so far
    pub(crate) fn record_step(
        &mut self,
        seconds: f64,
        wall_seconds: f64,
        distance: f64,
        vehicles: &VehicleSet,
        production_count: u64,
    ) {
        let count = vehicles.len();
        self.vehicle_count = count;
        self.total_vehicle_count = production_count;
        self.total_distance += distance;
        self.step_count += 1;
        self.step_rate = if wall_seconds > 0.0 { 1.0 / wall_seconds } else { 0.0 };
        self.time += seconds;

        if count > 0 {
            let speed_sum: f64 = vehicles.values().map(|v| v.speed()).sum();
            let stopped = vehicles.values().filter(|v| v.speed() == 0.0).count();
            self.mean_speed = KMH * speed_sum / count as f64;
            self.moving_fraction = 1.0 - stopped as f64 / count as f64;
        } else {
            self.mean_speed = 0.0;
            self.moving_fraction = 1.0;
        }
        self.moving_time += self.moving_fraction * seconds;
        if self.time > 0.0 {
            self.mean_moving_fraction = self.moving_time / self.time;
        }
    }
}

/// The details of a single vehicle, shown when it is selected.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleDetail {
    pub serial: u64,
    /// The model name.
    pub model: String,
    /// The world position of the vehicle's centre.
    pub position: Point2d,
    /// The speed in km/h.
    pub speed: f64,
    /// The desired speed in km/h.
    pub target_speed: f64,
    /// The distance driven in m.
    pub distance: f64,
    /// The time spent in the network in s.
    pub total_time: f64,
    /// The time spent moving in s.
    pub moving_time: f64,
}

impl VehicleDetail {
    pub fn new(vehicle: &Vehicle, lanes: &LaneSet) -> Self {
        Self {
            serial: vehicle.serial(),
            model: vehicle.model().name.clone(),
            position: vehicle.position(lanes).0,
            speed: KMH * vehicle.speed(),
            target_speed: KMH * vehicle.target_speed(),
            distance: vehicle.distance(),
            total_time: vehicle.total_time(),
            moving_time: vehicle.moving_time(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn empty_network_counts_as_moving() {
        let mut stats = Statistics::default();
        stats.record_step(0.5, 0.25, 0.0, &VehicleSet::with_key(), 0);
        stats.record_step(0.5, 0.25, 0.0, &VehicleSet::with_key(), 0);
        assert_eq!(stats.step_count, 2);
        assert_approx_eq!(stats.time, 1.0);
        assert_approx_eq!(stats.step_rate, 4.0);
        assert_approx_eq!(stats.moving_fraction, 1.0);
        assert_approx_eq!(stats.mean_moving_fraction, 1.0);
        assert_eq!(stats.value(TerminationStatistic::None), None);
        assert_eq!(stats.value(TerminationStatistic::Time), Some(stats.time));
    }

    #[test]
    fn exits_are_counted() {
        let mut stats = Statistics::default();
        stats.record_exit(true);
        stats.record_exit(false);
        stats.record_exit(true);
        assert_eq!(stats.destination_reached, 2);
        assert_eq!(stats.destination_missed, 1);
        assert_eq!(stats.value(TerminationStatistic::DestinationReached), Some(2.0));
    }
}
