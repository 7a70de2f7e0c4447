//! The live parameters of a simulation.
//!
//! A [Parameters] value is an immutable snapshot: the simulation reads it every step,
//! and a changed snapshot is handed over between steps, at which point the differences
//! are reported as [ParameterChange] events.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::math::Point2d;
use crate::util::Interval;
use crate::vehicle::VehicleKind;

/// The name of the vehicle set used when none is configured.
pub const DEFAULT_VEHICLE_SET: &str = "Default";

/// The parameters of a simulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Parameters {
    /// The wall clock delay between steps in ms.
    pub step_delay: u64,
    /// Simulated seconds per wall clock second.
    pub speed_factor: f64,
    /// The length of a single manual step in ms.
    pub next_step: u64,
    /// The mean number of vehicles spawned per second.
    pub spawn_mean: f64,
    /// The standard deviation of the number of vehicles spawned per second.
    pub spawn_std_dev: f64,
    /// The mean factor applied to a vehicle's desired speed.
    pub speed_mean: f64,
    /// The standard deviation of the desired speed factor.
    pub speed_std_dev: f64,
    /// The maximum number of vehicles in the network.
    pub vehicle_cap: usize,
    /// The minimum duration of a green phase in s.
    pub green_time: f64,
    /// The duration of a yellow phase in s.
    pub yellow_time: f64,
    /// The condition that ends the simulation.
    pub termination: Termination,
    /// The relative frequency of each kind of vehicle.
    pub fractions: ProductionFractions,
    /// The name of the vehicle set to produce vehicles from.
    pub vehicle_set: String,
    /// The part of the world that is drawn.
    pub view: View,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            step_delay: 0,
            speed_factor: 1.0,
            next_step: 50,
            spawn_mean: 10.0,
            spawn_std_dev: 3.0,
            speed_mean: 1.0,
            speed_std_dev: 0.1,
            vehicle_cap: 1000,
            green_time: 9.0,
            yellow_time: 3.0,
            termination: Termination::default(),
            fractions: ProductionFractions::default(),
            vehicle_set: DEFAULT_VEHICLE_SET.into(),
            view: View::default(),
        }
    }
}

impl Parameters {
    /// Returns a copy with every value clamped into its valid domain.
    pub fn sanitized(&self) -> Self {
        let clamp = |value: f64, min: f64, max: f64| {
            if value.is_nan() {
                min
            } else {
                Interval::new(min, max).clamp(value)
            }
        };
        Self {
            step_delay: self.step_delay.min(1000),
            speed_factor: clamp(self.speed_factor, 0.1, 10.0),
            next_step: self.next_step.clamp(1, 1000),
            spawn_mean: clamp(self.spawn_mean, 0.0, 1000.0),
            spawn_std_dev: clamp(self.spawn_std_dev, 0.0, 1000.0),
            speed_mean: clamp(self.speed_mean, 0.0, 10.0),
            speed_std_dev: clamp(self.speed_std_dev, 0.0, 10.0),
            vehicle_cap: self.vehicle_cap.min(10_000),
            green_time: clamp(self.green_time, 0.1, 1000.0),
            yellow_time: clamp(self.yellow_time, 0.1, 1000.0),
            termination: self.termination,
            fractions: self.fractions.sanitized(),
            vehicle_set: self.vehicle_set.clone(),
            view: View {
                centre: self.view.centre,
                size: clamp(self.view.size, 1.0, 1_000_000.0),
                zoom_factor: clamp(self.view.zoom_factor, 0.1, 10.0),
            },
        }
    }

    /// Lists what differs between an earlier snapshot and this one.
    pub fn changes_from(&self, old: &Parameters) -> Vec<ParameterChange> {
        let mut changes = vec![];
        if self.vehicle_set != old.vehicle_set {
            changes.push(ParameterChange::VehicleSet);
        }
        if self.fractions != old.fractions {
            changes.push(ParameterChange::VehicleFractions);
        }
        if self.view != old.view {
            changes.push(ParameterChange::View);
        }
        if self.green_time != old.green_time || self.yellow_time != old.yellow_time {
            changes.push(ParameterChange::LightTiming);
        }
        if self.termination != old.termination {
            changes.push(ParameterChange::Termination);
        }
        changes
    }
}

/// A change between two parameter snapshots that the simulation must react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterChange {
    /// A different vehicle set was selected.
    VehicleSet,
    /// A production fraction changed.
    VehicleFractions,
    /// The view was moved, resized or zoomed.
    View,
    /// The green or yellow time changed.
    LightTiming,
    /// The termination condition changed.
    Termination,
}

/// The relative frequency with which each kind of vehicle is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductionFractions {
    pub bus: u32,
    pub car: u32,
    pub motorcycle: u32,
    pub truck: u32,
}

impl Default for ProductionFractions {
    fn default() -> Self {
        Self {
            bus: 1,
            car: 1,
            motorcycle: 1,
            truck: 1,
        }
    }
}

impl ProductionFractions {
    /// Gets the fraction for a kind of vehicle.
    pub fn get(&self, kind: VehicleKind) -> u32 {
        match kind {
            VehicleKind::Bus => self.bus,
            VehicleKind::Car => self.car,
            VehicleKind::Motorcycle => self.motorcycle,
            VehicleKind::Truck => self.truck,
        }
    }

    fn sanitized(&self) -> Self {
        const MAX: u32 = 1_000_000;
        Self {
            bus: self.bus.min(MAX),
            car: self.car.min(MAX),
            motorcycle: self.motorcycle.min(MAX),
            truck: self.truck.min(MAX),
        }
    }
}

/// The part of the world that is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct View {
    /// The world coordinate at the centre of the viewport.
    pub centre: Point2d,
    /// The extent of the world that fits in the viewport, in m.
    pub size: f64,
    /// The factor the view size is scaled by per zoom step.
    pub zoom_factor: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            centre: Point2d::new(0.0, 0.0),
            size: 4000.0,
            zoom_factor: 2.0,
        }
    }
}

impl View {
    /// Zooms in by the zoom factor.
    pub fn zoomed_in(&self) -> Self {
        Self {
            size: self.size / self.zoom_factor,
            ..*self
        }
    }

    /// Zooms out by the zoom factor.
    pub fn zoomed_out(&self) -> Self {
        Self {
            size: self.size * self.zoom_factor,
            ..*self
        }
    }
}

/// The condition under which a simulation ends.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Termination {
    pub statistic: TerminationStatistic,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Default for Termination {
    fn default() -> Self {
        Self {
            statistic: TerminationStatistic::None,
            comparison: Comparison::Greater,
            threshold: 10.0,
        }
    }
}

/// The statistic a termination condition is evaluated on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationStatistic {
    None,
    DestinationReached,
    MeanMovingFraction,
    MovingFraction,
    Time,
    VehicleCount,
    TotalVehicleCount,
}

/// How a statistic is compared with a termination threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Comparison {
    Less,
    EqualOrLess,
    EqualOrGreater,
    Greater,
}

impl Comparison {
    /// Checks whether `value` satisfies the comparison against `threshold`.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Less => value < threshold,
            Comparison::EqualOrLess => value <= threshold,
            Comparison::EqualOrGreater => value >= threshold,
            Comparison::Greater => value > threshold,
        }
    }
}
