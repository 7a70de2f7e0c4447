#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kinds of vehicle, each with its own speed limit on a road.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VehicleKind {
    Bus,
    Car,
    Motorcycle,
    Truck,
}

impl VehicleKind {
    /// All kinds in production order.
    pub const ALL: [VehicleKind; 4] = [
        VehicleKind::Bus,
        VehicleKind::Car,
        VehicleKind::Motorcycle,
        VehicleKind::Truck,
    ];
}

/// The make and performance of a vehicle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleModel {
    /// The model name.
    pub name: String,
    /// The kind of vehicle.
    pub kind: VehicleKind,
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// The top speed in m/s.
    pub top_speed: f64,
    /// The acceleration in m/s<sup>2</sup>.
    pub acceleration: f64,
    /// The braking deceleration in m/s<sup>2</sup>, a positive number.
    pub deceleration: f64,
}

impl VehicleModel {
    pub fn new(
        name: &str,
        kind: VehicleKind,
        (width, length): (f64, f64),
        top_speed: f64,
        acceleration: f64,
        deceleration: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            width,
            length,
            top_speed,
            acceleration,
            deceleration,
        }
    }
}
