pub use cgmath;
pub use config::{
    Comparison, ParameterChange, Parameters, ProductionFractions, Termination, TerminationStatistic, View,
    DEFAULT_VEHICLE_SET,
};
pub use connection::Connection;
pub use error::{Error, Result};
pub use factory::{vehicle_set, vehicle_set_names, ProductionItem, VehicleFactory};
pub use light::{LightState, TrafficLight, TrafficLightSystem};
pub use network::{
    Building, Crossing, CrossingData, CrossingLane, Lane, LaneContainer, LaneDirection, LaneKind, LaneType,
    Network, Road, RoadConnection, RoadData, RoadLane, RoadLaneIndex, SpeedTable,
};
pub use render::{
    BuildingShape, Canvas, Colour, CrossingShape, Frame, LightShape, MarkingShape, Overlays, Path, RoadShape, Scene,
    VehicleShape, ViewTransform,
};
pub use runner::{Command, SimulationRunner, Snapshot};
pub use simulation::{Simulation, StepReport};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use stats::{Statistics, VehicleDetail};
pub use util::Interval;
pub use vehicle::{DrivingState, Vehicle, VehicleKind, VehicleModel, VehicleSpawn, VehicleStep};

mod config;
mod connection;
mod error;
mod factory;
mod light;
pub mod math;
mod network;
mod render;
mod runner;
pub mod scenario;
mod simulation;
mod stats;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Crossing].
    pub struct CrossingId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a [TrafficLight].
    pub struct TrafficLightId;
}

type LaneSet = SlotMap<LaneId, Lane>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
