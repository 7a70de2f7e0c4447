use crate::light::LightState;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A light this far away in seconds of travel constrains the vehicle.
const LIGHT_LOOKAHEAD: f64 = 5.0; // s

/// A light this close in m always constrains the vehicle, and it stops there.
const STOP_DISTANCE: f64 = 5.0; // m

/// A leader closer than this in m forces hard braking.
const MIN_GAP: f64 = 3.0; // m

/// The fraction of the leader's speed to brake toward when too close.
const HARD_FOLLOW: f64 = 0.95;

/// The fraction of the leader's speed to brake toward when closing in.
const SOFT_FOLLOW: f64 = 0.98;

/// Which rule last decided a vehicle's speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DrivingState {
    /// Accelerating or braking toward the target speed.
    #[default]
    Free,
    /// Braking behind a leader.
    Following,
    /// Braking for a red or yellow light.
    LightConstrained,
    /// Moving between lanes.
    LaneChanging,
}

/// What the vehicle can see ahead of it on one lane.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Outlook {
    /// The state of the light at the end of the lane and the distance to it in m.
    pub light: Option<(LightState, f64)>,
    /// The gap to the leader in m and the leader's speed in m/s.
    pub leader: Option<(f64, f64)>,
}

/// The longitudinal abilities and wishes of a vehicle.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Driver {
    /// The current speed in m/s.
    pub speed: f64,
    /// The desired speed in m/s.
    pub target_speed: f64,
    /// The acceleration in m/s<sup>2</sup>.
    pub acceleration: f64,
    /// The braking deceleration in m/s<sup>2</sup>.
    pub deceleration: f64,
}

impl Driver {
    /// Computes the change in speed over a step of `seconds`.
    ///
    /// A red or yellow light takes precedence over the leader, unless the light is too
    /// close to stop for, in which case the vehicle carries on as if it were green.
    pub fn speed_change(&self, seconds: f64, outlook: &Outlook) -> (f64, DrivingState) {
        let speed = self.speed;
        let braking = self.deceleration * seconds;

        if let Some((state, distance)) = outlook.light {
            let near = distance < LIGHT_LOOKAHEAD * speed || distance < STOP_DISTANCE;
            if state != LightState::Green && distance > 0.0 && near {
                let braking_distance = speed.powi(2) / (2.0 * self.deceleration);
                if distance >= braking_distance {
                    let change = if distance < STOP_DISTANCE {
                        -speed
                    } else {
                        -speed.min(braking)
                    };
                    return (change, DrivingState::LightConstrained);
                }
            }
        }

        if let Some((gap, leader)) = outlook.leader {
            if gap < MIN_GAP || (gap < speed && speed >= HARD_FOLLOW * leader) {
                let change = -braking.min((speed - HARD_FOLLOW * leader).max(0.0));
                return (change, DrivingState::Following);
            }
            if gap < 2.0 * speed && speed >= leader {
                let change = -braking.min((speed - SOFT_FOLLOW * leader).max(0.0));
                return (change, DrivingState::Following);
            }
        }

        let diff = self.target_speed - speed;
        let change = if diff > 0.0 {
            diff.min(self.acceleration * seconds)
        } else {
            diff.max(-braking)
        };
        (change, DrivingState::Free)
    }
}
