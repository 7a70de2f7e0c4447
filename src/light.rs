use crate::math::Point2d;
use crate::{LaneId, RoadId, TrafficLightId};
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Phases never last less than this, in s.
const MIN_PHASE_TIME: f64 = 0.1;

/// The state of a traffic light.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightState {
    #[default]
    Red,
    Yellow,
    Green,
}

/// A traffic light at the end of a lane entering a crossing.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficLight {
    /// The lane the light controls.
    lane: LaneId,
    /// The position of the light, at the end of its lane.
    location: Point2d,
    /// The lanes the light permits traffic into.
    exits: Vec<LaneId>,
    /// The current state.
    state: LightState,
}

impl TrafficLight {
    /// Creates a red traffic light.
    pub fn new(lane: LaneId, location: Point2d, exits: Vec<LaneId>) -> Self {
        Self {
            lane,
            location,
            exits,
            state: LightState::Red,
        }
    }

    /// Gets the lane the light controls.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn location(&self) -> Point2d {
        self.location
    }

    /// Gets the lanes the light permits traffic into.
    pub fn exits(&self) -> &[LaneId] {
        &self.exits
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: LightState) {
        self.state = state;
    }
}

/// The lights of one road entering a crossing, which always show the same state.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Approach {
    road: RoadId,
    lights: Vec<TrafficLightId>,
    state: LightState,
}

/// Controls the lights of a crossing, giving green to one approach at a time.
///
/// The approach with the longest queue is favoured. A green phase is extended
/// for as long as its approach still has the longest queue, so a busy approach
/// can starve the others.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficLightSystem {
    /// The approaches, in the order their lights were added.
    approaches: Vec<Approach>,
    /// Either green on the favoured approach or yellow between phases.
    phase: LightState,
    /// The index of the favoured approach.
    favoured: usize,
    /// The time spent in the current phase in s.
    clock: f64,
}

impl Default for TrafficLightSystem {
    fn default() -> Self {
        Self {
            approaches: vec![],
            phase: LightState::Yellow,
            favoured: 0,
            clock: 0.0,
        }
    }
}

impl TrafficLightSystem {
    /// Creates a system without any lights.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a light on the given road.
    pub fn add_light(&mut self, road: RoadId, light: TrafficLightId) {
        match self.approaches.iter_mut().find(|a| a.road == road) {
            Some(approach) => approach.lights.push(light),
            None => self.approaches.push(Approach {
                road,
                lights: vec![light],
                state: LightState::Red,
            }),
        }
    }

    /// Returns to the initial yellow phase with every light red.
    pub(crate) fn reset(&mut self) {
        self.phase = LightState::Yellow;
        self.favoured = 0;
        self.clock = 0.0;
        for approach in &mut self.approaches {
            approach.state = LightState::Red;
        }
    }

    /// Gets the number of approaches.
    pub fn approach_count(&self) -> usize {
        self.approaches.len()
    }

    /// Gets the road of the favoured approach.
    pub fn favoured(&self) -> Option<RoadId> {
        self.approaches.get(self.favoured).map(|a| a.road)
    }

    /// Gets the current phase, either green or yellow.
    pub fn phase(&self) -> LightState {
        self.phase
    }

    /// Gets the state shown on a road's lights.
    pub fn state_of(&self, road: RoadId) -> Option<LightState> {
        self.approaches.iter().find(|a| a.road == road).map(|a| a.state)
    }

    /// Iterates over every light and the state it should show.
    pub fn light_states(&self) -> impl Iterator<Item = (TrafficLightId, LightState)> + '_ {
        self.approaches
            .iter()
            .flat_map(|a| a.lights.iter().map(move |light| (*light, a.state)))
    }

    /// Advances the lights by `seconds`.
    ///
    /// # Parameters
    /// * `seconds` - The time step in s
    /// * `green_time` - The minimum duration of a green phase in s
    /// * `yellow_time` - The duration of a yellow phase in s
    /// * `queue` - Counts the vehicles queueing on a road toward the crossing
    pub fn step(&mut self, seconds: f64, green_time: f64, yellow_time: f64, mut queue: impl FnMut(RoadId) -> usize) {
        if self.approaches.is_empty() {
            return;
        }
        let green_time = green_time.max(MIN_PHASE_TIME);
        let yellow_time = yellow_time.max(MIN_PHASE_TIME);
        self.clock += seconds;

        loop {
            match self.phase {
                LightState::Green => {
                    let current = queue(self.approaches[self.favoured].road);
                    if self.clock <= green_time && current > 0 {
                        return;
                    }
                    let maximum = self.approaches.iter().map(|a| queue(a.road)).max().unwrap_or(0);
                    if current == maximum {
                        if current > 0 {
                            self.clock -= 1.0;
                        }
                        return;
                    }
                    self.approaches[self.favoured].state = LightState::Yellow;
                    self.phase = LightState::Yellow;
                    self.clock = (self.clock - green_time).max(0.0);
                }
                _ => {
                    if self.clock <= yellow_time {
                        return;
                    }
                    let favoured = self.favoured;
                    let queues: Vec<_> = self.approaches.iter().map(|a| queue(a.road)).collect();
                    let next = queues
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != favoured)
                        .fold(None, |best: Option<(usize, usize)>, (i, q)| match best {
                            Some((_, max)) if max >= *q => best,
                            _ => Some((i, *q)),
                        })
                        .map(|(i, _)| i)
                        .unwrap_or(favoured);
                    debug!("light phase switches to approach {} with queue {}", next, queues[next]);
                    self.favoured = next;
                    for (i, approach) in self.approaches.iter_mut().enumerate() {
                        approach.state = if i == next {
                            LightState::Green
                        } else {
                            LightState::Red
                        };
                    }
                    self.phase = LightState::Green;
                    self.clock -= yellow_time;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::HashMap;

    fn system(roads: usize) -> (TrafficLightSystem, Vec<RoadId>, Vec<TrafficLightId>) {
        let mut road_ids = SlotMap::<RoadId, ()>::with_key();
        let mut light_ids = SlotMap::<TrafficLightId, ()>::with_key();
        let mut system = TrafficLightSystem::new();
        let roads: Vec<_> = (0..roads).map(|_| road_ids.insert(())).collect();
        let mut lights = vec![];
        for road in &roads {
            for _ in 0..3 {
                let light = light_ids.insert(());
                system.add_light(*road, light);
                lights.push(light);
            }
        }
        (system, roads, lights)
    }

    #[test]
    fn starts_yellow_with_all_lights_red() {
        let (system, roads, _) = system(4);
        assert_eq!(system.phase(), LightState::Yellow);
        assert_eq!(system.favoured(), Some(roads[0]));
        assert!(system.light_states().all(|(_, state)| state == LightState::Red));
        assert_eq!(system.light_states().count(), 12);
    }

    #[test]
    fn busiest_approach_gets_green() {
        let (mut system, roads, _) = system(4);
        let mut queues: HashMap<RoadId, usize> = roads.iter().map(|r| (*r, 0)).collect();

        // The first yellow phase hands green to the first other approach
        system.step(3.5, 9.0, 3.0, |road| queues[&road]);
        assert_eq!(system.phase(), LightState::Green);
        assert_eq!(system.favoured(), Some(roads[1]));
        assert_eq!(system.state_of(roads[1]), Some(LightState::Green));
        assert_eq!(system.state_of(roads[0]), Some(LightState::Red));

        // Ten vehicles queue on the last approach, while the favoured one is empty
        queues.insert(roads[3], 10);
        system.step(0.1, 9.0, 3.0, |road| queues[&road]);
        assert_eq!(system.phase(), LightState::Yellow);
        assert_eq!(system.state_of(roads[1]), Some(LightState::Yellow));

        // Within one yellow cycle the queued approach is green
        for _ in 0..31 {
            system.step(0.1, 9.0, 3.0, |road| queues[&road]);
        }
        assert_eq!(system.phase(), LightState::Green);
        assert_eq!(system.favoured(), Some(roads[3]));
        assert_eq!(system.state_of(roads[3]), Some(LightState::Green));
        assert_eq!(system.state_of(roads[1]), Some(LightState::Red));
    }

    #[test]
    fn green_is_extended_while_the_queue_is_longest() {
        let (mut system, roads, _) = system(2);
        let mut queues: HashMap<RoadId, usize> = roads.iter().map(|r| (*r, 0)).collect();
        system.step(3.5, 9.0, 3.0, |road| queues[&road]);
        assert_eq!(system.favoured(), Some(roads[1]));

        queues.insert(roads[1], 5);
        queues.insert(roads[0], 2);
        for _ in 0..100 {
            system.step(1.0, 9.0, 3.0, |road| queues[&road]);
        }
        assert_eq!(system.phase(), LightState::Green);
        assert_eq!(system.favoured(), Some(roads[1]));
    }

    #[test]
    fn long_steps_run_several_phases() {
        let (mut system, roads, _) = system(3);
        let queues: HashMap<RoadId, usize> = [(roads[0], 1), (roads[1], 2), (roads[2], 3)].into_iter().collect();
        system.step(3.5, 9.0, 3.0, |road| queues[&road]);
        assert_eq!(system.favoured(), Some(roads[2]));
        // Green on the busiest approach holds however long the step
        system.step(100.0, 9.0, 3.0, |road| queues[&road]);
        assert_eq!(system.favoured(), Some(roads[2]));
        assert_eq!(system.phase(), LightState::Green);
    }
}
