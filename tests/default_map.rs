//! Tests that run the built-in map with traffic.

use std::time::{Duration, Instant};

use traffic_microsim::{
    math::Point2d, scenario, Canvas, Colour, Command, Comparison, LaneKind, LightState, Overlays, Parameters, Simulation,
    SimulationRunner, Termination, TerminationStatistic,
};

fn busy() -> Simulation {
    let parameters = Parameters {
        spawn_mean: 5.0,
        spawn_std_dev: 1.0,
        ..Default::default()
    };
    Simulation::new(scenario::default_map().unwrap(), parameters, Some(42))
}

/// Checks that every vehicle is listed on exactly its own lane, in order.
fn assert_lanes_consistent(sim: &Simulation) {
    let network = sim.network();
    let mut listed = 0;
    for lane in network.lanes().values() {
        let ids = lane.vehicles();
        listed += ids.len();
        for id in ids {
            let vehicle = sim.vehicle(*id).expect("listed vehicle exists");
            assert_eq!(vehicle.lane(), lane.id());
        }
        for pair in ids.windows(2) {
            let a = sim.vehicle(pair[0]).unwrap().time_index();
            let b = sim.vehicle(pair[1]).unwrap().time_index();
            assert!(a <= b, "lane vehicles out of order");
        }
    }
    assert_eq!(listed, sim.vehicles().len());
}

#[test]
fn traffic_flows_through_the_map() {
    let mut sim = busy();
    for _ in 0..600 {
        sim.step(0.1);
        assert_lanes_consistent(&sim);
    }

    let stats = sim.statistics();
    assert_eq!(stats.step_count, 600);
    assert!((stats.time - 60.0).abs() < 1e-6);
    assert!(stats.total_vehicle_count > 0);
    assert_eq!(stats.vehicle_count, sim.vehicles().len());
    assert_eq!(
        stats.total_vehicle_count,
        stats.vehicle_count as u64 + stats.destination_reached + stats.destination_missed
    );
    assert!(stats.total_distance > 0.0);
    assert!((0.0..=1.0).contains(&stats.moving_fraction));
    assert!((0.0..=1.0).contains(&stats.mean_moving_fraction));

    for vehicle in sim.vehicles().values() {
        assert!(vehicle.speed() >= 0.0);
        assert!(vehicle.speed() <= vehicle.model().top_speed + 1e-9);
        assert!(vehicle.moving_time() <= vehicle.total_time() + 1e-9);
    }
}

#[test]
fn crossings_show_at_most_one_green_road() {
    let mut sim = busy();
    for _ in 0..300 {
        sim.step(0.1);
        let network = sim.network();
        for crossing in network.crossings().values() {
            let green = crossing
                .roads()
                .iter()
                .filter(|road| crossing.lights().state_of(**road) == Some(LightState::Green))
                .count();
            assert!(green <= 1);
        }
    }
}

#[test]
fn vehicles_on_connectors_belong_to_a_crossing() {
    let mut sim = busy();
    for _ in 0..300 {
        sim.step(0.1);
    }
    for vehicle in sim.vehicles().values() {
        let lane = sim.network().lane(vehicle.lane());
        if let LaneKind::Crossing(_) = lane.kind() {
            assert!(lane.road().is_none());
            assert_eq!(lane.next().len(), 1);
        }
    }
}

#[cfg(feature = "serde")]
#[test]
fn saved_simulations_restore() {
    let mut sim = busy();
    for _ in 0..200 {
        sim.step(0.1);
    }
    let json = sim.to_json().unwrap();
    let mut restored = Simulation::from_json(&json).unwrap();

    assert_eq!(restored.statistics(), sim.statistics());
    assert_eq!(restored.vehicles().len(), sim.vehicles().len());
    assert_eq!(restored.spawn_lanes(), sim.spawn_lanes());
    assert_eq!(restored.unspawn_lanes(), sim.unspawn_lanes());
    assert_eq!(restored.factory().vehicle_set(), sim.factory().vehicle_set());
    for (id, vehicle) in sim.vehicles() {
        let other = restored.vehicle(id).unwrap();
        assert_eq!(other.serial(), vehicle.serial());
        assert_eq!(other.lane(), vehicle.lane());
        assert_eq!(other.time_index(), vehicle.time_index());
    }
    assert_lanes_consistent(&restored);

    restored.step(0.1);
    assert_eq!(restored.statistics().step_count, 201);
    assert_lanes_consistent(&restored);
}

#[derive(Debug, PartialEq)]
enum Op {
    Polygon(Colour),
    FillPath,
    Stroke(Colour),
    Circle,
    Line(Colour),
    Text,
}

#[derive(Default)]
struct Recorder {
    ops: Vec<Op>,
}

impl Canvas for Recorder {
    fn fill_polygon(&mut self, _: &[Point2d], colour: Colour) {
        self.ops.push(Op::Polygon(colour));
    }

    fn fill_path(&mut self, _: &[[Point2d; 4]], _: Colour) {
        self.ops.push(Op::FillPath);
    }

    fn stroke_path(&mut self, _: &[[Point2d; 4]], _: f64, colour: Colour, _: Option<(f64, f64)>) {
        self.ops.push(Op::Stroke(colour));
    }

    fn fill_circle(&mut self, _: Point2d, _: f64, _: Colour) {
        self.ops.push(Op::Circle);
    }

    fn line(&mut self, _: Point2d, _: Point2d, _: f64, colour: Colour) {
        self.ops.push(Op::Line(colour));
    }

    fn text(&mut self, _: Point2d, _: &str, _: Colour) {
        self.ops.push(Op::Text);
    }
}

#[test]
fn frames_paint_back_to_front() {
    let mut sim = busy();
    for _ in 0..50 {
        sim.step(0.1);
    }
    let selected = sim.vehicles().keys().next();
    assert!(selected.is_some());
    sim.select(selected);

    let mut canvas = Recorder::default();
    let overlays = Overlays {
        ids: true,
        names: false,
        lane_change_curves: false,
        destination: true,
    };
    sim.frame().paint(&mut canvas, &overlays);
    let ops = canvas.ops;

    assert_eq!(ops[0], Op::Polygon(Colour::BEIGE));
    assert_eq!(ops[1], Op::Polygon(Colour::CHOCOLATE));
    let roads: Vec<_> = ops.iter().filter(|op| **op == Op::Stroke(Colour::GREY)).collect();
    assert_eq!(roads.len(), sim.network().road_count());

    let last = |f: &dyn Fn(&Op) -> bool| ops.iter().rposition(|op| f(op)).unwrap();
    let first = |f: &dyn Fn(&Op) -> bool| ops.iter().position(|op| f(op)).unwrap();
    assert!(last(&|op| *op == Op::Stroke(Colour::GREY)) < first(&|op| *op == Op::FillPath));
    assert!(last(&|op| *op == Op::FillPath) < first(&|op| *op == Op::Circle));
    assert!(last(&|op| *op == Op::Circle) < first(&|op| *op == Op::Text));

    let circles = ops.iter().filter(|op| **op == Op::Circle).count();
    assert_eq!(circles, sim.network().lights().len());
    let labels = ops.iter().filter(|op| **op == Op::Text).count();
    assert_eq!(labels, sim.vehicles().len());
    assert_eq!(ops.last(), Some(&Op::Line(Colour::RED)));
}

#[test]
fn runner_steps_until_terminated() {
    let parameters = Parameters {
        speed_factor: 10.0,
        termination: Termination {
            statistic: TerminationStatistic::Time,
            comparison: Comparison::EqualOrGreater,
            threshold: 1.0,
        },
        ..Default::default()
    };
    let simulation = Simulation::new(scenario::default_map().unwrap(), parameters, Some(5));
    let runner = SimulationRunner::spawn(simulation);
    runner.send(Command::Start);

    let deadline = Instant::now() + Duration::from_secs(20);
    while !runner.snapshot().terminated {
        assert!(Instant::now() < deadline, "simulation did not terminate");
        std::thread::sleep(Duration::from_millis(10));
    }
    let snapshot = runner.snapshot();
    assert!(!snapshot.running);
    assert!(snapshot.statistics.time >= 1.0);

    let simulation = runner.join().unwrap();
    assert!(simulation.is_terminated());
    assert_eq!(simulation.statistics().step_count, snapshot.statistics.step_count);
}
