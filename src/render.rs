//! Draw points for a renderer.
//!
//! Everything is converted into screen coordinates by a [ViewTransform]. The static parts of
//! the network form a [Scene], which is rebuilt only when the view changes; a [Frame] adds
//! the moving parts on top and paints the whole onto a [Canvas].

use std::sync::Arc;

use crate::config::View;
use crate::light::LightState;
use crate::math::{left_normal, right_normal, unit, Point2d, Vector2d};
use crate::network::{LaneDirection, LaneType, Network};
use crate::{VehicleId, VehicleSet};
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::new(0, 0, 0);
    pub const WHITE: Colour = Colour::new(255, 255, 255);
    pub const GREY: Colour = Colour::new(128, 128, 128);
    pub const DARK_GREY: Colour = Colour::new(96, 96, 96);
    pub const RED: Colour = Colour::new(255, 0, 0);
    pub const YELLOW: Colour = Colour::new(255, 255, 0);
    pub const GREEN: Colour = Colour::new(0, 128, 0);
    pub const BEIGE: Colour = Colour::new(245, 245, 220);
    pub const CHOCOLATE: Colour = Colour::new(210, 105, 30);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Picks a random colour.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.gen(), rng.gen(), rng.gen())
    }
}

impl From<LightState> for Colour {
    fn from(state: LightState) -> Self {
        match state {
            LightState::Red => Colour::RED,
            LightState::Yellow => Colour::YELLOW,
            LightState::Green => Colour::GREEN,
        }
    }
}

/// Maps world coordinates in m onto a viewport in pixels.
///
/// The view size fits the shorter side of the viewport, and the y axis points down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    centre: Point2d,
    scale: f64,
    width: f64,
    height: f64,
}

impl ViewTransform {
    pub fn new(view: &View, width: f64, height: f64) -> Self {
        Self {
            centre: view.centre,
            scale: width.min(height) / view.size,
            width,
            height,
        }
    }

    /// Pixels per m.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Converts a world point to a screen point.
    pub fn apply(&self, point: Point2d) -> Point2d {
        let offset = (point - self.centre) * self.scale;
        Point2d::new(0.5 * self.width + offset.x, 0.5 * self.height + offset.y)
    }

    /// Converts a screen point back to a world point.
    pub fn invert(&self, point: Point2d) -> Point2d {
        let offset = Vector2d::new(point.x - 0.5 * self.width, point.y - 0.5 * self.height);
        self.centre + offset / self.scale
    }

    /// Converts a length in m to pixels.
    pub fn length(&self, length: f64) -> f64 {
        length * self.scale
    }

    fn curve(&self, points: [Point2d; 4]) -> [Point2d; 4] {
        points.map(|p| self.apply(p))
    }
}

/// A path of cubic bezier pieces, in screen coordinates.
pub type Path = Vec<[Point2d; 4]>;

/// A surface that frames are painted onto, in screen coordinates.
pub trait Canvas {
    fn fill_polygon(&mut self, points: &[Point2d], colour: Colour);

    /// Fills the area enclosed by a closed path.
    fn fill_path(&mut self, path: &[[Point2d; 4]], colour: Colour);

    /// Strokes a path, optionally dashed with the given dash and gap lengths.
    fn stroke_path(&mut self, path: &[[Point2d; 4]], width: f64, colour: Colour, dash: Option<(f64, f64)>);

    fn fill_circle(&mut self, centre: Point2d, radius: f64, colour: Colour);

    fn line(&mut self, from: Point2d, to: Point2d, width: f64, colour: Colour);

    fn text(&mut self, at: Point2d, text: &str, colour: Colour);
}

#[derive(Clone, Debug)]
pub struct BuildingShape {
    pub colour: Colour,
    pub points: Vec<Point2d>,
}

/// The surface of a road, drawn as a wide stroke along its centre line.
#[derive(Clone, Debug)]
pub struct RoadShape {
    pub centre: Path,
    pub width: f64,
}

/// A lane marking along the right hand edge of a lane.
#[derive(Clone, Debug)]
pub struct MarkingShape {
    pub edge: [Point2d; 4],
    pub width: f64,
    /// The dash and gap lengths, if the marking is dashed.
    pub dash: Option<(f64, f64)>,
}

#[derive(Clone, Debug)]
pub struct CrossingShape {
    pub outline: Path,
    pub stop_lines: Vec<[Point2d; 2]>,
    pub line_width: f64,
}

/// The draw points of the parts of a network that do not move.
#[derive(Clone, Debug)]
pub struct Scene {
    pub transform: ViewTransform,
    pub buildings: Vec<BuildingShape>,
    pub roads: Vec<RoadShape>,
    pub markings: Vec<MarkingShape>,
    pub crossings: Vec<CrossingShape>,
}

impl Scene {
    pub fn new(network: &Network, transform: ViewTransform) -> Self {
        let buildings = network
            .buildings()
            .iter()
            .map(|b| BuildingShape {
                colour: b.colour,
                points: b.points.iter().map(|p| transform.apply(*p)).collect(),
            })
            .collect();

        let roads = network
            .roads()
            .values()
            .map(|road| RoadShape {
                centre: road
                    .segments()
                    .iter()
                    .map(|s| transform.curve(s.control_points()))
                    .collect(),
                width: transform.length(road.width()),
            })
            .collect();

        let mut markings = vec![];
        for road in network.roads().values() {
            let data = road.data();
            for lane in road.lanes().filter_map(|id| network.lane(id).road_lane()) {
                for (i, edge) in lane.edges.iter().enumerate() {
                    let dash = lane.gaps.as_ref().and_then(|gaps| gaps.get(i)).map(|gap| {
                        (transform.length(data.dash_length), transform.length(*gap))
                    });
                    markings.push(MarkingShape {
                        edge: transform.curve(edge.control_points()),
                        width: transform.length(data.dash_width),
                        dash,
                    });
                }
            }
            // The centre line between the two directions
            if !road.lanes_in(LaneDirection::Forward).is_empty()
                && !road.lanes_in(LaneDirection::Backward).is_empty()
            {
                for segment in road.segments() {
                    markings.push(MarkingShape {
                        edge: transform.curve(segment.control_points()),
                        width: transform.length(data.dash_width),
                        dash: None,
                    });
                }
            }
        }

        let crossings = network
            .crossings()
            .values()
            .map(|crossing| {
                let stop_lines = crossing
                    .roads()
                    .iter()
                    .flat_map(|id| network.road(*id).toward_lanes(crossing.location()).iter())
                    .map(|id| network.lane(*id))
                    .filter(|lane| lane.lane_type() == LaneType::Normal)
                    .filter_map(|lane| {
                        let dir = unit(lane.last_velocity()).ok()?;
                        let half = 0.5 * lane.width();
                        let end = lane.last_point();
                        Some([
                            transform.apply(end + left_normal(dir) * half),
                            transform.apply(end + right_normal(dir) * half),
                        ])
                    })
                    .collect();
                CrossingShape {
                    outline: crossing.outline().iter().map(|c| transform.curve(*c)).collect(),
                    stop_lines,
                    line_width: transform.length(crossing.data().line_width),
                }
            })
            .collect();

        Self {
            transform,
            buildings,
            roads,
            markings,
            crossings,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LightShape {
    pub centre: Point2d,
    pub radius: f64,
    pub colour: Colour,
}

#[derive(Clone, Debug)]
pub struct VehicleShape {
    pub id: VehicleId,
    pub serial: u64,
    /// The model name.
    pub name: String,
    pub centre: Point2d,
    /// The corners of the vehicle's footprint.
    pub corners: [Point2d; 4],
    pub colour: Colour,
    /// The curve of the lane change in progress.
    pub lane_change: Option<[Point2d; 4]>,
}

/// A complete picture of the simulation at the end of a step.
#[derive(Clone, Debug)]
pub struct Frame {
    pub scene: Arc<Scene>,
    pub lights: Vec<LightShape>,
    pub vehicles: Vec<VehicleShape>,
    /// A line from the selected vehicle to the end of its destination lane.
    pub destination: Option<[Point2d; 2]>,
}

/// Optional extras painted on top of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overlays {
    /// Label vehicles with their serial numbers.
    pub ids: bool,
    /// Label vehicles with their model names.
    pub names: bool,
    pub lane_change_curves: bool,
    /// Draw a line to the selected vehicle's destination.
    pub destination: bool,
}

impl Frame {
    pub fn new(scene: Arc<Scene>, network: &Network, vehicles: &VehicleSet, selected: Option<VehicleId>) -> Self {
        let transform = scene.transform;
        let lights = network
            .lights()
            .values()
            .map(|light| LightShape {
                centre: transform.apply(light.location()),
                radius: transform.length(0.25 * network.lane(light.lane()).width()),
                colour: light.state().into(),
            })
            .collect();

        let shapes = vehicles
            .values()
            .map(|vehicle| {
                let (centre, velocity) = vehicle.position(network.lanes());
                let dir = unit(velocity).unwrap_or(Vector2d::unit_x());
                let along = dir * (0.5 * vehicle.model().length);
                let across = right_normal(dir) * (0.5 * vehicle.model().width);
                let corners = [
                    centre + along + across,
                    centre + along - across,
                    centre - along - across,
                    centre - along + across,
                ];
                VehicleShape {
                    id: vehicle.id(),
                    serial: vehicle.serial(),
                    name: vehicle.model().name.clone(),
                    centre: transform.apply(centre),
                    corners: corners.map(|p| transform.apply(p)),
                    colour: vehicle.colour(),
                    lane_change: vehicle
                        .connection()
                        .map(|c| transform.curve(c.curve().control_points())),
                }
            })
            .collect();

        let destination = selected.and_then(|id| vehicles.get(id)).map(|vehicle| {
            let (centre, _) = vehicle.position(network.lanes());
            let end = network.lane(vehicle.destination()).last_point();
            [transform.apply(centre), transform.apply(end)]
        });

        Self {
            scene,
            lights,
            vehicles: shapes,
            destination,
        }
    }

    /// Paints the frame, back to front.
    pub fn paint(&self, canvas: &mut dyn Canvas, overlays: &Overlays) {
        let scene = &self.scene;
        for building in &scene.buildings {
            canvas.fill_polygon(&building.points, building.colour);
        }
        for road in &scene.roads {
            canvas.stroke_path(&road.centre, road.width, Colour::GREY, None);
        }
        for marking in &scene.markings {
            canvas.stroke_path(&[marking.edge], marking.width, Colour::WHITE, marking.dash);
        }
        for crossing in &scene.crossings {
            canvas.fill_path(&crossing.outline, Colour::DARK_GREY);
            for [from, to] in &crossing.stop_lines {
                canvas.line(*from, *to, crossing.line_width, Colour::WHITE);
            }
        }
        for vehicle in &self.vehicles {
            canvas.fill_polygon(&vehicle.corners, vehicle.colour);
        }
        for light in &self.lights {
            canvas.fill_circle(light.centre, light.radius, light.colour);
        }

        for vehicle in &self.vehicles {
            if overlays.lane_change_curves {
                if let Some(curve) = vehicle.lane_change {
                    canvas.stroke_path(&[curve], 1.0, Colour::RED, None);
                }
            }
            let label = match (overlays.ids, overlays.names) {
                (true, true) => format!("{} {}", vehicle.serial, vehicle.name),
                (true, false) => vehicle.serial.to_string(),
                (false, true) => vehicle.name.clone(),
                (false, false) => continue,
            };
            canvas.text(vehicle.centre, &label, Colour::BLACK);
        }
        if overlays.destination {
            if let Some([from, to]) = self.destination {
                canvas.line(from, to, 1.0, Colour::RED);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn transform_fits_the_shorter_side() {
        let view = View {
            centre: Point2d::new(100.0, 50.0),
            size: 400.0,
            zoom_factor: 2.0,
        };
        let transform = ViewTransform::new(&view, 800.0, 600.0);
        assert_approx_eq!(transform.scale(), 1.5);
        let centre = transform.apply(view.centre);
        assert_approx_eq!(centre.x, 400.0);
        assert_approx_eq!(centre.y, 300.0);
        let corner = transform.apply(Point2d::new(300.0, 250.0));
        assert_approx_eq!(corner.x, 700.0);
        assert_approx_eq!(corner.y, 600.0);
        let back = transform.invert(corner);
        assert_approx_eq!(back.x, 300.0);
        assert_approx_eq!(back.y, 250.0);
    }

    #[test]
    fn light_colours() {
        assert_eq!(Colour::from(LightState::Red), Colour::RED);
        assert_eq!(Colour::from(LightState::Green), Colour::GREEN);
    }
}
