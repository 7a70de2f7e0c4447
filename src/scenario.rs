//! The built-in road map.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::math::{Bezier, Point2d};
use crate::network::{CrossingData, Network, RoadConnection, RoadData, RoadLaneIndex, SpeedTable};
use crate::render::Colour;
use crate::RoadId;

const KMH: f64 = 1.0 / 3.6;

fn p(x: f64, y: f64) -> Point2d {
    Point2d::new(x, y)
}

/// A highway cross section: four lanes each way, the outermost being a shoulder.
pub fn highway() -> RoadData {
    RoadData {
        forward_lanes: 4,
        backward_lanes: 4,
        forward_shoulder: true,
        backward_shoulder: true,
        lane_width: 3.5,
        dash_length: 3.0,
        dash_width: 0.15,
        gap_length: 9.0,
        speeds: SpeedTable {
            bus: 80.0 * KMH,
            car: 120.0 * KMH,
            motorcycle: 120.0 * KMH,
            truck: 80.0 * KMH,
            vehicle: 120.0 * KMH,
        },
    }
}

/// Builds a connection table from `(lane, [(road offset, lane)])` rows.
fn table(rows: &[(usize, &[(usize, usize)])]) -> BTreeMap<usize, Vec<RoadLaneIndex>> {
    rows.iter()
        .map(|(lane, targets)| {
            let targets = targets
                .iter()
                .map(|&(offset, lane)| RoadLaneIndex::new(offset, lane))
                .collect();
            (*lane, targets)
        })
        .collect()
}

/// Four-way crossings: the inner lane turns left, the middle lanes go straight
/// and the outer lane and shoulder turn right.
fn four_way() -> BTreeMap<usize, Vec<RoadLaneIndex>> {
    table(&[
        (0, &[(3, 0), (3, 1), (3, 2)]),
        (1, &[(2, 0), (2, 1), (2, 2)]),
        (2, &[(1, 0), (1, 1), (1, 2)]),
        (3, &[(1, 3)]),
    ])
}

/// T crossing, for the two roads that continue through it.
fn t_through() -> BTreeMap<usize, Vec<RoadLaneIndex>> {
    table(&[
        (0, &[(2, 0), (2, 1), (2, 2)]),
        (1, &[(1, 0), (1, 1)]),
        (2, &[(1, 2)]),
        (3, &[(1, 3)]),
    ])
}

/// T crossing, for the road that ends at it.
fn t_branch() -> BTreeMap<usize, Vec<RoadLaneIndex>> {
    table(&[
        (0, &[(2, 0)]),
        (1, &[(2, 1), (2, 2)]),
        (2, &[(1, 0), (1, 1), (1, 2)]),
        (3, &[(1, 3)]),
    ])
}

/// Builds the default map: a grid of highways with four-way crossings, joined on the
/// west side by a winding road with two T crossings, plus a pair of buildings.
pub fn default_map() -> Result<Network> {
    let data = highway();
    let mut network = Network::new();
    let straight = |network: &mut Network, from: Point2d, to: Point2d| -> Result<RoadId> {
        network.add_road(&data, vec![Bezier::linear(from, to)?])
    };

    let mut roads = vec![];
    for y in [-500.0, 500.0] {
        roads.push(straight(&mut network, p(-1450.0, y), p(-550.0, y))?);
        roads.push(straight(&mut network, p(-450.0, y), p(450.0, y))?);
        roads.push(straight(&mut network, p(550.0, y), p(1500.0, y))?);
    }
    for x in [-500.0, 500.0] {
        roads.push(straight(&mut network, p(x, -1500.0), p(x, -550.0))?);
        roads.push(straight(&mut network, p(x, -450.0), p(x, 450.0))?);
        roads.push(straight(&mut network, p(x, 550.0), p(x, 1500.0))?);
    }

    roads.push(network.add_road(
        &data,
        vec![
            Bezier::cubic(p(-3500.0, -2500.0), p(-3000.0, -2500.0), p(-2500.0, -2000.0), p(-2000.0, -2000.0))?,
            Bezier::circular(p(-2000.0, -2000.0), p(-2000.0, -1500.0), p(-1500.0, -1500.0))?,
            Bezier::linear(p(-1500.0, -1500.0), p(-1500.0, -550.0))?,
        ],
    )?);
    roads.push(network.add_road(&data, vec![Bezier::linear(p(-1500.0, -450.0), p(-1500.0, 450.0))?])?);
    roads.push(network.add_road(
        &data,
        vec![
            Bezier::linear(p(-1500.0, 550.0), p(-1500.0, 1500.0))?,
            Bezier::circular(p(-1500.0, 1500.0), p(-2000.0, 1500.0), p(-2000.0, 2000.0))?,
            Bezier::quadratic(p(-2000.0, 2000.0), p(-2500.0, 2000.0), p(-2500.0, 1500.0))?,
        ],
    )?);

    let crossing_data = CrossingData { line_width: 0.15 };
    let grid = [
        ((-500.0, -500.0), [0, 1, 6, 7]),
        ((500.0, -500.0), [1, 2, 9, 10]),
        ((-500.0, 500.0), [3, 4, 7, 8]),
        ((500.0, 500.0), [4, 5, 10, 11]),
    ];
    for ((x, y), indices) in grid {
        let connections: Vec<_> = indices
            .iter()
            .map(|&i| RoadConnection::new(roads[i], four_way()))
            .collect();
        network.add_crossing(p(x, y), crossing_data, &connections)?;
    }

    let junctions = [((-1500.0, -500.0), [12, 0, 13]), ((-1500.0, 500.0), [13, 3, 14])];
    for ((x, y), [first, second, branch]) in junctions {
        network.add_crossing(
            p(x, y),
            crossing_data,
            &[
                RoadConnection::new(roads[first], t_through()),
                RoadConnection::new(roads[second], t_through()),
                RoadConnection::new(roads[branch], t_branch()),
            ],
        )?;
    }

    network.add_building(
        Colour::BEIGE,
        vec![p(-450.0, -300.0), p(-400.0, -300.0), p(-425.0, -100.0), p(-450.0, -100.0)],
    )?;
    network.add_building(
        Colour::CHOCOLATE,
        vec![
            p(-450.0, -50.0),
            p(-400.0, -50.0),
            p(-400.0, 0.0),
            p(-425.0, 0.0),
            p(-425.0, -25.0),
            p(-450.0, -25.0),
        ],
    )?;

    Ok(network)
}
