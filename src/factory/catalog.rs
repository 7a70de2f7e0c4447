//! The built in vehicle sets.

use once_cell::sync::Lazy;

use crate::vehicle::{VehicleKind, VehicleModel};

/// The models of one kind of vehicle that a factory can produce.
#[derive(Clone, Debug)]
pub struct ProductionItem {
    pub kind: VehicleKind,
    pub models: Vec<VehicleModel>,
}

/// A named collection of production items.
struct VehicleSet {
    name: &'static str,
    items: Vec<ProductionItem>,
}

static VEHICLE_SETS: Lazy<Vec<VehicleSet>> = Lazy::new(|| vec![default_set(), porsche_993_set()]);

/// Looks up a vehicle set by name.
pub fn vehicle_set(name: &str) -> Option<&'static [ProductionItem]> {
    VEHICLE_SETS
        .iter()
        .find(|set| set.name == name)
        .map(|set| set.items.as_slice())
}

/// The names of all vehicle sets.
pub fn vehicle_set_names() -> impl Iterator<Item = &'static str> {
    VEHICLE_SETS.iter().map(|set| set.name)
}

fn default_set() -> VehicleSet {
    use VehicleKind::*;
    VehicleSet {
        name: "Default",
        items: vec![
            ProductionItem {
                kind: Bus,
                models: vec![
                    VehicleModel::new("Van Hool AGG300", Bus, (2.550, 24.785), 25.0, 2.0, 8.0),
                    VehicleModel::new("Van Hool AG300", Bus, (2.550, 18.390), 25.0, 2.0, 8.0),
                    VehicleModel::new("Van Hool A330", Bus, (2.550, 11.995), 25.0, 2.0, 8.0),
                ],
            },
            ProductionItem {
                kind: Car,
                models: vec![
                    VehicleModel::new("Porsche 911 Turbo S (997)", Car, (1.831, 4.435), 87.5, 8.6, 10.0),
                    VehicleModel::new("Porsche Panamera Turbo (970)", Car, (1.931, 4.970), 84.2, 8.1, 10.0),
                    VehicleModel::new("Porsche Cayenne Turbo (958)", Car, (1.938, 4.846), 77.2, 5.9, 10.0),
                    VehicleModel::new("Porsche Cayman R (987)", Car, (1.801, 4.376), 78.3, 5.6, 10.0),
                    VehicleModel::new("Porsche Boxster Spyder (987)", Car, (1.816, 4.369), 74.2, 5.4, 10.0),
                    VehicleModel::new("Mini Cooper Saloon", Car, (1.35, 3.05), 38.0, 2.0, 6.0),
                    VehicleModel::new("Ford Fiesta Mark V", Car, (1.685, 3.924), 44.4, 2.8, 8.0),
                ],
            },
            ProductionItem {
                kind: Motorcycle,
                models: vec![VehicleModel::new("Yamaha YZF-R6", Motorcycle, (0.701, 2.040), 71.1, 9.6, 10.0)],
            },
            ProductionItem {
                kind: Truck,
                models: vec![VehicleModel::new("Unimog 435", Truck, (2.300, 5.500), 23.6, 2.0, 10.0)],
            },
        ],
    }
}

fn porsche_993_set() -> VehicleSet {
    use VehicleKind::Car;
    // 0-100 km/h times converted to mean accelerations
    let kmh = |v: f64| v / 3.6;
    VehicleSet {
        name: "Porsche 911 (993)",
        items: vec![ProductionItem {
            kind: Car,
            models: vec![
                VehicleModel::new("911 (993) Carrera 2", Car, (1.651, 4.275), kmh(270.0), kmh(100.0) / 5.6, 10.0),
                VehicleModel::new("911 (993) Carrera S", Car, (1.735, 4.260), kmh(270.0), kmh(100.0) / 5.7, 10.0),
                VehicleModel::new("911 (993) GT 2", Car, (1.651, 4.275), kmh(296.0), kmh(96.0) / 4.0, 10.0),
                VehicleModel::new("911 (993) Turbo", Car, (1.651, 4.275), kmh(290.0), kmh(100.0) / 4.5, 10.0),
                VehicleModel::new("911 (993) Turbo S", Car, (1.735, 4.260), kmh(303.0), kmh(96.0) / 3.7, 10.0),
            ],
        }],
    }
}
