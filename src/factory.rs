//! Stochastic production of vehicles.

use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, Normal};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{Parameters, ProductionFractions, DEFAULT_VEHICLE_SET};
use crate::vehicle::VehicleModel;
pub use catalog::{vehicle_set, vehicle_set_names, ProductionItem};

mod catalog;

/// Produces vehicles at a rate drawn from a normal distribution.
///
/// Fractional vehicles are accumulated between steps in an "order sum", and whole vehicles
/// are released once it exceeds one.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleFactory {
    /// The name of the vehicle set being produced.
    vehicle_set: String,
    /// The production items of the vehicle set.
    #[cfg_attr(feature = "serde", serde(skip))]
    items: &'static [ProductionItem],
    /// The fractional number of vehicles ordered but not yet produced.
    order_sum: f64,
    /// The number of vehicles produced so far.
    production_count: u64,
}

impl Default for VehicleFactory {
    fn default() -> Self {
        Self::new(DEFAULT_VEHICLE_SET)
    }
}

impl VehicleFactory {
    /// Creates a factory for the named vehicle set.
    pub fn new(vehicle_set: &str) -> Self {
        let mut factory = Self {
            vehicle_set: String::new(),
            items: &[],
            order_sum: 0.0,
            production_count: 0,
        };
        factory.load(vehicle_set);
        factory
    }

    /// Switches to another vehicle set and discards any outstanding orders.
    pub fn load(&mut self, vehicle_set: &str) {
        self.items = match catalog::vehicle_set(vehicle_set) {
            Some(items) => items,
            None => {
                warn!("unknown vehicle set `{}`, using `{}`", vehicle_set, DEFAULT_VEHICLE_SET);
                catalog::vehicle_set(DEFAULT_VEHICLE_SET).unwrap_or(&[])
            }
        };
        self.vehicle_set = vehicle_set.into();
        self.order_sum = 0.0;
    }

    /// Restores the production items after deserialization.
    pub(crate) fn repopulate(&mut self) {
        let name = std::mem::take(&mut self.vehicle_set);
        let order_sum = self.order_sum;
        self.load(&name);
        self.order_sum = order_sum;
    }

    /// The number of vehicles produced so far.
    pub fn production_count(&self) -> u64 {
        self.production_count
    }

    /// Issues the next serial number.
    pub(crate) fn register(&mut self) -> u64 {
        self.production_count += 1;
        self.production_count
    }

    /// The name of the vehicle set being produced.
    pub fn vehicle_set(&self) -> &str {
        &self.vehicle_set
    }

    /// Orders vehicles for a step of `seconds`, returning each new vehicle's serial number and model.
    ///
    /// # Parameters
    /// * `seconds` - The simulated duration of the step
    /// * `vehicle_count` - The number of vehicles already in the network
    /// * `capacity` - The number of lanes currently able to take a new vehicle
    /// * `params` - The spawn rate, vehicle cap and production fractions
    /// * `rng` - The source of randomness
    pub fn order<R: Rng + ?Sized>(
        &mut self,
        seconds: f64,
        vehicle_count: usize,
        capacity: usize,
        params: &Parameters,
        rng: &mut R,
    ) -> Vec<(u64, VehicleModel)> {
        debug_assert!(params.spawn_std_dev >= 0.0, "negative spawn standard deviation");
        let mean = params.spawn_mean * seconds;
        let std_dev = (params.spawn_std_dev.max(0.0).powi(2) * seconds.max(0.0)).sqrt();
        self.order_sum += sample_normal(mean, std_dev, rng);

        let amount = self.order_sum.max(0.0).floor();
        self.order_sum -= amount;
        let amount = (amount as usize)
            .min(params.vehicle_cap.saturating_sub(vehicle_count))
            .min(capacity);
        if amount > 0 {
            debug!("producing {} vehicles", amount);
        }

        let mut vehicles = Vec::with_capacity(amount);
        for _ in 0..amount {
            if let Some(model) = self.choose_model(&params.fractions, rng) {
                vehicles.push((self.register(), model));
            }
        }
        vehicles
    }

    /// Picks a kind of vehicle weighted by the production fractions, then one of its models.
    fn choose_model<R: Rng + ?Sized>(&self, fractions: &ProductionFractions, rng: &mut R) -> Option<VehicleModel> {
        let total: u64 = self.items.iter().map(|item| fractions.get(item.kind) as u64).sum();
        let item = if total == 0 {
            self.items.last()?
        } else {
            let mut draw = rng.gen_range(0..total) as i64;
            self.items
                .iter()
                .find(|item| {
                    draw -= fractions.get(item.kind) as i64;
                    draw < 0
                })
                .or_else(|| self.items.last())?
        };
        if item.models.is_empty() {
            return None;
        }
        Some(item.models[rng.gen_range(0..item.models.len())].clone())
    }
}

/// Draws from a normal distribution. A zero standard deviation yields the mean.
pub(crate) fn sample_normal<R: Rng + ?Sized>(mean: f64, std_dev: f64, rng: &mut R) -> f64 {
    if std_dev <= 0.0 {
        return mean;
    }
    match Normal::new(mean, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::VehicleKind;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::from_seed(*b"vehicle factory test seed 123456")
    }

    #[test]
    fn zero_variance_produces_the_mean() {
        let params = Parameters {
            spawn_mean: 10.0,
            spawn_std_dev: 0.0,
            ..Default::default()
        };
        let mut factory = VehicleFactory::default();
        let mut rng = rng();
        let mut total = 0;
        for step in 1..=20 {
            total += factory.order(1.0, 0, usize::MAX, &params, &mut rng).len();
            assert_eq!(total, 10 * step);
        }
        assert_eq!(factory.production_count(), 200);
    }

    #[test]
    fn fractional_orders_accumulate() {
        let params = Parameters {
            spawn_mean: 1.0,
            spawn_std_dev: 0.0,
            ..Default::default()
        };
        let mut factory = VehicleFactory::default();
        let mut rng = rng();
        let counts: Vec<_> = (0..8)
            .map(|_| factory.order(0.25, 0, 100, &params, &mut rng).len())
            .collect();
        assert_eq!(counts, vec![0, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn orders_are_clamped() {
        let params = Parameters {
            spawn_mean: 10.0,
            spawn_std_dev: 0.0,
            vehicle_cap: 12,
            ..Default::default()
        };
        let mut factory = VehicleFactory::default();
        let mut rng = rng();
        assert_eq!(factory.order(1.0, 0, 3, &params, &mut rng).len(), 3);
        assert_eq!(factory.order(1.0, 10, 100, &params, &mut rng).len(), 2);
        assert_eq!(factory.order(1.0, 12, 100, &params, &mut rng).len(), 0);
    }

    #[test]
    fn fractions_select_the_kind() {
        let mut params = Parameters {
            spawn_mean: 50.0,
            spawn_std_dev: 0.0,
            ..Default::default()
        };
        params.fractions = ProductionFractions {
            bus: 0,
            car: 0,
            motorcycle: 0,
            truck: 3,
        };
        let mut factory = VehicleFactory::default();
        let vehicles = factory.order(1.0, 0, 100, &params, &mut rng());
        assert_eq!(vehicles.len(), 50);
        assert!(vehicles.iter().all(|(_, m)| m.kind == VehicleKind::Truck));
        let numbers: Vec<_> = vehicles.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_sets_fall_back_to_the_default() {
        let factory = VehicleFactory::new("Trabant");
        assert_eq!(factory.items.len(), 4);
        let mut factory = VehicleFactory::default();
        factory.load("Porsche 911 (993)");
        assert_eq!(factory.items.len(), 1);
    }
}
