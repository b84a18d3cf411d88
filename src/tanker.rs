//! Tankers, the producers of the simulation.

use crate::{
    fuel::{Fuel, Inventory},
    station::{SetupError, Station}
};

use tracing::{debug, info};

use std::thread;

/// A tanker unloading its fuel into a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tanker {
    /// 1-based tanker number.
    pub id: usize,
    /// Fuel the tanker arrived with.
    pub load: Fuel,
    /// Most fuel moved in a single delivery.
    pub chunk: Fuel,
    /// Fuel still inside the tanker.
    pub remaining: Fuel,
    /// Number of deliveries made so far.
    pub deliveries: usize
}

impl Tanker {
    /// Constructs a new full `Tanker`.
    ///
    /// # Errors
    ///
    /// Fails if `load` or `chunk` is zero.
    pub fn new(id: usize, load: Fuel, chunk: Fuel) -> Result<Self, SetupError> {
        if load == 0 {
            return Err(SetupError::NoFuel);
        } else if chunk == 0 {
            return Err(SetupError::NoChunk);
        }

        Ok(Self { id, load, chunk, remaining: load, deliveries: 0 })
    }

    /// Tests whether the tanker has nothing left to deliver.
    pub fn drained(&self) -> bool {
        self.remaining == 0
    }

    /// Makes a single delivery of at most [`chunk`](`Tanker::chunk`) liters
    /// into `inventory`.
    ///
    /// Returns the amount delivered, or `None` if the tanker is drained.
    ///
    /// # Panics
    ///
    /// Panics if `inventory` counts less fuel in its tankers than this one
    /// still holds, i.e. if the tanker was not part of its initial load.
    pub fn step(&mut self, inventory: &Inventory) -> Option<Fuel> {
        if self.drained() {
            return None;
        }

        let chunk = self.chunk.min(self.remaining);
        let levels = inventory.deliver(chunk);

        self.remaining -= chunk;
        self.deliveries += 1;

        info!(
            tanker = self.id,
            delivered = chunk,
            storage = levels.storage,
            remaining = self.remaining,
            "unloaded fuel into the station"
        );

        Some(chunk)
    }

    /// Unloads everything into `station`, pausing for the unloading time
    /// after every delivery with the inventory unlocked.
    pub fn run(mut self, station: &Station) -> Self {
        info!(tanker = self.id, load = self.load, chunk = self.chunk, "starting to unload");

        while self.step(&station.inventory).is_some() {
            thread::sleep(station.timing.ticks(station.timing.unload));
        }

        debug!(tanker = self.id, deliveries = self.deliveries, "tanker is empty");
        self
    }
}
