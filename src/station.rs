//! The station shared by every tanker and vehicle of a simulation.

use crate::{
    fuel::{Fuel, Inventory},
    pump::PumpPool
};

use thiserror::Error;

use std::time::Duration;

/// Errors that prevent a station from being set up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The station must have at least one pump.
    #[error("a station needs at least one fuel pump")]
    NoPumps,

    /// Tankers must bring some fuel.
    #[error("tankers carry no fuel")]
    NoFuel,

    /// Tankers must move fuel in non-empty chunks.
    #[error("tanker transfer chunk must be greater than zero")]
    NoChunk
}

/// Simulated durations.
///
/// Every duration is counted in _ticks_, the length of one simulated
/// second; vehicle patience is counted in ticks too. Shrinking the tick
/// speeds the whole simulation up without changing any outcome that does
/// not depend on thread scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Length of one simulated second.
    pub tick: Duration,
    /// Time between a vehicle getting a pump and asking for fuel.
    pub approach: u32,
    /// Time vehicles have at the station before tankers start unloading.
    pub head_start: u32,
    /// Time a tanker spends unloading after each delivery.
    pub unload: u32
}

impl Timing {
    /// Timing with no delays at all; only patience takes time.
    pub fn instant(tick: Duration) -> Self {
        Self { tick, approach: 0, head_start: 0, unload: 0 }
    }

    /// Converts a number of ticks to a duration.
    pub fn ticks(&self, n: u32) -> Duration {
        self.tick * n
    }
}

/// Real-time timing: one tick per second, one second to approach the pump,
/// two seconds of head start and two seconds of unloading per delivery.
impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            approach: 1,
            head_start: 2,
            unload: 2
        }
    }
}

/// Shared state of one simulation: the fuel and the pumps.
pub struct Station {
    /// The fuel inventory.
    pub inventory: Inventory,
    /// The pumps.
    pub pumps: PumpPool,
    /// Simulated durations.
    pub timing: Timing
}

impl Station {
    /// Constructs a new `Station` with `pumps` pumps and `load` liters
    /// still inside the tankers.
    ///
    /// # Errors
    ///
    /// Fails if `pumps` or `load` is zero.
    pub fn new(pumps: usize, load: Fuel, timing: Timing) -> Result<Self, SetupError> {
        if load == 0 {
            return Err(SetupError::NoFuel);
        }

        Ok(Self {
            inventory: Inventory::new(load),
            pumps: PumpPool::new(pumps).ok_or(SetupError::NoPumps)?,
            timing
        })
    }
}
