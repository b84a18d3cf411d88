//! Vehicles, the consumers of the simulation.
//!
//! A vehicle takes a pump, then asks the inventory for its whole demand. If
//! the demand can never be met it leaves right away; otherwise it waits for
//! deliveries for as long as its [`Patience`] allows, and leaves with either
//! all the fuel it asked for or none of it.

use crate::{
    fuel::Fuel,
    station::Station
};

use serde::Deserialize;

use tracing::{debug, info};

use std::{
    fmt, thread,
    time::{Duration, Instant}
};

/// Type of vehicle identifiers (1-based arrival numbers).
pub type VehicleId = usize;

/// Kind of vehicle; only used for labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Auto,
    Truck,
    Van
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Auto  => f.pad("auto"),
            Category::Truck => f.pad("truck"),
            Category::Van   => f.pad("van")
        }
    }
}

/// How long a vehicle is willing to wait for fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patience {
    /// Wait for as long as fuel may still come.
    Forever,
    /// Do not wait at all.
    Never,
    /// Wait at most this many ticks after arriving.
    Within(u32)
}

/// Converts the configuration encoding of patience: `-1` for
/// [`Forever`](`Patience::Forever`), `0` for [`Never`](`Patience::Never`)
/// and a positive number of seconds for [`Within`](`Patience::Within`).
///
/// Returns the rejected value for anything below `-1` or too large.
impl TryFrom<i64> for Patience {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            -1 => Ok(Patience::Forever),
            0 => Ok(Patience::Never),
            n => u32::try_from(n).map(Patience::Within).map_err(|_| value)
        }
    }
}

impl fmt::Display for Patience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patience::Forever   => write!(f, "forever"),
            Patience::Never     => write!(f, "none"),
            Patience::Within(n) => write!(f, "{n}s")
        }
    }
}

/// How a visit to the station ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// Got all the fuel it asked for.
    Refueled,
    /// Left because its demand could never be met.
    LeftNoFuel,
    /// Left because its patience ran out.
    LeftTimeout
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Refueled    => write!(f, "refueled"),
            Outcome::LeftNoFuel  => write!(f, "left without fuel"),
            Outcome::LeftTimeout => write!(f, "ran out of patience")
        }
    }
}

/// A vehicle about to visit a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vehicle {
    /// Vehicle number.
    pub id: VehicleId,
    /// Kind of vehicle.
    pub category: Category,
    /// Fuel the vehicle needs; it never leaves with less.
    pub fuel_required: Fuel,
    /// How long it is willing to wait for fuel.
    pub patience: Patience
}

/// Record of a finished visit.
#[derive(Debug, Clone, Copy)]
pub struct Visit {
    /// The visiting vehicle.
    pub vehicle: Vehicle,
    /// When the vehicle arrived, before queueing for a pump.
    pub arrival: Instant,
    /// When the vehicle got a pump.
    pub admitted: Instant,
    /// When the vehicle left, still holding its pump.
    pub departure: Instant,
    /// How the visit ended.
    pub outcome: Outcome,
    /// 1-based number of the pump used, if recorded.
    pub pump: Option<usize>,
    /// Whether the vehicle ever blocked waiting for fuel.
    pub waited: bool,
    /// Number of times the vehicle woke up while waiting.
    pub wakeups: usize
}

impl Visit {
    /// Time spent at the station, pump queue included.
    pub fn duration(&self) -> Duration {
        self.departure - self.arrival
    }
}

impl Vehicle {
    /// Visits `station` once, blocking the calling thread until the visit
    /// is over.
    pub fn visit(&self, station: &Station) -> Visit {
        let Self { id, category, fuel_required, patience } = *self;
        let timing = &station.timing;

        let arrival = Instant::now();
        let deadline = match patience {
            Patience::Within(n) => Some(arrival + timing.ticks(n)),
            Patience::Forever | Patience::Never => None
        };

        info!(vehicle = id, %category, fuel_required, %patience, "attempting to get fuel");

        let pump = station.pumps.acquire(id);
        let admitted = Instant::now();

        debug!(vehicle = id, pump = ?pump.number(), "at the pump");
        thread::sleep(timing.ticks(timing.approach));

        let mut stock = station.inventory.lock();
        let mut waited = false;
        let mut wakeups = 0;

        let outcome = if stock.max_possible() < fuel_required {
            Outcome::LeftNoFuel
        } else {
            loop {
                if stock.try_consume(fuel_required) {
                    break Outcome::Refueled;
                }

                if patience == Patience::Never {
                    break Outcome::LeftTimeout;
                }

                debug!(vehicle = id, storage = stock.levels().storage, "not enough fuel, waiting for delivery");
                waited = true;

                match deadline {
                    Some(deadline) => stock.wait_until(deadline),
                    None => stock.wait()
                }

                wakeups += 1;

                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    break Outcome::LeftTimeout;
                }

                if stock.max_possible() < fuel_required {
                    break Outcome::LeftNoFuel;
                }
            }
        };

        let departure = Instant::now();
        let storage = stock.levels().storage;
        drop(stock);

        let visit = Visit {
            vehicle: *self,
            pump: pump.number(),
            arrival, admitted, departure, outcome, waited, wakeups
        };

        drop(pump);

        info!(
            vehicle = id,
            %outcome,
            storage,
            waited_secs = visit.duration().as_secs_f64(),
            "leaving the station"
        );

        visit
    }
}
