//! Results of a simulation run.

use crate::{
    fuel::{Fuel, Levels},
    tanker::Tanker,
    vehicle::{Outcome, Visit}
};

use dashu::{
    rational::Relaxed,
    integer::Sign
};
use itertools::Itertools;
use num_order::NumOrd;

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant}
};

/// State of the pump pool after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Number of pumps.
    pub capacity: usize,
    /// Pumps free at the end; equal to `capacity` unless a pump leaked.
    pub available: usize,
    /// Most pumps held at once.
    pub peak: usize,
    /// Pumps still recorded as occupied at the end.
    pub occupied: usize
}

/// Everything a finished simulation produced.
pub struct Report {
    /// Fuel the tankers brought, in total.
    pub initial: Fuel,
    /// Inventory levels after every task finished.
    pub levels: Levels,
    /// Pump pool diagnostics.
    pub pumps: PumpStats,
    /// One record per vehicle whose thread finished, in arrival order.
    pub visits: Box<[Visit]>,
    /// One record per tanker whose thread finished.
    pub tankers: Box<[Tanker]>,
    /// Vehicles whose threads failed to start or panicked.
    pub missing_vehicles: usize,
    /// Tankers whose threads failed to start or panicked.
    pub missing_tankers: usize,
    /// When the first thread was started.
    pub start: Instant,
    /// Wall time of the whole run.
    pub elapsed: Duration
}

impl Report {
    /// Counts the visits that ended with each outcome.
    pub fn outcomes(&self) -> HashMap<Outcome, usize> {
        self.visits.iter().counts_by(|v| v.outcome)
    }

    /// Counts the visits that ended with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.visits.iter().filter(|v| v.outcome == outcome).count()
    }

    /// Returns the fuel taken by refueled vehicles.
    pub fn consumed(&self) -> Fuel {
        self.visits.iter()
                   .filter(|v| v.outcome == Outcome::Refueled)
                   .map(|v| v.vehicle.fuel_required)
                   .sum()
    }

    /// Returns the number of deliveries made by all tankers.
    pub fn deliveries(&self) -> usize {
        self.tankers.iter().map(|t| t.deliveries).sum()
    }

    /// Returns the mean time vehicles spent at the station, if any came.
    pub fn average_wait(&self) -> Option<Duration> {
        let count = u32::try_from(self.visits.len()).ok().filter(|n| *n > 0)?;
        let total = self.visits.iter().map(Visit::duration).sum::<Duration>();

        Some(total / count)
    }

    /// Tests that no fuel appeared or vanished: everything the tankers
    /// brought is still in a tanker, in storage, in a refueled vehicle or
    /// written off, and the inventory agrees with the vehicles on how much
    /// was handed out.
    ///
    /// Only meaningful when no vehicle is missing.
    pub fn conserved(&self) -> bool {
        let Levels { tanker, storage, dispensed, written_off, .. } = self.levels;

        dispensed == self.consumed()
            && self.initial == tanker + storage + dispensed + written_off
    }

    /// Returns the total time pumps were held divided by the wall time of
    /// the run, i.e. the average number of pumps in use.
    ///
    /// The value is exact; see [`within_capacity`](`Report::within_capacity`).
    pub fn busy_load(&self) -> Relaxed {
        let micros = |d: Duration| u64::try_from(d.as_micros()).unwrap_or(u64::MAX);

        let held = self.visits.iter()
                              .map(|v| micros(v.departure - v.admitted))
                              .fold(0u64, u64::saturating_add);

        // rounded up so that the load never exceeds what was possible
        let span = micros(self.elapsed).saturating_add(1);

        Relaxed::from_parts_const(Sign::Positive, held.into(), span.into())
    }

    /// Tests that the pumps were never, on average, busier than there are
    /// pumps.
    pub fn within_capacity(&self) -> bool {
        self.busy_load().num_le(&self.pumps.capacity)
    }
}

impl fmt::Display for Report {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "STATISTICS")?;
        writeln!(f)?;

        for v in &*self.visits {
            let arrived = (v.arrival - self.start).as_secs_f64();
            let waited = v.duration().as_secs_f64();
            let pump = v.pump.map_or_else(|| "-".to_owned(), |p| p.to_string());

            writeln!(
                f,
                "{} #{}\tpump {pump}\tarrived {arrived:.2}s\t{} after {waited:.2}s",
                v.vehicle.category, v.vehicle.id, v.outcome
            )?;
        }

        if let Some(wait) = self.average_wait() {
            writeln!(f)?;
            writeln!(f, "average waiting time:\t{:.2}s", wait.as_secs_f64())?;
        }

        let outcomes = self.outcomes();
        let tally = [Outcome::Refueled, Outcome::LeftNoFuel, Outcome::LeftTimeout]
                    .iter()
                    .map(|o| format!("{}: {}", o, outcomes.get(o).copied().unwrap_or(0)))
                    .join(", ");

        writeln!(f, "outcomes:\t\t{tally}")?;
        writeln!(f)?;
        writeln!(f, "total fuel consumed:\t{} liters", self.consumed())?;
        writeln!(f, "left at the station:\t{} liters", self.levels.storage)?;
        writeln!(f, "total fuel deliveries:\t{}", self.deliveries())?;

        let chunks = self.tankers.iter().map(|t| t.chunk).unique().join(", ");
        writeln!(f, "liters per delivery:\t{chunks}")?;

        if self.levels.written_off > 0 {
            writeln!(f, "never delivered:\t{} liters", self.levels.written_off)?;
        }

        if self.missing_vehicles > 0 || self.missing_tankers > 0 {
            writeln!(
                f,
                "missing records:\t{} vehicles, {} tankers",
                self.missing_vehicles, self.missing_tankers
            )?;
        }

        let load = self.visits.iter()
                              .map(|v| (v.departure - v.admitted).as_secs_f64())
                              .sum::<f64>() / self.elapsed.as_secs_f64().max(f64::EPSILON);

        write!(
            f,
            "pumps:\t\t\t{} (at most {} busy at once, {load:.2} on average)",
            self.pumps.capacity, self.pumps.peak
        )
    }
}
