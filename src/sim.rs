//! Running a scenario.

use crate::{
    report::{PumpStats, Report},
    scenario::Scenario,
    station::{SetupError, Station, Timing},
    tanker::Tanker
};

use tracing::{error, info};

use std::{
    thread::{self, Scope, ScopedJoinHandle},
    time::Instant
};

/// Spawns `f` on a named scoped thread, logging and skipping it if the
/// thread cannot be created.
fn spawn<'scope, T, F>(s: &'scope Scope<'scope, '_>, name: String, f: F)
-> Option<ScopedJoinHandle<'scope, T>> where F: FnOnce() -> T + Send + 'scope,
                                             T: Send + 'scope {
    match thread::Builder::new().name(name.clone()).spawn_scoped(s, f) {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(thread = %name, "failed to start thread: {e}");
            None
        }
    }
}

/// Joins every handle, logging and skipping the threads that panicked.
fn join_all<T>(handles: Vec<(String, ScopedJoinHandle<'_, T>)>) -> Vec<T> {
    handles.into_iter().filter_map(|(name, handle)| match handle.join() {
        Ok(out) => Some(out),
        Err(_) => {
            error!(thread = %name, "thread panicked; its record is lost");
            None
        }
    }).collect()
}

/// A scenario ready to run.
pub struct Simulation {
    scenario: Scenario,
    timing: Timing
}

impl Simulation {
    /// Constructs a new `Simulation` of `scenario` under `timing`.
    pub fn new(scenario: Scenario, timing: Timing) -> Self {
        Self { scenario, timing }
    }

    /// Returns the scenario to be run.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Runs the scenario to completion.
    ///
    /// One thread is started per vehicle, all at once; tankers start on
    /// their own threads after the vehicles' head start. Returns once every
    /// thread has finished.
    ///
    /// A thread that fails to start or panics is logged and left
    /// out of the report; the fuel of a tanker that never started is
    /// written off so that nobody waits for it.
    ///
    /// # Errors
    ///
    /// Fails only if the station cannot be set up, before any thread is
    /// started.
    pub fn run(&self) -> Result<Report, SetupError> {
        let Scenario { pumps, tanker_load, transfer_rate, tankers, ref vehicles } = self.scenario;

        let tankers = (1 ..= tankers).map(|id| Tanker::new(id, tanker_load, transfer_rate))
                                     .collect::<Result<Box<_>, _>>()?;

        let station = Station::new(pumps, self.scenario.total_load(), self.timing)?;

        info!(
            pumps,
            tankers = tankers.len(),
            vehicles = vehicles.len(),
            load = station.inventory.initial(),
            "simulation starting"
        );

        let start = Instant::now();

        let (visits, deliveries) = thread::scope(|s| {
            let station = &station;

            let visitors = vehicles.iter().filter_map(|vehicle| {
                let name = format!("vehicle-{}", vehicle.id);
                spawn(s, name.clone(), move || vehicle.visit(station)).map(|h| (name, h))
            }).collect::<Vec<_>>();

            thread::sleep(self.timing.ticks(self.timing.head_start));

            let unloaders = tankers.iter().filter_map(|&tanker| {
                let name = format!("tanker-{}", tanker.id);
                let handle = spawn(s, name.clone(), move || tanker.run(station));

                if handle.is_none() {
                    let levels = station.inventory.write_off(tanker.load);
                    error!(tanker = tanker.id, written_off = levels.written_off, "tanker never arrived");
                }

                handle.map(|h| (name, h))
            }).collect::<Vec<_>>();

            (join_all(visitors), join_all(unloaders))
        });

        let elapsed = start.elapsed();

        let report = Report {
            initial: station.inventory.initial(),
            levels: station.inventory.levels(),
            pumps: PumpStats {
                capacity: station.pumps.capacity(),
                available: station.pumps.available(),
                peak: station.pumps.peak(),
                occupied: station.pumps.occupancy().iter().flatten().count()
            },
            missing_vehicles: vehicles.len() - visits.len(),
            missing_tankers: tankers.len() - deliveries.len(),
            visits: visits.into_boxed_slice(),
            tankers: deliveries.into_boxed_slice(),
            start,
            elapsed
        };

        info!(elapsed_secs = elapsed.as_secs_f64(), "simulation finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::vehicle::{Category, Patience, Vehicle};

    use std::time::Duration;

    fn scenario(pumps: usize, load: u64, rate: u64, demands: &[(u64, Patience)]) -> Scenario {
        Scenario {
            pumps,
            tanker_load: load,
            transfer_rate: rate,
            tankers: 1,
            vehicles: demands.iter().enumerate().map(|(i, &(fuel_required, patience))| Vehicle {
                id: i + 1,
                category: Category::Auto,
                fuel_required,
                patience
            }).collect()
        }
    }

    #[test]
    fn every_vehicle_and_tanker_reports() {
        let sim = Simulation::new(
            scenario(2, 150, 15, &[(30, Patience::Forever); 5]),
            Timing::instant(Duration::from_millis(5))
        );

        let report = sim.run().unwrap();

        assert_eq!(report.visits.len(), 5);
        assert_eq!(report.tankers.len(), 1);
        assert_eq!(report.missing_vehicles, 0);
        assert_eq!(report.missing_tankers, 0);
        assert!(report.conserved());
        assert_eq!(report.pumps.available, 2);
        assert_eq!(report.pumps.occupied, 0);
    }

    #[test]
    fn bad_station_fails_before_running() {
        let sim = Simulation::new(scenario(0, 150, 15, &[(30, Patience::Never)]), Timing::default());
        assert_eq!(sim.run().err(), Some(SetupError::NoPumps));

        let sim = Simulation::new(scenario(1, 150, 0, &[(30, Patience::Never)]), Timing::default());
        assert_eq!(sim.run().err(), Some(SetupError::NoChunk));
    }
}
