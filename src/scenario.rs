//! Scenario files.
//!
//! A scenario describes a station (pumps and tankers) and the vehicles that
//! visit it, as a JSON document:
//!
//! ```json
//! {
//!   "fuel_pumps_count": 2,
//!   "max_vehicle_capacity": 10,
//!   "initial_fuel_in_tanker": 150,
//!   "fuel_transfer_rate": 15,
//!   "randomize_arrival": false,
//!   "vehicles": [
//!     { "vehicle_type": "auto", "default_fuel_needed": 30,
//!       "default_wait_time_sec": -1, "default_count": 2 }
//!   ]
//! }
//! ```
//!
//! Station-wide fields must all be valid for a scenario to load. Vehicle
//! groups and their `custom_waiting_list` entries are more lenient: an
//! invalid one is reported and skipped, as long as at least one vehicle
//! remains in the end.

use crate::{
    fuel::Fuel,
    vehicle::{Category, Patience, Vehicle}
};

use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use std::{
    fmt, fs, io, iter,
    ops::RangeInclusive,
    path::{Path, PathBuf}
};

/// Most vehicles a scenario may have.
pub const MAX_VEHICLES: usize = 100;
/// Most pumps a station may have.
pub const MAX_FUEL_PUMPS: usize = 10;
/// Most fuel a single tanker may carry.
pub const MAX_TANKER_LOAD: Fuel = 1000;
/// Most fuel a tanker may move in one delivery.
pub const MAX_TRANSFER_RATE: Fuel = 100;
/// Most tankers a station may be served by.
pub const MAX_TANKERS: usize = 4;

/// Errors raised while loading a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error
    },

    /// The document is not valid JSON or has fields of the wrong type.
    #[error("malformed scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent.
    #[error("[{0}]: field is required")]
    Missing(&'static str),

    /// A field holds a value outside of its allowed range.
    #[error("[{field}]: {value} is not within {} ..= {}", range.start(), range.end())]
    OutOfRange {
        field: &'static str,
        value: i64,
        range: RangeInclusive<i64>
    },

    /// No vehicle group yielded a valid vehicle.
    #[error("[vehicles]: no valid vehicle found")]
    NoVehicles
}

#[derive(Deserialize)]
struct RawScenario {
    fuel_pumps_count: Option<i64>,
    max_vehicle_capacity: Option<i64>,
    initial_fuel_in_tanker: Option<i64>,
    fuel_transfer_rate: Option<i64>,
    #[serde(default)]
    randomize_arrival: bool,
    tankers_count: Option<i64>,
    vehicles: Option<Vec<Value>>
}

#[derive(Deserialize)]
struct RawGroup {
    vehicle_type: Category,
    default_fuel_needed: i64,
    default_wait_time_sec: i64,
    default_count: i64,
    custom_waiting_list: Option<Vec<Value>>
}

#[derive(Deserialize)]
struct RawEntry {
    count: i64,
    fuel_needed: Option<i64>,
    wait_time_sec: Option<i64>
}

/// A vehicle before it is given an arrival number.
#[derive(Clone, Copy)]
struct Template {
    category: Category,
    fuel_required: Fuel,
    patience: Patience
}

/// Checks that `value` lies in `range` and converts it to `T`.
fn bounded<T: TryFrom<i64>>(field: &'static str, value: i64, range: RangeInclusive<i64>)
-> Result<T, ScenarioError> {
    let out_of_range = || ScenarioError::OutOfRange { field, value, range: range.clone() };

    if !range.contains(&value) {
        return Err(out_of_range());
    }

    T::try_from(value).map_err(|_| out_of_range())
}

fn required(field: &'static str, value: Option<i64>) -> Result<i64, ScenarioError> {
    value.ok_or(ScenarioError::Missing(field))
}

fn parse_patience(field: &'static str, value: i64) -> Result<Patience, ScenarioError> {
    Patience::try_from(value).map_err(|value| ScenarioError::OutOfRange {
        field, value, range: -1 ..= i64::from(u32::MAX)
    })
}

impl RawEntry {
    #[allow(clippy::cast_possible_wrap)]
    fn expand(self, defaults: Template) -> Result<impl Iterator<Item = Template>, ScenarioError> {
        let count: usize = bounded("count", self.count, 1 ..= MAX_VEHICLES as i64)?;

        let fuel_required = match self.fuel_needed {
            Some(fuel) => bounded("fuel_needed", fuel, 1 ..= i64::MAX)?,
            None => defaults.fuel_required
        };

        let patience = match self.wait_time_sec {
            Some(secs) => parse_patience("wait_time_sec", secs)?,
            None => defaults.patience
        };

        Ok(iter::repeat(Template { fuel_required, patience, ..defaults }).take(count))
    }
}

impl RawGroup {
    #[allow(clippy::cast_possible_wrap)]
    fn expand(self) -> Result<Vec<Template>, ScenarioError> {
        let defaults = Template {
            category: self.vehicle_type,
            fuel_required: bounded("default_fuel_needed", self.default_fuel_needed, 1 ..= i64::MAX)?,
            patience: parse_patience("default_wait_time_sec", self.default_wait_time_sec)?
        };

        let default_count: usize = bounded(
            "default_count", self.default_count, 0 ..= MAX_VEHICLES as i64
        )?;

        let mut out = Vec::new();

        for (i, entry) in self.custom_waiting_list.into_iter().flatten().enumerate() {
            let expanded = serde_json::from_value::<RawEntry>(entry)
                           .map_err(ScenarioError::from)
                           .and_then(|entry| entry.expand(defaults));

            match expanded {
                Ok(templates) => out.extend(templates),
                Err(e) => warn!(entry = i, "skipping custom waiting list entry: {e}")
            }
        }

        if out.is_empty() {
            out.extend(iter::repeat(defaults).take(default_count));
        }

        Ok(out)
    }
}

/// A validated scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Number of fuel pumps.
    pub pumps: usize,
    /// Fuel carried by each tanker.
    pub tanker_load: Fuel,
    /// Most fuel a tanker moves per delivery.
    pub transfer_rate: Fuel,
    /// Number of tankers.
    pub tankers: usize,
    /// Vehicles in arrival order, numbered from 1.
    pub vehicles: Box<[Vehicle]>
}

impl Scenario {
    /// Reads and validates the scenario file at `path`.
    ///
    /// `rng` is only used if the scenario asks for a random arrival order.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or, as for
    /// [`from_json`](`Scenario::from_json`), does not hold a valid scenario.
    pub fn load<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_owned(),
            source
        })?;

        Self::from_json(&text, rng)
    }

    /// Parses and validates a scenario document.
    ///
    /// `rng` is only used if the scenario asks for a random arrival order.
    ///
    /// # Errors
    ///
    /// Fails if the document is malformed, a station-wide field is missing
    /// or out of range, or no valid vehicle is left.
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_json<R: Rng + ?Sized>(text: &str, rng: &mut R) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_json::from_str(text)?;

        let pumps = bounded(
            "fuel_pumps_count",
            required("fuel_pumps_count", raw.fuel_pumps_count)?,
            1 ..= MAX_FUEL_PUMPS as i64
        )?;

        let capacity: usize = bounded(
            "max_vehicle_capacity",
            required("max_vehicle_capacity", raw.max_vehicle_capacity)?,
            1 ..= MAX_VEHICLES as i64
        )?;

        let tanker_load: Fuel = bounded(
            "initial_fuel_in_tanker",
            required("initial_fuel_in_tanker", raw.initial_fuel_in_tanker)?,
            1 ..= MAX_TANKER_LOAD as i64
        )?;

        let mut transfer_rate: Fuel = bounded(
            "fuel_transfer_rate",
            required("fuel_transfer_rate", raw.fuel_transfer_rate)?,
            1 ..= MAX_TRANSFER_RATE as i64
        )?;

        if transfer_rate > tanker_load {
            warn!(transfer_rate, tanker_load, "transfer rate exceeds tanker load; using the load instead");
            transfer_rate = tanker_load;
        }

        let tankers = bounded(
            "tankers_count",
            raw.tankers_count.unwrap_or(1),
            1 ..= MAX_TANKERS as i64
        )?;

        let groups = raw.vehicles.ok_or(ScenarioError::Missing("vehicles"))?;
        let mut templates = Vec::new();

        for (i, group) in groups.into_iter().enumerate() {
            let expanded = serde_json::from_value::<RawGroup>(group)
                           .map_err(ScenarioError::from)
                           .and_then(RawGroup::expand);

            match expanded {
                Ok(group) => {
                    debug!(group = i, vehicles = group.len(), "vehicle group is valid");
                    templates.extend(group);
                },
                Err(e) => warn!(group = i, "skipping vehicle group: {e}")
            }
        }

        if templates.is_empty() {
            return Err(ScenarioError::NoVehicles);
        }

        if raw.randomize_arrival {
            templates.shuffle(rng);
        }

        if templates.len() > capacity {
            warn!(found = templates.len(), capacity, "more vehicles than allowed; dropping the rest");
            templates.truncate(capacity);
        }

        let vehicles = templates.into_iter().enumerate().map(|(i, t)| Vehicle {
            id: i + 1,
            category: t.category,
            fuel_required: t.fuel_required,
            patience: t.patience
        }).collect();

        Ok(Self { pumps, tanker_load, transfer_rate, tankers, vehicles })
    }

    /// Returns the fuel brought by all tankers together.
    pub fn total_load(&self) -> Fuel {
        self.tanker_load * self.tankers as Fuel
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pumps:         {} (at most {MAX_FUEL_PUMPS})", self.pumps)?;
        writeln!(f, "tankers:       {} x {} liters (at most {MAX_TANKER_LOAD})", self.tankers, self.tanker_load)?;
        writeln!(f, "transfer rate: {} liters (at most {MAX_TRANSFER_RATE})", self.transfer_rate)?;
        writeln!(f, "vehicles:      {} (at most {MAX_VEHICLES})", self.vehicles.len())?;

        let by_category = self.vehicles.iter().counts_by(|v| v.category);
        let summary = by_category.iter()
                                 .sorted_by_key(|(c, _)| c.to_string())
                                 .map(|(c, n)| format!("{n} {c}"))
                                 .join(", ");

        write!(f, "               {summary}")?;

        for v in &*self.vehicles {
            writeln!(f)?;
            write!(f, "  #{:<3} {:<5} {:>5} liters, patience {}", v.id, v.category, v.fuel_required, v.patience)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, SeedableRng};

    use std::io::Write;

    fn load(text: &str) -> Result<Scenario, ScenarioError> {
        Scenario::from_json(text, &mut StdRng::seed_from_u64(7))
    }

    const BASIC: &str = r#"{
        "fuel_pumps_count": 2,
        "max_vehicle_capacity": 10,
        "initial_fuel_in_tanker": 150,
        "fuel_transfer_rate": 15,
        "vehicles": [
            { "vehicle_type": "auto", "default_fuel_needed": 30,
              "default_wait_time_sec": -1, "default_count": 2 },
            { "vehicle_type": "truck", "default_fuel_needed": 80,
              "default_wait_time_sec": 5, "default_count": 1,
              "custom_waiting_list": [
                  { "count": 2, "fuel_needed": 100 },
                  { "count": 1, "wait_time_sec": 0 }
              ] }
        ]
    }"#;

    #[test]
    fn basic_scenario_expands_groups() {
        let scenario = load(BASIC).unwrap();

        assert_eq!(scenario.pumps, 2);
        assert_eq!(scenario.tankers, 1);
        assert_eq!(scenario.total_load(), 150);

        let vehicles = scenario.vehicles.iter()
                                        .map(|v| (v.id, v.category, v.fuel_required, v.patience))
                                        .collect::<Vec<_>>();

        assert_eq!(vehicles, [
            (1, Category::Auto, 30, Patience::Forever),
            (2, Category::Auto, 30, Patience::Forever),
            (3, Category::Truck, 100, Patience::Within(5)),
            (4, Category::Truck, 100, Patience::Within(5)),
            (5, Category::Truck, 80, Patience::Never)
        ]);
    }

    #[test]
    fn missing_station_field_is_an_error() {
        let err = load(r#"{ "fuel_pumps_count": 1, "vehicles": [] }"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Missing("max_vehicle_capacity")));
    }

    #[test]
    fn out_of_range_pumps_is_an_error() {
        let text = BASIC.replace(r#""fuel_pumps_count": 2"#, r#""fuel_pumps_count": 11"#);
        let err = load(&text).unwrap_err();

        assert!(matches!(err, ScenarioError::OutOfRange { field: "fuel_pumps_count", value: 11, .. }));
        assert_eq!(err.to_string(), "[fuel_pumps_count]: 11 is not within 1 ..= 10");
    }

    #[test]
    fn wrong_type_is_an_error() {
        let text = BASIC.replace(r#""fuel_transfer_rate": 15"#, r#""fuel_transfer_rate": "fast""#);
        assert!(matches!(load(&text), Err(ScenarioError::Json(_))));
    }

    #[test]
    fn transfer_rate_is_clamped_to_load() {
        let text = BASIC.replace(r#""initial_fuel_in_tanker": 150"#, r#""initial_fuel_in_tanker": 10"#);
        assert_eq!(load(&text).unwrap().transfer_rate, 10);
    }

    #[test]
    fn invalid_groups_and_entries_are_skipped() {
        let text = r#"{
            "fuel_pumps_count": 1,
            "max_vehicle_capacity": 10,
            "initial_fuel_in_tanker": 100,
            "fuel_transfer_rate": 10,
            "vehicles": [
                { "vehicle_type": "bus", "default_fuel_needed": 30,
                  "default_wait_time_sec": -1, "default_count": 2 },
                { "vehicle_type": "van", "default_fuel_needed": 20,
                  "default_wait_time_sec": -2, "default_count": 2 },
                { "vehicle_type": "van", "default_fuel_needed": 20,
                  "default_wait_time_sec": 3, "default_count": 2,
                  "custom_waiting_list": [ { "count": 0 }, { "fuel_needed": 5 } ] }
            ]
        }"#;

        let scenario = load(text).unwrap();

        // only the last group survives, and its list yields nothing usable
        assert_eq!(scenario.vehicles.len(), 2);
        assert!(scenario.vehicles.iter().all(|v| v.category == Category::Van
                                              && v.fuel_required == 20
                                              && v.patience == Patience::Within(3)));
    }

    #[test]
    fn no_valid_vehicle_is_an_error() {
        let text = BASIC.replace(r#""default_count": 2 },"#, r#""default_count": 0 },"#)
                        .replace(r#""vehicle_type": "truck""#, r#""vehicle_type": "plane""#);

        assert!(matches!(load(&text), Err(ScenarioError::NoVehicles)));
    }

    #[test]
    fn extra_vehicles_are_dropped_in_order() {
        let text = BASIC.replace(r#""max_vehicle_capacity": 10"#, r#""max_vehicle_capacity": 3"#);
        let scenario = load(&text).unwrap();

        assert_eq!(scenario.vehicles.len(), 3);
        assert_eq!(scenario.vehicles[2].category, Category::Truck);
        assert_eq!(scenario.vehicles[2].fuel_required, 100);
    }

    #[test]
    fn random_arrival_keeps_the_same_vehicles() {
        let text = BASIC.replace(r#""fuel_transfer_rate": 15"#,
                                 r#""fuel_transfer_rate": 15, "randomize_arrival": true"#);

        let ordered = load(BASIC).unwrap();
        let shuffled = load(&text).unwrap();

        let mut demands = shuffled.vehicles.iter().map(|v| v.fuel_required).collect::<Vec<_>>();
        demands.sort_unstable();
        assert_eq!(demands, [30, 30, 80, 100, 100]);

        // ids follow the new arrival order
        assert!(shuffled.vehicles.iter().enumerate().all(|(i, v)| v.id == i + 1));
        assert_eq!(ordered.vehicles.len(), shuffled.vehicles.len());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BASIC.as_bytes()).unwrap();

        let scenario = Scenario::load(file.path(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(scenario.vehicles.len(), 5);

        let missing = Scenario::load(Path::new("/nonexistent/data.json"), &mut StdRng::seed_from_u64(1));
        assert!(matches!(missing, Err(ScenarioError::Io { .. })));
    }

    #[test]
    fn display_lists_vehicles() {
        let text = load(BASIC).unwrap().to_string();

        assert!(text.contains("2 auto, 3 truck"));
        assert!(text.contains("#5"));
    }
}
