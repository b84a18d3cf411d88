//! Simulation of a fuel station.
//!
//! A station has a fixed number of [pumps](`pump::PumpPool`) and a shared
//! [inventory](`fuel::Inventory`) of fuel. [Tankers](`tanker::Tanker`)
//! unload into the inventory in chunks while [vehicles](`vehicle::Vehicle`),
//! each on its own thread, queue for a pump and then wait for enough fuel
//! for as long as their patience allows. A [`sim::Simulation`] runs a
//! [`scenario::Scenario`] and collects a [`report::Report`].

#![warn(clippy::pedantic)]

pub mod fuel;
pub mod pump;
pub mod report;
pub mod scenario;
pub mod sim;
pub mod station;
pub mod tanker;
pub mod vehicle;
