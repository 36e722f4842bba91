//! E2E test harness for tether.
//!
//! Scenarios drive a real workspace on disk over an in-memory change graph
//! that the scenario can edit behind tether's back.

#![allow(dead_code)]

pub mod assertions;
pub mod clock;
pub mod scenario;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::{Assertion, ErrorMatch, ReasonMatch};
pub use runner::Labels;
pub use scenario::Scenario;
