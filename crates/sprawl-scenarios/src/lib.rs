//! # sprawl-scenarios: Campaign Configuration
//!
//! The scenario file dialect (plain-text `KEY=VALUE` with aggregating
//! data keys), the parsed [`Scenario`] configuration and the
//! [`ProcessingMode`] the CLI selects. A scenario is immutable once
//! parsed; per-mode requirements are checked by [`Scenario::validate`].

pub mod parse;
pub mod scenario;

pub use parse::{load, parse};
pub use scenario::{in_window, ProcessingMode, Scenario, YearWindow};
