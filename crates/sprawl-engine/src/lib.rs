//! # sprawl-engine: Growth Rules and Statistics
//!
//! The cellular-automaton core: the four-phase spread rule, the
//! deltatron land-cover sub-model with its transition matrix, the
//! per-year orchestrator with coefficient self-modification, the spatial
//! statistics with calibration scoring, and the campaign/worker contexts
//! the batch driver runs against. All stochastic behavior draws from the
//! worker's own [`sprawl_core::RandomStream`], so identical contexts
//! replay identically.

pub mod context;
pub mod deltatron;
pub mod emit;
pub mod growth;
pub mod spread;
pub mod stats;
pub mod tags;
pub mod transition;

pub use context::{coeff_line_header, RunGrids, SimContext, WorkerState, PERSISTENT_GRIDS};
pub use growth::grow;
pub use spread::{slope_weights, spread, SpreadOutcome};
pub use stats::{
    analysis, compute_leesalee, compute_spatial, control_header, linefit, stat_line_header,
    AggregateScore, ControlRecord, StatLine, StatsState, TupleReport,
};
pub use tags::GrowthTag;
pub use transition::TransitionTable;
