//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use sprawl_scenarios::ProcessingMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sprawl",
    version,
    about = "Urban-growth cellular-automaton simulator",
    long_about = None
)]
pub struct Cli {
    /// What to do with the scenario
    #[arg(value_enum)]
    pub mode: ModeArg,

    /// Path to the scenario file
    pub scenario_file: PathBuf,

    /// Worker threads for the sweep ("auto" uses every core)
    #[arg(long, default_value = "auto")]
    pub threads: String,

    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Sweep the coefficient space and score each tuple
    Calibrate,
    /// Resume a calibration sweep from its checkpoint
    Restart,
    /// Run the first sweep tuple and exit
    Test,
    /// Project forward from the best-fit coefficients
    Predict,
}

impl From<ModeArg> for ProcessingMode {
    fn from(mode: ModeArg) -> ProcessingMode {
        match mode {
            ModeArg::Calibrate => ProcessingMode::Calibrate,
            ModeArg::Restart => ProcessingMode::Restart,
            ModeArg::Test => ProcessingMode::Test,
            ModeArg::Predict => ProcessingMode::Predict,
        }
    }
}

/// Resolve the `--threads` flag; prediction always runs one worker.
pub fn thread_count(spec: &str, mode: ProcessingMode) -> usize {
    if mode == ProcessingMode::Predict {
        return 1;
    }
    if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    }
}
