//! Scenario configuration.
//!
//! A [`Scenario`] is the immutable-after-parse configuration of one
//! simulation or calibration campaign: input/output locations, the input
//! layer lists, sweep ranges, Monte Carlo setup, self-modification knobs,
//! the land-class declarations and the observability switches.

use serde::{Deserialize, Serialize};
use sprawl_core::{CoeffSweep, LandClass, Rgb, SelfModParams, SprawlError, SprawlResult};
use std::path::PathBuf;

/// What kind of campaign the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Sweep the coefficient space and score each tuple against history.
    Calibrate,
    /// Calibrate, resuming the sweep from the restart checkpoint.
    Restart,
    /// Single-tuple calibration pass that exits after the first tuple.
    Test,
    /// Project forward from the best-fit coefficients.
    Predict,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Calibrate => "calibrate",
            ProcessingMode::Restart => "restart",
            ProcessingMode::Test => "test",
            ProcessingMode::Predict => "predict",
        }
    }

    /// Modes that run the calibration sweep loop.
    pub fn is_calibrating(&self) -> bool {
        matches!(
            self,
            ProcessingMode::Calibrate | ProcessingMode::Restart | ProcessingMode::Test
        )
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = SprawlError;

    fn from_str(s: &str) -> SprawlResult<ProcessingMode> {
        match s.to_ascii_lowercase().as_str() {
            "calibrate" => Ok(ProcessingMode::Calibrate),
            "restart" => Ok(ProcessingMode::Restart),
            "test" => Ok(ProcessingMode::Test),
            "predict" => Ok(ProcessingMode::Predict),
            other => Err(SprawlError::Config(format!(
                "unknown mode '{other}'; expected calibrate, restart, test or predict"
            ))),
        }
    }
}

/// Year window limiting optional per-year image emission.
pub type YearWindow = Option<(u16, u16)>;

pub fn in_window(year: u16, window: YearWindow) -> bool {
    match window {
        Some((start, stop)) => (start..=stop).contains(&year),
        None => true,
    }
}

/// Parsed scenario file. Field defaults match an empty scenario; the
/// per-mode requirements are enforced by [`Scenario::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub urban_data: Vec<String>,
    pub road_data: Vec<String>,
    pub landuse_data: Vec<String>,
    pub excluded_data: Option<String>,
    pub slope_data: Option<String>,
    pub background_data: Option<String>,

    pub calibration: CoeffSweep,
    pub prediction_start_date: u16,
    pub prediction_stop_date: u16,

    pub monte_carlo_iterations: usize,
    pub random_seed: i64,
    pub num_working_grids: usize,

    pub boom: f64,
    pub bust: f64,
    pub critical_low: f64,
    pub critical_high: f64,
    pub critical_slope: f64,
    pub road_grav_sensitivity: f64,
    pub slope_sensitivity: f64,

    pub landuse_classes: Vec<LandClass>,
    pub probability_colors: Vec<Rgb>,
    pub deltatron_colors: Vec<Rgb>,

    pub view_growth_types: bool,
    pub growth_types_window: YearWindow,
    pub view_deltatron_aging: bool,
    pub deltatron_aging_window: YearWindow,

    pub echo: bool,
    pub log: bool,
    pub write_coeff_file: bool,
    pub write_avg_file: bool,
    pub write_std_dev_file: bool,
    pub log_base_statistics: bool,
    pub log_slope_weights: bool,
    pub log_transition_matrix: bool,
    pub log_urbanization_attempts: bool,
    pub log_processing_status: u8,
}

impl Default for Scenario {
    fn default() -> Scenario {
        Scenario {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            urban_data: Vec::new(),
            road_data: Vec::new(),
            landuse_data: Vec::new(),
            excluded_data: None,
            slope_data: None,
            background_data: None,
            calibration: CoeffSweep::default(),
            prediction_start_date: 0,
            prediction_stop_date: 0,
            monte_carlo_iterations: 1,
            random_seed: 1,
            num_working_grids: 4,
            boom: 1.01,
            bust: 0.09,
            critical_low: 0.97,
            critical_high: 1.3,
            critical_slope: 15.0,
            road_grav_sensitivity: 0.01,
            slope_sensitivity: 0.1,
            landuse_classes: Vec::new(),
            probability_colors: Vec::new(),
            deltatron_colors: Vec::new(),
            view_growth_types: false,
            growth_types_window: None,
            view_deltatron_aging: false,
            deltatron_aging_window: None,
            echo: false,
            log: true,
            write_coeff_file: false,
            write_avg_file: false,
            write_std_dev_file: false,
            log_base_statistics: false,
            log_slope_weights: false,
            log_transition_matrix: false,
            log_urbanization_attempts: false,
            log_processing_status: 0,
        }
    }
}

impl Scenario {
    pub fn doing_landuse(&self) -> bool {
        self.landuse_data.len() == 2
    }

    pub fn self_mod_params(&self) -> SelfModParams {
        SelfModParams {
            boom: self.boom,
            bust: self.bust,
            critical_low: self.critical_low,
            critical_high: self.critical_high,
            slope_sensitivity: self.slope_sensitivity,
            road_grav_sensitivity: self.road_grav_sensitivity,
        }
    }

    /// Cross-field checks that depend on the processing mode.
    pub fn validate(&self, mode: ProcessingMode) -> SprawlResult<()> {
        if self.urban_data.is_empty() {
            return Err(SprawlError::Config("URBAN_DATA is required".to_string()));
        }
        if self.road_data.is_empty() {
            return Err(SprawlError::Config("ROAD_DATA is required".to_string()));
        }
        if self.slope_data.is_none() {
            return Err(SprawlError::Config("SLOPE_DATA is required".to_string()));
        }
        if !matches!(self.landuse_data.len(), 0 | 2) {
            return Err(SprawlError::Config(format!(
                "LANDUSE_DATA appears {} times; land-cover runs need exactly 2 layers",
                self.landuse_data.len()
            )));
        }
        if self.doing_landuse() && self.landuse_classes.is_empty() {
            return Err(SprawlError::Config(
                "LANDUSE_DATA given but no LANDUSE_CLASS table".to_string(),
            ));
        }
        if self.monte_carlo_iterations == 0 {
            return Err(SprawlError::Config(
                "MONTE_CARLO_ITERATIONS must be at least 1".to_string(),
            ));
        }
        if self.num_working_grids < 3 {
            return Err(SprawlError::Config(
                "NUM_WORKING_GRIDS must be at least 3".to_string(),
            ));
        }
        if self.boom <= 1.0 {
            return Err(SprawlError::Config(format!(
                "BOOM must exceed 1.0, got {}",
                self.boom
            )));
        }
        if !(0.0 < self.bust && self.bust < 1.0) {
            return Err(SprawlError::Config(format!(
                "BUST must lie in (0, 1), got {}",
                self.bust
            )));
        }
        if self.critical_slope <= 0.0 {
            return Err(SprawlError::Config(format!(
                "CRITICAL_SLOPE must be positive, got {}",
                self.critical_slope
            )));
        }
        match mode {
            ProcessingMode::Calibrate | ProcessingMode::Restart | ProcessingMode::Test => {
                if self.urban_data.len() < 2 {
                    return Err(SprawlError::Config(
                        "calibration needs at least two URBAN_DATA years".to_string(),
                    ));
                }
                for (name, range) in [
                    ("DIFFUSION", &self.calibration.diffusion),
                    ("BREED", &self.calibration.breed),
                    ("SPREAD", &self.calibration.spread),
                    ("SLOPE", &self.calibration.slope_resistance),
                    ("ROAD", &self.calibration.road_gravity),
                ] {
                    if range.step == 0 {
                        return Err(SprawlError::Config(format!(
                            "CALIBRATION_{name}_STEP must be at least 1"
                        )));
                    }
                    if range.stop < range.start {
                        return Err(SprawlError::Config(format!(
                            "CALIBRATION_{name}_STOP is below its START"
                        )));
                    }
                }
            }
            ProcessingMode::Predict => {
                if self.prediction_stop_date <= self.prediction_start_date {
                    return Err(SprawlError::Config(format!(
                        "prediction window {}..{} is empty",
                        self.prediction_start_date, self.prediction_stop_date
                    )));
                }
            }
        }
        Ok(())
    }

    /// Effective configuration as pretty JSON, for the run log.
    pub fn echo_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|err| format!("<echo failed: {err}>"))
    }
}
