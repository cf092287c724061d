//! Scenario file reader.
//!
//! Plain-text `KEY=VALUE` lines; `#` starts a comment, blank lines are
//! ignored. Repeated data keys (URBAN_DATA, ROAD_DATA, LANDUSE_DATA,
//! LANDUSE_CLASS, PROBABILITY_COLOR, DELTATRON_COLOR) aggregate into
//! lists. Unknown keys are warned about and skipped; a malformed value is
//! fatal.

use crate::scenario::Scenario;
use anyhow::{anyhow, bail, Context, Result};
use sprawl_core::{Cell, LandClass, Rgb};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Read and parse a scenario file.
pub fn load(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario file '{}'", path.display()))?;
    parse(&text).with_context(|| format!("parsing scenario file '{}'", path.display()))
}

/// Parse scenario text.
pub fn parse(text: &str) -> Result<Scenario> {
    let mut scenario = Scenario::default();
    for (lineno, raw) in text.lines().enumerate() {
        let line = match raw.find('#') {
            Some(at) => &raw[..at],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow!("line {}: expected KEY=VALUE, got '{line}'", lineno + 1))?;
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        apply(&mut scenario, &key, value)
            .with_context(|| format!("line {}: key {key}", lineno + 1))?;
    }
    Ok(scenario)
}

fn apply(scenario: &mut Scenario, key: &str, value: &str) -> Result<()> {
    match key {
        "INPUT_DIR" => scenario.input_dir = PathBuf::from(value),
        "OUTPUT_DIR" => scenario.output_dir = PathBuf::from(value),
        "URBAN_DATA" => scenario.urban_data.push(value.to_string()),
        "ROAD_DATA" => scenario.road_data.push(value.to_string()),
        "LANDUSE_DATA" => scenario.landuse_data.push(value.to_string()),
        "EXCLUDED_DATA" => scenario.excluded_data = Some(value.to_string()),
        "SLOPE_DATA" => scenario.slope_data = Some(value.to_string()),
        "BACKGROUND_DATA" => scenario.background_data = Some(value.to_string()),

        "CALIBRATION_DIFFUSION_START" => scenario.calibration.diffusion.start = int(value)?,
        "CALIBRATION_DIFFUSION_STOP" => scenario.calibration.diffusion.stop = int(value)?,
        "CALIBRATION_DIFFUSION_STEP" => scenario.calibration.diffusion.step = int(value)?,
        "CALIBRATION_BREED_START" => scenario.calibration.breed.start = int(value)?,
        "CALIBRATION_BREED_STOP" => scenario.calibration.breed.stop = int(value)?,
        "CALIBRATION_BREED_STEP" => scenario.calibration.breed.step = int(value)?,
        "CALIBRATION_SPREAD_START" => scenario.calibration.spread.start = int(value)?,
        "CALIBRATION_SPREAD_STOP" => scenario.calibration.spread.stop = int(value)?,
        "CALIBRATION_SPREAD_STEP" => scenario.calibration.spread.step = int(value)?,
        "CALIBRATION_SLOPE_START" => scenario.calibration.slope_resistance.start = int(value)?,
        "CALIBRATION_SLOPE_STOP" => scenario.calibration.slope_resistance.stop = int(value)?,
        "CALIBRATION_SLOPE_STEP" => scenario.calibration.slope_resistance.step = int(value)?,
        "CALIBRATION_ROAD_START" => scenario.calibration.road_gravity.start = int(value)?,
        "CALIBRATION_ROAD_STOP" => scenario.calibration.road_gravity.stop = int(value)?,
        "CALIBRATION_ROAD_STEP" => scenario.calibration.road_gravity.step = int(value)?,

        "PREDICTION_DIFFUSION_BEST_FIT" => scenario.calibration.diffusion.best_fit = int(value)?,
        "PREDICTION_BREED_BEST_FIT" => scenario.calibration.breed.best_fit = int(value)?,
        "PREDICTION_SPREAD_BEST_FIT" => scenario.calibration.spread.best_fit = int(value)?,
        "PREDICTION_SLOPE_BEST_FIT" => {
            scenario.calibration.slope_resistance.best_fit = int(value)?
        }
        "PREDICTION_ROAD_BEST_FIT" => scenario.calibration.road_gravity.best_fit = int(value)?,
        "PREDICTION_START_DATE" => scenario.prediction_start_date = int(value)?,
        "PREDICTION_STOP_DATE" => scenario.prediction_stop_date = int(value)?,

        "MONTE_CARLO_ITERATIONS" => scenario.monte_carlo_iterations = int(value)?,
        "RANDOM_SEED" => scenario.random_seed = int(value)?,
        "NUM_WORKING_GRIDS" => scenario.num_working_grids = int(value)?,

        "BOOM" => scenario.boom = real(value)?,
        "BUST" => scenario.bust = real(value)?,
        "CRITICAL_LOW" => scenario.critical_low = real(value)?,
        "CRITICAL_HIGH" => scenario.critical_high = real(value)?,
        "CRITICAL_SLOPE" => scenario.critical_slope = real(value)?,
        "ROAD_GRAV_SENSITIVITY" => scenario.road_grav_sensitivity = real(value)?,
        "SLOPE_SENSITIVITY" => scenario.slope_sensitivity = real(value)?,

        "LANDUSE_CLASS" => scenario.landuse_classes.push(land_class(value)?),
        "PROBABILITY_COLOR" => scenario.probability_colors.push(color(value)?),
        "DELTATRON_COLOR" => scenario.deltatron_colors.push(color(value)?),

        "VIEW_GROWTH_TYPES" => scenario.view_growth_types = boolean(value)?,
        "GROWTH_TYPES_WINDOW" => scenario.growth_types_window = Some(window(value)?),
        "VIEW_DELTATRON_AGING" => scenario.view_deltatron_aging = boolean(value)?,
        "DELTATRON_AGING_WINDOW" => scenario.deltatron_aging_window = Some(window(value)?),

        "ECHO" => scenario.echo = boolean(value)?,
        "LOG" => scenario.log = boolean(value)?,
        "WRITE_COEFF_FILE" => scenario.write_coeff_file = boolean(value)?,
        "WRITE_AVG_FILE" => scenario.write_avg_file = boolean(value)?,
        "WRITE_STD_DEV_FILE" => scenario.write_std_dev_file = boolean(value)?,
        "LOG_BASE_STATISTICS" => scenario.log_base_statistics = boolean(value)?,
        "LOG_SLOPE_WEIGHTS" => scenario.log_slope_weights = boolean(value)?,
        "LOG_TRANSITION_MATRIX" => scenario.log_transition_matrix = boolean(value)?,
        "LOG_URBANIZATION_ATTEMPTS" => scenario.log_urbanization_attempts = boolean(value)?,
        "LOG_PROCESSING_STATUS" => scenario.log_processing_status = int(value)?,

        other => warn!(key = other, "ignoring unknown scenario key"),
    }
    Ok(())
}

fn int<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("'{value}' is not a valid integer"))
}

fn real(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| anyhow!("'{value}' is not a valid real number"))
}

fn boolean(value: &str) -> Result<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" => Ok(true),
        "NO" => Ok(false),
        _ => bail!("'{value}' is not a YES/NO value"),
    }
}

/// `0xRRGGBB` hex or `r,g,b` decimal.
fn color(value: &str) -> Result<Rgb> {
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        let packed = u32::from_str_radix(hex, 16)
            .map_err(|_| anyhow!("'{value}' is not a valid hex color"))?;
        if packed > 0xFF_FF_FF {
            bail!("'{value}' exceeds 24-bit color range");
        }
        return Ok(Rgb::new(
            (packed >> 16) as u8,
            (packed >> 8) as u8,
            packed as u8,
        ));
    }
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("'{value}' is neither 0xRRGGBB nor r,g,b");
    }
    let channel = |s: &str| -> Result<u8> {
        s.parse::<u8>()
            .map_err(|_| anyhow!("color channel '{s}' is not in 0..=255"))
    };
    Ok(Rgb::new(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
    ))
}

/// `start,stop` year pair.
fn window(value: &str) -> Result<(u16, u16)> {
    let (a, b) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("'{value}' is not a start,stop year window"))?;
    let start = int::<u16>(a.trim())?;
    let stop = int::<u16>(b.trim())?;
    if stop < start {
        bail!("window '{value}' ends before it starts");
    }
    Ok((start, stop))
}

/// `<grayscale> <name> <id> <color>`, whitespace separated.
fn land_class(value: &str) -> Result<LandClass> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.len() != 4 {
        bail!("'{value}' is not '<grayscale> <name> <id> <color>'");
    }
    let grayscale: Cell = int(tokens[0])?;
    Ok(LandClass::new(
        grayscale,
        &tokens[2].to_ascii_uppercase(),
        tokens[1],
        color(tokens[3])?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "\
# demo scenario
INPUT_DIR=data/input
OUTPUT_DIR=data/output

URBAN_DATA= demo.urban.1990.pgm
URBAN_DATA= demo.urban.1995.pgm   # second snapshot
ROAD_DATA= demo.roads.1990.pgm
SLOPE_DATA= demo.slope.pgm
EXCLUDED_DATA= demo.excluded.pgm

CALIBRATION_DIFFUSION_START=0
CALIBRATION_DIFFUSION_STOP=100
CALIBRATION_DIFFUSION_STEP=50
MONTE_CARLO_ITERATIONS=4
RANDOM_SEED=42
CRITICAL_SLOPE=21.0
VIEW_GROWTH_TYPES=YES
GROWTH_TYPES_WINDOW=1991,1995
LANDUSE_CLASS= 0 Unclassified UNC 0X000000
LANDUSE_CLASS= 1 Urban URB 0xC0C0C0
LANDUSE_CLASS= 2 Agriculture AGR 255,215,140
";

    #[test]
    fn full_scenario_parses() {
        let s = parse(SCENARIO).unwrap();
        assert_eq!(s.input_dir, PathBuf::from("data/input"));
        assert_eq!(s.urban_data.len(), 2);
        assert_eq!(s.urban_data[1], "demo.urban.1995.pgm");
        assert_eq!(s.calibration.diffusion.stop, 100);
        assert_eq!(s.monte_carlo_iterations, 4);
        assert_eq!(s.random_seed, 42);
        assert_eq!(s.critical_slope, 21.0);
        assert!(s.view_growth_types);
        assert_eq!(s.growth_types_window, Some((1991, 1995)));
        assert_eq!(s.landuse_classes.len(), 3);
        assert_eq!(s.landuse_classes[1].id, "URB");
        assert_eq!(s.landuse_classes[2].color, Rgb::new(255, 215, 140));
    }

    #[test]
    fn prediction_and_self_mod_keys_parse() {
        let s = parse(
            "PREDICTION_DIFFUSION_BEST_FIT=45\n\
             PREDICTION_BREED_BEST_FIT=30\n\
             PREDICTION_SPREAD_BEST_FIT=19\n\
             PREDICTION_SLOPE_BEST_FIT=60\n\
             PREDICTION_ROAD_BEST_FIT=21\n\
             PREDICTION_START_DATE=1995\n\
             PREDICTION_STOP_DATE=2030\n\
             BOOM=1.10\n\
             BUST=0.50\n\
             CRITICAL_LOW=0.9\n\
             CRITICAL_HIGH=1.5\n\
             ROAD_GRAV_SENSITIVITY=0.02\n\
             SLOPE_SENSITIVITY=0.2\n\
             NUM_WORKING_GRIDS=8\n\
             WRITE_COEFF_FILE=YES\n\
             WRITE_AVG_FILE=YES\n\
             WRITE_STD_DEV_FILE=NO\n\
             LOG_PROCESSING_STATUS=2\n\
             PROBABILITY_COLOR=0x0000FF\n\
             PROBABILITY_COLOR=0x00FF00\n\
             DELTATRON_COLOR=255,0,0\n",
        )
        .unwrap();
        let best = s.calibration.best_fit();
        assert_eq!(best.diffusion, 45.0);
        assert_eq!(best.road_gravity, 21.0);
        assert_eq!(s.prediction_stop_date, 2030);
        assert_eq!(s.boom, 1.10);
        assert_eq!(s.bust, 0.50);
        assert_eq!(s.num_working_grids, 8);
        assert!(s.write_coeff_file);
        assert!(s.write_avg_file);
        assert!(!s.write_std_dev_file);
        assert_eq!(s.log_processing_status, 2);
        assert_eq!(s.probability_colors.len(), 2);
        assert_eq!(s.deltatron_colors, vec![Rgb::new(255, 0, 0)]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let s = parse("WHIRLGIF_BINARY=/usr/bin/whirlgif\nRANDOM_SEED=7\n").unwrap();
        assert_eq!(s.random_seed, 7);
    }

    #[test]
    fn malformed_int_is_fatal() {
        assert!(parse("MONTE_CARLO_ITERATIONS=many\n").is_err());
    }

    #[test]
    fn malformed_bool_is_fatal() {
        assert!(parse("ECHO=maybe\n").is_err());
    }

    #[test]
    fn missing_equals_is_fatal() {
        assert!(parse("JUST A LINE\n").is_err());
    }

    #[test]
    fn hex_and_decimal_colors() {
        assert_eq!(color("0x102030").unwrap(), Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(color("1, 2, 3").unwrap(), Rgb::new(1, 2, 3));
        assert!(color("0x1234567").is_err());
        assert!(color("1,2").is_err());
    }

    #[test]
    fn inverted_window_is_fatal() {
        assert!(parse("GROWTH_TYPES_WINDOW=1995,1990\n").is_err());
    }
}
