//! Per-year grid image emission.
//!
//! Filenames carry the run / Monte Carlo / year stamps the downstream
//! tooling expects; payloads are the grids themselves written through
//! the grayscale codec (colortable construction is outside the core).

use sprawl_core::{Grid, SprawlResult};
use sprawl_io::pgm;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn growth_types_path(out_dir: &Path, run: usize, mc: usize, year: u16) -> PathBuf {
    out_dir.join(format!("z_growth_types_{run}_{mc}_{year}.pgm"))
}

pub fn deltatron_age_path(out_dir: &Path, run: usize, mc: usize, year: u16) -> PathBuf {
    out_dir.join(format!("deltatron_{run}_{mc}_{year}.pgm"))
}

pub fn land_n_urban_path(out_dir: &Path, location: &str, year: u16) -> PathBuf {
    out_dir.join(format!("{location}_land_n_urban.{year}.pgm"))
}

pub fn annual_urban_path(out_dir: &Path, location: &str, year: u16) -> PathBuf {
    out_dir.join(format!("{location}_urban_{year}.pgm"))
}

pub fn cumulate_urban_path(out_dir: &Path) -> PathBuf {
    out_dir.join("cumulate_urban.pgm")
}

pub fn cumulative_probability_path(out_dir: &Path, location: &str) -> PathBuf {
    out_dir.join(format!("{location}_cumcolor_urban.pgm"))
}

pub fn landuse_probability_path(out_dir: &Path) -> PathBuf {
    out_dir.join("cumcolor_landuse.pgm")
}

pub fn landuse_uncertainty_path(out_dir: &Path) -> PathBuf {
    out_dir.join("uncertainty.landuse.pgm")
}

/// Write a grid image stamped with its year.
pub fn write_dated(path: &Path, grid: &Grid, year: u16) -> SprawlResult<()> {
    debug!(path = %path.display(), year, "writing grid image");
    pgm::write_pgm(path, grid, Some(&year.to_string()))
}

/// Write an undated grid image.
pub fn write_plain(path: &Path, grid: &Grid) -> SprawlResult<()> {
    debug!(path = %path.display(), "writing grid image");
    pgm::write_pgm(path, grid, None)
}
