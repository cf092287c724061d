//! Raw grid dump/slurp.
//!
//! The cumulate grid round-trips through a scratch file between Monte
//! Carlo realizations outside calibration. The payload is the interior
//! cell buffer as little-endian u16 words; like the other binary side
//! files it is only ever read back by the process that wrote it.

use sprawl_core::{Cell, Grid, SprawlError, SprawlResult};
use std::fs;
use std::path::Path;

pub fn dump_grid(path: &Path, grid: &Grid) -> SprawlResult<()> {
    let mut bytes = Vec::with_capacity(grid.len() * 2);
    for &v in grid.data() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

pub fn slurp_grid(path: &Path, grid: &mut Grid) -> SprawlResult<()> {
    let bytes = fs::read(path)?;
    if bytes.len() != grid.len() * 2 {
        return Err(SprawlError::Parse(format!(
            "grid dump {} holds {} bytes, expected {}",
            path.display(),
            bytes.len(),
            grid.len() * 2
        )));
    }
    for (cell, chunk) in grid.data_mut().iter_mut().zip(bytes.chunks_exact(2)) {
        *cell = Cell::from_le_bytes(chunk.try_into().expect("2-byte chunk"));
    }
    Ok(())
}
