//! Restart checkpoint file.
//!
//! Before each sweep tuple the driver records the tuple's coefficients,
//! the base random seed and the run index. Restart mode reads the file
//! back and resumes the sweep there. Layout: seven little-endian i64
//! words in natural order (diffusion, breed, spread, slope resistance,
//! road gravity, seed, run); only the writing process's own files are
//! ever read back.

use sprawl_core::{SprawlError, SprawlResult};
use std::fs;
use std::path::{Path, PathBuf};

pub const RESTART_FILE: &str = "restart_file.data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartState {
    pub diffusion: u32,
    pub breed: u32,
    pub spread: u32,
    pub slope_resistance: u32,
    pub road_gravity: u32,
    pub seed: i64,
    pub run: usize,
}

pub fn restart_path(output_dir: &Path) -> PathBuf {
    output_dir.join(RESTART_FILE)
}

pub fn write_restart(path: &Path, state: &RestartState) -> SprawlResult<()> {
    let words: [i64; 7] = [
        state.diffusion as i64,
        state.breed as i64,
        state.spread as i64,
        state.slope_resistance as i64,
        state.road_gravity as i64,
        state.seed,
        state.run as i64,
    ];
    let mut bytes = Vec::with_capacity(7 * 8);
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read_restart(path: &Path) -> SprawlResult<RestartState> {
    let bytes = fs::read(path)?;
    if bytes.len() != 7 * 8 {
        return Err(SprawlError::Parse(format!(
            "restart file {} holds {} bytes, expected {}",
            path.display(),
            bytes.len(),
            7 * 8
        )));
    }
    let mut words = [0i64; 7];
    for (i, chunk) in bytes.chunks_exact(8).enumerate() {
        words[i] = i64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
    }
    let coeff = |w: i64, name: &str| -> SprawlResult<u32> {
        u32::try_from(w).map_err(|_| {
            SprawlError::Parse(format!("restart field {name} out of range: {w}"))
        })
    };
    Ok(RestartState {
        diffusion: coeff(words[0], "diffusion")?,
        breed: coeff(words[1], "breed")?,
        spread: coeff(words[2], "spread")?,
        slope_resistance: coeff(words[3], "slope_resistance")?,
        road_gravity: coeff(words[4], "road_gravity")?,
        seed: words[5],
        run: usize::try_from(words[6])
            .map_err(|_| SprawlError::Parse(format!("restart run out of range: {}", words[6])))?,
    })
}
