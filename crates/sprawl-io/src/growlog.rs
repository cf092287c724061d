//! Per-(run, year) grow logs.
//!
//! Every Monte Carlo realization appends one binary statistics record to
//! `grow_<run>_<year>.log`; after the tuple's realizations finish, the
//! aggregation step streams the records back to form averages and
//! standard deviations, then deletes the file. Record layout: run, monte
//! carlo index and year as little-endian u64 words followed by the 23
//! statistics fields as little-endian f64.

use sprawl_core::{SprawlError, SprawlResult, UrbanStats, URBAN_STATS_FIELDS};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const RECORD_BYTES: usize = 3 * 8 + URBAN_STATS_FIELDS * 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowLogRecord {
    pub run: usize,
    pub monte_carlo: usize,
    pub year: u16,
    pub stats: UrbanStats,
}

pub fn grow_log_path(output_dir: &Path, run: usize, year: u16) -> PathBuf {
    output_dir.join(format!("grow_{run}_{year}.log"))
}

pub fn append_record(path: &Path, record: &GrowLogRecord) -> SprawlResult<()> {
    let mut bytes = Vec::with_capacity(RECORD_BYTES);
    bytes.extend_from_slice(&(record.run as u64).to_le_bytes());
    bytes.extend_from_slice(&(record.monte_carlo as u64).to_le_bytes());
    bytes.extend_from_slice(&(record.year as u64).to_le_bytes());
    for field in record.stats.to_array() {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

pub fn read_records(path: &Path) -> SprawlResult<Vec<GrowLogRecord>> {
    let bytes = fs::read(path)?;
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(SprawlError::Parse(format!(
            "grow log {} holds {} bytes, not a multiple of the {}-byte record",
            path.display(),
            bytes.len(),
            RECORD_BYTES
        )));
    }
    let mut records = Vec::with_capacity(bytes.len() / RECORD_BYTES);
    for chunk in bytes.chunks_exact(RECORD_BYTES) {
        let word = |i: usize| -> u64 {
            u64::from_le_bytes(chunk[i * 8..(i + 1) * 8].try_into().expect("8-byte word"))
        };
        let mut fields = [0.0f64; URBAN_STATS_FIELDS];
        for (k, field) in fields.iter_mut().enumerate() {
            let at = (3 + k) * 8;
            *field = f64::from_le_bytes(chunk[at..at + 8].try_into().expect("8-byte word"));
        }
        records.push(GrowLogRecord {
            run: word(0) as usize,
            monte_carlo: word(1) as usize,
            year: word(2) as u16,
            stats: UrbanStats::from_array(fields),
        });
    }
    Ok(records)
}

/// Delete a consumed grow log.
pub fn remove_log(path: &Path) -> SprawlResult<()> {
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = grow_log_path(dir.path(), 3, 1995);
        for mc in 0..4 {
            let mut stats = UrbanStats::default();
            stats.pop = 100.0 + mc as f64;
            stats.leesalee = 0.25 * mc as f64;
            append_record(
                &path,
                &GrowLogRecord {
                    run: 3,
                    monte_carlo: mc,
                    year: 1995,
                    stats,
                },
            )
            .unwrap();
        }
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].monte_carlo, 2);
        assert_eq!(records[2].stats.pop, 102.0);

        remove_log(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn ragged_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grow_0_1990.log");
        fs::write(&path, [1u8; 13]).unwrap();
        assert!(matches!(read_records(&path), Err(SprawlError::Parse(_))));
    }
}
