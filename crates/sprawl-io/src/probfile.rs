//! Annual land-class probability counters.
//!
//! During a prediction run with land cover enabled, every simulated year
//! increments one counter per (class, pixel) wherever the working land
//! grid holds that class. The counters live in a binary side file
//! (`annual_class_probabilities_0`, u32 little-endian planes in class
//! order) sized `num_classes x total_pixels`; after the run the planes
//! are folded into the most-probable-class and uncertainty images and
//! the file is deleted.

use sprawl_core::{SprawlError, SprawlResult};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub fn annual_prob_path(output_dir: &Path) -> PathBuf {
    output_dir.join("annual_class_probabilities_0")
}

/// Create the zero-filled counter file.
pub fn init(path: &Path, num_classes: usize, total_pixels: usize) -> SprawlResult<()> {
    let zeros = vec![0u8; num_classes * total_pixels * 4];
    fs::write(path, zeros)?;
    Ok(())
}

/// Increment one counter per pixel: plane `ordinals[i]` at pixel `i`.
pub fn update(path: &Path, num_classes: usize, ordinals: &[usize]) -> SprawlResult<()> {
    let total = ordinals.len();
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut plane = vec![0u8; total * 4];
    for class in 0..num_classes {
        let offset = (class * total * 4) as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut plane)?;
        for (i, &ordinal) in ordinals.iter().enumerate() {
            if ordinal == class {
                let at = i * 4;
                let count = u32::from_le_bytes(plane[at..at + 4].try_into().expect("4 bytes"));
                plane[at..at + 4].copy_from_slice(&(count + 1).to_le_bytes());
            }
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&plane)?;
    }
    Ok(())
}

/// Read every class plane back.
pub fn read_planes(
    path: &Path,
    num_classes: usize,
    total_pixels: usize,
) -> SprawlResult<Vec<Vec<u32>>> {
    let bytes = fs::read(path)?;
    let expected = num_classes * total_pixels * 4;
    if bytes.len() != expected {
        return Err(SprawlError::Parse(format!(
            "class probability file {} holds {} bytes, expected {expected}",
            path.display(),
            bytes.len()
        )));
    }
    let mut planes = Vec::with_capacity(num_classes);
    for class in 0..num_classes {
        let plane = bytes[class * total_pixels * 4..(class + 1) * total_pixels * 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().expect("4 bytes")))
            .collect();
        planes.push(plane);
    }
    Ok(planes)
}

/// Delete the consumed counter file.
pub fn remove(path: &Path) -> SprawlResult<()> {
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counters_accumulate_per_year() {
        let dir = tempdir().unwrap();
        let path = annual_prob_path(dir.path());
        init(&path, 3, 4).unwrap();

        update(&path, 3, &[0, 1, 2, 1]).unwrap();
        update(&path, 3, &[0, 1, 1, 1]).unwrap();

        let planes = read_planes(&path, 3, 4).unwrap();
        assert_eq!(planes[0], vec![2, 0, 0, 0]);
        assert_eq!(planes[1], vec![0, 2, 1, 2]);
        assert_eq!(planes[2], vec![0, 0, 1, 0]);

        // counters across classes sum to years-updated per pixel
        for i in 0..4 {
            let sum: u32 = planes.iter().map(|p| p[i]).sum();
            assert_eq!(sum, 2);
        }
        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn truncated_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = annual_prob_path(dir.path());
        fs::write(&path, [0u8; 10]).unwrap();
        assert!(matches!(
            read_planes(&path, 2, 4),
            Err(SprawlError::Parse(_))
        ));
    }
}
