//! Binary PGM (P5) raster codec.
//!
//! Input layers are 8-bit grayscale rasters; the P5 form carries exactly
//! the payload the engine consumes, so the palette-sanity rule of the
//! legacy indexed formats (red = green = blue for every entry) holds by
//! construction. Reads are lossless against writes.

use sprawl_core::{Cell, Grid, SprawlError, SprawlResult};
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8] = b"P5";

struct HeaderScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderScanner<'a> {
    fn new(bytes: &'a [u8]) -> HeaderScanner<'a> {
        HeaderScanner { bytes, pos: 0 }
    }

    /// Skip whitespace and `#` comments (which run to end of line).
    fn skip_separators(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b'#' {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> SprawlResult<&'a [u8]> {
        self.skip_separators();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(SprawlError::Parse("truncated PGM header".to_string()));
        }
        Ok(&self.bytes[start..self.pos])
    }

    fn number(&mut self, what: &str) -> SprawlResult<usize> {
        let token = self.token()?;
        std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                SprawlError::Parse(format!(
                    "bad PGM {what}: {:?}",
                    String::from_utf8_lossy(token)
                ))
            })
    }
}

fn decode(bytes: &[u8], path: &Path) -> SprawlResult<Grid> {
    let mut scanner = HeaderScanner::new(bytes);
    if scanner.token()? != MAGIC {
        return Err(SprawlError::Parse(format!(
            "{} is not a binary PGM (P5) file",
            path.display()
        )));
    }
    let cols = scanner.number("width")?;
    let rows = scanner.number("height")?;
    let maxval = scanner.number("maxval")?;
    if rows == 0 || cols == 0 {
        return Err(SprawlError::Validation(format!(
            "{} has degenerate dimensions {rows}x{cols}",
            path.display()
        )));
    }
    if maxval == 0 || maxval > 255 {
        return Err(SprawlError::Validation(format!(
            "{} has maxval {maxval}; only 8-bit grayscale is supported",
            path.display()
        )));
    }
    // exactly one separator byte between maxval and the raster
    let data_start = scanner.pos + 1;
    let expected = rows * cols;
    let raster = bytes
        .get(data_start..data_start + expected)
        .ok_or_else(|| {
            SprawlError::Parse(format!(
                "{} raster truncated: expected {expected} bytes",
                path.display()
            ))
        })?;
    let cells: Vec<Cell> = raster.iter().map(|&b| b as Cell).collect();
    let mut grid = Grid::from_cells(rows, cols, cells)?;
    grid.source = Some(path.to_path_buf());
    Ok(grid)
}

/// Read an 8-bit grayscale PGM into a fresh grid.
pub fn read_pgm(path: &Path) -> SprawlResult<Grid> {
    let bytes = fs::read(path)?;
    decode(&bytes, path)
}

/// Read an 8-bit grayscale PGM into an existing (pool-provided) grid.
/// The file's dimensions must match the slot's.
pub fn read_pgm_into(path: &Path, slot: &mut Grid) -> SprawlResult<()> {
    let grid = read_pgm(path)?;
    if (grid.rows(), grid.cols()) != (slot.rows(), slot.cols()) {
        return Err(SprawlError::Validation(format!(
            "{} is {}x{}, expected {}x{}",
            path.display(),
            grid.rows(),
            grid.cols(),
            slot.rows(),
            slot.cols()
        )));
    }
    slot.copy_from(&grid);
    slot.rescan();
    slot.source = Some(path.to_path_buf());
    slot.year = grid.year;
    Ok(())
}

/// Write a grid as binary PGM. Values must fit in 8 bits; a `date` string
/// (when given) is carried as a header comment.
pub fn write_pgm(path: &Path, grid: &Grid, date: Option<&str>) -> SprawlResult<()> {
    let mut out = Vec::with_capacity(grid.len() + 64);
    out.extend_from_slice(MAGIC);
    out.push(b'\n');
    if let Some(date) = date {
        writeln!(out, "# date {date}").expect("vec write");
    }
    writeln!(out, "{} {}\n255", grid.cols(), grid.rows()).expect("vec write");
    for &v in grid.data() {
        if v > 255 {
            return Err(SprawlError::Validation(format!(
                "cell value {v} does not fit an 8-bit raster ({})",
                path.display()
            )));
        }
        out.push(v as u8);
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_is_lossless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.pgm");
        let grid = Grid::from_cells(3, 4, (0..12).map(|v| (v * 20) as Cell).collect()).unwrap();
        write_pgm(&path, &grid, Some("1990")).unwrap();
        let back = read_pgm(&path).unwrap();
        assert_eq!(back.rows(), 3);
        assert_eq!(back.cols(), 4);
        assert_eq!(back.data(), grid.data());
        assert_eq!(back.max, grid.max);
    }

    #[test]
    fn comments_in_header_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commented.pgm");
        fs::write(&path, b"P5\n# a comment\n2 # inline\n2\n255\n\x01\x02\x03\x04").unwrap();
        let grid = read_pgm(&path).unwrap();
        assert_eq!(grid.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn truncated_raster_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.pgm");
        fs::write(&path, b"P5\n4 4\n255\n\x00\x00").unwrap();
        assert!(matches!(read_pgm(&path), Err(SprawlError::Parse(_))));
    }

    #[test]
    fn wide_maxval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.pgm");
        fs::write(&path, b"P5\n1 1\n65535\n\x00\x00").unwrap();
        assert!(matches!(read_pgm(&path), Err(SprawlError::Validation(_))));
    }

    #[test]
    fn oversized_cells_refuse_to_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide_cell.pgm");
        let grid = Grid::from_cells(1, 1, vec![300]).unwrap();
        assert!(matches!(
            write_pgm(&path, &grid, None),
            Err(SprawlError::Validation(_))
        ));
    }

    #[test]
    fn read_into_slot_checks_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slot.pgm");
        let grid = Grid::from_cells(2, 2, vec![9, 8, 7, 6]).unwrap();
        write_pgm(&path, &grid, None).unwrap();

        let mut slot = Grid::new(2, 2);
        read_pgm_into(&path, &mut slot).unwrap();
        assert_eq!(slot.data(), &[9, 8, 7, 6]);
        assert_eq!(slot.max, 9);

        let mut wrong = Grid::new(3, 3);
        assert!(read_pgm_into(&path, &mut wrong).is_err());
    }
}
