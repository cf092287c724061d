//! Input layer assembly and validation.
//!
//! The scenario names its input rasters; this module loads them through
//! the input pool, orders the dated series by year, enforces the
//! cross-layer invariants and prepares the derived quantities the engine
//! consumes (normalized road values, per-year road pixel counts, the
//! excluded pixel count).
//!
//! Dated filenames follow `<location>.<tag>.<year>.<ext>`: the third
//! dot-separated field is a four-digit year and the first field is the
//! location, which must agree across every dated input.

use crate::pgm;
use sprawl_core::{Cell, CmpOp, Grid, InputPool, SprawlError, SprawlResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Urbanization is forbidden wherever the exclusion layer is at or above
/// this value.
pub const EXCLUDED_THRESHOLD: Cell = 100;

/// Road values are rebased to this ceiling by normalization.
pub const MAX_ROAD_VALUE: Cell = 100;

/// File names of every input layer, relative to `input_dir`.
#[derive(Debug, Clone, Default)]
pub struct LayerSpec {
    pub input_dir: PathBuf,
    pub urban: Vec<String>,
    pub roads: Vec<String>,
    pub landuse: Vec<String>,
    pub excluded: Option<String>,
    pub slope: String,
    pub background: Option<String>,
}

/// The loaded, validated and normalized input raster set.
#[derive(Debug)]
pub struct InputLayers {
    pub location: String,
    /// Urban snapshots in ascending year order.
    pub urban: Vec<Grid>,
    /// Road layers in ascending year order, normalized to 0..=100.
    pub roads: Vec<Grid>,
    /// Zero or two land-cover snapshots in ascending year order.
    pub landuse: Vec<Grid>,
    /// Exclusion mask; all zero when the scenario declares none.
    pub excluded: Grid,
    /// Percent slope, 0..=255.
    pub slope: Grid,
    /// Optional visual background, dimension-checked but otherwise unused
    /// by the simulation core.
    pub background: Option<Grid>,
    /// Road pixels (value > 0) per road layer, after normalization.
    pub road_pixel_counts: Vec<usize>,
    /// Road pixels as a percentage of the image, per road layer.
    pub road_percents: Vec<f64>,
    /// Pixels at or above [`EXCLUDED_THRESHOLD`] in the exclusion mask.
    pub excluded_count: usize,
    rows: usize,
    cols: usize,
}

/// Split a dated filename into (location, year).
pub fn parse_dated_name(name: &str) -> SprawlResult<(String, u16)> {
    let fields: Vec<&str> = name.split('.').collect();
    if fields.len() < 4 {
        return Err(SprawlError::Parse(format!(
            "dated filename '{name}' is not <location>.<tag>.<year>.<ext>"
        )));
    }
    let year_field = fields[2];
    if year_field.len() != 4 || !year_field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SprawlError::Parse(format!(
            "dated filename '{name}' carries year field '{year_field}', expected 4 digits"
        )));
    }
    let year: u16 = year_field
        .parse()
        .map_err(|_| SprawlError::Parse(format!("bad year in '{name}'")))?;
    Ok((fields[0].to_string(), year))
}

fn load_dated(
    pool: &mut InputPool,
    dir: &Path,
    names: &[String],
    kind: &str,
    location: &mut Option<String>,
) -> SprawlResult<Vec<Grid>> {
    let mut grids = Vec::with_capacity(names.len());
    for name in names {
        let (file_location, year) = parse_dated_name(name)?;
        match location {
            Some(existing) if *existing != file_location => {
                return Err(SprawlError::Validation(format!(
                    "{kind} layer '{name}' uses location '{file_location}', \
                     other dated inputs use '{existing}'"
                )));
            }
            Some(_) => {}
            None => *location = Some(file_location),
        }
        let mut slot = pool.acquire(name)?;
        pgm::read_pgm_into(&dir.join(name), &mut slot)?;
        slot.year = Some(year);
        grids.push(slot);
    }
    grids.sort_by_key(|g| g.year);
    for pair in grids.windows(2) {
        if pair[0].year == pair[1].year {
            return Err(SprawlError::Validation(format!(
                "two {kind} layers share year {}",
                pair[0].year.unwrap_or_default()
            )));
        }
    }
    Ok(grids)
}

impl InputLayers {
    /// Load every layer named by the spec, then validate and normalize.
    pub fn load(spec: &LayerSpec) -> SprawlResult<InputLayers> {
        if spec.urban.is_empty() {
            return Err(SprawlError::Config(
                "scenario names no URBAN_DATA layers".to_string(),
            ));
        }
        if spec.roads.is_empty() {
            return Err(SprawlError::Config(
                "scenario names no ROAD_DATA layers".to_string(),
            ));
        }
        if !matches!(spec.landuse.len(), 0 | 2) {
            return Err(SprawlError::Config(format!(
                "scenario names {} LANDUSE_DATA layers; land-cover runs need exactly 2",
                spec.landuse.len()
            )));
        }

        // First urban layer fixes the image dimensions for the run.
        let first = pgm::read_pgm(&spec.input_dir.join(&spec.urban[0]))?;
        let (rows, cols) = (first.rows(), first.cols());
        let slots = spec.urban.len()
            + spec.roads.len()
            + spec.landuse.len()
            + spec.excluded.iter().count()
            + spec.background.iter().count()
            + 1;
        let mut pool = InputPool::new(rows, cols, slots);

        let mut location = None;
        let urban = load_dated(&mut pool, &spec.input_dir, &spec.urban, "urban", &mut location)?;
        let roads = load_dated(&mut pool, &spec.input_dir, &spec.roads, "road", &mut location)?;
        let landuse = load_dated(
            &mut pool,
            &spec.input_dir,
            &spec.landuse,
            "landuse",
            &mut location,
        )?;

        let mut slope = pool.acquire(&spec.slope)?;
        pgm::read_pgm_into(&spec.input_dir.join(&spec.slope), &mut slope)?;

        let excluded = match &spec.excluded {
            Some(name) => {
                let mut grid = pool.acquire(name)?;
                pgm::read_pgm_into(&spec.input_dir.join(name), &mut grid)?;
                grid
            }
            None => Grid::new(rows, cols),
        };

        let background = match &spec.background {
            Some(name) => {
                let mut grid = pool.acquire(name)?;
                pgm::read_pgm_into(&spec.input_dir.join(name), &mut grid)?;
                Some(grid)
            }
            None => None,
        };

        let location = location.expect("urban layers are dated");
        info!(
            location,
            rows,
            cols,
            urban_years = urban.len(),
            road_years = roads.len(),
            "input layers loaded"
        );
        Self::assemble(location, urban, roads, landuse, excluded, slope, background)
    }

    /// Assemble from already-decoded grids (tests and embedded callers).
    /// Runs the same validation and normalization as [`InputLayers::load`].
    pub fn from_grids(
        location: &str,
        urban: Vec<Grid>,
        roads: Vec<Grid>,
        landuse: Vec<Grid>,
        excluded: Grid,
        slope: Grid,
        background: Option<Grid>,
    ) -> SprawlResult<InputLayers> {
        Self::assemble(
            location.to_string(),
            urban,
            roads,
            landuse,
            excluded,
            slope,
            background,
        )
    }

    fn assemble(
        location: String,
        urban: Vec<Grid>,
        mut roads: Vec<Grid>,
        landuse: Vec<Grid>,
        mut excluded: Grid,
        slope: Grid,
        background: Option<Grid>,
    ) -> SprawlResult<InputLayers> {
        let (rows, cols) = (slope.rows(), slope.cols());
        let all_same = urban
            .iter()
            .chain(roads.iter())
            .chain(landuse.iter())
            .chain(std::iter::once(&excluded))
            .chain(std::iter::once(&slope))
            .chain(background.iter())
            .all(|g| g.rows() == rows && g.cols() == cols);
        if !all_same {
            return Err(SprawlError::Validation(format!(
                "input rasters disagree on dimensions (expected {rows}x{cols})"
            )));
        }

        let total = rows * cols;
        for grid in &urban {
            let populated = grid.count_where(CmpOp::Gt, 0);
            if populated == 0 {
                return Err(SprawlError::Validation(format!(
                    "urban layer for {} contains no urban pixels",
                    grid.year.unwrap_or_default()
                )));
            }
            if populated == total {
                return Err(SprawlError::Validation(format!(
                    "urban layer for {} is entirely urban; nothing can grow",
                    grid.year.unwrap_or_default()
                )));
            }
        }

        if !landuse.is_empty() {
            let last_urban = urban.last().and_then(|g| g.year);
            let last_land = landuse.last().and_then(|g| g.year);
            if last_urban != last_land {
                return Err(SprawlError::Validation(format!(
                    "last urban year {:?} and last land-cover year {:?} disagree",
                    last_urban, last_land
                )));
            }
        }

        normalize_roads(&mut roads)?;
        let road_pixel_counts: Vec<usize> =
            roads.iter().map(|g| g.count_where(CmpOp::Gt, 0)).collect();
        let road_percents: Vec<f64> = road_pixel_counts
            .iter()
            .map(|&n| 100.0 * n as f64 / total as f64)
            .collect();

        excluded.rescan();
        let excluded_count = excluded.count_where(CmpOp::Ge, EXCLUDED_THRESHOLD);

        Ok(InputLayers {
            location,
            urban,
            roads,
            landuse,
            excluded,
            slope,
            background,
            road_pixel_counts,
            road_percents,
            excluded_count,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn total_pixels(&self) -> usize {
        self.rows * self.cols
    }

    pub fn urban_count(&self) -> usize {
        self.urban.len()
    }

    pub fn urban_year(&self, index: usize) -> u16 {
        self.urban[index].year.expect("urban layers are dated")
    }

    pub fn last_urban_year(&self) -> u16 {
        self.urban_year(self.urban.len() - 1)
    }

    /// Index into the urban series for an observed year.
    pub fn urban_index_of_year(&self, year: u16) -> Option<usize> {
        self.urban.iter().position(|g| g.year == Some(year))
    }

    pub fn is_urban_year(&self, year: u16) -> bool {
        self.urban_index_of_year(year).is_some()
    }

    pub fn landuse_year(&self, index: usize) -> u16 {
        self.landuse[index].year.expect("landuse layers are dated")
    }

    pub fn doing_landuse(&self) -> bool {
        self.landuse.len() == 2
    }

    /// The road layer in force for `year`: the latest layer whose year is
    /// at or before it, else the earliest layer.
    pub fn road_index_for_year(&self, year: u16) -> usize {
        self.roads
            .iter()
            .rposition(|g| g.year.unwrap_or(0) <= year)
            .unwrap_or(0)
    }

    pub fn road_for_year(&self, year: u16) -> &Grid {
        &self.roads[self.road_index_for_year(year)]
    }

    pub fn road_pixel_count_for_year(&self, year: u16) -> usize {
        self.road_pixel_counts[self.road_index_for_year(year)]
    }

    pub fn road_percent_for_year(&self, year: u16) -> f64 {
        self.road_percents[self.road_index_for_year(year)]
    }

    /// Per-layer summary table for the run log.
    pub fn render_summary(&self) -> String {
        use std::fmt::Write as _;
        let mut out = format!(
            "input layers for '{}' ({}x{}, {} excluded pixels)\n",
            self.location,
            self.rows,
            self.cols,
            self.excluded_count
        );
        let mut line = |kind: &str, grid: &Grid| {
            let year = grid
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string());
            let source = grid
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".to_string());
            let _ = writeln!(
                out,
                "  {kind:<10} {year:>5}  min {:3}  max {:3}  {source}",
                grid.min, grid.max
            );
        };
        for grid in &self.urban {
            line("urban", grid);
        }
        for grid in &self.roads {
            line("road", grid);
        }
        for grid in &self.landuse {
            line("landuse", grid);
        }
        line("slope", &self.slope);
        line("excluded", &self.excluded);
        if let Some(background) = &self.background {
            line("background", background);
        }
        out
    }
}

/// Rescale every road grid to `((100 * value) / grid_max) * (grid_max /
/// max_over_all_grids)`: each grid is rebased to 0..=100 while the
/// relative magnitude across years is preserved.
fn normalize_roads(roads: &mut [Grid]) -> SprawlResult<()> {
    let mut max_of_max: Cell = 0;
    for grid in roads.iter_mut() {
        grid.rescan();
        if grid.max == 0 {
            return Err(SprawlError::Validation(format!(
                "road layer for {} contains no road pixels",
                grid.year.unwrap_or_default()
            )));
        }
        max_of_max = max_of_max.max(grid.max);
    }
    for grid in roads.iter_mut() {
        let image_max = grid.max as f64;
        let norm_factor = image_max / max_of_max as f64;
        for v in grid.data_mut() {
            *v = ((100.0 * *v as f64) / image_max * norm_factor) as Cell;
        }
        grid.rescan();
    }
    Ok(())
}
