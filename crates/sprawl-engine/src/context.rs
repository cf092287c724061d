//! Simulation contexts.
//!
//! [`SimContext`] is the immutable-after-init view of one campaign:
//! scenario, validated input layers, land-class table, transition matrix
//! and the observed base statistics calibration compares against. Each
//! worker owns a [`WorkerState`] bundling its grid pool, random stream,
//! coefficient state and statistics, so the parallel sweep shares
//! nothing mutable.

use crate::stats::{self, StatsState};
use crate::transition::TransitionTable;
use anyhow::{Context, Result};
use sprawl_core::{
    ClassTable, CoeffState, Coefficients, Grid, ObservedStats, RandomStream, SprawlError,
    SprawlResult, TimerRegistry, WorkerPool,
};
use sprawl_io::layers::{InputLayers, LayerSpec};
use sprawl_scenarios::{ProcessingMode, Scenario};
use tracing::info;

/// Persistent grids a worker holds for the lifetime of one Monte Carlo
/// realization series.
pub const PERSISTENT_GRIDS: usize = 5;

/// Immutable campaign context shared by every worker.
#[derive(Debug)]
pub struct SimContext {
    pub scenario: Scenario,
    pub mode: ProcessingMode,
    pub layers: InputLayers,
    /// Present when land cover is enabled.
    pub classes: Option<ClassTable>,
    /// Present when land cover is enabled.
    pub transition: Option<TransitionTable>,
    /// Base statistics of each observed urban year.
    pub observed: Vec<ObservedStats>,
    pub start_year: u16,
    pub stop_year: u16,
}

impl SimContext {
    /// Load the full context from the scenario's input files.
    pub fn load(scenario: Scenario, mode: ProcessingMode) -> Result<SimContext> {
        scenario.validate(mode)?;
        let spec = LayerSpec {
            input_dir: scenario.input_dir.clone(),
            urban: scenario.urban_data.clone(),
            roads: scenario.road_data.clone(),
            landuse: scenario.landuse_data.clone(),
            excluded: scenario.excluded_data.clone(),
            slope: scenario
                .slope_data
                .clone()
                .expect("validated scenario has slope data"),
            background: scenario.background_data.clone(),
        };
        let layers = InputLayers::load(&spec).context("loading input layers")?;
        Ok(Self::from_parts(scenario, mode, layers)?)
    }

    /// Build the context from already-assembled layers (tests, embedded
    /// callers). Performs the cross-layer checks that depend on mode and
    /// the land-class table, computes the transition matrix and the
    /// observed base statistics.
    pub fn from_parts(
        scenario: Scenario,
        mode: ProcessingMode,
        layers: InputLayers,
    ) -> SprawlResult<SimContext> {
        if mode.is_calibrating() && layers.urban_count() < 2 {
            return Err(SprawlError::Validation(
                "calibration needs at least two observed urban years".to_string(),
            ));
        }

        let (classes, transition) = if layers.doing_landuse() {
            let classes = ClassTable::new(scenario.landuse_classes.clone())?;
            for grid in &layers.landuse {
                for &v in grid.data() {
                    if !classes.is_declared(v) {
                        return Err(SprawlError::Validation(format!(
                            "land-cover layer for {} holds value {v}, which no \
                             LANDUSE_CLASS declares",
                            grid.year.unwrap_or_default()
                        )));
                    }
                }
            }
            let transition = TransitionTable::build(
                &classes,
                &layers.landuse[0],
                &layers.landuse[1],
                &layers.slope,
            )?;
            (Some(classes), Some(transition))
        } else {
            (None, None)
        };

        let observed = compute_observed(&layers)?;

        let (start_year, stop_year) = if mode == ProcessingMode::Predict {
            (
                scenario.prediction_start_date,
                scenario.prediction_stop_date,
            )
        } else {
            (layers.urban_year(0), layers.last_urban_year())
        };

        info!(
            mode = mode.as_str(),
            start_year, stop_year, "simulation context ready"
        );
        Ok(SimContext {
            scenario,
            mode,
            layers,
            classes,
            transition,
            observed,
            start_year,
            stop_year,
        })
    }

    pub fn rows(&self) -> usize {
        self.layers.rows()
    }

    pub fn cols(&self) -> usize {
        self.layers.cols()
    }

    pub fn total_pixels(&self) -> usize {
        self.layers.total_pixels()
    }

    /// Number of sweep tuples this campaign will run.
    pub fn total_runs(&self) -> usize {
        match self.mode {
            ProcessingMode::Predict => 1,
            _ => self.scenario.calibration.total_tuples(),
        }
    }
}

/// Base statistics of every observed urban year, measured once at init.
fn compute_observed(layers: &InputLayers) -> SprawlResult<Vec<ObservedStats>> {
    let mut visited = Grid::new(layers.rows(), layers.cols());
    let mut clusters = Grid::new(layers.rows(), layers.cols());
    let total = layers.total_pixels() as f64;
    let excluded = layers.excluded_count as f64;
    layers
        .urban
        .iter()
        .map(|urban| {
            let mut observed =
                stats::compute_spatial(urban, &layers.slope, &mut visited, &mut clusters)?;
            let year = urban.year.unwrap_or_default();
            let road_pixels = layers.road_pixel_count_for_year(year) as f64;
            observed.percent_urban =
                100.0 * 100.0 * (observed.pop + road_pixels) / (total - road_pixels - excluded);
            Ok(observed)
        })
        .collect()
}

/// Persistent simulation grids for one worker.
#[derive(Debug)]
pub struct RunGrids {
    /// Current urban grid.
    pub z: Grid,
    /// Working land-cover grid.
    pub land1: Grid,
    /// Deltatron output land-cover grid.
    pub land2: Grid,
    /// Deltatron age/state grid.
    pub deltatron: Grid,
    /// Per-tuple Monte Carlo accumulation grid.
    pub cumulate: Grid,
}

impl RunGrids {
    pub fn acquire(pool: &WorkerPool) -> SprawlResult<RunGrids> {
        Ok(RunGrids {
            z: pool.acquire_persistent("z")?,
            land1: pool.acquire_persistent("land1")?,
            land2: pool.acquire_persistent("land2")?,
            deltatron: pool.acquire_persistent("deltatron")?,
            cumulate: pool.acquire_persistent("cumulate")?,
        })
    }

    pub fn release(self, pool: &WorkerPool) {
        pool.release_persistent(self.z);
        pool.release_persistent(self.land1);
        pool.release_persistent(self.land2);
        pool.release_persistent(self.deltatron);
        pool.release_persistent(self.cumulate);
    }
}

/// Everything one worker owns while running a sweep tuple.
#[derive(Debug)]
pub struct WorkerState {
    pub pool: WorkerPool,
    pub rng: RandomStream,
    pub coeffs: CoeffState,
    pub stats: StatsState,
    pub timers: TimerRegistry,
    /// Sweep tuple index (the "run" in every output file).
    pub run: usize,
    pub monte_carlo: usize,
    pub year: u16,
    /// Buffered `coeff.log` rows, flushed after the tuple joins.
    pub coeff_lines: Vec<String>,
}

impl WorkerState {
    pub fn new(ctx: &SimContext, run: usize, tuple: Coefficients) -> WorkerState {
        WorkerState {
            pool: WorkerPool::new(
                ctx.rows(),
                ctx.cols(),
                PERSISTENT_GRIDS,
                ctx.scenario.num_working_grids,
            ),
            rng: RandomStream::for_realization(ctx.scenario.random_seed, run, 0),
            coeffs: CoeffState::for_tuple(tuple),
            stats: StatsState::new(ctx.layers.urban_count()),
            timers: TimerRegistry::new(),
            run,
            monte_carlo: 0,
            year: 0,
            coeff_lines: Vec::new(),
        }
    }

    pub fn last_monte_carlo(&self, ctx: &SimContext) -> bool {
        self.monte_carlo + 1 == ctx.scenario.monte_carlo_iterations
    }

    /// Append one `coeff.log` row for the current year.
    pub fn record_coeff_line(&mut self) {
        let c = &self.coeffs.current;
        self.coeff_lines.push(format!(
            "{:5} {:3} {:5} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2}",
            self.run,
            self.monte_carlo,
            self.year,
            c.diffusion,
            c.breed,
            c.spread,
            c.slope_resistance,
            c.road_gravity
        ));
    }
}

/// Header matching [`WorkerState::record_coeff_line`].
pub fn coeff_line_header() -> String {
    format!(
        "{:>5} {:>3} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "run", "mc", "year", "diffus", "breed", "spread", "slp_res", "rd_grav"
    )
}
