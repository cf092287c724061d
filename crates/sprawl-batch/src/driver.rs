//! Per-tuple Monte Carlo driver.
//!
//! [`run_tuple`] evaluates one coefficient tuple: it runs every Monte
//! Carlo realization with a deterministic per-realization stream,
//! accumulates the cumulate grid, maintains the annual class
//! probabilities in prediction, derives the final-match score and hands
//! the grow logs to the statistics aggregation. Everything the caller
//! must write to shared files comes back in the [`TupleResult`] so file
//! appends stay ordered and outside the parallel region.

use anyhow::{Context, Result};
use sprawl_core::{Cell, Coefficients, Grid, RandomStream, SprawlError, TimerKind};
use sprawl_engine::context::{RunGrids, SimContext, WorkerState};
use sprawl_engine::{emit, growth, stats, TupleReport};
use sprawl_io::probfile;
use sprawl_scenarios::ProcessingMode;
use tracing::{debug, info};

/// Everything produced by one sweep tuple.
#[derive(Debug)]
pub struct TupleResult {
    pub run: usize,
    pub tuple: Coefficients,
    pub report: TupleReport,
    pub coeff_lines: Vec<String>,
    /// Scratch-pool low-water mark, for NUM_WORKING_GRIDS tuning.
    pub min_free_scratch: usize,
}

/// Final-match score between the simulated and observed land grids:
/// matching pixels over all pixels.
fn fmatch(simulated: &Grid, observed: &Grid) -> f64 {
    let matches = simulated.intersection(observed);
    let transitions = simulated.len() - matches;
    if matches == 0 && transitions == 0 {
        return 0.0;
    }
    matches as f64 / (matches + transitions) as f64
}

/// Run all Monte Carlo realizations for one tuple and aggregate them.
pub fn run_tuple(ctx: &SimContext, run: usize, tuple: Coefficients) -> Result<TupleResult> {
    let num_mc = ctx.scenario.monte_carlo_iterations;
    let predicting = ctx.mode == ProcessingMode::Predict;
    let mut ws = WorkerState::new(ctx, run, tuple);
    ws.timers.start(TimerKind::DriverTotal);
    let mut grids = RunGrids::acquire(&ws.pool)?;

    if predicting && ctx.layers.doing_landuse() {
        let classes = ctx.classes.as_ref().expect("land cover enabled");
        probfile::init(
            &probfile::annual_prob_path(&ctx.scenario.output_dir),
            classes.len(),
            ctx.total_pixels(),
        )?;
    }

    grids.cumulate.fill(0);
    for mc in 0..num_mc {
        ws.monte_carlo = mc;
        ws.coeffs.reset_current();
        ws.rng = RandomStream::for_realization(ctx.scenario.random_seed, run, mc);
        ws.stats.attempts.reset();

        growth::grow(ctx, &mut ws, &mut grids)?;

        if ctx.scenario.log_urbanization_attempts {
            debug!(
                run,
                monte_carlo = mc,
                "{}",
                stats::render_attempts(&ws.stats.attempts)
            );
        }
        for (acc, &z) in grids
            .cumulate
            .data_mut()
            .iter_mut()
            .zip(grids.z.data().iter())
        {
            if z > 0 {
                *acc += 1;
            }
        }
    }

    for v in grids.cumulate.data_mut() {
        *v = (100.0 * *v as f64 / num_mc as f64) as Cell;
    }

    if predicting {
        emit_prediction_outputs(ctx, &ws, &grids)?;
    }

    let final_match = if !ctx.layers.doing_landuse() || predicting {
        0.0
    } else {
        fmatch(&grids.land1, &ctx.layers.landuse[1])
    };

    let report = stats::analysis(ctx, &mut ws.stats, final_match, run, &ws.coeffs.saved)
        .with_context(|| format!("aggregating statistics for run {run}"))?;

    ws.pool
        .check_memory()
        .with_context(|| format!("pool audit after run {run}"))?;
    if ws.pool.scratch_free() != ws.pool.scratch_capacity() {
        return Err(SprawlError::Pool(format!(
            "run {run} finished with {} of {} scratch buffers outstanding",
            ws.pool.scratch_capacity() - ws.pool.scratch_free(),
            ws.pool.scratch_capacity()
        ))
        .into());
    }
    let min_free_scratch = ws.pool.min_free_scratch();
    let coeff_lines = std::mem::take(&mut ws.coeff_lines);
    grids.release(&ws.pool);

    ws.timers.stop(TimerKind::DriverTotal);
    info!(run, min_free_scratch, timings = %ws.timers.render(), "tuple complete");
    Ok(TupleResult {
        run,
        tuple,
        report,
        coeff_lines,
        min_free_scratch,
    })
}

/// Prediction-only image outputs: the normalized cumulate grid and,
/// with land cover, the most-probable-class and uncertainty images
/// derived from the annual class probability counters.
fn emit_prediction_outputs(ctx: &SimContext, ws: &WorkerState, grids: &RunGrids) -> Result<()> {
    let out_dir = &ctx.scenario.output_dir;
    emit::write_plain(&emit::cumulate_urban_path(out_dir), &grids.cumulate)?;
    emit::write_plain(
        &emit::cumulative_probability_path(out_dir, &ctx.layers.location),
        &grids.cumulate,
    )?;

    if !ctx.layers.doing_landuse() {
        return Ok(());
    }
    let classes = ctx.classes.as_ref().expect("land cover enabled");
    let path = probfile::annual_prob_path(out_dir);
    let planes = probfile::read_planes(&path, classes.len(), ctx.total_pixels())?;

    let mut probability = ws.pool.scratch("class probability image")?;
    let mut uncertainty = ws.pool.scratch("class uncertainty image")?;
    for i in 0..ctx.total_pixels() {
        let mut max = planes[0][i];
        let mut winner = 0usize;
        let mut sum = planes[0][i] as u64;
        for (class, plane) in planes.iter().enumerate().skip(1) {
            sum += plane[i] as u64;
            if plane[i] > max {
                max = plane[i];
                winner = class;
            }
        }
        if sum == 0 {
            return Err(SprawlError::Validation(format!(
                "class probability counters sum to zero at pixel {i}"
            ))
            .into());
        }
        probability.data_mut()[i] = winner as Cell;
        uncertainty.data_mut()[i] = (100 - (100 * max as u64) / sum) as Cell;
    }
    emit::write_plain(&emit::landuse_probability_path(out_dir), &probability)?;
    emit::write_plain(&emit::landuse_uncertainty_path(out_dir), &uncertainty)?;
    probfile::remove(&path)?;
    Ok(())
}
