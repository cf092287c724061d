//! The per-realization year loop.
//!
//! [`grow`] runs one Monte Carlo realization from the start year to the
//! stop year: seed the urban grid, spread one year at a time, fold in
//! land cover (or the cumulate scratch file outside calibration), update
//! statistics, then let the coefficients self-modify on the year's
//! growth rate.

use crate::context::{RunGrids, SimContext, WorkerState};
use crate::deltatron;
use crate::emit;
use crate::spread::{self, SpreadOutcome};
use crate::stats;
use crate::tags::GrowthTag;
use sprawl_core::{Cell, CmpOp, SprawlResult, TimerKind};
use sprawl_io::dump::{dump_grid, slurp_grid};
use sprawl_io::probfile;
use sprawl_scenarios::{in_window, ProcessingMode};
use std::path::PathBuf;
use tracing::debug;

fn cumulate_file_path(ctx: &SimContext, year: u16) -> PathBuf {
    ctx.scenario
        .output_dir
        .join(format!("cumulate_monte_carlo.year_{year}"))
}

/// Overlay the seed year onto `z` so observed urbanization always wins.
fn overlay_seed(ctx: &SimContext, grids: &mut RunGrids) {
    grids
        .z
        .assign_where(&ctx.layers.urban[0], CmpOp::Gt, 0, GrowthTag::Seed.cell());
}

/// Run one realization's year loop.
pub fn grow(ctx: &SimContext, ws: &mut WorkerState, grids: &mut RunGrids) -> SprawlResult<()> {
    ws.timers.start(TimerKind::GrowTotal);
    ws.year = ctx.start_year;
    grids.z.fill(0);
    if ctx.layers.doing_landuse() {
        grids.deltatron.fill(0);
        let seed_land = if ctx.mode == ProcessingMode::Predict {
            &ctx.layers.landuse[1]
        } else {
            &ctx.layers.landuse[0]
        };
        grids.land1.copy_from(seed_land);
    }
    overlay_seed(ctx, grids);

    debug!(
        run = ws.run,
        monte_carlo = ws.monte_carlo,
        start = ws.year,
        stop = ctx.stop_year,
        "realization started"
    );

    while ws.year < ctx.stop_year {
        ws.year += 1;
        if ctx.scenario.log_processing_status > 1 {
            debug!(run = ws.run, monte_carlo = ws.monte_carlo, year = ws.year, "simulating");
        }

        ws.timers.start(TimerKind::Spread);
        let outcome = spread::spread(
            &ctx.layers,
            ctx.scenario.critical_slope,
            &ws.coeffs.current,
            ws.year,
            &mut ws.rng,
            &mut ws.stats.attempts,
            &ws.pool,
            &mut grids.z,
        )?;
        ws.timers.stop(TimerKind::Spread);
        let record = &mut ws.stats.this_year;
        record.sng = outcome.sng as f64;
        record.sdc = outcome.sdc as f64;
        record.og = outcome.og as f64;
        record.rt = outcome.rt as f64;

        if ctx.scenario.view_growth_types && in_window(ws.year, ctx.scenario.growth_types_window)
        {
            let path = emit::growth_types_path(
                &ctx.scenario.output_dir,
                ws.run,
                ws.monte_carlo,
                ws.year,
            );
            emit::write_dated(&path, &grids.z, ws.year)?;
        }

        if ctx.layers.doing_landuse() {
            landuse_year(ctx, ws, grids, &outcome)?;
            if ctx.mode == ProcessingMode::Predict {
                let classes = ctx.classes.as_ref().expect("land cover enabled");
                let ordinals: Vec<usize> = grids
                    .land1
                    .data()
                    .iter()
                    .map(|&v| classes.ordinal_of(v))
                    .collect();
                probfile::update(
                    &probfile::annual_prob_path(&ctx.scenario.output_dir),
                    classes.len(),
                    &ordinals,
                )?;
            }
        } else {
            cumulate_year(ctx, ws, grids)?;
        }
        overlay_seed(ctx, grids);

        ws.timers.start(TimerKind::Stats);
        stats::update(
            ctx,
            &mut ws.stats,
            &ws.pool,
            &grids.z,
            &ws.coeffs.current,
            ws.run,
            ws.monte_carlo,
            ws.year,
            outcome.num_growth_pix,
        )?;
        ws.timers.stop(TimerKind::Stats);

        let growth_rate = ws.stats.this_year.growth_rate;
        let percent_urban = ws.stats.this_year.percent_urban;
        ws.coeffs
            .self_modify(growth_rate, percent_urban, &ctx.scenario.self_mod_params());
        if ctx.scenario.write_coeff_file {
            ws.record_coeff_line();
        }
    }
    ws.timers.stop(TimerKind::GrowTotal);
    Ok(())
}

/// Land-cover half of the year: overlay this year's urbanization, run
/// the deltatron, swap the freshly transitioned grid in, and emit the
/// combined land+urban image where the mode calls for it.
fn landuse_year(
    ctx: &SimContext,
    ws: &mut WorkerState,
    grids: &mut RunGrids,
    outcome: &SpreadOutcome,
) -> SprawlResult<()> {
    let classes = ctx.classes.as_ref().expect("land cover enabled");
    let transition = ctx.transition.as_ref().expect("land cover enabled");
    let urban_code = classes.urban_code();

    if ws.year >= ctx.layers.landuse_year(0) {
        grids
            .land1
            .assign_where(&grids.z, CmpOp::Gt, 0, urban_code);
        ws.timers.start(TimerKind::Deltatron);
        deltatron::deltatron(
            classes,
            transition,
            &ws.pool,
            &mut grids.deltatron,
            &grids.land1,
            &mut grids.land2,
            &ctx.layers.slope,
            outcome.num_growth_pix,
            &mut ws.rng,
        )?;
        ws.timers.stop(TimerKind::Deltatron);
        if ctx.scenario.view_deltatron_aging
            && in_window(ws.year, ctx.scenario.deltatron_aging_window)
        {
            let path = emit::deltatron_age_path(
                &ctx.scenario.output_dir,
                ws.run,
                ws.monte_carlo,
                ws.year,
            );
            emit::write_dated(&path, &grids.deltatron, ws.year)?;
        }
        deltatron::age(&mut grids.deltatron);
        grids.land1.copy_from(&grids.land2);
    }

    let emit_land = matches!(
        ctx.mode,
        ProcessingMode::Predict | ProcessingMode::Test
    ) && ws.last_monte_carlo(ctx);
    if emit_land {
        let path =
            emit::land_n_urban_path(&ctx.scenario.output_dir, &ctx.layers.location, ws.year);
        emit::write_dated(&path, &grids.land1, ws.year)?;
    }

    if ws.year == ctx.layers.landuse_year(1) {
        grids
            .land1
            .assign_where(&grids.z, CmpOp::Gt, 0, urban_code);
    }
    Ok(())
}

/// Non-land-cover half of the year outside calibration: accumulate this
/// realization's urban mask into the per-year cumulate scratch file and,
/// on the last realization, emit the per-year urban probability image.
fn cumulate_year(ctx: &SimContext, ws: &mut WorkerState, grids: &mut RunGrids) -> SprawlResult<()> {
    if !matches!(ctx.mode, ProcessingMode::Predict | ProcessingMode::Test) {
        return Ok(());
    }
    let mut cumulate = ws.pool.scratch("annual cumulate")?;
    let path = cumulate_file_path(ctx, ws.year);
    if ws.monte_carlo == 0 {
        cumulate.fill(0);
    } else {
        slurp_grid(&path, &mut cumulate)?;
    }
    for (acc, &z) in cumulate.data_mut().iter_mut().zip(grids.z.data().iter()) {
        if z > 0 {
            *acc += 1;
        }
    }

    if ws.last_monte_carlo(ctx) {
        if ctx.mode == ProcessingMode::Test {
            cumulate.assign_where(&grids.z, CmpOp::Gt, 0, 100);
        } else {
            let num_mc = ctx.scenario.monte_carlo_iterations as u32;
            for v in cumulate.data_mut() {
                *v = (100 * *v as u32 / num_mc) as Cell;
            }
        }
        let out =
            emit::annual_urban_path(&ctx.scenario.output_dir, &ctx.layers.location, ws.year);
        emit::write_dated(&out, &cumulate, ws.year)?;
        if ws.monte_carlo != 0 {
            std::fs::remove_file(&path)?;
        }
    } else {
        dump_grid(&path, &cumulate)?;
    }
    Ok(())
}
