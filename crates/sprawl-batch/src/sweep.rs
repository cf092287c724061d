//! Campaign orchestration: the coefficient sweep and the prediction run.
//!
//! Calibration enumerates the 5-D cartesian product of sweep ranges and
//! fans the tuples out over a rayon pool; every job owns its pools,
//! random stream and statistics, so the only shared state is the
//! restart-checkpoint tracker. Results are collected and written to the
//! control/avg/std-dev/coeff logs in tuple order after the join.
//! Testing truncates the sweep to its first tuple; restart resumes at
//! the checkpointed tuple; prediction runs the best-fit tuple on a
//! single worker.

use crate::driver::{self, TupleResult};
use crate::manifest::{write_campaign_manifest, CampaignManifest};
use anyhow::{anyhow, Context, Result};
use chrono::{Local, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use sprawl_core::Coefficients;
use sprawl_engine::context::{coeff_line_header, SimContext};
use sprawl_engine::{control_header, stat_line_header, ControlRecord, StatLine};
use sprawl_io::restart::{self, RestartState};
use sprawl_scenarios::ProcessingMode;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Campaign-level summary handed back to the CLI.
#[derive(Debug)]
pub struct CampaignSummary {
    pub runs_completed: usize,
    pub control: Vec<ControlRecord>,
    /// Highest-product tuple of this campaign, when calibrating.
    pub best: Option<ControlRecord>,
}

/// Tracks sweep completion so the restart checkpoint always names the
/// lowest tuple that has not finished.
struct CheckpointTracker {
    completed: BTreeSet<usize>,
    frontier: usize,
}

fn write_checkpoint(ctx: &SimContext, run: usize, tuples: &[Coefficients]) -> Result<()> {
    // once the sweep is exhausted the checkpoint keeps naming the last
    // tuple, matching the sequential driver's end state
    let run = run.min(tuples.len() - 1);
    let tuple = &tuples[run];
    let state = RestartState {
        diffusion: tuple.diffusion as u32,
        breed: tuple.breed as u32,
        spread: tuple.spread as u32,
        slope_resistance: tuple.slope_resistance as u32,
        road_gravity: tuple.road_gravity as u32,
        seed: ctx.scenario.random_seed,
        run,
    };
    restart::write_restart(&restart::restart_path(&ctx.scenario.output_dir), &state)
        .context("writing restart checkpoint")?;
    Ok(())
}

/// Run the campaign the context's mode calls for.
pub fn run_campaign(ctx: &SimContext, threads: usize) -> Result<CampaignSummary> {
    fs::create_dir_all(&ctx.scenario.output_dir).with_context(|| {
        format!(
            "creating output directory '{}'",
            ctx.scenario.output_dir.display()
        )
    })?;
    if ctx.scenario.log {
        write_run_log(ctx)?;
    }
    let summary = match ctx.mode {
        ProcessingMode::Predict => run_prediction(ctx),
        _ => run_sweep(ctx, threads),
    }?;
    write_campaign_manifest(
        &ctx.scenario.output_dir.join("campaign_manifest.json"),
        &CampaignManifest {
            created_at: Utc::now(),
            mode: ctx.mode.as_str().to_string(),
            total_runs: ctx.total_runs(),
            runs_completed: summary.runs_completed,
            monte_carlo_iterations: ctx.scenario.monte_carlo_iterations,
            random_seed: ctx.scenario.random_seed,
            best: summary.best,
        },
    )?;
    Ok(summary)
}

fn run_prediction(ctx: &SimContext) -> Result<CampaignSummary> {
    let tuple = ctx.scenario.calibration.best_fit();
    info!(
        diffusion = tuple.diffusion,
        breed = tuple.breed,
        spread = tuple.spread,
        slope_resistance = tuple.slope_resistance,
        road_gravity = tuple.road_gravity,
        "prediction run with best-fit coefficients"
    );
    let result = driver::run_tuple(ctx, 0, tuple)?;
    write_tuple_files(ctx, std::slice::from_ref(&result), true)?;
    Ok(CampaignSummary {
        runs_completed: 1,
        control: Vec::new(),
        best: None,
    })
}

fn run_sweep(ctx: &SimContext, threads: usize) -> Result<CampaignSummary> {
    let tuples = ctx.scenario.calibration.tuples();
    let first_run = match ctx.mode {
        ProcessingMode::Restart => {
            let state =
                restart::read_restart(&restart::restart_path(&ctx.scenario.output_dir))
                    .context("reading restart checkpoint")?;
            if state.seed != ctx.scenario.random_seed {
                warn!(
                    checkpoint_seed = state.seed,
                    scenario_seed = ctx.scenario.random_seed,
                    "restart checkpoint was written with a different seed"
                );
            }
            info!(run = state.run, "resuming sweep from checkpoint");
            state.run
        }
        _ => 0,
    };
    if first_run >= tuples.len() {
        return Err(anyhow!(
            "restart checkpoint names run {first_run}, but the sweep has only {} tuples",
            tuples.len()
        ));
    }

    let mut jobs: Vec<usize> = (first_run..tuples.len()).collect();
    if ctx.mode == ProcessingMode::Test {
        jobs.truncate(1);
    }
    info!(
        total = tuples.len(),
        scheduled = jobs.len(),
        threads,
        "sweep starting"
    );

    write_checkpoint(ctx, first_run, &tuples)?;
    let tracker = Mutex::new(CheckpointTracker {
        completed: BTreeSet::new(),
        frontier: first_run,
    });

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building sweep thread pool")?;
    let results: Vec<Result<TupleResult>> = pool.install(|| {
        jobs.par_iter()
            .map(|&run| {
                let result = driver::run_tuple(ctx, run, tuples[run]);
                if result.is_ok() {
                    let mut guard = tracker.lock().expect("checkpoint tracker");
                    let state = &mut *guard;
                    state.completed.insert(run);
                    while state.completed.remove(&state.frontier) {
                        state.frontier += 1;
                    }
                    let frontier = state.frontier;
                    drop(guard);
                    if let Err(err) = write_checkpoint(ctx, frontier, &tuples) {
                        warn!(%err, "checkpoint write failed");
                    }
                }
                result
            })
            .collect()
    });

    let mut completed = Vec::with_capacity(results.len());
    for result in results {
        completed.push(result?);
    }
    completed.sort_by_key(|r| r.run);

    write_tuple_files(ctx, &completed, first_run == 0)?;

    let control: Vec<ControlRecord> = completed
        .iter()
        .filter_map(|r| r.report.control)
        .collect();
    let best = control
        .iter()
        .copied()
        .max_by(|a, b| a.product.total_cmp(&b.product));
    if let Some(best) = &best {
        info!(
            run = best.run,
            product = best.product,
            diffusion = best.diffusion,
            breed = best.breed,
            spread = best.spread,
            slope_resistance = best.slope_resistance,
            road_gravity = best.road_gravity,
            "best-scoring tuple"
        );
    }
    Ok(CampaignSummary {
        runs_completed: completed.len(),
        control,
        best,
    })
}

fn append_lines(path: &Path, fresh: bool, header: &str, lines: &[String]) -> Result<()> {
    let create_header = fresh || !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening '{}'", path.display()))?;
    if create_header {
        writeln!(file, "{header}")?;
    }
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Append each tuple's buffered rows to the shared log files, in run
/// order. `fresh` recreates headers (a resumed sweep appends instead).
fn write_tuple_files(ctx: &SimContext, results: &[TupleResult], fresh: bool) -> Result<()> {
    let out = &ctx.scenario.output_dir;
    if ctx.mode != ProcessingMode::Predict {
        let lines: Vec<String> = results
            .iter()
            .filter_map(|r| r.report.control.as_ref())
            .map(|c| c.format_line())
            .collect();
        let path = out.join("control_stats.log");
        if fresh && path.exists() {
            fs::remove_file(&path)?;
        }
        append_lines(&path, fresh, &control_header(), &lines)?;
    }
    if ctx.scenario.write_avg_file {
        let lines: Vec<String> = results
            .iter()
            .flat_map(|r| r.report.avg_lines.iter().map(StatLine::format_line))
            .collect();
        append_lines(&out.join("avg.log"), fresh, &stat_line_header(), &lines)?;
    }
    if ctx.scenario.write_std_dev_file {
        let lines: Vec<String> = results
            .iter()
            .flat_map(|r| r.report.std_lines.iter().map(StatLine::format_line))
            .collect();
        append_lines(
            &out.join("std_dev.log"),
            fresh,
            &stat_line_header(),
            &lines,
        )?;
    }
    if ctx.scenario.write_coeff_file {
        let lines: Vec<String> = results
            .iter()
            .flat_map(|r| r.coeff_lines.iter().cloned())
            .collect();
        append_lines(&out.join("coeff.log"), fresh, &coeff_line_header(), &lines)?;
    }
    Ok(())
}

/// Header of the campaign run log: timestamp, environment echo, the
/// effective scenario and the flag-gated init dumps.
fn write_run_log(ctx: &SimContext) -> Result<()> {
    let path = ctx.scenario.output_dir.join("LOG_0");
    let mut file = fs::File::create(&path)
        .with_context(|| format!("creating run log '{}'", path.display()))?;
    writeln!(file, "DATE OF RUN: {}", Local::now().format("%a %b %e %T %Y"))?;
    for var in ["USER", "HOST", "HOSTTYPE", "OSTYPE", "PWD"] {
        if let Ok(value) = std::env::var(var) {
            writeln!(file, "{var}: {value}")?;
        }
    }
    writeln!(file, "Type of processing: {}", ctx.mode.as_str())?;
    writeln!(file, "Total runs: {}", ctx.total_runs())?;
    writeln!(file)?;
    writeln!(file, "{}", ctx.scenario.echo_json())?;
    writeln!(file)?;
    write!(file, "{}", ctx.layers.render_summary())?;
    if let Some(classes) = &ctx.classes {
        writeln!(file)?;
        write!(file, "{}", classes.render())?;
    }

    if ctx.scenario.log_base_statistics {
        writeln!(file)?;
        writeln!(
            file,
            "base statistics for urban input data (year, area, edges, clusters, pop, \
             xmean, ymean, rad, slope, cluster size)"
        )?;
        for (i, observed) in ctx.observed.iter().enumerate() {
            writeln!(
                file,
                "{:5} {:10.2} {:10.2} {:10.2} {:10.2} {:8.2} {:8.2} {:8.2} {:8.2} {:10.3}",
                ctx.layers.urban_year(i),
                observed.area,
                observed.edges,
                observed.clusters,
                observed.pop,
                observed.xmean,
                observed.ymean,
                observed.rad,
                observed.average_slope,
                observed.mean_cluster_size,
            )?;
        }
    }
    if ctx.scenario.log_transition_matrix {
        if let (Some(classes), Some(transition)) = (&ctx.classes, &ctx.transition) {
            writeln!(file)?;
            write!(file, "{}", transition.render(classes))?;
        }
    }
    if ctx.scenario.log_slope_weights {
        let weights = sprawl_engine::slope_weights(
            ctx.scenario.critical_slope,
            ctx.scenario.calibration.best_fit().slope_resistance.max(1.0),
        );
        writeln!(file)?;
        writeln!(
            file,
            "slope weights (critical slope {}):",
            ctx.scenario.critical_slope
        )?;
        for (slope, weight) in weights.iter().enumerate() {
            if (slope as f64) < ctx.scenario.critical_slope {
                writeln!(file, "  lut[{slope:3}] = {weight:.6}")?;
            }
        }
        writeln!(file, "  all further entries = 1.000000")?;
    }
    Ok(())
}
