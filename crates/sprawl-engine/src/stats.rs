//! Spatial statistics and calibration scoring.
//!
//! Per year the engine measures the urban grid (area, edges, connected
//! clusters, centroid, equivalent-circle radius, mean slope, Lee-Sallee
//! match against the observed year) and appends the snapshot to the
//! grow log. After a tuple's Monte Carlo realizations finish,
//! [`analysis`] reduces the logs into averages and standard deviations,
//! regresses the modeled annual means against the observed series and
//! multiplies the component scores into the tuple's aggregate product.

use crate::context::SimContext;
use sprawl_core::{
    Coefficients, Grid, ObservedStats, SprawlError, SprawlResult, UrbanStats,
    UrbanizationAttempts, WorkerPool,
};
use sprawl_io::growlog::{self, GrowLogRecord};
use sprawl_scenarios::ProcessingMode;
use std::f64::consts::PI;
use std::fmt::Write as _;

/// Fixed capacity of the cluster-search queue; overflow is fatal.
pub const CLUSTER_QUEUE_CAPACITY: usize = 5000;

/// 4-neighborhood offsets used by the edge and cluster scans.
const CROSS_ROW: [isize; 4] = [-1, 1, 0, 0];
const CROSS_COL: [isize; 4] = [0, 0, -1, 1];

/// Calibration aggregate for one tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateScore {
    pub fmatch: f64,
    pub actual: f64,
    pub simulated: f64,
    pub compare: f64,
    pub leesalee: f64,
    pub product: f64,
}

/// Per-worker statistics state for one sweep tuple.
#[derive(Debug, Clone)]
pub struct StatsState {
    /// Snapshot being filled for the current simulated year.
    pub this_year: UrbanStats,
    pub attempts: UrbanizationAttempts,
    running_total: Vec<UrbanStats>,
    average: Vec<UrbanStats>,
    squared_dev: Vec<UrbanStats>,
    /// Squared Pearson correlations of modeled means vs observed values.
    pub regression: ObservedStats,
    pub aggregate: AggregateScore,
}

impl StatsState {
    pub fn new(observed_years: usize) -> StatsState {
        let slots = observed_years.max(1);
        StatsState {
            this_year: UrbanStats::default(),
            attempts: UrbanizationAttempts::default(),
            running_total: vec![UrbanStats::default(); slots],
            average: vec![UrbanStats::default(); slots],
            squared_dev: vec![UrbanStats::default(); slots],
            regression: ObservedStats::default(),
            aggregate: AggregateScore::default(),
        }
    }

    fn clear_arrays(&mut self) {
        for slot in &mut self.running_total {
            *slot = UrbanStats::default();
        }
        for slot in &mut self.average {
            *slot = UrbanStats::default();
        }
        for slot in &mut self.squared_dev {
            *slot = UrbanStats::default();
        }
    }
}

/// Measure one urban mask: edge count, 4-connected clusters (interior
/// only; borders are forced empty), centroid, mean slope over urban
/// pixels and the equivalent-circle radius. The two scratch grids back
/// the cluster search. An empty mask is an invariant violation.
pub fn compute_spatial(
    z: &Grid,
    slope: &Grid,
    visited: &mut Grid,
    clusters: &mut Grid,
) -> SprawlResult<ObservedStats> {
    let mut out = ObservedStats::default();

    // edges and area
    let mut area = 0usize;
    let mut edges = 0usize;
    for row in 0..z.rows() {
        for col in 0..z.cols() {
            if z.get(row, col) == 0 {
                continue;
            }
            area += 1;
            let on_edge = (0..4).any(|k| {
                let r = row as isize + CROSS_ROW[k];
                let c = col as isize + CROSS_COL[k];
                z.in_bounds(r, c) && z.get(r as usize, c as usize) == 0
            });
            if on_edge {
                edges += 1;
            }
        }
    }
    out.area = area as f64;
    out.edges = edges as f64;

    // clusters over the border-cleared mask
    visited.fill(0);
    let mut pop = 0usize;
    for row in 0..z.rows() {
        for col in 0..z.cols() {
            let urban = z.get(row, col) != 0;
            if urban {
                pop += 1;
            }
            let masked = urban && z.is_interior(row, col);
            clusters.set(row, col, masked as u16);
        }
    }
    out.pop = pop as f64;

    let mut queue = vec![(0usize, 0usize); CLUSTER_QUEUE_CAPACITY];
    let mut cluster_count = 0usize;
    let mut cluster_pixels = 0usize;
    for row in 1..z.rows() - 1 {
        for col in 1..z.cols() - 1 {
            if clusters.get(row, col) != 1 || visited.get(row, col) != 0 {
                continue;
            }
            cluster_pixels += 1;
            visited.set(row, col, 1);
            let mut store = 0usize;
            let mut retrieve = 0usize;
            let mut depth = 0usize;
            queue[store] = (row, col);
            store = (store + 1) % CLUSTER_QUEUE_CAPACITY;
            depth += 1;
            while depth > 0 {
                let (r0, c0) = queue[retrieve];
                retrieve = (retrieve + 1) % CLUSTER_QUEUE_CAPACITY;
                depth -= 1;
                for k in 0..4 {
                    let r = r0 as isize + CROSS_ROW[k];
                    let c = c0 as isize + CROSS_COL[k];
                    if !clusters.in_bounds(r, c) {
                        continue;
                    }
                    let (r, c) = (r as usize, c as usize);
                    if clusters.get(r, c) == 1 && visited.get(r, c) == 0 {
                        visited.set(r, c, 1);
                        if depth + 1 >= CLUSTER_QUEUE_CAPACITY {
                            return Err(SprawlError::Validation(format!(
                                "cluster queue overflow at depth {depth} \
                                 (capacity {CLUSTER_QUEUE_CAPACITY})"
                            )));
                        }
                        queue[store] = (r, c);
                        store = (store + 1) % CLUSTER_QUEUE_CAPACITY;
                        depth += 1;
                        cluster_pixels += 1;
                    }
                }
            }
            cluster_count += 1;
        }
    }
    if cluster_count == 0 {
        return Err(SprawlError::Validation(
            "urban mask has no interior clusters".to_string(),
        ));
    }
    out.clusters = cluster_count as f64;
    out.mean_cluster_size = (cluster_pixels / cluster_count) as f64;

    // centroid, mean slope, equivalent-circle radius
    let mut xmean = 0.0f64;
    let mut ymean = 0.0f64;
    let mut slope_sum = 0.0f64;
    let mut count = 0usize;
    for row in 0..z.rows() {
        for col in 0..z.cols() {
            if z.get(row, col) > 0 {
                slope_sum += slope.get(row, col) as f64;
                xmean += col as f64;
                ymean += row as f64;
                count += 1;
            }
        }
    }
    if count == 0 {
        return Err(SprawlError::Validation(
            "urban mask is empty; cannot take its centroid".to_string(),
        ));
    }
    out.xmean = xmean / count as f64;
    out.ymean = ymean / count as f64;
    out.average_slope = slope_sum / count as f64;
    out.rad = (out.area / PI).sqrt();
    Ok(out)
}

/// Lee-Sallee shape index: |A∩B| / |A∪B| over the two urban masks.
pub fn compute_leesalee(z: &Grid, urban: &Grid) -> f64 {
    let mut union = 0usize;
    let mut intersection = 0usize;
    for (&a, &b) in z.data().iter().zip(urban.data().iter()) {
        if a != 0 || b != 0 {
            union += 1;
        }
        if a != 0 && b != 0 {
            intersection += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Squared Pearson correlation of two equal-length series. Returns 0
/// when either variance vanishes.
pub fn linefit(dependent: &[f64], independent: &[f64]) -> f64 {
    assert_eq!(dependent.len(), independent.len());
    let n = dependent.len();
    if n == 0 {
        return 0.0;
    }
    let dep_avg = dependent.iter().sum::<f64>() / n as f64;
    let ind_avg = independent.iter().sum::<f64>() / n as f64;
    let mut cross = 0.0;
    let mut dep_var = 0.0;
    let mut ind_var = 0.0;
    for k in 0..n {
        let d = dependent[k] - dep_avg;
        let i = independent[k] - ind_avg;
        cross += d * i;
        dep_var += d * d;
        ind_var += i * i;
    }
    if dep_var * ind_var < 1e-11 {
        return 0.0;
    }
    let r = cross / (dep_var * ind_var).sqrt();
    r * r
}

/// Fill this year's record from the grown grid and persist it when the
/// year is an observed one (every year when predicting).
#[allow(clippy::too_many_arguments)]
pub fn update(
    ctx: &SimContext,
    state: &mut StatsState,
    pool: &WorkerPool,
    z: &Grid,
    current: &Coefficients,
    run: usize,
    monte_carlo: usize,
    year: u16,
    num_growth_pix: usize,
) -> SprawlResult<()> {
    let spatial = {
        let mut visited = pool.scratch("stats visited")?;
        let mut clusters = pool.scratch("stats clusters")?;
        compute_spatial(z, &ctx.layers.slope, &mut visited, &mut clusters)?
    };

    let record = &mut state.this_year;
    record.area = spatial.area;
    record.edges = spatial.edges;
    record.clusters = spatial.clusters;
    record.pop = spatial.pop;
    record.xmean = spatial.xmean;
    record.ymean = spatial.ymean;
    record.rad = spatial.rad;
    record.slope = spatial.average_slope;
    record.mean_cluster_size = spatial.mean_cluster_size;
    record.diffusion = current.diffusion;
    record.spread = current.spread;
    record.breed = current.breed;
    record.slope_resistance = current.slope_resistance;
    record.road_gravity = current.road_gravity;
    record.num_growth_pix = num_growth_pix as f64;
    record.growth_rate = record.num_growth_pix / record.pop * 100.0;

    let total = ctx.layers.total_pixels() as f64;
    let road_pixels = ctx.layers.road_pixel_count_for_year(year) as f64;
    let excluded = ctx.layers.excluded_count as f64;
    record.percent_urban = 100.0 * (record.pop + road_pixels) / (total - road_pixels - excluded);
    record.percent_road = ctx.layers.road_percent_for_year(year);

    let observed_year = ctx.layers.is_urban_year(year);
    if observed_year {
        record.leesalee = if ctx.mode == ProcessingMode::Predict {
            1.0
        } else {
            let urban = &ctx.layers.urban[ctx
                .layers
                .urban_index_of_year(year)
                .expect("observed year")];
            compute_leesalee(z, urban)
        };
    }

    if observed_year || ctx.mode == ProcessingMode::Predict {
        let index = if ctx.mode == ProcessingMode::Predict {
            0
        } else {
            ctx.layers.urban_index_of_year(year).expect("observed year")
        };
        let snapshot = state.this_year;
        state.running_total[index].accumulate(&snapshot);
        let path = growlog::grow_log_path(&ctx.scenario.output_dir, run, year);
        growlog::append_record(
            &path,
            &GrowLogRecord {
                run,
                monte_carlo,
                year,
                stats: snapshot,
            },
        )?;
    }
    Ok(())
}

/// One `avg.log` / `std_dev.log` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatLine {
    pub run: usize,
    pub year: u16,
    pub index: usize,
    pub stats: UrbanStats,
}

impl StatLine {
    pub fn format_line(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{:5} {:5} {:3}", self.run, self.year, self.index);
        for field in self.stats.to_array() {
            let _ = write!(out, " {field:10.3}");
        }
        out
    }
}

pub fn stat_line_header() -> String {
    let names = [
        "sng", "sdc", "og", "rt", "pop", "area", "edges", "clusters", "xmean", "ymean", "rad",
        "slope", "cl_size", "diffus", "spread", "breed", "slp_res", "rd_grav", "%urban", "%road",
        "grw_rate", "leesalee", "grw_pix",
    ];
    let mut out = String::new();
    let _ = write!(out, "{:>5} {:>5} {:>3}", "run", "year", "idx");
    for name in names {
        let _ = write!(out, " {name:>10}");
    }
    out
}

/// One `control_stats.log` row: the aggregate product, its component
/// scores and the tuple that earned them.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlRecord {
    pub run: usize,
    pub product: f64,
    pub compare: f64,
    pub pop_r2: f64,
    pub edges_r2: f64,
    pub clusters_r2: f64,
    pub cluster_size_r2: f64,
    pub leesalee: f64,
    pub slope_r2: f64,
    pub percent_urban_r2: f64,
    pub xmean_r2: f64,
    pub ymean_r2: f64,
    pub rad_r2: f64,
    pub fmatch: f64,
    pub diffusion: f64,
    pub breed: f64,
    pub spread: f64,
    pub slope_resistance: f64,
    pub road_gravity: f64,
}

pub fn control_header() -> String {
    concat!(
        "                                               Cluster\n",
        "  Run  Product Compare     Pop   Edges Clusters   ",
        "Size Leesalee  Slope ",
        " %Urban   Xmean   Ymean     Rad  Fmatch ",
        "Diff  Brd Sprd  Slp   RG"
    )
    .to_string()
}

impl ControlRecord {
    pub fn format_line(&self) -> String {
        format!(
            "{:5} {:8.5} {:7.5} {:7.5} {:7.5} {:7.5} {:7.5} {:7.5} {:7.5} {:7.5} \
             {:7.5} {:7.5} {:7.5} {:7.5} {:4.0} {:4.0} {:4.0} {:4.0} {:4.0}",
            self.run,
            self.product,
            self.compare,
            self.pop_r2,
            self.edges_r2,
            self.clusters_r2,
            self.cluster_size_r2,
            self.leesalee,
            self.slope_r2,
            self.percent_urban_r2,
            self.xmean_r2,
            self.ymean_r2,
            self.rad_r2,
            self.fmatch,
            self.diffusion,
            self.breed,
            self.spread,
            self.slope_resistance,
            self.road_gravity,
        )
    }
}

/// Everything the driver writes after one tuple completes.
#[derive(Debug, Clone)]
pub struct TupleReport {
    pub control: Option<ControlRecord>,
    pub avg_lines: Vec<StatLine>,
    pub std_lines: Vec<StatLine>,
}

fn process_grow_log(
    ctx: &SimContext,
    state: &mut StatsState,
    run: usize,
    year: u16,
    index: usize,
) -> SprawlResult<usize> {
    let path = growlog::grow_log_path(&ctx.scenario.output_dir, run, year);
    let records = growlog::read_records(&path)?;
    if records.len() > ctx.scenario.monte_carlo_iterations {
        return Err(SprawlError::Validation(format!(
            "grow log {} holds {} records for {} Monte Carlo iterations",
            path.display(),
            records.len(),
            ctx.scenario.monte_carlo_iterations
        )));
    }
    let mean = state.average[index];
    for record in &records {
        state.squared_dev[index].accumulate_squared_deviation(&record.stats, &mean);
    }
    growlog::remove_log(&path)?;
    Ok(records.len())
}

fn do_regressions(ctx: &SimContext, state: &mut StatsState) {
    let nobs = ctx.layers.urban_count() - 1;
    let averages = &state.average;
    let series = |observed: fn(&ObservedStats) -> f64, modeled: fn(&UrbanStats) -> f64| {
        let dep: Vec<f64> = (1..=nobs).map(|i| observed(&ctx.observed[i])).collect();
        let ind: Vec<f64> = (1..=nobs).map(|i| modeled(&averages[i])).collect();
        linefit(&dep, &ind)
    };
    let regression = ObservedStats {
        area: series(|o| o.area, |m| m.area),
        edges: series(|o| o.edges, |m| m.edges),
        clusters: series(|o| o.clusters, |m| m.clusters),
        pop: series(|o| o.pop, |m| m.pop),
        xmean: series(|o| o.xmean, |m| m.xmean),
        ymean: series(|o| o.ymean, |m| m.ymean),
        rad: series(|o| o.rad, |m| m.rad),
        average_slope: series(|o| o.average_slope, |m| m.slope),
        mean_cluster_size: series(|o| o.mean_cluster_size, |m| m.mean_cluster_size),
        percent_urban: series(|o| o.percent_urban, |m| m.percent_urban),
    };
    state.regression = regression;
}

fn do_aggregate(ctx: &SimContext, state: &mut StatsState, fmatch: f64) -> SprawlResult<()> {
    let last = ctx.layers.urban_count() - 1;
    let simulated = state.average[last].pop;
    let leesalee_mean =
        (1..=last).map(|i| state.average[i].leesalee).sum::<f64>() / last as f64;
    let agg = &mut state.aggregate;
    agg.fmatch = fmatch;
    agg.actual = ctx.observed[last].pop;
    agg.simulated = simulated;
    agg.leesalee = leesalee_mean;

    let (numerator, denominator) = if agg.actual > agg.simulated {
        (agg.simulated, agg.actual)
    } else {
        (agg.actual, agg.simulated)
    };
    if denominator == 0.0 {
        return Err(SprawlError::Validation(
            "final-year population is zero on both sides of the compare score".to_string(),
        ));
    }
    agg.compare = numerator / denominator;

    let fmatch_term = if ctx.layers.doing_landuse() { fmatch } else { 1.0 };
    let r = &state.regression;
    agg.product = agg.compare
        * agg.leesalee
        * r.edges
        * r.clusters
        * r.pop
        * r.xmean
        * r.ymean
        * r.rad
        * r.average_slope
        * r.mean_cluster_size
        * r.percent_urban
        * fmatch_term;
    Ok(())
}

/// Reduce one tuple's grow logs into the tuple report. Calibration runs
/// the full average / deviation / regression / aggregate pipeline;
/// prediction reduces each simulated year independently and produces no
/// control record.
pub fn analysis(
    ctx: &SimContext,
    state: &mut StatsState,
    fmatch: f64,
    run: usize,
    saved: &Coefficients,
) -> SprawlResult<TupleReport> {
    let n_mc = ctx.scenario.monte_carlo_iterations;
    let mut avg_lines = Vec::new();
    let mut std_lines = Vec::new();
    let control;

    if ctx.mode == ProcessingMode::Predict {
        for year in ctx.start_year + 1..=ctx.stop_year {
            state.clear_arrays();
            let path = growlog::grow_log_path(&ctx.scenario.output_dir, run, year);
            let records = growlog::read_records(&path)?;
            for record in &records {
                let snapshot = record.stats;
                state.running_total[0].accumulate(&snapshot);
            }
            state.average[0] = state.running_total[0].averaged(n_mc);
            let mean = state.average[0];
            for record in &records {
                state.squared_dev[0].accumulate_squared_deviation(&record.stats, &mean);
            }
            let deviation = state.squared_dev[0].sqrt_scaled(n_mc);
            avg_lines.push(StatLine {
                run,
                year,
                index: 0,
                stats: state.average[0],
            });
            std_lines.push(StatLine {
                run,
                year,
                index: 0,
                stats: deviation,
            });
            growlog::remove_log(&path)?;
        }
        control = None;
    } else {
        // slot 0 is the seed year; observed comparisons start at slot 1
        for index in 1..ctx.layers.urban_count() {
            let year = ctx.layers.urban_year(index);
            state.average[index] = state.running_total[index].averaged(n_mc);
            process_grow_log(ctx, state, run, year, index)?;
            avg_lines.push(StatLine {
                run,
                year,
                index,
                stats: state.average[index],
            });
            std_lines.push(StatLine {
                run,
                year,
                index,
                stats: state.squared_dev[index].sqrt_scaled(n_mc),
            });
        }
        do_regressions(ctx, state);
        do_aggregate(ctx, state, fmatch)?;
        control = Some(ControlRecord {
            run,
            product: state.aggregate.product,
            compare: state.aggregate.compare,
            pop_r2: state.regression.pop,
            edges_r2: state.regression.edges,
            clusters_r2: state.regression.clusters,
            cluster_size_r2: state.regression.mean_cluster_size,
            leesalee: state.aggregate.leesalee,
            slope_r2: state.regression.average_slope,
            percent_urban_r2: state.regression.percent_urban,
            xmean_r2: state.regression.xmean,
            ymean_r2: state.regression.ymean,
            rad_r2: state.regression.rad,
            fmatch: state.aggregate.fmatch,
            diffusion: saved.diffusion,
            breed: saved.breed,
            spread: saved.spread,
            slope_resistance: saved.slope_resistance,
            road_gravity: saved.road_gravity,
        });
    }

    state.clear_arrays();
    Ok(TupleReport {
        control,
        avg_lines,
        std_lines,
    })
}

/// Render the urbanization-attempt tallies for the run log.
pub fn render_attempts(attempts: &UrbanizationAttempts) -> String {
    format!(
        "urbanization attempts: {} successes, {} z failures, {} delta failures, \
         {} slope failures, {} excluded failures ({} total)",
        attempts.successes,
        attempts.z_failures,
        attempts.delta_failures,
        attempts.slope_failures,
        attempts.excluded_failures,
        attempts.total()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(rows: usize, cols: usize, urban: &[(usize, usize)]) -> Grid {
        let mut g = Grid::new(rows, cols);
        for &(r, c) in urban {
            g.set(r, c, 3);
        }
        g
    }

    #[test]
    fn spatial_stats_of_a_plus_shape() {
        let z = mask(5, 5, &[(2, 2), (1, 2), (3, 2), (2, 1), (2, 3)]);
        let slope = Grid::new(5, 5);
        let mut visited = Grid::new(5, 5);
        let mut clusters = Grid::new(5, 5);
        let s = compute_spatial(&z, &slope, &mut visited, &mut clusters).unwrap();
        assert_eq!(s.area, 5.0);
        assert_eq!(s.edges, 5.0);
        assert_eq!(s.clusters, 1.0);
        assert_eq!(s.mean_cluster_size, 5.0);
        assert_eq!(s.pop, 5.0);
        assert_eq!(s.xmean, 2.0);
        assert_eq!(s.ymean, 2.0);
        assert!((s.rad - (5.0f64 / PI).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn border_pixels_do_not_form_clusters() {
        // a border blob plus one interior pixel: only the interior one
        // counts as a cluster
        let z = mask(4, 4, &[(0, 0), (0, 1), (2, 2)]);
        let slope = Grid::new(4, 4);
        let mut visited = Grid::new(4, 4);
        let mut clusters = Grid::new(4, 4);
        let s = compute_spatial(&z, &slope, &mut visited, &mut clusters).unwrap();
        assert_eq!(s.clusters, 1.0);
        assert_eq!(s.area, 3.0);
    }

    #[test]
    fn two_separate_clusters_are_counted() {
        let z = mask(6, 6, &[(1, 1), (1, 2), (4, 4)]);
        let slope = Grid::new(6, 6);
        let mut visited = Grid::new(6, 6);
        let mut clusters = Grid::new(6, 6);
        let s = compute_spatial(&z, &slope, &mut visited, &mut clusters).unwrap();
        assert_eq!(s.clusters, 2.0);
        // 3 pixels over 2 clusters, integer mean
        assert_eq!(s.mean_cluster_size, 1.0);
    }

    #[test]
    fn leesalee_is_jaccard() {
        let a = mask(3, 3, &[(0, 0), (1, 1)]);
        let b = mask(3, 3, &[(1, 1), (2, 2)]);
        assert!((compute_leesalee(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(compute_leesalee(&a, &a), 1.0);
    }

    #[test]
    fn linefit_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((linefit(&x, &y) - 1.0).abs() < 1e-12);
        let inverse = [8.0, 6.0, 4.0, 2.0];
        assert!((linefit(&x, &inverse) - 1.0).abs() < 1e-12);
        let flat = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(linefit(&x, &flat), 0.0);
    }

    #[test]
    fn control_line_carries_the_tuple() {
        let record = ControlRecord {
            run: 7,
            product: 0.5,
            compare: 0.9,
            pop_r2: 0.8,
            edges_r2: 0.7,
            clusters_r2: 0.6,
            cluster_size_r2: 0.5,
            leesalee: 0.4,
            slope_r2: 0.3,
            percent_urban_r2: 0.2,
            xmean_r2: 0.1,
            ymean_r2: 0.1,
            rad_r2: 0.1,
            fmatch: 1.0,
            diffusion: 25.0,
            breed: 50.0,
            spread: 75.0,
            slope_resistance: 1.0,
            road_gravity: 100.0,
        };
        let line = record.format_line();
        assert!(line.starts_with("    7"));
        assert!(line.contains("0.50000"));
        assert!(line.trim_end().ends_with("100"));
    }

    #[test]
    fn stat_line_has_all_fields() {
        let line = StatLine {
            run: 1,
            year: 1995,
            index: 2,
            stats: UrbanStats::default(),
        }
        .format_line();
        // run + year + index + 23 fields
        assert_eq!(line.split_whitespace().count(), 26);
        assert_eq!(
            stat_line_header().split_whitespace().count(),
            26
        );
    }
}
