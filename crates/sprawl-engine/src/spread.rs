//! The four-phase urban spread rule.
//!
//! One call to [`spread`] advances the urban grid `z` by one year:
//!
//! 1. spontaneous growth: random interior pixels, rate set by diffusion;
//! 2. new spreading centers: breed-gated neighbors of fresh spontaneous
//!    pixels (phase 3 in the historical numbering);
//! 3. edge growth: organic expansion along existing urban edges, rate set
//!    by spread;
//! 4. road-influenced growth: new growth diffuses along the road network
//!    under road gravity.
//!
//! All phases write this year's additions into a scratch `delta` grid via
//! the single [`urbanize`] primitive and only the final merge step
//! touches `z`, so a pixel can be claimed at most once per year.

use crate::tags::GrowthTag;
use sprawl_core::{
    neighbor_at, CmpOp, Coefficients, Grid, RandomStream, SprawlError, SprawlResult,
    UrbanizationAttempts, WorkerPool,
};
use sprawl_io::layers::{InputLayers, EXCLUDED_THRESHOLD, MAX_ROAD_VALUE};

/// Entries in the slope-weight lookup table, one per slope value.
pub const SLOPE_WEIGHT_LEN: usize = 256;

/// Midpoint of the slope-resistance range, the exponent normalizer.
const SLOPE_RESISTANCE_HALF: f64 = 50.0;

/// Per-year new-pixel counts and aggregate outcome of the spread rule.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpreadOutcome {
    /// Spontaneous-growth pixels.
    pub sng: usize,
    /// New-spreading-center pixels.
    pub sdc: usize,
    /// Organic/edge-growth pixels.
    pub og: usize,
    /// Road-influenced pixels.
    pub rt: usize,
    /// Urban pixels after the merge.
    pub pop: usize,
    /// Pixels added to `z` this year.
    pub num_growth_pix: usize,
    /// Mean slope under this year's new growth.
    pub average_slope: f64,
}

/// Rejection weight per slope value: below the critical slope the weight
/// rises from 0 toward 1 with exponent `slope_resistance / 50`; at and
/// above the critical slope it is exactly 1 and urbanization is
/// impossible.
pub fn slope_weights(critical_slope: f64, slope_resistance: f64) -> Vec<f64> {
    let exponent = slope_resistance / SLOPE_RESISTANCE_HALF;
    (0..SLOPE_WEIGHT_LEN)
        .map(|i| {
            let slope = i as f64;
            if slope < critical_slope {
                let val = (critical_slope - slope) / critical_slope;
                1.0 - val.powf(exponent)
            } else {
                1.0
            }
        })
        .collect()
}

/// Diffusion coefficient scaled to the image: at 100 it is 5% of the
/// image diagonal.
pub fn diffusion_value(diffusion: f64, rows: usize, cols: usize) -> f64 {
    let rows_sq = (rows * rows) as f64;
    let cols_sq = (cols * cols) as f64;
    diffusion * 0.005 * (rows_sq + cols_sq).sqrt()
}

/// Road gravity scaled to the image: at 100 it is 1/16 of the summed
/// image dimensions.
pub fn road_gravity_value(road_gravity: f64, rows: usize, cols: usize) -> i64 {
    (road_gravity / MAX_ROAD_VALUE as f64 * ((rows + cols) as f64 / 16.0)) as i64
}

/// Try to urbanize `(row, col)`. Succeeds only when the pixel is not yet
/// urban, not yet claimed this year, survives the slope-weight draw and
/// survives the exclusion draw; the failure tallies record which gate
/// rejected it, in that priority order.
#[allow(clippy::too_many_arguments)]
fn urbanize(
    row: usize,
    col: usize,
    z: &Grid,
    delta: &mut Grid,
    slope: &Grid,
    excluded: &Grid,
    swght: &[f64],
    tag: GrowthTag,
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
) -> bool {
    if z.get(row, col) != 0 {
        attempts.z_failures += 1;
        return false;
    }
    if delta.get(row, col) != 0 {
        attempts.delta_failures += 1;
        return false;
    }
    if rng.uniform() <= swght[slope.get(row, col) as usize] {
        attempts.slope_failures += 1;
        return false;
    }
    if excluded.get(row, col) as usize >= rng.uniform_int(100) {
        attempts.excluded_failures += 1;
        return false;
    }
    delta.set(row, col, tag.cell());
    attempts.successes += 1;
    true
}

/// Random in-bounds neighbor of `(row, col)`: the walk starts at a random
/// position in the 8-neighborhood and returns the first in-image cell.
fn random_neighbor(
    grid: &Grid,
    row: usize,
    col: usize,
    rng: &mut RandomStream,
) -> Option<(usize, usize)> {
    let start = rng.uniform_int(8);
    for k in 0..8 {
        let (r, c) = neighbor_at(row, col, start + k);
        if grid.in_bounds(r, c) {
            return Some((r as usize, c as usize));
        }
    }
    None
}

/// Urbanize one randomly chosen neighbor of `(row, col)`. Returns the
/// neighbor's coordinates when it urbanized.
#[allow(clippy::too_many_arguments)]
fn urbanize_neighbor(
    row: usize,
    col: usize,
    z: &Grid,
    delta: &mut Grid,
    slope: &Grid,
    excluded: &Grid,
    swght: &[f64],
    tag: GrowthTag,
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
) -> Option<(usize, usize)> {
    let (nr, nc) = random_neighbor(z, row, col, rng)?;
    urbanize(
        nr, nc, z, delta, slope, excluded, swght, tag, rng, attempts,
    )
    .then_some((nr, nc))
}

/// Phases 1 and 3: spontaneous growth plus breed-gated spreading centers
/// around each fresh spontaneous pixel.
#[allow(clippy::too_many_arguments)]
fn phase1n3(
    coeffs: &Coefficients,
    z: &Grid,
    delta: &mut Grid,
    slope: &Grid,
    excluded: &Grid,
    swght: &[f64],
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
    outcome: &mut SpreadOutcome,
) {
    const MIN_NEIGHBORS_TO_SPREAD: usize = 2;
    let tries = 1 + diffusion_value(coeffs.diffusion, z.rows(), z.cols()) as usize;
    for _ in 0..tries {
        let row = rng.uniform_int(z.rows());
        let col = rng.uniform_int(z.cols());
        if !z.is_interior(row, col) {
            continue;
        }
        if urbanize(
            row,
            col,
            z,
            delta,
            slope,
            excluded,
            swght,
            GrowthTag::Spontaneous,
            rng,
            attempts,
        ) {
            outcome.sng += 1;
            if (rng.uniform_int(101) as f64) < coeffs.breed {
                let mut spread_centers = 0;
                for _ in 0..8 {
                    if urbanize_neighbor(
                        row,
                        col,
                        z,
                        delta,
                        slope,
                        excluded,
                        swght,
                        GrowthTag::SpreadingCenter,
                        rng,
                        attempts,
                    )
                    .is_some()
                    {
                        outcome.sdc += 1;
                        spread_centers += 1;
                        if spread_centers == MIN_NEIGHBORS_TO_SPREAD {
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Phase 4: organic growth along urban edges. An urban interior pixel
/// that passes the spread draw and has between 2 and 7 urban neighbors
/// pushes growth onto one random neighbor.
#[allow(clippy::too_many_arguments)]
fn phase4(
    coeffs: &Coefficients,
    z: &Grid,
    delta: &mut Grid,
    slope: &Grid,
    excluded: &Grid,
    swght: &[f64],
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
    outcome: &mut SpreadOutcome,
) {
    for row in 1..z.rows() - 1 {
        for col in 1..z.cols() - 1 {
            if z.get(row, col) == 0 || (rng.uniform_int(101) as f64) >= coeffs.spread {
                continue;
            }
            let urban_neighbors = z.count_neighbors(row, col, CmpOp::Gt, 0);
            if (2..8).contains(&urban_neighbors) {
                let (nr, nc) = neighbor_at(row, col, rng.uniform_int(8));
                if z.in_bounds(nr, nc)
                    && urbanize(
                        nr as usize,
                        nc as usize,
                        z,
                        delta,
                        slope,
                        excluded,
                        swght,
                        GrowthTag::Organic,
                        rng,
                        attempts,
                    )
                {
                    outcome.og += 1;
                }
            }
        }
    }
}

/// Square-spiral offset for search index `index`: band `b` (side length
/// `2b+1`) covers indices `4b(b-1)..4b(b+1)`, walked down the left side,
/// across the bottom, up the right side and back across the top.
pub fn spiral_offset(index: usize, max_band: usize) -> SprawlResult<(isize, isize)> {
    let mut band = 0usize;
    for bn in 1..max_band.max(2) {
        if 8 * ((1 + bn) * bn) / 2 > index {
            band = bn;
            break;
        }
    }
    if band == 0 {
        return Err(SprawlError::Validation(format!(
            "road search index {index} exceeds the spiral ({max_band} bands)"
        )));
    }
    let bn = band as isize;
    let offset = (index - 8 * ((band - 1) * band) / 2) as isize;
    let side_len = bn * 2 + 1;
    let cap_len = bn * 2 - 1;
    let range1 = side_len;
    let range2 = side_len + cap_len;
    let range3 = 2 * side_len + cap_len;
    let range4 = 2 * side_len + 2 * cap_len;
    let (i, j) = if offset < range1 {
        (-bn + offset, -bn)
    } else if offset < range2 {
        (bn, -bn + 1 + (offset - range1))
    } else if offset < range3 {
        (bn - (offset - range2), bn)
    } else if offset < range4 {
        (-bn, bn - 1 - (offset - range3))
    } else {
        return Err(SprawlError::Validation(format!(
            "road search offset {offset} fell outside band {band}"
        )));
    };
    Ok((i, j))
}

/// Spiral outward from a growth pixel until a road pixel is found, up to
/// `max_search_index` cells.
fn road_search(
    center: (usize, usize),
    max_search_index: usize,
    roads: &Grid,
) -> SprawlResult<Option<(usize, usize)>> {
    let max_band = roads.rows().max(roads.cols());
    for index in 0..max_search_index {
        let (di, dj) = spiral_offset(index, max_band)?;
        let r = center.0 as isize + di;
        let c = center.1 as isize + dj;
        if roads.in_bounds(r, c) && roads.get(r as usize, c as usize) > 0 {
            return Ok(Some((r as usize, c as usize)));
        }
    }
    Ok(None)
}

/// Walk along road pixels in random directions until the step count
/// exceeds the run budget set by the local road value and diffusion.
/// Returns the end-of-road pixel, or `None` for a zero-length road.
fn road_walk(
    start: (usize, usize),
    roads: &Grid,
    diffusion: f64,
    rng: &mut RandomStream,
) -> Option<(usize, usize)> {
    let (mut row, mut col) = start;
    let mut run = 0i64;
    loop {
        let mut end_of_road = true;
        let begin = rng.uniform_int(8);
        for k in 0..8 {
            let (r, c) = neighbor_at(row, col, begin + k);
            if roads.in_bounds(r, c) && roads.get(r as usize, c as usize) > 0 {
                end_of_road = false;
                run += 1;
                row = r as usize;
                col = c as usize;
                break;
            }
        }
        let run_value =
            (roads.get(row, col) as f64 * diffusion / MAX_ROAD_VALUE as f64) as i64;
        if run > run_value {
            return Some((row, col));
        }
        if end_of_road {
            return None;
        }
    }
}

/// Phase 5: road trips. Pick random pixels from this year's growth,
/// search for a nearby road, walk it, and urbanize around the walk's end.
#[allow(clippy::too_many_arguments)]
fn phase5(
    coeffs: &Coefficients,
    z: &Grid,
    delta: &mut Grid,
    slope: &Grid,
    excluded: &Grid,
    roads: &Grid,
    swght: &[f64],
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
    outcome: &mut SpreadOutcome,
) -> SprawlResult<()> {
    let mut growth: Vec<(usize, usize)> = Vec::new();
    for row in 0..delta.rows() {
        for col in 0..delta.cols() {
            if delta.get(row, col) > 0 {
                growth.push((row, col));
            }
        }
    }
    if growth.is_empty() {
        return Ok(());
    }

    let trips = 1 + coeffs.breed as usize;
    for _ in 0..trips {
        let gravity = road_gravity_value(coeffs.road_gravity, z.rows(), z.cols());
        let mut max_search_index = 4 * (gravity * (1 + gravity)) as usize;
        max_search_index = max_search_index.max(z.rows()).max(z.cols());

        let center = growth[(growth.len() as f64 * rng.uniform()) as usize];
        let Some(road_start) = road_search(center, max_search_index, roads)? else {
            continue;
        };
        let Some(road_end) = road_walk(road_start, roads, coeffs.diffusion, rng) else {
            continue;
        };
        let Some(settled) = urbanize_neighbor(
            road_end.0,
            road_end.1,
            z,
            delta,
            slope,
            excluded,
            swght,
            GrowthTag::Road,
            rng,
            attempts,
        ) else {
            continue;
        };
        outcome.rt += 1;
        // three further attempts, all centered on the settled pixel
        for _ in 0..3 {
            if urbanize_neighbor(
                settled.0,
                settled.1,
                z,
                delta,
                slope,
                excluded,
                swght,
                GrowthTag::Road,
                rng,
                attempts,
            )
            .is_some()
            {
                outcome.rt += 1;
            }
        }
    }
    Ok(())
}

/// Run all four phases for one year and merge the additions into `z`.
pub fn spread(
    layers: &InputLayers,
    critical_slope: f64,
    coeffs: &Coefficients,
    year: u16,
    rng: &mut RandomStream,
    attempts: &mut UrbanizationAttempts,
    pool: &WorkerPool,
    z: &mut Grid,
) -> SprawlResult<SpreadOutcome> {
    let mut delta = pool.scratch("spread delta")?;
    let slope = &layers.slope;
    let excluded = &layers.excluded;
    let roads = layers.road_for_year(year);
    let swght = slope_weights(critical_slope, coeffs.slope_resistance);
    let mut outcome = SpreadOutcome::default();

    phase1n3(
        coeffs, z, &mut delta, slope, excluded, &swght, rng, attempts, &mut outcome,
    );
    phase4(
        coeffs, z, &mut delta, slope, excluded, &swght, rng, attempts, &mut outcome,
    );
    phase5(
        coeffs, z, &mut delta, slope, excluded, roads, &swght, rng, attempts, &mut outcome,
    )?;

    // nothing should have written above the road tag; scrub anyway, then
    // clear growth that landed on excluded ground
    delta.assign_where_self(CmpOp::Gt, GrowthTag::Road.cell(), 0);
    delta.assign_where(excluded, CmpOp::Ge, EXCLUDED_THRESHOLD, 0);

    let mut slope_sum = 0.0f64;
    let mut growth = 0usize;
    for row in 0..z.rows() {
        for col in 0..z.cols() {
            let tag = delta.get(row, col);
            if tag > 0 && z.get(row, col) == 0 {
                slope_sum += slope.get(row, col) as f64;
                z.set(row, col, tag);
                growth += 1;
            }
        }
    }
    outcome.num_growth_pix = growth;
    outcome.average_slope = if growth == 0 {
        0.0
    } else {
        slope_sum / growth as f64
    };
    outcome.pop = z.count_where(CmpOp::Ge, GrowthTag::Seed.cell());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprawl_core::Cell;

    fn flat_layers(rows: usize, cols: usize, urban: &[Cell]) -> InputLayers {
        let mut seed = Grid::from_cells(rows, cols, urban.to_vec()).unwrap();
        seed.year = Some(1990);
        let mut road = Grid::new(rows, cols);
        road.set(0, 0, 100);
        road.year = Some(1990);
        road.rescan();
        InputLayers::from_grids(
            "test",
            vec![seed],
            vec![road],
            Vec::new(),
            Grid::new(rows, cols),
            Grid::new(rows, cols),
            None,
        )
        .unwrap()
    }

    fn seeded_z(layers: &InputLayers) -> Grid {
        let mut z = Grid::new(layers.rows(), layers.cols());
        z.assign_where(&layers.urban[0], CmpOp::Gt, 0, GrowthTag::Seed.cell());
        z
    }

    #[test]
    fn slope_weights_monotone_and_saturating() {
        let w = slope_weights(15.0, 50.0);
        for pair in w.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert_eq!(w[15], 1.0);
        assert_eq!(w[255], 1.0);
        assert_eq!(w[0], 0.0);
    }

    #[test]
    fn diffusion_value_tops_out_at_5_percent_of_diagonal() {
        let v = diffusion_value(100.0, 300, 400);
        assert!((v - 0.5 * 500.0 / 2.0).abs() < 1e-9); // 0.005 * 100 * 500
    }

    #[test]
    fn spiral_visits_band_one_counterclockwise_from_top_left() {
        // band 1 has 8 cells; first side runs down the left column
        assert_eq!(spiral_offset(0, 10).unwrap(), (-1, -1));
        assert_eq!(spiral_offset(1, 10).unwrap(), (0, -1));
        assert_eq!(spiral_offset(2, 10).unwrap(), (1, -1));
        assert_eq!(spiral_offset(3, 10).unwrap(), (1, 0));
        assert_eq!(spiral_offset(4, 10).unwrap(), (1, 1));
        assert_eq!(spiral_offset(5, 10).unwrap(), (0, 1));
        assert_eq!(spiral_offset(6, 10).unwrap(), (-1, 1));
        assert_eq!(spiral_offset(7, 10).unwrap(), (-1, 0));
    }

    #[test]
    fn spiral_band_two_starts_at_index_eight() {
        assert_eq!(spiral_offset(8, 10).unwrap(), (-2, -2));
    }

    #[test]
    fn urbanize_already_urban_only_counts_z_failure() {
        let layers = flat_layers(4, 4, &[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let z = seeded_z(&layers);
        let mut delta = Grid::new(4, 4);
        let swght = slope_weights(15.0, 1.0);
        let mut rng = RandomStream::new(1);
        let mut attempts = UrbanizationAttempts::default();
        let ok = urbanize(
            1,
            1,
            &z,
            &mut delta,
            &layers.slope,
            &layers.excluded,
            &swght,
            GrowthTag::Spontaneous,
            &mut rng,
            &mut attempts,
        );
        assert!(!ok);
        assert_eq!(attempts.z_failures, 1);
        assert_eq!(attempts.total(), 1);
    }

    #[test]
    fn fully_excluded_grid_never_grows() {
        let mut layers = flat_layers(6, 6, &{
            let mut v = vec![0; 36];
            v[7] = 1;
            v
        });
        layers.excluded.fill(100);
        let mut z = seeded_z(&layers);
        let pool = WorkerPool::new(6, 6, 0, 4);
        let coeffs = Coefficients::new(100.0, 100.0, 100.0, 1.0, 1.0);
        let mut rng = RandomStream::new(1);
        let mut attempts = UrbanizationAttempts::default();
        let outcome = spread(
            &layers, 15.0, &coeffs, 1991, &mut rng, &mut attempts, &pool, &mut z,
        )
        .unwrap();
        assert_eq!(outcome.num_growth_pix, 0);
        assert_eq!(outcome.pop, 1);
    }

    #[test]
    fn solid_urban_grid_has_no_organic_growth() {
        // every interior pixel has 8 urban neighbors, which the 2..8
        // band excludes
        let mut z = Grid::new(10, 10);
        z.fill(GrowthTag::Seed.cell());
        let slope = Grid::new(10, 10);
        let excluded = Grid::new(10, 10);
        let mut delta = Grid::new(10, 10);
        let swght = slope_weights(15.0, 1.0);
        let mut rng = RandomStream::new(1);
        let mut attempts = UrbanizationAttempts::default();
        let coeffs = Coefficients::new(1.0, 1.0, 100.0, 1.0, 1.0);
        let mut outcome = SpreadOutcome::default();
        phase4(
            &coeffs,
            &z,
            &mut delta,
            &slope,
            &excluded,
            &swght,
            &mut rng,
            &mut attempts,
            &mut outcome,
        );
        assert_eq!(outcome.og, 0);
        assert_eq!(delta.count_where(CmpOp::Gt, 0), 0);
    }

    #[test]
    fn one_pixel_frame_never_spreads() {
        let layers = flat_layers(3, 3, &[0, 0, 0, 0, 1, 0, 0, 0, 0]);
        let mut z = Grid::new(3, 3);
        // urban only on the frame
        for c in 0..3 {
            z.set(0, c, GrowthTag::Seed.cell());
        }
        let mut delta = Grid::new(3, 3);
        let swght = slope_weights(15.0, 1.0);
        let mut rng = RandomStream::new(9);
        let mut attempts = UrbanizationAttempts::default();
        let coeffs = Coefficients::new(1.0, 1.0, 100.0, 1.0, 1.0);
        let mut outcome = SpreadOutcome::default();
        phase4(
            &coeffs,
            &z,
            &mut delta,
            &layers.slope,
            &layers.excluded,
            &swght,
            &mut rng,
            &mut attempts,
            &mut outcome,
        );
        // the only interior pixel (1,1) is not urban, so nothing happens
        assert_eq!(outcome.og, 0);
        assert_eq!(delta.count_where(CmpOp::Gt, 0), 0);
    }

    #[test]
    fn road_search_finds_the_nearest_band_first() {
        let mut roads = Grid::new(9, 9);
        roads.set(4, 3, 80); // band 1 of (4,4)
        roads.set(0, 0, 80); // band 4
        let hit = road_search((4, 4), 80, &roads).unwrap();
        assert_eq!(hit, Some((4, 3)));
    }

    #[test]
    fn road_search_gives_up_outside_the_radius() {
        let mut roads = Grid::new(9, 9);
        roads.set(0, 0, 80);
        // 8 spiral cells only cover band 1, which misses the corner
        let hit = road_search((4, 4), 8, &roads).unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn road_walk_with_isolated_road_pixel_returns_none() {
        let mut roads = Grid::new(5, 5);
        roads.set(2, 2, 100);
        let mut rng = RandomStream::new(3);
        // run budget is road/100 * diffusion = 1, and no neighbor is a
        // road pixel, so the walk ends without spreading
        assert_eq!(road_walk((2, 2), &roads, 1.0, &mut rng), None);
    }

    #[test]
    fn road_walk_along_a_line_terminates() {
        let mut roads = Grid::new(3, 8);
        for c in 0..8 {
            roads.set(1, c, 100);
        }
        let mut rng = RandomStream::new(3);
        let end = road_walk((1, 0), &roads, 2.0, &mut rng).unwrap();
        assert!(roads.get(end.0, end.1) > 0);
    }

    #[test]
    fn spontaneous_growth_on_flat_open_grid() {
        let layers = flat_layers(4, 4, &{
            let mut v = vec![0; 16];
            v[5] = 1;
            v
        });
        let mut z = seeded_z(&layers);
        let pool = WorkerPool::new(4, 4, 0, 4);
        let coeffs = Coefficients::new(100.0, 1.0, 1.0, 1.0, 1.0);
        let mut rng = RandomStream::new(1);
        let mut attempts = UrbanizationAttempts::default();
        let outcome = spread(
            &layers, 15.0, &coeffs, 1991, &mut rng, &mut attempts, &pool, &mut z,
        )
        .unwrap();
        assert!(outcome.sng > 0);
        assert_eq!(outcome.sdc, 0);
        assert_eq!(outcome.og, 0);
        assert_eq!(outcome.pop, 1 + outcome.num_growth_pix);
    }

    #[test]
    fn breed_at_full_strength_spawns_spreading_centers() {
        let layers = flat_layers(4, 4, &{
            let mut v = vec![0; 16];
            v[5] = 1;
            v
        });
        let mut z = seeded_z(&layers);
        let pool = WorkerPool::new(4, 4, 0, 4);
        let coeffs = Coefficients::new(100.0, 100.0, 1.0, 1.0, 1.0);
        let mut rng = RandomStream::new(1);
        let mut attempts = UrbanizationAttempts::default();
        let outcome = spread(
            &layers, 15.0, &coeffs, 1991, &mut rng, &mut attempts, &pool, &mut z,
        )
        .unwrap();
        if outcome.sng > 0 {
            assert!(outcome.sdc > 0);
        }
    }
}
