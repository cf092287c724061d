//! Deltatron land-cover sub-model.
//!
//! Runs each year after growth when land cover is enabled. The deltatron
//! grid doubles as state flag and cooldown counter per pixel:
//! [`ELIGIBLE`] (0) means the pixel may transition this year, 1..=5 count
//! years since its last transition, and only pixels at exactly
//! [`RECRUITER`] (2) — transitioned the previous year — recruit their
//! neighbors in phase 2. Aging increments every positive value and
//! resets anything past [`MIN_YEARS_BETWEEN_TRANSITIONS`].

use crate::transition::TransitionTable;
use sprawl_core::{
    neighbor_at, Cell, ClassTable, CmpOp, Grid, RandomStream, SprawlResult, WorkerPool,
};

/// Upper bound on pixels recruited into one phase-1 cluster.
pub const REGION_SIZE: usize = 30;
/// Scale factor on phase-2 transition probabilities.
pub const DELTA_PHASE2_SENSITIVITY: f64 = 1.0;
/// Cooldown: a pixel aged past this becomes eligible again.
pub const MIN_YEARS_BETWEEN_TRANSITIONS: Cell = 5;

/// Deltatron state: free to transition this year.
pub const ELIGIBLE: Cell = 0;
/// Deltatron state: transitioned this year.
pub const NEWBORN: Cell = 1;
/// Deltatron state: transitioned last year; recruits neighbors.
pub const RECRUITER: Cell = 2;

/// Random neighbor of `(row, col)`; may fall outside the image, exactly
/// like the cluster walks it serves.
fn random_step(row: usize, col: usize, rng: &mut RandomStream) -> (isize, isize) {
    neighbor_at(row, col, rng.uniform_int(8))
}

/// Pick the new land class for a transition at a pixel with local slope
/// `local_slope`: of two distinct random reduced classes, the one whose
/// mean slope is closer.
fn pick_new_landuse(
    classes: &ClassTable,
    transition: &TransitionTable,
    local_slope: Cell,
    rng: &mut RandomStream,
) -> Cell {
    let (first, second) = loop {
        let a = classes.reduced_ordinal(rng.uniform_int(classes.reduced_len()));
        let b = classes.reduced_ordinal(rng.uniform_int(classes.reduced_len()));
        if a != b {
            break (a, b);
        }
    };
    let diff1 = local_slope as f64 - transition.class_slope(first);
    let diff2 = local_slope as f64 - transition.class_slope(second);
    if diff1 * diff1 < diff2 * diff2 {
        classes.class(first).value
    } else {
        classes.class(second).value
    }
}

/// Phase 1: seed `drive` transition clusters. Each seed picks an
/// eligible pixel, chooses a slope-matched new class and, passing the
/// transition probability, converts the pixel and walks a cluster of up
/// to [`REGION_SIZE`] steps around it, re-centering roughly one step in
/// eight.
#[allow(clippy::too_many_arguments)]
fn phase1(
    drive: usize,
    urban_land: &Grid,
    phase1_land: &mut Grid,
    slope: &Grid,
    deltatron: &mut Grid,
    classes: &ClassTable,
    transition: &TransitionTable,
    rng: &mut RandomStream,
) {
    phase1_land.copy_from(urban_land);

    let prob_from = |land_value: Cell, new_landuse: Cell| {
        transition.probability(classes.ordinal_of(land_value), classes.ordinal_of(new_landuse))
    };

    for _ in 0..drive {
        let (center_row, center_col) = loop {
            let r = rng.uniform_int(urban_land.rows());
            let c = rng.uniform_int(urban_land.cols());
            if classes.is_transitional_value(urban_land.get(r, c)) {
                break (r, c);
            }
        };
        let new_landuse = pick_new_landuse(
            classes,
            transition,
            slope.get(center_row, center_col),
            rng,
        );
        if rng.uniform() >= prob_from(urban_land.get(center_row, center_col), new_landuse) {
            continue;
        }
        phase1_land.set(center_row, center_col, new_landuse);
        deltatron.set(center_row, center_col, NEWBORN);

        // the walk position may step outside the image; such steps do
        // nothing but the walk continues from there
        let mut row = center_row as isize;
        let mut col = center_col as isize;
        for _ in 0..REGION_SIZE {
            if rng.uniform_int(8) == 7 {
                row = center_row as isize;
                col = center_col as isize;
            }
            let k = rng.uniform_int(8);
            row += sprawl_core::NEIGHBOR_ROW[k];
            col += sprawl_core::NEIGHBOR_COL[k];
            if !urban_land.in_bounds(row, col) {
                continue;
            }
            let (r, c) = (row as usize, col as usize);
            if rng.uniform() < prob_from(urban_land.get(r, c), new_landuse) {
                if classes.is_transitional_value(urban_land.get(r, c)) {
                    phase1_land.set(r, c, new_landuse);
                    deltatron.set(r, c, NEWBORN);
                }
                // and try to carry the transition one neighbor further
                let k = rng.uniform_int(8);
                row += sprawl_core::NEIGHBOR_ROW[k];
                col += sprawl_core::NEIGHBOR_COL[k];
                if urban_land.in_bounds(row, col) {
                    let (r, c) = (row as usize, col as usize);
                    if classes.is_transitional_value(urban_land.get(r, c)) {
                        phase1_land.set(r, c, new_landuse);
                        deltatron.set(r, c, NEWBORN);
                    }
                }
            }
        }
    }
}

/// Phase 2: propagation. Every eligible interior pixel with enough
/// recruiter neighbors searches up to 16 random neighbors for a
/// recruiter and, passing the scaled transition probability, copies that
/// neighbor's pre-transition class.
fn phase2(
    urban_land: &Grid,
    phase1_land: &Grid,
    deltatron: &mut Grid,
    phase2_land: &mut Grid,
    classes: &ClassTable,
    transition: &TransitionTable,
    rng: &mut RandomStream,
) {
    const MAX_TRIES: usize = 16;
    phase2_land.copy_from(phase1_land);

    for row in 1..urban_land.rows() - 1 {
        for col in 1..urban_land.cols() - 1 {
            if !classes.is_transitional_value(phase1_land.get(row, col))
                || deltatron.get(row, col) != ELIGIBLE
            {
                continue;
            }
            let recruiters = deltatron.count_neighbors(row, col, CmpOp::Eq, RECRUITER);
            let needed = 1 + rng.uniform_int(2);
            if recruiters < needed {
                continue;
            }
            for _ in 0..MAX_TRIES {
                let (r, c) = random_step(row, col, rng);
                if !urban_land.in_bounds(r, c) {
                    continue;
                }
                let (nr, nc) = (r as usize, c as usize);
                if deltatron.get(nr, nc) == RECRUITER
                    && classes.is_transitional_value(phase1_land.get(nr, nc))
                {
                    let p = transition.probability(
                        classes.ordinal_of(phase2_land.get(row, col)),
                        classes.ordinal_of(urban_land.get(nr, nc)),
                    ) * DELTA_PHASE2_SENSITIVITY;
                    if rng.uniform() < p {
                        phase2_land.set(row, col, urban_land.get(nr, nc));
                        deltatron.set(row, col, NEWBORN);
                    }
                    break;
                }
            }
        }
    }
}

/// Age every deltatron, then retire those past the cooldown. Runs after
/// the optional deltatron-age image emission, so the written grid shows
/// this year's pre-aging states.
pub fn age(deltatron: &mut Grid) {
    for v in deltatron.data_mut() {
        if *v > 0 {
            *v += 1;
        }
    }
    deltatron.assign_where_self(CmpOp::Gt, MIN_YEARS_BETWEEN_TRANSITIONS, 0);
}

/// One deltatron year: phase 1 seeding driven by this year's growth
/// count, then phase 2 propagation. `urban_land` is the land grid with
/// this year's urbanization already overlaid; the result lands in
/// `land_out`. The caller emits the age image (if requested) and then
/// runs [`age`].
#[allow(clippy::too_many_arguments)]
pub fn deltatron(
    classes: &ClassTable,
    transition: &TransitionTable,
    pool: &WorkerPool,
    deltatron_grid: &mut Grid,
    urban_land: &Grid,
    land_out: &mut Grid,
    slope: &Grid,
    drive: usize,
    rng: &mut RandomStream,
) -> SprawlResult<()> {
    let mut phase1_land = pool.scratch("deltatron phase1")?;
    phase1(
        drive,
        urban_land,
        &mut phase1_land,
        slope,
        deltatron_grid,
        classes,
        transition,
        rng,
    );
    phase2(
        urban_land,
        &phase1_land,
        deltatron_grid,
        land_out,
        classes,
        transition,
        rng,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprawl_core::{LandClass, Rgb};

    fn classes() -> ClassTable {
        ClassTable::new(vec![
            LandClass::new(0, "UNC", "Unclassified", Rgb::default()),
            LandClass::new(1, "URB", "Urban", Rgb::default()),
            LandClass::new(2, "AGR", "Agriculture", Rgb::default()),
            LandClass::new(3, "FOR", "Forest", Rgb::default()),
        ])
        .unwrap()
    }

    fn uniform_transition(classes: &ClassTable) -> TransitionTable {
        // half the AGR pixels become FOR and vice versa, over flat slope
        let land0 = Grid::from_cells(2, 2, vec![2, 2, 3, 3]).unwrap();
        let land1 = Grid::from_cells(2, 2, vec![2, 3, 3, 2]).unwrap();
        let slope = Grid::new(2, 2);
        TransitionTable::build(classes, &land0, &land1, &slope).unwrap()
    }

    #[test]
    fn zero_drive_changes_nothing() {
        let classes = classes();
        let transition = uniform_transition(&classes);
        let pool = WorkerPool::new(4, 4, 0, 2);
        let mut delta_grid = Grid::new(4, 4);
        let urban_land = Grid::from_cells(4, 4, vec![2; 16]).unwrap();
        let mut land_out = Grid::new(4, 4);
        let slope = Grid::new(4, 4);
        let mut rng = RandomStream::new(11);
        deltatron(
            &classes,
            &transition,
            &pool,
            &mut delta_grid,
            &urban_land,
            &mut land_out,
            &slope,
            0,
            &mut rng,
        )
        .unwrap();
        assert_eq!(land_out.data(), urban_land.data());
        assert_eq!(delta_grid.count_where(CmpOp::Gt, 0), 0);
    }

    #[test]
    fn aging_increments_and_retires() {
        let mut grid = Grid::from_cells(1, 4, vec![0, 1, 2, 5]).unwrap();
        age(&mut grid);
        assert_eq!(grid.data(), &[0, 2, 3, 0]);
    }

    #[test]
    fn cooldown_runs_five_years_then_frees() {
        let mut grid = Grid::from_cells(1, 1, vec![NEWBORN]).unwrap();
        let mut seen = Vec::new();
        for _ in 0..5 {
            age(&mut grid);
            seen.push(grid.get(0, 0));
        }
        assert_eq!(seen, vec![2, 3, 4, 5, ELIGIBLE]);
    }

    #[test]
    fn phase1_marks_transitions_as_newborn() {
        let classes = classes();
        let transition = uniform_transition(&classes);
        let mut delta_grid = Grid::new(8, 8);
        let urban_land = Grid::from_cells(8, 8, vec![2; 64]).unwrap();
        let mut phase1_land = Grid::new(8, 8);
        let slope = Grid::new(8, 8);
        let mut rng = RandomStream::new(5);
        phase1(
            20,
            &urban_land,
            &mut phase1_land,
            &slope,
            &mut delta_grid,
            &classes,
            &transition,
            &mut rng,
        );
        let transitioned = (0..64)
            .filter(|&i| phase1_land.data()[i] != urban_land.data()[i])
            .count();
        // every changed pixel must carry a newborn deltatron
        for i in 0..64 {
            if phase1_land.data()[i] != urban_land.data()[i] {
                assert_eq!(delta_grid.data()[i], NEWBORN);
            }
        }
        assert!(transitioned > 0);
        // transitions only flip between the two reduced classes
        for &v in phase1_land.data() {
            assert!(v == 2 || v == 3);
        }
    }

    #[test]
    fn phase2_requires_recruiters() {
        let classes = classes();
        let transition = uniform_transition(&classes);
        let urban_land = Grid::from_cells(4, 4, vec![2; 16]).unwrap();
        let phase1_land = urban_land.clone();
        let mut deltatron_grid = Grid::new(4, 4);
        let mut phase2_land = Grid::new(4, 4);
        let mut rng = RandomStream::new(2);
        phase2(
            &urban_land,
            &phase1_land,
            &mut deltatron_grid,
            &mut phase2_land,
            &classes,
            &transition,
            &mut rng,
        );
        // no recruiters anywhere, so the copy is untouched
        assert_eq!(phase2_land.data(), phase1_land.data());
    }

    #[test]
    fn cooldown_pixels_do_not_retransition() {
        let classes = classes();
        let transition = uniform_transition(&classes);
        let urban_land = Grid::from_cells(3, 3, vec![2; 9]).unwrap();
        let phase1_land = urban_land.clone();
        // center is cooling down, ringed by recruiters
        let mut deltatron_grid = Grid::from_cells(3, 3, vec![2, 2, 2, 2, 3, 2, 2, 2, 2]).unwrap();
        let mut phase2_land = Grid::new(3, 3);
        let mut rng = RandomStream::new(2);
        phase2(
            &urban_land,
            &phase1_land,
            &mut deltatron_grid,
            &mut phase2_land,
            &classes,
            &transition,
            &mut rng,
        );
        assert_eq!(phase2_land.get(1, 1), 2);
        assert_eq!(deltatron_grid.get(1, 1), 3);
    }
}
