//! Land-cover transition probabilities.
//!
//! Built once at init from the two land-cover snapshots: `T[from, to]`
//! is the row-normalized count of pixels that moved from class `from` to
//! class `to` between the snapshots, and each class gets the mean slope
//! of its pixels in the second snapshot. The deltatron consumes both.

use sprawl_core::{ClassTable, Grid, SprawlError, SprawlResult};
use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct TransitionTable {
    classes: usize,
    probs: Vec<f64>,
    class_slope: Vec<f64>,
}

impl TransitionTable {
    pub fn build(
        classes: &ClassTable,
        land0: &Grid,
        land1: &Grid,
        slope: &Grid,
    ) -> SprawlResult<TransitionTable> {
        if classes.reduced_len() < 2 {
            return Err(SprawlError::Validation(format!(
                "deltatron transitions need at least two eligible classes, found {}",
                classes.reduced_len()
            )));
        }
        let n = classes.len();
        let mut counts = vec![0u64; n * n];
        let mut dest_counts = vec![0u64; n];
        let mut slope_sums = vec![0.0f64; n];

        for ((&v0, &v1), &s) in land0
            .data()
            .iter()
            .zip(land1.data().iter())
            .zip(slope.data().iter())
        {
            let from = classes.ordinal_of(v0);
            let to = classes.ordinal_of(v1);
            counts[from * n + to] += 1;
            dest_counts[to] += 1;
            slope_sums[to] += s as f64;
        }

        let mut probs = vec![0.0f64; n * n];
        for from in 0..n {
            let row_sum: u64 = counts[from * n..(from + 1) * n].iter().sum();
            if row_sum > 0 {
                for to in 0..n {
                    probs[from * n + to] = counts[from * n + to] as f64 / row_sum as f64;
                }
            }
        }

        let class_slope = (0..n)
            .map(|k| {
                if dest_counts[k] > 0 {
                    slope_sums[k] / dest_counts[k] as f64
                } else {
                    0.0
                }
            })
            .collect();

        Ok(TransitionTable {
            classes: n,
            probs,
            class_slope,
        })
    }

    pub fn len(&self) -> usize {
        self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes == 0
    }

    #[inline]
    pub fn probability(&self, from_ordinal: usize, to_ordinal: usize) -> f64 {
        self.probs[from_ordinal * self.classes + to_ordinal]
    }

    /// Mean slope of the class's footprint in the later snapshot.
    #[inline]
    pub fn class_slope(&self, ordinal: usize) -> f64 {
        self.class_slope[ordinal]
    }

    /// Matrix rendering for the run log.
    pub fn render(&self, classes: &ClassTable) -> String {
        let mut out = String::from("transition probability matrix (rows: from, cols: to)\n");
        let _ = write!(out, "{:>12}", "");
        for to in 0..self.classes {
            let _ = write!(out, "{:>8}", classes.class(to).id);
        }
        out.push('\n');
        for from in 0..self.classes {
            let _ = write!(out, "{:>12}", classes.class(from).id);
            for to in 0..self.classes {
                let _ = write!(out, "{:>8.4}", self.probability(from, to));
            }
            let _ = writeln!(out, "  slope {:>6.2}", self.class_slope(from));
        }
        out
    }
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

    #[test]
    fn rows_are_normalized() {
        let classes = classes();
        let land0 = Grid::from_cells(2, 2, vec![2, 2, 2, 3]).unwrap();
        let land1 = Grid::from_cells(2, 2, vec![2, 3, 3, 3]).unwrap();
        let slope = Grid::from_cells(2, 2, vec![10, 20, 30, 40]).unwrap();
        let t = TransitionTable::build(&classes, &land0, &land1, &slope).unwrap();

        // of three AGR pixels, one stayed AGR and two became FOR
        assert!((t.probability(2, 2) - 1.0 / 3.0).abs() < 1e-12);
        assert!((t.probability(2, 3) - 2.0 / 3.0).abs() < 1e-12);
        // FOR row: one pixel, stayed FOR
        assert_eq!(t.probability(3, 3), 1.0);
        // empty rows stay zero
        assert_eq!(t.probability(1, 2), 0.0);
    }

    #[test]
    fn class_slope_averages_destination_pixels() {
        let classes = classes();
        let land0 = Grid::from_cells(2, 2, vec![2, 2, 3, 3]).unwrap();
        let land1 = Grid::from_cells(2, 2, vec![2, 2, 3, 3]).unwrap();
        let slope = Grid::from_cells(2, 2, vec![10, 20, 30, 50]).unwrap();
        let t = TransitionTable::build(&classes, &land0, &land1, &slope).unwrap();
        assert!((t.class_slope(2) - 15.0).abs() < 1e-12);
        assert!((t.class_slope(3) - 40.0).abs() < 1e-12);
        assert_eq!(t.class_slope(1), 0.0);
    }

    #[test]
    fn one_eligible_class_is_rejected() {
        let classes = ClassTable::new(vec![
            LandClass::new(1, "URB", "Urban", Rgb::default()),
            LandClass::new(2, "AGR", "Agriculture", Rgb::default()),
        ])
        .unwrap();
        let grid = Grid::new(1, 1);
        assert!(matches!(
            TransitionTable::build(&classes, &grid, &grid, &grid),
            Err(SprawlError::Validation(_))
        ));
    }
}
