//! Statistics record types shared across the workspace.
//!
//! [`UrbanStats`] is the per-year snapshot appended to the grow log for
//! every Monte Carlo realization; [`ObservedStats`] is the same family of
//! spatial measures computed once from an observed urban raster. The
//! arithmetic helpers (accumulate / average / deviation) keep the Monte
//! Carlo reductions field-exact without twenty-three hand-copied lines per
//! operation.

use serde::{Deserialize, Serialize};

macro_rules! for_each_stat {
    ($m:ident) => {
        $m!(sng);
        $m!(sdc);
        $m!(og);
        $m!(rt);
        $m!(pop);
        $m!(area);
        $m!(edges);
        $m!(clusters);
        $m!(xmean);
        $m!(ymean);
        $m!(rad);
        $m!(slope);
        $m!(mean_cluster_size);
        $m!(diffusion);
        $m!(spread);
        $m!(breed);
        $m!(slope_resistance);
        $m!(road_gravity);
        $m!(percent_urban);
        $m!(percent_road);
        $m!(growth_rate);
        $m!(leesalee);
        $m!(num_growth_pix);
    };
}

/// One simulated year's statistics for one Monte Carlo realization.
///
/// `sng`/`sdc`/`og`/`rt` are the pixel counts produced by the four growth
/// phases (spontaneous, spreading center, organic, road influenced); the
/// rest are aggregate geometry, the coefficients in force and the
/// match-to-history scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UrbanStats {
    pub sng: f64,
    pub sdc: f64,
    pub og: f64,
    pub rt: f64,
    pub pop: f64,
    pub area: f64,
    pub edges: f64,
    pub clusters: f64,
    pub xmean: f64,
    pub ymean: f64,
    pub rad: f64,
    pub slope: f64,
    pub mean_cluster_size: f64,
    pub diffusion: f64,
    pub spread: f64,
    pub breed: f64,
    pub slope_resistance: f64,
    pub road_gravity: f64,
    pub percent_urban: f64,
    pub percent_road: f64,
    pub growth_rate: f64,
    pub leesalee: f64,
    pub num_growth_pix: f64,
}

/// Number of `f64` fields in [`UrbanStats`]; fixed by the grow-log layout.
pub const URBAN_STATS_FIELDS: usize = 23;

impl UrbanStats {
    /// Field-wise `self += other`, used for Monte Carlo running totals.
    pub fn accumulate(&mut self, other: &UrbanStats) {
        macro_rules! acc {
            ($f:ident) => {
                self.$f += other.$f;
            };
        }
        for_each_stat!(acc);
    }

    /// Field-wise division by a realization count.
    pub fn averaged(&self, n: usize) -> UrbanStats {
        let n = n as f64;
        let mut out = UrbanStats::default();
        macro_rules! avg {
            ($f:ident) => {
                out.$f = self.$f / n;
            };
        }
        for_each_stat!(avg);
        out
    }

    /// Field-wise `self += (record - mean)^2`, accumulating squared
    /// deviations for the running standard deviation.
    pub fn accumulate_squared_deviation(&mut self, record: &UrbanStats, mean: &UrbanStats) {
        macro_rules! dev {
            ($f:ident) => {
                let d = record.$f - mean.$f;
                self.$f += d * d;
            };
        }
        for_each_stat!(dev);
    }

    /// Field-wise `sqrt(self / n)`, finishing a standard deviation from
    /// accumulated squared deviations.
    pub fn sqrt_scaled(&self, n: usize) -> UrbanStats {
        let n = n as f64;
        let mut out = UrbanStats::default();
        macro_rules! fin {
            ($f:ident) => {
                out.$f = (self.$f / n).sqrt();
            };
        }
        for_each_stat!(fin);
        out
    }

    /// Fields in the canonical grow-log order.
    pub fn to_array(&self) -> [f64; URBAN_STATS_FIELDS] {
        let mut out = [0.0; URBAN_STATS_FIELDS];
        let mut i = 0;
        macro_rules! put {
            ($f:ident) => {
                out[i] = self.$f;
                i += 1;
            };
        }
        for_each_stat!(put);
        let _ = i;
        out
    }

    /// Inverse of [`UrbanStats::to_array`].
    pub fn from_array(values: [f64; URBAN_STATS_FIELDS]) -> UrbanStats {
        let mut out = UrbanStats::default();
        let mut i = 0;
        macro_rules! take {
            ($f:ident) => {
                out.$f = values[i];
                i += 1;
            };
        }
        for_each_stat!(take);
        let _ = i;
        out
    }
}

/// Spatial measures of one observed urban raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedStats {
    pub area: f64,
    pub edges: f64,
    pub clusters: f64,
    pub pop: f64,
    pub xmean: f64,
    pub ymean: f64,
    pub rad: f64,
    pub average_slope: f64,
    pub mean_cluster_size: f64,
    pub percent_urban: f64,
}

/// Tallies of urbanization attempts for one Monte Carlo realization,
/// indexed by the gate that rejected the attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrbanizationAttempts {
    pub successes: u64,
    pub z_failures: u64,
    pub delta_failures: u64,
    pub slope_failures: u64,
    pub excluded_failures: u64,
}

impl UrbanizationAttempts {
    pub fn reset(&mut self) {
        *self = UrbanizationAttempts::default();
    }

    pub fn total(&self) -> u64 {
        self.successes
            + self.z_failures
            + self.delta_failures
            + self.slope_failures
            + self.excluded_failures
    }
}
