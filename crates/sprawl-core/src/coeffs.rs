//! Growth-coefficient state and the end-of-year self-modification rule.
//!
//! Five behavioral coefficients drive the automaton: diffusion, breed,
//! spread, slope resistance and road gravity. Each lives in `[1, 100]`.
//! The driver keeps two flavors per tuple: `saved` (the tuple under
//! evaluation) and `current` (mutated by self-modification as years pass,
//! reset from `saved` at the start of every Monte Carlo realization).
//! Sweep ranges are integer start/stop/step triples plus the best-fit
//! values used in prediction.

use serde::{Deserialize, Serialize};

/// Lower clamp for every coefficient. Zero-valued inputs pin here.
pub const COEFF_MIN: f64 = 1.0;
/// Upper clamp for every coefficient.
pub const COEFF_MAX: f64 = 100.0;

/// The five behavioral coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub diffusion: f64,
    pub breed: f64,
    pub spread: f64,
    pub slope_resistance: f64,
    pub road_gravity: f64,
}

impl Coefficients {
    pub fn new(
        diffusion: f64,
        breed: f64,
        spread: f64,
        slope_resistance: f64,
        road_gravity: f64,
    ) -> Coefficients {
        Coefficients {
            diffusion,
            breed,
            spread,
            slope_resistance,
            road_gravity,
        }
    }

    /// All five values clamped into `[COEFF_MIN, COEFF_MAX]`.
    pub fn sanitized(self) -> Coefficients {
        fn clamp(v: f64) -> f64 {
            v.clamp(COEFF_MIN, COEFF_MAX)
        }
        Coefficients {
            diffusion: clamp(self.diffusion),
            breed: clamp(self.breed),
            spread: clamp(self.spread),
            slope_resistance: clamp(self.slope_resistance),
            road_gravity: clamp(self.road_gravity),
        }
    }
}

/// Integer sweep range for one coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoeffRange {
    pub start: u32,
    pub stop: u32,
    pub step: u32,
    pub best_fit: u32,
}

impl CoeffRange {
    /// Values visited by the calibration sweep: start, start+step, ...
    /// up to and including stop.
    pub fn values(&self) -> Vec<u32> {
        let step = self.step.max(1);
        let mut out = Vec::new();
        let mut v = self.start;
        while v <= self.stop {
            out.push(v);
            v += step;
        }
        out
    }
}

/// Sweep ranges for all five coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoeffSweep {
    pub diffusion: CoeffRange,
    pub breed: CoeffRange,
    pub spread: CoeffRange,
    pub slope_resistance: CoeffRange,
    pub road_gravity: CoeffRange,
}

impl CoeffSweep {
    /// Number of tuples in the 5-D cartesian product.
    pub fn total_tuples(&self) -> usize {
        self.diffusion.values().len()
            * self.breed.values().len()
            * self.spread.values().len()
            * self.slope_resistance.values().len()
            * self.road_gravity.values().len()
    }

    /// Every sweep tuple, in the canonical nesting order (diffusion
    /// outermost, road gravity innermost).
    pub fn tuples(&self) -> Vec<Coefficients> {
        let mut out = Vec::with_capacity(self.total_tuples());
        for d in self.diffusion.values() {
            for b in self.breed.values() {
                for s in self.spread.values() {
                    for sr in self.slope_resistance.values() {
                        for rg in self.road_gravity.values() {
                            out.push(Coefficients::new(
                                d as f64, b as f64, s as f64, sr as f64, rg as f64,
                            ));
                        }
                    }
                }
            }
        }
        out
    }

    /// The prediction-mode best-fit tuple.
    pub fn best_fit(&self) -> Coefficients {
        Coefficients::new(
            self.diffusion.best_fit as f64,
            self.breed.best_fit as f64,
            self.spread.best_fit as f64,
            self.slope_resistance.best_fit as f64,
            self.road_gravity.best_fit as f64,
        )
    }
}

/// Knobs of the self-modification rule, taken from the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfModParams {
    /// Multiplier applied in boom years, > 1.
    pub boom: f64,
    /// Multiplier applied in bust years, < 1.
    pub bust: f64,
    /// Growth rate below which a bust is declared.
    pub critical_low: f64,
    /// Growth rate above which a boom is declared.
    pub critical_high: f64,
    pub slope_sensitivity: f64,
    pub road_grav_sensitivity: f64,
}

/// `saved` + `current` coefficient flavors for one sweep tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoeffState {
    pub saved: Coefficients,
    pub current: Coefficients,
}

impl CoeffState {
    pub fn for_tuple(tuple: Coefficients) -> CoeffState {
        let saved = tuple.sanitized();
        CoeffState {
            saved,
            current: saved,
        }
    }

    /// Restore `current` from `saved` at the start of a Monte Carlo
    /// realization.
    pub fn reset_current(&mut self) {
        self.current = self.saved;
    }

    /// End-of-year self-modification. Boom years (growth rate above
    /// `critical_high`) relax slope resistance, strengthen road gravity
    /// and, while diffusion has headroom, multiply the three spread
    /// coefficients by `boom`. Bust years mirror this with `bust`. A year
    /// inside the critical band leaves `current` untouched.
    pub fn self_modify(&mut self, growth_rate: f64, percent_urban: f64, params: &SelfModParams) {
        let c = &mut self.current;

        if growth_rate > params.critical_high {
            c.slope_resistance =
                (c.slope_resistance - percent_urban * params.slope_sensitivity).max(COEFF_MIN);
            c.road_gravity =
                (c.road_gravity + percent_urban * params.road_grav_sensitivity).min(COEFF_MAX);
            if c.diffusion < COEFF_MAX {
                c.diffusion = (c.diffusion * params.boom).min(COEFF_MAX);
                c.breed = (c.breed * params.boom).min(COEFF_MAX);
                c.spread = (c.spread * params.boom).min(COEFF_MAX);
            }
        }

        if growth_rate < params.critical_low {
            c.slope_resistance =
                (c.slope_resistance + percent_urban * params.slope_sensitivity).min(COEFF_MAX);
            c.road_gravity =
                (c.road_gravity - percent_urban * params.road_grav_sensitivity).max(COEFF_MIN);
            if c.diffusion > 0.0 {
                c.diffusion = (c.diffusion * params.bust).max(COEFF_MIN);
                c.spread = (c.spread * params.bust).max(COEFF_MIN);
                c.breed = (c.breed * params.bust).max(COEFF_MIN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SelfModParams {
        SelfModParams {
            boom: 1.01,
            bust: 0.09,
            critical_low: 0.97,
            critical_high: 1.3,
            slope_sensitivity: 0.1,
            road_grav_sensitivity: 0.01,
        }
    }

    #[test]
    fn sanitize_pins_zero_to_one() {
        let c = Coefficients::new(0.0, 50.0, 120.0, 1.0, 100.0).sanitized();
        assert_eq!(c.diffusion, 1.0);
        assert_eq!(c.spread, 100.0);
        assert_eq!(c.breed, 50.0);
    }

    #[test]
    fn range_values_include_stop() {
        let r = CoeffRange {
            start: 0,
            stop: 100,
            step: 50,
            best_fit: 0,
        };
        assert_eq!(r.values(), vec![0, 50, 100]);
    }

    #[test]
    fn sweep_order_is_road_gravity_innermost() {
        let mut sweep = CoeffSweep::default();
        sweep.diffusion = CoeffRange {
            start: 1,
            stop: 2,
            step: 1,
            best_fit: 0,
        };
        sweep.road_gravity = CoeffRange {
            start: 1,
            stop: 2,
            step: 1,
            best_fit: 0,
        };
        let tuples = sweep.tuples();
        assert_eq!(tuples.len(), 4);
        assert_eq!(
            (tuples[0].diffusion, tuples[0].road_gravity),
            (1.0, 1.0)
        );
        assert_eq!(
            (tuples[1].diffusion, tuples[1].road_gravity),
            (1.0, 2.0)
        );
        assert_eq!(
            (tuples[2].diffusion, tuples[2].road_gravity),
            (2.0, 1.0)
        );
    }

    #[test]
    fn self_mod_is_idempotent_in_band() {
        let mut state = CoeffState::for_tuple(Coefficients::new(20.0, 30.0, 40.0, 50.0, 60.0));
        let before = state.current;
        state.self_modify(1.0, 25.0, &params());
        assert_eq!(state.current, before);
    }

    #[test]
    fn boom_multiplies_and_clamps() {
        let mut state = CoeffState::for_tuple(Coefficients::new(99.9, 50.0, 100.0, 50.0, 50.0));
        state.self_modify(2.0, 10.0, &params());
        assert_eq!(state.current.spread, 100.0);
        assert!(state.current.breed > 50.0);
        assert!(state.current.slope_resistance < 50.0);
        assert!(state.current.road_gravity > 50.0);
    }

    #[test]
    fn boom_skips_multipliers_at_full_diffusion() {
        let mut state = CoeffState::for_tuple(Coefficients::new(100.0, 50.0, 50.0, 50.0, 50.0));
        state.self_modify(2.0, 10.0, &params());
        assert_eq!(state.current.breed, 50.0);
        assert_eq!(state.current.spread, 50.0);
        // the additive adjustments still apply
        assert!(state.current.slope_resistance < 50.0);
    }

    #[test]
    fn bust_floors_at_one() {
        let mut state = CoeffState::for_tuple(Coefficients::new(2.0, 2.0, 2.0, 50.0, 50.0));
        state.self_modify(0.1, 10.0, &params());
        assert_eq!(state.current.diffusion, 1.0);
        assert_eq!(state.current.breed, 1.0);
        assert_eq!(state.current.spread, 1.0);
        assert!(state.current.slope_resistance > 50.0);
        assert!(state.current.road_gravity < 50.0);
    }

    #[test]
    fn reset_restores_saved() {
        let mut state = CoeffState::for_tuple(Coefficients::new(10.0, 10.0, 10.0, 10.0, 10.0));
        state.self_modify(2.0, 10.0, &params());
        assert_ne!(state.current, state.saved);
        state.reset_current();
        assert_eq!(state.current, state.saved);
    }
}
