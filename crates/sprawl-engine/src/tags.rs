//! Growth-phase tags.
//!
//! The urban grid `z` and the per-year `delta` grid record *how* each
//! pixel became urban. The logic tests tags symbolically; the numeric
//! cell codes exist only because the grids are written out as images and
//! the historical code assignment is part of that surface.

use sprawl_core::Cell;

/// Origin of an urban pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthTag {
    /// Seeded from the initial urban layer.
    Seed,
    /// Phase 1, spontaneous growth.
    Spontaneous,
    /// Phase 3, new spreading center.
    SpreadingCenter,
    /// Phase 4, organic edge growth.
    Organic,
    /// Phase 5, road-influenced growth.
    Road,
}

impl GrowthTag {
    /// Cell code written into grids. Code 5 is unassigned for
    /// compatibility with the historical image palette.
    #[inline]
    pub const fn cell(self) -> Cell {
        match self {
            GrowthTag::Seed => 3,
            GrowthTag::Spontaneous => 4,
            GrowthTag::SpreadingCenter => 6,
            GrowthTag::Organic => 7,
            GrowthTag::Road => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_ordered() {
        let codes = [
            GrowthTag::Seed.cell(),
            GrowthTag::Spontaneous.cell(),
            GrowthTag::SpreadingCenter.cell(),
            GrowthTag::Organic.cell(),
            GrowthTag::Road.cell(),
        ];
        let mut sorted = codes;
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
        assert_eq!(codes.len(), 5);
        assert_eq!(GrowthTag::Seed.cell(), 3);
        assert_eq!(GrowthTag::Road.cell(), 8);
    }
}
