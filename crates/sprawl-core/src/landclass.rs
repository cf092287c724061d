//! Land-cover class table.
//!
//! Scenario files declare an ordered list of land classes, each with a
//! grayscale pixel value, a short id, a display name and an RGB color.
//! Three ids are structural: `URB` (the urban sentinel written over the
//! land grid wherever the automaton urbanizes), `EXC` (excluded) and
//! `UNC` (unclassified). Every other class is eligible for deltatron
//! transitions and belongs to the reduced-class set.

use crate::error::{SprawlError, SprawlResult};
use crate::grid::Cell;
use serde::{Deserialize, Serialize};

/// RGB triple from the scenario file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    /// Packed `0xRRGGBB` form used in scenario echoes.
    pub fn packed(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// One land-cover class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandClass {
    /// Grayscale pixel value in the land-cover rasters.
    pub value: Cell,
    /// Short id; `URB`, `EXC` and `UNC` are structural.
    pub id: String,
    pub name: String,
    pub color: Rgb,
}

impl LandClass {
    pub fn new(value: Cell, id: &str, name: &str, color: Rgb) -> LandClass {
        LandClass {
            value,
            id: id.to_string(),
            name: name.to_string(),
            color,
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.id == "EXC"
    }

    /// Eligible for deltatron transitions.
    pub fn is_transitional(&self) -> bool {
        !matches!(self.id.as_str(), "URB" | "EXC" | "UNC")
    }
}

/// Validated class table with the derived lookup collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassTable {
    classes: Vec<LandClass>,
    /// Ordinals (into `classes`) of the reduced, transition-eligible set.
    reduced: Vec<usize>,
    /// 256-entry map from grayscale value to class ordinal.
    new_indices: Vec<usize>,
    urban_code: Cell,
}

impl ClassTable {
    /// Build and validate the table: classes must be non-empty, values
    /// must fit in a byte and be unique, and exactly one class must carry
    /// the `URB` id.
    pub fn new(classes: Vec<LandClass>) -> SprawlResult<ClassTable> {
        if classes.is_empty() {
            return Err(SprawlError::Validation(
                "land-class table is empty".to_string(),
            ));
        }
        let mut new_indices = vec![0usize; 256];
        let mut seen = [false; 256];
        for (idx, class) in classes.iter().enumerate() {
            if class.value > 255 {
                return Err(SprawlError::Validation(format!(
                    "land class '{}' has grayscale value {} > 255",
                    class.id, class.value
                )));
            }
            if seen[class.value as usize] {
                return Err(SprawlError::Validation(format!(
                    "duplicate land-class grayscale value {}",
                    class.value
                )));
            }
            seen[class.value as usize] = true;
            new_indices[class.value as usize] = idx;
        }
        let urban: Vec<&LandClass> = classes.iter().filter(|c| c.id == "URB").collect();
        if urban.len() != 1 {
            return Err(SprawlError::Validation(format!(
                "expected exactly one URB land class, found {}",
                urban.len()
            )));
        }
        let urban_code = urban[0].value;
        if urban_code == 0 {
            return Err(SprawlError::Validation(
                "URB land class cannot use grayscale value 0".to_string(),
            ));
        }
        let reduced = classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_transitional())
            .map(|(i, _)| i)
            .collect();
        Ok(ClassTable {
            classes,
            reduced,
            new_indices,
            urban_code,
        })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[LandClass] {
        &self.classes
    }

    pub fn class(&self, ordinal: usize) -> &LandClass {
        &self.classes[ordinal]
    }

    /// Ordinal of the class owning grayscale value `v`. Undeclared values
    /// map to ordinal 0, as in the source data convention.
    #[inline]
    pub fn ordinal_of(&self, v: Cell) -> usize {
        self.new_indices[(v as usize).min(255)]
    }

    pub fn class_of(&self, v: Cell) -> &LandClass {
        &self.classes[self.ordinal_of(v)]
    }

    /// True when grayscale value `v` names a declared class.
    pub fn is_declared(&self, v: Cell) -> bool {
        v <= 255 && self.classes[self.new_indices[v as usize]].value == v
    }

    pub fn urban_code(&self) -> Cell {
        self.urban_code
    }

    pub fn reduced_len(&self) -> usize {
        self.reduced.len()
    }

    /// The `k`-th reduced class.
    pub fn reduced(&self, k: usize) -> &LandClass {
        &self.classes[self.reduced[k]]
    }

    /// Ordinal (into the full table) of the `k`-th reduced class.
    pub fn reduced_ordinal(&self, k: usize) -> usize {
        self.reduced[k]
    }

    pub fn is_transitional_value(&self, v: Cell) -> bool {
        self.class_of(v).is_transitional()
    }

    /// Class table rendering for the run log.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;
        let mut out = format!(
            "land classes ({} total, {} transition eligible, urban code {})\n",
            self.len(),
            self.reduced_len(),
            self.urban_code
        );
        for class in &self.classes {
            let _ = writeln!(
                out,
                "  {:3}  {:<4} {:<20} #{:06X}{}",
                class.value,
                class.id,
                class.name,
                class.color.packed(),
                if class.is_transitional() { "" } else { "  (static)" }
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassTable {
        ClassTable::new(vec![
            LandClass::new(0, "UNC", "Unclassified", Rgb::default()),
            LandClass::new(1, "URB", "Urban", Rgb::new(120, 120, 120)),
            LandClass::new(2, "AGR", "Agriculture", Rgb::new(160, 130, 40)),
            LandClass::new(3, "FOR", "Forest", Rgb::new(0, 100, 0)),
            LandClass::new(7, "EXC", "Water", Rgb::new(0, 0, 160)),
        ])
        .unwrap()
    }

    #[test]
    fn reduced_set_excludes_structural_classes() {
        let t = table();
        assert_eq!(t.reduced_len(), 2);
        assert_eq!(t.reduced(0).id, "AGR");
        assert_eq!(t.reduced(1).id, "FOR");
    }

    #[test]
    fn ordinal_map_round_trips_declared_values() {
        let t = table();
        assert_eq!(t.class_of(3).id, "FOR");
        assert_eq!(t.ordinal_of(7), 4);
        assert!(t.is_declared(7));
        assert!(!t.is_declared(9));
    }

    #[test]
    fn urban_code_is_resolved() {
        assert_eq!(table().urban_code(), 1);
    }

    #[test]
    fn missing_urban_class_is_rejected() {
        let err = ClassTable::new(vec![LandClass::new(0, "UNC", "x", Rgb::default())]);
        assert!(matches!(err, Err(SprawlError::Validation(_))));
    }

    #[test]
    fn duplicate_values_are_rejected() {
        let err = ClassTable::new(vec![
            LandClass::new(1, "URB", "a", Rgb::default()),
            LandClass::new(1, "AGR", "b", Rgb::default()),
        ]);
        assert!(matches!(err, Err(SprawlError::Validation(_))));
    }

    #[test]
    fn packed_color_layout() {
        assert_eq!(Rgb::new(0x12, 0x34, 0x56).packed(), 0x123456);
    }

    #[test]
    fn table_serializes_for_config_echo() {
        let json = serde_json::to_string(&table()).unwrap();
        assert!(json.contains("\"URB\""));
        let back: ClassTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.urban_code(), 1);
        assert_eq!(back.reduced_len(), 2);
    }
}
