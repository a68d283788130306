//! Built-in periodic table
//!
//! Element metadata (mass, radii, atomic number) used to fill in atom
//! defaults and to drive bond guessing. Values can be overridden per atomic
//! type through the configuration files.

/// Metadata for one chemical element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    /// Atomic symbol (e.g. "Fe")
    pub symbol: &'static str,
    /// Full element name (e.g. "Iron")
    pub name: &'static str,
    /// Atomic number
    pub number: u64,
    /// Atomic mass (in atomic mass units)
    pub mass: f64,
    /// Covalent radius (in Angstroms)
    pub covalent_radius: f64,
    /// Van der Waals radius (in Angstroms)
    pub vdw_radius: f64,
}

macro_rules! element {
    ($symbol: literal, $name: literal, $number: literal, $mass: literal, $covalent: literal, $vdw: literal) => {
        ElementData {
            symbol: $symbol,
            name: $name,
            number: $number,
            mass: $mass,
            covalent_radius: $covalent,
            vdw_radius: $vdw,
        }
    };
}

static PERIODIC_TABLE: &[ElementData] = &[
    element!("H", "Hydrogen", 1, 1.008, 0.31, 1.20),
    element!("He", "Helium", 2, 4.003, 0.28, 1.40),
    element!("Li", "Lithium", 3, 6.941, 1.28, 1.82),
    element!("Be", "Beryllium", 4, 9.012, 0.96, 1.53),
    element!("B", "Boron", 5, 10.811, 0.84, 1.92),
    element!("C", "Carbon", 6, 12.011, 0.76, 1.70),
    element!("N", "Nitrogen", 7, 14.007, 0.71, 1.55),
    element!("O", "Oxygen", 8, 15.999, 0.66, 1.52),
    element!("F", "Fluorine", 9, 18.998, 0.57, 1.47),
    element!("Ne", "Neon", 10, 20.180, 0.58, 1.54),
    element!("Na", "Sodium", 11, 22.990, 1.66, 2.27),
    element!("Mg", "Magnesium", 12, 24.305, 1.41, 1.73),
    element!("Al", "Aluminium", 13, 26.982, 1.21, 1.84),
    element!("Si", "Silicon", 14, 28.086, 1.11, 2.10),
    element!("P", "Phosphorus", 15, 30.974, 1.07, 1.80),
    element!("S", "Sulfur", 16, 32.065, 1.05, 1.80),
    element!("Cl", "Chlorine", 17, 35.453, 1.02, 1.75),
    element!("Ar", "Argon", 18, 39.948, 1.06, 1.88),
    element!("K", "Potassium", 19, 39.098, 2.03, 2.75),
    element!("Ca", "Calcium", 20, 40.078, 1.76, 2.31),
    element!("Sc", "Scandium", 21, 44.956, 1.70, 2.15),
    element!("Ti", "Titanium", 22, 47.867, 1.60, 2.11),
    element!("V", "Vanadium", 23, 50.942, 1.53, 2.07),
    element!("Cr", "Chromium", 24, 51.996, 1.39, 2.06),
    element!("Mn", "Manganese", 25, 54.938, 1.39, 2.05),
    element!("Fe", "Iron", 26, 55.845, 1.32, 2.04),
    element!("Co", "Cobalt", 27, 58.933, 1.26, 2.00),
    element!("Ni", "Nickel", 28, 58.693, 1.24, 1.97),
    element!("Cu", "Copper", 29, 63.546, 1.32, 1.96),
    element!("Zn", "Zinc", 30, 65.409, 1.22, 2.01),
    element!("Ga", "Gallium", 31, 69.723, 1.22, 1.87),
    element!("Ge", "Germanium", 32, 72.64, 1.20, 2.11),
    element!("As", "Arsenic", 33, 74.922, 1.19, 1.85),
    element!("Se", "Selenium", 34, 78.96, 1.20, 1.90),
    element!("Br", "Bromine", 35, 79.904, 1.20, 1.85),
    element!("Kr", "Krypton", 36, 83.798, 1.16, 2.02),
    element!("Rb", "Rubidium", 37, 85.468, 2.20, 3.03),
    element!("Sr", "Strontium", 38, 87.62, 1.95, 2.49),
    element!("Y", "Yttrium", 39, 88.906, 1.90, 2.32),
    element!("Zr", "Zirconium", 40, 91.224, 1.75, 2.23),
    element!("Nb", "Niobium", 41, 92.906, 1.64, 2.18),
    element!("Mo", "Molybdenum", 42, 95.94, 1.54, 2.17),
    element!("Tc", "Technetium", 43, 98.0, 1.47, 2.16),
    element!("Ru", "Ruthenium", 44, 101.07, 1.46, 2.13),
    element!("Rh", "Rhodium", 45, 102.91, 1.42, 2.10),
    element!("Pd", "Palladium", 46, 106.42, 1.39, 2.10),
    element!("Ag", "Silver", 47, 107.87, 1.45, 2.11),
    element!("Cd", "Cadmium", 48, 112.41, 1.44, 2.18),
    element!("In", "Indium", 49, 114.82, 1.42, 2.20),
    element!("Sn", "Tin", 50, 118.71, 1.39, 2.17),
    element!("Sb", "Antimony", 51, 121.76, 1.39, 2.06),
    element!("Te", "Tellurium", 52, 127.60, 1.38, 2.06),
    element!("I", "Iodine", 53, 126.90, 1.39, 1.98),
    element!("Xe", "Xenon", 54, 131.29, 1.40, 2.16),
    element!("Cs", "Caesium", 55, 132.91, 2.44, 3.43),
    element!("Ba", "Barium", 56, 137.33, 2.15, 2.68),
    element!("La", "Lanthanum", 57, 138.91, 2.07, 2.50),
    element!("W", "Tungsten", 74, 183.84, 1.62, 2.10),
    element!("Re", "Rhenium", 75, 186.21, 1.51, 2.05),
    element!("Os", "Osmium", 76, 190.23, 1.44, 2.03),
    element!("Ir", "Iridium", 77, 192.22, 1.41, 2.03),
    element!("Pt", "Platinum", 78, 195.08, 1.36, 1.75),
    element!("Au", "Gold", 79, 196.97, 1.36, 1.66),
    element!("Hg", "Mercury", 80, 200.59, 1.32, 1.55),
    element!("Tl", "Thallium", 81, 204.38, 1.45, 1.96),
    element!("Pb", "Lead", 82, 207.2, 1.46, 2.02),
    element!("Bi", "Bismuth", 83, 208.98, 1.48, 2.07),
    element!("Th", "Thorium", 90, 232.04, 2.06, 2.45),
    element!("Pa", "Protactinium", 91, 231.04, 2.00, 2.43),
    element!("U", "Uranium", 92, 238.03, 1.96, 1.86),
];

/// Look up element metadata from an atomic symbol.
///
/// Lookup is case-normalising, so "FE", "fe" and "Fe" all resolve to iron.
/// Returns `None` for strings that are not an element symbol.
pub fn element_data(symbol: &str) -> Option<&'static ElementData> {
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol.len() > 2 {
        return None;
    }

    let mut normalized = String::with_capacity(2);
    let mut chars = symbol.chars();
    if let Some(first) = chars.next() {
        normalized.extend(first.to_uppercase());
    }
    for c in chars {
        normalized.extend(c.to_lowercase());
    }

    PERIODIC_TABLE.iter().find(|e| e.symbol == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_symbol() {
        assert_eq!(element_data("C").unwrap().number, 6);
        assert_eq!(element_data("Fe").unwrap().name, "Iron");
        assert_eq!(element_data("FE").unwrap().name, "Iron");
        assert_eq!(element_data("fe").unwrap().name, "Iron");
        assert_eq!(element_data(" O ").unwrap().number, 8);

        assert!(element_data("Xx").is_none());
        assert!(element_data("").is_none());
        assert!(element_data("CA1").is_none());
    }

    #[test]
    fn test_masses() {
        assert!((element_data("H").unwrap().mass - 1.008).abs() < 0.01);
        assert!((element_data("C").unwrap().mass - 12.011).abs() < 0.01);
    }

    #[test]
    fn test_radii() {
        let oxygen = element_data("O").unwrap();
        assert_eq!(oxygen.covalent_radius, 0.66);
        assert_eq!(oxygen.vdw_radius, 1.52);
    }
}
