//! Atom value type

use crate::config;
use crate::core::element::element_data;
use crate::core::property::PropertyMap;

/// A single atom: a name, an atomic type, a mass, a charge, and arbitrary
/// properties.
///
/// The name is free-form (e.g. "CA" for an alpha carbon or "H1" for the
/// first hydrogen); the type identifies the element or force-field type and
/// defaults to the name. The mass defaults to the periodic-table value for
/// the type, and both mass and the radii can be overridden by the
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    name: String,
    atom_type: String,
    mass: f64,
    charge: f64,
    properties: PropertyMap,
}

impl Atom {
    /// Create an atom with the given name. The type is set to the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Atom::with_type(name.clone(), name)
    }

    /// Create an atom with separate name and type
    pub fn with_type(name: impl Into<String>, atom_type: impl Into<String>) -> Self {
        let name = name.into();
        let atom_type = atom_type.into();
        let mass = config::atom_data(&atom_type)
            .and_then(|data| data.mass)
            .or_else(|| element_data(&atom_type).map(|e| e.mass))
            .unwrap_or(0.0);

        Atom {
            name,
            atom_type,
            mass,
            charge: 0.0,
            properties: PropertyMap::new(),
        }
    }

    /// Atom name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomic type
    pub fn atom_type(&self) -> &str {
        &self.atom_type
    }

    /// Mass, in atomic mass units
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Charge, in units of the electron charge
    pub fn charge(&self) -> f64 {
        self.charge
    }

    /// Set the atom name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set the atomic type
    pub fn set_type(&mut self, atom_type: impl Into<String>) {
        self.atom_type = atom_type.into();
    }

    /// Set the mass, in atomic mass units
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
    }

    /// Set the charge, in units of the electron charge
    pub fn set_charge(&mut self, charge: f64) {
        self.charge = charge;
    }

    /// Full element name for this atom's type, if the type is an element
    /// symbol or has a configured full name.
    pub fn full_name(&self) -> Option<String> {
        if let Some(data) = config::atom_data(&self.atom_type) {
            if let Some(name) = data.full_name {
                return Some(name);
            }
        }
        element_data(&self.atom_type).map(|e| e.name.to_string())
    }

    /// Van der Waals radius for this atom's type, in Angstroms
    pub fn vdw_radius(&self) -> Option<f64> {
        config::atom_data(&self.atom_type)
            .and_then(|data| data.vdw_radius)
            .or_else(|| element_data(&self.atom_type).map(|e| e.vdw_radius))
    }

    /// Covalent radius for this atom's type, in Angstroms
    pub fn covalent_radius(&self) -> Option<f64> {
        config::atom_data(&self.atom_type)
            .and_then(|data| data.covalent_radius)
            .or_else(|| element_data(&self.atom_type).map(|e| e.covalent_radius))
    }

    /// Atomic number for this atom's type, if the type is an element symbol
    pub fn atomic_number(&self) -> Option<u64> {
        element_data(&self.atom_type).map(|e| e.number)
    }

    /// Properties attached to this atom
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Mutable access to the properties attached to this atom
    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_defaults() {
        let atom = Atom::new("H");
        assert_eq!(atom.name(), "H");
        assert_eq!(atom.atom_type(), "H");
        assert!((atom.mass() - 1.008).abs() < 1e-6);
        assert_eq!(atom.charge(), 0.0);
    }

    #[test]
    fn test_unknown_type() {
        let atom = Atom::new("OW1");
        assert_eq!(atom.mass(), 0.0);
        assert_eq!(atom.full_name(), None);
        assert_eq!(atom.vdw_radius(), None);
        assert_eq!(atom.atomic_number(), None);
    }

    #[test]
    fn test_separate_name_and_type() {
        let atom = Atom::with_type("CA", "C");
        assert_eq!(atom.name(), "CA");
        assert_eq!(atom.atom_type(), "C");
        assert!((atom.mass() - 12.011).abs() < 1e-6);
        assert_eq!(atom.full_name().as_deref(), Some("Carbon"));
        assert_eq!(atom.atomic_number(), Some(6));
    }

    #[test]
    fn test_setters() {
        let mut atom = Atom::new("O");
        atom.set_name("O1");
        atom.set_type("OW");
        atom.set_mass(18.0);
        atom.set_charge(-0.8);

        assert_eq!(atom.name(), "O1");
        assert_eq!(atom.atom_type(), "OW");
        assert_eq!(atom.mass(), 18.0);
        assert_eq!(atom.charge(), -0.8);
    }

    #[test]
    fn test_atom_properties() {
        let mut atom = Atom::new("C");
        atom.properties_mut().set("occupancy", 0.5);
        assert_eq!(atom.properties().get("occupancy").unwrap().as_double(), Some(0.5));
    }
}
