//! Topology: atoms, bonds, residues, and derived connectivity
//!
//! Bonds are stored as a sorted set of index pairs. Angles, dihedrals and
//! impropers are derived from the bonds, cached, and rebuilt lazily after
//! any mutation of the atoms or bonds.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::core::atom::Atom;
use crate::core::residue::Residue;
use crate::error::{Error, Result};

/// Bond order classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    /// Unspecified bond order
    Unknown,
    /// Single bond
    Single,
    /// Double bond
    Double,
    /// Triple bond
    Triple,
    /// Quadruple bond, mainly in metals
    Quadruple,
    /// Amide bond
    Amide,
    /// Aromatic bond
    Aromatic,
}

impl Default for BondOrder {
    fn default() -> Self {
        BondOrder::Unknown
    }
}

/// Atoms, bonds, residues, and connectivity derived from the bonds
#[derive(Debug, Clone, Default)]
pub struct Topology {
    atoms: Vec<Atom>,
    /// sorted set of {i, j} pairs with i < j
    bonds: Vec<[usize; 2]>,
    /// aligned with `bonds`
    bond_orders: Vec<BondOrder>,
    /// aligned with `bonds`
    bond_types: Vec<String>,
    residues: Vec<Residue>,
    /// atom index to residue index, at most one residue per atom
    residue_of_atom: FxHashMap<usize, usize>,
    angles: Vec<[usize; 3]>,
    dihedrals: Vec<[usize; 4]>,
    impropers: Vec<[usize; 4]>,
    connectivity_outdated: bool,
}

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Topology::default()
    }

    /// Number of atoms
    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    /// Check whether this topology contains no atoms
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// All atoms, in order
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Mutable access to all atoms
    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    /// The atom at `index`
    pub fn atom(&self, index: usize) -> Result<&Atom> {
        self.atoms
            .get(index)
            .ok_or_else(|| self.out_of_bounds(index))
    }

    /// Mutable access to the atom at `index`
    pub fn atom_mut(&mut self, index: usize) -> Result<&mut Atom> {
        if index >= self.atoms.len() {
            return Err(self.out_of_bounds(index));
        }
        Ok(&mut self.atoms[index])
    }

    fn out_of_bounds(&self, index: usize) -> Error {
        Error::OutOfBounds(format!(
            "atom index {} is out of bounds for a topology with {} atoms",
            index,
            self.atoms.len()
        ))
    }

    /// Add an atom at the end of this topology
    pub fn add_atom(&mut self, atom: Atom) {
        self.atoms.push(atom);
        self.connectivity_outdated = true;
    }

    /// Resize this topology to contain `size` atoms.
    ///
    /// Growing pads with default atoms. Truncating removes every bond
    /// containing a dropped atom and removes dropped atoms from residues.
    pub fn resize(&mut self, size: usize) {
        if size < self.atoms.len() {
            self.remove_bonds_where(|bond| bond[0] >= size || bond[1] >= size);
            for residue in &mut self.residues {
                residue.retain_below(size);
            }
            self.residue_of_atom.retain(|&atom, _| atom < size);
        }

        self.atoms.resize_with(size, Atom::default);
        self.connectivity_outdated = true;
    }

    /// Remove the atom at `index`.
    ///
    /// Every bond containing the atom is removed, and all indices bigger
    /// than `index` are shifted down by one in bonds and residues.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        if index >= self.atoms.len() {
            return Err(self.out_of_bounds(index));
        }

        self.atoms.remove(index);
        self.remove_bonds_where(|bond| bond[0] == index || bond[1] == index);
        for bond in &mut self.bonds {
            if bond[0] > index {
                bond[0] -= 1;
            }
            if bond[1] > index {
                bond[1] -= 1;
            }
        }

        for residue in &mut self.residues {
            residue.remove_and_shift(index);
        }
        self.rebuild_residue_map();

        self.connectivity_outdated = true;
        Ok(())
    }

    fn remove_bonds_where(&mut self, predicate: impl Fn(&[usize; 2]) -> bool) {
        let mut i = 0;
        while i < self.bonds.len() {
            if predicate(&self.bonds[i]) {
                self.bonds.remove(i);
                self.bond_orders.remove(i);
                self.bond_types.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn rebuild_residue_map(&mut self) {
        self.residue_of_atom.clear();
        for (residue_i, residue) in self.residues.iter().enumerate() {
            for &atom in residue.atoms() {
                self.residue_of_atom.insert(atom, residue_i);
            }
        }
    }

    /// Add a bond between atoms `i` and `j`, with unknown order
    pub fn add_bond(&mut self, i: usize, j: usize) -> Result<()> {
        self.add_bond_with(i, j, BondOrder::Unknown, "")
    }

    /// Add a bond between atoms `i` and `j` with the given order and type.
    ///
    /// If the bond already exists, only the order and type are updated.
    pub fn add_bond_with(&mut self, i: usize, j: usize, order: BondOrder, bond_type: &str) -> Result<()> {
        if i == j {
            return Err(Error::Generic(format!(
                "can not add a bond between the atom {} and itself",
                i
            )));
        }
        if i >= self.atoms.len() || j >= self.atoms.len() {
            return Err(self.out_of_bounds(std::cmp::max(i, j)));
        }

        let bond = [std::cmp::min(i, j), std::cmp::max(i, j)];
        match self.bonds.binary_search(&bond) {
            Ok(position) => {
                self.bond_orders[position] = order;
                self.bond_types[position] = bond_type.into();
            }
            Err(position) => {
                self.bonds.insert(position, bond);
                self.bond_orders.insert(position, order);
                self.bond_types.insert(position, bond_type.into());
                self.connectivity_outdated = true;
            }
        }
        Ok(())
    }

    /// Remove the bond between atoms `i` and `j`. Removing a missing bond
    /// is a no-op.
    pub fn remove_bond(&mut self, i: usize, j: usize) {
        let bond = [std::cmp::min(i, j), std::cmp::max(i, j)];
        if let Ok(position) = self.bonds.binary_search(&bond) {
            self.bonds.remove(position);
            self.bond_orders.remove(position);
            self.bond_types.remove(position);
        }
        self.connectivity_outdated = true;
    }

    /// Remove all bonds
    pub fn clear_bonds(&mut self) {
        self.bonds.clear();
        self.bond_orders.clear();
        self.bond_types.clear();
        self.connectivity_outdated = true;
    }

    /// All bonds, as sorted `[i, j]` pairs with `i < j`
    pub fn bonds(&self) -> &[[usize; 2]] {
        &self.bonds
    }

    /// Bond orders, aligned with [`Topology::bonds`]
    pub fn bond_orders(&self) -> &[BondOrder] {
        &self.bond_orders
    }

    /// Order of the bond between atoms `i` and `j`
    pub fn bond_order(&self, i: usize, j: usize) -> Result<BondOrder> {
        let bond = [std::cmp::min(i, j), std::cmp::max(i, j)];
        match self.bonds.binary_search(&bond) {
            Ok(position) => Ok(self.bond_orders[position]),
            Err(_) => Err(Error::OutOfBounds(format!(
                "there is no bond between atoms {} and {}",
                i, j
            ))),
        }
    }

    /// Type of the bond between atoms `i` and `j`
    pub fn bond_type(&self, i: usize, j: usize) -> Result<&str> {
        let bond = [std::cmp::min(i, j), std::cmp::max(i, j)];
        match self.bonds.binary_search(&bond) {
            Ok(position) => Ok(&self.bond_types[position]),
            Err(_) => Err(Error::OutOfBounds(format!(
                "there is no bond between atoms {} and {}",
                i, j
            ))),
        }
    }

    /// Add a residue to this topology.
    ///
    /// Fails if any atom of the residue is already part of another residue,
    /// or if the residue id is already used in this topology.
    pub fn add_residue(&mut self, residue: Residue) -> Result<()> {
        if let Some(id) = residue.id() {
            if self.residues.iter().any(|existing| existing.id() == Some(id)) {
                return Err(Error::Generic(format!(
                    "can not add a residue with id {}: it is already used in this topology",
                    id
                )));
            }
        }

        for &atom in residue.atoms() {
            if self.residue_of_atom.contains_key(&atom) {
                return Err(Error::Generic(format!(
                    "can not add this residue: atom {} is already in another residue",
                    atom
                )));
            }
        }

        let residue_i = self.residues.len();
        for &atom in residue.atoms() {
            self.residue_of_atom.insert(atom, residue_i);
        }
        self.residues.push(residue);
        Ok(())
    }

    /// All residues, in insertion order
    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    /// The residue at `index`
    pub fn residue(&self, index: usize) -> Result<&Residue> {
        self.residues.get(index).ok_or_else(|| {
            Error::OutOfBounds(format!(
                "residue index {} is out of bounds for a topology with {} residues",
                index,
                self.residues.len()
            ))
        })
    }

    /// The residue containing the atom at `index`, if any
    pub fn residue_for_atom(&self, index: usize) -> Option<&Residue> {
        self.residue_of_atom.get(&index).map(|&i| &self.residues[i])
    }

    /// Check whether two residues are linked, i.e. a bond exists with one
    /// endpoint in each. A residue is always linked to itself.
    pub fn are_linked(&self, first: &Residue, second: &Residue) -> bool {
        if first == second {
            return true;
        }

        self.bonds.iter().any(|bond| {
            (first.contains(bond[0]) && second.contains(bond[1]))
                || (first.contains(bond[1]) && second.contains(bond[0]))
        })
    }

    /// All angles derived from the bonds, as canonical `(i, j, k)` triplets
    /// with `i < k` and `j` the vertex
    pub fn angles(&mut self) -> &[[usize; 3]] {
        self.rebuild_connectivity();
        &self.angles
    }

    /// All dihedral angles derived from the bonds, as canonical
    /// `(i, j, k, l)` quadruplets with `i < l`
    pub fn dihedrals(&mut self) -> &[[usize; 4]] {
        self.rebuild_connectivity();
        &self.dihedrals
    }

    /// All improper dihedral angles derived from the bonds, with the
    /// central atom in second position
    pub fn impropers(&mut self) -> &[[usize; 4]] {
        self.rebuild_connectivity();
        &self.impropers
    }

    fn rebuild_connectivity(&mut self) {
        if !self.connectivity_outdated {
            return;
        }

        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adjacency[bond[0]].push(bond[1]);
            adjacency[bond[1]].push(bond[0]);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }

        let mut angles = BTreeSet::new();
        for (j, neighbors) in adjacency.iter().enumerate() {
            for (n, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[n + 1..] {
                    angles.insert([std::cmp::min(i, k), j, std::cmp::max(i, k)]);
                }
            }
        }

        let mut dihedrals = BTreeSet::new();
        for bond in &self.bonds {
            let (j, k) = (bond[0], bond[1]);
            for &i in &adjacency[j] {
                if i == j || i == k {
                    continue;
                }
                for &l in &adjacency[k] {
                    if l == i || l == j || l == k {
                        continue;
                    }
                    if i < l {
                        dihedrals.insert([i, j, k, l]);
                    } else {
                        dihedrals.insert([l, k, j, i]);
                    }
                }
            }
        }

        let mut impropers = BTreeSet::new();
        for (center, neighbors) in adjacency.iter().enumerate() {
            if neighbors.len() < 3 {
                continue;
            }
            for (n, &i) in neighbors.iter().enumerate() {
                for (m, &j) in neighbors.iter().enumerate().skip(n + 1) {
                    for &k in &neighbors[m + 1..] {
                        impropers.insert([i, center, j, k]);
                    }
                }
            }
        }

        self.angles = angles.into_iter().collect();
        self.dihedrals = dihedrals.into_iter().collect();
        self.impropers = impropers.into_iter().collect();
        self.connectivity_outdated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology_with_atoms(count: usize) -> Topology {
        let mut topology = Topology::new();
        for _ in 0..count {
            topology.add_atom(Atom::new("C"));
        }
        topology
    }

    #[test]
    fn test_add_and_remove_bonds() {
        let mut topology = topology_with_atoms(4);
        topology.add_bond(2, 1).unwrap();
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(0, 1).unwrap();

        assert_eq!(topology.bonds(), [[0, 1], [1, 2]]);

        topology.remove_bond(1, 0);
        assert_eq!(topology.bonds(), [[1, 2]]);
        // removing a missing bond is fine
        topology.remove_bond(0, 3);
        assert_eq!(topology.bonds(), [[1, 2]]);

        topology.clear_bonds();
        assert!(topology.bonds().is_empty());
    }

    #[test]
    fn test_invalid_bonds() {
        let mut topology = topology_with_atoms(3);
        assert!(topology.add_bond(1, 1).is_err());
        assert!(topology.add_bond(0, 12).is_err());
    }

    #[test]
    fn test_bond_orders() {
        let mut topology = topology_with_atoms(3);
        topology.add_bond_with(0, 1, BondOrder::Double, "amide").unwrap();
        topology.add_bond(1, 2).unwrap();

        assert_eq!(topology.bond_order(1, 0).unwrap(), BondOrder::Double);
        assert_eq!(topology.bond_type(0, 1).unwrap(), "amide");
        assert_eq!(topology.bond_order(1, 2).unwrap(), BondOrder::Unknown);
        assert!(topology.bond_order(0, 2).is_err());

        // adding an existing bond only updates order and type
        topology.add_bond_with(0, 1, BondOrder::Single, "").unwrap();
        assert_eq!(topology.bonds().len(), 2);
        assert_eq!(topology.bond_order(0, 1).unwrap(), BondOrder::Single);
    }

    #[test]
    fn test_angles() {
        let mut topology = topology_with_atoms(5);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(1, 2).unwrap();
        topology.add_bond(2, 3).unwrap();
        topology.add_bond(2, 4).unwrap();

        assert_eq!(topology.angles(), [[0, 1, 2], [1, 2, 3], [1, 2, 4], [3, 2, 4]]);
    }

    #[test]
    fn test_dihedrals() {
        let mut topology = topology_with_atoms(5);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(1, 2).unwrap();
        topology.add_bond(2, 3).unwrap();
        topology.add_bond(3, 4).unwrap();

        assert_eq!(topology.dihedrals(), [[0, 1, 2, 3], [1, 2, 3, 4]]);
    }

    #[test]
    fn test_impropers() {
        let mut topology = topology_with_atoms(5);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(1, 2).unwrap();
        topology.add_bond(1, 3).unwrap();

        // atom 1 is the only atom with three neighbors
        assert_eq!(topology.impropers(), [[0, 1, 2, 3]]);

        topology.add_bond(1, 4).unwrap();
        assert_eq!(
            topology.impropers(),
            [[0, 1, 2, 3], [0, 1, 2, 4], [0, 1, 3, 4], [2, 1, 3, 4]]
        );
    }

    #[test]
    fn test_connectivity_invalidation() {
        let mut topology = topology_with_atoms(3);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(1, 2).unwrap();
        assert_eq!(topology.angles().len(), 1);

        topology.remove_bond(1, 2);
        assert_eq!(topology.angles().len(), 0);
    }

    #[test]
    fn test_remove_atom() {
        let mut topology = topology_with_atoms(4);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(1, 2).unwrap();
        topology.add_bond(2, 3).unwrap();

        topology.remove(1).unwrap();
        assert_eq!(topology.size(), 3);
        assert_eq!(topology.bonds(), [[1, 2]]);
    }

    #[test]
    fn test_resize() {
        let mut topology = topology_with_atoms(4);
        topology.add_bond(0, 1).unwrap();
        topology.add_bond(2, 3).unwrap();

        topology.resize(6);
        assert_eq!(topology.size(), 6);
        assert_eq!(topology.bonds().len(), 2);

        topology.resize(3);
        assert_eq!(topology.size(), 3);
        assert_eq!(topology.bonds(), [[0, 1]]);
    }

    #[test]
    fn test_residues() {
        let mut topology = topology_with_atoms(6);

        let mut first = Residue::with_id("ALA", 1);
        first.add_atom(0);
        first.add_atom(1);
        topology.add_residue(first).unwrap();

        let mut second = Residue::with_id("GLY", 2);
        second.add_atom(2);
        second.add_atom(3);
        topology.add_residue(second).unwrap();

        assert_eq!(topology.residues().len(), 2);
        assert_eq!(topology.residue_for_atom(1).unwrap().name(), "ALA");
        assert!(topology.residue_for_atom(5).is_none());

        // duplicated atom
        let mut bad = Residue::new("HOH");
        bad.add_atom(0);
        assert!(topology.add_residue(bad).is_err());

        // duplicated id
        let bad = Residue::with_id("HOH", 2);
        assert!(topology.add_residue(bad).is_err());
    }

    #[test]
    fn test_are_linked() {
        let mut topology = topology_with_atoms(4);
        topology.add_bond(1, 2).unwrap();

        let mut first = Residue::new("A");
        first.add_atom(0);
        first.add_atom(1);
        let mut second = Residue::new("B");
        second.add_atom(2);
        second.add_atom(3);

        topology.add_residue(first.clone()).unwrap();
        topology.add_residue(second.clone()).unwrap();

        assert!(topology.are_linked(&first, &second));
        assert!(topology.are_linked(&first, &first));

        let lone = Residue::new("C");
        assert!(!topology.are_linked(&first, &lone));
    }
}
