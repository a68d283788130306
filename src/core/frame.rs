//! Frame: a single step of a trajectory

use rustc_hash::FxHashSet;

use crate::core::atom::Atom;
use crate::core::cell::{CellShape, UnitCell};
use crate::core::property::{Property, PropertyMap};
use crate::core::topology::Topology;
use crate::core::Vector3D;
use crate::error::{Error, Result};
use crate::warnings::warning;

/// Value of [`Frame::step`] before any format or trajectory set it
pub const STEP_SENTINEL: usize = usize::MAX;

/// Number of atoms above which bond guessing switches from the all-pairs
/// search to a cell list
const CELL_LIST_THRESHOLD: usize = 1000;

/// One step of a trajectory: positions (required), optional velocities, a
/// topology, a unit cell, a step index, and arbitrary properties.
///
/// The positions array always has the same size as the topology; resizing
/// one resizes the other.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    step: usize,
    cell: UnitCell,
    topology: Topology,
    positions: Vec<Vector3D>,
    velocities: Option<Vec<Vector3D>>,
    properties: PropertyMap,
}

impl Frame {
    /// Create an empty frame with an infinite cell
    pub fn new() -> Self {
        Frame::default()
    }

    /// Create an empty frame with the given cell
    pub fn with_cell(cell: UnitCell) -> Self {
        Frame {
            cell,
            ..Frame::default()
        }
    }

    /// Number of atoms in this frame
    pub fn size(&self) -> usize {
        debug_assert_eq!(self.positions.len(), self.topology.size());
        self.positions.len()
    }

    /// Resize this frame to contain `size` atoms.
    ///
    /// New atoms are default-constructed with a zero position (and zero
    /// velocity when velocities are enabled).
    pub fn resize(&mut self, size: usize) {
        self.topology.resize(size);
        self.positions.resize(size, Vector3D::zeros());
        if let Some(velocities) = &mut self.velocities {
            velocities.resize(size, Vector3D::zeros());
        }
    }

    /// Add an atom at the given position
    pub fn add_atom(&mut self, atom: Atom, position: Vector3D) {
        self.topology.add_atom(atom);
        self.positions.push(position);
        if let Some(velocities) = &mut self.velocities {
            velocities.push(Vector3D::zeros());
        }
    }

    /// Add an atom at the given position, with the given velocity.
    ///
    /// Velocity storage is enabled if it was not already.
    pub fn add_atom_with_velocity(&mut self, atom: Atom, position: Vector3D, velocity: Vector3D) {
        self.add_velocities();
        self.topology.add_atom(atom);
        self.positions.push(position);
        if let Some(velocities) = &mut self.velocities {
            velocities.push(velocity);
        }
    }

    /// Remove the atom at `index` from the frame
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.topology.remove(index)?;
        self.positions.remove(index);
        if let Some(velocities) = &mut self.velocities {
            velocities.remove(index);
        }
        Ok(())
    }

    /// Atomic positions, in Angstroms
    pub fn positions(&self) -> &[Vector3D] {
        &self.positions
    }

    /// Mutable access to the atomic positions
    pub fn positions_mut(&mut self) -> &mut [Vector3D] {
        &mut self.positions
    }

    /// Enable velocity storage, filling existing atoms with zero
    /// velocities. Calling this twice is a no-op.
    pub fn add_velocities(&mut self) {
        if self.velocities.is_none() {
            self.velocities = Some(vec![Vector3D::zeros(); self.size()]);
        }
    }

    /// Atomic velocities, if this frame stores them
    pub fn velocities(&self) -> Option<&[Vector3D]> {
        self.velocities.as_deref()
    }

    /// Mutable access to the atomic velocities, if this frame stores them
    pub fn velocities_mut(&mut self) -> Option<&mut [Vector3D]> {
        self.velocities.as_deref_mut()
    }

    /// The unit cell of this frame
    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    /// Replace the unit cell
    pub fn set_cell(&mut self, cell: UnitCell) {
        self.cell = cell;
    }

    /// The topology of this frame
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable access to the topology
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// Replace the topology. The new topology must have the same number of
    /// atoms as this frame.
    pub fn set_topology(&mut self, topology: Topology) -> Result<()> {
        if topology.size() != self.size() {
            return Err(Error::Generic(format!(
                "the topology contains {} atoms, but the frame contains {} atoms",
                topology.size(),
                self.size()
            )));
        }
        self.topology = topology;
        Ok(())
    }

    /// Step index of this frame, or [`STEP_SENTINEL`] if unset
    pub fn step(&self) -> usize {
        self.step
    }

    /// Set the step index of this frame
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }

    /// Properties attached to this frame
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Mutable access to the properties attached to this frame
    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    /// Set the property `name` to `value` on this frame
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Property>) {
        self.properties.set(name, value);
    }

    /// Get the property with the given name, if any
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Distance between atoms `i` and `j`, in Angstroms, taking periodic
    /// boundary conditions into account.
    pub fn distance(&self, i: usize, j: usize) -> Result<f64> {
        let size = self.size();
        if i >= size || j >= size {
            return Err(Error::OutOfBounds(format!(
                "atom index {} is out of bounds for a frame with {} atoms",
                std::cmp::max(i, j),
                size
            )));
        }
        Ok(self.cell.wrap(self.positions[j] - self.positions[i]).norm())
    }

    /// Guess the bonds in this frame from the interatomic distances.
    ///
    /// Two atoms are bonded when their distance is below 1.3 times the sum
    /// of their covalent radii, and above 0.5 Å. Atoms with a type missing
    /// from the periodic table (and without a configured radius) do not
    /// take part in the guess.
    pub fn guess_bonds(&mut self) -> Result<()> {
        let mut radii = Vec::with_capacity(self.size());
        let mut unknown_types = FxHashSet::default();
        for atom in self.topology.atoms() {
            let radius = atom.covalent_radius();
            if radius.is_none() && unknown_types.insert(atom.atom_type().to_string()) {
                warning(
                    "guess bonds",
                    format!(
                        "missing covalent radius for '{}', it will not be bonded",
                        atom.atom_type()
                    ),
                );
            }
            radii.push(radius.unwrap_or(0.0));
        }

        let max_radius = radii.iter().cloned().fold(0.0, f64::max);
        if max_radius == 0.0 {
            return Ok(());
        }
        let cutoff = 2.0 * max_radius * 1.3;

        let candidates = if self.size() < CELL_LIST_THRESHOLD {
            self.all_pairs()
        } else {
            self.cell_list_pairs(cutoff)?
        };

        let mut bonds = Vec::new();
        for (i, j) in candidates {
            if radii[i] == 0.0 || radii[j] == 0.0 {
                continue;
            }
            let distance = self.distance(i, j)?;
            if distance > 0.5 && distance < 1.3 * (radii[i] + radii[j]) {
                bonds.push((i, j));
            }
        }

        for (i, j) in bonds {
            self.topology.add_bond(i, j)?;
        }
        Ok(())
    }

    fn all_pairs(&self) -> Vec<(usize, usize)> {
        let size = self.size();
        let mut pairs = Vec::new();
        for i in 0..size {
            for j in i + 1..size {
                pairs.push((i, j));
            }
        }
        pairs
    }

    /// Candidate pairs within `cutoff` of each other, from a grid of
    /// buckets with a side of at least `cutoff`.
    fn cell_list_pairs(&self, cutoff: f64) -> Result<Vec<(usize, usize)>> {
        let periodic = self.cell.shape() != CellShape::Infinite;

        // map every atom to fractional-like coordinates in [0, 1)
        let (reduced, n_buckets) = if periodic {
            let inverse = self.cell.inverse();
            let matrix = self.cell.matrix();
            let volume = self.cell.volume();

            // perpendicular widths of the cell give the real-space distance
            // covered by one fractional unit along each axis
            let columns: Vec<Vector3D> = (0..3).map(|i| matrix.column(i).into_owned()).collect();
            let widths = [
                volume / columns[1].cross(&columns[2]).norm(),
                volume / columns[2].cross(&columns[0]).norm(),
                volume / columns[0].cross(&columns[1]).norm(),
            ];

            let n_buckets: [usize; 3] = std::array::from_fn(|i| {
                let n = (widths[i] / cutoff).floor();
                if n.is_finite() && n >= 1.0 {
                    n as usize
                } else {
                    1
                }
            });

            let reduced = self
                .positions
                .iter()
                .map(|&position| {
                    let mut fractional = inverse * position;
                    for x in fractional.iter_mut() {
                        *x -= x.floor();
                    }
                    fractional
                })
                .collect::<Vec<_>>();
            (reduced, n_buckets)
        } else {
            let mut min = Vector3D::repeat(f64::INFINITY);
            let mut max = Vector3D::repeat(f64::NEG_INFINITY);
            for position in &self.positions {
                for axis in 0..3 {
                    min[axis] = min[axis].min(position[axis]);
                    max[axis] = max[axis].max(position[axis]);
                }
            }

            let n_buckets: [usize; 3] = std::array::from_fn(|i| {
                let n = ((max[i] - min[i]) / cutoff).floor();
                if n.is_finite() && n >= 1.0 {
                    n as usize
                } else {
                    1
                }
            });

            let reduced = self
                .positions
                .iter()
                .map(|&position| {
                    Vector3D::from_fn(|axis, _| {
                        let extent = max[axis] - min[axis];
                        if extent > 0.0 {
                            ((position[axis] - min[axis]) / extent).min(1.0 - f64::EPSILON)
                        } else {
                            0.0
                        }
                    })
                })
                .collect::<Vec<_>>();
            (reduced, n_buckets)
        };

        let total_buckets = n_buckets[0] * n_buckets[1] * n_buckets[2];
        let bucket_of = |reduced: &Vector3D| -> usize {
            let mut index = 0;
            for axis in 0..3 {
                let i = ((reduced[axis] * n_buckets[axis] as f64) as usize).min(n_buckets[axis] - 1);
                index = index * n_buckets[axis] + i;
            }
            index
        };

        let mut buckets = vec![Vec::new(); total_buckets];
        for (atom, position) in reduced.iter().enumerate() {
            buckets[bucket_of(position)].push(atom);
        }

        // neighbor buckets along one axis, with periodic wrap-around and
        // without duplicates when there are fewer than three buckets
        let neighbors_along = |i: usize, n: usize| -> Vec<usize> {
            let mut result = Vec::with_capacity(3);
            for delta in [-1_i64, 0, 1] {
                let neighbor = (i as i64 + delta).rem_euclid(n as i64) as usize;
                if !result.contains(&neighbor) {
                    if periodic || (neighbor as i64 - i as i64).abs() <= 1 {
                        result.push(neighbor);
                    }
                }
            }
            result
        };

        let mut pairs = FxHashSet::default();
        for x in 0..n_buckets[0] {
            for y in 0..n_buckets[1] {
                for z in 0..n_buckets[2] {
                    let bucket = (x * n_buckets[1] + y) * n_buckets[2] + z;
                    for &nx in &neighbors_along(x, n_buckets[0]) {
                        for &ny in &neighbors_along(y, n_buckets[1]) {
                            for &nz in &neighbors_along(z, n_buckets[2]) {
                                let other = (nx * n_buckets[1] + ny) * n_buckets[2] + nz;
                                for &i in &buckets[bucket] {
                                    for &j in &buckets[other] {
                                        if i < j {
                                            pairs.insert((i, j));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(pairs.into_iter().collect())
    }
}
