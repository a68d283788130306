//! Core data structures for molecular trajectories
//!
//! This module defines the in-memory model shared by all file formats:
//! atoms, residues, topologies, unit cells, frames, and typed properties.

pub mod atom;
pub mod cell;
pub mod element;
pub mod frame;
pub mod property;
pub mod residue;
pub mod topology;

/// 3-dimensional vector, in Angstroms for positions
pub type Vector3D = nalgebra::Vector3<f64>;

/// 3x3 matrix, used for unit cells with the cell vectors as columns
pub type Matrix3D = nalgebra::Matrix3<f64>;
