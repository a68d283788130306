//! Periodic unit cell
//!
//! The cell is stored as a 3x3 matrix where column `i` is the cell vector
//! `i`, in Angstroms. Cells built from lengths and angles are in canonical
//! upper-triangular form: the first vector along x, the second in the xy
//! plane.

use crate::core::{Matrix3D, Vector3D};
use crate::error::{Error, Result};
use crate::warnings::warning;

/// Shape of a unit cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellShape {
    /// Infinite cell, no periodic boundary conditions
    Infinite,
    /// Orthorhombic cell, with all angles at 90 degrees
    Orthorhombic,
    /// Triclinic cell, with at least one angle away from 90 degrees
    Triclinic,
}

/// Lengths are considered zero below this threshold (in Angstroms)
const ZERO_TOLERANCE: f64 = 1e-5;
/// Angles within this distance of 90 degrees are treated as right angles
const RIGHT_ANGLE_TOLERANCE: f64 = 1e-3;

pub(crate) fn is_roughly_zero(value: f64) -> bool {
    value.abs() < ZERO_TOLERANCE
}

pub(crate) fn is_roughly_90(value: f64) -> bool {
    (value - 90.0).abs() < RIGHT_ANGLE_TOLERANCE
}

pub(crate) fn is_diagonal(matrix: &Matrix3D) -> bool {
    is_roughly_zero(matrix[(1, 0)])
        && is_roughly_zero(matrix[(2, 0)])
        && is_roughly_zero(matrix[(0, 1)])
        && is_roughly_zero(matrix[(2, 1)])
        && is_roughly_zero(matrix[(0, 2)])
        && is_roughly_zero(matrix[(1, 2)])
}

pub(crate) fn is_upper_triangular(matrix: &Matrix3D) -> bool {
    is_roughly_zero(matrix[(1, 0)]) && is_roughly_zero(matrix[(2, 0)]) && is_roughly_zero(matrix[(2, 1)])
}

fn cosd(theta: f64) -> f64 {
    theta.to_radians().cos()
}

fn sind(theta: f64) -> f64 {
    theta.to_radians().sin()
}

fn check_lengths(lengths: Vector3D) -> Result<()> {
    if lengths[0] < 0.0 || lengths[1] < 0.0 || lengths[2] < 0.0 {
        return Err(Error::Generic("a unit cell can not have negative lengths".into()));
    }

    let zeros = lengths.iter().filter(|&&x| is_roughly_zero(x)).count();
    if zeros == 1 || zeros == 2 {
        warning(
            "",
            "trying to set one or two unit cell lengths to zero, something might be wrong",
        );
    }

    Ok(())
}

fn check_angles(angles: Vector3D) -> Result<()> {
    if angles[0] < 0.0 || angles[1] < 0.0 || angles[2] < 0.0 {
        return Err(Error::Generic("a unit cell can not have negative angles".into()));
    }

    if angles.iter().any(|&x| is_roughly_zero(x)) {
        return Err(Error::Generic("a unit cell can not have 0° angles".into()));
    }

    if angles.iter().any(|&x| x >= 180.0) {
        return Err(Error::Generic(
            "a unit cell can not have angles larger than or equal to 180°".into(),
        ));
    }

    Ok(())
}

fn matrix_from_lengths_angles(lengths: Vector3D, mut angles: Vector3D) -> Result<Matrix3D> {
    check_lengths(lengths)?;
    check_angles(angles)?;

    if is_roughly_90(angles[0]) && is_roughly_90(angles[1]) && is_roughly_90(angles[2]) {
        angles = Vector3D::new(90.0, 90.0, 90.0);
    }

    let mut matrix = Matrix3D::zeros();

    matrix[(0, 0)] = lengths[0];

    matrix[(0, 1)] = cosd(angles[2]) * lengths[1];
    matrix[(1, 1)] = sind(angles[2]) * lengths[1];

    let cos_beta = cosd(angles[1]);
    let tmp = (cosd(angles[0]) - cos_beta * cosd(angles[2])) / sind(angles[2]);
    matrix[(0, 2)] = cos_beta * lengths[2];
    matrix[(1, 2)] = tmp * lengths[2];
    matrix[(2, 2)] = (1.0 - cos_beta * cos_beta - tmp * tmp).sqrt() * lengths[2];

    debug_assert!(is_upper_triangular(&matrix));

    Ok(matrix)
}

fn lengths_from_matrix(matrix: &Matrix3D) -> Vector3D {
    Vector3D::new(
        matrix.column(0).norm(),
        matrix.column(1).norm(),
        matrix.column(2).norm(),
    )
}

fn angles_from_matrix(matrix: &Matrix3D) -> Vector3D {
    let v1 = matrix.column(0).into_owned();
    let v2 = matrix.column(1).into_owned();
    let v3 = matrix.column(2).into_owned();

    Vector3D::new(
        (v2.dot(&v3) / (v2.norm() * v3.norm())).acos().to_degrees(),
        (v1.dot(&v3) / (v1.norm() * v3.norm())).acos().to_degrees(),
        (v1.dot(&v2) / (v1.norm() * v2.norm())).acos().to_degrees(),
    )
}

fn is_infinite_lengths(lengths: Vector3D) -> bool {
    lengths.iter().all(|&x| is_roughly_zero(x))
}

fn is_orthorhombic_geometry(lengths: Vector3D, angles: Vector3D) -> bool {
    if is_infinite_lengths(lengths) {
        return false;
    }
    // cells with one or two lengths at 0 produce NaN angles, which still
    // count as orthorhombic
    angles.iter().all(|&x| is_roughly_90(x) || x.is_nan())
}

/// A periodic unit cell, infinite, orthorhombic or triclinic
#[derive(Debug, Clone, Copy)]
pub struct UnitCell {
    matrix: Matrix3D,
    inverse: Matrix3D,
    shape: CellShape,
}

impl Default for UnitCell {
    fn default() -> Self {
        UnitCell::infinite()
    }
}

impl PartialEq for UnitCell {
    fn eq(&self, other: &Self) -> bool {
        // exact floating point comparison, matching construction tolerances
        // is done through lengths()/angles() by the caller when needed
        self.shape == other.shape && self.matrix == other.matrix
    }
}

impl UnitCell {
    /// Create an infinite cell, with a zero matrix
    pub fn infinite() -> Self {
        UnitCell {
            matrix: Matrix3D::zeros(),
            inverse: Matrix3D::identity(),
            shape: CellShape::Infinite,
        }
    }

    /// Create a cell from the three lengths, with all angles at 90 degrees.
    ///
    /// The cell is orthorhombic, unless all lengths are zero, in which case
    /// it is infinite. Fails on negative lengths.
    pub fn from_lengths(a: f64, b: f64, c: f64) -> Result<Self> {
        UnitCell::from_lengths_angles(a, b, c, 90.0, 90.0, 90.0)
    }

    /// Create a cell from lengths and angles (in degrees).
    ///
    /// The cell is triclinic unless all angles are 90 degrees (then
    /// orthorhombic) or all lengths are zero (then infinite). Fails on
    /// negative lengths and on angles outside of (0, 180).
    pub fn from_lengths_angles(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        let matrix = matrix_from_lengths_angles(
            Vector3D::new(a, b, c),
            Vector3D::new(alpha, beta, gamma),
        )?;
        UnitCell::from_matrix(matrix)
    }

    /// Create a cell from a full 3x3 matrix, column `i` being the cell
    /// vector `i`.
    ///
    /// Fails if the determinant is negative, or if the matrix describes an
    /// orthorhombic geometry without being diagonal (the first vector must
    /// lie along x, the second along y, the third along z).
    pub fn from_matrix(matrix: Matrix3D) -> Result<Self> {
        if matrix.determinant() < 0.0 {
            return Err(Error::Generic(
                "invalid unit cell matrix with negative determinant".into(),
            ));
        }

        let lengths = lengths_from_matrix(&matrix);
        let angles = angles_from_matrix(&matrix);
        if !is_diagonal(&matrix) && is_orthorhombic_geometry(lengths, angles) {
            return Err(Error::Generic(
                "orthorhombic cell must have their a vector along x axis, \
                 b vector along y axis and c vector along z axis"
                    .into(),
            ));
        }

        let mut cell = UnitCell {
            matrix,
            inverse: Matrix3D::identity(),
            shape: CellShape::Triclinic,
        };

        if is_diagonal(&matrix) {
            if is_infinite_lengths(lengths) {
                cell.shape = CellShape::Infinite;
                cell.matrix = Matrix3D::zeros();
            } else {
                cell.shape = CellShape::Orthorhombic;
            }
        }

        if !is_roughly_zero(cell.volume()) {
            // do not try to invert a cell with a 0 volume
            cell.inverse = cell
                .matrix
                .try_inverse()
                .ok_or_else(|| Error::Generic("could not invert the unit cell matrix".into()))?;
        }

        Ok(cell)
    }

    /// Get the cell shape
    pub fn shape(&self) -> CellShape {
        self.shape
    }

    /// Change the cell shape.
    ///
    /// Setting the shape to orthorhombic requires a diagonal matrix, and
    /// setting it to infinite additionally requires all lengths to be zero.
    pub fn set_shape(&mut self, shape: CellShape) -> Result<()> {
        match shape {
            CellShape::Orthorhombic => {
                if !is_diagonal(&self.matrix) {
                    return Err(Error::Generic(
                        "can not set cell shape to Orthorhombic: some angles are not 90°".into(),
                    ));
                }
            }
            CellShape::Infinite => {
                if !is_diagonal(&self.matrix) {
                    return Err(Error::Generic(
                        "can not set cell shape to Infinite: some angles are not 90°".into(),
                    ));
                }
                if !is_infinite_lengths(self.lengths()) {
                    return Err(Error::Generic(
                        "can not set cell shape to Infinite: some lengths are not 0".into(),
                    ));
                }
            }
            CellShape::Triclinic => {}
        }

        self.shape = shape;
        Ok(())
    }

    /// Get the cell matrix, column `i` being the cell vector `i`
    pub fn matrix(&self) -> Matrix3D {
        self.matrix
    }

    /// Get the three cell lengths, in Angstroms
    pub fn lengths(&self) -> Vector3D {
        match self.shape {
            CellShape::Infinite => Vector3D::zeros(),
            CellShape::Orthorhombic => {
                Vector3D::new(self.matrix[(0, 0)], self.matrix[(1, 1)], self.matrix[(2, 2)])
            }
            CellShape::Triclinic => lengths_from_matrix(&self.matrix),
        }
    }

    /// Get the three cell angles, in degrees
    pub fn angles(&self) -> Vector3D {
        match self.shape {
            CellShape::Infinite | CellShape::Orthorhombic => Vector3D::new(90.0, 90.0, 90.0),
            CellShape::Triclinic => angles_from_matrix(&self.matrix),
        }
    }

    /// Set the cell lengths, resetting the orientation to the canonical
    /// upper-triangular form. Only allowed for non-infinite cells.
    pub fn set_lengths(&mut self, a: f64, b: f64, c: f64) -> Result<()> {
        if self.shape == CellShape::Infinite {
            return Err(Error::Generic("can not set lengths for an infinite cell".into()));
        }

        check_lengths(Vector3D::new(a, b, c))?;

        if !is_upper_triangular(&self.matrix) {
            warning("UnitCell", "resetting unit cell orientation in set_lengths");
        }

        let angles = self.angles();
        *self = UnitCell::from_lengths_angles(a, b, c, angles[0], angles[1], angles[2])?;
        Ok(())
    }

    /// Set the cell angles, resetting the orientation to the canonical
    /// upper-triangular form. Only allowed for triclinic cells.
    pub fn set_angles(&mut self, alpha: f64, beta: f64, gamma: f64) -> Result<()> {
        if self.shape != CellShape::Triclinic {
            return Err(Error::Generic("can not set angles for a non-triclinic cell".into()));
        }

        check_angles(Vector3D::new(alpha, beta, gamma))?;

        if !is_upper_triangular(&self.matrix) {
            warning("UnitCell", "resetting unit cell orientation in set_angles");
        }

        let lengths = self.lengths();
        *self = UnitCell::from_lengths_angles(lengths[0], lengths[1], lengths[2], alpha, beta, gamma)?;
        Ok(())
    }

    /// Volume of the cell, in cubic Angstroms. Zero for infinite cells.
    pub fn volume(&self) -> f64 {
        match self.shape {
            CellShape::Infinite => 0.0,
            CellShape::Orthorhombic | CellShape::Triclinic => self.matrix.determinant(),
        }
    }

    /// Wrap a vector into the cell, i.e. remove the nearest integer cell
    /// translation. Infinite cells return the vector unchanged.
    pub fn wrap(&self, vector: Vector3D) -> Vector3D {
        match self.shape {
            CellShape::Infinite => vector,
            CellShape::Orthorhombic => {
                let lengths = self.lengths();
                Vector3D::new(
                    vector[0] - (vector[0] / lengths[0]).round() * lengths[0],
                    vector[1] - (vector[1] / lengths[1]).round() * lengths[1],
                    vector[2] - (vector[2] / lengths[2]).round() * lengths[2],
                )
            }
            CellShape::Triclinic => {
                let mut fractional = self.inverse * vector;
                fractional[0] -= fractional[0].round();
                fractional[1] -= fractional[1].round();
                fractional[2] -= fractional[2].round();
                self.matrix * fractional
            }
        }
    }

    pub(crate) fn inverse(&self) -> &Matrix3D {
        &self.inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_vector_eq(actual: Vector3D, expected: (f64, f64, f64), eps: f64) {
        assert!((actual[0] - expected.0).abs() < eps, "{} != {}", actual[0], expected.0);
        assert!((actual[1] - expected.1).abs() < eps, "{} != {}", actual[1], expected.1);
        assert!((actual[2] - expected.2).abs() < eps, "{} != {}", actual[2], expected.2);
    }

    #[test]
    fn test_infinite_cell() {
        let cell = UnitCell::infinite();
        assert_eq!(cell.shape(), CellShape::Infinite);
        assert_eq!(cell.lengths(), Vector3D::zeros());
        assert_eq!(cell.angles(), Vector3D::new(90.0, 90.0, 90.0));
        assert_eq!(cell.volume(), 0.0);

        let same = UnitCell::from_lengths(0.0, 0.0, 0.0).unwrap();
        assert_eq!(same.shape(), CellShape::Infinite);
    }

    #[test]
    fn test_orthorhombic_cell() {
        let cell = UnitCell::from_lengths(10.0, 11.0, 12.0).unwrap();
        assert_eq!(cell.shape(), CellShape::Orthorhombic);
        assert_vector_eq(cell.lengths(), (10.0, 11.0, 12.0), 1e-10);
        assert_vector_eq(cell.angles(), (90.0, 90.0, 90.0), 1e-10);
        assert!((cell.volume() - 10.0 * 11.0 * 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_triclinic_cell() {
        let cell = UnitCell::from_lengths_angles(10.0, 11.0, 12.0, 80.0, 95.0, 120.0).unwrap();
        assert_eq!(cell.shape(), CellShape::Triclinic);
        assert_vector_eq(cell.lengths(), (10.0, 11.0, 12.0), 1e-10);
        assert_vector_eq(cell.angles(), (80.0, 95.0, 120.0), 1e-10);
    }

    #[test]
    fn test_angles_close_to_90_are_orthorhombic() {
        let cell = UnitCell::from_lengths_angles(10.0, 10.0, 10.0, 90.0005, 89.9995, 90.0).unwrap();
        assert_eq!(cell.shape(), CellShape::Orthorhombic);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(UnitCell::from_lengths(-1.0, 10.0, 10.0).is_err());
        assert!(UnitCell::from_lengths_angles(10.0, 10.0, 10.0, -30.0, 90.0, 90.0).is_err());
        assert!(UnitCell::from_lengths_angles(10.0, 10.0, 10.0, 0.0, 90.0, 90.0).is_err());
        assert!(UnitCell::from_lengths_angles(10.0, 10.0, 10.0, 190.0, 90.0, 90.0).is_err());
    }

    #[test]
    fn test_from_matrix() {
        let matrix = Matrix3D::from_diagonal(&Vector3D::new(10.0, 11.0, 12.0));
        let cell = UnitCell::from_matrix(matrix).unwrap();
        assert_eq!(cell.shape(), CellShape::Orthorhombic);

        // negative determinant
        let matrix = Matrix3D::from_diagonal(&Vector3D::new(-10.0, 11.0, 12.0));
        assert!(UnitCell::from_matrix(matrix).is_err());

        // rotated orthorhombic geometry is refused
        let mut matrix = Matrix3D::zeros();
        matrix[(1, 0)] = 10.0;
        matrix[(0, 1)] = 11.0;
        matrix[(2, 2)] = 12.0;
        assert!(UnitCell::from_matrix(matrix).is_err());
    }

    #[test]
    fn test_set_lengths_and_angles() {
        let mut cell = UnitCell::infinite();
        assert!(cell.set_lengths(10.0, 10.0, 10.0).is_err());

        let mut cell = UnitCell::from_lengths(10.0, 10.0, 10.0).unwrap();
        cell.set_lengths(20.0, 21.0, 22.0).unwrap();
        assert_vector_eq(cell.lengths(), (20.0, 21.0, 22.0), 1e-10);

        // angles can only be changed on triclinic cells
        assert!(cell.set_angles(80.0, 80.0, 80.0).is_err());

        let mut cell = UnitCell::from_lengths_angles(10.0, 10.0, 10.0, 100.0, 90.0, 90.0).unwrap();
        cell.set_angles(80.0, 89.0, 110.0).unwrap();
        assert_vector_eq(cell.angles(), (80.0, 89.0, 110.0), 1e-10);
    }

    #[test]
    fn test_wrap_orthorhombic() {
        let cell = UnitCell::from_lengths(10.0, 10.0, 10.0).unwrap();
        let wrapped = cell.wrap(Vector3D::new(12.0, -8.0, 4.5));
        assert_vector_eq(wrapped, (2.0, 2.0, 4.5), 1e-10);
    }

    #[test]
    fn test_wrap_triclinic() {
        let cell = UnitCell::from_lengths_angles(3.0, 3.0, 3.0, 60.0, 60.0, 60.0).unwrap();
        let wrapped = cell.wrap(Vector3D::new(2.0, 2.0, 2.0));

        // the fractional form of the wrapped vector lies in (-0.5, 0.5]
        let fractional = cell.inverse() * wrapped;
        for i in 0..3 {
            assert!(fractional[i] > -0.5 && fractional[i] <= 0.5);
        }
    }

    #[test]
    fn test_wrap_infinite() {
        let cell = UnitCell::infinite();
        let vector = Vector3D::new(12.0, -8.0, 4.5);
        assert_eq!(cell.wrap(vector), vector);
    }

    proptest! {
        #[test]
        fn test_wrap_is_idempotent(
            x in -100.0..100.0_f64,
            y in -100.0..100.0_f64,
            z in -100.0..100.0_f64,
        ) {
            let cell = UnitCell::from_lengths_angles(10.0, 12.0, 15.0, 70.0, 85.0, 100.0).unwrap();
            let vector = Vector3D::new(x, y, z);
            let once = cell.wrap(vector);
            let twice = cell.wrap(once);
            prop_assert!((once - twice).norm() < 1e-9);
        }

        #[test]
        fn test_wrap_removes_cell_translations(
            x in -20.0..20.0_f64,
            y in -20.0..20.0_f64,
            z in -20.0..20.0_f64,
            i in -3..3_i32,
            j in -3..3_i32,
            k in -3..3_i32,
        ) {
            let cell = UnitCell::from_lengths_angles(10.0, 12.0, 15.0, 70.0, 85.0, 100.0).unwrap();
            let matrix = cell.matrix();
            let vector = Vector3D::new(x, y, z);
            let translated = vector
                + f64::from(i) * matrix.column(0).into_owned()
                + f64::from(j) * matrix.column(1).into_owned()
                + f64::from(k) * matrix.column(2).into_owned();
            prop_assert!((cell.wrap(vector) - cell.wrap(translated)).norm() < 1e-9);
        }
    }
}
