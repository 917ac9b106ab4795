//! Dense matrices over GF(2^w)
//!
//! Coding matrices, distribution matrices and decoding matrices all use this type.
//! Elements are stored row-major as `u32`; only the low `w` bits are meaningful.

use crate::error::{CodingError, Result};
use crate::galois::FieldService;
use std::fmt;

/// Row-major matrix of GF(2^w) elements
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    w: u32,
    data: Vec<u32>,
}

impl Matrix {
    /// Create a zero matrix
    pub fn new(rows: usize, cols: usize, w: u32) -> Self {
        Self {
            rows,
            cols,
            w,
            data: vec![0; rows * cols],
        }
    }

    /// Create a matrix from row-major elements
    pub fn from_vec(rows: usize, cols: usize, w: u32, data: Vec<u32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(CodingError::BadParameters(format!(
                "{} elements cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            w,
            data,
        })
    }

    /// Create a matrix from a list of equally long rows
    pub fn from_rows(w: u32, rows: &[Vec<u32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(CodingError::BadParameters(
                "matrix rows have different lengths".to_string(),
            ));
        }
        Self::from_vec(rows.len(), cols, w, rows.concat())
    }

    /// Identity matrix
    pub fn identity(size: usize, w: u32) -> Self {
        let mut matrix = Self::new(size, size, w);
        for i in 0..size {
            matrix.set(i, i, 1);
        }
        matrix
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Word size of the field the elements belong to
    #[inline]
    pub fn w(&self) -> u32 {
        self.w
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u32) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[u32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// All elements, row-major
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.cols {
            self.data.swap(a * self.cols + col, b * self.cols + col);
        }
    }

    /// New matrix made of the given rows, in order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * self.cols);
        for &row in rows {
            data.extend_from_slice(self.row(row));
        }
        Self {
            rows: rows.len(),
            cols: self.cols,
            w: self.w,
            data,
        }
    }

    /// `(cols + rows) x cols` matrix: identity on top, this matrix below
    pub fn distribution_matrix(&self) -> Self {
        let mut dist = Self::identity(self.cols, self.w);
        dist.rows += self.rows;
        dist.data.extend_from_slice(&self.data);
        dist
    }

    /// `row[dst] = row[dst] + factor * row[src]`
    fn add_scaled_row(&mut self, dst: usize, src: usize, factor: u32, field: &dyn FieldService) {
        for col in 0..self.cols {
            let value = self.get(src, col);
            if value != 0 {
                let sum = self.get(dst, col) ^ field.multiply(value, factor);
                self.set(dst, col, sum);
            }
        }
    }

    fn scale_row(&mut self, row: usize, factor: u32, field: &dyn FieldService) {
        for value in self.row_mut(row) {
            *value = field.multiply(*value, factor);
        }
    }

    fn check_field(&self, field: &dyn FieldService) -> Result<()> {
        if field.w() != self.w {
            return Err(CodingError::BadParameters(format!(
                "matrix over GF(2^{}) used with GF(2^{})",
                self.w,
                field.w()
            )));
        }
        Ok(())
    }

    fn check_square(&self) -> Result<()> {
        if self.rows != self.cols {
            return Err(CodingError::BadParameters(format!(
                "cannot invert a {}x{} matrix",
                self.rows, self.cols
            )));
        }
        Ok(())
    }

    /// Matrix product `self * other`
    pub fn multiply(&self, other: &Matrix, field: &dyn FieldService) -> Result<Matrix> {
        self.check_field(field)?;
        if self.cols != other.rows || self.w != other.w {
            return Err(CodingError::BadParameters(format!(
                "cannot multiply {}x{} (w={}) by {}x{} (w={})",
                self.rows, self.cols, self.w, other.rows, other.cols, other.w
            )));
        }

        let mut product = Matrix::new(self.rows, other.cols, self.w);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = 0;
                for x in 0..self.cols {
                    sum ^= field.multiply(self.get(i, x), other.get(x, j));
                }
                product.set(i, j, sum);
            }
        }
        Ok(product)
    }

    /// Forward elimination to upper triangular form with unit diagonal
    ///
    /// Every row operation is mirrored into `inverse` when one is given.
    fn forward_eliminate(
        &mut self,
        mut inverse: Option<&mut Matrix>,
        field: &dyn FieldService,
    ) -> Result<()> {
        let size = self.rows;
        for i in 0..size {
            if self.get(i, i) == 0 {
                let pivot = (i + 1..size)
                    .find(|&j| self.get(j, i) != 0)
                    .ok_or(CodingError::SingularMatrix { size })?;
                self.swap_rows(i, pivot);
                if let Some(inv) = inverse.as_deref_mut() {
                    inv.swap_rows(i, pivot);
                }
            }

            let pivot = self.get(i, i);
            if pivot != 1 {
                let factor = field
                    .inverse(pivot)
                    .ok_or(CodingError::SingularMatrix { size })?;
                self.scale_row(i, factor, field);
                if let Some(inv) = inverse.as_deref_mut() {
                    inv.scale_row(i, factor, field);
                }
            }

            for j in i + 1..size {
                let factor = self.get(j, i);
                if factor != 0 {
                    self.add_scaled_row(j, i, factor, field);
                    if let Some(inv) = inverse.as_deref_mut() {
                        inv.add_scaled_row(j, i, factor, field);
                    }
                }
            }
        }
        Ok(())
    }

    /// Invert a square matrix, consuming it as scratch space
    ///
    /// Gauss-Jordan elimination: forward pass with row swaps for zero pivots, then
    /// back substitution. Fails with [`CodingError::SingularMatrix`] when some column
    /// has no usable pivot.
    pub fn invert(mut self, field: &dyn FieldService) -> Result<Matrix> {
        self.check_field(field)?;
        self.check_square()?;

        let size = self.rows;
        let mut inverse = Matrix::identity(size, self.w);
        self.forward_eliminate(Some(&mut inverse), field)?;

        for i in (0..size).rev() {
            for j in 0..i {
                let factor = self.get(j, i);
                if factor != 0 {
                    self.set(j, i, 0);
                    inverse.add_scaled_row(j, i, factor, field);
                }
            }
        }

        Ok(inverse)
    }

    /// Whether the matrix has an inverse; consumes it
    pub fn is_invertible(mut self, field: &dyn FieldService) -> bool {
        self.check_field(field).is_ok()
            && self.check_square().is_ok()
            && self.forward_eliminate(None, field).is_ok()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let largest = if self.w >= 32 {
            u32::MAX as u64
        } else {
            (1u64 << self.w) - 1
        };
        let width = largest.to_string().len();

        for row in 0..self.rows {
            for (col, value) in self.row(row).iter().enumerate() {
                if col > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{value:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galois::GaloisField;

    #[test]
    fn test_identity_inverts_to_itself() {
        let gf = GaloisField::new(8).unwrap();
        let identity = Matrix::identity(5, 8);
        assert_eq!(identity.clone().invert(&gf).unwrap(), identity);
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let gf = GaloisField::new(8).unwrap();
        // Vandermonde rows for x = 0, 1, 2 with the first two columns swapped,
        // so the first pivot needs a row swap
        let matrix = Matrix::from_rows(8, &[vec![0, 1, 0], vec![1, 1, 1], vec![2, 1, 4]]).unwrap();

        let inverse = matrix.clone().invert(&gf).unwrap();
        assert_eq!(matrix.multiply(&inverse, &gf).unwrap(), Matrix::identity(3, 8));
        assert_eq!(inverse.multiply(&matrix, &gf).unwrap(), Matrix::identity(3, 8));
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let gf = GaloisField::new(4).unwrap();
        // second row is 2 * first row
        let matrix = Matrix::from_rows(4, &[vec![1, 3], vec![2, 6]]).unwrap();
        assert!(!matrix.clone().is_invertible(&gf));
        assert_eq!(
            matrix.invert(&gf).unwrap_err(),
            CodingError::SingularMatrix { size: 2 }
        );
    }

    #[test]
    fn test_invert_rejects_wrong_shapes() {
        let gf = GaloisField::new(8).unwrap();
        assert!(Matrix::new(2, 3, 8).invert(&gf).is_err());
        let gf16 = GaloisField::new(16).unwrap();
        assert!(Matrix::identity(2, 8).invert(&gf16).is_err());
    }

    #[test]
    fn test_from_rows_checks_lengths() {
        assert!(Matrix::from_rows(8, &[vec![1, 2], vec![3]]).is_err());
        assert!(Matrix::from_vec(2, 2, 8, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_distribution_matrix_layout() {
        let coding = Matrix::from_rows(8, &[vec![1, 1, 1], vec![1, 2, 4]]).unwrap();
        let dist = coding.distribution_matrix();
        assert_eq!(dist.rows(), 5);
        assert_eq!(dist.cols(), 3);
        assert_eq!(dist.row(0), &[1, 0, 0]);
        assert_eq!(dist.row(2), &[0, 0, 1]);
        assert_eq!(dist.row(4), &[1, 2, 4]);
        assert_eq!(dist.select_rows(&[4, 1]).row(0), &[1, 2, 4]);
    }

    #[test]
    fn test_display_pads_to_field_width() {
        let matrix = Matrix::from_rows(8, &[vec![1, 255], vec![16, 2]]).unwrap();
        assert_eq!(matrix.to_string(), "  1 255\n 16   2\n");

        let matrix = Matrix::from_rows(3, &[vec![1, 7]]).unwrap();
        assert_eq!(matrix.to_string(), "1 7\n");
    }
}
