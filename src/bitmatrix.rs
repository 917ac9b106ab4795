//! Binary matrices and the GF(2^w) to GF(2) expansion
//!
//! A `BitMatrix` describes a code at the bit level: entry `(i, j)` set means bit
//! packet `j` of the input is XORed into bit packet `i` of the output. Coding
//! bitmatrices have `m * w` rows and `k * w` columns.

use crate::error::{CodingError, Result};
use crate::galois::FieldService;
use crate::matrix::Matrix;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Row-major 0/1 matrix
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitMatrix {
    rows: usize,
    cols: usize,
    bits: Vec<u8>,
}

impl BitMatrix {
    /// Create an all-zero bitmatrix
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            bits: vec![0; rows * cols],
        }
    }

    /// Create a bitmatrix from rows of 0/1 values; any nonzero byte counts as 1
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(CodingError::BadParameters(
                "bitmatrix rows have different lengths".to_string(),
            ));
        }
        let bits = rows.iter().flatten().map(|&b| u8::from(b != 0)).collect();
        Ok(Self {
            rows: rows.len(),
            cols,
            bits,
        })
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::new(size, size);
        for i in 0..size {
            matrix.set(i, i, true);
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

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.cols + col] != 0
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        self.bits[row * self.cols + col] = u8::from(value);
    }

    /// One row as 0/1 bytes
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.bits[row * self.cols..(row + 1) * self.cols]
    }

    /// Number of set bits
    pub fn ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.cols {
            self.bits.swap(a * self.cols + col, b * self.cols + col);
        }
    }

    /// Overwrite one row with 0/1 bytes
    pub(crate) fn copy_row_from(&mut self, row: usize, bits: &[u8]) {
        let cols = self.cols;
        self.bits[row * cols..(row + 1) * cols].copy_from_slice(bits);
    }

    /// `row[dst] ^= row[src]`
    fn xor_rows(&mut self, dst: usize, src: usize) {
        for col in 0..self.cols {
            self.bits[dst * self.cols + col] ^= self.bits[src * self.cols + col];
        }
    }

    /// New bitmatrix made of the given rows, in order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut bits = Vec::with_capacity(rows.len() * self.cols);
        for &row in rows {
            bits.extend_from_slice(self.row(row));
        }
        Self {
            rows: rows.len(),
            cols: self.cols,
            bits,
        }
    }

    /// `(cols + rows) x cols` bitmatrix: identity on top, this bitmatrix below
    pub fn distribution_matrix(&self) -> Self {
        let mut dist = Self::identity(self.cols);
        dist.rows += self.rows;
        dist.bits.extend_from_slice(&self.bits);
        dist
    }

    /// Stable hash of shape and contents
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn check_square(&self) -> Result<()> {
        if self.rows != self.cols {
            return Err(CodingError::BadParameters(format!(
                "cannot invert a {}x{} bitmatrix",
                self.rows, self.cols
            )));
        }
        Ok(())
    }

    fn forward_eliminate(&mut self, mut inverse: Option<&mut BitMatrix>) -> Result<()> {
        let size = self.rows;
        for i in 0..size {
            if !self.get(i, i) {
                let pivot = (i + 1..size)
                    .find(|&j| self.get(j, i))
                    .ok_or(CodingError::SingularMatrix { size })?;
                self.swap_rows(i, pivot);
                if let Some(inv) = inverse.as_deref_mut() {
                    inv.swap_rows(i, pivot);
                }
            }

            for j in i + 1..size {
                if self.get(j, i) {
                    self.xor_rows(j, i);
                    if let Some(inv) = inverse.as_deref_mut() {
                        inv.xor_rows(j, i);
                    }
                }
            }
        }
        Ok(())
    }

    /// Invert a square bitmatrix over GF(2), consuming it as scratch space
    pub fn invert(mut self) -> Result<BitMatrix> {
        self.check_square()?;

        let size = self.rows;
        let mut inverse = BitMatrix::identity(size);
        self.forward_eliminate(Some(&mut inverse))?;

        for i in (0..size).rev() {
            for j in 0..i {
                if self.get(j, i) {
                    self.set(j, i, false);
                    inverse.xor_rows(j, i);
                }
            }
        }

        Ok(inverse)
    }

    /// Whether the bitmatrix has an inverse over GF(2); consumes it
    pub fn is_invertible(mut self) -> bool {
        self.check_square().is_ok() && self.forward_eliminate(None).is_ok()
    }

    /// Text rendering with a blank line between every `w` rows and a space
    /// between every `w` columns
    pub fn render(&self, w: usize) -> String {
        let w = w.max(1);
        let mut out = String::with_capacity(self.bits.len() * 2);
        for row in 0..self.rows {
            if row != 0 && row % w == 0 {
                out.push('\n');
            }
            for (col, &bit) in self.row(row).iter().enumerate() {
                if col != 0 && col % w == 0 {
                    out.push(' ');
                }
                out.push(if bit != 0 { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }
}

/// Expand an `m x k` GF(2^w) matrix into its `(m*w) x (k*w)` bitmatrix
///
/// Element `e` becomes a `w x w` block whose column `x` holds the bits of
/// `e * 2^x`, least significant bit in the top row.
pub fn matrix_to_bitmatrix(matrix: &Matrix, field: &dyn FieldService) -> Result<BitMatrix> {
    let w = matrix.w();
    if field.w() != w {
        return Err(CodingError::BadParameters(format!(
            "matrix over GF(2^{w}) expanded with GF(2^{})",
            field.w()
        )));
    }

    let w = w as usize;
    let mut bitmatrix = BitMatrix::new(matrix.rows() * w, matrix.cols() * w);
    for i in 0..matrix.rows() {
        for j in 0..matrix.cols() {
            let mut element = matrix.get(i, j);
            for x in 0..w {
                for l in 0..w {
                    bitmatrix.set(i * w + l, j * w + x, (element >> l) & 1 == 1);
                }
                element = field.multiply(element, 2);
            }
        }
    }
    Ok(bitmatrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galois::GaloisField;

    #[test]
    fn test_expansion_of_one_is_identity() {
        let gf = GaloisField::new(4).unwrap();
        let matrix = Matrix::from_rows(4, &[vec![1]]).unwrap();
        assert_eq!(matrix_to_bitmatrix(&matrix, &gf).unwrap(), BitMatrix::identity(4));
    }

    #[test]
    fn test_expansion_of_two_in_gf8() {
        // x^3 + x + 1: multiplying by 2 shifts down one row and folds bit 2 into rows 0 and 1
        let gf = GaloisField::new(3).unwrap();
        let matrix = Matrix::from_rows(3, &[vec![2]]).unwrap();
        let expected =
            BitMatrix::from_rows(&[vec![0, 0, 1], vec![1, 0, 1], vec![0, 1, 0]]).unwrap();
        assert_eq!(matrix_to_bitmatrix(&matrix, &gf).unwrap(), expected);
    }

    #[test]
    fn test_expansion_shape() {
        let gf = GaloisField::new(8).unwrap();
        let matrix = Matrix::from_rows(8, &[vec![1, 1, 1], vec![1, 2, 4]]).unwrap();
        let bitmatrix = matrix_to_bitmatrix(&matrix, &gf).unwrap();
        assert_eq!(bitmatrix.rows(), 16);
        assert_eq!(bitmatrix.cols(), 24);
    }

    #[test]
    fn test_invert_round_trip() {
        let matrix = BitMatrix::from_rows(&[
            vec![0, 1, 1],
            vec![1, 1, 0],
            vec![1, 0, 0],
        ])
        .unwrap();
        let inverse = matrix.clone().invert().unwrap();

        // product over GF(2)
        for i in 0..3 {
            for j in 0..3 {
                let bit = (0..3).fold(false, |acc, x| acc ^ (matrix.get(i, x) & inverse.get(x, j)));
                assert_eq!(bit, i == j);
            }
        }
    }

    #[test]
    fn test_singular_bitmatrix() {
        let matrix = BitMatrix::from_rows(&[vec![1, 1], vec![1, 1]]).unwrap();
        assert!(!matrix.clone().is_invertible());
        assert_eq!(
            matrix.invert().unwrap_err(),
            CodingError::SingularMatrix { size: 2 }
        );
    }

    #[test]
    fn test_render_groups_blocks() {
        let matrix = BitMatrix::from_rows(&[
            vec![1, 0, 0, 1],
            vec![0, 1, 1, 0],
            vec![1, 1, 1, 1],
            vec![0, 0, 0, 0],
        ])
        .unwrap();
        assert_eq!(matrix.render(2), "10 01\n01 10\n\n11 11\n00 00\n");
    }

    #[test]
    fn test_fingerprint_tracks_contents() {
        let a = BitMatrix::identity(4);
        let mut b = BitMatrix::identity(4);
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.set(0, 3, true);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.ones(), 5);
    }
}
