//! Cauchy coding matrices
//!
//! `matrix[i][j] = 1 / (x_i + y_j)` for disjoint sets `X` and `Y`. Every square
//! submatrix of a Cauchy matrix is invertible, so any `k + m <= 2^w` yields an MDS
//! code. Scaling rows and columns keeps that property, which [`improve_coding_matrix`]
//! uses to cut the number of ones in the bitmatrix expansion.

use crate::error::{CodingError, Result};
use crate::galois::FieldService;
use crate::matrix::Matrix;
use log::debug;

fn check_size(k: usize, m: usize, w: u32) -> Result<()> {
    if k == 0 || m == 0 {
        return Err(CodingError::BadParameters(format!(
            "need at least one data and one coding unit, got k={k} m={m}"
        )));
    }
    if (k + m) as u64 > 1u64 << w {
        return Err(CodingError::BadParameters(format!(
            "k + m = {} exceeds the {} elements of GF(2^{w})",
            k + m,
            1u64 << w
        )));
    }
    Ok(())
}

/// Cauchy matrix with `X = {0, .., m-1}` and `Y = {m, .., m+k-1}`
pub fn original_coding_matrix(k: usize, m: usize, field: &dyn FieldService) -> Result<Matrix> {
    check_size(k, m, field.w())?;
    let x: Vec<u32> = (0..m as u32).collect();
    let y: Vec<u32> = (m as u32..(m + k) as u32).collect();
    xy_coding_matrix(k, m, field, &x, &y)
}

/// Cauchy matrix over caller-chosen `X` (length `m`) and `Y` (length `k`)
///
/// The `k + m` elements must be distinct members of GF(2^w).
pub fn xy_coding_matrix(
    k: usize,
    m: usize,
    field: &dyn FieldService,
    x: &[u32],
    y: &[u32],
) -> Result<Matrix> {
    let w = field.w();
    check_size(k, m, w)?;
    if x.len() != m || y.len() != k {
        return Err(CodingError::BadParameters(format!(
            "expected |X| = {m} and |Y| = {k}, got {} and {}",
            x.len(),
            y.len()
        )));
    }

    let mut all: Vec<u64> = x.iter().chain(y).map(|&v| v as u64).collect();
    if let Some(&bad) = all.iter().find(|&&v| v >= 1u64 << w) {
        return Err(CodingError::BadParameters(format!(
            "{bad} is not an element of GF(2^{w})"
        )));
    }
    all.sort_unstable();
    if all.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(CodingError::BadParameters(
            "X and Y must be disjoint sets of distinct elements".to_string(),
        ));
    }

    let mut matrix = Matrix::new(m, k, w);
    for (i, &xi) in x.iter().enumerate() {
        for (j, &yj) in y.iter().enumerate() {
            let value = field.divide(1, xi ^ yj).ok_or_else(|| {
                CodingError::BadParameters(format!("x={xi} and y={yj} coincide"))
            })?;
            matrix.set(i, j, value);
        }
    }
    Ok(matrix)
}

/// Ones in the `w x w` bitmatrix block for multiplication by `value`
pub fn n_ones(value: u32, field: &dyn FieldService) -> usize {
    let mut current = value;
    let mut ones = 0;
    for _ in 0..field.w() {
        ones += current.count_ones() as usize;
        current = field.multiply(current, 2);
    }
    ones
}

/// Ones in the bitmatrix expansion of a whole matrix
pub fn matrix_ones(matrix: &Matrix, field: &dyn FieldService) -> usize {
    matrix.as_slice().iter().map(|&v| n_ones(v, field)).sum()
}

fn row_ones_scaled(row: &[u32], factor: u32, field: &dyn FieldService) -> usize {
    row.iter()
        .map(|&v| n_ones(field.multiply(v, factor), field))
        .sum()
}

/// Rescale a coding matrix to reduce the ones in its bitmatrix
///
/// Columns are divided by their row-0 element so row 0 becomes all ones. Each
/// later row is then divided by whichever of its elements gives the fewest ones.
/// The matrix is left unchanged if the result would have more ones than the input.
pub fn improve_coding_matrix(matrix: &mut Matrix, field: &dyn FieldService) -> Result<()> {
    if matrix.rows() == 0 {
        return Ok(());
    }
    let zero_element = || {
        CodingError::BadParameters("cannot rescale a matrix with zero elements".to_string())
    };

    let before = matrix_ones(matrix, field);
    let mut improved = matrix.clone();

    for j in 0..improved.cols() {
        let top = improved.get(0, j);
        if top != 1 {
            let factor = field.inverse(top).ok_or_else(zero_element)?;
            for i in 0..improved.rows() {
                let value = field.multiply(improved.get(i, j), factor);
                improved.set(i, j, value);
            }
        }
    }

    for i in 1..improved.rows() {
        let mut best_ones = row_ones_scaled(improved.row(i), 1, field);
        let mut best_factor = None;

        for &element in improved.row(i) {
            if element != 1 {
                let factor = field.inverse(element).ok_or_else(zero_element)?;
                let ones = row_ones_scaled(improved.row(i), factor, field);
                if ones < best_ones {
                    best_ones = ones;
                    best_factor = Some(factor);
                }
            }
        }

        if let Some(factor) = best_factor {
            for value in improved.row_mut(i) {
                *value = field.multiply(*value, factor);
            }
        }
    }

    let after = matrix_ones(&improved, field);
    if after <= before {
        debug!("Cauchy improvement: {before} -> {after} bitmatrix ones");
        *matrix = improved;
    } else {
        debug!("Cauchy improvement would raise ones from {before} to {after}, keeping input");
    }
    Ok(())
}

/// Cauchy matrix tuned for a sparse bitmatrix
///
/// For `m = 2` and `w <= 16` the first row is parity and the second row holds the
/// `k` nonzero elements with the fewest bitmatrix ones. Otherwise this is the
/// original Cauchy matrix after [`improve_coding_matrix`].
pub fn good_general_coding_matrix(k: usize, m: usize, field: &dyn FieldService) -> Result<Matrix> {
    let w = field.w();
    check_size(k, m, w)?;

    if m == 2 && w <= 16 && (k as u64) < (1u64 << w) {
        let mut candidates: Vec<(usize, u32)> = (1..1u32 << w)
            .map(|v| (n_ones(v, field), v))
            .collect();
        candidates.sort_unstable();

        let mut matrix = Matrix::new(2, k, w);
        for (j, &(_, element)) in candidates.iter().take(k).enumerate() {
            matrix.set(0, j, 1);
            matrix.set(1, j, element);
        }
        debug!(
            "Built RAID-6 Cauchy matrix for k={k} w={w} with {} bitmatrix ones",
            matrix_ones(&matrix, field)
        );
        return Ok(matrix);
    }

    let mut matrix = original_coding_matrix(k, m, field)?;
    improve_coding_matrix(&mut matrix, field)?;
    Ok(matrix)
}
