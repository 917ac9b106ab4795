//! Reed-Solomon coding matrices
//!
//! - Vandermonde: an extended Vandermonde matrix is column-reduced so its top `k`
//!   rows become the identity, then scaled so the first coding row and the first
//!   coding column are all ones. Any `k + m <= 2^w` works.
//! - RAID-6 (`m = 2`): row 0 is plain parity, row 1 weights data unit `j` by `2^j`.

use crate::error::{CodingError, Result};
use crate::galois::{region_xor, FieldService};
use crate::matrix::Matrix;
use crate::stats;
use log::debug;
use std::ops::Range;

fn field_size(w: u32) -> u64 {
    1u64 << w
}

fn check_counts(k: usize, m: usize) -> Result<()> {
    if k == 0 || m == 0 {
        return Err(CodingError::BadParameters(format!(
            "need at least one data and one coding unit, got k={k} m={m}"
        )));
    }
    Ok(())
}

/// `rows x cols` extended Vandermonde matrix
///
/// Row 0 is `[1, 0, ..., 0]`, the last row is `[0, ..., 0, 1]`, and row `i` in
/// between is `[1, i, i^2, ..., i^(cols-1)]`.
pub fn extended_vandermonde_matrix(
    rows: usize,
    cols: usize,
    field: &dyn FieldService,
) -> Result<Matrix> {
    let w = field.w();
    if rows as u64 > field_size(w) {
        return Err(CodingError::BadParameters(format!(
            "{rows} rows exceed the {} elements of GF(2^{w})",
            field_size(w)
        )));
    }

    let mut matrix = Matrix::new(rows, cols, w);
    if rows == 0 || cols == 0 {
        return Ok(matrix);
    }

    matrix.set(0, 0, 1);
    if rows == 1 {
        return Ok(matrix);
    }
    matrix.set(rows - 1, cols - 1, 1);

    for i in 1..rows - 1 {
        let mut power = 1u32;
        for j in 0..cols {
            matrix.set(i, j, power);
            power = field.multiply(power, i as u32);
        }
    }
    Ok(matrix)
}

fn scale_column(
    matrix: &mut Matrix,
    col: usize,
    rows: Range<usize>,
    factor: u32,
    field: &dyn FieldService,
) {
    for row in rows {
        let value = field.multiply(matrix.get(row, col), factor);
        matrix.set(row, col, value);
    }
}

/// `rows x cols` distribution matrix with the identity on top
///
/// Column operations on the extended Vandermonde matrix keep every `cols`-row
/// subset invertible. Row `cols` ends up all ones and every later row starts
/// with a one.
pub fn big_vandermonde_distribution_matrix(
    rows: usize,
    cols: usize,
    field: &dyn FieldService,
) -> Result<Matrix> {
    if cols == 0 || cols >= rows {
        return Err(CodingError::BadParameters(format!(
            "distribution matrix needs more rows than columns, got {rows}x{cols}"
        )));
    }

    let mut dist = extended_vandermonde_matrix(rows, cols, field)?;
    let singular = || CodingError::SingularMatrix { size: cols };

    for i in 1..cols {
        let pivot_row = (i..rows)
            .find(|&j| dist.get(j, i) != 0)
            .ok_or_else(singular)?;
        dist.swap_rows(i, pivot_row);

        let pivot = dist.get(i, i);
        if pivot != 1 {
            let factor = field.inverse(pivot).ok_or_else(singular)?;
            scale_column(&mut dist, i, 0..rows, factor, field);
        }

        // col_j += e * col_i clears row i outside the diagonal
        for j in 0..cols {
            let e = dist.get(i, j);
            if j != i && e != 0 {
                for row in 0..rows {
                    let value = dist.get(row, j) ^ field.multiply(e, dist.get(row, i));
                    dist.set(row, j, value);
                }
            }
        }
    }

    for j in 0..cols {
        let e = dist.get(cols, j);
        if e != 1 {
            let factor = field.inverse(e).ok_or_else(singular)?;
            scale_column(&mut dist, j, cols..rows, factor, field);
        }
    }

    for i in cols + 1..rows {
        let e = dist.get(i, 0);
        if e != 1 {
            let factor = field.inverse(e).ok_or_else(singular)?;
            for value in dist.row_mut(i) {
                *value = field.multiply(*value, factor);
            }
        }
    }

    Ok(dist)
}

/// `m x k` Vandermonde coding matrix; row 0 is all ones
pub fn vandermonde_coding_matrix(k: usize, m: usize, field: &dyn FieldService) -> Result<Matrix> {
    check_counts(k, m)?;
    let dist = big_vandermonde_distribution_matrix(k + m, k, field)?;
    let rows: Vec<usize> = (k..k + m).collect();
    debug!("Built {m}x{k} Vandermonde coding matrix over GF(2^{})", field.w());
    Ok(dist.select_rows(&rows))
}

fn check_r6_field(field: &dyn FieldService) -> Result<()> {
    if !matches!(field.w(), 8 | 16 | 32) {
        return Err(CodingError::BadParameters(format!(
            "RAID-6 coding needs w in {{8, 16, 32}}, got w={}",
            field.w()
        )));
    }
    Ok(())
}

/// `2 x k` RAID-6 coding matrix: parity row, then `2^j`
pub fn r6_coding_matrix(k: usize, field: &dyn FieldService) -> Result<Matrix> {
    check_counts(k, 2)?;
    check_r6_field(field)?;
    if k as u64 + 2 > field_size(field.w()) {
        return Err(CodingError::BadParameters(format!(
            "k={k} is too large for RAID-6 over GF(2^{})",
            field.w()
        )));
    }

    let mut matrix = Matrix::new(2, k, field.w());
    let mut power = 1u32;
    for j in 0..k {
        matrix.set(0, j, 1);
        matrix.set(1, j, power);
        power = field.multiply(power, 2);
    }
    Ok(matrix)
}

/// Encode with the RAID-6 matrix without a general dot product
///
/// `coding[0]` is the XOR of the data; `coding[1]` is evaluated Horner-style,
/// doubling the running sum before folding in each data unit from last to first.
pub fn r6_encode(
    k: usize,
    field: &dyn FieldService,
    data: &[&[u8]],
    coding: &mut [&mut [u8]],
) -> Result<()> {
    check_counts(k, 2)?;
    check_r6_field(field)?;
    if data.len() != k || coding.len() != 2 {
        return Err(CodingError::BadParameters(format!(
            "RAID-6 encode needs {k} data and 2 coding units, got {} and {}",
            data.len(),
            coding.len()
        )));
    }
    let size = data[0].len();
    if let Some(bad) = data
        .iter()
        .map(|d| d.len())
        .chain(coding.iter().map(|c| c.len()))
        .find(|&len| len != size)
    {
        return Err(CodingError::LengthMismatch {
            expected: size,
            actual: bad,
        });
    }
    let word_bytes = (field.w() / 8) as usize;
    if size % word_bytes != 0 {
        return Err(CodingError::Alignment {
            what: "unit size",
            size,
            multiple: word_bytes,
        });
    }

    let (p, q) = coding.split_at_mut(1);
    let (p, q) = (&mut *p[0], &mut *q[0]);

    p.copy_from_slice(data[0]);
    stats::add_copy(size);
    for unit in &data[1..] {
        region_xor(unit, p);
        stats::add_xor(size);
    }

    q.copy_from_slice(data[k - 1]);
    stats::add_copy(size);
    let mut scratch = vec![0u8; size];
    for unit in data[..k - 1].iter().rev() {
        scratch.copy_from_slice(q);
        field.region_multiply(&scratch, q, 2, false)?;
        stats::add_multiply(size);
        region_xor(unit, q);
        stats::add_xor(size);
    }

    Ok(())
}
