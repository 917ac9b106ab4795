//! XOR-only RAID-6 codes built directly as bitmatrices
//!
//! All three families have `m = 2` and produce a `2w x kw` bitmatrix. The top `w`
//! rows are identity blocks (plain parity); the bottom `w` rows hold one
//! permutation-like block per data unit:
//!
//! - Liberation: block `j` is the cyclic shift by `j` plus one extra bit, `w` prime.
//! - Blaum-Roth: arithmetic modulo `p = w + 1`, `p` prime.
//! - Liber8tion: fixed blocks for `w = 8`.

use crate::bitmatrix::BitMatrix;
use crate::error::{CodingError, Result};

pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2u32;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

fn check_k(k: usize, w: u32, code: &str) -> Result<()> {
    if k == 0 || k > w as usize {
        return Err(CodingError::BadParameters(format!(
            "{code} needs 1 <= k <= w, got k={k} w={w}"
        )));
    }
    Ok(())
}

/// Bitmatrix with the identity blocks of the parity row filled in
fn parity_rows(k: usize, w: usize) -> BitMatrix {
    let mut matrix = BitMatrix::new(2 * w, k * w);
    for i in 0..w {
        for j in 0..k {
            matrix.set(i, j * w + i, true);
        }
    }
    matrix
}

/// Liberation code bitmatrix; `w` must be prime and `k <= w`
pub fn liberation_coding_bitmatrix(k: usize, w: u32) -> Result<BitMatrix> {
    check_k(k, w, "Liberation")?;
    if !is_prime(w) {
        return Err(CodingError::BadParameters(format!(
            "Liberation needs a prime w, got w={w}"
        )));
    }

    let w = w as usize;
    let mut matrix = parity_rows(k, w);
    for j in 0..k {
        for i in 0..w {
            matrix.set(w + i, j * w + (j + i) % w, true);
        }
        if j > 0 {
            let i = (j * ((w - 1) / 2)) % w;
            matrix.set(w + i, j * w + (i + j - 1) % w, true);
        }
    }
    Ok(matrix)
}

/// Blaum-Roth code bitmatrix; `w + 1` must be prime and `k <= w`
pub fn blaum_roth_coding_bitmatrix(k: usize, w: u32) -> Result<BitMatrix> {
    check_k(k, w, "Blaum-Roth")?;
    if !is_prime(w + 1) {
        return Err(CodingError::BadParameters(format!(
            "Blaum-Roth needs w + 1 prime, got w={w}"
        )));
    }

    let w = w as usize;
    let p = w + 1;
    let mut matrix = parity_rows(k, w);
    for l in 0..w {
        matrix.set(w + l, l, true);
    }
    for j in 1..k {
        for l in 1..=w {
            let row = w + l - 1;
            if l != p - j {
                let col = (l + j) % p - 1;
                matrix.set(row, j * w + col, true);
            } else {
                matrix.set(row, j * w + j - 1, true);
                let col = if j % 2 == 0 { j / 2 } else { p / 2 + 1 + j / 2 };
                matrix.set(row, j * w + col - 1, true);
            }
        }
    }
    Ok(matrix)
}

/// Row `r` of block `j` has its bit in column `LIBER8TION_BLOCKS[j][r]`
const LIBER8TION_BLOCKS: [[usize; 8]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7],
    [7, 3, 0, 2, 6, 1, 5, 4],
    [6, 2, 4, 0, 7, 3, 1, 5],
    [2, 5, 7, 6, 0, 3, 4, 1],
    [5, 6, 1, 7, 2, 4, 3, 0],
    [1, 2, 3, 4, 5, 6, 7, 0],
    [3, 0, 6, 5, 1, 7, 4, 2],
    [4, 7, 1, 5, 3, 2, 0, 6],
];

/// Extra `(row, column)` bit of block `j`; block 0 has none
const LIBER8TION_EXTRA: [Option<(usize, usize)>; 8] = [
    None,
    Some((4, 7)),
    Some((1, 3)),
    Some((5, 4)),
    Some((2, 0)),
    Some((7, 2)),
    Some((6, 5)),
    Some((3, 1)),
];

/// Liber8tion code bitmatrix (`w = 8`, `k <= 8`)
pub fn liber8tion_coding_bitmatrix(k: usize) -> Result<BitMatrix> {
    check_k(k, 8, "Liber8tion")?;

    let w = 8;
    let mut matrix = parity_rows(k, w);
    for j in 0..k {
        for (row, &col) in LIBER8TION_BLOCKS[j].iter().enumerate() {
            matrix.set(w + row, j * w + col, true);
        }
        if let Some((row, col)) = LIBER8TION_EXTRA[j] {
            matrix.set(w + row, j * w + col, true);
        }
    }
    Ok(matrix)
}
