//! Code families and matrix construction
//!
//! [`CodeTechnique`] is the closed set of supported codes. Scalar codes produce an
//! `m x k` matrix over GF(2^w) (and a bitmatrix through
//! [`matrix_to_bitmatrix`](crate::bitmatrix::matrix_to_bitmatrix)); the XOR-only
//! RAID-6 codes only exist as bitmatrices.

pub mod cauchy;
pub mod liberation;
pub mod reed_sol;

use crate::bitmatrix::{matrix_to_bitmatrix, BitMatrix};
use crate::error::{CodingError, Result};
use crate::galois::{FieldRegistry, FieldService};
use crate::matrix::Matrix;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeTechnique {
    /// Reed-Solomon over a column-reduced Vandermonde matrix
    ReedSolVandermonde,
    /// Reed-Solomon RAID-6 (`m = 2`, parity plus powers of two)
    ReedSolR6,
    /// Cauchy matrix with `X = {0..m}`, `Y = {m..m+k}`
    CauchyOriginal,
    /// Cauchy original after row/column rescaling
    CauchyImproved,
    /// Cauchy matrix with the sparsest known bitmatrix
    CauchyGood,
    /// Liberation XOR code (`m = 2`, `w` prime)
    Liberation,
    /// Blaum-Roth XOR code (`m = 2`, `w + 1` prime)
    BlaumRoth,
    /// Liber8tion XOR code (`m = 2`, `w = 8`)
    Liber8tion,
}

impl CodeTechnique {
    pub const ALL: [CodeTechnique; 8] = [
        CodeTechnique::ReedSolVandermonde,
        CodeTechnique::ReedSolR6,
        CodeTechnique::CauchyOriginal,
        CodeTechnique::CauchyImproved,
        CodeTechnique::CauchyGood,
        CodeTechnique::Liberation,
        CodeTechnique::BlaumRoth,
        CodeTechnique::Liber8tion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CodeTechnique::ReedSolVandermonde => "reed_sol_van",
            CodeTechnique::ReedSolR6 => "reed_sol_r6_op",
            CodeTechnique::CauchyOriginal => "cauchy_orig",
            CodeTechnique::CauchyImproved => "cauchy_improved",
            CodeTechnique::CauchyGood => "cauchy_good",
            CodeTechnique::Liberation => "liberation",
            CodeTechnique::BlaumRoth => "blaum_roth",
            CodeTechnique::Liber8tion => "liber8tion",
        }
    }

    /// Whether the code has a GF(2^w) coding matrix
    pub fn supports_matrix(&self) -> bool {
        !self.is_xor_only()
    }

    pub fn is_xor_only(&self) -> bool {
        matches!(
            self,
            CodeTechnique::Liberation | CodeTechnique::BlaumRoth | CodeTechnique::Liber8tion
        )
    }

    /// Whether the first coding unit is built as plain parity of the data
    ///
    /// [`improve_coding_matrix`](cauchy::improve_coding_matrix) may keep the
    /// original matrix, so check the built matrix before relying on this.
    pub fn row_k_ones(&self) -> bool {
        !matches!(self, CodeTechnique::CauchyOriginal)
    }

    /// Number of coding units the code is restricted to, if any
    pub fn fixed_m(&self) -> Option<usize> {
        match self {
            CodeTechnique::ReedSolR6
            | CodeTechnique::Liberation
            | CodeTechnique::BlaumRoth
            | CodeTechnique::Liber8tion => Some(2),
            _ => None,
        }
    }

    fn check_m(&self, m: usize) -> Result<()> {
        match self.fixed_m() {
            Some(fixed) if fixed != m => Err(CodingError::BadParameters(format!(
                "{} needs m={fixed}, got m={m}",
                self.name()
            ))),
            _ => Ok(()),
        }
    }

    /// `m x k` coding matrix over `field`
    pub fn build_matrix(&self, k: usize, m: usize, field: &dyn FieldService) -> Result<Matrix> {
        self.check_m(m)?;
        match self {
            CodeTechnique::ReedSolVandermonde => reed_sol::vandermonde_coding_matrix(k, m, field),
            CodeTechnique::ReedSolR6 => reed_sol::r6_coding_matrix(k, field),
            CodeTechnique::CauchyOriginal => cauchy::original_coding_matrix(k, m, field),
            CodeTechnique::CauchyImproved => {
                let mut matrix = cauchy::original_coding_matrix(k, m, field)?;
                cauchy::improve_coding_matrix(&mut matrix, field)?;
                Ok(matrix)
            }
            CodeTechnique::CauchyGood => cauchy::good_general_coding_matrix(k, m, field),
            CodeTechnique::Liberation | CodeTechnique::BlaumRoth | CodeTechnique::Liber8tion => {
                Err(CodingError::UnsupportedConfiguration(format!(
                    "{} has no GF(2^w) coding matrix",
                    self.name()
                )))
            }
        }
    }

    /// `(m*w) x (k*w)` coding bitmatrix
    ///
    /// Scalar codes fetch GF(2^w) from `registry` and expand their matrix.
    pub fn build_bitmatrix(
        &self,
        k: usize,
        m: usize,
        w: u32,
        registry: &FieldRegistry,
    ) -> Result<BitMatrix> {
        self.check_m(m)?;
        match self {
            CodeTechnique::Liberation => liberation::liberation_coding_bitmatrix(k, w),
            CodeTechnique::BlaumRoth => liberation::blaum_roth_coding_bitmatrix(k, w),
            CodeTechnique::Liber8tion => {
                if w != 8 {
                    return Err(CodingError::BadParameters(format!(
                        "liber8tion needs w=8, got w={w}"
                    )));
                }
                liberation::liber8tion_coding_bitmatrix(k)
            }
            _ => {
                let field = registry.field(w)?;
                let matrix = self.build_matrix(k, m, field.as_ref())?;
                matrix_to_bitmatrix(&matrix, field.as_ref())
            }
        }
    }
}

impl fmt::Display for CodeTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodeTechnique {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self> {
        CodeTechnique::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CodingError::BadParameters(format!("unknown coding technique '{s}'")))
    }
}

/// Call `visit` for every `r`-element subset of `0..n`, in lexicographic order
///
/// Stops early and returns false as soon as `visit` does.
pub(crate) fn for_each_combination(
    n: usize,
    r: usize,
    mut visit: impl FnMut(&[usize]) -> bool,
) -> bool {
    if r > n {
        return true;
    }
    let mut indices: Vec<usize> = (0..r).collect();
    loop {
        if !visit(&indices) {
            return false;
        }
        let Some(i) = (0..r).rev().find(|&i| indices[i] != i + n - r) else {
            return true;
        };
        indices[i] += 1;
        for j in i + 1..r {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Whether every `k`-row subset of the distribution matrix is invertible
pub fn is_mds(coding: &Matrix, field: &dyn FieldService) -> bool {
    let k = coding.cols();
    let dist = coding.distribution_matrix();
    for_each_combination(dist.rows(), k, |rows| {
        dist.select_rows(rows).is_invertible(field)
    })
}

/// Whether any `k` of the `k + m` units of a bitmatrix code determine the data
pub fn is_mds_bitmatrix(coding: &BitMatrix, k: usize, w: usize) -> bool {
    if w == 0 || coding.cols() != k * w || coding.rows() % w != 0 {
        return false;
    }
    let dist = coding.distribution_matrix();
    let units = dist.rows() / w;
    for_each_combination(units, k, |chosen| {
        let rows: Vec<usize> = chosen
            .iter()
            .flat_map(|&unit| unit * w..(unit + 1) * w)
            .collect();
        dist.select_rows(&rows).is_invertible()
    })
}
