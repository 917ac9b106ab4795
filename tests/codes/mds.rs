//! MDS Tests
//!
//! Every `k` of the `k + m` units must determine the data: every `k`-row subset
//! of the distribution matrix (or `k` unit blocks of the distribution bitmatrix)
//! is invertible.

use erasure_coder::codes::{is_mds, is_mds_bitmatrix, CodeTechnique};
use erasure_coder::{BitMatrix, FieldRegistry, Matrix};

fn assert_matrix_mds(technique: CodeTechnique, k: usize, m: usize, w: u32) {
    let registry = FieldRegistry::new();
    let field = registry.field(w).unwrap();
    let matrix = technique.build_matrix(k, m, field.as_ref()).unwrap();
    assert!(
        is_mds(&matrix, field.as_ref()),
        "{technique} k={k} m={m} w={w} is not MDS:\n{matrix}"
    );
}

fn assert_bitmatrix_mds(technique: CodeTechnique, k: usize, m: usize, w: u32) {
    let registry = FieldRegistry::new();
    let bitmatrix = technique.build_bitmatrix(k, m, w, &registry).unwrap();
    assert!(
        is_mds_bitmatrix(&bitmatrix, k, w as usize),
        "{technique} k={k} w={w} is not MDS:\n{}",
        bitmatrix.render(w as usize)
    );
}

#[test]
fn test_vandermonde_is_mds() {
    for w in [4u32, 8] {
        for k in 1..=6 {
            for m in 1..=3 {
                assert_matrix_mds(CodeTechnique::ReedSolVandermonde, k, m, w);
            }
        }
    }
    // uses every element of GF(2^3)
    assert_matrix_mds(CodeTechnique::ReedSolVandermonde, 5, 3, 3);
}

#[test]
fn test_r6_is_mds() {
    for k in 1..=8 {
        assert_matrix_mds(CodeTechnique::ReedSolR6, k, 2, 8);
    }
    assert_matrix_mds(CodeTechnique::ReedSolR6, 6, 2, 16);
}

#[test]
fn test_cauchy_family_is_mds() {
    for technique in [
        CodeTechnique::CauchyOriginal,
        CodeTechnique::CauchyImproved,
        CodeTechnique::CauchyGood,
    ] {
        for (k, m, w) in [(2, 2, 3), (4, 2, 4), (6, 3, 4), (5, 4, 8), (7, 2, 8), (3, 3, 5)] {
            assert_matrix_mds(technique, k, m, w);
        }
    }
}

#[test]
fn test_cauchy_bitmatrices_are_mds() {
    for technique in [CodeTechnique::CauchyOriginal, CodeTechnique::CauchyGood] {
        assert_bitmatrix_mds(technique, 4, 2, 4);
        assert_bitmatrix_mds(technique, 3, 3, 5);
    }
}

#[test]
fn test_liberation_is_mds() {
    for w in [3u32, 5, 7] {
        for k in 1..=w as usize {
            assert_bitmatrix_mds(CodeTechnique::Liberation, k, 2, w);
        }
    }
}

#[test]
fn test_blaum_roth_is_mds() {
    for w in [2u32, 4, 6] {
        for k in 1..=w as usize {
            assert_bitmatrix_mds(CodeTechnique::BlaumRoth, k, 2, w);
        }
    }
}

#[test]
fn test_liber8tion_is_mds() {
    for k in 1..=8 {
        assert_bitmatrix_mds(CodeTechnique::Liber8tion, k, 2, 8);
    }
}

#[test]
fn test_non_mds_detected() {
    let registry = FieldRegistry::new();
    let field = registry.field(8).unwrap();
    let repeated = Matrix::from_rows(8, &[vec![1, 1, 1], vec![1, 1, 2]]).unwrap();
    assert!(!is_mds(&repeated, field.as_ref()));

    // two data units, the coding unit only sees the first
    let mut bitmatrix = BitMatrix::new(2, 4);
    bitmatrix.set(0, 0, true);
    bitmatrix.set(1, 1, true);
    assert!(!is_mds_bitmatrix(&bitmatrix, 2, 2));
}
