//! Construction Tests
//!
//! Coding matrices and bitmatrices built by each code family: parameter limits,
//! structural properties and agreement between equivalent constructions.

use erasure_coder::codes::{cauchy, liberation, reed_sol, CodeTechnique};
use erasure_coder::engine::matrix_encode;
use erasure_coder::{
    matrix_to_bitmatrix, CodingError, FieldRegistry, FieldService, GaloisField, Matrix,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Reed-Solomon
// ============================================================================

#[test]
fn test_vandermonde_fills_the_field_exactly() {
    for w in [3u32, 4] {
        let gf = GaloisField::new(w).unwrap();
        let n = 1usize << w;
        let matrix = reed_sol::vandermonde_coding_matrix(n - 2, 2, &gf).unwrap();
        assert_eq!((matrix.rows(), matrix.cols()), (2, n - 2));

        assert!(matches!(
            reed_sol::vandermonde_coding_matrix(n - 1, 2, &gf),
            Err(CodingError::BadParameters(_))
        ));
    }
}

#[test]
fn test_vandermonde_first_row_is_parity() {
    let gf = GaloisField::new(8).unwrap();
    let matrix = reed_sol::vandermonde_coding_matrix(6, 3, &gf).unwrap();
    assert!(matrix.row(0).iter().all(|&v| v == 1));
    for i in 1..3 {
        assert_eq!(matrix.get(i, 0), 1);
    }
}

#[test]
fn test_extended_vandermonde_shape() {
    let gf = GaloisField::new(4).unwrap();
    let matrix = reed_sol::extended_vandermonde_matrix(5, 3, &gf).unwrap();
    assert_eq!(matrix.row(0), &[1, 0, 0]);
    assert_eq!(matrix.row(1), &[1, 1, 1]);
    assert_eq!(matrix.row(2), &[1, 2, 4]);
    assert_eq!(matrix.row(3), &[1, 3, 5]);
    assert_eq!(matrix.row(4), &[0, 0, 1]);
}

#[test]
fn test_big_vandermonde_top_is_identity() {
    let gf = GaloisField::new(8).unwrap();
    let dist = reed_sol::big_vandermonde_distribution_matrix(7, 4, &gf).unwrap();
    for i in 0..4 {
        for j in 0..4 {
            assert_eq!(dist.get(i, j), u32::from(i == j));
        }
    }
    assert!(reed_sol::big_vandermonde_distribution_matrix(4, 4, &gf).is_err());
}

#[test]
fn test_r6_matrix() {
    let gf = GaloisField::new(16).unwrap();
    let matrix = reed_sol::r6_coding_matrix(5, &gf).unwrap();
    assert_eq!(matrix.row(0), &[1, 1, 1, 1, 1]);
    assert_eq!(matrix.row(1), &[1, 2, 4, 8, 16]);

    let gf = GaloisField::new(7).unwrap();
    assert!(matches!(
        reed_sol::r6_coding_matrix(5, &gf),
        Err(CodingError::BadParameters(_))
    ));
}

#[test]
fn test_r6_encode_agrees_with_matrix_encode() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for w in [8u32, 16, 32] {
        let gf = GaloisField::new(w).unwrap();
        let k = 5;
        let size = 64;
        let matrix = reed_sol::r6_coding_matrix(k, &gf).unwrap();

        let data: Vec<Vec<u8>> = (0..k)
            .map(|_| {
                let mut unit = vec![0u8; size];
                rng.fill(&mut unit[..]);
                unit
            })
            .collect();
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();

        let mut expected = vec![vec![0u8; size]; 2];
        let mut actual = vec![vec![0u8; size]; 2];
        {
            let mut coding: Vec<&mut [u8]> =
                expected.iter_mut().map(Vec::as_mut_slice).collect();
            matrix_encode(&matrix, &gf, &data_refs, &mut coding).unwrap();
        }
        {
            let mut coding: Vec<&mut [u8]> = actual.iter_mut().map(Vec::as_mut_slice).collect();
            reed_sol::r6_encode(k, &gf, &data_refs, &mut coding).unwrap();
        }
        assert_eq!(actual, expected, "w={w}");
    }
}

// ============================================================================
// Cauchy
// ============================================================================

#[test]
fn test_cauchy_original_matches_explicit_sets() {
    for (k, m, w) in [(4, 2, 8), (5, 3, 4), (3, 3, 5), (10, 4, 16)] {
        let gf = GaloisField::new(w).unwrap();
        let x: Vec<u32> = (0..m as u32).collect();
        let y: Vec<u32> = (m as u32..(m + k) as u32).collect();
        assert_eq!(
            cauchy::original_coding_matrix(k, m, &gf).unwrap(),
            cauchy::xy_coding_matrix(k, m, &gf, &x, &y).unwrap()
        );
    }
}

#[test]
fn test_cauchy_xy_rejects_bad_sets() {
    let gf = GaloisField::new(4).unwrap();
    assert!(cauchy::xy_coding_matrix(2, 2, &gf, &[0, 1], &[1, 2]).is_err());
    assert!(cauchy::xy_coding_matrix(2, 2, &gf, &[0, 1], &[2, 16]).is_err());
    assert!(cauchy::xy_coding_matrix(2, 2, &gf, &[0], &[2, 3]).is_err());
    assert!(cauchy::original_coding_matrix(15, 2, &gf).is_err());
}

#[test]
fn test_cauchy_entries_are_reciprocals() {
    let gf = GaloisField::new(8).unwrap();
    let x = [3u32, 7];
    let y = [10u32, 20, 30];
    let matrix = cauchy::xy_coding_matrix(3, 2, &gf, &x, &y).unwrap();
    for (i, &xi) in x.iter().enumerate() {
        for (j, &yj) in y.iter().enumerate() {
            assert_eq!(gf.multiply(matrix.get(i, j), xi ^ yj), 1);
        }
    }
}

#[test]
fn test_n_ones() {
    let gf = GaloisField::new(8).unwrap();
    assert_eq!(cauchy::n_ones(0, &gf), 0);
    assert_eq!(cauchy::n_ones(1, &gf), 8);
    let bitmatrix =
        matrix_to_bitmatrix(&Matrix::from_rows(8, &[vec![0x53]]).unwrap(), &gf).unwrap();
    assert_eq!(cauchy::n_ones(0x53, &gf), bitmatrix.ones());
}

#[test]
fn test_cauchy_improve_does_not_add_ones() {
    for (k, m, w) in [(4, 2, 8), (6, 3, 4), (8, 4, 8), (3, 2, 3)] {
        let gf = GaloisField::new(w).unwrap();
        let original = cauchy::original_coding_matrix(k, m, &gf).unwrap();
        let mut improved = original.clone();
        cauchy::improve_coding_matrix(&mut improved, &gf).unwrap();

        assert!(cauchy::matrix_ones(&improved, &gf) <= cauchy::matrix_ones(&original, &gf));
    }
}

#[test]
fn test_cauchy_good_for_two_coding_units() {
    let gf = GaloisField::new(8).unwrap();
    let good = cauchy::good_general_coding_matrix(6, 2, &gf).unwrap();
    assert!(good.row(0).iter().all(|&v| v == 1));

    let mut second: Vec<u32> = good.row(1).to_vec();
    second.sort_unstable();
    second.dedup();
    assert_eq!(second.len(), 6);
    assert!(second.iter().all(|&v| v != 0));

    let mut improved = cauchy::original_coding_matrix(6, 2, &gf).unwrap();
    cauchy::improve_coding_matrix(&mut improved, &gf).unwrap();
    assert!(cauchy::matrix_ones(&good, &gf) <= cauchy::matrix_ones(&improved, &gf));
}

// ============================================================================
// XOR-only codes
// ============================================================================

#[test]
fn test_liberation_parameters() {
    assert!(liberation::liberation_coding_bitmatrix(5, 7).is_ok());
    assert!(liberation::liberation_coding_bitmatrix(7, 7).is_ok());
    assert!(matches!(
        liberation::liberation_coding_bitmatrix(8, 7),
        Err(CodingError::BadParameters(_))
    ));
    assert!(matches!(
        liberation::liberation_coding_bitmatrix(3, 9),
        Err(CodingError::BadParameters(_))
    ));
}

#[test]
fn test_liberation_second_row_weight() {
    // kw ones for the diagonals plus one extra bit per data unit but the first
    let k = 5;
    let w = 7;
    let bitmatrix = liberation::liberation_coding_bitmatrix(k, w).unwrap();
    assert_eq!(bitmatrix.rows(), 2 * w as usize);
    assert_eq!(bitmatrix.cols(), k * w as usize);
    assert_eq!(bitmatrix.ones(), 2 * k * w as usize + k - 1);
}

#[test]
fn test_blaum_roth_parameters() {
    assert!(liberation::blaum_roth_coding_bitmatrix(4, 4).is_ok());
    assert!(liberation::blaum_roth_coding_bitmatrix(6, 6).is_ok());
    assert!(matches!(
        liberation::blaum_roth_coding_bitmatrix(3, 5),
        Err(CodingError::BadParameters(_))
    ));
}

#[test]
fn test_liber8tion_parameters() {
    let bitmatrix = liberation::liber8tion_coding_bitmatrix(8).unwrap();
    assert_eq!((bitmatrix.rows(), bitmatrix.cols()), (16, 64));
    assert!(liberation::liber8tion_coding_bitmatrix(9).is_err());

    let registry = FieldRegistry::new();
    assert!(CodeTechnique::Liber8tion
        .build_bitmatrix(4, 2, 7, &registry)
        .is_err());
}

// ============================================================================
// Technique dispatch
// ============================================================================

#[test]
fn test_technique_names_round_trip() {
    for technique in CodeTechnique::ALL {
        assert_eq!(technique.name().parse::<CodeTechnique>().unwrap(), technique);
    }
    assert!("reed_sol_r7".parse::<CodeTechnique>().is_err());
}

#[test]
fn test_xor_codes_have_no_matrix() {
    let gf = GaloisField::new(8).unwrap();
    for technique in CodeTechnique::ALL.into_iter().filter(|t| t.is_xor_only()) {
        assert!(matches!(
            technique.build_matrix(4, 2, &gf),
            Err(CodingError::UnsupportedConfiguration(_))
        ));
    }
}

#[test]
fn test_scalar_bitmatrix_matches_expansion() {
    let registry = FieldRegistry::new();
    let field = registry.field(5).unwrap();
    let matrix = CodeTechnique::CauchyImproved
        .build_matrix(4, 3, field.as_ref())
        .unwrap();
    let bitmatrix = CodeTechnique::CauchyImproved
        .build_bitmatrix(4, 3, 5, &registry)
        .unwrap();
    assert_eq!(bitmatrix, matrix_to_bitmatrix(&matrix, field.as_ref()).unwrap());
    assert_eq!((bitmatrix.rows(), bitmatrix.cols()), (15, 20));
}

// ============================================================================
// Inversion
// ============================================================================

#[test]
fn test_invert_times_original_is_identity() {
    let gf = GaloisField::new(8).unwrap();
    let dist = reed_sol::big_vandermonde_distribution_matrix(8, 4, &gf).unwrap();
    let system = dist.select_rows(&[1, 4, 6, 7]);
    let inverse = system.clone().invert(&gf).unwrap();
    assert_eq!(system.multiply(&inverse, &gf).unwrap(), Matrix::identity(4, 8));
}

#[test]
fn test_invert_singular() {
    let gf = GaloisField::new(8).unwrap();
    let matrix = Matrix::from_rows(8, &[vec![1, 2, 3], vec![2, 4, 6], vec![0, 0, 1]]).unwrap();
    assert!(!matrix.clone().is_invertible(&gf));
    assert!(matches!(
        matrix.invert(&gf),
        Err(CodingError::SingularMatrix { .. })
    ));
}
