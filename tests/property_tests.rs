//! Property-based tests for code construction and the encode paths
//!
//! Bitmatrix expansion and schedule compilation must not change what a code
//! computes, and the Cauchy constructions must agree with each other.

use erasure_coder::codes::{cauchy, is_mds, CodeTechnique};
use erasure_coder::engine::{bitmatrix_encode, matrix_decode, matrix_encode, schedule_encode};
use erasure_coder::schedule::{dumb_schedule, smart_schedule};
use erasure_coder::{matrix_to_bitmatrix, BitMatrix, FieldRegistry, GaloisField};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SCALAR_CODES: [CodeTechnique; 4] = [
    CodeTechnique::ReedSolVandermonde,
    CodeTechnique::CauchyOriginal,
    CodeTechnique::CauchyImproved,
    CodeTechnique::CauchyGood,
];

fn random_units(count: usize, size: usize, rng: &mut StdRng) -> Vec<Vec<u8>> {
    (0..count)
        .map(|_| {
            let mut unit = vec![0u8; size];
            rng.fill(&mut unit[..]);
            unit
        })
        .collect()
}

/// Byte-word layout (w = 8) to bit-plane layout
///
/// Within each chunk of `8 * packetsize` words, bit `j` of word `t` moves to bit
/// `t` of packet `j`.
fn to_bit_planes(words: &[u8], packetsize: usize) -> Vec<u8> {
    let chunk = 8 * packetsize;
    let mut planes = vec![0u8; words.len()];
    for (c, block) in words.chunks(chunk).enumerate() {
        for (t, &word) in block.iter().enumerate() {
            for j in 0..8 {
                if (word >> j) & 1 == 1 {
                    planes[c * chunk + j * packetsize + t / 8] |= 1 << (t % 8);
                }
            }
        }
    }
    planes
}

fn encode_with_schedule(
    k: usize,
    w: usize,
    schedule: &erasure_coder::Schedule,
    data: &[Vec<u8>],
    m: usize,
    packetsize: usize,
) -> Vec<Vec<u8>> {
    let size = data[0].len();
    let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
    let mut coding = vec![vec![0xFFu8; size]; m];
    {
        let mut coding_refs: Vec<&mut [u8]> = coding.iter_mut().map(Vec::as_mut_slice).collect();
        schedule_encode(k, w, schedule, &data_refs, &mut coding_refs, packetsize).unwrap();
    }
    coding
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the matrix path and the bitmatrix path compute the same code,
    /// once words are laid out as bit planes
    #[test]
    fn prop_bitmatrix_matches_matrix(
        technique in prop::sample::select(SCALAR_CODES.to_vec()),
        k in 1usize..=6,
        m in 1usize..=3,
        chunks in 1usize..=3,
        seed in any::<u64>(),
    ) {
        let packetsize = 8;
        let size = 8 * packetsize * chunks;
        let gf = GaloisField::new(8).unwrap();
        let matrix = technique.build_matrix(k, m, &gf).unwrap();
        let bitmatrix = matrix_to_bitmatrix(&matrix, &gf).unwrap();

        let mut rng = StdRng::seed_from_u64(seed);
        let data = random_units(k, size, &mut rng);
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let mut words = vec![vec![0u8; size]; m];
        {
            let mut coding: Vec<&mut [u8]> = words.iter_mut().map(Vec::as_mut_slice).collect();
            matrix_encode(&matrix, &gf, &data_refs, &mut coding).unwrap();
        }

        let planes: Vec<Vec<u8>> = data.iter().map(|d| to_bit_planes(d, packetsize)).collect();
        let plane_refs: Vec<&[u8]> = planes.iter().map(Vec::as_slice).collect();
        let mut coded_planes = vec![vec![0u8; size]; m];
        {
            let mut coding: Vec<&mut [u8]> =
                coded_planes.iter_mut().map(Vec::as_mut_slice).collect();
            bitmatrix_encode(&bitmatrix, 8, &plane_refs, &mut coding, packetsize).unwrap();
        }

        for (word_unit, plane_unit) in words.iter().zip(&coded_planes) {
            prop_assert_eq!(&to_bit_planes(word_unit, packetsize), plane_unit);
        }
    }

    /// Property: dumb and smart schedules compute the same coding units, and the
    /// smart one never needs more operations
    #[test]
    fn prop_smart_schedule_matches_dumb(
        k in 1usize..=5,
        m in 1usize..=3,
        w in 1usize..=6,
        bits in prop::collection::vec(any::<bool>(), 5 * 3 * 6 * 6),
        seed in any::<u64>(),
    ) {
        let mut bitmatrix = BitMatrix::new(m * w, k * w);
        for row in 0..m * w {
            for col in 0..k * w {
                bitmatrix.set(row, col, bits[row * k * w + col]);
            }
        }
        let dumb = dumb_schedule(k, w, &bitmatrix).unwrap();
        let smart = smart_schedule(k, w, &bitmatrix).unwrap();
        prop_assert!(smart.len() <= dumb.len());

        let packetsize = 8;
        let mut rng = StdRng::seed_from_u64(seed);
        let data = random_units(k, w * packetsize * 2, &mut rng);
        let from_dumb = encode_with_schedule(k, w, &dumb, &data, m, packetsize);
        let from_smart = encode_with_schedule(k, w, &smart, &data, m, packetsize);
        prop_assert_eq!(&from_dumb, &from_smart);

        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        // stale bytes in the coding buffers must not survive
        let mut direct = vec![vec![0x5Au8; data[0].len()]; m];
        {
            let mut coding: Vec<&mut [u8]> = direct.iter_mut().map(Vec::as_mut_slice).collect();
            bitmatrix_encode(&bitmatrix, w, &data_refs, &mut coding, packetsize).unwrap();
        }
        prop_assert_eq!(&from_dumb, &direct);
    }

    /// Property: the original Cauchy matrix is the XY construction with
    /// X = {0..m} and Y = {m..m+k}
    #[test]
    fn prop_cauchy_original_is_xy(
        w in 3u32..=12,
        k in 1usize..=6,
        m in 1usize..=4,
    ) {
        let gf = GaloisField::new(w).unwrap();
        let x: Vec<u32> = (0..m as u32).collect();
        let y: Vec<u32> = (m as u32..(m + k) as u32).collect();
        prop_assert_eq!(
            cauchy::original_coding_matrix(k, m, &gf).unwrap(),
            cauchy::xy_coding_matrix(k, m, &gf, &x, &y).unwrap()
        );
    }

    /// Property: improving a Cauchy matrix never adds ones and keeps it MDS
    #[test]
    fn prop_cauchy_improve_non_regression(
        w in 3u32..=8,
        k in 1usize..=5,
        m in 1usize..=3,
        x_seed in any::<u64>(),
    ) {
        let gf = GaloisField::new(w).unwrap();
        // k + m distinct elements in random order
        let mut rng = StdRng::seed_from_u64(x_seed);
        let mut elements: Vec<u32> = (0..1u32 << w).collect();
        for i in (1..elements.len()).rev() {
            elements.swap(i, rng.random_range(0..=i));
        }
        let (x, rest) = elements.split_at(m);
        let y = &rest[..k];

        let original = cauchy::xy_coding_matrix(k, m, &gf, x, y).unwrap();
        let mut improved = original.clone();
        cauchy::improve_coding_matrix(&mut improved, &gf).unwrap();

        prop_assert!(cauchy::matrix_ones(&improved, &gf) <= cauchy::matrix_ones(&original, &gf));
        prop_assert!(is_mds(&improved, &gf));
    }

    /// Property: matrix-mode decode restores any recoverable erasure pattern
    #[test]
    fn prop_matrix_decode_restores_units(
        technique in prop::sample::select(SCALAR_CODES.to_vec()),
        k in 2usize..=6,
        m in 1usize..=3,
        erasure_seed in any::<u64>(),
        seed in any::<u64>(),
    ) {
        let registry = FieldRegistry::new();
        let field = registry.field(16).unwrap();
        let matrix = technique.build_matrix(k, m, field.as_ref()).unwrap();
        let row_k_ones = matrix.row(0).iter().all(|&v| v == 1);

        let mut rng = StdRng::seed_from_u64(seed);
        let size = 32;
        let mut data = random_units(k, size, &mut rng);
        let mut coding = vec![vec![0u8; size]; m];
        {
            let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
            let mut coding_refs: Vec<&mut [u8]> =
                coding.iter_mut().map(Vec::as_mut_slice).collect();
            matrix_encode(&matrix, field.as_ref(), &data_refs, &mut coding_refs).unwrap();
        }
        let (data_before, coding_before) = (data.clone(), coding.clone());

        let mut erasure_rng = StdRng::seed_from_u64(erasure_seed);
        let count = erasure_rng.random_range(1..=m);
        let mut ids: Vec<usize> = (0..k + m).collect();
        for i in (1..ids.len()).rev() {
            ids.swap(i, erasure_rng.random_range(0..=i));
        }
        let erasures = &ids[..count];
        for &id in erasures {
            if id < k {
                data[id].fill(0);
            } else {
                coding[id - k].fill(0);
            }
        }

        {
            let mut data_refs: Vec<&mut [u8]> = data.iter_mut().map(Vec::as_mut_slice).collect();
            let mut coding_refs: Vec<&mut [u8]> =
                coding.iter_mut().map(Vec::as_mut_slice).collect();
            matrix_decode(
                &matrix,
                field.as_ref(),
                row_k_ones,
                erasures,
                &mut data_refs,
                &mut coding_refs,
            )
            .unwrap();
        }
        prop_assert_eq!(data, data_before);
        prop_assert_eq!(coding, coding_before);
    }
}
