//! GF(2^w) dot products over whole units

use super::regions::Regions;
use super::{check_matrix_word, erasures_to_erased};
use crate::error::{CodingError, Result};
use crate::galois::FieldService;
use crate::matrix::Matrix;
use log::{debug, trace};
use smallvec::SmallVec;

type UnitIds = SmallVec<[usize; 16]>;

fn check_field(matrix: &Matrix, field: &dyn FieldService) -> Result<()> {
    if matrix.w() != field.w() {
        return Err(CodingError::BadParameters(format!(
            "matrix over GF(2^{}) used with GF(2^{})",
            matrix.w(),
            field.w()
        )));
    }
    Ok(())
}

/// `dest = sum(row[j] * unit[src_ids[j]])`
///
/// Coefficient-one terms are copied or XORed first, the rest go through region
/// multiplies and zero terms are skipped. A row with no nonzero term zeroes `dest`.
pub(crate) fn dotprod(
    regions: &mut Regions<'_, '_, '_>,
    field: &dyn FieldService,
    row: &[u32],
    src_ids: &[usize],
    dest: usize,
) -> Result<()> {
    if row.len() != src_ids.len() {
        return Err(CodingError::BadParameters(format!(
            "{} coefficients for {} source units",
            row.len(),
            src_ids.len()
        )));
    }

    let size = regions.size();
    let mut started = false;
    for (&coef, &src) in row.iter().zip(src_ids) {
        if coef == 1 {
            if started {
                regions.xor(src, 0, dest, 0, size)?;
            } else {
                regions.copy(src, 0, dest, 0, size)?;
                started = true;
            }
        }
    }
    for (&coef, &src) in row.iter().zip(src_ids) {
        if coef > 1 {
            regions.multiply(field, src, dest, coef, started)?;
            started = true;
        }
    }
    if !started {
        regions.zero(dest, 0, size)?;
    }
    Ok(())
}

/// Recompute one unit as a weighted sum of other units
///
/// `src_ids` defaults to the data units `0..k`; `dest_id` may be a data or a
/// coding unit.
pub fn matrix_dotprod(
    k: usize,
    field: &dyn FieldService,
    row: &[u32],
    src_ids: Option<&[usize]>,
    dest_id: usize,
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
) -> Result<()> {
    let m = coding.len();
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_matrix_word(field.w(), regions.size())?;

    let default_ids: UnitIds = (0..k).collect();
    dotprod(
        &mut regions,
        field,
        row,
        src_ids.unwrap_or(&default_ids[..]),
        dest_id,
    )
}

/// Fill every coding unit from the data units
pub fn matrix_encode(
    matrix: &Matrix,
    field: &dyn FieldService,
    data: &[&[u8]],
    coding: &mut [&mut [u8]],
) -> Result<()> {
    check_field(matrix, field)?;
    let (k, m) = (matrix.cols(), matrix.rows());
    let mut regions = Regions::for_encode(k, m, data, coding)?;
    check_matrix_word(field.w(), regions.size())?;

    let src_ids: UnitIds = (0..k).collect();
    for i in 0..m {
        dotprod(&mut regions, field, matrix.row(i), &src_ids, k + i)?;
    }
    Ok(())
}

/// Invert the rows of the first `k` surviving units
///
/// Returns the `k x k` decoding matrix and the unit backing each of its columns.
pub fn make_decoding_matrix(
    matrix: &Matrix,
    erased: &[bool],
    field: &dyn FieldService,
) -> Result<(Matrix, Vec<usize>)> {
    check_field(matrix, field)?;
    let k = matrix.cols();
    let dm_ids: Vec<usize> = erased
        .iter()
        .enumerate()
        .filter(|(_, &e)| !e)
        .map(|(i, _)| i)
        .take(k)
        .collect();
    if dm_ids.len() < k {
        return Err(CodingError::TooManyErasures {
            erased: erased.iter().filter(|&&e| e).count(),
            max: matrix.rows(),
        });
    }

    let mut system = Matrix::new(k, k, matrix.w());
    for (i, &unit) in dm_ids.iter().enumerate() {
        if unit < k {
            system.set(i, unit, 1);
        } else {
            system.row_mut(i).copy_from_slice(matrix.row(unit - k));
        }
    }
    Ok((system.invert(field)?, dm_ids))
}

/// Rebuild the erased units
///
/// With `row_k_ones` the first coding unit must be plain parity; then one erased
/// data unit is rebuilt from parity instead of the decoding matrix, which is
/// skipped entirely when that is the only erased data unit. Erased coding units
/// are re-encoded last.
pub fn matrix_decode(
    matrix: &Matrix,
    field: &dyn FieldService,
    row_k_ones: bool,
    erasures: &[usize],
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
) -> Result<()> {
    check_field(matrix, field)?;
    let (k, m) = (matrix.cols(), matrix.rows());
    let erased = erasures_to_erased(k, m, erasures)?;
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_matrix_word(field.w(), regions.size())?;

    if row_k_ones && !matrix.row(0).iter().all(|&v| v == 1) {
        return Err(CodingError::BadParameters(
            "row_k_ones set but the first coding row is not all ones".to_string(),
        ));
    }

    let mut remaining = erased[..k].iter().filter(|&&e| e).count();
    let mut lastdrive = erased[..k].iter().rposition(|&e| e).unwrap_or(k);
    if !row_k_ones || erased[k] {
        lastdrive = k;
    }

    let needs_matrix = remaining > 1 || (remaining > 0 && (!row_k_ones || erased[k]));
    debug!(
        "Matrix decode k={k} m={m}: {remaining} data units erased, decoding matrix {}",
        if needs_matrix { "needed" } else { "skipped" }
    );

    if needs_matrix {
        let (decoding, dm_ids) = make_decoding_matrix(matrix, &erased, field)?;
        for i in (0..lastdrive).filter(|&i| erased[i]) {
            dotprod(&mut regions, field, decoding.row(i), &dm_ids, i)?;
            remaining -= 1;
        }
    }

    if remaining > 0 {
        trace!("Rebuilding data unit {lastdrive} from parity");
        let parity_ids: UnitIds = (0..k).map(|i| if i < lastdrive { i } else { i + 1 }).collect();
        dotprod(&mut regions, field, matrix.row(0), &parity_ids, lastdrive)?;
    }

    let src_ids: UnitIds = (0..k).collect();
    for i in (0..m).filter(|&i| erased[k + i]) {
        dotprod(&mut regions, field, matrix.row(i), &src_ids, k + i)?;
    }
    Ok(())
}
