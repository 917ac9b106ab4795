//! XOR dot products driven directly by a bitmatrix

use super::regions::Regions;
use super::{check_packets, erasures_to_erased};
use crate::bitmatrix::BitMatrix;
use crate::error::{CodingError, Result};
use log::{debug, trace};
use smallvec::SmallVec;

type UnitIds = SmallVec<[usize; 16]>;

/// `k` for a bitmatrix with `k * w` columns
pub(super) fn data_units(bitmatrix: &BitMatrix, w: usize) -> Result<usize> {
    if w == 0 || bitmatrix.cols() == 0 || bitmatrix.cols() % w != 0 || bitmatrix.rows() % w != 0 {
        return Err(CodingError::BadParameters(format!(
            "{}x{} bitmatrix does not split into {w}x{w} blocks",
            bitmatrix.rows(),
            bitmatrix.cols()
        )));
    }
    Ok(bitmatrix.cols() / w)
}

/// Compute `w` packets of `dest` per chunk from rows `first_row..first_row + w`
///
/// Column block `j` of the rows reads unit `src_ids[j]`.
fn dotprod(
    regions: &mut Regions<'_, '_, '_>,
    bitmatrix: &BitMatrix,
    first_row: usize,
    w: usize,
    src_ids: &[usize],
    dest: usize,
    packetsize: usize,
) -> Result<()> {
    if src_ids.len() * w != bitmatrix.cols() || first_row + w > bitmatrix.rows() {
        return Err(CodingError::BadParameters(format!(
            "rows {first_row}..{} with {} sources do not fit a {}x{} bitmatrix",
            first_row + w,
            src_ids.len(),
            bitmatrix.rows(),
            bitmatrix.cols()
        )));
    }

    let chunk = w * packetsize;
    for chunk_start in (0..regions.size()).step_by(chunk) {
        for j in 0..w {
            let dst_off = chunk_start + j * packetsize;
            let mut started = false;
            for (col, &bit) in bitmatrix.row(first_row + j).iter().enumerate() {
                if bit == 0 {
                    continue;
                }
                let src = src_ids[col / w];
                let src_off = chunk_start + (col % w) * packetsize;
                if started {
                    regions.xor(src, src_off, dest, dst_off, packetsize)?;
                } else {
                    regions.copy(src, src_off, dest, dst_off, packetsize)?;
                    started = true;
                }
            }
            if !started {
                regions.zero(dest, dst_off, packetsize)?;
            }
        }
    }
    Ok(())
}

/// Recompute one unit from row block `row_block` of a bitmatrix
///
/// `src_ids` defaults to the data units `0..k`.
#[allow(clippy::too_many_arguments)]
pub fn bitmatrix_dotprod(
    bitmatrix: &BitMatrix,
    w: usize,
    row_block: usize,
    src_ids: Option<&[usize]>,
    dest_id: usize,
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let k = data_units(bitmatrix, w)?;
    let m = coding.len();
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;

    let default_ids: UnitIds = (0..k).collect();
    dotprod(
        &mut regions,
        bitmatrix,
        row_block * w,
        w,
        src_ids.unwrap_or(&default_ids[..]),
        dest_id,
        packetsize,
    )
}

/// Fill every coding unit from the data units
pub fn bitmatrix_encode(
    bitmatrix: &BitMatrix,
    w: usize,
    data: &[&[u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let k = data_units(bitmatrix, w)?;
    let m = bitmatrix.rows() / w;
    let mut regions = Regions::for_encode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;

    let src_ids: UnitIds = (0..k).collect();
    for i in 0..m {
        dotprod(&mut regions, bitmatrix, i * w, w, &src_ids, k + i, packetsize)?;
    }
    Ok(())
}

/// Invert the bit rows of the first `k` surviving units
///
/// Returns the `kw x kw` decoding bitmatrix and the unit backing each column block.
pub fn make_decoding_bitmatrix(
    bitmatrix: &BitMatrix,
    w: usize,
    erased: &[bool],
) -> Result<(BitMatrix, Vec<usize>)> {
    let k = data_units(bitmatrix, w)?;
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
            max: bitmatrix.rows() / w,
        });
    }

    let kw = k * w;
    let mut system = BitMatrix::new(kw, kw);
    for (i, &unit) in dm_ids.iter().enumerate() {
        for x in 0..w {
            if unit < k {
                system.set(i * w + x, unit * w + x, true);
            } else {
                system.copy_row_from(i * w + x, bitmatrix.row((unit - k) * w + x));
            }
        }
    }
    Ok((system.invert()?, dm_ids))
}

/// Whether the first `w` rows are identity blocks, i.e. the first coding unit is parity
fn first_block_is_parity(bitmatrix: &BitMatrix, w: usize) -> bool {
    (0..w).all(|row| {
        bitmatrix
            .row(row)
            .iter()
            .enumerate()
            .all(|(col, &bit)| (bit != 0) == (col % w == row))
    })
}

/// Rebuild the erased units
///
/// Same flow as [`matrix_decode`](super::matrix_decode) at the bit level.
#[allow(clippy::too_many_arguments)]
pub fn bitmatrix_decode(
    bitmatrix: &BitMatrix,
    w: usize,
    row_k_ones: bool,
    erasures: &[usize],
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let k = data_units(bitmatrix, w)?;
    let m = bitmatrix.rows() / w;
    let erased = erasures_to_erased(k, m, erasures)?;
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;

    if row_k_ones && !first_block_is_parity(bitmatrix, w) {
        return Err(CodingError::BadParameters(
            "row_k_ones set but the first coding unit is not parity".to_string(),
        ));
    }

    let mut remaining = erased[..k].iter().filter(|&&e| e).count();
    let mut lastdrive = erased[..k].iter().rposition(|&e| e).unwrap_or(k);
    if !row_k_ones || erased[k] {
        lastdrive = k;
    }

    let needs_matrix = remaining > 1 || (remaining > 0 && (!row_k_ones || erased[k]));
    debug!(
        "Bitmatrix decode k={k} m={m} w={w}: {remaining} data units erased, decoding bitmatrix {}",
        if needs_matrix { "needed" } else { "skipped" }
    );

    if needs_matrix {
        let (decoding, dm_ids) = make_decoding_bitmatrix(bitmatrix, w, &erased)?;
        for i in (0..lastdrive).filter(|&i| erased[i]) {
            dotprod(&mut regions, &decoding, i * w, w, &dm_ids, i, packetsize)?;
            remaining -= 1;
        }
    }

    if remaining > 0 {
        trace!("Rebuilding data unit {lastdrive} from parity");
        let parity_ids: UnitIds = (0..k).map(|i| if i < lastdrive { i } else { i + 1 }).collect();
        dotprod(&mut regions, bitmatrix, 0, w, &parity_ids, lastdrive, packetsize)?;
    }

    let src_ids: UnitIds = (0..k).collect();
    for i in (0..m).filter(|&i| erased[k + i]) {
        dotprod(&mut regions, bitmatrix, i * w, w, &src_ids, k + i, packetsize)?;
    }
    Ok(())
}
