//! Encode and decode over caller-owned unit buffers
//!
//! Three execution modes share one unit numbering (`0..k` data, `k..k+m` coding):
//!
//! - matrix mode: GF(2^w) dot products through region multiplies, `w` in {8, 16, 32}
//! - bitmatrix mode: XOR dot products over `packetsize` slices, any `w`
//! - schedule mode: precompiled copy/XOR lists, lazily compiled per erasure
//!   pattern or looked up in a [`ScheduleCache`](crate::schedule::ScheduleCache)
//!
//! Buffers carry their own size; all units of one call must have the same length.
//! On error the contents of output units are unspecified.

mod bitmatrix_mode;
mod matrix_mode;
pub(crate) mod regions;
mod schedule_mode;

pub use bitmatrix_mode::{bitmatrix_decode, bitmatrix_dotprod, bitmatrix_encode, make_decoding_bitmatrix};
pub use matrix_mode::{make_decoding_matrix, matrix_decode, matrix_dotprod, matrix_encode};
pub use schedule_mode::{
    do_scheduled_operations, schedule_decode_cache, schedule_decode_lazy, schedule_encode,
};

use crate::error::{CodingError, Result};
use crate::galois::region_xor;
use crate::stats;

/// Erased flags for all `k + m` units
///
/// Duplicate ids are ignored. Ids outside `0..k+m` are rejected, and so are more
/// than `m` distinct ids.
pub fn erasures_to_erased(k: usize, m: usize, erasures: &[usize]) -> Result<Vec<bool>> {
    let mut erased = vec![false; k + m];
    let mut count = 0;
    for &id in erasures {
        let Some(flag) = erased.get_mut(id) else {
            return Err(CodingError::BadParameters(format!(
                "erasure id {id} is outside 0..{}",
                k + m
            )));
        };
        if !*flag {
            *flag = true;
            count += 1;
        }
    }
    if count > m {
        return Err(CodingError::TooManyErasures {
            erased: count,
            max: m,
        });
    }
    Ok(erased)
}

/// `parity = data[0] ^ data[1] ^ ...`
pub fn do_parity(data: &[&[u8]], parity: &mut [u8]) -> Result<()> {
    let Some((first, rest)) = data.split_first() else {
        return Err(CodingError::BadParameters(
            "parity needs at least one data unit".to_string(),
        ));
    };
    if let Some(bad) = data.iter().map(|d| d.len()).find(|&len| len != parity.len()) {
        return Err(CodingError::LengthMismatch {
            expected: parity.len(),
            actual: bad,
        });
    }

    parity.copy_from_slice(first);
    stats::add_copy(parity.len());
    for unit in rest {
        region_xor(unit, parity);
        stats::add_xor(parity.len());
    }
    Ok(())
}

/// Matrix mode runs on whole words of `w` in {8, 16, 32}
pub(crate) fn check_matrix_word(w: u32, size: usize) -> Result<()> {
    if !matches!(w, 8 | 16 | 32) {
        return Err(CodingError::BadParameters(format!(
            "matrix mode needs w in {{8, 16, 32}}, got w={w}"
        )));
    }
    let word_bytes = (w / 8) as usize;
    if size % word_bytes != 0 {
        return Err(CodingError::Alignment {
            what: "unit size",
            size,
            multiple: word_bytes,
        });
    }
    Ok(())
}

/// Packet modes work on chunks of `w` packets
pub(crate) fn check_packets(w: usize, size: usize, packetsize: usize) -> Result<()> {
    if packetsize == 0 || w == 0 {
        return Err(CodingError::BadParameters(format!(
            "packetsize and w must be positive, got packetsize={packetsize} w={w}"
        )));
    }
    if packetsize % 8 != 0 {
        return Err(CodingError::Alignment {
            what: "packetsize",
            size: packetsize,
            multiple: 8,
        });
    }
    if size % (w * packetsize) != 0 {
        return Err(CodingError::Alignment {
            what: "unit size",
            size,
            multiple: w * packetsize,
        });
    }
    Ok(())
}
