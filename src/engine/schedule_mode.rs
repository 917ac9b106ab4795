//! Running compiled XOR schedules

use super::bitmatrix_mode::data_units;
use super::regions::Regions;
use super::{check_packets, erasures_to_erased};
use crate::bitmatrix::BitMatrix;
use crate::error::{CodingError, Result};
use crate::schedule::{decoding_schedule, Op, Schedule, ScheduleCache};
use log::debug;

fn check_ops(schedule: &Schedule, units: usize, w: usize) -> Result<()> {
    for op in schedule.ops() {
        for packet in op.src().into_iter().chain([op.dst()]) {
            if packet.unit >= units || packet.packet >= w {
                return Err(CodingError::BadParameters(format!(
                    "operation `{op}` is outside {units} units of {w} packets"
                )));
            }
        }
    }
    Ok(())
}

/// Apply every op once per chunk of `w * packetsize` bytes
fn run(regions: &mut Regions<'_, '_, '_>, schedule: &Schedule, w: usize, packetsize: usize) -> Result<()> {
    check_ops(schedule, regions.units(), w)?;
    for chunk_start in (0..regions.size()).step_by(w * packetsize) {
        for op in schedule.ops() {
            let dst_off = chunk_start + op.dst().packet * packetsize;
            match *op {
                Op::Copy { src, dst } => {
                    let src_off = chunk_start + src.packet * packetsize;
                    regions.copy(src.unit, src_off, dst.unit, dst_off, packetsize)?
                }
                Op::Xor { src, dst } => {
                    let src_off = chunk_start + src.packet * packetsize;
                    regions.xor(src.unit, src_off, dst.unit, dst_off, packetsize)?
                }
                Op::Zero { dst } => regions.zero(dst.unit, dst_off, packetsize)?,
            }
        }
    }
    Ok(())
}

/// Run `schedule` over all units; any unit may be read or written
pub fn do_scheduled_operations(
    k: usize,
    w: usize,
    schedule: &Schedule,
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let m = coding.len();
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;
    run(&mut regions, schedule, w, packetsize)
}

/// Fill the coding units with an encode schedule
pub fn schedule_encode(
    k: usize,
    w: usize,
    schedule: &Schedule,
    data: &[&[u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let m = coding.len();
    let mut regions = Regions::for_encode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;
    run(&mut regions, schedule, w, packetsize)
}

/// Compile a decoding schedule for this erasure pattern and run it
#[allow(clippy::too_many_arguments)]
pub fn schedule_decode_lazy(
    k: usize,
    w: usize,
    bitmatrix: &BitMatrix,
    erasures: &[usize],
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
    smart: bool,
) -> Result<()> {
    if data_units(bitmatrix, w)? != k {
        return Err(CodingError::BadParameters(format!(
            "{}x{} bitmatrix does not fit k={k} w={w}",
            bitmatrix.rows(),
            bitmatrix.cols()
        )));
    }
    let m = bitmatrix.rows() / w;
    erasures_to_erased(k, m, erasures)?;
    let mut regions = Regions::for_decode(k, m, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;

    let schedule = decoding_schedule(k, w, bitmatrix, erasures, smart)?;
    debug!(
        "Lazy decode of {erasures:?} with k={k} m={m} w={w}: {} ops per chunk",
        schedule.len()
    );
    run(&mut regions, &schedule, w, packetsize)
}

/// Decode with a schedule looked up in a [`ScheduleCache`]
pub fn schedule_decode_cache(
    cache: &ScheduleCache,
    erasures: &[usize],
    data: &mut [&mut [u8]],
    coding: &mut [&mut [u8]],
    packetsize: usize,
) -> Result<()> {
    let (k, w) = (cache.k(), cache.w());
    let mut regions = Regions::for_decode(k, 2, data, coding)?;
    check_packets(w, regions.size(), packetsize)?;

    match cache.lookup(erasures)? {
        Some(schedule) => run(&mut regions, schedule, w, packetsize),
        None => Ok(()),
    }
}
