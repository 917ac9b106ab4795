//! XOR schedules compiled from bitmatrices
//!
//! A schedule is a flat list of packet copies and XORs, plus a zeroing op for
//! output rows with no ones. Units are numbered the
//! usual way: `0..k` are data units, `k..k+m` coding units. Within one chunk of
//! `w * packetsize` bytes, packet `p` of a unit covers bytes
//! `p * packetsize..(p + 1) * packetsize`.
//!
//! ## Compilers
//!
//! - [`dumb_schedule`]: each output row is a copy of its first input bit followed
//!   by an XOR per remaining bit.
//! - [`smart_schedule`]: greedy reuse of already computed output rows. Rows are
//!   emitted cheapest first; a row may start as a copy of an earlier output and
//!   then XOR only the bits where the two rows differ. A row never costs more than
//!   its dumb transcription.
//!
//! [`decoding_schedule`] folds a whole decode (erased data and erased coding) into
//! one bitmatrix over the surviving units and compiles that.

use crate::bitmatrix::BitMatrix;
use crate::engine::erasures_to_erased;
use crate::error::{CodingError, Result};
use log::{debug, trace};
use rayon::prelude::*;
use rustc_hash::FxHashMap as HashMap;
use std::fmt;

/// One `packetsize` slice of a unit within a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketRef {
    pub unit: usize,
    pub packet: usize,
}

impl PacketRef {
    pub const fn new(unit: usize, packet: usize) -> Self {
        Self { unit, packet }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `dst = src`
    Copy { src: PacketRef, dst: PacketRef },
    /// `dst ^= src`
    Xor { src: PacketRef, dst: PacketRef },
    /// `dst = 0`, for output rows with no ones
    Zero { dst: PacketRef },
}

impl Op {
    pub fn src(&self) -> Option<PacketRef> {
        match *self {
            Op::Copy { src, .. } | Op::Xor { src, .. } => Some(src),
            Op::Zero { .. } => None,
        }
    }

    pub fn dst(&self) -> PacketRef {
        match *self {
            Op::Copy { dst, .. } | Op::Xor { dst, .. } | Op::Zero { dst } => dst,
        }
    }

    fn map_units(self, f: impl Fn(usize) -> usize) -> Op {
        let map = |p: PacketRef| PacketRef::new(f(p.unit), p.packet);
        match self {
            Op::Copy { src, dst } => Op::Copy {
                src: map(src),
                dst: map(dst),
            },
            Op::Xor { src, dst } => Op::Xor {
                src: map(src),
                dst: map(dst),
            },
            Op::Zero { dst } => Op::Zero { dst: map(dst) },
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, src, dst) = match self {
            Op::Copy { src, dst } => ("copy", src, dst),
            Op::Xor { src, dst } => ("xor", src, dst),
            Op::Zero { dst } => return write!(f, "zero {}:{}", dst.unit, dst.packet),
        };
        write!(
            f,
            "{name} {}:{} -> {}:{}",
            src.unit, src.packet, dst.unit, dst.packet
        )
    }
}

/// Ordered list of packet operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    ops: Vec<Op>,
}

impl Schedule {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn copy_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Copy { .. }))
            .count()
    }

    pub fn xor_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Xor { .. }))
            .count()
    }

    fn map_units(self, f: impl Fn(usize) -> usize) -> Schedule {
        Schedule {
            ops: self.ops.into_iter().map(|op| op.map_units(&f)).collect(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

/// Number of output units, after checking the bitmatrix is `(m*w) x (k*w)`
fn output_units(k: usize, w: usize, bitmatrix: &BitMatrix) -> Result<usize> {
    if k == 0 || w == 0 {
        return Err(CodingError::BadParameters(format!(
            "schedule needs k >= 1 and w >= 1, got k={k} w={w}"
        )));
    }
    if bitmatrix.cols() != k * w || bitmatrix.rows() % w != 0 {
        return Err(CodingError::BadParameters(format!(
            "{}x{} bitmatrix does not fit k={k} w={w}",
            bitmatrix.rows(),
            bitmatrix.cols()
        )));
    }
    Ok(bitmatrix.rows() / w)
}

fn input_packet(col: usize, w: usize) -> PacketRef {
    PacketRef::new(col / w, col % w)
}

fn output_packet(row: usize, k: usize, w: usize) -> PacketRef {
    PacketRef::new(k + row / w, row % w)
}

/// Literal transcription of the bitmatrix
pub fn dumb_schedule(k: usize, w: usize, bitmatrix: &BitMatrix) -> Result<Schedule> {
    output_units(k, w, bitmatrix)?;

    let mut ops = Vec::with_capacity(bitmatrix.ones());
    for row in 0..bitmatrix.rows() {
        let dst = output_packet(row, k, w);
        let mut first = true;
        for (col, &bit) in bitmatrix.row(row).iter().enumerate() {
            if bit != 0 {
                let src = input_packet(col, w);
                ops.push(if first {
                    Op::Copy { src, dst }
                } else {
                    Op::Xor { src, dst }
                });
                first = false;
            }
        }
        if first {
            ops.push(Op::Zero { dst });
        }
    }
    Ok(Schedule::new(ops))
}

fn hamming(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Greedy schedule that reuses earlier output rows
pub fn smart_schedule(k: usize, w: usize, bitmatrix: &BitMatrix) -> Result<Schedule> {
    output_units(k, w, bitmatrix)?;

    let rows = bitmatrix.rows();
    // cost[i]: operations needed to produce row i; from[i]: output row to start from
    let mut cost: Vec<usize> = (0..rows)
        .map(|row| bitmatrix.row(row).iter().filter(|&&b| b != 0).count())
        .collect();
    let mut from: Vec<Option<usize>> = vec![None; rows];
    let mut remaining: Vec<usize> = (0..rows).collect();
    let mut ops = Vec::with_capacity(bitmatrix.ones());

    while !remaining.is_empty() {
        let mut best = 0;
        for (pos, &row) in remaining.iter().enumerate() {
            if cost[row] < cost[remaining[best]] {
                best = pos;
            }
        }
        let row = remaining.remove(best);
        let dst = output_packet(row, k, w);
        let bits = bitmatrix.row(row);

        match from[row] {
            None => {
                let mut first = true;
                for (col, &bit) in bits.iter().enumerate() {
                    if bit != 0 {
                        let src = input_packet(col, w);
                        ops.push(if first {
                            Op::Copy { src, dst }
                        } else {
                            Op::Xor { src, dst }
                        });
                        first = false;
                    }
                }
                if first {
                    ops.push(Op::Zero { dst });
                }
            }
            Some(base) => {
                ops.push(Op::Copy {
                    src: output_packet(base, k, w),
                    dst,
                });
                let base_bits = bitmatrix.row(base);
                for (col, (&bit, &base_bit)) in bits.iter().zip(base_bits).enumerate() {
                    if bit != base_bit {
                        ops.push(Op::Xor {
                            src: input_packet(col, w),
                            dst,
                        });
                    }
                }
            }
        }

        for &other in &remaining {
            let via_row = 1 + hamming(bits, bitmatrix.row(other));
            if via_row < cost[other] || (via_row == cost[other] && from[other].is_some()) {
                cost[other] = via_row;
                from[other] = Some(row);
            }
        }
    }

    Ok(Schedule::new(ops))
}

/// Compile with either compiler
pub fn compile_schedule(k: usize, w: usize, bitmatrix: &BitMatrix, smart: bool) -> Result<Schedule> {
    let schedule = if smart {
        smart_schedule(k, w, bitmatrix)?
    } else {
        dumb_schedule(k, w, bitmatrix)?
    };
    trace!(
        "Compiled {} schedule: {} copies, {} XORs from {} bitmatrix ones",
        if smart { "smart" } else { "dumb" },
        schedule.copy_count(),
        schedule.xor_count(),
        bitmatrix.ones()
    );
    Ok(schedule)
}

/// Schedule that rebuilds every erased unit from the survivors
///
/// The first `k` logical inputs are the surviving units: data unit `i` when it
/// survives, otherwise the next unused surviving coding unit. Erased data units
/// come from the inverse of that `kw x kw` system; erased coding units from their
/// coding rows with the erased data columns substituted by those decoded rows.
/// The compiled schedule is finally renumbered to physical units.
pub fn decoding_schedule(
    k: usize,
    w: usize,
    bitmatrix: &BitMatrix,
    erasures: &[usize],
    smart: bool,
) -> Result<Schedule> {
    let m = output_units(k, w, bitmatrix)?;
    let erased = erasures_to_erased(k, m, erasures)?;

    let erased_data: Vec<usize> = (0..k).filter(|&i| erased[i]).collect();
    let erased_coding: Vec<usize> = (k..k + m).filter(|&i| erased[i]).collect();
    if erased_data.is_empty() && erased_coding.is_empty() {
        return Ok(Schedule::default());
    }

    let mut survivors = (k..k + m).filter(|&i| !erased[i]);
    let mut row_ids = Vec::with_capacity(k + erased_data.len() + erased_coding.len());
    for (i, &is_erased) in erased.iter().enumerate().take(k) {
        if is_erased {
            let unit = survivors.next().ok_or(CodingError::TooManyErasures {
                erased: erased_data.len() + erased_coding.len(),
                max: m,
            })?;
            row_ids.push(unit);
        } else {
            row_ids.push(i);
        }
    }
    row_ids.extend_from_slice(&erased_data);
    row_ids.extend_from_slice(&erased_coding);

    let kw = k * w;
    let outputs = erased_data.len() + erased_coding.len();
    let mut system = BitMatrix::new(outputs * w, kw);

    if !erased_data.is_empty() {
        let mut survivors_matrix = BitMatrix::new(kw, kw);
        for (slot, &unit) in row_ids[..k].iter().enumerate() {
            for x in 0..w {
                if unit < k {
                    survivors_matrix.set(slot * w + x, unit * w + x, true);
                } else {
                    survivors_matrix.copy_row_from(slot * w + x, bitmatrix.row((unit - k) * w + x));
                }
            }
        }
        let inverse = survivors_matrix.invert()?;
        for (t, &unit) in erased_data.iter().enumerate() {
            for x in 0..w {
                system.copy_row_from(t * w + x, inverse.row(unit * w + x));
            }
        }
    }

    for (t, &unit) in erased_coding.iter().enumerate() {
        let out_block = erased_data.len() + t;
        for x in 0..w {
            let coding_row = (unit - k) * w + x;
            let mut bits = bitmatrix.row(coding_row).to_vec();
            for (d, &data_unit) in erased_data.iter().enumerate() {
                bits[data_unit * w..(data_unit + 1) * w].fill(0);
                for y in 0..w {
                    if bitmatrix.get(coding_row, data_unit * w + y) {
                        for (b, &decoded) in bits.iter_mut().zip(system.row(d * w + y)) {
                            *b ^= decoded;
                        }
                    }
                }
            }
            system.copy_row_from(out_block * w + x, &bits);
        }
    }

    let schedule = compile_schedule(k, w, &system, smart)?;
    Ok(schedule.map_units(|logical| row_ids[logical]))
}

/// Precompiled schedules for a two-coding-unit bitmatrix
///
/// Holds the encode schedule plus a decode schedule for every single erasure and
/// every pair of erasures, keyed by `(low id, high id)` (`(id, id)` for singles).
#[derive(Debug, Clone)]
pub struct ScheduleCache {
    k: usize,
    w: usize,
    fingerprint: u64,
    encode: Schedule,
    decode: HashMap<(usize, usize), Schedule>,
}

impl ScheduleCache {
    /// Build every schedule for `bitmatrix`; only `m = 2` is supported
    pub fn generate(k: usize, w: usize, bitmatrix: &BitMatrix, smart: bool) -> Result<Self> {
        let m = output_units(k, w, bitmatrix)?;
        if m != 2 {
            return Err(CodingError::UnsupportedConfiguration(format!(
                "schedule cache needs m=2, got m={m}"
            )));
        }

        let n = k + m;
        let keys: Vec<(usize, usize)> = (0..n)
            .flat_map(|e1| (0..=e1).map(move |e2| (e2, e1)))
            .collect();

        let decode = keys
            .par_iter()
            .map(|&(low, high)| {
                let erasures = if low == high {
                    vec![high]
                } else {
                    vec![low, high]
                };
                decoding_schedule(k, w, bitmatrix, &erasures, smart).map(|s| ((low, high), s))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let encode = compile_schedule(k, w, bitmatrix, smart)?;
        debug!(
            "Built schedule cache for k={k} w={w}: {} decode schedules, encode has {} ops",
            decode.len(),
            encode.len()
        );

        Ok(Self {
            k,
            w,
            fingerprint: bitmatrix.fingerprint(),
            encode,
            decode,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn w(&self) -> usize {
        self.w
    }

    /// Number of cached decode schedules
    pub fn len(&self) -> usize {
        self.decode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decode.is_empty()
    }

    pub fn encode_schedule(&self) -> &Schedule {
        &self.encode
    }

    /// Whether this cache was generated from `bitmatrix`
    pub fn is_built_from(&self, bitmatrix: &BitMatrix) -> bool {
        bitmatrix.cols() == self.k * self.w && bitmatrix.fingerprint() == self.fingerprint
    }

    /// Decode schedule for an erasure set, `None` when nothing is erased
    pub fn lookup(&self, erasures: &[usize]) -> Result<Option<&Schedule>> {
        let erased = erasures_to_erased(self.k, 2, erasures)?;
        let ids: Vec<usize> = (0..erased.len()).filter(|&i| erased[i]).collect();
        let key = match ids.as_slice() {
            [] => return Ok(None),
            [only] => (*only, *only),
            [low, high] => (*low, *high),
            _ => {
                return Err(CodingError::TooManyErasures {
                    erased: ids.len(),
                    max: 2,
                })
            }
        };
        self.decode.get(&key).map(Some).ok_or_else(|| {
            CodingError::UnsupportedConfiguration(format!("no cached schedule for {key:?}"))
        })
    }
}
