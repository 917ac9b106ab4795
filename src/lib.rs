//! Erasure coding over GF(2^w)
//!
//! Reed-Solomon (Vandermonde and RAID-6), Cauchy and the XOR-only RAID-6 codes
//! (Liberation, Blaum-Roth, Liber8tion), with three ways of running them: GF(2^w)
//! region multiplies, bitmatrix XOR dot products, and precompiled XOR schedules.
//!
//! Units are caller-owned byte buffers numbered `0..k` (data) and `k..k+m`
//! (coding). [`Codec`] is the usual entry point; the free functions in
//! [`engine`], [`codes`] and [`schedule`] expose every step on its own.

pub mod bitmatrix;
pub mod codec;
pub mod codes;
pub mod engine;
pub mod error;
pub mod galois;
pub mod matrix;
pub mod schedule;
pub mod stats;

pub use bitmatrix::{matrix_to_bitmatrix, BitMatrix};
pub use codec::{Codec, CodecBuilder, CodingConfig, CodingMode};
pub use codes::CodeTechnique;
pub use error::{CodingError, Result};
pub use galois::{FieldRegistry, FieldService, GaloisField};
pub use matrix::Matrix;
pub use schedule::{Op, PacketRef, Schedule, ScheduleCache};
pub use stats::{get_stats, Stats};
