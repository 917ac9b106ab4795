//! Galois Field GF(2^w) arithmetic for the coding matrices
//!
//! ## Polynomials
//!
//! Every word size from 1 to 32 gets a default primitive polynomial (see
//! [`default_polynomial`]). GF(2^8) uses 0x11D and GF(2^16) uses 0x1100B, the same
//! generators the PAR2 tables are built from.
//!
//! ## Implementation Notes
//!
//! - `w <= 16`: log/antilog tables, built once per field instance.
//! - `w > 16`: shift-and-reduce multiplication, inverse by exponentiation.
//! - Region multiplication (`w` in {8, 16, 32}) builds one 256-entry table per input
//!   byte lane for the scalar and XORs the lane lookups together. Words inside a
//!   region are little-endian.
//!
//! Field instances are immutable once built. [`FieldRegistry`] hands out one shared
//! instance per `w`, created on first use.

use crate::error::{CodingError, Result};
use log::debug;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Largest word size the field backend supports
pub const MAX_W: u32 = 32;

/// Largest word size that gets log/antilog tables
const MAX_TABLE_W: u32 = 16;

/// Default primitive polynomials (high-order bit included), indexed by w
const PRIM_POLY: [u64; 33] = [
    0,
    0o3,
    0o7,
    0o13,
    0o23,
    0o45,
    0o103,
    0o211,
    0o435,
    0o1021,
    0o2011,
    0o4005,
    0o10123,
    0o20033,
    0o42103,
    0o100003,
    0o210013,
    0o400011,
    0o1000201,
    0o2000047,
    0o4000011,
    0o10000005,
    0o20000003,
    0o40000041,
    0o100000207,
    0o200000011,
    0o400000107,
    0o1000000047,
    0o2000000011,
    0o4000000005,
    0o10040000007,
    0o20000000011,
    0o40020000007,
];

/// Default primitive polynomial for GF(2^w), high-order bit included
pub fn default_polynomial(w: u32) -> Result<u64> {
    check_w(w)?;
    Ok(PRIM_POLY[w as usize])
}

fn check_w(w: u32) -> Result<()> {
    if w == 0 || w > MAX_W {
        return Err(CodingError::UnsupportedWordSize(w));
    }
    Ok(())
}

/// Field arithmetic consumed by the coding core
///
/// The core only ever talks to a field through this trait, so a caller can plug a
/// different backend into a [`FieldRegistry`] before first use.
pub trait FieldService: Send + Sync {
    /// Word size of the field
    fn w(&self) -> u32;

    /// Product of `x` and `y`
    fn multiply(&self, x: u32, y: u32) -> u32;

    /// `x / y`, or `None` when `y` is zero
    fn divide(&self, x: u32, y: u32) -> Option<u32>;

    /// Multiplicative inverse, or `None` for zero
    fn inverse(&self, x: u32) -> Option<u32> {
        self.divide(1, x)
    }

    /// `dst = scalar * src` (or `dst ^= scalar * src` when `accumulate`) over
    /// little-endian w-bit words
    fn region_multiply(&self, src: &[u8], dst: &mut [u8], scalar: u32, accumulate: bool)
        -> Result<()>;
}

/// Galois Field lookup tables for fast arithmetic
struct GaloisTable {
    log: Vec<u32>,
    antilog: Vec<u32>,
}

impl GaloisTable {
    /// Returns `None` if `polynomial` does not generate the whole multiplicative group
    fn build(w: u32, polynomial: u64) -> Option<Self> {
        let count = 1usize << w;
        let limit = count - 1;
        let mut table = GaloisTable {
            log: vec![0; count],
            antilog: vec![0; count],
        };

        let mut b = 1u64;
        for l in 0..limit {
            if l > 0 && b == 1 {
                return None;
            }
            table.log[b as usize] = l as u32;
            table.antilog[l] = b as u32;

            b <<= 1;
            if b & count as u64 != 0 {
                b ^= polynomial;
            }
        }

        table.log[0] = limit as u32;
        table.antilog[limit] = 0;
        Some(table)
    }
}

/// Multiplication table for one scalar, split by input byte lane
///
/// `scalar * word` is the XOR of `lanes[i][byte i of word]`.
struct SplitMulTable {
    lanes: Vec<[u32; 256]>,
}

/// Default field backend
pub struct GaloisField {
    w: u32,
    polynomial: u64,
    mask: u32,
    table: Option<GaloisTable>,
}

impl GaloisField {
    /// Field with the default polynomial for `w`
    pub fn new(w: u32) -> Result<Self> {
        let polynomial = default_polynomial(w)?;
        Self::with_polynomial(w, polynomial)
    }

    /// Field with a caller-chosen polynomial of degree `w`
    ///
    /// The polynomial must be irreducible for the result to be a field; this is
    /// not checked.
    pub fn with_polynomial(w: u32, polynomial: u64) -> Result<Self> {
        check_w(w)?;
        if polynomial >> w != 1 {
            return Err(CodingError::BadParameters(format!(
                "polynomial {polynomial:#x} does not have degree {w}"
            )));
        }

        let table = if w <= MAX_TABLE_W {
            GaloisTable::build(w, polynomial)
        } else {
            None
        };

        Ok(Self {
            w,
            polynomial,
            mask: if w == 32 { u32::MAX } else { (1u32 << w) - 1 },
            table,
        })
    }

    /// Generator polynomial, high-order bit included
    pub fn polynomial(&self) -> u64 {
        self.polynomial
    }

    /// Whether multiplication goes through log tables
    pub fn has_log_tables(&self) -> bool {
        self.table.is_some()
    }

    fn limit(&self) -> u64 {
        (1u64 << self.w) - 1
    }

    fn shift_multiply(&self, x: u32, y: u32) -> u32 {
        let top = 1u64 << self.w;
        let mut a = x as u64;
        let mut b = y;
        let mut product = 0u64;

        while b != 0 {
            if b & 1 != 0 {
                product ^= a;
            }
            b >>= 1;
            a <<= 1;
            if a & top != 0 {
                a ^= self.polynomial;
            }
        }

        product as u32
    }

    fn pow(&self, x: u32, mut exponent: u64) -> u32 {
        let mut base = x;
        let mut result = 1u32;
        while exponent != 0 {
            if exponent & 1 != 0 {
                result = self.multiply(result, base);
            }
            base = self.multiply(base, base);
            exponent >>= 1;
        }
        result
    }

    fn build_split_mul_table(&self, scalar: u32) -> SplitMulTable {
        let lanes = (self.w / 8) as usize;
        let lanes = (0..lanes)
            .map(|lane| {
                let mut table = [0u32; 256];
                for (byte, entry) in table.iter_mut().enumerate().skip(1) {
                    *entry = self.multiply(scalar, (byte as u32) << (8 * lane));
                }
                table
            })
            .collect();
        SplitMulTable { lanes }
    }
}

impl FieldService for GaloisField {
    fn w(&self) -> u32 {
        self.w
    }

    fn multiply(&self, x: u32, y: u32) -> u32 {
        let (x, y) = (x & self.mask, y & self.mask);
        if x == 0 || y == 0 {
            return 0;
        }

        match &self.table {
            Some(table) => {
                let limit = self.limit() as usize;
                let log_sum =
                    (table.log[x as usize] as usize + table.log[y as usize] as usize) % limit;
                table.antilog[log_sum]
            }
            None => self.shift_multiply(x, y),
        }
    }

    fn divide(&self, x: u32, y: u32) -> Option<u32> {
        let y = y & self.mask;
        if y == 0 {
            return None;
        }
        if x & self.mask == 0 {
            return Some(0);
        }
        self.inverse(y).map(|inv| self.multiply(x, inv))
    }

    fn inverse(&self, x: u32) -> Option<u32> {
        let x = x & self.mask;
        if x == 0 {
            return None;
        }

        match &self.table {
            Some(table) => {
                let limit = self.limit() as usize;
                let log = table.log[x as usize] as usize;
                Some(table.antilog[(limit - log) % limit])
            }
            // x^(2^w - 2) = x^-1
            None => Some(self.pow(x, self.limit() - 1)),
        }
    }

    fn region_multiply(
        &self,
        src: &[u8],
        dst: &mut [u8],
        scalar: u32,
        accumulate: bool,
    ) -> Result<()> {
        if !matches!(self.w, 8 | 16 | 32) {
            return Err(CodingError::UnsupportedConfiguration(format!(
                "region multiply needs w in {{8, 16, 32}}, got w={}",
                self.w
            )));
        }
        if src.len() != dst.len() {
            return Err(CodingError::LengthMismatch {
                expected: dst.len(),
                actual: src.len(),
            });
        }
        let word_bytes = (self.w / 8) as usize;
        if src.len() % word_bytes != 0 {
            return Err(CodingError::Alignment {
                what: "region",
                size: src.len(),
                multiple: word_bytes,
            });
        }

        match scalar & self.mask {
            0 => {
                if !accumulate {
                    dst.fill(0);
                }
            }
            1 => {
                if accumulate {
                    region_xor(src, dst);
                } else {
                    dst.copy_from_slice(src);
                }
            }
            scalar => {
                let tables = self.build_split_mul_table(scalar);
                for (s, d) in src
                    .chunks_exact(word_bytes)
                    .zip(dst.chunks_exact_mut(word_bytes))
                {
                    let mut product = 0u32;
                    for (lane, byte) in s.iter().enumerate() {
                        product ^= tables.lanes[lane][*byte as usize];
                    }
                    let product = product.to_le_bytes();
                    if accumulate {
                        for (out, p) in d.iter_mut().zip(product) {
                            *out ^= p;
                        }
                    } else {
                        d.copy_from_slice(&product[..word_bytes]);
                    }
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for GaloisField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaloisField")
            .field("w", &self.w)
            .field("polynomial", &format_args!("{:#x}", self.polynomial))
            .field("log_tables", &self.table.is_some())
            .finish()
    }
}

/// `dst ^= src`
///
/// Works a u64 at a time when both regions are suitably aligned.
pub fn region_xor(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if let (Ok(s), Ok(d)) = (
        bytemuck::try_cast_slice::<u8, u64>(src),
        bytemuck::try_cast_slice_mut::<u8, u64>(dst),
    ) {
        for (out, word) in d.iter_mut().zip(s) {
            *out ^= *word;
        }
        return;
    }

    for (out, byte) in dst.iter_mut().zip(src) {
        *out ^= *byte;
    }
}

/// Shared field instances, one per word size
///
/// Each slot is initialized at most once, on first request, and is immutable
/// afterwards. Concurrent first use from several threads is safe.
pub struct FieldRegistry {
    slots: [OnceLock<Arc<dyn FieldService>>; MAX_W as usize + 1],
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    fn slot(&self, w: u32) -> Result<&OnceLock<Arc<dyn FieldService>>> {
        check_w(w)?;
        Ok(&self.slots[w as usize])
    }

    /// Field for `w`, creating the default backend on first use
    pub fn field(&self, w: u32) -> Result<Arc<dyn FieldService>> {
        let slot = self.slot(w)?;
        if let Some(field) = slot.get() {
            return Ok(Arc::clone(field));
        }

        let field: Arc<dyn FieldService> = Arc::new(GaloisField::new(w)?);
        // a racing initializer may win; every caller then sees its instance
        if slot.set(field).is_ok() {
            debug!("Initialized default GF(2^{w})");
        }
        slot.get().map(Arc::clone).ok_or_else(|| {
            CodingError::UnsupportedConfiguration(format!("GF(2^{w}) failed to initialize"))
        })
    }

    /// Use `backend` for its word size instead of the default
    ///
    /// Fails once the slot has been initialized, either by an earlier install or by
    /// a call to [`FieldRegistry::field`].
    pub fn install(&self, backend: Arc<dyn FieldService>) -> Result<()> {
        let w = backend.w();
        self.slot(w)?.set(backend).map_err(|_| {
            CodingError::UnsupportedConfiguration(format!("GF(2^{w}) is already initialized"))
        })
    }

    /// Whether the field for `w` has been created
    pub fn is_initialized(&self, w: u32) -> bool {
        self.slot(w).map(|s| s.get().is_some()).unwrap_or(false)
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let initialized: Vec<u32> = (1..=MAX_W).filter(|&w| self.is_initialized(w)).collect();
        f.debug_struct("FieldRegistry")
            .field("initialized", &initialized)
            .finish()
    }
}
