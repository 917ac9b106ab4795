//! Borrowed unit buffers addressed by unit id
//!
//! Encode reads data units and writes coding units; decode writes both. `Regions`
//! hands out a source slice and a destination slice at the same time, splitting
//! the borrow across units or inside one unit, and records every byte moved in
//! the global stats.

use crate::error::{CodingError, Result};
use crate::galois::{region_xor, FieldService};
use crate::stats;

pub(crate) enum DataUnits<'a, 'b> {
    Shared(&'a [&'b [u8]]),
    Exclusive(&'a mut [&'b mut [u8]]),
}

pub(crate) struct Regions<'a, 'b, 'c> {
    k: usize,
    size: usize,
    data: DataUnits<'a, 'b>,
    coding: &'a mut [&'c mut [u8]],
}

fn read_only(unit: usize) -> CodingError {
    CodingError::BadParameters(format!("data unit {unit} is read-only during encode"))
}

/// Two distinct elements of a slice, both mutable
fn two_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    if a < b {
        let (low, high) = items.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = items.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}

/// Non-overlapping source and destination ranges inside one buffer
fn split_within(
    unit: &mut [u8],
    src_off: usize,
    dst_off: usize,
    len: usize,
) -> Result<(&[u8], &mut [u8])> {
    if src_off + len <= dst_off {
        let (low, high) = unit.split_at_mut(dst_off);
        Ok((&low[src_off..src_off + len], &mut high[..len]))
    } else if dst_off + len <= src_off {
        let (low, high) = unit.split_at_mut(src_off);
        Ok((&high[..len], &mut low[dst_off..dst_off + len]))
    } else {
        Err(CodingError::BadParameters(format!(
            "source {src_off} and destination {dst_off} overlap within {len} bytes"
        )))
    }
}

/// Common unit size, after checking unit counts and lengths
fn check_lengths(
    k: usize,
    m: usize,
    (data_count, coding_count): (usize, usize),
    mut lengths: impl Iterator<Item = usize>,
) -> Result<usize> {
    if k == 0 || data_count != k || coding_count != m {
        return Err(CodingError::BadParameters(format!(
            "expected {k} data and {m} coding units, got {data_count} and {coding_count}"
        )));
    }

    let size = lengths.next().unwrap_or(0);
    if let Some(bad) = lengths.find(|&len| len != size) {
        return Err(CodingError::LengthMismatch {
            expected: size,
            actual: bad,
        });
    }
    Ok(size)
}

impl<'a, 'b, 'c> Regions<'a, 'b, 'c> {
    /// Read-only data units, writable coding units
    pub(crate) fn for_encode(
        k: usize,
        m: usize,
        data: &'a [&'b [u8]],
        coding: &'a mut [&'c mut [u8]],
    ) -> Result<Self> {
        let lengths = data
            .iter()
            .map(|d| d.len())
            .chain(coding.iter().map(|c| c.len()));
        let size = check_lengths(k, m, (data.len(), coding.len()), lengths)?;
        Ok(Self {
            k,
            size,
            data: DataUnits::Shared(data),
            coding,
        })
    }

    /// Every unit writable
    pub(crate) fn for_decode(
        k: usize,
        m: usize,
        data: &'a mut [&'b mut [u8]],
        coding: &'a mut [&'c mut [u8]],
    ) -> Result<Self> {
        let lengths = data
            .iter()
            .map(|d| d.len())
            .chain(coding.iter().map(|c| c.len()));
        let size = check_lengths(k, m, (data.len(), coding.len()), lengths)?;
        Ok(Self {
            k,
            size,
            data: DataUnits::Exclusive(data),
            coding,
        })
    }

    /// Bytes per unit
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn units(&self) -> usize {
        self.k + self.coding.len()
    }

    fn check_unit(&self, unit: usize) -> Result<()> {
        if unit >= self.units() {
            return Err(CodingError::BadParameters(format!(
                "unit {unit} does not exist, there are {} units",
                self.units()
            )));
        }
        Ok(())
    }

    fn unit_mut(&mut self, unit: usize) -> Result<&mut [u8]> {
        self.check_unit(unit)?;
        if unit >= self.k {
            return Ok(&mut *self.coding[unit - self.k]);
        }
        match &mut self.data {
            DataUnits::Exclusive(units) => Ok(&mut *units[unit]),
            DataUnits::Shared(_) => Err(read_only(unit)),
        }
    }

    /// `len` bytes of `src` at `src_off` and of `dst` at `dst_off`
    fn pair(
        &mut self,
        src: usize,
        src_off: usize,
        dst: usize,
        dst_off: usize,
        len: usize,
    ) -> Result<(&[u8], &mut [u8])> {
        self.check_unit(src)?;
        self.check_unit(dst)?;
        if src_off + len > self.size || dst_off + len > self.size {
            return Err(CodingError::BadParameters(format!(
                "range of {len} bytes at {src_off}/{dst_off} exceeds unit size {}",
                self.size
            )));
        }
        if src == dst {
            return split_within(self.unit_mut(dst)?, src_off, dst_off, len);
        }

        let k = self.k;
        let (s, d): (&[u8], &mut [u8]) = match (src < k, dst < k) {
            (true, true) => match &mut self.data {
                DataUnits::Exclusive(units) => {
                    let (s, d) = two_mut(units, src, dst);
                    (&**s, &mut **d)
                }
                DataUnits::Shared(_) => return Err(read_only(dst)),
            },
            (false, false) => {
                let (s, d) = two_mut(&mut *self.coding, src - k, dst - k);
                (&**s, &mut **d)
            }
            (true, false) => {
                let s: &[u8] = match &self.data {
                    DataUnits::Shared(units) => units[src],
                    DataUnits::Exclusive(units) => &*units[src],
                };
                (s, &mut *self.coding[dst - k])
            }
            (false, true) => match &mut self.data {
                DataUnits::Exclusive(units) => (&*self.coding[src - k], &mut *units[dst]),
                DataUnits::Shared(_) => return Err(read_only(dst)),
            },
        };
        Ok((&s[src_off..src_off + len], &mut d[dst_off..dst_off + len]))
    }

    pub(crate) fn copy(
        &mut self,
        src: usize,
        src_off: usize,
        dst: usize,
        dst_off: usize,
        len: usize,
    ) -> Result<()> {
        let (s, d) = self.pair(src, src_off, dst, dst_off, len)?;
        d.copy_from_slice(s);
        stats::add_copy(len);
        Ok(())
    }

    pub(crate) fn xor(
        &mut self,
        src: usize,
        src_off: usize,
        dst: usize,
        dst_off: usize,
        len: usize,
    ) -> Result<()> {
        let (s, d) = self.pair(src, src_off, dst, dst_off, len)?;
        region_xor(s, d);
        stats::add_xor(len);
        Ok(())
    }

    /// Whole-unit `dst = scalar * src` (or `^=` when `accumulate`)
    pub(crate) fn multiply(
        &mut self,
        field: &dyn FieldService,
        src: usize,
        dst: usize,
        scalar: u32,
        accumulate: bool,
    ) -> Result<()> {
        let size = self.size;
        let (s, d) = self.pair(src, 0, dst, 0, size)?;
        field.region_multiply(s, d, scalar, accumulate)?;
        stats::add_multiply(size);
        Ok(())
    }

    pub(crate) fn zero(&mut self, dst: usize, offset: usize, len: usize) -> Result<()> {
        let size = self.size;
        if offset + len > size {
            return Err(CodingError::BadParameters(format!(
                "range of {len} bytes at {offset} exceeds unit size {size}"
            )));
        }
        self.unit_mut(dst)?[offset..offset + len].fill(0);
        Ok(())
    }
}
