//! Dense register codec - 6-bit packed register array.
//!
//! All 16384 registers live in a 12288-byte buffer, 6 bits each, packed
//! little-bit-endian so the buffer is byte-identical to the external
//! format's dense payload. A register either fits inside one byte (bit
//! offset 0..=2) or spans two adjacent bytes.

use crate::error::{Error, ErrorKind, Result};
use crate::hll::{DENSE_BYTES, HLL_BITS, HLL_REGISTERS};

const VAL_MASK: u8 = 0x3f;

#[derive(Debug)]
pub(crate) struct DenseRegisters {
    bytes: Vec<u8>,
}

impl DenseRegisters {
    /// Allocate an all-zero register array.
    pub fn new() -> Result<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(DENSE_BYTES).map_err(|err| {
            Error::new(
                ErrorKind::AllocationFailure,
                "failed to allocate dense register buffer",
            )
            .with_context("bytes", DENSE_BYTES)
            .set_source(err)
        })?;
        bytes.resize(DENSE_BYTES, 0);
        Ok(Self { bytes })
    }

    /// Wrap an existing payload. The caller must have verified the length.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), DENSE_BYTES);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read the register at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        debug_assert!(index < HLL_REGISTERS);
        let bit = index * HLL_BITS as usize;
        let byte = bit / 8;
        let shift = (bit % 8) as u32;

        if shift <= 2 {
            (self.bytes[byte] >> shift) & VAL_MASK
        } else {
            let low = self.bytes[byte] >> shift;
            let high = self.bytes[byte + 1] << (8 - shift);
            (low | high) & VAL_MASK
        }
    }

    /// Write the register at `index`, unconditionally.
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        debug_assert!(index < HLL_REGISTERS);
        debug_assert!(value <= VAL_MASK);
        let bit = index * HLL_BITS as usize;
        let byte = bit / 8;
        let shift = (bit % 8) as u32;

        if shift <= 2 {
            self.bytes[byte] &= !(VAL_MASK << shift);
            self.bytes[byte] |= value << shift;
        } else {
            let low_bits = 8 - shift;
            self.bytes[byte] &= !(0xff << shift);
            self.bytes[byte] |= value << shift;
            self.bytes[byte + 1] &= 0xff << (HLL_BITS - low_bits);
            self.bytes[byte + 1] |= value >> low_bits;
        }
    }

    /// Register-wise max update. Returns whether the register changed.
    #[inline]
    pub fn update(&mut self, index: usize, value: u8) -> bool {
        if value > self.get(index) {
            self.set(index, value);
            true
        } else {
            false
        }
    }
}
