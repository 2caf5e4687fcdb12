//! HyperLogLog sketch with Redis-compatible storage and wire format.
//!
//! # Overview
//!
//! The sketch keeps 16384 logical registers of 6 bits each. An element is
//! hashed to 64 bits; the low 14 bits pick a register and the rank of the
//! first set bit in the remaining 50 bits is stored into it with a
//! register-wise max. Cardinality is recovered from the harmonic mean of the
//! register values.
//!
//! Two storage encodings exist:
//!
//! - **Sparse**: a run-length opcode stream. A fresh sketch is two bytes.
//! - **Dense**: all registers packed into 12288 bytes.
//!
//! A sketch starts sparse and is promoted to dense once the opcode stream
//! outgrows [`SPARSE_MAX_BYTES`] or a register needs a rank a VAL opcode
//! cannot carry. Promotion is permanent.
//!
//! The serialized form (16-byte `HYLL` header plus the register payload in
//! the current encoding) is byte-compatible with Redis, so sketches produced
//! here can be handed to `PFCOUNT`/`PFMERGE` and vice versa.

mod dense;
mod estimator;
mod serialization;
mod sketch;
mod sparse;

pub use sketch::{Encoding, HllSketch};

/// Number of index bits: registers are selected by the hash's low 14 bits.
pub const HLL_P: u32 = 14;

/// Number of logical registers, fixed by the external format.
pub const HLL_REGISTERS: usize = 1 << HLL_P;

/// Bits of hash left over for rank computation.
pub const HLL_Q: u32 = 64 - HLL_P;

/// Bits per register in the dense encoding.
pub const HLL_BITS: u32 = 6;

/// Largest value a 6-bit register can hold.
pub const HLL_REGISTER_MAX: u8 = (1 << HLL_BITS) - 1;

/// Dense register payload size in bytes (16384 registers * 6 bits / 8).
pub const DENSE_BYTES: usize = HLL_REGISTERS * HLL_BITS as usize / 8;

/// Sparse streams larger than this are promoted to dense. Matches the
/// external engine's default `hll-sparse-max-bytes`.
pub const SPARSE_MAX_BYTES: usize = 3000;

/// Relative standard error of the estimate, 1.04 / sqrt(16384).
pub const RELATIVE_STD_ERROR: f64 = 1.04 / 128.0;

const INDEX_MASK: u64 = (HLL_REGISTERS - 1) as u64;

/// Split a 64-bit hash into a register index and the rank to store there.
///
/// The rank is the position of the least-significant set bit of the hash's
/// upper 50 bits, counted from 1. A sentinel bit at position 50 caps the rank
/// when those bits are all zero, which also keeps it well under the register
/// maximum.
#[inline]
pub(crate) fn register_target(hash: u64) -> (usize, u8) {
    let index = (hash & INDEX_MASK) as usize;
    let rest = (hash >> HLL_P) | (1 << HLL_Q);
    let rank = rest.trailing_zeros() as u8 + 1;
    (index, rank)
}
