//! Redis-compatible HyperLogLog sketch engine.
//!
//! This crate estimates the number of distinct elements in a multiset using
//! constant memory, and serializes sketches in the exact binary layout used
//! by Redis's `PFADD`/`PFCOUNT`/`PFMERGE` family (the `HYLL` format), so
//! sketches can be exchanged with a running Redis instance byte for byte.
//!
//! # Overview
//!
//! A [`hll::HllSketch`] owns a single buffer holding 16384 logical 6-bit
//! registers in one of two encodings:
//!
//! - **Sparse**: a run-length opcode stream, used while most registers are
//!   zero. Compact (a few bytes to a few KB) but linear to update.
//! - **Dense**: a fully packed 12 KB bit array, used once the sparse form
//!   outgrows its size threshold. Promotion is one-way.
//!
//! Elements are hashed with MurmurHash64A under the engine's fixed seed;
//! the hash picks a register and a rank, and an add is a register-wise max.
//! Merging two sketches is also a register-wise max, which makes the union
//! commutative, associative, and idempotent.
//!
//! # Example
//!
//! ```
//! use pfutil::hll::HllSketch;
//!
//! let mut sketch = HllSketch::new();
//! sketch.add(b"a").unwrap();
//! sketch.add(b"b").unwrap();
//! sketch.add(b"a").unwrap();
//! assert_eq!(sketch.count(), 2);
//!
//! let bytes = sketch.to_bytes();
//! let mut restored = HllSketch::from_bytes(&bytes).unwrap();
//! assert_eq!(restored.count(), 2);
//! ```

mod codec;
pub mod error;
mod hash;
pub mod hll;

pub use error::{Error, ErrorKind, Result};
pub use hll::HllSketch;
