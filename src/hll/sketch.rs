//! The HyperLogLog sketch.

use crate::error::{Error, ErrorKind, Result};
use crate::hash;
use crate::hll::dense::DenseRegisters;
use crate::hll::sparse::{SPARSE_VAL_MAX, SparseRegisters};
use crate::hll::{
    DENSE_BYTES, HLL_REGISTERS, SPARSE_MAX_BYTES, estimator, register_target, serialization,
};

/// Storage encoding of a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Dense,
    Sparse,
}

#[derive(Debug)]
pub(super) enum Mode {
    Dense(DenseRegisters),
    Sparse(SparseRegisters),
}

/// A probabilistic distinct-element counter over 16384 six-bit registers.
///
/// The sketch exclusively owns one register buffer; dropping the sketch
/// releases it. Registers only ever grow: `add` and `merge` are
/// register-wise max operations, so the same element never inflates the
/// estimate and merging is commutative, associative, and idempotent.
///
/// A cardinality cache sits beside the registers. Every mutation that
/// changes a register invalidates it; [`HllSketch::count`] recomputes it
/// lazily. The relative standard error of the estimate is about 0.81%
/// ([`crate::hll::RELATIVE_STD_ERROR`]).
#[derive(Debug)]
pub struct HllSketch {
    mode: Mode,
    cached_cardinality: Option<u64>,
}

impl Default for HllSketch {
    fn default() -> Self {
        Self::new()
    }
}

impl HllSketch {
    /// Create an empty sketch: all registers zero, sparse encoding.
    pub fn new() -> Self {
        Self {
            mode: Mode::Sparse(SparseRegisters::new()),
            cached_cardinality: Some(0),
        }
    }

    /// Create a sketch holding every element of `elements`.
    pub fn from_elements<I, T>(elements: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut sketch = Self::new();
        sketch.add_all(elements)?;
        Ok(sketch)
    }

    /// Reconstruct a sketch from its serialized byte layout.
    ///
    /// The header and payload are fully validated; corrupted input is
    /// rejected with [`ErrorKind::CorruptFormat`] and no sketch is produced.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (mode, cached_cardinality) = serialization::deserialize(bytes)?;
        Ok(Self {
            mode,
            cached_cardinality,
        })
    }

    /// Serialize into the external byte layout.
    ///
    /// The cached-cardinality header field carries the stale bit when the
    /// registers have changed since the last [`HllSketch::count`].
    pub fn to_bytes(&self) -> Vec<u8> {
        serialization::serialize(&self.mode, self.cached_cardinality)
    }

    /// Current storage encoding.
    pub fn encoding(&self) -> Encoding {
        match self.mode {
            Mode::Dense(_) => Encoding::Dense,
            Mode::Sparse(_) => Encoding::Sparse,
        }
    }

    /// Add one element. The empty byte sequence is a valid element.
    ///
    /// Returns whether any register changed, i.e. whether the element was
    /// (up to hash collisions) new. On error the sketch is unchanged.
    pub fn add(&mut self, element: &[u8]) -> Result<bool> {
        let (index, rank) = register_target(hash::element_hash(element));
        let changed = self.set_register(index, rank)?;
        if changed {
            self.cached_cardinality = None;
        }
        Ok(changed)
    }

    /// Add a batch of elements. Returns whether any register changed.
    pub fn add_all<I, T>(&mut self, elements: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut changed = false;
        for element in elements {
            changed |= self.add(element.as_ref())?;
        }
        Ok(changed)
    }

    /// Fold `other` into `self`: every register becomes the max of the two.
    ///
    /// The destination always ends up dense; a union of two non-trivial
    /// sketches is rarely worth keeping sparse. A source whose logical
    /// register count differs is rejected with
    /// [`ErrorKind::DimensionMismatch`] before the destination is touched.
    pub fn merge(&mut self, other: &HllSketch) -> Result<()> {
        match &other.mode {
            Mode::Dense(registers) => {
                if registers.as_bytes().len() != DENSE_BYTES {
                    return Err(dimension_mismatch(registers.as_bytes().len() * 8 / 6));
                }
            }
            Mode::Sparse(registers) => {
                let covered = registers.logical_registers();
                if covered != HLL_REGISTERS {
                    return Err(dimension_mismatch(covered));
                }
            }
        }

        self.promote_to_dense()?;
        if let Mode::Dense(dst) = &mut self.mode {
            match &other.mode {
                Mode::Dense(src) => {
                    for index in 0..HLL_REGISTERS {
                        let value = src.get(index);
                        if value != 0 {
                            dst.update(index, value);
                        }
                    }
                }
                Mode::Sparse(src) => {
                    let mut index = 0usize;
                    for run in src.runs() {
                        if run.value != 0 {
                            for i in index..index + run.len {
                                dst.update(i, run.value);
                            }
                        }
                        index += run.len;
                    }
                }
            }
        }
        self.cached_cardinality = None;
        Ok(())
    }

    /// Estimate the number of distinct elements added so far.
    ///
    /// Served from the cache when no register has changed since the last
    /// call; otherwise recomputed from the current encoding and re-cached.
    pub fn count(&mut self) -> u64 {
        if let Some(cardinality) = self.cached_cardinality {
            return cardinality;
        }
        let cardinality = match &self.mode {
            Mode::Dense(registers) => estimator::dense_cardinality(registers),
            Mode::Sparse(registers) => estimator::sparse_cardinality(registers),
        };
        self.cached_cardinality = Some(cardinality);
        cardinality
    }

    /// Decoded logical register values, in index order.
    pub fn registers(&self) -> Vec<u8> {
        match &self.mode {
            Mode::Dense(registers) => (0..HLL_REGISTERS).map(|i| registers.get(i)).collect(),
            Mode::Sparse(registers) => {
                let mut out = Vec::with_capacity(HLL_REGISTERS);
                for run in registers.runs() {
                    out.resize(out.len() + run.len, run.value);
                }
                out
            }
        }
    }

    /// Raise one register to `rank`, switching encodings when sparse
    /// storage cannot take the update.
    fn set_register(&mut self, index: usize, rank: u8) -> Result<bool> {
        if let Mode::Sparse(registers) = &self.mode {
            // A VAL opcode cannot carry ranks above its capacity, and one
            // splice can grow the stream by a few bytes; promote up front
            // so the update itself can never leave the stream over budget.
            if rank > SPARSE_VAL_MAX || registers.byte_len() + 3 > SPARSE_MAX_BYTES {
                self.promote_to_dense()?;
            }
        }
        match &mut self.mode {
            Mode::Dense(registers) => Ok(registers.update(index, rank)),
            Mode::Sparse(registers) => registers.set(index, rank),
        }
    }

    /// One-way conversion to the dense encoding. No-op when already dense;
    /// on allocation failure the sketch keeps its sparse form intact.
    fn promote_to_dense(&mut self) -> Result<()> {
        if let Mode::Sparse(registers) = &self.mode {
            self.mode = Mode::Dense(registers.to_dense()?);
        }
        Ok(())
    }
}

fn dimension_mismatch(got: usize) -> Error {
    Error::new(
        ErrorKind::DimensionMismatch,
        "merge source register count differs from destination",
    )
    .with_context("expected", HLL_REGISTERS)
    .with_context("got", got)
}
