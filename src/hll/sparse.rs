//! Sparse register codec - run-length opcode stream.
//!
//! While most registers are zero the register array is stored as a sequence
//! of one- and two-byte opcodes over an owned buffer:
//!
//! ```text
//! ZERO:  00xxxxxx            (x+1) consecutive zero registers, 1..=64
//! XZERO: 01xxxxxx yyyyyyyy   (xy+1) consecutive zero registers, 1..=16384
//! VAL:   1vvvvvcc            value (v+1) repeated (c+1) times,
//!                            value 1..=32, run 1..=4
//! ```
//!
//! Decoded in order, the stream always covers exactly 16384 registers.
//! Updates locate the run containing the target register, splice a
//! replacement sequence into the buffer, and re-merge mergeable VAL
//! neighbors so runs stay coalesced up to opcode capacity.

use crate::error::{Error, ErrorKind, Result};
use crate::hll::HLL_REGISTERS;
use crate::hll::dense::DenseRegisters;

/// Largest register value a VAL opcode can carry. Ranks above this force the
/// whole sketch to the dense encoding.
pub(crate) const SPARSE_VAL_MAX: u8 = 32;

const ZERO_RUN_MAX: usize = 64;
const XZERO_RUN_MAX: usize = 16384;
const VAL_RUN_MAX: usize = 4;

#[inline]
fn is_zero(b: u8) -> bool {
    b & 0xc0 == 0x00
}

#[inline]
fn is_xzero(b: u8) -> bool {
    b & 0xc0 == 0x40
}

#[inline]
fn zero_run_len(b: u8) -> usize {
    (b & 0x3f) as usize + 1
}

#[inline]
fn xzero_run_len(b1: u8, b2: u8) -> usize {
    ((((b1 & 0x3f) as usize) << 8) | b2 as usize) + 1
}

#[inline]
fn val_value(b: u8) -> u8 {
    ((b >> 2) & 0x1f) + 1
}

#[inline]
fn val_run_len(b: u8) -> usize {
    (b & 0x03) as usize + 1
}

#[inline]
fn encode_zero(len: usize) -> u8 {
    debug_assert!((1..=ZERO_RUN_MAX).contains(&len));
    (len - 1) as u8
}

#[inline]
fn encode_xzero(len: usize) -> [u8; 2] {
    debug_assert!((1..=XZERO_RUN_MAX).contains(&len));
    let n = (len - 1) as u16;
    [0x40 | (n >> 8) as u8, (n & 0xff) as u8]
}

#[inline]
fn encode_val(value: u8, len: usize) -> u8 {
    debug_assert!((1..=SPARSE_VAL_MAX).contains(&value));
    debug_assert!((1..=VAL_RUN_MAX).contains(&len));
    0x80 | ((value - 1) << 2) | (len - 1) as u8
}

/// One decoded run: `len` consecutive registers all equal to `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run {
    pub value: u8,
    pub len: usize,
}

/// Decode the opcode at `pos`. Returns the run it stands for and the opcode
/// length in bytes, or `None` at end of stream or on a truncated XZERO.
fn decode_op(ops: &[u8], pos: usize) -> Option<(Run, usize)> {
    let b = *ops.get(pos)?;
    if is_zero(b) {
        Some((Run { value: 0, len: zero_run_len(b) }, 1))
    } else if is_xzero(b) {
        let b2 = *ops.get(pos + 1)?;
        Some((Run { value: 0, len: xzero_run_len(b, b2) }, 2))
    } else {
        Some((Run { value: val_value(b), len: val_run_len(b) }, 1))
    }
}

/// Append opcodes covering `len` zero registers, chaining as needed.
fn push_zero_run(seq: &mut Vec<u8>, mut len: usize) {
    while len > 0 {
        if len > ZERO_RUN_MAX {
            let take = len.min(XZERO_RUN_MAX);
            seq.extend_from_slice(&encode_xzero(take));
            len -= take;
        } else {
            seq.push(encode_zero(len));
            len = 0;
        }
    }
}

/// Append opcodes covering `len` registers of `value`, chaining as needed.
fn push_val_run(seq: &mut Vec<u8>, value: u8, mut len: usize) {
    while len > 0 {
        let take = len.min(VAL_RUN_MAX);
        seq.push(encode_val(value, take));
        len -= take;
    }
}

#[derive(Debug)]
pub(crate) struct SparseRegisters {
    ops: Vec<u8>,
}

impl SparseRegisters {
    /// An all-zero register array: a single XZERO spanning every register.
    pub fn new() -> Self {
        Self {
            ops: encode_xzero(HLL_REGISTERS).to_vec(),
        }
    }

    /// Validate and adopt a raw opcode stream, e.g. a deserialized payload.
    ///
    /// The decoded runs must cover exactly the logical register count; a
    /// truncated XZERO or a run total that over- or undershoots is rejected.
    pub fn from_ops(ops: Vec<u8>) -> Result<Self> {
        let mut covered = 0usize;
        let mut pos = 0usize;
        while pos < ops.len() {
            let Some((run, op_len)) = decode_op(&ops, pos) else {
                return Err(Error::new(
                    ErrorKind::CorruptFormat,
                    "truncated opcode in sparse register stream",
                )
                .with_context("offset", pos));
            };
            covered += run.len;
            pos += op_len;
        }
        if covered != HLL_REGISTERS {
            return Err(Error::new(
                ErrorKind::CorruptFormat,
                "sparse register stream does not decode to the expected register count",
            )
            .with_context("expected", HLL_REGISTERS)
            .with_context("got", covered));
        }
        Ok(Self { ops })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ops
    }

    pub fn byte_len(&self) -> usize {
        self.ops.len()
    }

    /// Total register count covered by the stream. Always the full register
    /// count for streams built through this type; exposed so merge can
    /// re-check a source it did not build.
    pub fn logical_registers(&self) -> usize {
        self.runs().map(|run| run.len).sum()
    }

    /// Iterate the decoded runs in register order.
    pub fn runs(&self) -> Runs<'_> {
        Runs {
            ops: &self.ops,
            pos: 0,
        }
    }

    /// Raise the register at `index` to `value` (register-wise max).
    ///
    /// Returns whether the register changed. The caller must have ruled out
    /// values above [`SPARSE_VAL_MAX`]. On allocation failure the stream is
    /// left exactly as it was.
    pub fn set(&mut self, index: usize, value: u8) -> Result<bool> {
        debug_assert!(index < HLL_REGISTERS);
        debug_assert!((1..=SPARSE_VAL_MAX).contains(&value));

        // Locate the opcode whose run covers `index`, remembering the
        // previous opcode so the coalescing pass can reach the left neighbor.
        let mut pos = 0usize;
        let mut first = 0usize;
        let mut prev: Option<usize> = None;
        let (run, op_len) = loop {
            let Some((run, op_len)) = decode_op(&self.ops, pos) else {
                return Err(Error::new(
                    ErrorKind::CorruptFormat,
                    "sparse register stream ended before the target register",
                )
                .with_context("index", index));
            };
            if index < first + run.len {
                break (run, op_len);
            }
            first += run.len;
            prev = Some(pos);
            pos += op_len;
        };

        if run.value >= value {
            return Ok(false);
        }

        // Replace the run with: prefix of the old run, the new single-slot
        // value, suffix of the old run. At most XZERO + VAL + XZERO bytes.
        let before = index - first;
        let after = run.len - before - 1;
        let mut seq: Vec<u8> = Vec::with_capacity(5);
        if run.value == 0 {
            push_zero_run(&mut seq, before);
            seq.push(encode_val(value, 1));
            push_zero_run(&mut seq, after);
        } else {
            push_val_run(&mut seq, run.value, before);
            seq.push(encode_val(value, 1));
            push_val_run(&mut seq, run.value, after);
        }

        if seq.len() > op_len {
            self.ops.try_reserve(seq.len() - op_len).map_err(|err| {
                Error::new(
                    ErrorKind::AllocationFailure,
                    "failed to grow sparse register stream",
                )
                .with_context("additional", seq.len() - op_len)
                .set_source(err)
            })?;
        }
        self.ops.splice(pos..pos + op_len, seq).for_each(drop);

        self.coalesce_from(prev.unwrap_or(pos));
        Ok(true)
    }

    /// Merge adjacent VAL opcodes of the same value around a just-spliced
    /// region, as far as a single opcode can carry the combined run.
    fn coalesce_from(&mut self, start: usize) {
        let mut pos = start;
        // The replacement sequence is at most three opcodes; scanning a few
        // past it covers every pair the splice can have made adjacent.
        let mut remaining = 8;
        while remaining > 0 {
            let Some((run, op_len)) = decode_op(&self.ops, pos) else {
                return;
            };
            let next_pos = pos + op_len;
            match decode_op(&self.ops, next_pos) {
                Some((next, next_len))
                    if run.value != 0
                        && next.value == run.value
                        && run.len + next.len <= VAL_RUN_MAX =>
                {
                    self.ops[pos] = encode_val(run.value, run.len + next.len);
                    self.ops.drain(next_pos..next_pos + next_len).for_each(drop);
                    // Re-check the merged opcode against its new neighbor.
                }
                Some(_) => {
                    pos = next_pos;
                    remaining -= 1;
                }
                None => return,
            }
        }
    }

    /// Expand into a dense register array.
    pub fn to_dense(&self) -> Result<DenseRegisters> {
        let mut dense = DenseRegisters::new()?;
        let mut index = 0usize;
        for run in self.runs() {
            if run.value != 0 {
                for i in index..index + run.len {
                    dense.set(i, run.value);
                }
            }
            index += run.len;
        }
        Ok(dense)
    }
}

pub(crate) struct Runs<'a> {
    ops: &'a [u8],
    pos: usize,
}

impl Iterator for Runs<'_> {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        let (run, op_len) = decode_op(self.ops, self.pos)?;
        self.pos += op_len;
        Some(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_values(sparse: &SparseRegisters) -> Vec<u8> {
        let mut out = Vec::with_capacity(HLL_REGISTERS);
        for run in sparse.runs() {
            out.resize(out.len() + run.len, run.value);
        }
        out
    }

    #[test]
    fn test_opcode_roundtrip() {
        for len in 1..=ZERO_RUN_MAX {
            let b = encode_zero(len);
            assert!(is_zero(b));
            assert_eq!(zero_run_len(b), len);
        }
        for len in [1, 64, 65, 1000, XZERO_RUN_MAX] {
            let [b1, b2] = encode_xzero(len);
            assert!(is_xzero(b1));
            assert_eq!(xzero_run_len(b1, b2), len);
        }
        for value in 1..=SPARSE_VAL_MAX {
            for len in 1..=VAL_RUN_MAX {
                let b = encode_val(value, len);
                assert!(!is_zero(b) && !is_xzero(b));
                assert_eq!(val_value(b), value);
                assert_eq!(val_run_len(b), len);
            }
        }
    }

    #[test]
    fn test_new_covers_all_registers() {
        let sparse = SparseRegisters::new();
        assert_eq!(sparse.byte_len(), 2);
        assert_eq!(sparse.logical_registers(), HLL_REGISTERS);
        assert!(register_values(&sparse).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_set_splits_zero_run() {
        let mut sparse = SparseRegisters::new();
        assert!(sparse.set(1000, 7).unwrap());

        let values = register_values(&sparse);
        assert_eq!(values.len(), HLL_REGISTERS);
        assert_eq!(values[1000], 7);
        assert_eq!(values.iter().filter(|&&v| v != 0).count(), 1);
        assert_eq!(sparse.logical_registers(), HLL_REGISTERS);
    }

    #[test]
    fn test_set_at_stream_edges() {
        let mut sparse = SparseRegisters::new();
        assert!(sparse.set(0, 3).unwrap());
        assert!(sparse.set(HLL_REGISTERS - 1, 5).unwrap());

        let values = register_values(&sparse);
        assert_eq!(values[0], 3);
        assert_eq!(values[HLL_REGISTERS - 1], 5);
        assert_eq!(sparse.logical_registers(), HLL_REGISTERS);
    }

    #[test]
    fn test_set_is_monotonic() {
        let mut sparse = SparseRegisters::new();
        assert!(sparse.set(42, 9).unwrap());
        assert!(!sparse.set(42, 9).unwrap());
        assert!(!sparse.set(42, 4).unwrap());
        assert!(sparse.set(42, 12).unwrap());

        let values = register_values(&sparse);
        assert_eq!(values[42], 12);
    }

    #[test]
    fn test_adjacent_equal_values_coalesce() {
        let mut sparse = SparseRegisters::new();
        for index in [100, 101, 102, 103] {
            sparse.set(index, 6).unwrap();
        }

        // Four registers of the same value fit one VAL opcode, so the
        // stream must contain exactly one run of length 4.
        let run = sparse
            .runs()
            .find(|run| run.value == 6)
            .expect("value run present");
        assert_eq!(run.len, 4);

        let values = register_values(&sparse);
        assert!(values[100..=103].iter().all(|&v| v == 6));
        assert_eq!(sparse.logical_registers(), HLL_REGISTERS);
    }

    #[test]
    fn test_set_inside_value_run() {
        let mut sparse = SparseRegisters::new();
        for index in [200, 201, 202, 203] {
            sparse.set(index, 2).unwrap();
        }
        // Raise the middle of the run; the run splits around it.
        assert!(sparse.set(202, 11).unwrap());

        let values = register_values(&sparse);
        assert_eq!(&values[200..=203], &[2, 2, 11, 2]);
        assert_eq!(sparse.logical_registers(), HLL_REGISTERS);
    }

    #[test]
    fn test_from_ops_rejects_bad_totals() {
        // Covers one register too few.
        let short = encode_xzero(HLL_REGISTERS - 1).to_vec();
        let err = SparseRegisters::from_ops(short).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFormat);

        // Covers too many.
        let mut long = encode_xzero(HLL_REGISTERS).to_vec();
        long.push(encode_zero(1));
        let err = SparseRegisters::from_ops(long).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFormat);

        // Truncated XZERO: the second byte is missing.
        let err = SparseRegisters::from_ops(vec![0x7f]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFormat);
    }

    #[test]
    fn test_from_ops_accepts_roundtrip() {
        let mut sparse = SparseRegisters::new();
        for index in [5, 6, 99, 5000, 16000] {
            sparse.set(index, 8).unwrap();
        }
        let restored = SparseRegisters::from_ops(sparse.as_bytes().to_vec()).unwrap();
        assert_eq!(register_values(&restored), register_values(&sparse));
    }

    #[test]
    fn test_to_dense_preserves_values() {
        let mut sparse = SparseRegisters::new();
        sparse.set(0, 1).unwrap();
        sparse.set(777, 30).unwrap();
        sparse.set(HLL_REGISTERS - 1, 13).unwrap();

        let dense = sparse.to_dense().unwrap();
        let values = register_values(&sparse);
        for (index, &value) in values.iter().enumerate() {
            assert_eq!(dense.get(index), value, "register {index}");
        }
    }
}
