//! Cardinality estimation from register contents.
//!
//! The raw estimate is the bias-corrected harmonic mean of the register
//! values. Two corrections bracket it: linear counting when the estimate is
//! small and zero registers remain (far more accurate there, and the branch
//! that makes an empty sketch report exactly 0), and a logarithmic
//! correction when the estimate approaches the 32-bit hash-collision range.

use crate::hll::HLL_REGISTERS;
use crate::hll::dense::DenseRegisters;
use crate::hll::sparse::SparseRegisters;

/// Standard bias constant alpha_m for m = 16384.
const ALPHA: f64 = 0.7213 / (1.0 + 1.079 / HLL_REGISTERS as f64);

const TWO_POW_32: f64 = (1u64 << 32) as f64;

// 2^-v for every register value, so the harmonic sum needs no powi calls.
const POW2_NEG: [f64; 64] = {
    let mut table = [0.0; 64];
    let mut i = 0;
    while i < 64 {
        table[i] = 1.0 / (1u64 << i) as f64;
        i += 1;
    }
    table
};

/// Estimate the cardinality of a dense register array.
pub(crate) fn dense_cardinality(registers: &DenseRegisters) -> u64 {
    let mut sum = 0.0f64;
    let mut zeros = 0u32;
    for index in 0..HLL_REGISTERS {
        let value = registers.get(index);
        sum += POW2_NEG[value as usize];
        if value == 0 {
            zeros += 1;
        }
    }
    estimate(sum, zeros)
}

/// Estimate the cardinality of a sparse register stream, run by run.
pub(crate) fn sparse_cardinality(registers: &SparseRegisters) -> u64 {
    let mut sum = 0.0f64;
    let mut zeros = 0u32;
    for run in registers.runs() {
        sum += run.len as f64 * POW2_NEG[run.value as usize];
        if run.value == 0 {
            zeros += run.len as u32;
        }
    }
    estimate(sum, zeros)
}

fn estimate(harmonic_sum: f64, zeros: u32) -> u64 {
    let m = HLL_REGISTERS as f64;
    let raw = ALPHA * m * m / harmonic_sum;

    let corrected = if raw <= 2.5 * m && zeros != 0 {
        // Linear counting from the fraction of untouched registers.
        m * (m / zeros as f64).ln()
    } else if raw > TWO_POW_32 / 30.0 {
        // Large-range correction for hash-space saturation.
        -TWO_POW_32 * (1.0 - raw / TWO_POW_32).ln()
    } else {
        raw
    };

    corrected.round() as u64
}
