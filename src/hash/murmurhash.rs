//! MurmurHash64A, the 64-bit MurmurHash2 variant.
//!
//! This is the hash the external `HYLL` format is defined against. It is a
//! fast, non-cryptographic hash with good avalanche behavior; the output must
//! match the reference implementation bit for bit, since register placement
//! is derived directly from it.

use byteorder::ByteOrder;
use byteorder::LE;

const M: u64 = 0xc6a4a7935bd1e995;
const R: u32 = 47;

/// Hash an arbitrary byte sequence (including the empty one) to 64 bits.
///
/// Bytes are consumed as little-endian 8-byte blocks; the tail of fewer than
/// 8 bytes is read little-endian as well, matching the reference
/// implementation on little-endian hosts regardless of the host's own
/// endianness.
pub(crate) fn murmur_hash64a(data: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (data.len() as u64).wrapping_mul(M);

    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        let mut k = LE::read_u64(block);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        h ^= LE::read_uint(tail, tail.len());
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}

#[cfg(test)]
mod tests {
    use super::murmur_hash64a;
    use crate::hash::ELEMENT_HASH_SEED;

    // Reference values computed with the canonical C MurmurHash64A under the
    // engine's fixed seed.
    #[test]
    fn test_reference_vectors() {
        let cases: &[(&[u8], u64)] = &[
            (b"", 0xd8df_ea65_85bc_9732),
            (b"a", 0x53d2_470a_9b43_b1a7),
            (b"b", 0xf10c_df96_c004_fda4),
            (b"hello", 0x0f65_6f01_eecf_e400),
            (b"hello world", 0xa919_bc30_51f6_24b7),
            // 7-byte tail, no full block
            (b"0123456", 0x559c_262a_7f70_60f4),
            // two full blocks, no tail
            (
                &[
                    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
                    0x0d, 0x0e, 0x0f,
                ],
                0x1233_ffe7_833f_4e22,
            ),
            // long input with a 3-byte tail
            (
                b"The quick brown fox jumps over the lazy dog",
                0x5160_6c5c_5b56_1ace,
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(
                murmur_hash64a(input, ELEMENT_HASH_SEED),
                *expected,
                "input: {input:?}"
            );
        }
    }

    #[test]
    fn test_deterministic_and_seed_sensitive() {
        assert_eq!(
            murmur_hash64a(b"element", 0x1234),
            murmur_hash64a(b"element", 0x1234)
        );
        assert_ne!(
            murmur_hash64a(b"element", 0x1234),
            murmur_hash64a(b"element", 0x1235)
        );
    }
}
