mod murmurhash;

pub(crate) use murmurhash::murmur_hash64a;

/// Hash seed fixed by the external `HYLL` format. Register placement must
/// reproduce identically across implementations, so this is not tunable.
pub(crate) const ELEMENT_HASH_SEED: u64 = 0xadc83b19;

/// Hash an element the way the external engine does.
#[inline]
pub(crate) fn element_hash(data: &[u8]) -> u64 {
    murmur_hash64a(data, ELEMENT_HASH_SEED)
}
