//! The external `HYLL` byte layout.
//!
//! ```text
//! bytes 0..4    magic "HYLL"
//! byte  4       encoding tag: 0 = dense, 1 = sparse
//! bytes 5..8    reserved, zero on write, ignored on read
//! bytes 8..16   cached cardinality, u64 little-endian; bit 63 set means
//!               the cache is stale and must be recomputed
//! bytes 16..    register payload in the tagged encoding
//! ```
//!
//! The header is validated before the payload is trusted: bad magic, an
//! unknown tag, a dense payload of the wrong length, or a sparse stream
//! that does not decode to the full register count all reject the input.

use crate::codec::{SketchBytes, SketchSlice};
use crate::error::{Error, ErrorKind, Result};
use crate::hll::DENSE_BYTES;
use crate::hll::dense::DenseRegisters;
use crate::hll::sketch::Mode;
use crate::hll::sparse::SparseRegisters;

const MAGIC: &[u8; 4] = b"HYLL";
const HEADER_BYTES: usize = 16;
const ENCODING_DENSE: u8 = 0;
const ENCODING_SPARSE: u8 = 1;
const CARD_STALE_BIT: u64 = 1 << 63;

pub(super) fn serialize(mode: &Mode, cached_cardinality: Option<u64>) -> Vec<u8> {
    let (tag, payload) = match mode {
        Mode::Dense(registers) => (ENCODING_DENSE, registers.as_bytes()),
        Mode::Sparse(registers) => (ENCODING_SPARSE, registers.as_bytes()),
    };

    let mut out = SketchBytes::with_capacity(HEADER_BYTES + payload.len());
    out.write(MAGIC);
    out.write_u8(tag);
    out.write(&[0u8; 3]);
    out.write_u64_le(cached_cardinality.unwrap_or(CARD_STALE_BIT));
    out.write(payload);
    out.into_bytes()
}

pub(super) fn deserialize(bytes: &[u8]) -> Result<(Mode, Option<u64>)> {
    if bytes.len() < HEADER_BYTES {
        return Err(Error::new(
            ErrorKind::CorruptFormat,
            "input shorter than the fixed header",
        )
        .with_context("expected", HEADER_BYTES)
        .with_context("got", bytes.len()));
    }

    let mut header = SketchSlice::new(bytes);
    let mut magic = [0u8; 4];
    header
        .read_exact(&mut magic)
        .map_err(|err| Error::new(ErrorKind::CorruptFormat, "unreadable header").set_source(err))?;
    if &magic != MAGIC {
        return Err(Error::new(ErrorKind::CorruptFormat, "bad magic bytes")
            .with_context("got", format!("{magic:02x?}")));
    }

    let tag = header
        .read_u8()
        .map_err(|err| Error::new(ErrorKind::CorruptFormat, "unreadable header").set_source(err))?;

    let mut reserved = [0u8; 3];
    header
        .read_exact(&mut reserved)
        .map_err(|err| Error::new(ErrorKind::CorruptFormat, "unreadable header").set_source(err))?;

    let card = header
        .read_u64_le()
        .map_err(|err| Error::new(ErrorKind::CorruptFormat, "unreadable header").set_source(err))?;
    let cached_cardinality = if card & CARD_STALE_BIT != 0 {
        None
    } else {
        Some(card)
    };

    let payload = &bytes[HEADER_BYTES..];
    let mode = match tag {
        ENCODING_DENSE => {
            if payload.len() != DENSE_BYTES {
                return Err(Error::new(
                    ErrorKind::CorruptFormat,
                    "dense register payload has the wrong length",
                )
                .with_context("expected", DENSE_BYTES)
                .with_context("got", payload.len()));
            }
            Mode::Dense(DenseRegisters::from_bytes(payload.to_vec()))
        }
        ENCODING_SPARSE => Mode::Sparse(SparseRegisters::from_ops(payload.to_vec())?),
        other => {
            return Err(
                Error::new(ErrorKind::CorruptFormat, "unknown encoding tag")
                    .with_context("tag", other),
            );
        }
    };

    Ok((mode, cached_cardinality))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sparse_layout() {
        let bytes = serialize(&Mode::Sparse(SparseRegisters::new()), Some(0));
        // 16-byte header plus one XZERO opcode covering every register.
        assert_eq!(bytes.len(), 18);
        assert_eq!(&bytes[..4], b"HYLL");
        assert_eq!(bytes[4], ENCODING_SPARSE);
        assert_eq!(&bytes[5..8], &[0, 0, 0]);
        assert_eq!(&bytes[8..16], &0u64.to_le_bytes());
        assert_eq!(&bytes[16..], &[0x7f, 0xff]);
    }

    #[test]
    fn test_stale_cache_bit() {
        let bytes = serialize(&Mode::Sparse(SparseRegisters::new()), None);
        assert_eq!(bytes[15] & 0x80, 0x80);

        let (_, cache) = deserialize(&bytes).unwrap();
        assert_eq!(cache, None);

        let bytes = serialize(&Mode::Sparse(SparseRegisters::new()), Some(1234));
        let (_, cache) = deserialize(&bytes).unwrap();
        assert_eq!(cache, Some(1234));
    }

    #[test]
    fn test_rejects_truncated_and_corrupt_headers() {
        assert_eq!(
            deserialize(b"HYL").unwrap_err().kind(),
            ErrorKind::CorruptFormat
        );

        let mut bytes = serialize(&Mode::Sparse(SparseRegisters::new()), Some(0));
        bytes[0] = b'X';
        assert_eq!(deserialize(&bytes).unwrap_err().kind(), ErrorKind::CorruptFormat);

        let mut bytes = serialize(&Mode::Sparse(SparseRegisters::new()), Some(0));
        bytes[4] = 7;
        assert_eq!(deserialize(&bytes).unwrap_err().kind(), ErrorKind::CorruptFormat);
    }

    #[test]
    fn test_rejects_wrong_dense_length() {
        let registers = DenseRegisters::new().unwrap();
        let mut bytes = serialize(&Mode::Dense(registers), Some(0));
        bytes.pop();
        assert_eq!(deserialize(&bytes).unwrap_err().kind(), ErrorKind::CorruptFormat);
    }
}
