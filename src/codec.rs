//! Byte-level reader/writer helpers shared by the serialization code.

use std::io;
use std::io::{Cursor, Read};

pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }
}

pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    pub fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}
