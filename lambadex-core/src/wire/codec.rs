//! Low-level packed codec helpers
//!
//! Scalars are little-endian on the wire; on-chain amounts are big-endian
//! 256-bit. Nothing here is serde: the layouts are byte-exact contracts with
//! the rollup host and must never drift.

use crate::core::errors::WireError;
use crate::core::types::{EthAddress, Side, Symbol};

/// A big-endian 256-bit unsigned integer, as used by ERC-20 amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Be256(pub [u8; 32]);

impl Be256 {
    pub const LENGTH: usize = 32;

    /// Narrow to u64 by taking the low 8 bytes. High bytes are discarded.
    #[inline]
    pub fn to_u64(&self) -> u64 {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..32]);
        u64::from_be_bytes(low)
    }

    #[inline]
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..32].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

/// Cursor over a raw payload.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: self.pos + n,
                got: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_address(&mut self) -> Result<EthAddress, WireError> {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(self.take(20)?);
        Ok(EthAddress(bytes))
    }

    pub fn read_symbol(&mut self) -> Result<Symbol, WireError> {
        let mut bytes = [0u8; 10];
        bytes.copy_from_slice(self.take(10)?);
        Ok(Symbol(bytes))
    }

    pub fn read_side(&mut self) -> Result<Side, WireError> {
        let byte = self.read_u8()?;
        Side::from_u8(byte).ok_or(WireError::InvalidSide { byte })
    }

    pub fn read_be256(&mut self) -> Result<Be256, WireError> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(self.take(32)?);
        Ok(Be256(bytes))
    }
}

/// Growable output buffer with packed little-endian writers.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_address(&mut self, address: &EthAddress) {
        self.buf.extend_from_slice(&address.0);
    }

    pub fn put_symbol(&mut self, symbol: &Symbol) {
        self.buf.extend_from_slice(&symbol.0);
    }

    pub fn put_side(&mut self, side: Side) {
        self.buf.push(side.as_u8());
    }

    pub fn put_be256(&mut self, value: &Be256) {
        self.buf.extend_from_slice(&value.0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
