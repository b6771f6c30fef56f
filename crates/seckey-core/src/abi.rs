//! Minimal binary serialization framework
//!
//! Values write themselves into an [`AbiEncoder`] and read themselves back
//! from an [`AbiDecoder`]. Fixed-size fields are written raw, without length
//! prefixes, so a type's `from_abi` must know every field length up front.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("{count} trailing bytes after {type_name}")]
    TrailingBytes {
        type_name: &'static str,
        count: usize,
    },
}

/// A type with a binary encoding
pub trait AbiSerializable: Sized {
    /// Type name used by ABI definitions and decode errors
    const ABI_NAME: &'static str;

    type Error: From<AbiError>;

    fn to_abi(&self, encoder: &mut AbiEncoder);

    fn from_abi(decoder: &mut AbiDecoder<'_>) -> Result<Self, Self::Error>;
}

/// Append-only byte sink
#[derive(Debug, Default, Clone)]
pub struct AbiEncoder {
    buf: Vec<u8>,
}

impl AbiEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_array(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed buffer. Every read is bounds checked.
#[derive(Debug, Clone)]
pub struct AbiDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AbiDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, AbiError> {
        Ok(self.read_slice(1)?[0])
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], AbiError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(AbiError::UnexpectedEof {
                needed: len,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], AbiError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }
}

/// Encode a single value
pub fn encode<T: AbiSerializable>(value: &T) -> Vec<u8> {
    let mut encoder = AbiEncoder::new();
    value.to_abi(&mut encoder);
    encoder.into_bytes()
}

/// Decode a single value that must span the whole buffer
pub fn decode<T: AbiSerializable>(data: &[u8]) -> Result<T, T::Error> {
    let mut decoder = AbiDecoder::new(data);
    let value = T::from_abi(&mut decoder)?;
    if !decoder.is_empty() {
        return Err(AbiError::TrailingBytes {
            type_name: T::ABI_NAME,
            count: decoder.remaining(),
        }
        .into());
    }
    Ok(value)
}
