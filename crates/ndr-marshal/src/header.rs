//! Type Serialization 1 framing headers
//!
//! A framed stream carries two fixed-size headers ahead of the body:
//!
//! Common header, 8 bytes: version (must be 1); one byte whose high nibble
//! is the endianness flag and whose low nibble is the character encoding;
//! the header length (8); four filler bytes of `0xCC`.
//!
//! Private header, 8 bytes: the length of the serialized top-level type
//! including its padding and excluding the headers, then four zero filler
//! bytes.
//!
//! Both headers are written little-endian regardless of the byte order
//! configured for the body.

use bytes::{BufMut, Bytes, BytesMut};

use crate::context::NdrContext;

pub const PROTOCOL_VERSION: u8 = 1;
pub const COMMON_HEADER_BYTES: u16 = 8;
pub const COMMON_HEADER_FILLER: u32 = 0xCCCC_CCCC;

/// Endianness flag values of the common header.
pub const BIG_ENDIAN: u8 = 0;
pub const LITTLE_ENDIAN: u8 = 1;

/// Character encoding flag values.
pub const ASCII: u8 = 0;
pub const EBCDIC: u8 = 1;

/// Floating point representation labels.
pub const IEEE: u8 = 0;
pub const VAX: u8 = 1;
pub const CRAY: u8 = 2;
pub const IBM: u8 = 3;

/// The 8-byte common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    pub version: u8,
    pub endianness: u8,
    pub character_encoding: u8,
    pub float_representation: u8,
    pub header_length: u16,
}

impl Default for CommonHeader {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            endianness: LITTLE_ENDIAN,
            character_encoding: ASCII,
            float_representation: IEEE,
            header_length: COMMON_HEADER_BYTES,
        }
    }
}

impl CommonHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.endianness << 4 | self.character_encoding);
        buf.put_u16_le(self.header_length);
        buf.put_u32_le(COMMON_HEADER_FILLER);
    }
}

/// The 8-byte private header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrivateHeader {
    /// Length of the padded body, a multiple of 8.
    pub object_buffer_length: u32,
}

impl PrivateHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.object_buffer_length);
        buf.put_u32_le(0);
    }
}

/// Pad `body` in place to a multiple of 8 and return the framed stream:
/// common header, private header, padded body.
pub(crate) fn frame(body: &mut BytesMut) -> Bytes {
    let padding = NdrContext::align_padding(body.len(), 8);
    body.put_bytes(0, padding);

    let mut framed = BytesMut::with_capacity(16 + body.len());
    CommonHeader::default().write_to(&mut framed);
    PrivateHeader {
        object_buffer_length: body.len() as u32,
    }
    .write_to(&mut framed);
    framed.extend_from_slice(body);
    framed.freeze()
}
