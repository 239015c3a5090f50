//! Counted string emission
//!
//! Strings travel as conformant varying arrays of UTF-16 code units:
//!
//! ```text
//! max_count: u32    # hoisted to the head of the enclosing type
//! offset: u32       # always 0
//! actual_count: u32 # code units actually present
//! units[actual_count]
//! padding to 4-byte alignment
//! ```
//!
//! Null termination is the caller's decision: the writer emits exactly the
//! code units of the supplied value and counts them as-is.

use crate::encode::Encoder;
use crate::error::Result;

/// Convert a string to UTF-16 code units for the wire.
pub(crate) fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

impl Encoder {
    /// Write the varying portion of a conformant varying string.
    ///
    /// The conformant maximum was hoisted by the scan and is not repeated
    /// here. The trailing alignment keeps any following primitive on a
    /// 4-byte boundary.
    pub(crate) fn write_conformant_varying_string(&mut self, s: &str) -> Result<()> {
        let units = utf16_units(s);

        self.align(4);
        self.ctx.put_u32(&mut self.out, 0); // offset
        self.ctx.put_u32(&mut self.out, units.len() as u32); // actual count
        for unit in &units {
            self.ctx.put_u16(&mut self.out, *unit);
        }
        self.align(4);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ByteOrder;
    use bytes::BytesMut;

    fn write(s: &str, order: ByteOrder) -> Vec<u8> {
        let mut enc = Encoder::new(BytesMut::new(), false);
        enc.set_endianness(order);
        enc.write_conformant_varying_string(s).unwrap();
        enc.bytes().to_vec()
    }

    #[test]
    fn test_ascii_string() {
        let out = write("Hi", ByteOrder::Little);
        assert_eq!(
            out,
            vec![
                0x00, 0x00, 0x00, 0x00, // offset
                0x02, 0x00, 0x00, 0x00, // actual count
                0x48, 0x00, 0x69, 0x00, // "Hi"
            ]
        );
    }

    #[test]
    fn test_empty_string() {
        let out = write("", ByteOrder::Little);
        assert_eq!(out, vec![0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_odd_length_pads_to_four() {
        let out = write("abc", ByteOrder::Little);
        // 8 header bytes + 6 unit bytes + 2 pad
        assert_eq!(out.len(), 16);
        assert_eq!(&out[14..], &[0, 0]);
    }

    #[test]
    fn test_non_bmp_counts_code_units() {
        // U+1F600 encodes as a surrogate pair: two code units.
        let out = write("\u{1F600}", ByteOrder::Little);
        assert_eq!(&out[4..8], &[0x02, 0x00, 0x00, 0x00]);
        assert_eq!(&out[8..12], &[0x3D, 0xD8, 0x00, 0xDE]);
    }

    #[test]
    fn test_big_endian_units() {
        let out = write("Hi", ByteOrder::Big);
        assert_eq!(&out[8..], &[0x00, 0x48, 0x00, 0x69]);
    }
}
