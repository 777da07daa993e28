//! Null bitmask: one presence bit per nullable field.
//!
//! Bit `i` belongs to the `i`-th nullable field in declaration order and lives
//! in byte `i / 8` at bit position `i % 8` (least significant bit first).
//! A set bit means the field is present. Unused high bits of the last byte
//! must be zero.

use crate::core::varint::take;
use crate::error::{ProtocolError, Result};

/// Bytes needed for `nullable_count` presence bits
#[inline]
pub const fn bitmask_width(nullable_count: usize) -> usize {
    nullable_count.div_ceil(8)
}

/// Mark bit `bit` as present in an encode-side bitmask
#[inline]
pub fn set_present(bytes: &mut [u8], bit: usize) {
    bytes[bit / 8] |= 1 << (bit % 8);
}

/// Read-only view over a decoded bitmask
#[derive(Debug, Clone, Copy)]
pub struct NullBitmask<'a> {
    bytes: &'a [u8],
    nullable_count: usize,
}

impl<'a> NullBitmask<'a> {
    /// Read the bitmask of a record with `nullable_count` nullable fields
    /// starting at `position`.
    ///
    /// # Errors
    /// `TruncatedInput` when the bytes are missing, `BitmaskInconsistent`
    /// when a bit beyond `nullable_count` is set.
    pub fn read(buf: &'a [u8], position: usize, nullable_count: usize) -> Result<Self> {
        let width = bitmask_width(nullable_count);
        let bytes = take(buf, position, width)?;

        let used = nullable_count % 8;
        if used != 0 {
            let last = bytes[width - 1];
            let unused_mask = !((1u8 << used) - 1);
            if last & unused_mask != 0 {
                return Err(ProtocolError::BitmaskInconsistent {
                    position: position + width - 1,
                    byte: last,
                });
            }
        }

        Ok(Self {
            bytes,
            nullable_count,
        })
    }

    /// Whether the nullable field with bit index `bit` is present
    #[inline]
    pub fn is_present(&self, bit: usize) -> bool {
        bit < self.nullable_count && self.bytes[bit / 8] & (1 << (bit % 8)) != 0
    }

    /// Presence of a field given its optional bit index; required fields are always present
    #[inline]
    pub fn field_present(&self, null_bit: Option<usize>) -> bool {
        null_bit.map_or(true, |bit| self.is_present(bit))
    }

    /// Number of present nullable fields
    pub fn present_count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_width() {
        assert_eq!(bitmask_width(0), 0);
        assert_eq!(bitmask_width(1), 1);
        assert_eq!(bitmask_width(8), 1);
        assert_eq!(bitmask_width(9), 2);
    }

    #[test]
    fn test_declaration_order_lsb_first() {
        let mut bytes = [0u8; 2];
        set_present(&mut bytes, 0);
        set_present(&mut bytes, 3);
        set_present(&mut bytes, 8);
        assert_eq!(bytes, [0b0000_1001, 0b0000_0001]);

        let mask = NullBitmask::read(&bytes, 0, 9).unwrap();
        assert!(mask.is_present(0));
        assert!(!mask.is_present(1));
        assert!(mask.is_present(3));
        assert!(mask.is_present(8));
        assert!(!mask.is_present(9));
        assert_eq!(mask.present_count(), 3);
    }

    #[test]
    fn test_padding_bits_rejected() {
        let err = NullBitmask::read(&[0b0000_0100], 0, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BitmaskInconsistent);
        assert!(NullBitmask::read(&[0xFF], 0, 8).is_ok());
    }

    #[test]
    fn test_empty_bitmask() {
        let mask = NullBitmask::read(&[], 0, 0).unwrap();
        assert!(!mask.is_present(0));
    }

    #[test]
    fn test_truncated_bitmask() {
        let err = NullBitmask::read(&[0x01], 0, 12).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }
}
