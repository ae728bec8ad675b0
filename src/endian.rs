//! Little-endian integer access for QQWry buffers
//!
//! QQWry stores every multi-byte integer little-endian: 32-bit values in the
//! header and index keys, 24-bit values for record offsets and redirect
//! pointers. The readers here never trust the buffer length; each one checks
//! `offset + width <= buffer.len()` with overflow-safe arithmetic and returns
//! [`FormatError::OutOfBounds`] instead of panicking.
//!
//! # Usage Pattern
//!
//! ```rust
//! use qqwry::endian::{read_u24_le, read_u32_le};
//!
//! let buffer = [0x78, 0x56, 0x34, 0x12, 0xAA, 0xBB, 0xCC];
//! assert_eq!(read_u32_le(&buffer, 0).unwrap(), 0x12345678);
//! assert_eq!(read_u24_le(&buffer, 4).unwrap(), 0x00CCBBAA);
//! assert!(read_u32_le(&buffer, 4).is_err());
//! ```

use crate::format::FormatError;

/// Borrow `width` bytes at `offset`, or report how far out of range the read was
#[inline]
pub fn slice_at(buffer: &[u8], offset: usize, width: usize) -> Result<&[u8], FormatError> {
    offset
        .checked_add(width)
        .filter(|&end| end <= buffer.len())
        .map(|end| &buffer[offset..end])
        .ok_or(FormatError::OutOfBounds {
            offset,
            width,
            len: buffer.len(),
        })
}

/// Read a single byte
#[inline]
pub fn read_u8(buffer: &[u8], offset: usize) -> Result<u8, FormatError> {
    slice_at(buffer, offset, 1).map(|b| b[0])
}

/// Read a u32 in little-endian format
#[inline]
pub fn read_u32_le(buffer: &[u8], offset: usize) -> Result<u32, FormatError> {
    let b = slice_at(buffer, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read a 3-byte little-endian value, zero-extended to u32
#[inline]
pub fn read_u24_le(buffer: &[u8], offset: usize) -> Result<u32, FormatError> {
    let b = slice_at(buffer, offset, 3)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

/// Append a 3-byte little-endian value
///
/// Only the low 24 bits are written; callers must range-check first.
#[inline]
pub fn push_u24_le(out: &mut Vec<u8>, value: u32) {
    debug_assert!(value <= 0x00FF_FFFF);
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Overwrite a 3-byte little-endian value in place
pub fn write_u24_le(buffer: &mut [u8], offset: usize, value: u32) -> Result<(), FormatError> {
    debug_assert!(value <= 0x00FF_FFFF);
    let len = buffer.len();
    let end = offset
        .checked_add(3)
        .filter(|&end| end <= len)
        .ok_or(FormatError::OutOfBounds {
            offset,
            width: 3,
            len,
        })?;
    buffer[offset..end].copy_from_slice(&value.to_le_bytes()[..3]);
    Ok(())
}
