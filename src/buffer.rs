//! Immutable database bytes with bounds-checked readers
//!
//! A [`Buffer`] is filled once and never written again. Every accessor takes
//! an absolute offset, so any number of threads can read the same buffer
//! without coordination.
//!
//! # Safety
//!
//! The contents come from an untrusted file. No accessor indexes without a
//! length check; malformed offsets surface as [`FormatError`] values.

use crate::endian;
use crate::format::{FormatError, MAX_STRING_LEN};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Storage for database bytes - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

/// Read-only view of a QQWry file
pub struct Buffer {
    storage: Storage,
}

impl Buffer {
    /// Read the whole file into memory (`.gz` files are decompressed)
    pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = crate::file_reader::read_all(path)?;
        Ok(Self::from_vec(data))
    }

    /// Memory-map the file
    ///
    /// The mapping is read-only. Modifying the file while it is mapped is
    /// outside this crate's control; use [`Buffer::read`] if the file may be
    /// replaced in place.
    pub fn map<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            storage: Storage::Mmap(mmap),
        })
    }

    /// Wrap bytes that are already in memory
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(data),
        }
    }

    /// Entire contents
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }

    /// Size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True when the buffer holds no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when backed by a memory map
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mmap(_))
    }

    /// Read one byte
    #[inline]
    pub fn read_u8(&self, offset: usize) -> Result<u8, FormatError> {
        endian::read_u8(self.as_slice(), offset)
    }

    /// Read a 3-byte little-endian value, zero-extended
    #[inline]
    pub fn read_u24_le(&self, offset: usize) -> Result<u32, FormatError> {
        endian::read_u24_le(self.as_slice(), offset)
    }

    /// Read a 4-byte little-endian value
    #[inline]
    pub fn read_u32_le(&self, offset: usize) -> Result<u32, FormatError> {
        endian::read_u32_le(self.as_slice(), offset)
    }

    /// Read a NUL-terminated string, without the terminator
    ///
    /// The scan stops after [`MAX_STRING_LEN`] bytes. An offset at or past the
    /// end of the buffer is `OutOfBounds`; a missing terminator is `Truncated`.
    pub fn read_cstring(&self, offset: usize) -> Result<&[u8], FormatError> {
        cstring_at(self.as_slice(), offset)
    }
}

/// NUL-terminated string starting at `offset` in `data`
pub(crate) fn cstring_at(data: &[u8], offset: usize) -> Result<&[u8], FormatError> {
    if offset >= data.len() {
        return Err(FormatError::OutOfBounds {
            offset,
            width: 1,
            len: data.len(),
        });
    }

    // Window includes room for the terminator after a maximal string
    let window_end = data.len().min(offset.saturating_add(MAX_STRING_LEN + 1));
    let window = &data[offset..window_end];

    match memchr::memchr(0, window) {
        Some(nul) => Ok(&window[..nul]),
        None => Err(FormatError::Truncated { offset }),
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_cstring() {
        let buffer = Buffer::from_vec(b"abc\0\0xyz\0".to_vec());
        assert_eq!(buffer.read_cstring(0).unwrap(), b"abc");
        assert_eq!(buffer.read_cstring(3).unwrap(), b"");
        assert_eq!(buffer.read_cstring(5).unwrap(), b"xyz");
        assert_eq!(buffer.read_cstring(1).unwrap(), b"bc");
    }

    #[test]
    fn test_cstring_past_end() {
        let buffer = Buffer::from_vec(b"abc\0".to_vec());
        assert!(matches!(
            buffer.read_cstring(4),
            Err(FormatError::OutOfBounds { offset: 4, .. })
        ));
        assert!(matches!(
            buffer.read_cstring(usize::MAX),
            Err(FormatError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_cstring_without_terminator() {
        let buffer = Buffer::from_vec(b"no terminator here".to_vec());
        assert_eq!(
            buffer.read_cstring(3),
            Err(FormatError::Truncated { offset: 3 })
        );
    }

    #[test]
    fn test_cstring_cap() {
        let mut data = vec![b'a'; MAX_STRING_LEN];
        data.push(0);
        let buffer = Buffer::from_vec(data.clone());
        assert_eq!(buffer.read_cstring(0).unwrap().len(), MAX_STRING_LEN);

        // One byte longer than the cap is rejected even though a NUL follows
        data.insert(0, b'a');
        let buffer = Buffer::from_vec(data);
        assert_eq!(
            buffer.read_cstring(0),
            Err(FormatError::Truncated { offset: 0 })
        );
    }

    #[test]
    fn test_integer_readers() {
        let buffer = Buffer::from_vec(vec![0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(buffer.read_u8(4).unwrap(), 0x05);
        assert_eq!(buffer.read_u24_le(2).unwrap(), 0x050403);
        assert_eq!(buffer.read_u32_le(1).unwrap(), 0x05040302);
        assert!(buffer.read_u32_le(2).is_err());
    }

    #[test]
    fn test_map_and_read_agree() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\x08\x00\x00\x00hello\0").unwrap();
        file.flush().unwrap();

        let mapped = Buffer::map(file.path()).unwrap();
        let owned = Buffer::read(file.path()).unwrap();
        assert!(mapped.is_mapped());
        assert!(!owned.is_mapped());
        assert_eq!(mapped.as_slice(), owned.as_slice());
        assert_eq!(mapped.read_cstring(4).unwrap(), b"hello");
    }

    #[test]
    fn test_nonexistent_file() {
        let err = Buffer::read("/nonexistent/path/qqwry.dat").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(Buffer::map("/nonexistent/path/qqwry.dat").is_err());
    }
}
