//! QQWry binary layout
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ Header (8 bytes)                           │
//! │   index_start: u32 LE                      │
//! │   index_end:   u32 LE  (last entry offset) │
//! ├────────────────────────────────────────────┤
//! │ Record region (variable length)            │
//! │   [end_ip: 4][mode byte | GBK string ...]  │
//! ├────────────────────────────────────────────┤
//! │ Index region (7-byte entries, sorted)      │
//! │   [start_ip: u32 LE][record_offset: u24 LE]│
//! └────────────────────────────────────────────┘
//! ```
//!
//! All offsets stored in the file are absolute byte positions.

use std::fmt;

/// Size of the file header in bytes
pub const HEADER_SIZE: usize = 8;

/// Size of one index entry in bytes
pub const INDEX_ENTRY_SIZE: usize = 7;

/// Reserved bytes at the start of every record (the range end address)
pub const RECORD_PREFIX_SIZE: usize = 4;

/// Size of a redirect pointer in bytes
pub const POINTER_SIZE: usize = 3;

/// Mode byte: the whole record (country and area) lives elsewhere
pub const MODE_REDIRECT: u8 = 0x01;

/// Mode byte: only the country string lives elsewhere
pub const MODE_COUNTRY_REDIRECT: u8 = 0x02;

/// Longest string (excluding terminator) a reader will scan for
pub const MAX_STRING_LEN: usize = 1024;

/// Largest offset a 3-byte pointer can express
pub const MAX_POINTER: usize = 0x00FF_FFFF;

/// Errors raised while reading the binary layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A read of `width` bytes at `offset` would pass the end of the buffer
    OutOfBounds {
        /// Requested offset
        offset: usize,
        /// Bytes requested
        width: usize,
        /// Buffer length
        len: usize,
    },
    /// No NUL terminator within the scan window
    Truncated {
        /// Offset the string started at
        offset: usize,
    },
    /// A redirect pointer was zero where a string is mandatory
    NullPointer {
        /// Offset of the pointer field
        at: usize,
    },
    /// A redirect led to another full redirect
    NestedRedirect {
        /// Offset of the second redirect
        at: usize,
    },
    /// The header does not describe a usable index region
    InvalidHeader(String),
    /// Index entries are not sorted by start address
    Unsorted {
        /// Position of the first entry that sorts before its predecessor
        entry: usize,
        /// Start address of the predecessor
        previous: u32,
        /// Start address of the offending entry
        current: u32,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::OutOfBounds { offset, width, len } => write!(
                f,
                "read of {} bytes at offset {} exceeds buffer of {} bytes",
                width, offset, len
            ),
            FormatError::Truncated { offset } => write!(
                f,
                "string at offset {} has no terminator within {} bytes",
                offset, MAX_STRING_LEN
            ),
            FormatError::NullPointer { at } => {
                write!(f, "null redirect pointer at offset {}", at)
            }
            FormatError::NestedRedirect { at } => {
                write!(f, "redirect chain too deep at offset {}", at)
            }
            FormatError::InvalidHeader(msg) => write!(f, "invalid header: {}", msg),
            FormatError::Unsorted {
                entry,
                previous,
                current,
            } => write!(
                f,
                "index entry {} starts at {} but follows an entry starting at {}",
                entry,
                std::net::Ipv4Addr::from(*current),
                std::net::Ipv4Addr::from(*previous)
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// Parsed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Offset of the first index entry
    pub index_start: usize,
    /// Offset of the last index entry
    pub index_end: usize,
}

impl Header {
    /// Parse and validate the header against the buffer it came from
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let index_start = crate::endian::read_u32_le(data, 0)? as usize;
        let index_end = crate::endian::read_u32_le(data, 4)? as usize;

        if index_start < HEADER_SIZE {
            return Err(FormatError::InvalidHeader(format!(
                "index starts at {} inside the header",
                index_start
            )));
        }
        if index_end < index_start {
            return Err(FormatError::InvalidHeader(format!(
                "index end {} precedes index start {}",
                index_end, index_start
            )));
        }
        if (index_end - index_start) % INDEX_ENTRY_SIZE != 0 {
            return Err(FormatError::InvalidHeader(format!(
                "index span {} is not a multiple of {}",
                index_end - index_start,
                INDEX_ENTRY_SIZE
            )));
        }
        if index_end
            .checked_add(INDEX_ENTRY_SIZE)
            .map_or(true, |end| end > data.len())
        {
            return Err(FormatError::InvalidHeader(format!(
                "last index entry at {} runs past end of file ({} bytes)",
                index_end,
                data.len()
            )));
        }

        Ok(Self {
            index_start,
            index_end,
        })
    }

    /// Number of entries in the index region
    pub fn entry_count(&self) -> usize {
        (self.index_end - self.index_start) / INDEX_ENTRY_SIZE + 1
    }
}
