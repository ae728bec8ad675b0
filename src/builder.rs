//! QQWry database builder
//!
//! Produces a complete QQWry file from a list of address ranges. Strings are
//! GBK encoded and shared the same way published databases share them:
//!
//! - a range whose (country, area) pair was already written becomes a full
//!   redirect (`0x01`) to the earlier location block
//! - a range whose country was already written redirects the country (`0x02`)
//!   and stores or redirects its area
//! - an empty area is a zero area pointer
//!
//! Address space not covered by any range is filled with placeholder ranges,
//! so every IPv4 address resolves in the output.
//!
//! # Example
//!
//! ```
//! use qqwry::{Database, DatabaseBuilder};
//! use std::net::Ipv4Addr;
//!
//! let mut builder = DatabaseBuilder::new();
//! builder.add_range(
//!     Ipv4Addr::new(10, 0, 0, 0),
//!     Ipv4Addr::new(10, 255, 255, 255),
//!     "局域网",
//!     "对方和您在同一内部网",
//! )?;
//! let db = Database::from_bytes(builder.build()?)?;
//! assert_eq!(db.lookup(Ipv4Addr::new(10, 1, 2, 3))?.country, "局域网");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::endian::push_u24_le;
use crate::format::{
    HEADER_SIZE, INDEX_ENTRY_SIZE, MAX_POINTER, MAX_STRING_LEN, MODE_COUNTRY_REDIRECT,
    MODE_REDIRECT,
};
use crate::transcode::encode_gbk;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Country written for uncovered address space
pub const GAP_COUNTRY: &str = "IANA";

/// Area written for uncovered address space
pub const GAP_AREA: &str = "CZ88.NET";

/// Error building a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Range start is above its end
    InvalidRange {
        /// Range start
        start: Ipv4Addr,
        /// Range end
        end: Ipv4Addr,
    },
    /// Two ranges share addresses
    Overlap {
        /// End of the earlier range
        previous_end: Ipv4Addr,
        /// Start of the overlapping range
        start: Ipv4Addr,
    },
    /// Text that cannot be stored as a GBK C string
    InvalidText(String),
    /// Output exceeds the 24-bit offset space
    TooLarge(usize),
    /// No ranges were added
    Empty,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidRange { start, end } => {
                write!(f, "Range start {} is above end {}", start, end)
            }
            BuildError::Overlap {
                previous_end,
                start,
            } => write!(
                f,
                "Range starting at {} overlaps range ending at {}",
                start, previous_end
            ),
            BuildError::InvalidText(text) => {
                write!(f, "Text cannot be stored as GBK: {:?}", text)
            }
            BuildError::TooLarge(size) => write!(
                f,
                "Database of {} bytes exceeds the 24-bit offset limit",
                size
            ),
            BuildError::Empty => write!(f, "No ranges to build"),
        }
    }
}

impl std::error::Error for BuildError {}

#[derive(Debug, Clone)]
struct Range {
    start: u32,
    end: u32,
    country: Vec<u8>,
    area: Vec<u8>,
}

/// Builder for QQWry databases
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    ranges: Vec<Range>,
}

impl DatabaseBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an inclusive address range
    pub fn add_range(
        &mut self,
        start: Ipv4Addr,
        end: Ipv4Addr,
        country: &str,
        area: &str,
    ) -> Result<&mut Self, BuildError> {
        if u32::from(start) > u32::from(end) {
            return Err(BuildError::InvalidRange { start, end });
        }
        self.ranges.push(Range {
            start: start.into(),
            end: end.into(),
            country: encode_text(country)?,
            area: encode_text(area)?,
        });
        Ok(self)
    }

    /// Number of ranges added so far
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when no ranges were added
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Serialize the database
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let ranges = self.covering_ranges()?;

        let mut writer = RecordWriter::new();
        let mut index = Vec::with_capacity(ranges.len());
        for range in &ranges {
            index.push((range.start, writer.write(range)?));
        }

        let mut out = writer.buffer;
        let index_start = out.len();
        for (start, offset) in &index {
            out.extend_from_slice(&start.to_le_bytes());
            push_u24_le(&mut out, *offset);
        }
        let index_end = index_start + (index.len() - 1) * INDEX_ENTRY_SIZE;

        let (start32, end32) = match (u32::try_from(index_start), u32::try_from(index_end)) {
            (Ok(s), Ok(e)) => (s, e),
            _ => return Err(BuildError::TooLarge(out.len())),
        };
        out[0..4].copy_from_slice(&start32.to_le_bytes());
        out[4..8].copy_from_slice(&end32.to_le_bytes());

        tracing::debug!(
            ranges = ranges.len(),
            bytes = out.len(),
            "built qqwry database"
        );
        Ok(out)
    }

    /// Sorted ranges with placeholders filling every gap
    fn covering_ranges(&self) -> Result<Vec<Range>, BuildError> {
        if self.ranges.is_empty() {
            return Err(BuildError::Empty);
        }

        let mut sorted = self.ranges.clone();
        sorted.sort_by_key(|r| r.start);

        let gap = |start: u32, end: u32| -> Result<Range, BuildError> {
            Ok(Range {
                start,
                end,
                country: encode_text(GAP_COUNTRY)?,
                area: encode_text(GAP_AREA)?,
            })
        };

        let mut out = Vec::with_capacity(sorted.len() * 2 + 1);
        // Next address not yet covered; None once 255.255.255.255 is covered
        let mut next: Option<u32> = Some(0);

        for range in sorted {
            match next {
                None => {
                    return Err(BuildError::Overlap {
                        previous_end: Ipv4Addr::BROADCAST,
                        start: range.start.into(),
                    })
                }
                Some(n) if range.start < n => {
                    return Err(BuildError::Overlap {
                        previous_end: Ipv4Addr::from(n - 1),
                        start: range.start.into(),
                    })
                }
                Some(n) if range.start > n => out.push(gap(n, range.start - 1)?),
                Some(_) => {}
            }
            next = range.end.checked_add(1);
            out.push(range);
        }

        if let Some(n) = next {
            out.push(gap(n, u32::MAX)?);
        }
        Ok(out)
    }
}

/// Appends records to the data region, sharing repeated strings
struct RecordWriter {
    buffer: Vec<u8>,
    /// (country, area) -> offset of the first location block holding them
    blocks: HashMap<(Vec<u8>, Vec<u8>), usize>,
    countries: HashMap<Vec<u8>, usize>,
    areas: HashMap<Vec<u8>, usize>,
}

impl RecordWriter {
    fn new() -> Self {
        Self {
            buffer: vec![0u8; HEADER_SIZE],
            blocks: HashMap::new(),
            countries: HashMap::new(),
            areas: HashMap::new(),
        }
    }

    /// Write one record and return its offset
    fn write(&mut self, range: &Range) -> Result<u32, BuildError> {
        let record = self.offset()?;
        self.buffer.extend_from_slice(&range.end.to_le_bytes());

        let key = (range.country.clone(), range.area.clone());
        if let Some(&block) = self.blocks.get(&key) {
            self.buffer.push(MODE_REDIRECT);
            push_u24_le(&mut self.buffer, block as u32);
            return Ok(record);
        }

        let block = self.offset()? as usize;
        self.blocks.insert(key, block);

        match self.countries.get(&range.country) {
            Some(&country) => {
                self.buffer.push(MODE_COUNTRY_REDIRECT);
                push_u24_le(&mut self.buffer, country as u32);
            }
            None => {
                let at = self.push_string(&range.country)?;
                self.countries.insert(range.country.clone(), at);
            }
        }

        self.write_area(&range.area)?;
        Ok(record)
    }

    fn write_area(&mut self, area: &[u8]) -> Result<(), BuildError> {
        if area.is_empty() {
            self.buffer.push(MODE_COUNTRY_REDIRECT);
            push_u24_le(&mut self.buffer, 0);
            return Ok(());
        }
        match self.areas.get(area) {
            Some(&at) => {
                self.buffer.push(MODE_COUNTRY_REDIRECT);
                push_u24_le(&mut self.buffer, at as u32);
            }
            None => {
                let at = self.push_string(area)?;
                self.areas.insert(area.to_vec(), at);
            }
        }
        Ok(())
    }

    fn push_string(&mut self, bytes: &[u8]) -> Result<usize, BuildError> {
        let at = self.offset()? as usize;
        self.buffer.extend_from_slice(bytes);
        self.buffer.push(0);
        Ok(at)
    }

    /// Current end of the buffer as a pointer-sized offset
    fn offset(&self) -> Result<u32, BuildError> {
        if self.buffer.len() > MAX_POINTER {
            return Err(BuildError::TooLarge(self.buffer.len()));
        }
        Ok(self.buffer.len() as u32)
    }
}

/// GBK bytes for a record string
///
/// Rejects NULs, text GBK cannot represent, overlong strings, and leading
/// bytes that would read as a mode byte.
fn encode_text(text: &str) -> Result<Vec<u8>, BuildError> {
    let invalid = || BuildError::InvalidText(text.to_string());
    if text.contains('\0') {
        return Err(invalid());
    }
    let bytes = encode_gbk(text).ok_or_else(invalid)?;
    if bytes.len() > MAX_STRING_LEN {
        return Err(invalid());
    }
    if matches!(bytes.first(), Some(&MODE_REDIRECT) | Some(&MODE_COUNTRY_REDIRECT)) {
        return Err(invalid());
    }
    Ok(bytes)
}
