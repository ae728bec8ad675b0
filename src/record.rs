//! Record decoding
//!
//! A record starts with four reserved bytes (the range's end address) and a
//! mode byte. The mode selects one of three layouts:
//!
//! ```text
//! 0x01  [end_ip][01][ptr:3]          -> full redirect to a location block
//! 0x02  [end_ip][02][ptr:3][area..]  -> country redirected, area follows
//! else  [end_ip][country\0][area..]  -> inline country, area follows
//! ```
//!
//! An area field is itself either an inline string or `01|02 ptr:3`, where a
//! zero pointer means "no area data". At most two redirects are followed for
//! any field; a full redirect that lands on another full redirect is rejected.

use crate::buffer::cstring_at;
use crate::endian::{read_u24_le, read_u8};
use crate::format::{
    FormatError, MODE_COUNTRY_REDIRECT, MODE_REDIRECT, POINTER_SIZE, RECORD_PREFIX_SIZE,
};

/// Undecoded country and area bytes for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Country / region string in the database encoding
    pub country: &'a [u8],
    /// Area / operator string in the database encoding (may be empty)
    pub area: &'a [u8],
}

/// Layout selected by a mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Fields are stored inline starting at `at`
    Inline { at: usize },
    /// Both fields live in the block at `target`
    Redirect { target: usize },
    /// Country string is at `country`; the area field starts at `area`
    CountryRedirect { country: usize, area: usize },
}

/// Decoder for records in a QQWry buffer
#[derive(Clone, Copy)]
pub struct RecordDecoder<'a> {
    data: &'a [u8],
}

impl<'a> RecordDecoder<'a> {
    /// Create a decoder over the whole file
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the record at `offset` (as stored in the index)
    pub fn decode(&self, offset: usize) -> Result<RawRecord<'a>, FormatError> {
        let fields = offset
            .checked_add(RECORD_PREFIX_SIZE)
            .ok_or(FormatError::OutOfBounds {
                offset,
                width: RECORD_PREFIX_SIZE,
                len: self.data.len(),
            })?;

        match self.layout(fields)? {
            Layout::Inline { at } => self.inline_fields(at),
            Layout::CountryRedirect { country, area } => Ok(RawRecord {
                country: self.string(country)?,
                area: self.area(area)?,
            }),
            Layout::Redirect { target } => match self.layout(target)? {
                Layout::Inline { at } => self.inline_fields(at),
                Layout::CountryRedirect { country, area } => Ok(RawRecord {
                    country: self.string(country)?,
                    area: self.area(area)?,
                }),
                Layout::Redirect { .. } => Err(FormatError::NestedRedirect { at: target }),
            },
        }
    }

    /// Classify the field block at `at` by its mode byte
    fn layout(&self, at: usize) -> Result<Layout, FormatError> {
        match read_u8(self.data, at)? {
            MODE_REDIRECT => Ok(Layout::Redirect {
                target: self.pointer(at + 1)?,
            }),
            MODE_COUNTRY_REDIRECT => Ok(Layout::CountryRedirect {
                country: self.pointer(at + 1)?,
                area: at + 1 + POINTER_SIZE,
            }),
            _ => Ok(Layout::Inline { at }),
        }
    }

    /// Inline country string at `at`, area field immediately after it
    fn inline_fields(&self, at: usize) -> Result<RawRecord<'a>, FormatError> {
        let country = self.string(at)?;
        Ok(RawRecord {
            country,
            area: self.area(at + country.len() + 1)?,
        })
    }

    /// Area field at `at`, following at most one redirect
    fn area(&self, at: usize) -> Result<&'a [u8], FormatError> {
        match read_u8(self.data, at)? {
            MODE_REDIRECT | MODE_COUNTRY_REDIRECT => {
                match read_u24_le(self.data, at + 1)? as usize {
                    0 => Ok(&[]),
                    target => self.string(target),
                }
            }
            _ => self.string(at),
        }
    }

    /// Non-zero redirect pointer stored at `at`
    fn pointer(&self, at: usize) -> Result<usize, FormatError> {
        match read_u24_le(self.data, at)? as usize {
            0 => Err(FormatError::NullPointer { at }),
            target => Ok(target),
        }
    }

    fn string(&self, at: usize) -> Result<&'a [u8], FormatError> {
        cstring_at(self.data, at)
    }
}
