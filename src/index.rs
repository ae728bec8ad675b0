//! Index region search
//!
//! The index is a sorted array of 7-byte entries. Entry `i` owns the
//! half-open address range `[start_i, start_{i+1})`; the last entry extends
//! through `255.255.255.255`. Keys are compared as numeric IPv4 values: the
//! file stores them little-endian and callers pass `u32::from(Ipv4Addr)`.

use crate::endian::{read_u24_le, read_u32_le};
use crate::format::{FormatError, Header, INDEX_ENTRY_SIZE};

/// One decoded index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// First address of the range (inclusive)
    pub start_ip: u32,
    /// Absolute offset of the range's record
    pub record_offset: u32,
}

/// Successful index search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHit {
    /// Position of the matching entry
    pub position: usize,
    /// First address of the range
    pub start: u32,
    /// Last address of the range (inclusive)
    pub end: u32,
    /// Absolute offset of the record
    pub record_offset: u32,
}

/// Binary-searchable view of the index region
#[derive(Clone, Copy)]
pub struct Index<'a> {
    data: &'a [u8],
    header: Header,
}

impl<'a> Index<'a> {
    /// Create an index view over a buffer with an already-validated header
    pub fn new(data: &'a [u8], header: Header) -> Self {
        Self { data, header }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.header.entry_count()
    }

    /// Always false for a validated header, kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read entry `position`
    ///
    /// Positions past the last entry are `OutOfBounds` even when the file has
    /// bytes after the index region.
    pub fn entry(&self, position: usize) -> Result<IndexEntry, FormatError> {
        let offset = position
            .checked_mul(INDEX_ENTRY_SIZE)
            .and_then(|rel| rel.checked_add(self.header.index_start))
            .unwrap_or(usize::MAX);
        if position >= self.len() {
            return Err(FormatError::OutOfBounds {
                offset,
                width: INDEX_ENTRY_SIZE,
                len: self.header.index_end + INDEX_ENTRY_SIZE,
            });
        }

        Ok(IndexEntry {
            start_ip: read_u32_le(self.data, offset)?,
            record_offset: read_u24_le(self.data, offset + 4)?,
        })
    }

    /// Iterate over all entries in file order
    pub fn entries(&self) -> impl Iterator<Item = Result<IndexEntry, FormatError>> + 'a {
        let index = *self;
        (0..index.len()).map(move |i| index.entry(i))
    }

    /// Find the entry whose range contains `ip`
    ///
    /// Returns `Ok(None)` when `ip` sorts before the first entry. An address
    /// equal to an entry's start belongs to that entry.
    pub fn find(&self, ip: u32) -> Result<Option<IndexHit>, FormatError> {
        let count = self.len();
        let key = u64::from(ip);

        let mut low = 0usize;
        let mut high = count;

        while low < high {
            let mid = low + (high - low) / 2;
            let entry = self.entry(mid)?;

            if ip < entry.start_ip {
                high = mid;
                continue;
            }

            let upper = self.upper_bound(mid)?;
            if key < upper {
                return Ok(Some(IndexHit {
                    position: mid,
                    start: entry.start_ip,
                    end: (upper - 1) as u32,
                    record_offset: entry.record_offset,
                }));
            }
            low = mid + 1;
        }

        Ok(None)
    }

    /// Exclusive upper bound of entry `position`'s range
    fn upper_bound(&self, position: usize) -> Result<u64, FormatError> {
        if position + 1 < self.len() {
            Ok(u64::from(self.entry(position + 1)?.start_ip))
        } else {
            Ok(u64::from(u32::MAX) + 1)
        }
    }

    /// Inclusive range owned by entry `position`
    ///
    /// An entry sharing its start with the next one owns only its start
    /// address, so the range never comes back inverted.
    pub fn range(&self, position: usize) -> Result<IndexHit, FormatError> {
        let entry = self.entry(position)?;
        let upper = self.upper_bound(position)?;
        let end = (upper.saturating_sub(1) as u32).max(entry.start_ip);
        Ok(IndexHit {
            position,
            start: entry.start_ip,
            end,
            record_offset: entry.record_offset,
        })
    }

    /// Confirm entries are non-decreasing by start address
    pub fn check_order(&self) -> Result<(), FormatError> {
        let mut previous: Option<u32> = None;
        for (position, entry) in self.entries().enumerate() {
            let entry = entry?;
            if let Some(prev) = previous {
                if entry.start_ip < prev {
                    return Err(FormatError::Unsorted {
                        entry: position,
                        previous: prev,
                        current: entry.start_ip,
                    });
                }
            }
            previous = Some(entry.start_ip);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header followed directly by index entries; record offsets are arbitrary
    fn index_bytes(starts: &[u32]) -> (Vec<u8>, Header) {
        let mut data = vec![0u8; 8];
        for (i, &start) in starts.iter().enumerate() {
            data.extend_from_slice(&start.to_le_bytes());
            data.extend_from_slice(&((i as u32) * 100).to_le_bytes()[..3]);
        }
        let index_end = 8 + (starts.len() - 1) * INDEX_ENTRY_SIZE;
        data[0..4].copy_from_slice(&8u32.to_le_bytes());
        data[4..8].copy_from_slice(&(index_end as u32).to_le_bytes());
        let header = Header::parse(&data).unwrap();
        (data, header)
    }

    #[test]
    fn test_single_entry_covers_everything() {
        let (data, header) = index_bytes(&[0]);
        let index = Index::new(&data, header);

        for ip in [0, 1, 0x08080808, u32::MAX] {
            let hit = index.find(ip).unwrap().unwrap();
            assert_eq!(hit.position, 0);
            assert_eq!(hit.start, 0);
            assert_eq!(hit.end, u32::MAX);
        }
    }

    #[test]
    fn test_boundaries() {
        let starts = [0x0100_0000, 0x0200_0000, 0x0300_0000, 0x0A00_0000];
        let (data, header) = index_bytes(&starts);
        let index = Index::new(&data, header);

        assert_eq!(index.find(0x00FF_FFFF).unwrap(), None);

        for (i, &start) in starts.iter().enumerate() {
            assert_eq!(index.find(start).unwrap().unwrap().position, i);
            if i > 0 {
                assert_eq!(index.find(start - 1).unwrap().unwrap().position, i - 1);
            }
        }

        let last = index.find(u32::MAX).unwrap().unwrap();
        assert_eq!(last.position, 3);
        assert_eq!(last.end, u32::MAX);

        let second = index.find(0x0250_0000).unwrap().unwrap();
        assert_eq!(second.start, 0x0200_0000);
        assert_eq!(second.end, 0x02FF_FFFF);
        assert_eq!(second.record_offset, 100);
    }

    #[test]
    fn test_many_entries() {
        let starts: Vec<u32> = (0..1000u32).map(|i| i * 4096).collect();
        let (data, header) = index_bytes(&starts);
        let index = Index::new(&data, header);

        for (i, &start) in starts.iter().enumerate() {
            assert_eq!(index.find(start + 17).unwrap().unwrap().position, i);
        }
    }

    #[test]
    fn test_check_order() {
        let (data, header) = index_bytes(&[0, 5, 5, 9]);
        assert!(Index::new(&data, header).check_order().is_ok());

        let (data, header) = index_bytes(&[0, 9, 5]);
        assert_eq!(
            Index::new(&data, header).check_order(),
            Err(FormatError::Unsorted {
                entry: 2,
                previous: 9,
                current: 5
            })
        );
    }

    #[test]
    fn test_entry_past_end_is_out_of_bounds() {
        let (mut data, header) = index_bytes(&[0x0909_0909]);
        // Bytes after the index must not be read as another entry
        data.extend_from_slice(&[0x09, 0x09, 0x09, 0x09, 0x08, 0x00, 0x00, 0x00]);
        let index = Index::new(&data, header);

        assert!(index.entry(0).is_ok());
        assert_eq!(
            index.entry(1),
            Err(FormatError::OutOfBounds {
                offset: 15,
                width: INDEX_ENTRY_SIZE,
                len: 15,
            })
        );
        assert!(matches!(
            index.entry(usize::MAX),
            Err(FormatError::OutOfBounds { offset: usize::MAX, .. })
        ));
        assert!(index.range(1).is_err());
    }

    #[test]
    fn test_range_with_shared_start_is_not_inverted() {
        let (data, header) = index_bytes(&[0, 5, 5, 9]);
        let index = Index::new(&data, header);

        let shared = index.range(1).unwrap();
        assert_eq!((shared.start, shared.end), (5, 5));
        let next = index.range(2).unwrap();
        assert_eq!((next.start, next.end), (5, 8));
        assert_eq!(index.range(3).unwrap().end, u32::MAX);
        assert_eq!(index.range(0).unwrap().end, 4);
    }

    #[test]
    fn test_entries_iterator() {
        let (data, header) = index_bytes(&[3, 7, 11]);
        let starts: Vec<u32> = Index::new(&data, header)
            .entries()
            .map(|e| e.unwrap().start_ip)
            .collect();
        assert_eq!(starts, vec![3, 7, 11]);
    }
}
