//! Loaded QQWry database
//!
//! [`Database`] owns the immutable file bytes and the validated header. It is
//! `Send + Sync`; wrap it in an `Arc` (or use [`crate::Locator`]) to share it
//! across threads. Every lookup is a pure function of the buffer and the
//! address.
//!
//! # Examples
//!
//! ```no_run
//! use qqwry::Database;
//! use std::net::Ipv4Addr;
//!
//! let db = Database::from("qqwry.dat").open()?;
//! let hit = db.lookup(Ipv4Addr::new(114, 114, 114, 114))?;
//! println!("{} - {}: {} {}", hit.start, hit.end, hit.country, hit.area);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::buffer::Buffer;
use crate::error::{QqwryError, Result};
use crate::format::Header;
use crate::index::{Index, IndexHit};
use crate::location::LocationInfo;
use crate::record::RecordDecoder;
use crate::transcode::decode_gbk;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Conventional file name used when no path is configured
pub const DEFAULT_DB_PATH: &str = "qqwry.dat";

/// How the file bytes are held in memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageMode {
    /// Read the whole file into an owned buffer
    #[default]
    Read,
    /// Memory-map the file (ignored for `.gz` files, which must be inflated)
    Mmap,
}

/// Options for opening a database
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Path to the database file
    pub path: PathBuf,

    /// Buffer strategy
    pub storage: StorageMode,

    /// Reject files whose index is not sorted
    pub verify_index: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            storage: StorageMode::Read,
            verify_index: true,
        }
    }
}

/// Builder for opening databases with custom configuration
///
/// Created via `Database::from(path)`.
///
/// ```no_run
/// use qqwry::Database;
///
/// let db = Database::from("qqwry.dat").mmap().open()?;
/// let locator = Database::from("qqwry.dat").locator();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseOpener {
    options: DatabaseOptions,
}

impl DatabaseOpener {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            options: DatabaseOptions {
                path: path.into(),
                ..Default::default()
            },
        }
    }

    /// Memory-map instead of reading the file into memory
    pub fn mmap(mut self) -> Self {
        self.options.storage = StorageMode::Mmap;
        self
    }

    /// Enable or disable the index ordering check performed on open
    ///
    /// Lookups on an unsorted index return wrong ranges; only disable the
    /// check for files that were validated elsewhere.
    pub fn verify_index(mut self, verify: bool) -> Self {
        self.options.verify_index = verify;
        self
    }

    /// Configured options
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Open the database now
    pub fn open(self) -> Result<Database> {
        Database::open_with_options(&self.options)
    }

    /// Create a handle that loads the database on its first query
    pub fn locator(self) -> crate::Locator {
        crate::Locator::with_options(self.options)
    }

    /// Open the database now and wrap it in a handle
    pub fn load(self) -> Result<crate::Locator> {
        let db = Database::open_with_options(&self.options)?;
        Ok(crate::Locator::preloaded(self.options, db))
    }
}

/// One resolved range with its decoded strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lookup {
    /// First address of the range
    pub start: Ipv4Addr,
    /// Last address of the range (inclusive)
    pub end: Ipv4Addr,
    /// Region string ("country" field of the record)
    pub country: String,
    /// Operator string ("area" field of the record)
    pub area: String,
}

impl Lookup {
    /// Structured location for `ip` built from this range
    pub fn to_location(&self, ip: Ipv4Addr) -> LocationInfo {
        LocationInfo::from_raw(ip, &self.country, &self.area)
    }
}

/// Loaded, immutable QQWry database
pub struct Database {
    buffer: Buffer,
    header: Header,
    path: Option<PathBuf>,
}

impl Database {
    /// Start configuring a database at `path`
    #[allow(clippy::should_implement_trait)]
    pub fn from(path: impl Into<PathBuf>) -> DatabaseOpener {
        DatabaseOpener::new(path)
    }

    /// Open with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from(path.as_ref()).open()
    }

    /// Open with explicit options
    pub fn open_with_options(options: &DatabaseOptions) -> Result<Self> {
        let path = &options.path;
        let mapped = options.storage == StorageMode::Mmap && !crate::file_reader::is_gzip(path);

        let buffer = if mapped {
            Buffer::map(path)
        } else {
            Buffer::read(path)
        }
        .map_err(|e| QqwryError::from_io(path, e))?;

        let mut db = Self::from_buffer(buffer, options.verify_index)?;
        db.path = Some(path.clone());

        tracing::debug!(
            path = %path.display(),
            bytes = db.size(),
            entries = db.entry_count(),
            mapped,
            "opened qqwry database"
        );
        Ok(db)
    }

    /// Create a database from raw bytes, verifying index order
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_buffer(Buffer::from_vec(data), true)
    }

    fn from_buffer(buffer: Buffer, verify_index: bool) -> Result<Self> {
        let header = Header::parse(buffer.as_slice())?;
        if verify_index {
            Index::new(buffer.as_slice(), header).check_order()?;
        }
        Ok(Self {
            buffer,
            header,
            path: None,
        })
    }

    /// Index view over this database
    pub fn index(&self) -> Index<'_> {
        Index::new(self.buffer.as_slice(), self.header)
    }

    /// Record decoder over this database
    pub fn records(&self) -> RecordDecoder<'_> {
        RecordDecoder::new(self.buffer.as_slice())
    }

    /// Resolve an address to its range and decoded strings
    pub fn lookup(&self, ip: Ipv4Addr) -> Result<Lookup> {
        let hit = self
            .index()
            .find(u32::from(ip))
            .map_err(|source| QqwryError::Corrupt { ip, source })?
            .ok_or(QqwryError::NotFound(ip))?;

        tracing::trace!(%ip, position = hit.position, offset = hit.record_offset, "index hit");
        self.decode_hit(ip, &hit)
    }

    /// Structured location for an address
    pub fn locate(&self, ip: Ipv4Addr) -> Result<LocationInfo> {
        Ok(self.lookup(ip)?.to_location(ip))
    }

    /// Decode the record of an index hit on behalf of `ip`
    fn decode_hit(&self, ip: Ipv4Addr, hit: &IndexHit) -> Result<Lookup> {
        let raw = self
            .records()
            .decode(hit.record_offset as usize)
            .map_err(|source| QqwryError::Corrupt { ip, source })?;

        let country =
            decode_gbk(raw.country).map_err(|source| QqwryError::Encoding { ip, source })?;
        let area = decode_gbk(raw.area).map_err(|source| QqwryError::Encoding { ip, source })?;

        Ok(Lookup {
            start: Ipv4Addr::from(hit.start),
            end: Ipv4Addr::from(hit.end),
            country,
            area,
        })
    }

    /// Range of index entry `position`, decoded
    pub fn range(&self, position: usize) -> Result<Lookup> {
        let hit = self.index().range(position)?;
        self.decode_hit(Ipv4Addr::from(hit.start), &hit)
    }

    /// Release label stored in the last range
    ///
    /// QQWry files put their publisher and date ("纯真网络 2024年...") in the
    /// record for `255.255.255.0`, the final index entry.
    pub fn version(&self) -> Result<String> {
        let last = self.range(self.entry_count() - 1)?;
        Ok(format!("{} {}", last.country, last.area).trim().to_string())
    }

    /// Number of index entries
    pub fn entry_count(&self) -> usize {
        self.header.entry_count()
    }

    /// Parsed header
    pub fn header(&self) -> Header {
        self.header
    }

    /// File size in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Raw file bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Path the database was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True when backed by a memory map
    pub fn is_mapped(&self) -> bool {
        self.buffer.is_mapped()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("entries", &self.entry_count())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DatabaseBuilder;
    use crate::format::FormatError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> Vec<u8> {
        let mut builder = DatabaseBuilder::new();
        builder
            .add_range(Ipv4Addr::new(1, 0, 0, 0), Ipv4Addr::new(1, 0, 0, 255), "澳大利亚", "")
            .unwrap();
        builder
            .add_range(
                Ipv4Addr::new(114, 114, 0, 0),
                Ipv4Addr::new(114, 114, 255, 255),
                "江苏省南京市",
                "信风网络科技有限公司DNS服务器",
            )
            .unwrap();
        builder
            .add_range(
                Ipv4Addr::new(255, 255, 255, 0),
                Ipv4Addr::new(255, 255, 255, 255),
                "纯真网络",
                "2024年10月16日IP数据",
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_lookup_range() {
        let db = Database::from_bytes(sample()).unwrap();

        let hit = db.lookup(Ipv4Addr::new(114, 114, 114, 114)).unwrap();
        assert_eq!(hit.country, "江苏省南京市");
        assert_eq!(hit.area, "信风网络科技有限公司DNS服务器");
        assert_eq!(hit.start, Ipv4Addr::new(114, 114, 0, 0));
        assert_eq!(hit.end, Ipv4Addr::new(114, 114, 255, 255));
    }

    #[test]
    fn test_gap_ranges_resolve() {
        let db = Database::from_bytes(sample()).unwrap();

        // The builder fills uncovered space with placeholder ranges
        let hit = db.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap();
        assert_eq!(hit.end, Ipv4Addr::new(114, 113, 255, 255));
    }

    #[test]
    fn test_locate() {
        let db = Database::from_bytes(sample()).unwrap();
        let info = db.locate(Ipv4Addr::new(114, 114, 115, 115)).unwrap();
        assert_eq!(info.country, "中国");
        assert_eq!(info.province, "江苏省");
        assert_eq!(info.city, "南京市");
        assert_eq!(info.ip, "114.114.115.115");
    }

    #[test]
    fn test_version() {
        let db = Database::from_bytes(sample()).unwrap();
        assert_eq!(db.version().unwrap(), "纯真网络 2024年10月16日IP数据");
    }

    #[test]
    fn test_range_past_last_entry_with_trailing_bytes() {
        let mut data = sample();
        let db = Database::from_bytes(data.clone()).unwrap();
        let count = db.entry_count();

        data.extend_from_slice(&[9, 9, 9, 9, 8, 0, 0, 0]);
        let db = Database::from_bytes(data).unwrap();
        assert_eq!(db.entry_count(), count);
        assert!(db.range(count - 1).is_ok());
        assert!(matches!(
            db.range(count),
            Err(QqwryError::Format(FormatError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_range_with_duplicate_start() {
        let mut data = sample();
        let db = Database::from_bytes(data.clone()).unwrap();
        let first = db.index().find(0x0100_0000).unwrap().unwrap().position;

        // Give the following entry the same start address
        let next = db.header().index_start + (first + 1) * 7;
        data[next..next + 4].copy_from_slice(&0x0100_0000u32.to_le_bytes());
        let db = Database::from_bytes(data).unwrap();

        let shared = db.range(first).unwrap();
        assert_eq!(shared.start, Ipv4Addr::new(1, 0, 0, 0));
        assert_eq!(shared.end, shared.start);
        assert_eq!(db.range(first + 1).unwrap().start, shared.start);
    }

    #[test]
    fn test_open_file_both_storage_modes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&sample()).unwrap();
        file.flush().unwrap();

        let read = Database::open(file.path()).unwrap();
        let mapped = Database::from(file.path()).mmap().open().unwrap();
        assert!(!read.is_mapped());
        assert!(mapped.is_mapped());
        assert_eq!(read.path(), Some(file.path()));

        let ip = Ipv4Addr::new(1, 0, 0, 1);
        assert_eq!(read.lookup(ip).unwrap(), mapped.lookup(ip).unwrap());
    }

    #[test]
    fn test_missing_file() {
        let err = Database::open("/nonexistent/qqwry.dat").unwrap_err();
        assert!(matches!(err, QqwryError::FileNotFound(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = Database::from_bytes(vec![0xFF; 4]).unwrap_err();
        assert!(matches!(err, QqwryError::Format(FormatError::OutOfBounds { .. })));
    }

    #[test]
    fn test_unsorted_index_rejected_unless_skipped() {
        let mut data = sample();
        let header = Header::parse(&data).unwrap();
        // Overwrite the second entry's start with a value below the first
        let second = header.index_start + 7;
        data[second..second + 4].copy_from_slice(&0u32.to_le_bytes());
        data[header.index_start..header.index_start + 4]
            .copy_from_slice(&5u32.to_le_bytes());

        let err = Database::from_bytes(data.clone()).unwrap_err();
        assert!(matches!(err, QqwryError::Format(FormatError::Unsorted { entry: 1, .. })));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        assert!(Database::from(file.path()).verify_index(false).open().is_ok());
    }
}
