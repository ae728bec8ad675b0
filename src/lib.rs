//! qqwry - Fast, panic-free reader for QQWry IPv4 geolocation databases
//!
//! QQWry (纯真 / CZ88) files map IPv4 ranges to a region string and an operator
//! string. This crate loads a file once into an immutable buffer, answers
//! lookups with a binary search over the index, follows the format's record
//! redirects with bounds-checked reads, converts GBK text to UTF-8 and splits
//! the region into province / city / district.
//!
//! # Quick Start
//!
//! ```rust
//! use qqwry::{DatabaseBuilder, Locator};
//! use std::net::Ipv4Addr;
//!
//! // Build a small database
//! let mut builder = DatabaseBuilder::new();
//! builder.add_range(
//!     Ipv4Addr::new(114, 114, 0, 0),
//!     Ipv4Addr::new(114, 114, 255, 255),
//!     "江苏省南京市",
//!     "电信",
//! )?;
//! # let tmp_path = std::env::temp_dir().join("qqwry_doctest_quickstart.dat");
//! # std::fs::write(&tmp_path, builder.build()?)?;
//! # let locator = Locator::load(&tmp_path)?;
//! # let _ = std::fs::remove_file(&tmp_path);
//! # /*
//! std::fs::write("qqwry.dat", builder.build()?)?;
//!
//! let locator = Locator::load("qqwry.dat")?;
//! # */
//! let info = locator.query("114.114.114.114")?;
//! assert_eq!(info.province, "江苏省");
//! assert_eq!(info.city, "南京市");
//! assert_eq!(info.isp, "中国电信");
//!
//! // Private addresses never touch the database
//! assert_eq!(locator.query("192.168.1.5")?.country, "local");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # File Layout
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  0..8     header: index_start,       │
//! │           index_end (u32 LE)         │
//! ├──────────────────────────────────────┤
//! │  records  end_ip, mode byte,         │
//! │           GBK strings, 24-bit ptrs   │
//! ├──────────────────────────────────────┤
//! │  index    7-byte entries:            │
//! │           start_ip u32, offset u24   │
//! └──────────────────────────────────────┘
//! ```
//!
//! Every offset in the file is treated as untrusted. Malformed content is
//! reported as an error value and never panics.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Immutable database bytes
pub mod buffer;
/// QQWry file writer
pub mod builder;
/// Loaded database and open options
pub mod database;
pub mod endian;
/// Error types for loading and querying
pub mod error;
pub mod file_reader;
/// Header layout and format constants
pub mod format;
pub mod index;
pub mod location;
pub mod locator;
pub mod record;
pub mod transcode;
pub mod validation;

// Re-exports for Rust consumers

/// Loaded database and configuration
pub use crate::database::{Database, DatabaseOpener, DatabaseOptions, Lookup, StorageMode};

/// Builder for QQWry files
pub use crate::builder::{BuildError, DatabaseBuilder};

pub use crate::error::{QqwryError, Result};
pub use crate::format::FormatError;
pub use crate::location::LocationInfo;
pub use crate::locator::{Locator, StatsSnapshot};
pub use crate::transcode::EncodingError;
pub use crate::validation::{validate_database, ValidationLevel, ValidationReport};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
