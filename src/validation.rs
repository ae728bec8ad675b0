//! Database validation for untrusted QQWry files
//!
//! Checks a file without panicking, whatever its contents:
//!
//! - header bounds and index alignment
//! - index ordering and duplicate start addresses
//! - every record offset lies inside the record region
//! - (strict) every record decodes and both strings are valid GBK
//!
//! # Usage
//!
//! ```rust,no_run
//! use qqwry::validation::{validate_database, ValidationLevel};
//! use std::path::Path;
//!
//! let report = validate_database(Path::new("qqwry.dat"), ValidationLevel::Strict)?;
//!
//! if report.is_valid() {
//!     println!("✓ Database is safe to use");
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::endian::read_u32_le;
use crate::error::{QqwryError, Result};
use crate::format::{Header, HEADER_SIZE, MODE_COUNTRY_REDIRECT, MODE_REDIRECT, RECORD_PREFIX_SIZE};
use crate::index::{Index, IndexEntry};
use crate::record::RecordDecoder;
use crate::transcode::decode_gbk;
use rayon::prelude::*;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::Path;

/// Problems of one kind listed individually before being summarized
const MAX_LISTED: usize = 10;

/// Validation strictness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationLevel {
    /// Header, alignment, index order and offset bounds
    #[default]
    Standard,
    /// Standard checks plus decoding every record and its strings
    Strict,
}

impl std::str::FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ValidationLevel::Standard),
            "strict" => Ok(ValidationLevel::Strict),
            _ => Err(format!("unknown validation level '{}' (standard, strict)", s)),
        }
    }
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationLevel::Standard => write!(f, "standard"),
            ValidationLevel::Strict => write!(f, "strict"),
        }
    }
}

/// Validation report with detailed findings
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Critical errors that make the database unusable
    pub errors: Vec<String>,
    /// Warnings about potential issues (non-fatal)
    pub warnings: Vec<String>,
    /// Informational messages about database properties
    pub info: Vec<String>,
    /// Database statistics
    pub stats: DatabaseStats,
}

/// Database statistics gathered during validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseStats {
    /// File size in bytes
    pub file_size: usize,
    /// Offset of the first index entry
    pub index_start: usize,
    /// Offset of the last index entry
    pub index_end: usize,
    /// Number of index entries
    pub entry_count: usize,
    /// Distinct record offsets referenced by the index
    pub unique_records: usize,
    /// Records whose mode byte is a full redirect
    pub redirect_records: usize,
    /// Records whose mode byte is a country redirect
    pub country_redirect_records: usize,
    /// Records stored inline
    pub inline_records: usize,
    /// Records decoded successfully (strict only)
    pub decoded_records: usize,
    /// Release label from the last record, when decodable
    pub version: Option<String>,
}

impl ValidationReport {
    fn new() -> Self {
        Self::default()
    }

    /// Check if database passed all validations (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }

    /// Record the first few problems of a kind and a count of the rest
    fn errors_capped(&mut self, problems: Vec<String>, what: &str) {
        let total = problems.len();
        for problem in problems.into_iter().take(MAX_LISTED) {
            self.error(problem);
        }
        if total > MAX_LISTED {
            self.error(format!("... {} more {}", total - MAX_LISTED, what));
        }
    }
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Entries: {}, Records: {} ({} inline, {} redirect, {} country redirect), Size: {} KB",
            self.entry_count,
            self.unique_records,
            self.inline_records,
            self.redirect_records,
            self.country_redirect_records,
            self.file_size / 1024
        )
    }
}

/// Validate a database file
///
/// Fails only when the file cannot be read; everything wrong with its
/// contents is reported in the returned [`ValidationReport`].
pub fn validate_database(path: &Path, level: ValidationLevel) -> Result<ValidationReport> {
    let data = crate::file_reader::read_all(path).map_err(|e| QqwryError::from_io(path, e))?;
    let report = validate_bytes(&data, level);

    if report.is_valid() {
        tracing::debug!(path = %path.display(), ?level, "database passed validation");
    } else {
        tracing::warn!(
            path = %path.display(),
            ?level,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "database failed validation"
        );
    }
    Ok(report)
}

/// Validate database bytes
pub fn validate_bytes(data: &[u8], level: ValidationLevel) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.stats.file_size = data.len();
    report.info(format!(
        "File size: {} bytes ({} KB)",
        data.len(),
        data.len() / 1024
    ));

    let header = match Header::parse(data) {
        Ok(header) => header,
        Err(e) => {
            report.error(format!("Invalid header: {}", e));
            return report;
        }
    };

    report.stats.index_start = header.index_start;
    report.stats.index_end = header.index_end;
    report.stats.entry_count = header.entry_count();
    report.info(format!(
        "Index: {} entries at {}..={}",
        header.entry_count(),
        header.index_start,
        header.index_end
    ));

    let index = Index::new(data, header);
    let entries = match index.entries().collect::<std::result::Result<Vec<_>, _>>() {
        Ok(entries) => entries,
        Err(e) => {
            report.error(format!("Unreadable index: {}", e));
            return report;
        }
    };

    check_layout(data, header, &mut report);
    check_order(&entries, &mut report);
    check_offsets(data, header, &entries, &mut report);

    if level == ValidationLevel::Strict && report.is_valid() {
        check_records(data, &entries, &mut report);
    }

    if let Some(last) = entries.last() {
        let decoder = RecordDecoder::new(data);
        let version = decoder.decode(last.record_offset as usize).ok().and_then(|raw| {
            let country = decode_gbk(raw.country).ok()?;
            let area = decode_gbk(raw.area).ok()?;
            Some(format!("{} {}", country, area).trim().to_string())
        });
        if let Some(version) = &version {
            report.info(format!("Version: {}", version));
        }
        report.stats.version = version;
    }

    report
}

/// Region boundaries implied by the header
fn check_layout(data: &[u8], header: Header, report: &mut ValidationReport) {
    if header.index_start == HEADER_SIZE {
        report.warning("Record region is empty; index starts right after the header");
    }

    let index_len = header.index_end + crate::format::INDEX_ENTRY_SIZE;
    if index_len < data.len() {
        report.warning(format!(
            "{} trailing bytes after the index",
            data.len() - index_len
        ));
    }
}

fn check_order(entries: &[IndexEntry], report: &mut ValidationReport) {
    let mut unsorted = Vec::new();
    let mut duplicates = 0usize;

    for (position, pair) in entries.windows(2).enumerate() {
        let (previous, current) = (pair[0].start_ip, pair[1].start_ip);
        if current < previous {
            unsorted.push(format!(
                "Index entry {} starts at {} below previous start {}",
                position + 1,
                Ipv4Addr::from(current),
                Ipv4Addr::from(previous)
            ));
        } else if current == previous {
            duplicates += 1;
        }
    }

    if unsorted.is_empty() {
        report.info("Index is sorted");
    }
    report.errors_capped(unsorted, "out-of-order entries");

    if duplicates > 0 {
        report.warning(format!(
            "{} index entries repeat the previous start address and are unreachable",
            duplicates
        ));
    }

    if let Some(first) = entries.first() {
        if first.start_ip != 0 {
            report.warning(format!(
                "First range starts at {}; lower addresses resolve to nothing",
                Ipv4Addr::from(first.start_ip)
            ));
        }
    }
}

/// Every record offset points inside the record region and has a mode byte
fn check_offsets(data: &[u8], header: Header, entries: &[IndexEntry], report: &mut ValidationReport) {
    let mut problems = Vec::new();
    let mut offsets: Vec<u32> = entries.iter().map(|e| e.record_offset).collect();
    offsets.sort_unstable();
    offsets.dedup();
    report.stats.unique_records = offsets.len();

    for &offset in &offsets {
        let offset = offset as usize;
        if offset < HEADER_SIZE || offset + RECORD_PREFIX_SIZE >= header.index_start {
            problems.push(format!(
                "Record offset {} outside record region {}..{}",
                offset, HEADER_SIZE, header.index_start
            ));
            continue;
        }
        match data[offset + RECORD_PREFIX_SIZE] {
            MODE_REDIRECT => report.stats.redirect_records += 1,
            MODE_COUNTRY_REDIRECT => report.stats.country_redirect_records += 1,
            _ => report.stats.inline_records += 1,
        }
    }

    if problems.is_empty() {
        report.info(format!("All {} record offsets in bounds", offsets.len()));
    }
    report.errors_capped(problems, "bad record offsets");
}

/// Decode and transcode every record in parallel
fn check_records(data: &[u8], entries: &[IndexEntry], report: &mut ValidationReport) {
    let decoder = RecordDecoder::new(data);

    let results: Vec<std::result::Result<bool, String>> = entries
        .par_iter()
        .enumerate()
        .map(|(position, entry)| {
            let raw = decoder
                .decode(entry.record_offset as usize)
                .map_err(|e| format!("Entry {} ({}): {}", position, Ipv4Addr::from(entry.start_ip), e))?;
            decode_gbk(raw.country)
                .and_then(|_| decode_gbk(raw.area))
                .map_err(|e| format!("Entry {} ({}): {}", position, Ipv4Addr::from(entry.start_ip), e))?;

            // Stored end address should match the range implied by the index
            let expected = entries
                .get(position + 1)
                .map_or(u32::MAX, |next| next.start_ip.saturating_sub(1));
            let stored = read_u32_le(data, entry.record_offset as usize).ok();
            Ok(stored == Some(expected))
        })
        .collect();

    let mut failures = Vec::new();
    let mut mismatched = 0usize;
    for result in results {
        match result {
            Ok(true) => report.stats.decoded_records += 1,
            Ok(false) => {
                report.stats.decoded_records += 1;
                mismatched += 1;
            }
            Err(e) => failures.push(e),
        }
    }

    if failures.is_empty() {
        report.info(format!("All {} records decode", report.stats.decoded_records));
    }
    report.errors_capped(failures, "undecodable records");

    if mismatched > 0 {
        report.warning(format!(
            "{} records store an end address that differs from the index",
            mismatched
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DatabaseBuilder;
    use crate::endian::write_u24_le;
    use std::io::Write;

    fn sample() -> Vec<u8> {
        let mut builder = DatabaseBuilder::new();
        builder
            .add_range(
                Ipv4Addr::new(0, 0, 0, 0),
                Ipv4Addr::new(99, 255, 255, 255),
                "美国",
                "",
            )
            .unwrap()
            .add_range(
                Ipv4Addr::new(100, 0, 0, 0),
                Ipv4Addr::new(255, 255, 255, 255),
                "广东省广州市",
                "电信",
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_valid_database() {
        let report = validate_bytes(&sample(), ValidationLevel::Strict);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.stats.entry_count, 2);
        assert_eq!(report.stats.decoded_records, 2);
        assert_eq!(report.stats.version.as_deref(), Some("广东省广州市 电信"));
        assert!(report.stats.summary().contains("Entries: 2"));
    }

    #[test]
    fn test_bad_header() {
        let report = validate_bytes(&[0u8; 6], ValidationLevel::Standard);
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("header"));
    }

    #[test]
    fn test_unsorted_index() {
        let mut data = sample();
        let header = Header::parse(&data).unwrap();
        data[header.index_start..header.index_start + 4]
            .copy_from_slice(&u32::MAX.to_le_bytes());

        let report = validate_bytes(&data, ValidationLevel::Standard);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("below previous")));
    }

    #[test]
    fn test_offset_outside_records() {
        let mut data = sample();
        let header = Header::parse(&data).unwrap();
        write_u24_le(&mut data, header.index_start + 4, header.index_start as u32).unwrap();

        let report = validate_bytes(&data, ValidationLevel::Strict);
        assert!(report.errors.iter().any(|e| e.contains("outside record region")));
        assert_eq!(report.stats.decoded_records, 0);
    }

    #[test]
    fn test_strict_catches_bad_strings() {
        let mut data = sample();
        // Corrupt the first country string (right after the first record's end address)
        let at = HEADER_SIZE + RECORD_PREFIX_SIZE;
        data[at] = 0x81;
        data[at + 1] = 0x20;

        assert!(validate_bytes(&data, ValidationLevel::Standard).is_valid());
        let report = validate_bytes(&data, ValidationLevel::Strict);
        assert!(!report.is_valid());
        assert!(report.errors[0].starts_with("Entry 0"));
    }

    #[test]
    fn test_trailing_bytes_warning() {
        let mut data = sample();
        data.extend_from_slice(b"junk");
        let report = validate_bytes(&data, ValidationLevel::Standard);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("trailing")));
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sample()).unwrap();
        file.flush().unwrap();

        let report = validate_database(file.path(), ValidationLevel::Standard).unwrap();
        assert!(report.is_valid());

        let err = validate_database(Path::new("/nonexistent.dat"), ValidationLevel::Standard);
        assert!(matches!(err, Err(QqwryError::FileNotFound(_))));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("Strict".parse::<ValidationLevel>(), Ok(ValidationLevel::Strict));
        assert_eq!("standard".parse::<ValidationLevel>(), Ok(ValidationLevel::Standard));
        assert!("paranoid".parse::<ValidationLevel>().is_err());
        assert_eq!(ValidationLevel::Strict.to_string(), "strict");
    }
}
