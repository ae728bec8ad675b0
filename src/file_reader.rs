//! File access with automatic gzip decompression
//!
//! QQWry releases are often distributed compressed (`qqwry.dat.gz`), and batch
//! address lists are commonly gzipped logs. Both paths go through here:
//!
//! - [`read_all`] loads a whole file into memory, decompressing `.gz`
//! - [`open`] returns a buffered line reader, with `-` meaning stdin
//!
//! # Example
//!
//! ```rust,no_run
//! use qqwry::file_reader;
//! use std::io::BufRead;
//!
//! let reader = file_reader::open("addresses.txt.gz")?;
//! for line in reader.lines() {
//!     println!("{}", line?);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Whether a path names a gzip file (by extension, case-insensitive)
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a file for line-by-line reading
///
/// Files ending in `.gz` are decompressed on the fly. The path `-` reads
/// from stdin.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;

    if is_gzip(path) {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Read an entire file into memory, decompressing `.gz` files
pub fn read_all<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref();

    if !is_gzip(path) {
        return std::fs::read(path);
    }

    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::with_capacity(BUFFER_SIZE, file));
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gzip(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.2.3.4").unwrap();
        writeln!(file, "8.8.8.8").unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();
        assert_eq!(lines, vec!["1.2.3.4", "8.8.8.8"]);
    }

    #[test]
    fn test_gzip_lines() {
        let mut file = NamedTempFile::with_suffix(".gz").unwrap();
        file.write_all(&gzip(b"114.114.114.114\n223.5.5.5\n")).unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();
        assert_eq!(lines, vec!["114.114.114.114", "223.5.5.5"]);
    }

    #[test]
    fn test_read_all_plain() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0, 1, 2, 0xFF]).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()).unwrap(), vec![0, 1, 2, 0xFF]);
    }

    #[test]
    fn test_read_all_gzip_uppercase_extension() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut file = NamedTempFile::with_suffix(".GZ").unwrap();
        file.write_all(&gzip(&payload)).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()).unwrap(), payload);
    }

    #[test]
    fn test_corrupt_gzip() {
        let mut file = NamedTempFile::with_suffix(".gz").unwrap();
        file.write_all(b"definitely not gzip").unwrap();
        file.flush().unwrap();

        assert!(read_all(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_all("/nonexistent/qqwry.dat").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
