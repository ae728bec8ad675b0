/// Error types for the qqwry library
use crate::format::FormatError;
use crate::transcode::EncodingError;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Result type alias for qqwry operations
pub type Result<T> = std::result::Result<T, QqwryError>;

/// Main error type for loading and querying databases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QqwryError {
    /// The database file does not exist
    FileNotFound(PathBuf),

    /// Any other I/O failure while loading
    Io(String),

    /// The file is not a usable QQWry database
    Format(FormatError),

    /// The query is not an IPv4 address
    InvalidAddress(String),

    /// No index range covers the address
    NotFound(Ipv4Addr),

    /// The record for an address could not be decoded
    Corrupt {
        /// Address being resolved
        ip: Ipv4Addr,
        /// Underlying layout error
        source: FormatError,
    },

    /// A record string is not valid GBK
    Encoding {
        /// Address being resolved
        ip: Ipv4Addr,
        /// Underlying conversion error
        source: EncodingError,
    },

    /// A lazily opened database failed to load
    DatabaseUnavailable {
        /// Configured database path
        path: PathBuf,
        /// Why loading failed
        reason: Box<QqwryError>,
    },

    /// The handle was closed
    Closed,
}

impl QqwryError {
    /// Classify an I/O error raised while opening `path`
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        if err.kind() == io::ErrorKind::NotFound {
            QqwryError::FileNotFound(path)
        } else {
            QqwryError::Io(format!("{}: {}", path.display(), err))
        }
    }

    /// True for errors caused by database contents rather than the caller
    pub fn is_corruption(&self) -> bool {
        match self {
            QqwryError::Format(_) | QqwryError::Corrupt { .. } => true,
            QqwryError::DatabaseUnavailable { reason, .. } => reason.is_corruption(),
            _ => false,
        }
    }
}

impl fmt::Display for QqwryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QqwryError::FileNotFound(path) => {
                write!(f, "Database file not found: {}", path.display())
            }
            QqwryError::Io(msg) => write!(f, "I/O error: {}", msg),
            QqwryError::Format(err) => write!(f, "Format error: {}", err),
            QqwryError::InvalidAddress(input) => write!(f, "Invalid IPv4 address: {:?}", input),
            QqwryError::NotFound(ip) => write!(f, "No range covers {}", ip),
            QqwryError::Corrupt { ip, source } => {
                write!(f, "Corrupt record for {}: {}", ip, source)
            }
            QqwryError::Encoding { ip, source } => {
                write!(f, "Encoding error for {}: {}", ip, source)
            }
            QqwryError::DatabaseUnavailable { path, reason } => {
                write!(f, "Database {} unavailable: {}", path.display(), reason)
            }
            QqwryError::Closed => write!(f, "Database handle is closed"),
        }
    }
}

impl std::error::Error for QqwryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QqwryError::Format(err) => Some(err),
            QqwryError::Corrupt { source, .. } => Some(source),
            QqwryError::Encoding { source, .. } => Some(source),
            QqwryError::DatabaseUnavailable { reason, .. } => Some(reason.as_ref()),
            _ => None,
        }
    }
}

impl From<FormatError> for QqwryError {
    fn from(err: FormatError) -> Self {
        QqwryError::Format(err)
    }
}
