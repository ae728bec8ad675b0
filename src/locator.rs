//! Shared query handle
//!
//! A [`Locator`] is the public entry point: it parses the caller's address
//! text, answers private and loopback addresses without a database, loads the
//! database once (eagerly or on first use) and turns each lookup into a
//! [`LocationInfo`].
//!
//! Queries never block each other. The loaded [`Database`] sits behind an
//! [`ArcSwapOption`]; every query takes its own `Arc`, so [`Locator::close`]
//! can drop the handle's reference while in-flight queries finish on theirs.
//!
//! ```
//! use qqwry::Locator;
//!
//! // No database is touched for private addresses
//! let locator = Locator::lazy("/does/not/exist.dat");
//! let info = locator.query("192.168.1.5")?;
//! assert_eq!(info.isp, "private network");
//! # Ok::<(), qqwry::QqwryError>(())
//! ```

use crate::database::{Database, DatabaseOptions};
use crate::error::{QqwryError, Result};
use crate::location::LocationInfo;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A parsed query address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAddress {
    /// An IPv4 address
    V4(Ipv4Addr),
    /// The IPv6 loopback address, answered locally
    Loopback6,
}

impl QueryAddress {
    /// True for loopback and RFC 1918 addresses
    pub fn is_local(&self) -> bool {
        match self {
            QueryAddress::V4(ip) => ip.is_loopback() || ip.is_private(),
            QueryAddress::Loopback6 => true,
        }
    }
}

impl fmt::Display for QueryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryAddress::V4(ip) => write!(f, "{}", ip),
            QueryAddress::Loopback6 => write!(f, "{}", Ipv6Addr::LOCALHOST),
        }
    }
}

/// Parse caller-supplied address text
///
/// Accepts `a.b.c.d`, `a.b.c.d:port`, `[::1]:port` and `::1`, with
/// surrounding whitespace. Other IPv6 addresses are rejected.
pub fn parse_address(input: &str) -> Result<QueryAddress> {
    let text = input.trim();
    let invalid = || QqwryError::InvalidAddress(input.to_string());

    let ip = if let Ok(ip) = text.parse::<IpAddr>() {
        ip
    } else if let Ok(socket) = text.parse::<SocketAddr>() {
        socket.ip()
    } else {
        return Err(invalid());
    };

    match ip {
        IpAddr::V4(v4) => Ok(QueryAddress::V4(v4)),
        IpAddr::V6(v6) if v6 == Ipv6Addr::LOCALHOST => Ok(QueryAddress::Loopback6),
        IpAddr::V6(_) => Err(invalid()),
    }
}

/// Query counters
#[derive(Debug, Default)]
pub struct LocatorStats {
    queries: AtomicU64,
    local: AtomicU64,
    resolved: AtomicU64,
    not_found: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`LocatorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Queries received
    pub queries: u64,
    /// Answered by the private-address fast path
    pub local: u64,
    /// Resolved from the database
    pub resolved: u64,
    /// No range covered the address
    pub not_found: u64,
    /// Any other error
    pub failures: u64,
}

impl LocatorStats {
    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            local: self.local.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &Result<LocationInfo>, local: bool) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Ok(_) if local => &self.local,
            Ok(_) => &self.resolved,
            Err(QqwryError::NotFound(_)) => &self.not_found,
            Err(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe handle over a QQWry database
pub struct Locator {
    options: DatabaseOptions,
    database: ArcSwapOption<Database>,
    /// Serializes loading and closing
    init: Mutex<()>,
    closed: AtomicBool,
    stats: LocatorStats,
}

impl Locator {
    /// Open `path` now and return a ready handle
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Create a handle that opens `path` on the first query needing it
    pub fn lazy(path: impl Into<PathBuf>) -> Self {
        Self::with_options(DatabaseOptions {
            path: path.into(),
            ..Default::default()
        })
    }

    /// Create a lazy handle with explicit options
    pub fn with_options(options: DatabaseOptions) -> Self {
        Self {
            options,
            database: ArcSwapOption::empty(),
            init: Mutex::new(()),
            closed: AtomicBool::new(false),
            stats: LocatorStats::default(),
        }
    }

    /// Wrap an already opened database
    pub fn from_database(db: Database) -> Self {
        let options = DatabaseOptions {
            path: db.path().map(Path::to_path_buf).unwrap_or_default(),
            ..Default::default()
        };
        Self::preloaded(options, db)
    }

    pub(crate) fn preloaded(options: DatabaseOptions, db: Database) -> Self {
        let locator = Self::with_options(options);
        locator.database.store(Some(Arc::new(db)));
        locator
    }

    /// Resolve an address
    pub fn query(&self, ip: &str) -> Result<LocationInfo> {
        let mut local = false;
        let outcome = self.resolve(ip, &mut local);
        self.stats.record(&outcome, local);

        if let Err(e) = &outcome {
            if e.is_corruption() {
                tracing::warn!(ip, error = %e, "corrupt database content");
            }
        }
        outcome
    }

    fn resolve(&self, input: &str, local: &mut bool) -> Result<LocationInfo> {
        if self.is_closed() {
            return Err(QqwryError::Closed);
        }

        let address = parse_address(input)?;
        let ip = match address {
            QueryAddress::V4(ip) if !address.is_local() => ip,
            _ => {
                *local = true;
                return Ok(LocationInfo::local(address.to_string()));
            }
        };

        self.database()?.locate(ip)
    }

    /// Province of `ip`
    pub fn province(&self, ip: &str) -> Result<String> {
        Ok(self.query(ip)?.province)
    }

    /// City of `ip`
    pub fn city(&self, ip: &str) -> Result<String> {
        Ok(self.query(ip)?.city)
    }

    /// District of `ip`
    pub fn district(&self, ip: &str) -> Result<String> {
        Ok(self.query(ip)?.district)
    }

    /// Non-empty location parts of `ip` joined by `separator`
    pub fn full_location(&self, ip: &str, separator: &str) -> Result<String> {
        Ok(self.query(ip)?.full(separator))
    }

    /// The loaded database, opening it if needed
    pub fn database(&self) -> Result<Arc<Database>> {
        if let Some(db) = self.database.load_full() {
            return Ok(db);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(QqwryError::Closed);
        }
        // Another caller may have finished loading while we waited
        if let Some(db) = self.database.load_full() {
            return Ok(db);
        }

        let db = Database::open_with_options(&self.options).map_err(|e| {
            tracing::warn!(path = %self.options.path.display(), error = %e, "database load failed");
            QqwryError::DatabaseUnavailable {
                path: self.options.path.clone(),
                reason: Box::new(e),
            }
        })?;

        let db = Arc::new(db);
        self.database.store(Some(Arc::clone(&db)));
        Ok(db)
    }

    /// Release the database; later queries fail with [`QqwryError::Closed`]
    ///
    /// Queries already running keep their own reference and complete normally.
    pub fn close(&self) {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::Release);
        self.database.store(None);
        tracing::debug!(path = %self.options.path.display(), "locator closed");
    }

    /// True once [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True when the database is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.database.load().is_some()
    }

    /// Configured options
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Query counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("path", &self.options.path)
            .field("loaded", &self.is_loaded())
            .field("closed", &self.is_closed())
            .finish()
    }
}
