//! Migration version allocation.
//!
//! Versions are fixed-width `YYYYMMDDHHMMSS` strings in UTC, so string order
//! equals chronological order and migration files sort in generation order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DiffgenError, Result};

/// Timestamp layout of a version identifier.
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// A migration version identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationVersion(String);

impl MigrationVersion {
    /// Formats a timestamp as a version.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(VERSION_FORMAT).to_string())
    }

    /// Parses a version string; it must be exactly 14 ASCII digits.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        (raw.len() == 14 && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(raw.to_string()))
    }

    /// Returns the version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out version identifiers.
pub trait VersionAllocator {
    /// Returns the next version, strictly greater than any returned before.
    fn allocate(&mut self) -> Result<MigrationVersion>;
}

/// Allocates versions from the wall clock.
///
/// Two allocations within the same second would collide; the second one
/// fails with [`DiffgenError::VersionConflict`] instead of reusing the value.
pub struct TimestampAllocator {
    clock: Box<dyn Fn() -> DateTime<Utc> + Send>,
    last: Option<MigrationVersion>,
}

impl TimestampAllocator {
    /// Creates an allocator reading `Utc::now`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Creates an allocator reading the given clock.
    #[must_use]
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + 'static,
    {
        Self {
            clock: Box::new(clock),
            last: None,
        }
    }
}

impl Default for TimestampAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimestampAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampAllocator")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl VersionAllocator for TimestampAllocator {
    fn allocate(&mut self) -> Result<MigrationVersion> {
        let version = MigrationVersion::from_datetime((self.clock)());
        if let Some(last) = &self.last {
            if version <= *last {
                return Err(DiffgenError::VersionConflict(version));
            }
        }
        self.last = Some(version.clone());
        Ok(version)
    }
}

/// Hands out one preset version.
#[derive(Debug, Clone)]
pub struct FixedVersionAllocator {
    version: MigrationVersion,
    issued: bool,
}

impl FixedVersionAllocator {
    /// Creates an allocator for the given version.
    #[must_use]
    pub fn new(version: MigrationVersion) -> Self {
        Self {
            version,
            issued: false,
        }
    }
}

impl VersionAllocator for FixedVersionAllocator {
    fn allocate(&mut self) -> Result<MigrationVersion> {
        if self.issued {
            return Err(DiffgenError::VersionConflict(self.version.clone()));
        }
        self.issued = true;
        Ok(self.version.clone())
    }
}
