//! Error types for migration generation.

use std::fmt;
use std::path::PathBuf;

use crate::version::MigrationVersion;

/// Which side of the comparison a snapshot was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSide {
    /// The live database state.
    Current,
    /// The declared target state.
    Target,
}

impl fmt::Display for SchemaSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Errors that can occur while generating a migration.
#[derive(Debug, thiserror::Error)]
pub enum DiffgenError {
    /// The snapshot provider failed.
    #[error("Failed to retrieve {side} schema: {source}")]
    SnapshotRetrieval {
        /// Side that was being retrieved.
        side: SchemaSide,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A named template does not resolve to a readable file.
    #[error("Template '{name}' not found at {}", path.display())]
    TemplateNotFound {
        /// Name the template was requested by.
        name: String,
        /// Path it resolved to.
        path: PathBuf,
    },

    /// The allocator could not produce a version greater than the last one.
    #[error("Version {0} is not newer than a version already allocated")]
    VersionConflict(MigrationVersion),

    /// Migration file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// IO error (reading templates or snapshots, writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error during introspection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Table filter expression does not compile.
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(#[from] regex::Error),

    /// An operation does not apply to the schema it was replayed on.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),
}

impl DiffgenError {
    /// Wraps a provider failure for the given side.
    pub fn snapshot<E>(side: SchemaSide, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::SnapshotRetrieval {
            side,
            source: source.into(),
        }
    }
}

/// Result type for migration generation.
pub type Result<T> = std::result::Result<T, DiffgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_error_message() {
        let err = DiffgenError::snapshot(SchemaSide::Current, "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to retrieve current schema: connection refused"
        );
    }

    #[test]
    fn test_template_not_found_message() {
        let err = DiffgenError::TemplateNotFound {
            name: "custom.tpl".to_string(),
            path: PathBuf::from("/tmp/custom.tpl"),
        };
        assert_eq!(
            err.to_string(),
            "Template 'custom.tpl' not found at /tmp/custom.tpl"
        );
    }
}
