//! Persisting rendered migrations.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DiffgenError, Result};
use crate::version::MigrationVersion;

/// File name of the artifact for a version: `Version<version>.rs`.
#[must_use]
pub fn migration_file_name(version: &MigrationVersion) -> String {
    format!("Version{version}.rs")
}

/// Stores rendered migration text.
pub trait ArtifactWriter {
    /// Persists the text for a version and returns where it went.
    fn write(&self, version: &MigrationVersion, contents: &str) -> Result<PathBuf>;
}

/// Writes one file per version into a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    dir: PathBuf,
}

impl FsArtifactWriter {
    /// Creates a writer for the given migrations directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactWriter for FsArtifactWriter {
    fn write(&self, version: &MigrationVersion, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(migration_file_name(version));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(DiffgenError::MigrationExists(path));
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(contents.as_bytes())?;

        info!(path = %path.display(), "wrote migration");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> MigrationVersion {
        MigrationVersion::parse("20160705000000").unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(migration_file_name(&version()), "Version20160705000000.rs");
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().join("migrations"));

        let path = writer.write(&version(), "pub struct Version20160705000000;").unwrap();
        assert_eq!(path, dir.path().join("migrations/Version20160705000000.rs"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "pub struct Version20160705000000;"
        );
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path());

        writer.write(&version(), "first").unwrap();
        let result = writer.write(&version(), "second");

        assert!(matches!(result, Err(DiffgenError::MigrationExists(_))));
        let path = dir.path().join("Version20160705000000.rs");
        assert_eq!(fs::read_to_string(path).unwrap(), "first");
    }
}
