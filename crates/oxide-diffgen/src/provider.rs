//! Schema snapshot providers.
//!
//! A provider supplies the two sides of a comparison: the current (live)
//! schema and the declared target schema. Every provider returns snapshots in
//! canonical form.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffgenError, Result, SchemaSide};
use crate::schema::{SchemaSnapshot, TableDefinition};

/// Supplies the current and target snapshots.
pub trait SchemaProvider {
    /// The schema as it is now.
    fn current_schema(&self) -> Result<SchemaSnapshot>;

    /// The schema as it should become.
    fn target_schema(&self) -> Result<SchemaSnapshot>;
}

/// A provider over two in-memory snapshots.
#[derive(Debug, Clone, Default)]
pub struct StubSchemaProvider {
    current: SchemaSnapshot,
    target: SchemaSnapshot,
}

impl StubSchemaProvider {
    /// Creates a provider; both snapshots are canonicalized.
    #[must_use]
    pub fn new(mut current: SchemaSnapshot, mut target: SchemaSnapshot) -> Self {
        current.canonicalize();
        target.canonicalize();
        Self { current, target }
    }
}

impl SchemaProvider for StubSchemaProvider {
    fn current_schema(&self) -> Result<SchemaSnapshot> {
        Ok(self.current.clone())
    }

    fn target_schema(&self) -> Result<SchemaSnapshot> {
        Ok(self.target.clone())
    }
}

/// On-disk snapshot layout: a flat list of tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Table definitions, in any order.
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

impl SnapshotDocument {
    /// Converts into a canonical snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new();
        for table in self.tables {
            snapshot.add_table(table);
        }
        snapshot.canonicalize();
        snapshot
    }
}

impl From<&SchemaSnapshot> for SnapshotDocument {
    fn from(snapshot: &SchemaSnapshot) -> Self {
        Self {
            tables: snapshot.tables.values().cloned().collect(),
        }
    }
}

/// Reads a snapshot document from a JSON file.
pub fn read_snapshot(path: &Path) -> Result<SchemaSnapshot> {
    let text = fs::read_to_string(path)?;
    let document: SnapshotDocument = serde_json::from_str(&text)?;
    debug!(path = %path.display(), tables = document.tables.len(), "read snapshot");
    Ok(document.into_snapshot())
}

/// A provider reading both sides from JSON snapshot files.
#[derive(Debug, Clone)]
pub struct FileSchemaProvider {
    current: Option<PathBuf>,
    target: PathBuf,
}

impl FileSchemaProvider {
    /// Creates a provider. Without a current file the current schema is empty.
    #[must_use]
    pub fn new(current: Option<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            current,
            target: target.into(),
        }
    }
}

impl SchemaProvider for FileSchemaProvider {
    fn current_schema(&self) -> Result<SchemaSnapshot> {
        match &self.current {
            Some(path) => {
                read_snapshot(path).map_err(|err| DiffgenError::snapshot(SchemaSide::Current, err))
            }
            None => Ok(SchemaSnapshot::new()),
        }
    }

    fn target_schema(&self) -> Result<SchemaSnapshot> {
        read_snapshot(&self.target).map_err(|err| DiffgenError::snapshot(SchemaSide::Target, err))
    }
}

/// Keeps only tables whose name matches an expression.
#[derive(Debug, Clone)]
pub struct FilteredSchemaProvider<P> {
    inner: P,
    filter: Regex,
}

impl<P: SchemaProvider> FilteredSchemaProvider<P> {
    /// Wraps a provider with a table name filter.
    pub fn new(inner: P, expression: &str) -> Result<Self> {
        Ok(Self {
            inner,
            filter: Regex::new(expression)?,
        })
    }

    fn apply(&self, mut snapshot: SchemaSnapshot) -> SchemaSnapshot {
        snapshot.tables.retain(|name, _| self.filter.is_match(name));
        snapshot
    }
}

impl<P: SchemaProvider> SchemaProvider for FilteredSchemaProvider<P> {
    fn current_schema(&self) -> Result<SchemaSnapshot> {
        self.inner.current_schema().map(|s| self.apply(s))
    }

    fn target_schema(&self) -> Result<SchemaSnapshot> {
        self.inner.target_schema().map(|s| self.apply(s))
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Box<P> {
    fn current_schema(&self) -> Result<SchemaSnapshot> {
        (**self).current_schema()
    }

    fn target_schema(&self) -> Result<SchemaSnapshot> {
        (**self).target_schema()
    }
}
