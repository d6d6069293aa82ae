//! Schema-diff driven migration generation for Rust.
//!
//! `oxide-diffgen` compares the live state of a database with a declared
//! target state and writes a versioned, reversible migration file:
//! - The diff is structural: tables, columns, primary keys, indexes and
//!   foreign keys
//! - Every migration carries both `up` (apply) and `down` (revert) statements
//! - SQL generation is dialect-aware (PostgreSQL, SQLite)
//!
//! # Architecture
//!
//! - **Provider** - Supplies current and target [`SchemaSnapshot`]s
//!   (SQLite introspection, JSON snapshot files)
//! - **Comparator** - Computes the [`SchemaDiff`](diff::SchemaDiff)
//! - **Generator** - Orders the diff into apply and revert operations and SQL
//! - **Version** - Allocates monotonic `YYYYMMDDHHMMSS` versions
//! - **Render** - Substitutes everything into a template
//! - **Writer** - Persists `Version<version>.rs`
//!
//! # Example
//!
//! ```rust
//! use oxide_diffgen::prelude::*;
//!
//! let current = SchemaSnapshot::new();
//! let target = SchemaSnapshot::new().table(
//!     TableDefinition::new("example")
//!         .column(ColumnDefinition::new("id", SqlType::Integer).auto_increment())
//!         .primary_key(["id"]),
//! );
//!
//! let generator = StatementGenerator::new(
//!     DialectKind::Postgres.dialect(),
//!     GeneratorOptions::default(),
//! );
//! let statements = generator.generate(compare(&current, &target));
//!
//! assert_eq!(statements.revert, vec!["DROP TABLE \"example\""]);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Generate a migration from a live database and a target snapshot
//! oxide-diffgen --database sqlite:app.db --target schema.json diff
//!
//! # Never drop anything
//! oxide-diffgen --target schema.json diff --no-drops
//!
//! # Preview the revert SQL
//! oxide-diffgen --current old.json --target schema.json sql --revert
//!
//! # Create a blank migration
//! oxide-diffgen generate
//! ```

pub mod comparator;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod generator;
pub mod introspect;
pub mod migration;
pub mod operations;
pub mod pipeline;
pub mod provider;
pub mod render;
pub mod schema;
pub mod state;
pub mod template;
pub mod version;
pub mod writer;

pub use migration::{SchemaTarget, StatementRecorder, VersionedMigration};
pub use schema::SchemaSnapshot;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::comparator::compare;
    pub use crate::dialect::{DialectKind, MigrationDialect, PostgresDialect, SqliteDialect};
    pub use crate::diff::{Change, KeyChange, SchemaDiff, TableDiff};
    pub use crate::error::{DiffgenError, Result, SchemaSide};
    pub use crate::generator::{
        GeneratedStatements, GeneratorOptions, MigrationPlan, StatementGenerator,
    };
    pub use crate::introspect::introspect_sqlite;
    pub use crate::migration::{SchemaTarget, StatementRecorder, VersionedMigration};
    pub use crate::operations::MigrationOperation;
    pub use crate::pipeline::{
        read_custom_methods, GenerationOutcome, GeneratorConfig, MigrationArtifact,
        MigrationGenerator,
    };
    pub use crate::provider::{
        read_snapshot, FileSchemaProvider, FilteredSchemaProvider, SchemaProvider,
        SnapshotDocument, StubSchemaProvider,
    };
    pub use crate::render::{render, TemplateContext};
    pub use crate::schema::{
        ColumnDefinition, DefaultValue, ForeignKeyAction, ForeignKeyDefinition, IndexDefinition,
        SchemaSnapshot, SqlType, TableDefinition,
    };
    pub use crate::state::SchemaState;
    pub use crate::template::{DefaultTemplate, FileTemplate, TemplateSource};
    pub use crate::version::{
        FixedVersionAllocator, MigrationVersion, TimestampAllocator, VersionAllocator,
    };
    pub use crate::writer::{migration_file_name, ArtifactWriter, FsArtifactWriter};
}
