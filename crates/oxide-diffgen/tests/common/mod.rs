#![allow(dead_code)]

use std::path::{Path, PathBuf};

use oxide_diffgen::prelude::*;

pub const VERSION: &str = "20160705000000";

pub fn version() -> MigrationVersion {
    MigrationVersion::parse(VERSION).expect("valid version")
}

/// `CREATE TABLE example (id integer autoincrement, PRIMARY KEY (id))`.
pub fn example_table() -> TableDefinition {
    TableDefinition::new("example")
        .column(ColumnDefinition::new("id", SqlType::Integer).auto_increment())
        .primary_key(["id"])
}

pub fn other_table() -> TableDefinition {
    TableDefinition::new("other").column(ColumnDefinition::new("id", SqlType::Integer))
}

pub fn snapshot(tables: impl IntoIterator<Item = TableDefinition>) -> SchemaSnapshot {
    tables
        .into_iter()
        .fold(SchemaSnapshot::new(), SchemaSnapshot::table)
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// A generator with a fixed version writing into `dir`.
pub fn generator(dir: &Path, config: GeneratorConfig) -> MigrationGenerator {
    let config = GeneratorConfig {
        migrations_dir: dir.to_path_buf(),
        ..config
    };
    MigrationGenerator::from_config(config, Box::new(FixedVersionAllocator::new(version())))
        .unwrap_or_else(|e| panic!("Failed to configure generator: {e}"))
}

/// How a statement appears in a rendered migration.
pub fn add_sql(sql: &str) -> String {
    format!("target.add_sql({sql:?});")
}

pub fn generated(outcome: GenerationOutcome) -> MigrationArtifact {
    match outcome {
        GenerationOutcome::Generated(artifact) => artifact,
        GenerationOutcome::NoChanges => panic!("Expected a generated migration, got NoChanges"),
    }
}
