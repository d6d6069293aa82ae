//! End-to-end migration generation.
//!
//! provider → comparator → statement generator → version allocator →
//! renderer → writer. Every step completes before the next starts, and
//! nothing is written unless all earlier steps succeeded.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::comparator::compare;
use crate::dialect::DialectKind;
use crate::diff::SchemaDiff;
use crate::error::{DiffgenError, Result, SchemaSide};
use crate::generator::{GeneratedStatements, GeneratorOptions, StatementGenerator};
use crate::provider::SchemaProvider;
use crate::render::{render, TemplateContext};
use crate::template::{DefaultTemplate, FileTemplate, TemplateSource};
use crate::version::{MigrationVersion, VersionAllocator};
use crate::writer::{migration_file_name, ArtifactWriter, FsArtifactWriter};

/// Settings for one generation request.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// SQL dialect of the emitted statements.
    pub dialect: DialectKind,
    /// Statement generation policy.
    pub options: GeneratorOptions,
    /// Directory migration files are written to.
    pub migrations_dir: PathBuf,
    /// Template name; the built-in template when unset.
    pub template: Option<String>,
    /// Base directory for relative template names.
    pub template_dir: PathBuf,
    /// Source injected at the `<custom>` placeholder.
    pub custom_methods: String,
    /// Render without writing.
    pub dry_run: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            options: GeneratorOptions::default(),
            migrations_dir: PathBuf::from("migrations"),
            template: None,
            template_dir: PathBuf::from("."),
            custom_methods: String::new(),
            dry_run: false,
        }
    }
}

impl GeneratorConfig {
    /// Resolves the configured template.
    pub fn template_source(&self) -> Result<Box<dyn TemplateSource>> {
        match &self.template {
            Some(name) => Ok(Box::new(FileTemplate::resolve(name, &self.template_dir)?)),
            None => Ok(Box::new(DefaultTemplate)),
        }
    }
}

/// A rendered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationArtifact {
    /// Allocated version.
    pub version: MigrationVersion,
    /// Statements of `up`.
    pub apply: Vec<String>,
    /// Statements of `down`.
    pub revert: Vec<String>,
    /// Rendered source text.
    pub contents: String,
    /// Where the artifact was written; `None` on a dry run.
    pub path: Option<PathBuf>,
}

impl MigrationArtifact {
    /// File name derived from the version.
    #[must_use]
    pub fn file_name(&self) -> String {
        migration_file_name(&self.version)
    }
}

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The schemas match (after policy); nothing was allocated or written.
    NoChanges,
    /// A migration was rendered (and written unless dry run).
    Generated(MigrationArtifact),
}

/// Drives a generation request from snapshots to a persisted artifact.
pub struct MigrationGenerator {
    statements: StatementGenerator,
    allocator: Box<dyn VersionAllocator>,
    template: Box<dyn TemplateSource>,
    writer: Box<dyn ArtifactWriter>,
    custom_methods: String,
    dry_run: bool,
}

impl MigrationGenerator {
    /// Builds a generator writing into `config.migrations_dir`.
    ///
    /// Fails if the configured template cannot be resolved.
    pub fn from_config(config: GeneratorConfig, allocator: Box<dyn VersionAllocator>) -> Result<Self> {
        let template = config.template_source()?;
        debug!(template = template.name(), dialect = ?config.dialect, "configured generator");

        Ok(Self {
            statements: StatementGenerator::new(config.dialect.dialect(), config.options),
            allocator,
            template,
            writer: Box::new(FsArtifactWriter::new(config.migrations_dir)),
            custom_methods: config.custom_methods,
            dry_run: config.dry_run,
        })
    }

    /// Replaces the artifact writer.
    #[must_use]
    pub fn with_writer(mut self, writer: Box<dyn ArtifactWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Fetches both snapshots and compares them.
    pub fn diff(&self, provider: &dyn SchemaProvider) -> Result<SchemaDiff> {
        let current = provider
            .current_schema()
            .map_err(|err| wrap_side(SchemaSide::Current, err))?;
        let target = provider
            .target_schema()
            .map_err(|err| wrap_side(SchemaSide::Target, err))?;
        Ok(compare(&current, &target))
    }

    /// Fetches both snapshots and compares them, keeping only the changes
    /// the generator options allow.
    pub fn planned_diff(&self, provider: &dyn SchemaProvider) -> Result<SchemaDiff> {
        Ok(self.statements.apply_policy(self.diff(provider)?))
    }

    /// Produces apply and revert SQL without allocating a version.
    pub fn preview(&self, provider: &dyn SchemaProvider) -> Result<GeneratedStatements> {
        let diff = self.diff(provider)?;
        Ok(self.statements.generate(diff))
    }

    /// Generates a migration for the difference between the provider's
    /// snapshots.
    pub fn generate(&mut self, provider: &dyn SchemaProvider) -> Result<GenerationOutcome> {
        let diff = self.diff(provider)?;
        self.generate_diff(diff)
    }

    /// Generates a migration for an already computed diff.
    pub fn generate_diff(&mut self, diff: SchemaDiff) -> Result<GenerationOutcome> {
        let diff = self.statements.apply_policy(diff);
        let change_count = diff.change_count();
        let statements = self.statements.generate(diff);

        if statements.is_empty() {
            info!("No changes detected");
            return Ok(GenerationOutcome::NoChanges);
        }

        info!(
            changes = change_count,
            apply = statements.apply.len(),
            revert = statements.revert.len(),
            "generating migration"
        );
        self.emit(statements).map(GenerationOutcome::Generated)
    }

    /// Generates a migration with empty `up` and `down`.
    pub fn generate_blank(&mut self) -> Result<MigrationArtifact> {
        self.emit(GeneratedStatements::default())
    }

    fn emit(&mut self, statements: GeneratedStatements) -> Result<MigrationArtifact> {
        let version = self.allocator.allocate()?;

        let contents = render(
            self.template.as_ref(),
            &TemplateContext {
                version: &version,
                apply_statements: &statements.apply,
                revert_statements: &statements.revert,
                custom_methods: &self.custom_methods,
            },
        )?;

        let path = if self.dry_run {
            debug!(version = %version, "dry run, not writing");
            None
        } else {
            Some(self.writer.write(&version, &contents)?)
        };

        Ok(MigrationArtifact {
            version,
            apply: statements.apply,
            revert: statements.revert,
            contents,
            path,
        })
    }
}

/// Provider errors that are not already attributed to a side get the side
/// they were requested for.
fn wrap_side(side: SchemaSide, err: DiffgenError) -> DiffgenError {
    match err {
        DiffgenError::SnapshotRetrieval { .. } => err,
        other => DiffgenError::snapshot(side, other),
    }
}

/// Reads a custom methods file, if one is configured.
pub fn read_custom_methods(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::provider::StubSchemaProvider;
    use crate::schema::{ColumnDefinition, SchemaSnapshot, SqlType, TableDefinition};
    use crate::version::FixedVersionAllocator;

    #[derive(Default, Clone)]
    struct MemoryWriter {
        written: Rc<RefCell<Vec<(MigrationVersion, String)>>>,
    }

    impl ArtifactWriter for MemoryWriter {
        fn write(&self, version: &MigrationVersion, contents: &str) -> Result<PathBuf> {
            self.written
                .borrow_mut()
                .push((version.clone(), contents.to_string()));
            Ok(PathBuf::from(migration_file_name(version)))
        }
    }

    struct FailingProvider;

    impl SchemaProvider for FailingProvider {
        fn current_schema(&self) -> Result<SchemaSnapshot> {
            Err(DiffgenError::InvalidState("connection refused".to_string()))
        }

        fn target_schema(&self) -> Result<SchemaSnapshot> {
            Ok(SchemaSnapshot::new())
        }
    }

    fn version() -> MigrationVersion {
        MigrationVersion::parse("20160705000000").unwrap()
    }

    fn pipeline(writer: &MemoryWriter) -> MigrationGenerator {
        MigrationGenerator::from_config(
            GeneratorConfig::default(),
            Box::new(FixedVersionAllocator::new(version())),
        )
        .unwrap()
        .with_writer(Box::new(writer.clone()))
    }

    fn example() -> SchemaSnapshot {
        SchemaSnapshot::new().table(
            TableDefinition::new("example")
                .column(ColumnDefinition::new("id", SqlType::Integer).auto_increment())
                .primary_key(["id"]),
        )
    }

    #[test]
    fn test_generate_writes_once() {
        let writer = MemoryWriter::default();
        let mut generator = pipeline(&writer);

        let provider = StubSchemaProvider::new(SchemaSnapshot::new(), example());
        let outcome = generator.generate(&provider).unwrap();

        let GenerationOutcome::Generated(artifact) = outcome else {
            panic!("Expected a generated migration");
        };
        assert_eq!(artifact.version, version());
        assert_eq!(artifact.file_name(), "Version20160705000000.rs");
        assert_eq!(artifact.path, Some(PathBuf::from("Version20160705000000.rs")));
        assert!(artifact.contents.contains("pub struct Version20160705000000;"));

        let written = writer.written.borrow();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].1, artifact.contents);
    }

    #[test]
    fn test_no_changes_allocates_nothing() {
        let writer = MemoryWriter::default();
        let mut generator = pipeline(&writer);

        let provider = StubSchemaProvider::new(example(), example());
        assert_eq!(generator.generate(&provider).unwrap(), GenerationOutcome::NoChanges);
        assert!(writer.written.borrow().is_empty());

        // The fixed version is still available.
        assert!(generator.generate_blank().is_ok());
    }

    #[test]
    fn test_provider_failure_names_side() {
        let writer = MemoryWriter::default();
        let mut generator = pipeline(&writer);

        let result = generator.generate(&FailingProvider);
        assert!(matches!(
            result,
            Err(DiffgenError::SnapshotRetrieval {
                side: SchemaSide::Current,
                ..
            })
        ));
        assert!(writer.written.borrow().is_empty());
    }

    #[test]
    fn test_planned_diff_follows_policy() {
        let writer = MemoryWriter::default();
        let config = GeneratorConfig {
            options: GeneratorOptions {
                suppress_destructive: true,
            },
            ..GeneratorConfig::default()
        };
        let mut generator = MigrationGenerator::from_config(
            config,
            Box::new(FixedVersionAllocator::new(version())),
        )
        .unwrap()
        .with_writer(Box::new(writer.clone()));

        let other = SchemaSnapshot::new().table(
            TableDefinition::new("other").column(ColumnDefinition::new("id", SqlType::Integer)),
        );
        let provider = StubSchemaProvider::new(other, example());

        let diff = generator.planned_diff(&provider).unwrap();
        assert!(diff.removed.is_empty());
        assert!(!diff.to_string().contains("other"));

        let GenerationOutcome::Generated(artifact) = generator.generate_diff(diff).unwrap() else {
            panic!("Expected a generated migration");
        };
        assert!(artifact.apply.iter().all(|sql| !sql.contains("other")));
        assert_eq!(writer.written.borrow().len(), 1);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let writer = MemoryWriter::default();
        let config = GeneratorConfig {
            dry_run: true,
            ..GeneratorConfig::default()
        };
        let mut generator =
            MigrationGenerator::from_config(config, Box::new(FixedVersionAllocator::new(version())))
                .unwrap()
                .with_writer(Box::new(writer.clone()));

        let artifact = generator.generate_blank().unwrap();
        assert!(artifact.path.is_none());
        assert!(artifact.apply.is_empty());
        assert!(writer.written.borrow().is_empty());
    }

    #[test]
    fn test_missing_template_fails_before_anything_runs() {
        let config = GeneratorConfig {
            template: Some("does-not-exist.tpl".to_string()),
            template_dir: PathBuf::from("/nonexistent"),
            ..GeneratorConfig::default()
        };
        let result =
            MigrationGenerator::from_config(config, Box::new(FixedVersionAllocator::new(version())));
        assert!(matches!(result, Err(DiffgenError::TemplateNotFound { .. })));
    }
}
