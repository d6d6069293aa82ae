//! Runtime interface of generated migration files.
//!
//! A rendered artifact defines `pub struct Version<version>` implementing
//! [`VersionedMigration`]. Its `up` and `down` functions hand their SQL, in
//! order, to a [`SchemaTarget`]; running the statements is up to the target.

/// Receives the statements of a migration direction.
pub trait SchemaTarget {
    /// Queues one SQL statement.
    fn add_sql(&mut self, sql: &str);
}

/// A generated, versioned migration.
pub trait VersionedMigration {
    /// Version identifier (`YYYYMMDDHHMMSS`).
    const VERSION: &'static str;

    /// Statements that move the schema forward.
    fn up(target: &mut dyn SchemaTarget);

    /// Statements that undo [`up`](Self::up).
    fn down(target: &mut dyn SchemaTarget);

    /// Collects the forward statements.
    fn up_statements() -> Vec<String> {
        let mut recorder = StatementRecorder::default();
        Self::up(&mut recorder);
        recorder.into_statements()
    }

    /// Collects the reverting statements.
    fn down_statements() -> Vec<String> {
        let mut recorder = StatementRecorder::default();
        Self::down(&mut recorder);
        recorder.into_statements()
    }
}

/// A [`SchemaTarget`] that keeps statements in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementRecorder {
    statements: Vec<String>,
}

impl StatementRecorder {
    /// Recorded statements in order.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Consumes the recorder.
    #[must_use]
    pub fn into_statements(self) -> Vec<String> {
        self.statements
    }
}

impl SchemaTarget for StatementRecorder {
    fn add_sql(&mut self, sql: &str) {
        self.statements.push(sql.to_string());
    }
}
