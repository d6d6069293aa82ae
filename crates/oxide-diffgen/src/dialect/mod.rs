//! Database dialect implementations.
//!
//! Each dialect knows how to turn a planned [`MigrationOperation`] into the
//! SQL statements for that database system.

mod postgres;
mod sqlite;

use clap::ValueEnum;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::operations::MigrationOperation;
use crate::schema::{ColumnDefinition, ForeignKeyAction, ForeignKeyDefinition, IndexDefinition, SqlType};

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for a migration operation.
    fn generate_sql(&self, operation: &MigrationOperation) -> Vec<String>;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnDefinition) -> String;

    /// Whether foreign keys of a new table are declared inside its
    /// `CREATE TABLE` instead of being added afterwards.
    fn inline_foreign_keys(&self) -> bool {
        false
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes and joins a list of column names.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates `CREATE [UNIQUE] INDEX` SQL.
    fn create_index_sql(&self, table: &str, index: &IndexDefinition) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table));
        sql.push_str(" (");
        sql.push_str(&self.column_list(&index.columns));
        sql.push(')');

        if let Some(cond) = &index.condition {
            sql.push_str(" WHERE ");
            sql.push_str(cond);
        }

        sql
    }

    /// Generates the `FOREIGN KEY ... REFERENCES ...` clause.
    fn foreign_key_clause(&self, fk: &ForeignKeyDefinition) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.column_list(&fk.references_columns)
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(fk.on_delete.to_sql());
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(fk.on_update.to_sql());
        }
        sql
    }

    /// Generates a named `CONSTRAINT ... FOREIGN KEY` table constraint.
    fn foreign_key_constraint(&self, fk: &ForeignKeyDefinition) -> String {
        format!(
            "CONSTRAINT {} {}",
            self.quote_identifier(&fk.name),
            self.foreign_key_clause(fk)
        )
    }
}

/// Supported dialects, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DialectKind {
    /// PostgreSQL.
    #[default]
    #[value(alias = "postgresql", alias = "pg")]
    Postgres,
    /// SQLite.
    #[value(alias = "sqlite3")]
    Sqlite,
}

impl DialectKind {
    /// Instantiates the dialect.
    #[must_use]
    pub fn dialect(self) -> Box<dyn MigrationDialect> {
        match self {
            Self::Postgres => Box::new(PostgresDialect::new()),
            Self::Sqlite => Box::new(SqliteDialect::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_from_str() {
        assert_eq!(
            DialectKind::from_str("postgresql", true),
            Ok(DialectKind::Postgres)
        );
        assert_eq!(DialectKind::from_str("SQLite", true), Ok(DialectKind::Sqlite));
        assert_eq!(DialectKind::from_str("sqlite3", false), Ok(DialectKind::Sqlite));
        assert!(DialectKind::from_str("oracle", true).is_err());
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        let d = PostgresDialect::new();
        assert_eq!(d.quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_dialect_kind_instantiates() {
        assert_eq!(DialectKind::Postgres.dialect().name(), "postgres");
        assert_eq!(DialectKind::Sqlite.dialect().name(), "sqlite");
        assert!(!DialectKind::Postgres.dialect().inline_foreign_keys());
        assert!(DialectKind::Sqlite.dialect().inline_foreign_keys());
    }
}
