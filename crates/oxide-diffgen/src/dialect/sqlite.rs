//! SQLite dialect for migrations.
//!
//! SQLite has limited ALTER TABLE support: columns cannot be altered and
//! constraints cannot be added or dropped after creation. Those operations
//! are emitted as SQL comments naming the table that needs recreation.
//! Foreign keys of a new table are declared inside its `CREATE TABLE`.

use crate::operations::MigrationOperation;
use crate::schema::{ColumnDefinition, ForeignKeyDefinition, SqlType};

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// A single autoincrement column key is declared inline, since SQLite
    /// only accepts AUTOINCREMENT on `INTEGER PRIMARY KEY`.
    fn inline_key<'a>(
        &self,
        columns: &'a [ColumnDefinition],
        primary_key: &[String],
    ) -> Option<&'a ColumnDefinition> {
        match primary_key {
            [only] => columns.iter().find(|c| &c.name == only && c.autoincrement),
            _ => None,
        }
    }

    fn create_table_sql(
        &self,
        name: &str,
        columns: &[ColumnDefinition],
        primary_key: &[String],
        foreign_keys: &[ForeignKeyDefinition],
    ) -> String {
        let inline = self.inline_key(columns, primary_key);

        let mut parts: Vec<String> = columns
            .iter()
            .map(|c| match inline {
                Some(key) if key.name == c.name => format!(
                    "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                    self.quote_identifier(&c.name)
                ),
                _ => self.column_definition(c),
            })
            .collect();

        if inline.is_none() && !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(primary_key)));
        }
        parts.extend(foreign_keys.iter().map(|fk| self.foreign_key_constraint(fk)));

        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(name),
            parts.join(", ")
        )
    }

    fn recreation_required(&self, table: &str, what: &str) -> String {
        format!("-- SQLite cannot {what} in place; recreate table {table}")
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn inline_foreign_keys(&self) -> bool {
        true
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Vec<String> {
        match operation {
            MigrationOperation::CreateTable {
                name,
                columns,
                primary_key,
                foreign_keys,
            } => vec![self.create_table_sql(name, columns, primary_key, foreign_keys)],

            MigrationOperation::DropTable { name } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(name))]
            }

            MigrationOperation::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column)
            )],

            // SQLite 3.35.0+
            MigrationOperation::DropColumn { table, column_name } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(column_name)
            )],

            MigrationOperation::AlterColumn { table, after, .. } => vec![self.recreation_required(
                table,
                &format!("alter column {}", after.name),
            )],

            MigrationOperation::AlterPrimaryKey { table, .. } => {
                vec![self.recreation_required(table, "change the primary key")]
            }

            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index_sql(table, index)]
            }

            MigrationOperation::DropIndex { name, .. } => {
                vec![format!("DROP INDEX {}", self.quote_identifier(name))]
            }

            MigrationOperation::AddForeignKey { table, foreign_key } => {
                vec![self.recreation_required(
                    table,
                    &format!("add foreign key {}", foreign_key.name),
                )]
            }

            MigrationOperation::DropForeignKey {
                table,
                constraint_name,
            } => vec![self.recreation_required(
                table,
                &format!("drop foreign key {constraint_name}"),
            )],
        }
    }

    /// Declared type names are kept so introspection reads them back unchanged.
    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Char(len) => format!("CHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            SqlType::Numeric(p, s) => format!("NUMERIC({p}, {s})"),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default_sql) = column.default.to_sql() {
            parts.push(format!("DEFAULT {default_sql}"));
        }

        parts.join(" ")
    }
}
