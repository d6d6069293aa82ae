//! PostgreSQL dialect for migrations.

use crate::operations::MigrationOperation;
use crate::schema::{ColumnDefinition, ForeignKeyDefinition, SqlType};

use super::MigrationDialect;

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn primary_key_name(&self, table: &str) -> String {
        self.quote_identifier(&format!("{table}_pkey"))
    }

    fn create_table_sql(
        &self,
        name: &str,
        columns: &[ColumnDefinition],
        primary_key: &[String],
        foreign_keys: &[ForeignKeyDefinition],
    ) -> String {
        let mut parts: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        if !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(primary_key)));
        }
        parts.extend(foreign_keys.iter().map(|fk| self.foreign_key_constraint(fk)));
        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(name),
            parts.join(", ")
        )
    }

    /// One statement per changed attribute.
    fn alter_column_sql(
        &self,
        table: &str,
        before: &ColumnDefinition,
        after: &ColumnDefinition,
    ) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(&after.name)
        );
        let mut statements = Vec::new();

        if before.sql_type != after.sql_type {
            statements.push(format!("{prefix} TYPE {}", self.type_name(&after.sql_type)));
        }
        // An identity column must already be NOT NULL, and dropping the
        // identity has to precede DROP NOT NULL.
        let nullability = (before.nullable != after.nullable).then(|| {
            if after.nullable {
                format!("{prefix} DROP NOT NULL")
            } else {
                format!("{prefix} SET NOT NULL")
            }
        });
        let identity = (before.autoincrement != after.autoincrement).then(|| {
            if after.autoincrement {
                format!("{prefix} ADD GENERATED BY DEFAULT AS IDENTITY")
            } else {
                format!("{prefix} DROP IDENTITY")
            }
        });
        if after.autoincrement {
            statements.extend(nullability);
            statements.extend(identity);
        } else {
            statements.extend(identity);
            statements.extend(nullability);
        }
        if before.default != after.default {
            statements.push(match after.default.to_sql() {
                Some(sql) => format!("{prefix} SET DEFAULT {sql}"),
                None => format!("{prefix} DROP DEFAULT"),
            });
        }

        statements
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
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

            MigrationOperation::DropColumn { table, column_name } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(column_name)
            )],

            MigrationOperation::AlterColumn {
                table,
                before,
                after,
            } => self.alter_column_sql(table, before, after),

            MigrationOperation::AlterPrimaryKey {
                table,
                before,
                after,
            } => {
                let mut statements = Vec::new();
                if !before.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} DROP CONSTRAINT {}",
                        self.quote_identifier(table),
                        self.primary_key_name(table)
                    ));
                }
                if !after.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                        self.quote_identifier(table),
                        self.primary_key_name(table),
                        self.column_list(after)
                    ));
                }
                statements
            }

            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index_sql(table, index)]
            }

            MigrationOperation::DropIndex { name, .. } => {
                vec![format!("DROP INDEX {}", self.quote_identifier(name))]
            }

            MigrationOperation::AddForeignKey { table, foreign_key } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.quote_identifier(table),
                self.foreign_key_constraint(foreign_key)
            )],

            MigrationOperation::DropForeignKey {
                table,
                constraint_name,
            } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote_identifier(table),
                self.quote_identifier(constraint_name)
            )],
        }
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Char(len) => format!("CHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::DateTime | SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            SqlType::Numeric(p, s) => format!("NUMERIC({p}, {s})"),
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];

        if column.autoincrement {
            parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
        }

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default_sql) = column.default.to_sql() {
            parts.push(format!("DEFAULT {default_sql}"));
        }

        parts.join(" ")
    }
}
