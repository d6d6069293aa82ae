//! Migration operations.
//!
//! The statement generator plans a diff as a list of operations; a dialect
//! then turns each operation into SQL, and [`SchemaState`](crate::state::SchemaState)
//! can replay them against an in-memory snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDefinition, ForeignKeyDefinition, IndexDefinition};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MigrationOperation {
    /// Create a new table with its columns and primary key.
    CreateTable {
        /// Table name.
        name: String,
        /// Column definitions.
        columns: Vec<ColumnDefinition>,
        /// Primary key column(s).
        primary_key: Vec<String>,
        /// Foreign keys declared inline with the table.
        #[serde(default)]
        foreign_keys: Vec<ForeignKeyDefinition>,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnDefinition,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Change a column's type, nullability, default or autoincrement flag.
    AlterColumn {
        /// Table name.
        table: String,
        /// Definition before the change.
        before: ColumnDefinition,
        /// Definition after the change.
        after: ColumnDefinition,
    },

    /// Replace a table's primary key.
    AlterPrimaryKey {
        /// Table name.
        table: String,
        /// Key columns before the change (empty if there was none).
        before: Vec<String>,
        /// Key columns after the change (empty to remove the key).
        after: Vec<String>,
    },

    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: IndexDefinition,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKeyDefinition,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint_name: String,
    },
}

impl MigrationOperation {
    /// Creates a CreateTable operation.
    #[must_use]
    pub fn create_table(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        primary_key: Vec<String>,
    ) -> Self {
        Self::CreateTable {
            name: name.into(),
            columns,
            primary_key,
            foreign_keys: Vec::new(),
        }
    }

    /// Declares foreign keys inline on a CreateTable operation. Other
    /// operations are returned unchanged.
    #[must_use]
    pub fn with_foreign_keys(self, foreign_keys: Vec<ForeignKeyDefinition>) -> Self {
        match self {
            Self::CreateTable {
                name,
                columns,
                primary_key,
                ..
            } => Self::CreateTable {
                name,
                columns,
                primary_key,
                foreign_keys,
            },
            other => other,
        }
    }

    /// Creates a DropTable operation.
    #[must_use]
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Creates an AddColumn operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: ColumnDefinition) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a DropColumn operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates a CreateIndex operation.
    #[must_use]
    pub fn create_index(table: impl Into<String>, index: IndexDefinition) -> Self {
        Self::CreateIndex {
            table: table.into(),
            index,
        }
    }

    /// Creates a DropIndex operation.
    #[must_use]
    pub fn drop_index(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropIndex {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates an AddForeignKey operation.
    #[must_use]
    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKeyDefinition) -> Self {
        Self::AddForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    /// Creates a DropForeignKey operation.
    #[must_use]
    pub fn drop_foreign_key(table: impl Into<String>, constraint_name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            constraint_name: constraint_name.into(),
        }
    }

    /// Name of the table this operation touches.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { name, .. } | Self::DropTable { name } => name,
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::AlterPrimaryKey { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. } => table,
        }
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { name, .. } => write!(f, "Create table '{name}'"),
            Self::DropTable { name } => write!(f, "Drop table '{name}'"),
            Self::AddColumn { table, column } => {
                write!(f, "Add column '{}' to table '{}'", column.name, table)
            }
            Self::DropColumn { table, column_name } => {
                write!(f, "Drop column '{column_name}' from table '{table}'")
            }
            Self::AlterColumn { table, after, .. } => {
                write!(f, "Alter column '{}' in table '{}'", after.name, table)
            }
            Self::AlterPrimaryKey { table, after, .. } => write!(
                f,
                "Set primary key of table '{}' to ({})",
                table,
                after.join(", ")
            ),
            Self::CreateIndex { table, index } => {
                write!(f, "Create index '{}' on table '{}'", index.name, table)
            }
            Self::DropIndex { table, name } => {
                write!(f, "Drop index '{name}' from table '{table}'")
            }
            Self::AddForeignKey { table, foreign_key } => write!(
                f,
                "Add foreign key '{}' to table '{}'",
                foreign_key.name, table
            ),
            Self::DropForeignKey {
                table,
                constraint_name,
            } => write!(f, "Drop foreign key '{constraint_name}' from table '{table}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    #[test]
    fn test_table_accessor() {
        let op = MigrationOperation::add_column("users", ColumnDefinition::new("email", SqlType::Text));
        assert_eq!(op.table(), "users");
        assert_eq!(MigrationOperation::drop_table("posts").table(), "posts");
    }

    #[test]
    fn test_description() {
        let op = MigrationOperation::create_index(
            "users",
            IndexDefinition::new("idx_users_email", ["email"]).unique(),
        );
        assert_eq!(
            op.to_string(),
            "Create index 'idx_users_email' on table 'users'"
        );

        let op = MigrationOperation::drop_foreign_key("posts", "fk_posts_author");
        assert_eq!(
            op.to_string(),
            "Drop foreign key 'fk_posts_author' from table 'posts'"
        );
    }
}
