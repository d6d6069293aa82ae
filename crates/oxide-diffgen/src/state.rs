//! In-memory schema replay.
//!
//! [`SchemaState`] applies planned operations to a [`SchemaSnapshot`] without
//! touching a database. It is how apply/revert plans are checked to land on
//! the snapshot they claim to produce.

use crate::error::{DiffgenError, Result};
use crate::operations::MigrationOperation;
use crate::schema::{SchemaSnapshot, TableDefinition};

/// A schema that operations can be replayed against.
#[derive(Debug, Default)]
pub struct SchemaState {
    schema: SchemaSnapshot,
}

impl SchemaState {
    /// Creates a new empty schema state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing snapshot.
    #[must_use]
    pub fn from_snapshot(schema: SchemaSnapshot) -> Self {
        Self { schema }
    }

    /// Returns the current schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    /// Consumes and returns the schema.
    #[must_use]
    pub fn into_schema(self) -> SchemaSnapshot {
        self.schema
    }

    /// Applies operations in order, stopping at the first invalid one.
    pub fn apply_all<'a, I>(&mut self, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a MigrationOperation>,
    {
        for operation in operations {
            self.apply_operation(operation)?;
        }
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableDefinition> {
        self.schema
            .get_table_mut(name)
            .ok_or_else(|| DiffgenError::InvalidState(format!("Table '{name}' does not exist")))
    }

    /// Applies a single operation to the schema state.
    pub fn apply_operation(&mut self, operation: &MigrationOperation) -> Result<()> {
        match operation {
            MigrationOperation::CreateTable {
                name,
                columns,
                primary_key,
                foreign_keys,
            } => {
                if self.schema.get_table(name).is_some() {
                    return Err(DiffgenError::InvalidState(format!(
                        "Table '{name}' already exists"
                    )));
                }

                let table = columns
                    .iter()
                    .cloned()
                    .fold(TableDefinition::new(name.as_str()), TableDefinition::column)
                    .primary_key(primary_key.iter().cloned());
                let table = foreign_keys
                    .iter()
                    .cloned()
                    .fold(table, TableDefinition::foreign_key);
                self.schema.add_table(table);
            }

            MigrationOperation::DropTable { name } => {
                if self.schema.tables.remove(name).is_none() {
                    return Err(DiffgenError::InvalidState(format!(
                        "Table '{name}' does not exist"
                    )));
                }
            }

            MigrationOperation::AddColumn { table, column } => {
                let t = self.table_mut(table)?;
                if t.get_column(&column.name).is_some() {
                    return Err(DiffgenError::InvalidState(format!(
                        "Column '{}' already exists in table '{}'",
                        column.name, table
                    )));
                }
                let pos = t.columns.partition_point(|c| c.name < column.name);
                t.columns.insert(pos, column.clone());
            }

            MigrationOperation::DropColumn { table, column_name } => {
                let t = self.table_mut(table)?;
                let idx = t
                    .columns
                    .iter()
                    .position(|c| c.name == *column_name)
                    .ok_or_else(|| {
                        DiffgenError::InvalidState(format!(
                            "Column '{column_name}' does not exist in table '{table}'"
                        ))
                    })?;
                t.columns.remove(idx);
            }

            MigrationOperation::AlterColumn {
                table,
                before,
                after,
            } => {
                let t = self.table_mut(table)?;
                let col = t.get_column_mut(&before.name).ok_or_else(|| {
                    DiffgenError::InvalidState(format!(
                        "Column '{}' does not exist in table '{}'",
                        before.name, table
                    ))
                })?;
                if col != before {
                    return Err(DiffgenError::InvalidState(format!(
                        "Column '{}' in table '{}' does not match the expected definition",
                        before.name, table
                    )));
                }
                *col = after.clone();
            }

            MigrationOperation::AlterPrimaryKey {
                table,
                before,
                after,
            } => {
                let t = self.table_mut(table)?;
                if t.primary_key != *before {
                    return Err(DiffgenError::InvalidState(format!(
                        "Primary key of table '{table}' is ({}), expected ({})",
                        t.primary_key.join(", "),
                        before.join(", ")
                    )));
                }
                t.primary_key.clone_from(after);
            }

            MigrationOperation::CreateIndex { table, index } => {
                let t = self.table_mut(table)?;
                if t.indexes.iter().any(|i| i.name == index.name) {
                    return Err(DiffgenError::InvalidState(format!(
                        "Index '{}' already exists in table '{}'",
                        index.name, table
                    )));
                }
                let pos = t.indexes.partition_point(|i| i.name < index.name);
                t.indexes.insert(pos, index.clone());
            }

            MigrationOperation::DropIndex { table, name } => {
                let t = self.table_mut(table)?;
                let idx = t
                    .indexes
                    .iter()
                    .position(|i| i.name == *name)
                    .ok_or_else(|| {
                        DiffgenError::InvalidState(format!(
                            "Index '{name}' does not exist in table '{table}'"
                        ))
                    })?;
                t.indexes.remove(idx);
            }

            MigrationOperation::AddForeignKey { table, foreign_key } => {
                let t = self.table_mut(table)?;
                if t.foreign_keys.iter().any(|f| f.name == foreign_key.name) {
                    return Err(DiffgenError::InvalidState(format!(
                        "Foreign key '{}' already exists in table '{}'",
                        foreign_key.name, table
                    )));
                }
                let pos = t.foreign_keys.partition_point(|f| f.name < foreign_key.name);
                t.foreign_keys.insert(pos, foreign_key.clone());
            }

            MigrationOperation::DropForeignKey {
                table,
                constraint_name,
            } => {
                let t = self.table_mut(table)?;
                let idx = t
                    .foreign_keys
                    .iter()
                    .position(|fk| fk.name == *constraint_name)
                    .ok_or_else(|| {
                        DiffgenError::InvalidState(format!(
                            "Foreign key '{constraint_name}' does not exist in table '{table}'"
                        ))
                    })?;
                t.foreign_keys.remove(idx);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, ForeignKeyDefinition, IndexDefinition, SqlType};

    fn create_users() -> MigrationOperation {
        MigrationOperation::create_table(
            "users",
            vec![
                ColumnDefinition::new("id", SqlType::BigInt).auto_increment(),
                ColumnDefinition::new("username", SqlType::Varchar(255)).not_null(),
            ],
            vec!["id".to_string()],
        )
    }

    #[test]
    fn test_create_table() {
        let mut state = SchemaState::new();
        state.apply_operation(&create_users()).unwrap();

        let users = state.schema().get_table("users").unwrap();
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.primary_key, vec!["id"]);
    }

    #[test]
    fn test_create_table_with_inline_foreign_keys() {
        let op = MigrationOperation::create_table(
            "posts",
            vec![ColumnDefinition::new("author_id", SqlType::BigInt).not_null()],
            Vec::new(),
        )
        .with_foreign_keys(vec![
            ForeignKeyDefinition::new("posts_editor_id_fkey", ["editor_id"], "users", ["id"]),
            ForeignKeyDefinition::new("posts_author_id_fkey", ["author_id"], "users", ["id"]),
        ]);

        let mut state = SchemaState::new();
        state.apply_operation(&op).unwrap();

        let posts = state.schema().get_table("posts").unwrap();
        let names: Vec<&str> = posts.foreign_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["posts_author_id_fkey", "posts_editor_id_fkey"]);
        assert!(state.schema().is_canonical());
    }

    #[test]
    fn test_add_column_keeps_canonical_order() {
        let mut state = SchemaState::new();
        state
            .apply_all(&[
                create_users(),
                MigrationOperation::add_column(
                    "users",
                    ColumnDefinition::new("email", SqlType::Varchar(255)),
                ),
            ])
            .unwrap();

        let users = state.schema().get_table("users").unwrap();
        assert_eq!(users.columns[0].name, "email");
        assert!(state.schema().is_canonical());
    }

    #[test]
    fn test_drop_column() {
        let mut state = SchemaState::new();
        state.apply_operation(&create_users()).unwrap();
        state
            .apply_operation(&MigrationOperation::drop_column("users", "username"))
            .unwrap();

        let users = state.schema().get_table("users").unwrap();
        assert!(users.get_column("username").is_none());
    }

    #[test]
    fn test_alter_column_checks_before() {
        let mut state = SchemaState::new();
        state.apply_operation(&create_users()).unwrap();

        let stale = MigrationOperation::AlterColumn {
            table: "users".to_string(),
            before: ColumnDefinition::new("username", SqlType::Text),
            after: ColumnDefinition::new("username", SqlType::Varchar(80)),
        };
        assert!(matches!(
            state.apply_operation(&stale),
            Err(DiffgenError::InvalidState(_))
        ));

        let valid = MigrationOperation::AlterColumn {
            table: "users".to_string(),
            before: ColumnDefinition::new("username", SqlType::Varchar(255)).not_null(),
            after: ColumnDefinition::new("username", SqlType::Varchar(80)).not_null(),
        };
        state.apply_operation(&valid).unwrap();
        let col = state.schema().tables["users"].get_column("username").unwrap();
        assert_eq!(col.sql_type, SqlType::Varchar(80));
    }

    #[test]
    fn test_index_lifecycle() {
        let mut state = SchemaState::new();
        state.apply_operation(&create_users()).unwrap();

        let create = MigrationOperation::create_index(
            "users",
            IndexDefinition::new("idx_username", ["username"]).unique(),
        );
        state.apply_operation(&create).unwrap();
        assert!(matches!(
            state.apply_operation(&create),
            Err(DiffgenError::InvalidState(_))
        ));

        state
            .apply_operation(&MigrationOperation::drop_index("users", "idx_username"))
            .unwrap();
        assert!(state.schema().tables["users"].indexes.is_empty());
    }

    #[test]
    fn test_duplicate_table_error() {
        let mut state = SchemaState::new();
        state.apply_operation(&create_users()).unwrap();

        let result = state.apply_operation(&create_users());
        assert!(matches!(result, Err(DiffgenError::InvalidState(_))));
    }

    #[test]
    fn test_missing_table_error() {
        let mut state = SchemaState::new();

        let result = state.apply_operation(&MigrationOperation::add_column(
            "nonexistent",
            ColumnDefinition::new("col", SqlType::Text),
        ));
        assert!(matches!(result, Err(DiffgenError::InvalidState(_))));

        let result = state.apply_operation(&MigrationOperation::drop_table("nonexistent"));
        assert!(matches!(result, Err(DiffgenError::InvalidState(_))));
    }
}
