//! Live SQLite introspection.
//!
//! Reads `sqlite_master` and the table-valued pragmas into a canonical
//! [`SchemaSnapshot`]. SQLite does not keep foreign key constraint names, so
//! they are synthesized as `<table>_<columns>_fkey`; foreign keys are compared
//! by signature, so the names never produce spurious changes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::Result;
use crate::schema::{
    ColumnDefinition, DefaultValue, ForeignKeyAction, ForeignKeyDefinition, IndexDefinition,
    SchemaSnapshot, SqlType, TableDefinition,
};

type ColumnRow = (String, String, i64, Option<String>, i64);
type IndexRow = (String, i64, String);
type ForeignKeyRow = (i64, String, String, Option<String>, String, String);

fn where_clause() -> &'static Regex {
    static WHERE: OnceLock<Regex> = OnceLock::new();
    WHERE.get_or_init(|| Regex::new(r"(?is)\bWHERE\b(.+)$").expect("Invalid WHERE regex"))
}

/// Reads the schema of every user table in the database.
pub async fn introspect_sqlite(pool: &SqlitePool) -> Result<SchemaSnapshot> {
    let tables: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut snapshot = SchemaSnapshot::new();
    for (name, sql) in tables {
        let table = introspect_table(pool, &name, sql.as_deref()).await?;
        snapshot.add_table(table);
    }
    snapshot.canonicalize();

    debug!(tables = snapshot.tables.len(), "introspected sqlite schema");
    Ok(snapshot)
}

async fn introspect_table(
    pool: &SqlitePool,
    name: &str,
    create_sql: Option<&str>,
) -> Result<TableDefinition> {
    let rows: Vec<ColumnRow> = sqlx::query_as(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
    )
    .bind(name)
    .fetch_all(pool)
    .await?;

    let mut key: Vec<(i64, String)> = rows
        .iter()
        .filter(|row| row.4 > 0)
        .map(|row| (row.4, row.0.clone()))
        .collect();
    key.sort();
    let primary_key: Vec<String> = key.into_iter().map(|(_, column)| column).collect();

    let autoincrement = primary_key.len() == 1
        && create_sql.is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

    let mut table = TableDefinition::new(name);
    for (column, declared, not_null, default, _) in rows {
        let mut definition = ColumnDefinition::new(column.as_str(), SqlType::parse(&declared))
            .default(DefaultValue::from_sql(default.as_deref()));
        if not_null != 0 {
            definition = definition.not_null();
        }
        if autoincrement && primary_key[0] == column {
            definition = definition.auto_increment();
        }
        table = table.column(definition);
    }
    table = table.primary_key(primary_key);

    for index in introspect_indexes(pool, name).await? {
        table = table.index(index);
    }
    for fk in introspect_foreign_keys(pool, name).await? {
        table = table.foreign_key(fk);
    }

    Ok(table)
}

async fn introspect_indexes(pool: &SqlitePool, table: &str) -> Result<Vec<IndexDefinition>> {
    let rows: Vec<IndexRow> =
        sqlx::query_as(r#"SELECT name, "unique", origin FROM pragma_index_list(?)"#)
            .bind(table)
            .fetch_all(pool)
            .await?;

    let mut indexes = Vec::new();
    // Key and UNIQUE constraint indexes are part of the table definition.
    for (name, unique, _) in rows
        .into_iter()
        .filter(|(name, _, origin)| origin == "c" && !name.starts_with("sqlite_autoindex"))
    {
        let columns: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(name.as_str())
                .fetch_all(pool)
                .await?;

        let sql: Option<(Option<String>,)> =
            sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?")
                .bind(name.as_str())
                .fetch_optional(pool)
                .await?;
        let condition = sql
            .and_then(|(sql,)| sql)
            .and_then(|sql| {
                where_clause()
                    .captures(&sql)
                    .map(|caps| caps[1].trim().to_string())
            });

        let mut index = IndexDefinition::new(name, columns.into_iter().filter_map(|(c,)| c));
        index.unique = unique != 0;
        index.condition = condition;
        indexes.push(index);
    }

    Ok(indexes)
}

async fn introspect_foreign_keys(
    pool: &SqlitePool,
    table: &str,
) -> Result<Vec<ForeignKeyDefinition>> {
    let rows: Vec<ForeignKeyRow> = sqlx::query_as(
        r#"SELECT id, "table", "from", "to", on_update, on_delete FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let mut grouped: BTreeMap<i64, Vec<ForeignKeyRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.0).or_default().push(row);
    }

    let mut foreign_keys = Vec::new();
    for parts in grouped.into_values() {
        let Some(first) = parts.first() else {
            continue;
        };
        let references_table = first.1.clone();
        let on_update = ForeignKeyAction::parse(&first.4);
        let on_delete = ForeignKeyAction::parse(&first.5);

        let columns: Vec<String> = parts.iter().map(|p| p.2.clone()).collect();
        let references_columns: Vec<String> = if parts.iter().all(|p| p.3.is_some()) {
            parts.iter().filter_map(|p| p.3.clone()).collect()
        } else {
            // Implicit reference to the parent's primary key.
            referenced_key(pool, &references_table).await?
        };

        let name = format!("{table}_{}_fkey", columns.join("_"));
        foreign_keys.push(
            ForeignKeyDefinition::new(name, columns, references_table, references_columns)
                .on_update(on_update)
                .on_delete(on_delete),
        );
    }

    Ok(foreign_keys)
}

async fn referenced_key(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT name, pk FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk")
            .bind(table)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(name, _)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::compare;
    use crate::dialect::{MigrationDialect, SqliteDialect};
    use crate::generator::{GeneratorOptions, StatementGenerator};
    use crate::operations::MigrationOperation;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn execute(pool: &SqlitePool, sql: &str) {
        sqlx::query(sql).execute(pool).await.unwrap();
    }

    fn users() -> TableDefinition {
        TableDefinition::new("users")
            .column(ColumnDefinition::new("id", SqlType::Integer).auto_increment())
            .column(ColumnDefinition::new("email", SqlType::Varchar(255)).not_null())
            .column(
                ColumnDefinition::new("nickname", SqlType::Text)
                    .default(DefaultValue::String("anon".into())),
            )
            .primary_key(["id"])
            .index(IndexDefinition::new("idx_users_email", ["email"]).unique())
    }

    #[tokio::test]
    async fn test_empty_database() {
        let pool = create_test_pool().await;
        let snapshot = introspect_sqlite(&pool).await.unwrap();
        assert!(snapshot.tables.is_empty());
    }

    #[tokio::test]
    async fn test_generated_schema_reads_back_unchanged() {
        let pool = create_test_pool().await;
        let dialect = SqliteDialect::new();
        let table = users();

        let mut operations = vec![MigrationOperation::create_table(
            "users",
            table.columns.clone(),
            table.primary_key.clone(),
        )];
        operations.extend(
            table
                .indexes
                .iter()
                .map(|i| MigrationOperation::create_index("users", i.clone())),
        );
        for op in &operations {
            for sql in dialect.generate_sql(op) {
                execute(&pool, &sql).await;
            }
        }

        let introspected = introspect_sqlite(&pool).await.unwrap();
        let expected = SchemaSnapshot::new().table(table);
        assert!(compare(&introspected, &expected).is_empty());
    }

    #[tokio::test]
    async fn test_applied_migration_with_foreign_keys_reaches_target() {
        let pool = create_test_pool().await;
        let target = SchemaSnapshot::new().table(users()).table(
            TableDefinition::new("posts")
                .column(ColumnDefinition::new("id", SqlType::Integer).auto_increment())
                .column(ColumnDefinition::new("author_id", SqlType::Integer).not_null())
                .primary_key(["id"])
                .foreign_key(
                    ForeignKeyDefinition::new("posts_author_id_fkey", ["author_id"], "users", ["id"])
                        .on_delete(ForeignKeyAction::Cascade),
                ),
        );

        let generator =
            StatementGenerator::new(Box::new(SqliteDialect::new()), GeneratorOptions::default());
        let statements = generator.generate(compare(&SchemaSnapshot::new(), &target));
        assert!(statements.apply.iter().all(|sql| !sql.starts_with("--")));
        for sql in &statements.apply {
            execute(&pool, sql).await;
        }

        let introspected = introspect_sqlite(&pool).await.unwrap();
        assert!(compare(&introspected, &target).is_empty());

        for sql in &statements.revert {
            execute(&pool, sql).await;
        }
        assert!(introspect_sqlite(&pool).await.unwrap().tables.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_and_partial_index() {
        let pool = create_test_pool().await;
        execute(&pool, "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT)").await;
        execute(
            &pool,
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, author_id INTEGER NOT NULL REFERENCES users ON DELETE CASCADE)",
        )
        .await;
        execute(
            &pool,
            "CREATE INDEX idx_posts_author ON posts (author_id) WHERE author_id > 0",
        )
        .await;

        let snapshot = introspect_sqlite(&pool).await.unwrap();
        let posts = snapshot.get_table("posts").unwrap();

        assert_eq!(posts.primary_key, vec!["id"]);
        assert!(!posts.get_column("id").unwrap().autoincrement);
        assert!(snapshot.tables["users"].columns[0].autoincrement);

        assert_eq!(posts.indexes.len(), 1);
        assert_eq!(posts.indexes[0].columns, vec!["author_id"]);
        assert_eq!(posts.indexes[0].condition.as_deref(), Some("author_id > 0"));

        let fk = &posts.foreign_keys[0];
        assert_eq!(fk.name, "posts_author_id_fkey");
        assert_eq!(fk.references_table, "users");
        assert_eq!(fk.references_columns, vec!["id"]);
        assert_eq!(fk.on_delete, ForeignKeyAction::Cascade);
        assert_eq!(fk.on_update, ForeignKeyAction::NoAction);
    }

    #[tokio::test]
    async fn test_composite_key_order() {
        let pool = create_test_pool().await;
        execute(
            &pool,
            "CREATE TABLE tags (name TEXT NOT NULL, post_id INTEGER NOT NULL, PRIMARY KEY (post_id, name))",
        )
        .await;

        let snapshot = introspect_sqlite(&pool).await.unwrap();
        assert_eq!(snapshot.tables["tags"].primary_key, vec!["post_id", "name"]);
    }
}
