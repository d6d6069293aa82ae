//! Schema comparator.
//!
//! Compares a current and a target [`SchemaSnapshot`] and produces the
//! [`SchemaDiff`] between them. Both snapshots must be canonical; iteration
//! follows name order so identical inputs always yield identical diffs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::diff::{Change, KeyChange, Named, SchemaDiff, TableDiff};
use crate::schema::{ColumnDefinition, SchemaSnapshot, TableDefinition};

/// Compares two snapshots and returns the changes that turn `current` into
/// `target`.
#[must_use]
pub fn compare(current: &SchemaSnapshot, target: &SchemaSnapshot) -> SchemaDiff {
    debug_assert!(current.is_canonical(), "current snapshot is not canonical");
    debug_assert!(target.is_canonical(), "target snapshot is not canonical");

    let mut diff = SchemaDiff::new();

    for (name, table) in &current.tables {
        match target.tables.get(name) {
            None => {
                diff.removed.insert(name.clone(), table.clone());
            }
            Some(target_table) => {
                let table_diff = compare_table(table, target_table);
                if !table_diff.is_empty() {
                    diff.changed.insert(name.clone(), table_diff);
                }
            }
        }
    }

    for (name, table) in &target.tables {
        if !current.tables.contains_key(name) {
            diff.added.insert(name.clone(), table.clone());
        }
    }

    debug!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        changed = diff.changed.len(),
        "compared schemas"
    );
    diff
}

/// Compares a table present in both snapshots.
fn compare_table(current: &TableDefinition, target: &TableDefinition) -> TableDiff {
    let mut diff = TableDiff::new(&target.name);

    diff.columns = compare_columns(&current.columns, &target.columns);

    if current.primary_key != target.primary_key {
        diff.primary_key = Some(KeyChange {
            before: current.primary_key.clone(),
            after: target.primary_key.clone(),
        });
    }

    diff.indexes = compare_by_signature(&current.indexes, &target.indexes, |i| i.signature());
    diff.foreign_keys =
        compare_by_signature(&current.foreign_keys, &target.foreign_keys, |f| f.signature());

    diff
}

/// Compares columns by name.
fn compare_columns(
    current: &[ColumnDefinition],
    target: &[ColumnDefinition],
) -> Vec<Change<ColumnDefinition>> {
    let current_cols: BTreeMap<&str, &ColumnDefinition> =
        current.iter().map(|c| (c.name.as_str(), c)).collect();
    let target_cols: BTreeMap<&str, &ColumnDefinition> =
        target.iter().map(|c| (c.name.as_str(), c)).collect();

    let names: BTreeSet<&str> = current_cols
        .keys()
        .chain(target_cols.keys())
        .copied()
        .collect();

    let mut changes = Vec::new();
    for name in names {
        match (current_cols.get(name), target_cols.get(name)) {
            (Some(&before), None) => changes.push(Change::Removed(before.clone())),
            (None, Some(&after)) => changes.push(Change::Added(after.clone())),
            (Some(&before), Some(&after)) if column_differs(before, after) => {
                changes.push(Change::Changed {
                    before: before.clone(),
                    after: after.clone(),
                });
            }
            _ => {}
        }
    }
    changes
}

/// Returns true if any compared attribute differs.
fn column_differs(before: &ColumnDefinition, after: &ColumnDefinition) -> bool {
    before.sql_type != after.sql_type
        || before.nullable != after.nullable
        || before.default != after.default
        || before.autoincrement != after.autoincrement
}

/// Set difference by structural signature. Results are ordered by
/// (name, signature), which does not depend on the comparison direction.
///
/// A name held on both sides by definitions with different signatures is a
/// replacement: the old definition is removed and the new one added, even if
/// another entity under a different name still matches the old signature.
/// That entity is then compared on its own, so the name is free before the
/// new definition claims it.
fn compare_by_signature<T, K, F>(current: &[T], target: &[T], signature: F) -> Vec<Change<T>>
where
    T: Named + Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    let reused = |item: &T, other: &[T]| {
        other
            .iter()
            .any(|o| o.name() == item.name() && signature(o) != signature(item))
    };
    let (replaced_current, kept_current): (Vec<&T>, Vec<&T>) =
        current.iter().partition(|item| reused(*item, target));
    let (replaced_target, kept_target): (Vec<&T>, Vec<&T>) =
        target.iter().partition(|item| reused(*item, current));

    let current_sigs: BTreeSet<K> = kept_current.iter().copied().map(&signature).collect();
    let target_sigs: BTreeSet<K> = kept_target.iter().copied().map(&signature).collect();

    let removed = kept_current
        .iter()
        .copied()
        .filter(|item| !target_sigs.contains(&signature(*item)))
        .chain(replaced_current.iter().copied())
        .map(|item| Change::Removed(item.clone()));
    let added = kept_target
        .iter()
        .copied()
        .filter(|item| !current_sigs.contains(&signature(*item)))
        .chain(replaced_target.iter().copied())
        .map(|item| Change::Added(item.clone()));
    let mut changes: Vec<Change<T>> = removed.chain(added).collect();

    changes.sort_by(|a, b| {
        let (a_item, b_item) = (entity(a), entity(b));
        (a_item.name(), signature(a_item)).cmp(&(b_item.name(), signature(b_item)))
    });
    changes
}

fn entity<T>(change: &Change<T>) -> &T {
    match change {
        Change::Added(item) | Change::Removed(item) => item,
        Change::Changed { after, .. } => after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        DefaultValue, ForeignKeyAction, ForeignKeyDefinition, IndexDefinition, SqlType,
    };

    fn users() -> TableDefinition {
        TableDefinition::new("users")
            .column(ColumnDefinition::new("id", SqlType::BigInt).auto_increment())
            .column(ColumnDefinition::new("name", SqlType::Text))
            .primary_key(["id"])
    }

    fn posts() -> TableDefinition {
        TableDefinition::new("posts")
            .column(ColumnDefinition::new("id", SqlType::BigInt).auto_increment())
            .column(ColumnDefinition::new("author_id", SqlType::BigInt).not_null())
            .column(ColumnDefinition::new("title", SqlType::Varchar(200)).not_null())
            .primary_key(["id"])
            .index(IndexDefinition::new("idx_posts_title", ["title"]))
            .foreign_key(
                ForeignKeyDefinition::new("fk_posts_author", ["author_id"], "users", ["id"])
                    .on_delete(ForeignKeyAction::Cascade),
            )
    }

    #[test]
    fn test_detect_new_table() {
        let current = SchemaSnapshot::new();
        let target = SchemaSnapshot::new().table(users());

        let diff = compare(&current, &target);
        assert_eq!(diff.added.len(), 1);
        assert!(diff.added.contains_key("users"));
        assert!(diff.removed.is_empty());
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn test_detect_removed_table() {
        let current = SchemaSnapshot::new().table(users());
        let target = SchemaSnapshot::new();

        let diff = compare(&current, &target);
        assert!(diff.removed.contains_key("users"));
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_detect_column_changes() {
        let current = SchemaSnapshot::new().table(
            users().column(ColumnDefinition::new("old_field", SqlType::Text)),
        );
        let target = SchemaSnapshot::new().table(
            TableDefinition::new("users")
                .column(ColumnDefinition::new("id", SqlType::BigInt).auto_increment())
                .column(ColumnDefinition::new("name", SqlType::Varchar(255)).not_null())
                .column(ColumnDefinition::new("email", SqlType::Text))
                .primary_key(["id"]),
        );

        let diff = compare(&current, &target);
        let table = &diff.changed["users"];

        let names: Vec<&str> = table.columns.iter().map(Change::name).collect();
        assert_eq!(names, vec!["email", "name", "old_field"]);
        assert!(matches!(table.columns[0], Change::Added(_)));
        match &table.columns[1] {
            Change::Changed { before, after } => {
                assert_eq!(before.sql_type, SqlType::Text);
                assert_eq!(after.sql_type, SqlType::Varchar(255));
                assert!(!after.nullable);
            }
            other => panic!("Expected Changed, got {other:?}"),
        }
        assert!(matches!(table.columns[2], Change::Removed(_)));
    }

    #[test]
    fn test_detect_default_change() {
        let current = SchemaSnapshot::new().table(users());
        let target = SchemaSnapshot::new().table(
            TableDefinition::new("users")
                .column(ColumnDefinition::new("id", SqlType::BigInt).auto_increment())
                .column(
                    ColumnDefinition::new("name", SqlType::Text)
                        .default(DefaultValue::String("anonymous".into())),
                )
                .primary_key(["id"]),
        );

        let diff = compare(&current, &target);
        assert_eq!(diff.changed["users"].columns.len(), 1);
    }

    #[test]
    fn test_index_compared_by_signature() {
        // Same columns and kind under a different name is not a change.
        let renamed = TableDefinition::new("posts")
            .column(ColumnDefinition::new("id", SqlType::BigInt).auto_increment())
            .column(ColumnDefinition::new("author_id", SqlType::BigInt).not_null())
            .column(ColumnDefinition::new("title", SqlType::Varchar(200)).not_null())
            .primary_key(["id"])
            .index(IndexDefinition::new("posts_title_idx", ["title"]))
            .foreign_key(
                ForeignKeyDefinition::new("posts_author_fkey", ["author_id"], "users", ["id"])
                    .on_delete(ForeignKeyAction::Cascade),
            );

        let current = SchemaSnapshot::new().table(users()).table(posts());
        let target = SchemaSnapshot::new().table(users()).table(renamed);
        assert!(compare(&current, &target).is_empty());
    }

    #[test]
    fn test_index_kind_change_is_remove_and_add() {
        let current = SchemaSnapshot::new().table(users()).table(posts());
        let mut unique_posts = posts();
        unique_posts.indexes[0] = IndexDefinition::new("idx_posts_title", ["title"]).unique();
        let target = SchemaSnapshot::new().table(users()).table(unique_posts);

        let diff = compare(&current, &target);
        let indexes = &diff.changed["posts"].indexes;
        assert_eq!(indexes.len(), 2);
        // Same name: ordered by signature, non-unique first.
        assert!(matches!(&indexes[0], Change::Removed(i) if !i.unique));
        assert!(matches!(&indexes[1], Change::Added(i) if i.unique));
    }

    #[test]
    fn test_reused_index_name_is_replaced() {
        // `a` moves to another column while `c` takes over its old definition.
        let current = SchemaSnapshot::new()
            .table(users().index(IndexDefinition::new("a", ["name"])));
        let target = SchemaSnapshot::new().table(
            users()
                .index(IndexDefinition::new("a", ["id"]))
                .index(IndexDefinition::new("c", ["name"])),
        );

        let diff = compare(&current, &target);
        let indexes = &diff.changed["users"].indexes;
        assert_eq!(indexes.len(), 3);
        assert!(matches!(&indexes[0], Change::Added(i) if i.name == "a" && i.columns == ["id"]));
        assert!(matches!(&indexes[1], Change::Removed(i) if i.name == "a" && i.columns == ["name"]));
        assert!(matches!(&indexes[2], Change::Added(i) if i.name == "c"));

        assert_eq!(compare(&target, &current), diff.inverse());
    }

    #[test]
    fn test_reused_foreign_key_name_is_replaced() {
        let fk = |name: &str, table: &str| {
            ForeignKeyDefinition::new(name, ["author_id"], table, ["id"])
        };
        let current = SchemaSnapshot::new().table(posts().foreign_key(fk("fk_a", "users")));
        let target = SchemaSnapshot::new().table(
            posts()
                .foreign_key(fk("fk_a", "accounts"))
                .foreign_key(fk("fk_c", "users")),
        );

        let diff = compare(&current, &target);
        let names: Vec<(&str, bool)> = diff.changed["posts"]
            .foreign_keys
            .iter()
            .map(|c| (c.name(), c.is_removal()))
            .collect();
        assert_eq!(names, vec![("fk_a", false), ("fk_a", true), ("fk_c", false)]);
        assert_eq!(compare(&target, &current), diff.inverse());
    }

    #[test]
    fn test_foreign_key_action_change() {
        let current = SchemaSnapshot::new().table(users()).table(posts());
        let mut restricted = posts();
        restricted.foreign_keys[0].on_delete = ForeignKeyAction::Restrict;
        let target = SchemaSnapshot::new().table(users()).table(restricted);

        let diff = compare(&current, &target);
        assert_eq!(diff.changed["posts"].foreign_keys.len(), 2);
    }

    #[test]
    fn test_primary_key_change() {
        let current = SchemaSnapshot::new().table(users());
        let target = SchemaSnapshot::new().table(users().primary_key(["id", "name"]));

        let diff = compare(&current, &target);
        let key = diff.changed["users"].primary_key.as_ref().unwrap();
        assert_eq!(key.before, vec!["id"]);
        assert_eq!(key.after, vec!["id", "name"]);
    }

    #[test]
    fn test_no_changes() {
        let schema = SchemaSnapshot::new().table(users()).table(posts());
        assert!(compare(&schema, &schema).is_empty());
    }

    #[test]
    fn test_compare_is_deterministic() {
        let current = SchemaSnapshot::new().table(users());
        let target = SchemaSnapshot::new().table(posts());
        assert_eq!(compare(&current, &target), compare(&current, &target));
    }

    #[test]
    fn test_reverse_comparison_is_inverse() {
        let current = SchemaSnapshot::new()
            .table(users().column(ColumnDefinition::new("bio", SqlType::Text)))
            .table(TableDefinition::new("legacy").column(ColumnDefinition::new("id", SqlType::Integer)));
        let mut evolved = posts();
        evolved.indexes[0].unique = true;
        let target = SchemaSnapshot::new()
            .table(users().primary_key(["id", "name"]))
            .table(evolved);

        let forward = compare(&current, &target);
        let backward = compare(&target, &current);
        assert_eq!(backward, forward.clone().inverse());
        assert_eq!(forward, backward.inverse());
    }
}
