//! Structural difference between two schema snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDefinition, ForeignKeyDefinition, IndexDefinition, TableDefinition};

/// Entities that are identified by name inside a table.
pub trait Named {
    /// The entity's name.
    fn name(&self) -> &str;
}

impl Named for ColumnDefinition {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for IndexDefinition {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for ForeignKeyDefinition {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A single entity-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change<T> {
    /// Present in the target only.
    Added(T),
    /// Present in the current schema only.
    Removed(T),
    /// Present in both with differing attributes.
    Changed {
        /// Current definition.
        before: T,
        /// Target definition.
        after: T,
    },
}

impl<T> Change<T> {
    /// Swaps the direction of the change.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Added(item) => Self::Removed(item),
            Self::Removed(item) => Self::Added(item),
            Self::Changed { before, after } => Self::Changed {
                before: after,
                after: before,
            },
        }
    }

    /// Returns true for `Removed`.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removed(_))
    }
}

impl<T: Named> Change<T> {
    /// Name of the entity this change concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Added(item) | Self::Removed(item) => item.name(),
            Self::Changed { after, .. } => after.name(),
        }
    }
}

/// Before/after primary key columns of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChange {
    /// Key columns in the current schema.
    pub before: Vec<String>,
    /// Key columns in the target schema.
    pub after: Vec<String>,
}

/// Differences inside a table present in both snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Table name.
    pub name: String,
    /// Column changes, ordered by column name.
    pub columns: Vec<Change<ColumnDefinition>>,
    /// Primary key change, if the key columns differ.
    pub primary_key: Option<KeyChange>,
    /// Index changes (added/removed by signature), ordered by name.
    pub indexes: Vec<Change<IndexDefinition>>,
    /// Foreign key changes (added/removed by signature), ordered by name.
    pub foreign_keys: Vec<Change<ForeignKeyDefinition>>,
}

impl TableDiff {
    /// Creates an empty table diff.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Returns true if nothing differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.primary_key.is_none()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
    }

    /// Swaps the direction of every change.
    #[must_use]
    pub fn inverse(self) -> Self {
        Self {
            name: self.name,
            columns: self.columns.into_iter().map(Change::inverse).collect(),
            primary_key: self.primary_key.map(|key| KeyChange {
                before: key.after,
                after: key.before,
            }),
            indexes: self.indexes.into_iter().map(Change::inverse).collect(),
            foreign_keys: self.foreign_keys.into_iter().map(Change::inverse).collect(),
        }
    }
}

/// Result of comparing a current snapshot against a target snapshot.
///
/// The three table maps are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Tables present in the target only.
    pub added: BTreeMap<String, TableDefinition>,
    /// Tables present in the current schema only.
    pub removed: BTreeMap<String, TableDefinition>,
    /// Tables present in both with differences.
    pub changed: BTreeMap<String, TableDiff>,
}

impl SchemaDiff {
    /// Creates an empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of table and entity level changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        let nested: usize = self
            .changed
            .values()
            .map(|t| {
                t.columns.len()
                    + t.indexes.len()
                    + t.foreign_keys.len()
                    + usize::from(t.primary_key.is_some())
            })
            .sum();
        self.added.len() + self.removed.len() + nested
    }

    /// Returns the diff that undoes this one: added and removed swap, and
    /// every changed entry's before/after swap.
    #[must_use]
    pub fn inverse(self) -> Self {
        Self {
            added: self.removed,
            removed: self.added,
            changed: self
                .changed
                .into_iter()
                .map(|(name, table)| (name, table.inverse()))
                .collect(),
        }
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.added.keys() {
            writeln!(f, "+ table {name}")?;
        }
        for name in self.removed.keys() {
            writeln!(f, "- table {name}")?;
        }
        for (name, table) in &self.changed {
            writeln!(f, "~ table {name}")?;
            for change in &table.columns {
                match change {
                    Change::Added(col) => writeln!(f, "    + {}: {}", col.name, col.sql_type)?,
                    Change::Removed(col) => writeln!(f, "    - {}", col.name)?,
                    Change::Changed { before, after } => {
                        writeln!(f, "    ~ {}: {} -> {}", after.name, before.sql_type, after.sql_type)?
                    }
                }
            }
            if let Some(key) = &table.primary_key {
                writeln!(
                    f,
                    "    ~ PRIMARY KEY ({}) -> ({})",
                    key.before.join(", "),
                    key.after.join(", ")
                )?;
            }
            for change in &table.indexes {
                let sign = if change.is_removal() { '-' } else { '+' };
                writeln!(f, "    {sign} index {}", change.name())?;
            }
            for change in &table.foreign_keys {
                let sign = if change.is_removal() { '-' } else { '+' };
                writeln!(f, "    {sign} foreign key {}", change.name())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    #[test]
    fn test_change_inverse() {
        let col = ColumnDefinition::new("email", SqlType::Text);
        assert_eq!(
            Change::Added(col.clone()).inverse(),
            Change::Removed(col.clone())
        );

        let wider = ColumnDefinition::new("email", SqlType::Varchar(255));
        let change = Change::Changed {
            before: col.clone(),
            after: wider.clone(),
        };
        assert_eq!(
            change.inverse(),
            Change::Changed {
                before: wider,
                after: col,
            }
        );
    }

    #[test]
    fn test_empty_diff() {
        let diff = SchemaDiff::new();
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
        assert_eq!(diff.to_string(), "");
    }

    #[test]
    fn test_inverse_swaps_tables() {
        let mut diff = SchemaDiff::new();
        diff.added
            .insert("posts".to_string(), TableDefinition::new("posts"));
        let inverse = diff.inverse();
        assert!(inverse.added.is_empty());
        assert!(inverse.removed.contains_key("posts"));
    }

    #[test]
    fn test_display_summary() {
        let mut table = TableDiff::new("users");
        table.columns.push(Change::Added(ColumnDefinition::new(
            "email",
            SqlType::Varchar(255),
        )));
        table
            .indexes
            .push(Change::Removed(IndexDefinition::new("idx_old", ["name"])));

        let mut diff = SchemaDiff::new();
        diff.removed
            .insert("legacy".to_string(), TableDefinition::new("legacy"));
        diff.changed.insert("users".to_string(), table);

        let text = diff.to_string();
        assert!(text.contains("- table legacy"));
        assert!(text.contains("~ table users"));
        assert!(text.contains("+ email: varchar(255)"));
        assert!(text.contains("- index idx_old"));
        assert_eq!(diff.change_count(), 3);
    }
}
