//! Statement generation.
//!
//! Turns a [`SchemaDiff`] into ordered apply and revert operation lists,
//! then into SQL through a [`MigrationDialect`].
//!
//! Operations are emitted in three phases:
//!
//! 1. creations: tables, then columns, then indexes, then foreign keys
//! 2. alterations: columns, primary keys, then same-named index and foreign
//!    key replacements (drop immediately followed by create)
//! 3. drops: foreign keys, then indexes, then columns, then tables
//!
//! Each step within a phase is sorted by (table, entity name). The revert
//! list is the plan of the inverted diff, so it follows the same rules.
//!
//! When the dialect declares foreign keys inline, a new table carries its
//! foreign keys in `CreateTable` and a dropped table takes them with it.

use std::collections::BTreeSet;

use tracing::debug;

use crate::dialect::MigrationDialect;
use crate::diff::{Change, Named, SchemaDiff, TableDiff};
use crate::operations::MigrationOperation;

/// Policy knobs for statement generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Leave out every removal (tables, columns, indexes, foreign keys) in
    /// both directions.
    pub suppress_destructive: bool,
}

/// Planned operations for both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    /// Operations transforming current into target.
    pub apply: Vec<MigrationOperation>,
    /// Operations transforming target back into current.
    pub revert: Vec<MigrationOperation>,
}

impl MigrationPlan {
    /// Returns true if neither direction has operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.revert.is_empty()
    }
}

/// Apply and revert SQL statement sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedStatements {
    /// Statements transforming current into target.
    pub apply: Vec<String>,
    /// Statements transforming target back into current.
    pub revert: Vec<String>,
}

impl GeneratedStatements {
    /// Returns true if neither sequence has statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.revert.is_empty()
    }
}

/// Plans diffs and renders them to SQL for one dialect.
pub struct StatementGenerator {
    dialect: Box<dyn MigrationDialect>,
    options: GeneratorOptions,
}

impl StatementGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(dialect: Box<dyn MigrationDialect>, options: GeneratorOptions) -> Self {
        Self { dialect, options }
    }

    /// Returns the dialect in use.
    #[must_use]
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> GeneratorOptions {
        self.options
    }

    /// Returns the part of a diff the options allow to be planned.
    #[must_use]
    pub fn apply_policy(&self, diff: SchemaDiff) -> SchemaDiff {
        if self.options.suppress_destructive {
            without_removals(diff)
        } else {
            diff
        }
    }

    /// Plans apply and revert operations for a diff.
    #[must_use]
    pub fn plan(&self, diff: SchemaDiff) -> MigrationPlan {
        let diff = self.apply_policy(diff);

        let inline = self.dialect.inline_foreign_keys();
        let apply = order_operations(&diff, inline);
        let revert = order_operations(&diff.inverse(), inline);

        debug!(
            apply = apply.len(),
            revert = revert.len(),
            suppress_destructive = self.options.suppress_destructive,
            "planned migration"
        );
        MigrationPlan { apply, revert }
    }

    /// Plans a diff and renders both directions to SQL.
    #[must_use]
    pub fn generate(&self, diff: SchemaDiff) -> GeneratedStatements {
        let plan = self.plan(diff);
        GeneratedStatements {
            apply: self.to_sql(&plan.apply),
            revert: self.to_sql(&plan.revert),
        }
    }

    /// Renders operations to SQL in order.
    #[must_use]
    pub fn to_sql(&self, operations: &[MigrationOperation]) -> Vec<String> {
        operations
            .iter()
            .flat_map(|op| self.dialect.generate_sql(op))
            .collect()
    }
}

/// One kind of operation within a phase.
#[derive(Default)]
struct Step {
    entries: Vec<(String, String, MigrationOperation)>,
}

impl Step {
    fn push(&mut self, table: &str, entity: &str, operation: MigrationOperation) {
        self.entries
            .push((table.to_string(), entity.to_string(), operation));
    }

    /// Stable sort: entries sharing a key keep their push order.
    fn drain_into(mut self, out: &mut Vec<MigrationOperation>) {
        self.entries
            .sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        out.extend(self.entries.into_iter().map(|(_, _, op)| op));
    }
}

fn order_operations(diff: &SchemaDiff, inline_foreign_keys: bool) -> Vec<MigrationOperation> {
    let mut create_tables = Step::default();
    let mut add_columns = Step::default();
    let mut create_indexes = Step::default();
    let mut add_foreign_keys = Step::default();

    let mut alter_columns = Step::default();
    let mut alter_keys = Step::default();
    let mut replace_indexes = Step::default();
    let mut replace_foreign_keys = Step::default();

    let mut drop_foreign_keys = Step::default();
    let mut drop_indexes = Step::default();
    let mut drop_columns = Step::default();
    let mut drop_tables = Step::default();

    for (name, table) in &diff.added {
        let create = MigrationOperation::create_table(
            name.as_str(),
            table.columns.clone(),
            table.primary_key.clone(),
        );
        if inline_foreign_keys {
            create_tables.push(name, "", create.with_foreign_keys(table.foreign_keys.clone()));
        } else {
            create_tables.push(name, "", create);
            for fk in &table.foreign_keys {
                add_foreign_keys.push(
                    name,
                    &fk.name,
                    MigrationOperation::add_foreign_key(name.as_str(), fk.clone()),
                );
            }
        }
        for index in &table.indexes {
            create_indexes.push(
                name,
                &index.name,
                MigrationOperation::create_index(name.as_str(), index.clone()),
            );
        }
    }

    for (name, table) in &diff.removed {
        if !inline_foreign_keys {
            for fk in &table.foreign_keys {
                drop_foreign_keys.push(
                    name,
                    &fk.name,
                    MigrationOperation::drop_foreign_key(name.as_str(), fk.name.as_str()),
                );
            }
        }
        drop_tables.push(name, "", MigrationOperation::drop_table(name.as_str()));
    }

    for (name, table) in &diff.changed {
        for change in &table.columns {
            match change {
                Change::Added(column) => add_columns.push(
                    name,
                    &column.name,
                    MigrationOperation::add_column(name.as_str(), column.clone()),
                ),
                Change::Removed(column) => drop_columns.push(
                    name,
                    &column.name,
                    MigrationOperation::drop_column(name.as_str(), column.name.as_str()),
                ),
                Change::Changed { before, after } => alter_columns.push(
                    name,
                    &after.name,
                    MigrationOperation::AlterColumn {
                        table: name.clone(),
                        before: before.clone(),
                        after: after.clone(),
                    },
                ),
            }
        }

        if let Some(key) = &table.primary_key {
            alter_keys.push(
                name,
                "",
                MigrationOperation::AlterPrimaryKey {
                    table: name.clone(),
                    before: key.before.clone(),
                    after: key.after.clone(),
                },
            );
        }

        let replaced = replaced_names(&table.indexes);
        for change in removals_first(&table.indexes) {
            let step = if replaced.contains(change.name()) {
                &mut replace_indexes
            } else if change.is_removal() {
                &mut drop_indexes
            } else {
                &mut create_indexes
            };
            match change {
                Change::Added(index) => step.push(
                    name,
                    &index.name,
                    MigrationOperation::create_index(name.as_str(), index.clone()),
                ),
                Change::Removed(index) => step.push(
                    name,
                    &index.name,
                    MigrationOperation::drop_index(name.as_str(), index.name.as_str()),
                ),
                Change::Changed { before, after } => {
                    step.push(
                        name,
                        &after.name,
                        MigrationOperation::drop_index(name.as_str(), before.name.as_str()),
                    );
                    step.push(
                        name,
                        &after.name,
                        MigrationOperation::create_index(name.as_str(), after.clone()),
                    );
                }
            }
        }

        let replaced = replaced_names(&table.foreign_keys);
        for change in removals_first(&table.foreign_keys) {
            let step = if replaced.contains(change.name()) {
                &mut replace_foreign_keys
            } else if change.is_removal() {
                &mut drop_foreign_keys
            } else {
                &mut add_foreign_keys
            };
            match change {
                Change::Added(fk) => step.push(
                    name,
                    &fk.name,
                    MigrationOperation::add_foreign_key(name.as_str(), fk.clone()),
                ),
                Change::Removed(fk) => step.push(
                    name,
                    &fk.name,
                    MigrationOperation::drop_foreign_key(name.as_str(), fk.name.as_str()),
                ),
                Change::Changed { before, after } => {
                    step.push(
                        name,
                        &after.name,
                        MigrationOperation::drop_foreign_key(name.as_str(), before.name.as_str()),
                    );
                    step.push(
                        name,
                        &after.name,
                        MigrationOperation::add_foreign_key(name.as_str(), after.clone()),
                    );
                }
            }
        }
    }

    let mut operations = Vec::new();
    for step in [
        create_tables,
        add_columns,
        create_indexes,
        add_foreign_keys,
        alter_columns,
        alter_keys,
        replace_indexes,
        replace_foreign_keys,
        drop_foreign_keys,
        drop_indexes,
        drop_columns,
        drop_tables,
    ] {
        step.drain_into(&mut operations);
    }
    operations
}

/// Removals ahead of additions, so a replacement drops before it creates.
fn removals_first<T>(changes: &[Change<T>]) -> impl Iterator<Item = &Change<T>> {
    changes
        .iter()
        .filter(|c| c.is_removal())
        .chain(changes.iter().filter(|c| !c.is_removal()))
}

/// Names that are both removed and added within one table.
fn replaced_names<T: Named>(changes: &[Change<T>]) -> BTreeSet<String> {
    let removed: BTreeSet<&str> = changes
        .iter()
        .filter(|c| c.is_removal())
        .map(Change::name)
        .collect();
    changes
        .iter()
        .filter(|c| matches!(c, Change::Added(_)))
        .map(Change::name)
        .filter(|name| removed.contains(name))
        .map(str::to_string)
        .collect()
}

/// Drops removal entries from a diff, keeping same-named replacements.
fn without_removals(mut diff: SchemaDiff) -> SchemaDiff {
    for name in diff.removed.keys() {
        debug!(table = %name, "suppressing table drop");
    }
    diff.removed.clear();

    diff.changed = diff
        .changed
        .into_iter()
        .map(|(name, table)| (name, table_without_removals(table)))
        .filter(|(_, table)| !table.is_empty())
        .collect();
    diff
}

fn table_without_removals(mut table: TableDiff) -> TableDiff {
    table.columns.retain(|c| !c.is_removal());

    let replaced = replaced_names(&table.indexes);
    table
        .indexes
        .retain(|c| !c.is_removal() || replaced.contains(c.name()));

    let replaced = replaced_names(&table.foreign_keys);
    table
        .foreign_keys
        .retain(|c| !c.is_removal() || replaced.contains(c.name()));

    table
}
