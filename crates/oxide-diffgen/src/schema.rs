//! Schema snapshot types.
//!
//! These types describe the structure of a database at a point in time. Both
//! sides of a comparison (the live database and the declared target) are
//! expressed as a [`SchemaSnapshot`], and the comparator assumes both are in
//! canonical form: tables, columns, indexes and foreign keys sorted by name.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// SQL data types understood by the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(usize),
    /// Fixed-length character string.
    Char(usize),
    /// Boolean.
    Boolean,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Timestamp.
    Timestamp,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Numeric with precision and scale.
    Numeric(u8, u8),
    /// Binary large object.
    Blob,
    /// JSON data.
    Json,
    /// UUID.
    Uuid,
    /// Any type the engine has no dedicated variant for, kept verbatim.
    Custom(String),
}

impl SqlType {
    /// Parses a type name as reported by a database catalog.
    ///
    /// Unknown names are preserved as [`SqlType::Custom`] so that they still
    /// compare and render faithfully.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase();
        let (base, args) = match normalized.split_once('(') {
            Some((base, rest)) => (
                base.trim().to_string(),
                rest.trim_end_matches(')')
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .collect::<Vec<_>>(),
            ),
            None => (normalized.clone(), Vec::new()),
        };
        let arg = |i: usize| args.get(i).and_then(|a| a.parse::<usize>().ok());

        match base.as_str() {
            "INT" | "INTEGER" | "INT4" => Self::Integer,
            "BIGINT" | "INT8" => Self::BigInt,
            "SMALLINT" | "INT2" => Self::SmallInt,
            "TEXT" | "CLOB" => Self::Text,
            "VARCHAR" | "CHARACTER VARYING" => match arg(0) {
                Some(len) => Self::Varchar(len),
                None => Self::Text,
            },
            "CHAR" | "CHARACTER" => Self::Char(arg(0).unwrap_or(1)),
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "DATETIME" => Self::DateTime,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" => Self::Timestamp,
            "REAL" | "FLOAT" | "FLOAT4" => Self::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => Self::Double,
            "DECIMAL" | "NUMERIC" => {
                let precision = u8::try_from(arg(0).unwrap_or(10));
                let scale = u8::try_from(arg(1).unwrap_or(0));
                match (precision, scale) {
                    (Ok(p), Ok(s)) if base == "DECIMAL" => Self::Decimal(p, s),
                    (Ok(p), Ok(s)) => Self::Numeric(p, s),
                    _ => Self::Custom(raw.trim().to_string()),
                }
            }
            "BLOB" | "BYTEA" => Self::Blob,
            "JSON" | "JSONB" => Self::Json,
            "UUID" => Self::Uuid,
            _ => Self::Custom(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::BigInt => write!(f, "bigint"),
            Self::SmallInt => write!(f, "smallint"),
            Self::Text => write!(f, "text"),
            Self::Varchar(len) => write!(f, "varchar({len})"),
            Self::Char(len) => write!(f, "char({len})"),
            Self::Boolean => write!(f, "boolean"),
            Self::DateTime => write!(f, "datetime"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Real => write!(f, "real"),
            Self::Double => write!(f, "double"),
            Self::Decimal(p, s) => write!(f, "decimal({p}, {s})"),
            Self::Numeric(p, s) => write!(f, "numeric({p}, {s})"),
            Self::Blob => write!(f, "blob"),
            Self::Json => write!(f, "json"),
            Self::Uuid => write!(f, "uuid"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Interprets a default clause as reported by a database catalog.
    #[must_use]
    pub fn from_sql(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::None;
        };
        // SQLite reports parenthesized expressions verbatim.
        let unwrapped = raw
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(raw);

        if unwrapped.eq_ignore_ascii_case("NULL") {
            Self::Null
        } else if unwrapped.eq_ignore_ascii_case("TRUE") {
            Self::Bool(true)
        } else if unwrapped.eq_ignore_ascii_case("FALSE") {
            Self::Bool(false)
        } else if let Ok(i) = unwrapped.parse::<i64>() {
            Self::Integer(i)
        } else if let Ok(f) = unwrapped.parse::<f64>() {
            Self::Float(f)
        } else if let Some(inner) = unwrapped
            .strip_prefix('\'')
            .and_then(|r| r.strip_suffix('\''))
        {
            Self::String(inner.replace("''", "'"))
        } else {
            Self::Expression(unwrapped.to_string())
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an action name; unknown names map to `NoAction`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// Definition of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
    /// Whether this column auto-increments.
    #[serde(default)]
    pub autoincrement: bool,
}

impl ColumnDefinition {
    /// Creates a nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: DefaultValue::None,
            autoincrement: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets the column to auto-increment. Auto-increment columns are NOT NULL.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.autoincrement = true;
        self.nullable = false;
        self
    }
}

/// Structural identity of an index; the index name is not part of it.
pub type IndexSignature = (Vec<String>, bool, Option<String>);

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Columns included in the index.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
    /// Partial index condition (WHERE clause).
    #[serde(default)]
    pub condition: Option<String>,
}

impl IndexDefinition {
    /// Creates a non-unique index over the given columns.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            condition: None,
        }
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a partial index condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Structural identity of the index: participating columns and kind.
    #[must_use]
    pub fn signature(&self) -> IndexSignature {
        (self.columns.clone(), self.unique, self.condition.clone())
    }
}

/// Definition of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

/// Structural identity of a foreign key; the constraint name is not part of it.
pub type ForeignKeySignature = (
    Vec<String>,
    String,
    Vec<String>,
    ForeignKeyAction,
    ForeignKeyAction,
);

impl ForeignKeyDefinition {
    /// Creates a foreign key with `NO ACTION` on delete and update.
    #[must_use]
    pub fn new<I, J, S, T>(
        name: impl Into<String>,
        columns: I,
        references_table: impl Into<String>,
        references_columns: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.into_iter().map(Into::into).collect(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    /// Structural identity of the constraint.
    #[must_use]
    pub fn signature(&self) -> ForeignKeySignature {
        (
            self.columns.clone(),
            self.references_table.clone(),
            self.references_columns.clone(),
            self.on_delete,
            self.on_update,
        )
    }
}

/// Definition of a table.
///
/// The builder methods keep columns, indexes and foreign keys sorted by name,
/// so a table assembled through them is already canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Column definitions.
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    /// Primary key column(s), in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Index definitions.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    /// Foreign key definitions.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDefinition>,
}

impl TableDefinition {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        let pos = self.columns.partition_point(|c| c.name < column.name);
        self.columns.insert(pos, column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDefinition) -> Self {
        let pos = self.indexes.partition_point(|i| i.name < index.name);
        self.indexes.insert(pos, index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeyDefinition) -> Self {
        let pos = self.foreign_keys.partition_point(|f| f.name < fk.name);
        self.foreign_keys.insert(pos, fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Sorts members by name.
    pub fn canonicalize(&mut self) {
        self.columns.sort_by(|a, b| a.name.cmp(&b.name));
        self.indexes.sort_by(|a, b| a.name.cmp(&b.name));
        self.foreign_keys.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Returns true if members are sorted by name.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.columns.windows(2).all(|w| w[0].name <= w[1].name)
            && self.indexes.windows(2).all(|w| w[0].name <= w[1].name)
            && self.foreign_keys.windows(2).all(|w| w[0].name <= w[1].name)
    }
}

/// A name-ordered snapshot of a database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Tables keyed by name, sorted for deterministic iteration.
    pub tables: BTreeMap<String, TableDefinition>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the snapshot.
    #[must_use]
    pub fn table(mut self, table: TableDefinition) -> Self {
        self.add_table(table);
        self
    }

    /// Adds a table in place, replacing any table of the same name.
    pub fn add_table(&mut self, table: TableDefinition) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    /// Gets a mutable table by name.
    #[must_use]
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDefinition> {
        self.tables.get_mut(name)
    }

    /// Returns table names in order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Brings every table into canonical form.
    pub fn canonicalize(&mut self) {
        for table in self.tables.values_mut() {
            table.canonicalize();
        }
    }

    /// Returns true if every table is canonical.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.tables.values().all(TableDefinition::is_canonical)
    }
}
