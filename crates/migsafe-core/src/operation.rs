//! Parsed DDL operations
//!
//! One `Operation` is produced per statement by the classifier and is never
//! mutated afterwards. Unrecognized or partially-formed statements become
//! `OperationKind::Other`, which no rule matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::diagnostic::LineRange;

/// Closed set of operation kinds the rule catalog understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DropTable,
    DropColumn,
    RenameTable,
    RenameColumn,
    AddColumn,
    CreateIndex,
    AddForeignKey,
    AlterColumnType,
    SetNotNull,
    /// Anything not listed above
    Other,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropTable => "drop_table",
            Self::DropColumn => "drop_column",
            Self::RenameTable => "rename_table",
            Self::RenameColumn => "rename_column",
            Self::AddColumn => "add_column",
            Self::CreateIndex => "create_index",
            Self::AddForeignKey => "add_foreign_key",
            Self::AlterColumnType => "alter_column_type",
            Self::SetNotNull => "set_not_null",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modifier recognized in a statement's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionFlag {
    /// `DEFAULT ...` present in an added column's definition
    HasDefault,

    /// `NOT NULL` present in an added column's definition
    NotNullPresent,

    /// `CREATE INDEX CONCURRENTLY`
    Concurrently,

    /// `... NOT VALID` on an added constraint
    NotValid,

    /// `CREATE UNIQUE INDEX`
    Unique,

    /// `IF EXISTS` / `IF NOT EXISTS`
    IfExists,
}

/// Set of option flags, ordered for stable serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionFlags(BTreeSet<OptionFlag>);

impl OptionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: OptionFlag) {
        self.0.insert(flag);
    }

    /// Insert `flag` when `present` holds
    pub fn set(&mut self, flag: OptionFlag, present: bool) {
        if present {
            self.0.insert(flag);
        }
    }

    pub fn contains(&self, flag: OptionFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OptionFlag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<OptionFlag> for OptionFlags {
    fn from_iter<I: IntoIterator<Item = OptionFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A classified statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What the statement does
    pub kind: OperationKind,

    /// Table the statement targets, as written (qualified names keep their schema)
    pub table: Option<String>,

    /// Column the statement targets, when it targets one
    pub column: Option<String>,

    /// New name for rename operations
    pub new_name: Option<String>,

    /// Recognized modifiers
    pub flags: OptionFlags,

    /// Zero-based index of the statement within its file
    pub statement_index: usize,

    /// Lines the statement spans
    pub lines: LineRange,

    /// Whitespace-collapsed statement text
    pub statement: String,
}

impl Operation {
    /// Create an operation with no target attributes
    pub fn new(kind: OperationKind, statement_index: usize, lines: LineRange, statement: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            column: None,
            new_name: None,
            flags: OptionFlags::new(),
            statement_index,
            lines,
            statement: statement.into(),
        }
    }

    /// Create an `Other` operation
    pub fn other(statement_index: usize, lines: LineRange, statement: impl Into<String>) -> Self {
        Self::new(OperationKind::Other, statement_index, lines, statement)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_new_name(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }

    pub fn with_flags(mut self, flags: OptionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn has(&self, flag: OptionFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_recognized(&self) -> bool {
        self.kind != OperationKind::Other
    }
}
