//! Rule catalog and rule engine
//!
//! The catalog is a static table. Adding a rule means adding a `RuleCode`
//! variant and a row here; the engine itself has no per-rule branches.

use migsafe_core::{Diagnostic, Location, Operation, OperationKind, OptionFlag, RuleCode, Severity};

/// One row of the rule catalog
pub struct Rule {
    /// Stable rule code
    pub code: RuleCode,

    /// Severity before impact refinement
    pub severity: Severity,

    /// PostgreSQL lock mode the operation takes
    pub lock_type: &'static str,

    /// Short description for listings
    pub summary: &'static str,

    /// Message template; supports `{table}`, `{column}`, `{target}` and `{new_name}`
    pub message: &'static str,

    predicate: fn(&Operation) -> bool,
}

/// The catalog, in precedence order
pub static CATALOG: [Rule; 8] = [
    Rule {
        code: RuleCode::Ban001,
        severity: Severity::Critical,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "DROP TABLE permanently deletes data and all indexes",
        message: "DROP TABLE {table} permanently deletes data and all indexes",
        predicate: drops_table,
    },
    Rule {
        code: RuleCode::Ban002,
        severity: Severity::High,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "DROP COLUMN is irreversible and may break running queries",
        message: "DROP COLUMN {target} is irreversible and may break running queries",
        predicate: drops_column,
    },
    Rule {
        code: RuleCode::Ban003,
        severity: Severity::Medium,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "Renaming a table or column will break application queries",
        message: "Renaming {target} to {new_name} will break application queries",
        predicate: renames,
    },
    Rule {
        code: RuleCode::Lck001,
        severity: Severity::Critical,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "Adding a NOT NULL column without DEFAULT rewrites the entire table under lock",
        message: "Adding NOT NULL column {target} without DEFAULT rewrites the entire table under lock",
        predicate: adds_required_column_without_default,
    },
    Rule {
        code: RuleCode::Lck002,
        severity: Severity::High,
        lock_type: "SHARE",
        summary: "CREATE INDEX without CONCURRENTLY blocks all writes",
        message: "CREATE INDEX on {table} without CONCURRENTLY blocks all writes",
        predicate: creates_index_blocking,
    },
    Rule {
        code: RuleCode::Lck003,
        severity: Severity::High,
        lock_type: "SHARE ROW EXCLUSIVE",
        summary: "Adding a foreign key without NOT VALID scans the entire table under lock",
        message: "Adding a foreign key on {table} without NOT VALID scans the entire table under lock",
        predicate: adds_validated_foreign_key,
    },
    Rule {
        code: RuleCode::Lck004,
        severity: Severity::Critical,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "Changing a column type rewrites the entire table under ACCESS EXCLUSIVE lock",
        message: "Changing the type of {target} rewrites the entire table under ACCESS EXCLUSIVE lock",
        predicate: changes_column_type,
    },
    Rule {
        code: RuleCode::Lck005,
        severity: Severity::High,
        lock_type: "ACCESS EXCLUSIVE",
        summary: "SET NOT NULL scans the full table; use a CHECK constraint with NOT VALID instead",
        message: "SET NOT NULL on {target} scans the full table; use a CHECK constraint with NOT VALID instead",
        predicate: sets_not_null,
    },
];

fn drops_table(op: &Operation) -> bool {
    op.kind == OperationKind::DropTable
}

fn drops_column(op: &Operation) -> bool {
    op.kind == OperationKind::DropColumn
}

fn renames(op: &Operation) -> bool {
    matches!(op.kind, OperationKind::RenameTable | OperationKind::RenameColumn)
}

fn adds_required_column_without_default(op: &Operation) -> bool {
    op.kind == OperationKind::AddColumn
        && op.has(OptionFlag::NotNullPresent)
        && !op.has(OptionFlag::HasDefault)
}

fn creates_index_blocking(op: &Operation) -> bool {
    op.kind == OperationKind::CreateIndex && !op.has(OptionFlag::Concurrently)
}

fn adds_validated_foreign_key(op: &Operation) -> bool {
    op.kind == OperationKind::AddForeignKey && !op.has(OptionFlag::NotValid)
}

fn changes_column_type(op: &Operation) -> bool {
    op.kind == OperationKind::AlterColumnType
}

fn sets_not_null(op: &Operation) -> bool {
    op.kind == OperationKind::SetNotNull
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .field("lock_type", &self.lock_type)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Check if the rule matches an operation
    pub fn applies_to(&self, op: &Operation) -> bool {
        (self.predicate)(op)
    }

    /// Fill in the message template
    pub fn render_message(&self, op: &Operation) -> String {
        const UNKNOWN: &str = "<unknown>";

        let table = op.table.as_deref().unwrap_or(UNKNOWN);
        let target = match (&op.table, &op.column) {
            (Some(table), Some(column)) => format!("{}.{}", table, column),
            (Some(table), None) => table.clone(),
            (None, Some(column)) => column.clone(),
            (None, None) => UNKNOWN.to_string(),
        };

        self.message
            .replace("{table}", table)
            .replace("{column}", op.column.as_deref().unwrap_or(UNKNOWN))
            .replace("{target}", &target)
            .replace("{new_name}", op.new_name.as_deref().unwrap_or(UNKNOWN))
    }

    /// Build the unrefined diagnostic for a matching operation
    pub fn diagnostic(&self, file: &str, op: &Operation) -> Diagnostic {
        Diagnostic::new(
            self.code,
            self.severity,
            self.render_message(op),
            Location::new(file, op.lines),
        )
        .with_statement(op.statement_index, op.statement.clone())
        .with_table(op.table.clone())
        .with_lock_type(self.lock_type)
    }
}

/// Look up a catalog entry
pub fn lookup(code: RuleCode) -> Option<&'static Rule> {
    CATALOG.iter().find(|rule| rule.code == code)
}

/// Evaluates the catalog against operations
///
/// Holds no state besides the set of disabled rules, so one engine can be
/// shared by any number of concurrent analyses.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    disabled: Vec<RuleCode>,
}

impl RuleEngine {
    /// Engine over the full catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that never evaluates `disabled`
    pub fn with_disabled(disabled: impl IntoIterator<Item = RuleCode>) -> Self {
        Self {
            disabled: disabled.into_iter().collect(),
        }
    }

    /// Enabled rules in catalog order
    pub fn rules(&self) -> impl Iterator<Item = &'static Rule> + '_ {
        CATALOG.iter().filter(move |rule| !self.disabled.contains(&rule.code))
    }

    /// Every enabled rule whose predicate holds, in catalog order
    ///
    /// Each rule is evaluated once, so a rule fires at most once per operation.
    pub fn evaluate(&self, op: &Operation) -> Vec<&'static Rule> {
        if !op.is_recognized() {
            return Vec::new();
        }

        self.rules().filter(|rule| rule.applies_to(op)).collect()
    }

    /// Unrefined diagnostics for one operation
    pub fn diagnose(&self, file: &str, op: &Operation) -> Vec<Diagnostic> {
        self.evaluate(op)
            .into_iter()
            .map(|rule| {
                tracing::debug!(
                    rule = %rule.code,
                    statement = op.statement_index,
                    line = op.lines.start,
                    "rule matched"
                );
                rule.diagnostic(file, op)
            })
            .collect()
    }
}
