//! Rule codes, severities and diagnostics
//!
//! IMPORTANT: Rule codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Rule code registry (v1)
///
/// Variants are declared in catalog order. The derived `Ord` is used as the
/// final tie-break when sorting diagnostics, so new codes go at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleCode {
    // Banned operations (BANxxx)
    /// DROP TABLE
    #[serde(rename = "BAN001")]
    Ban001,

    /// ALTER TABLE ... DROP COLUMN
    #[serde(rename = "BAN002")]
    Ban002,

    /// ALTER TABLE ... RENAME (table or column)
    #[serde(rename = "BAN003")]
    Ban003,

    // Heavy locks (LCKxxx)
    /// ADD COLUMN ... NOT NULL without DEFAULT
    #[serde(rename = "LCK001")]
    Lck001,

    /// CREATE INDEX without CONCURRENTLY
    #[serde(rename = "LCK002")]
    Lck002,

    /// ADD FOREIGN KEY without NOT VALID
    #[serde(rename = "LCK003")]
    Lck003,

    /// ALTER COLUMN ... TYPE
    #[serde(rename = "LCK004")]
    Lck004,

    /// ALTER COLUMN ... SET NOT NULL
    #[serde(rename = "LCK005")]
    Lck005,
}

impl RuleCode {
    /// Every code, in catalog order
    pub const ALL: [RuleCode; 8] = [
        Self::Ban001,
        Self::Ban002,
        Self::Ban003,
        Self::Lck001,
        Self::Lck002,
        Self::Lck003,
        Self::Lck004,
        Self::Lck005,
    ];

    /// Get the rule code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ban001 => "BAN001",
            Self::Ban002 => "BAN002",
            Self::Ban003 => "BAN003",
            Self::Lck001 => "LCK001",
            Self::Lck002 => "LCK002",
            Self::Lck003 => "LCK003",
            Self::Lck004 => "LCK004",
            Self::Lck005 => "LCK005",
        }
    }
}

impl std::fmt::Display for RuleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RuleCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown rule code '{}'", wanted))
    }
}

/// Diagnostic severity level
///
/// Total order: `critical > high > medium > low`. Sorting and every
/// fail-on threshold decision rely on the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth knowing about, rarely blocking
    Low,

    /// Should be reviewed before merging
    Medium,

    /// Likely to block traffic on a busy table
    High,

    /// Destroys data or rewrites the table under an exclusive lock
    Critical,
}

impl Severity {
    /// All severities from most to least severe
    pub const DESCENDING: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// One level up, saturating at `Critical`
    pub fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    /// Weight used by the risk score
    pub fn weight(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!(
                "unknown severity '{}' (expected critical, high, medium or low)",
                other
            )),
        }
    }
}

/// Inclusive, 1-indexed line range in a migration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end: end.max(start) }
    }

    /// A range covering a single line
    pub fn single(line: usize) -> Self {
        Self { start: line, end: line }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Source location in a migration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path or name as supplied by the caller
    pub file: String,

    /// First line of the statement (1-indexed)
    pub line: usize,

    /// Last line of the statement (1-indexed, inclusive)
    pub end_line: usize,
}

impl Location {
    /// Create a location covering a line range
    pub fn new(file: impl Into<String>, lines: LineRange) -> Self {
        Self {
            file: file.into(),
            line: lines.start,
            end_line: lines.end,
        }
    }

    pub fn lines(&self) -> LineRange {
        LineRange::new(self.line, self.end_line)
    }
}

/// A single rule match against one statement
///
/// Diagnostics are values: refinement builds a new one instead of editing
/// an existing diagnostic in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable rule code
    pub code: RuleCode,

    /// Reported severity (possibly escalated by impact refinement)
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location of the offending statement
    pub location: Location,

    /// Zero-based index of the statement within its file
    pub statement_index: usize,

    /// Table targeted by the statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Lock mode the statement acquires
    pub lock_type: String,

    /// Whitespace-collapsed statement excerpt
    pub statement: String,

    /// Estimated lock duration, only set when a row count was known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_lock_seconds: Option<f64>,

    /// True when the estimate pushed the severity up one level
    #[serde(default)]
    pub escalated: bool,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(
        code: RuleCode,
        severity: Severity,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location,
            statement_index: 0,
            table: None,
            lock_type: String::new(),
            statement: String::new(),
            estimated_lock_seconds: None,
            escalated: false,
        }
    }

    /// Set the statement index and excerpt
    pub fn with_statement(mut self, index: usize, excerpt: impl Into<String>) -> Self {
        self.statement_index = index;
        self.statement = excerpt.into();
        self
    }

    /// Set the target table
    pub fn with_table(mut self, table: Option<String>) -> Self {
        self.table = table;
        self
    }

    /// Set the lock mode
    pub fn with_lock_type(mut self, lock_type: impl Into<String>) -> Self {
        self.lock_type = lock_type.into();
        self
    }

    /// Attach a lock-time estimate
    pub fn with_estimate(mut self, seconds: f64) -> Self {
        self.estimated_lock_seconds = Some(seconds);
        self
    }

    /// Raise the reported severity one level
    pub fn escalate(mut self) -> Self {
        let raised = self.severity.escalate();
        if raised != self.severity {
            self.severity = raised;
            self.escalated = true;
        }
        self
    }

    pub fn lines(&self) -> LineRange {
        self.location.lines()
    }
}
