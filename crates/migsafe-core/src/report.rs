//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Diagnostic counts per severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    /// Total number of diagnostics
    pub total: usize,

    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeveritySummary {
    /// Count the diagnostics in `diagnostics`
    pub fn from_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        let mut summary = Self::default();
        for diagnostic in diagnostics {
            summary.record(diagnostic.severity);
        }
        summary
    }

    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        self.total += 1;
    }

    /// Count for a single severity
    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    fn absorb(&mut self, other: &SeveritySummary) {
        self.total += other.total;
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }
}

/// Ordered diagnostics for one migration file
///
/// Contains no timestamps, so identical input always serializes to
/// identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// File path or name
    pub file: String,

    /// Diagnostics, ordered by line then severity descending
    pub diagnostics: Vec<Diagnostic>,

    /// Counts per severity
    pub summary: SeveritySummary,
}

impl FileReport {
    /// Wrap already-ordered diagnostics
    pub fn new(file: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        let summary = SeveritySummary::from_diagnostics(&diagnostics);
        Self {
            file: file.into(),
            diagnostics,
            summary,
        }
    }

    /// Diagnostics whose severity is `min_severity` or higher, in report order
    pub fn at_or_above(&self, min_severity: Severity) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= min_severity)
            .collect()
    }

    /// Check if any diagnostic reaches `min_severity`
    pub fn has_at_or_above(&self, min_severity: Severity) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= min_severity)
    }

    /// 0-100 score, 25 points per severity weight, capped
    pub fn risk_score(&self) -> u32 {
        let raw: u32 = self.diagnostics.iter().map(|d| d.severity.weight() * 25).sum();
        raw.min(100)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A file rejected before analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// File path or name
    pub file: String,

    /// Line where the problem was detected (1-indexed)
    pub line: usize,

    /// Human-readable message
    pub message: String,
}

/// Batch report (report.json v1)
///
/// This is the stable output format.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub generated_at: String,

    /// Per-file results, in the order files were analyzed
    pub files: Vec<FileReport>,

    /// Files that could not be analyzed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FileError>,

    /// Counts across all files
    pub summary: SeveritySummary,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            generated_at: chrono::Utc::now().to_rfc3339(),
            files: Vec::new(),
            errors: Vec::new(),
            summary: SeveritySummary::default(),
        }
    }

    /// Add one file's results
    pub fn add_file(&mut self, file: FileReport) {
        self.summary.absorb(&file.summary);
        self.files.push(file);
    }

    /// Record a file that failed before analysis
    pub fn add_error(&mut self, error: FileError) {
        self.errors.push(error);
    }

    /// All diagnostics at or above `min_severity`, across files
    pub fn at_or_above(&self, min_severity: Severity) -> Vec<&Diagnostic> {
        self.files
            .iter()
            .flat_map(|file| file.at_or_above(min_severity))
            .collect()
    }

    /// Check if any diagnostic in any file reaches `min_severity`
    pub fn has_at_or_above(&self, min_severity: Severity) -> bool {
        self.files.iter().any(|file| file.has_at_or_above(min_severity))
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{LineRange, Location, RuleCode};

    fn diag(code: RuleCode, severity: Severity, line: usize) -> Diagnostic {
        Diagnostic::new(code, severity, "test", Location::new("001.sql", LineRange::single(line)))
    }

    #[test]
    fn empty_report() {
        let report = Report::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
        assert!(!report.has_at_or_above(Severity::Low));
    }

    #[test]
    fn file_summary_counts_per_severity() {
        let file = FileReport::new("001.sql", vec![
            diag(RuleCode::Ban001, Severity::Critical, 1),
            diag(RuleCode::Lck002, Severity::High, 2),
            diag(RuleCode::Lck003, Severity::High, 3),
            diag(RuleCode::Ban003, Severity::Medium, 4),
        ]);

        assert_eq!(file.summary.total, 4);
        assert_eq!(file.summary.count(Severity::Critical), 1);
        assert_eq!(file.summary.count(Severity::High), 2);
        assert_eq!(file.summary.count(Severity::Medium), 1);
        assert_eq!(file.summary.count(Severity::Low), 0);
    }

    #[test]
    fn at_or_above_filters_in_order() {
        let file = FileReport::new("001.sql", vec![
            diag(RuleCode::Ban003, Severity::Medium, 1),
            diag(RuleCode::Lck002, Severity::High, 2),
            diag(RuleCode::Ban001, Severity::Critical, 3),
        ]);

        let lines: Vec<usize> = file.at_or_above(Severity::High).iter().map(|d| d.location.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(file.has_at_or_above(Severity::Critical));
        assert_eq!(file.at_or_above(Severity::Low).len(), 3);
    }

    #[test]
    fn risk_score_scales_and_caps() {
        assert_eq!(FileReport::new("a.sql", vec![]).risk_score(), 0);

        let single = FileReport::new("a.sql", vec![diag(RuleCode::Ban003, Severity::Medium, 1)]);
        assert_eq!(single.risk_score(), 50);

        let many = FileReport::new("a.sql", vec![
            diag(RuleCode::Ban001, Severity::Critical, 1),
            diag(RuleCode::Ban002, Severity::High, 2),
        ]);
        assert_eq!(many.risk_score(), 100);
    }

    #[test]
    fn batch_summary_accumulates() {
        let mut report = Report::new();
        report.add_file(FileReport::new("a.sql", vec![diag(RuleCode::Ban001, Severity::Critical, 1)]));
        report.add_file(FileReport::new("b.sql", vec![diag(RuleCode::Ban003, Severity::Medium, 1)]));
        report.add_error(FileError {
            file: "c.sql".to_string(),
            line: 1,
            message: "unterminated".to_string(),
        });

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.at_or_above(Severity::Medium).len(), 2);
        assert!(report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let report = Report::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"files\""));
        assert!(!json.contains("\"errors\""));
    }
}
