//! Per-file diagnostic assembly

use std::cmp::Ordering;

use migsafe_core::{Diagnostic, FileReport};

/// Collects the diagnostics of one file into an ordered report
#[derive(Debug, Clone)]
pub struct DiagnosticAssembler {
    file: String,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticAssembler {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Order the diagnostics and build the report
    ///
    /// Ascending start line, then severity descending. Remaining ties fall
    /// back to statement index and rule code so the order is total.
    pub fn finish(mut self) -> FileReport {
        self.diagnostics.sort_by(report_order);
        FileReport::new(self.file, self.diagnostics)
    }
}

fn report_order(a: &Diagnostic, b: &Diagnostic) -> Ordering {
    a.location
        .line
        .cmp(&b.location.line)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.statement_index.cmp(&b.statement_index))
        .then_with(|| a.code.cmp(&b.code))
}
