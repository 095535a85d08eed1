//! End-to-end analysis of migration files
//!
//! Splitter -> classifier -> rule engine -> impact refiner -> assembler.
//! Files are independent, so a batch is just a fold over per-file results.

use migsafe_core::{
    Config, DialectConfig, FileError, FileReport, ImpactConfig, MigsafeError, Operation, Report,
    Result, RowEstimate, RuleCode,
};
use migsafe_sql::{Classifier, MigrationFile};

use crate::assembler::DiagnosticAssembler;
use crate::refiner::ImpactRefiner;
use crate::rules::RuleEngine;

/// The analysis pipeline
///
/// Holds only read-only configuration; one analyzer can serve any number
/// of files, including from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    classifier: Classifier,
    engine: RuleEngine,
    refiner: ImpactRefiner,
}

impl Analyzer {
    /// Pipeline with the full catalog and built-in impact policy
    pub fn new(dialect: DialectConfig) -> Self {
        Self {
            classifier: Classifier::new(dialect),
            ..Self::default()
        }
    }

    /// Pipeline configured from `migsafe.toml`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dialect)
            .with_disabled(config.rules.disabled_codes())
            .with_impact(config.impact.clone())
    }

    pub fn with_disabled(mut self, disabled: impl IntoIterator<Item = RuleCode>) -> Self {
        self.engine = RuleEngine::with_disabled(disabled);
        self
    }

    pub fn with_impact(mut self, impact: ImpactConfig) -> Self {
        self.refiner = ImpactRefiner::new(impact);
        self
    }

    pub fn dialect(&self) -> DialectConfig {
        self.classifier.dialect()
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Classified operations of a file, in statement order
    pub fn operations(&self, file: &MigrationFile) -> Vec<Operation> {
        file.statements()
            .map(|statement| self.classifier.classify(&statement))
            .collect()
    }

    /// Analyze an already loaded file
    pub fn analyze_file(&self, file: &MigrationFile, rows: &RowEstimate) -> FileReport {
        let mut assembler = DiagnosticAssembler::new(file.name());

        for statement in file.statements() {
            let operation = self.classifier.classify(&statement);
            let table_rows = operation.table.as_deref().and_then(|table| rows.rows_for(table));

            for diagnostic in self.engine.diagnose(file.name(), &operation) {
                assembler.push(self.refiner.refine(&diagnostic, table_rows));
            }
        }

        let report = assembler.finish();
        tracing::debug!(
            file = %report.file,
            diagnostics = report.summary.total,
            "analyzed migration"
        );
        report
    }

    /// Load and analyze one file's text
    ///
    /// Fails only with `MalformedInput`, in which case nothing is reported
    /// for the file.
    pub fn analyze(&self, name: &str, sql: &str, rows: &RowEstimate) -> Result<FileReport> {
        let file = MigrationFile::load(name, sql, self.dialect())?;
        Ok(self.analyze_file(&file, rows))
    }

    /// Analyze several files
    ///
    /// A malformed file becomes a file-level error in the report; the other
    /// files are analyzed as usual.
    pub fn analyze_batch<'a, I>(&self, files: I, rows: &RowEstimate) -> Report
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = Report::new();

        for (name, sql) in files {
            match self.analyze(name, sql, rows) {
                Ok(file_report) => report.add_file(file_report),
                Err(MigsafeError::MalformedInput { line, message }) => report.add_error(FileError {
                    file: name.to_string(),
                    line,
                    message,
                }),
            }
        }

        report
    }
}
