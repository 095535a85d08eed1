//! Migration files

use migsafe_core::{DialectConfig, Result};

use crate::splitter::{StatementSplitter, Statements};

/// A loaded migration file
///
/// Immutable once loaded. Reading the file from disk is the caller's job;
/// this only holds its name and tokenized text.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    name: String,
    dialect: DialectConfig,
    splitter: StatementSplitter,
}

impl MigrationFile {
    /// Load migration text under `name`
    pub fn load(name: impl Into<String>, sql: impl Into<String>, dialect: DialectConfig) -> Result<Self> {
        let name = name.into();
        let splitter = StatementSplitter::new(sql, dialect).map_err(|error| {
            tracing::warn!(file = %name, %error, "rejecting malformed migration");
            error
        })?;

        Ok(Self {
            name,
            dialect,
            splitter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> DialectConfig {
        self.dialect
    }

    pub fn source(&self) -> &str {
        self.splitter.source()
    }

    /// Statements in source order
    pub fn statements(&self) -> Statements<'_> {
        self.splitter.statements()
    }
}
