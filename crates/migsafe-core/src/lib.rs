//! MigSafe Core
//!
//! Core domain model with stable, versioned types.
//! Never rename rule codes - they are part of the public API.

pub mod diagnostic;
pub mod operation;
pub mod estimate;
pub mod report;
pub mod config;
pub mod error;

pub use diagnostic::{Diagnostic, RuleCode, Severity, LineRange, Location};
pub use operation::{Operation, OperationKind, OptionFlag, OptionFlags};
pub use estimate::RowEstimate;
pub use report::{FileReport, FileError, Report, ReportVersion, SeveritySummary};
pub use config::{Config, ConfigError, DialectConfig, ImpactConfig, ImpactCoefficients, RuleSettings, AllowlistRules};
pub use error::{MigsafeError, Result};
