//! SQL splitting and classification
//!
//! This crate handles:
//! - Tokenizing migration files with sqlparser's tokenizer
//! - Splitting them into top-level statements with line ranges
//! - Classifying each statement into a typed `Operation`

pub mod splitter;
pub mod migration;
pub mod classifier;

pub use splitter::{StatementSplitter, StatementSpan, Statements, sqlparser_dialect};
pub use migration::MigrationFile;
pub use classifier::Classifier;
