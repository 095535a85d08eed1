//! MigSafe engine - rule evaluation and reporting
//!
//! This crate implements the analysis pipeline on top of `migsafe-sql`:
//! - The fixed rule catalog and the rule engine
//! - Lock-time impact refinement from row estimates
//! - Ordering diagnostics into per-file reports
//! - End-to-end analysis of single files and batches

pub mod rules;
pub mod refiner;
pub mod assembler;
pub mod analyzer;

pub use rules::{Rule, RuleEngine, CATALOG};
pub use refiner::ImpactRefiner;
pub use assembler::DiagnosticAssembler;
pub use analyzer::Analyzer;
