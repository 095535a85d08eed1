//! Analysis errors

/// Errors surfaced past the analysis boundary
///
/// Classification and rule matching never fail: statements that cannot be
/// understood become `Other` operations and yield no diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigsafeError {
    /// Unterminated string literal, quoted identifier or block comment
    #[error("malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, MigsafeError>;
