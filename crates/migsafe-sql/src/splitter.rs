//! Statement splitting on top of sqlparser's tokenizer
//!
//! The tokenizer already understands string literals, quoted identifiers,
//! dollar-quoted bodies and comments, so a `;` token is always a real
//! statement terminator. A line starting with `\` is a psql meta-command
//! and forms a statement of its own.

use std::borrow::Cow;

use migsafe_core::{DialectConfig, LineRange, MigsafeError, Result};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

const EXCERPT_CHARS: usize = 120;

/// Map a configured dialect onto the tokenizer dialect
pub fn sqlparser_dialect(dialect: DialectConfig) -> Box<dyn Dialect> {
    match dialect {
        DialectConfig::Postgres => Box::new(PostgreSqlDialect {}),
        DialectConfig::MySql => Box::new(MySqlDialect {}),
        DialectConfig::Generic => Box::new(GenericDialect {}),
    }
}

/// A tokenized migration file that can be split into statements any number of times
#[derive(Debug, Clone)]
pub struct StatementSplitter {
    sql: String,
    tokens: Vec<TokenWithSpan>,
    line_starts: Vec<usize>,
    /// Where the tokenizer rejected input and resumed after it
    recoveries: Vec<Location>,
}

impl StatementSplitter {
    /// Tokenize `sql`
    ///
    /// Fails with `MalformedInput` only when a literal, quoted identifier,
    /// dollar-quoted body or block comment is still open at end of input.
    /// Any other tokenizer error is skipped over and the statement holding
    /// it is marked `recovered`.
    pub fn new(sql: impl Into<String>, dialect: DialectConfig) -> Result<Self> {
        let sql = sql.into();
        let line_starts = line_starts(&sql);
        let dialect = sqlparser_dialect(dialect);
        let (tokens, recoveries) = tokenize(&sql, &line_starts, dialect.as_ref())?;

        Ok(Self {
            sql,
            tokens,
            line_starts,
            recoveries,
        })
    }

    /// Original source text
    pub fn source(&self) -> &str {
        &self.sql
    }

    /// Lazily walk the statements from the beginning
    pub fn statements(&self) -> Statements<'_> {
        Statements {
            splitter: self,
            pos: 0,
            index: 0,
        }
    }

    fn offset(&self, line: u64, column: u64) -> Option<usize> {
        byte_offset(&self.sql, &self.line_starts, line, column)
    }

    /// `\` as the first thing on its line
    fn is_meta_command(&self, token: &TokenWithSpan) -> bool {
        if !matches!(token.token, Token::Backslash) {
            return false;
        }
        let Some(at) = self.offset(token.span.start.line, token.span.start.column) else {
            return false;
        };
        let line_start = self.sql[..at].rfind('\n').map_or(0, |nl| nl + 1);
        self.sql[line_start..at].trim().is_empty()
    }

    /// Body end and resume position for the statement starting at `start`
    fn boundary(&self, start: usize) -> (usize, usize) {
        let tokens = &self.tokens;

        for (i, token) in tokens.iter().enumerate().skip(start) {
            if matches!(token.token, Token::SemiColon) {
                return (i, i + 1);
            }
            if !self.is_meta_command(token) {
                continue;
            }
            if tokens[start..i].iter().any(|t| is_significant(&t.token)) {
                return (i, i);
            }
            // The meta-command runs to the end of its line
            let line = token.span.start.line;
            let end = tokens[i..]
                .iter()
                .position(|t| t.span.start.line > line)
                .map_or(tokens.len(), |rel| i + rel);
            return (end, end);
        }

        (tokens.len(), tokens.len())
    }

    /// Whether a tokenizer recovery happened between `tokens[start]` and `tokens[end]`
    fn recovered_within(&self, start: usize, end: usize) -> bool {
        let lower = start
            .checked_sub(1)
            .and_then(|prev| self.tokens.get(prev))
            .map_or((0, 0), |t| position(t.span.end));
        let upper = self.tokens.get(end).map(|t| position(t.span.start));

        self.recoveries.iter().map(|at| position(*at)).any(|at| match upper {
            Some(upper) => at >= lower && at <= upper,
            None => at >= lower,
        })
    }

    fn text_of<'a>(&'a self, tokens: &[TokenWithSpan]) -> Cow<'a, str> {
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return Cow::Borrowed("");
        };

        let start = self.offset(first.span.start.line, first.span.start.column);
        let end = self.offset(last.span.end.line, last.span.end.column);

        match (start, end) {
            (Some(start), Some(end)) if start <= end => match self.sql.get(start..end) {
                Some(text) => Cow::Borrowed(text),
                None => Cow::Owned(render_tokens(tokens)),
            },
            _ => Cow::Owned(render_tokens(tokens)),
        }
    }
}

/// One top-level statement
#[derive(Debug, Clone)]
pub struct StatementSpan<'a> {
    /// Zero-based position among the file's non-empty statements
    pub index: usize,

    /// Statement text from its first to its last significant token
    pub text: Cow<'a, str>,

    /// Lines the statement covers
    pub lines: LineRange,

    /// Tokens from the first to the last significant token, terminator excluded
    pub tokens: &'a [TokenWithSpan],

    /// The tokenizer skipped input it could not read inside this statement
    pub recovered: bool,
}

impl StatementSpan<'_> {
    /// Whitespace-collapsed text, truncated for display
    pub fn excerpt(&self) -> String {
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= EXCERPT_CHARS {
            collapsed
        } else {
            collapsed.chars().take(EXCERPT_CHARS).collect()
        }
    }

    /// Tokens that are neither whitespace nor comments
    pub fn significant_tokens(&self) -> impl Iterator<Item = &Token> + '_ {
        self.tokens.iter().map(|t| &t.token).filter(|t| is_significant(t))
    }
}

/// Iterator over the statements of a `StatementSplitter`
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    splitter: &'a StatementSplitter,
    pos: usize,
    index: usize,
}

impl<'a> Iterator for Statements<'a> {
    type Item = StatementSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tokens = &self.splitter.tokens;

        while self.pos < tokens.len() {
            let start = self.pos;
            let (end, next) = self.splitter.boundary(start);
            self.pos = next;

            let body = &tokens[start..end];
            // Whitespace and comments only
            let Some(first) = body.iter().position(|t| is_significant(&t.token)) else {
                continue;
            };
            let last = body.iter().rposition(|t| is_significant(&t.token)).unwrap_or(first);
            let span = &body[first..=last];

            let lines = LineRange::new(
                span[0].span.start.line as usize,
                span[span.len() - 1].span.end.line as usize,
            );

            let index = self.index;
            self.index += 1;

            return Some(StatementSpan {
                index,
                text: self.splitter.text_of(span),
                lines,
                tokens: span,
                recovered: self.splitter.recovered_within(start, end),
            });
        }

        None
    }
}

/// Tokenize the whole source, resuming after errors that do not leave a
/// literal or comment open
fn tokenize(
    sql: &str,
    line_starts: &[usize],
    dialect: &dyn Dialect,
) -> Result<(Vec<TokenWithSpan>, Vec<Location>)> {
    let mut tokens = Vec::new();
    let mut recoveries = Vec::new();
    let mut offset = 0;
    let mut base = Location::new(1, 1);

    loop {
        let mut chunk = Vec::new();
        let result = Tokenizer::new(dialect, &sql[offset..]).tokenize_with_location_into_buf(&mut chunk);
        tokens.extend(chunk.into_iter().map(|mut token| {
            token.span.start = rebase(token.span.start, base);
            token.span.end = rebase(token.span.end, base);
            token
        }));

        let Err(error) = result else {
            break;
        };
        let at = rebase(error.location, base);
        if is_unterminated(&error.message) {
            return Err(MigsafeError::MalformedInput {
                line: (at.line as usize).max(1),
                message: error.message,
            });
        }

        tracing::debug!(line = at.line, column = at.column, message = %error.message, "skipping unreadable input");
        recoveries.push(at);

        let mut resume = byte_offset(sql, line_starts, at.line, at.column).unwrap_or(sql.len());
        if resume <= offset {
            // The offending character was not consumed
            resume = offset + sql[offset..].chars().next().map_or(1, char::len_utf8);
        }
        if resume >= sql.len() {
            break;
        }

        offset = resume;
        base = location_of(sql, line_starts, offset);
    }

    Ok((tokens, recoveries))
}

/// Errors for input that is still open at end of file
fn is_unterminated(message: &str) -> bool {
    message.starts_with("Unterminated") || message.contains("EOF")
}

/// Move a location from a chunk starting at `base` into whole-source coordinates
fn rebase(location: Location, base: Location) -> Location {
    match location.line {
        0 => location,
        1 => Location::new(base.line, base.column + location.column - 1),
        line => Location::new(base.line + line - 1, location.column),
    }
}

fn position(location: Location) -> (u64, u64) {
    (location.line, location.column)
}

/// Byte offset for a 1-based line and character column
fn byte_offset(sql: &str, line_starts: &[usize], line: u64, column: u64) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let line_idx = usize::try_from(line - 1).ok()?;
    let start = *line_starts.get(line_idx)?;
    let end = line_starts.get(line_idx + 1).copied().unwrap_or(sql.len());
    let line_text = sql.get(start..end)?;

    let column = usize::try_from(column - 1).ok()?;
    let within = line_text
        .char_indices()
        .nth(column)
        .map(|(offset, _)| offset)
        .unwrap_or(line_text.len());

    Some(start + within)
}

/// 1-based line and character column of a byte offset
fn location_of(sql: &str, line_starts: &[usize], offset: usize) -> Location {
    let line_idx = line_starts.partition_point(|&start| start <= offset).saturating_sub(1);
    let start = line_starts.get(line_idx).copied().unwrap_or(0);
    let column = sql.get(start..offset).map_or(0, |text| text.chars().count());
    Location::new(line_idx as u64 + 1, column as u64 + 1)
}

fn is_significant(token: &Token) -> bool {
    !matches!(token, Token::Whitespace(_) | Token::EOF)
}

fn render_tokens(tokens: &[TokenWithSpan]) -> String {
    tokens.iter().map(|t| t.token.to_string()).collect()
}

fn line_starts(sql: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(offset, _)| offset + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(sql: &str) -> Vec<(String, LineRange)> {
        StatementSplitter::new(sql, DialectConfig::Postgres)
            .unwrap()
            .statements()
            .map(|s| (s.text.into_owned(), s.lines))
            .collect()
    }

    #[test]
    fn splits_on_terminators() {
        let statements = split("DROP TABLE a;\nDROP TABLE b;");
        assert_eq!(statements, vec![
            ("DROP TABLE a".to_string(), LineRange::single(1)),
            ("DROP TABLE b".to_string(), LineRange::single(2)),
        ]);
    }

    #[test]
    fn semicolon_inside_literal_does_not_split() {
        let statements = split("INSERT INTO t VALUES ('a;b');\nSELECT 1;");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].0, "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn semicolon_inside_quoted_identifier_and_comments_does_not_split() {
        let sql = "-- drop it; really\nALTER TABLE \"odd;name\" /* ; */ DROP COLUMN c;";
        let statements = split(sql);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].0, "ALTER TABLE \"odd;name\" /* ; */ DROP COLUMN c");
        assert_eq!(statements[0].1, LineRange::single(2));
    }

    #[test]
    fn dollar_quoted_body_stays_whole() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN PERFORM 1; END; $$ LANGUAGE plpgsql;";
        assert_eq!(split(sql).len(), 1);
    }

    #[test]
    fn empty_statements_are_dropped() {
        let statements = split(";;\n-- only a comment\n;\n  \nSELECT 1\n");
        assert_eq!(statements, vec![("SELECT 1".to_string(), LineRange::single(5))]);
    }

    #[test]
    fn multi_line_statement_range() {
        let sql = "\n\nCREATE INDEX idx\n  ON users (email)\n  ;\n";
        let statements = split(sql);
        assert_eq!(statements[0].1, LineRange::new(3, 4));
        assert_eq!(statements[0].0, "CREATE INDEX idx\n  ON users (email)");
    }

    #[test]
    fn trailing_statement_without_terminator() {
        let statements = split("DROP TABLE a; DROP TABLE b");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].0, "DROP TABLE b");
    }

    #[test]
    fn unicode_text_is_sliced_on_char_boundaries() {
        let statements = split("COMMENT ON TABLE t IS 'héllo';  DROP TABLE ünïcode;");
        assert_eq!(statements[1].0, "DROP TABLE ünïcode");
    }

    #[test]
    fn iteration_is_restartable() {
        let splitter = StatementSplitter::new("SELECT 1; SELECT 2;", DialectConfig::Postgres).unwrap();
        let first: Vec<usize> = splitter.statements().map(|s| s.index).collect();
        let second: Vec<usize> = splitter.statements().map(|s| s.index).collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(first, second);
    }

    #[test]
    fn unterminated_literal_is_malformed() {
        let err = StatementSplitter::new("SELECT 1;\nSELECT 'oops;", DialectConfig::Postgres).unwrap_err();
        assert!(matches!(err, MigsafeError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn unknown_operator_is_skipped_not_fatal() {
        let sql = "UPDATE accounts SET frozen = true WHERE balance <-1;\nDROP TABLE users;";
        let splitter = StatementSplitter::new(sql, DialectConfig::Postgres).unwrap();
        let statements: Vec<_> = splitter.statements().collect();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].recovered);
        assert_eq!(statements[0].text, "UPDATE accounts SET frozen = true WHERE balance <-1");
        assert_eq!(statements[0].lines, LineRange::single(1));
        assert!(!statements[1].recovered);
        assert_eq!(statements[1].text, "DROP TABLE users");
        assert_eq!(statements[1].lines, LineRange::single(2));
    }

    #[test]
    fn recovery_keeps_later_positions() {
        let sql = "SELECT a |& b;\n\nALTER TABLE t\n  DROP COLUMN c;";
        let splitter = StatementSplitter::new(sql, DialectConfig::Postgres).unwrap();
        let statements: Vec<_> = splitter.statements().collect();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].recovered);
        assert_eq!(statements[1].text, "ALTER TABLE t\n  DROP COLUMN c");
        assert_eq!(statements[1].lines, LineRange::new(3, 4));
    }

    #[test]
    fn unterminated_literal_after_recovery_is_malformed() {
        let err = StatementSplitter::new("SELECT a |& b;\nSELECT 'oops", DialectConfig::Postgres).unwrap_err();
        assert!(matches!(err, MigsafeError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn psql_meta_command_is_its_own_statement() {
        let statements = split("\\connect app\nDROP TABLE users;\n  \\set ON_ERROR_STOP on\nSELECT 1");
        assert_eq!(statements, vec![
            ("\\connect app".to_string(), LineRange::single(1)),
            ("DROP TABLE users".to_string(), LineRange::single(2)),
            ("\\set ON_ERROR_STOP on".to_string(), LineRange::single(3)),
            ("SELECT 1".to_string(), LineRange::single(4)),
        ]);
    }

    #[test]
    fn meta_command_ends_an_open_statement() {
        let statements = split("SELECT 1\n\\gset\nDROP TABLE t;");
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].0, "SELECT 1");
        assert_eq!(statements[1].0, "\\gset");
    }

    #[test]
    fn unterminated_block_comment_is_malformed() {
        let err = StatementSplitter::new("SELECT 1; /* never closed", DialectConfig::Postgres).unwrap_err();
        assert!(matches!(err, MigsafeError::MalformedInput { .. }));
    }

    #[test]
    fn excerpt_collapses_and_truncates() {
        let long_name = "x".repeat(200);
        let sql = format!("DROP\n   TABLE\t{};", long_name);
        let splitter = StatementSplitter::new(sql, DialectConfig::Postgres).unwrap();
        let statement = splitter.statements().next().unwrap();

        let excerpt = statement.excerpt();
        assert!(excerpt.starts_with("DROP TABLE xxx"));
        assert_eq!(excerpt.chars().count(), 120);
    }
}
