//! Statement classification
//!
//! Keyword driven and case-insensitive. Classification never fails: a
//! statement that does not fully match one of the recognized shapes becomes
//! an `Other` operation, which no rule matches.
//!
//! Recognized shapes:
//! - `DROP TABLE [IF EXISTS] t`
//! - `ALTER TABLE [IF EXISTS] [ONLY] t <action>` where action is one of
//!   `DROP COLUMN`, `RENAME TO`, `RENAME [COLUMN] a TO b`, `ADD [COLUMN]`,
//!   `ADD [CONSTRAINT n] FOREIGN KEY`, `ALTER [COLUMN] c TYPE`,
//!   `ALTER [COLUMN] c SET DATA TYPE`, `ALTER [COLUMN] c SET NOT NULL`
//! - `CREATE [UNIQUE] INDEX [CONCURRENTLY] [IF NOT EXISTS] [name] ON t`
//! - MySQL spellings (`mysql` and `generic` dialects only): `MODIFY [COLUMN]`,
//!   `CHANGE [COLUMN]`, `RENAME AS`, `RENAME TABLE a TO b`
//!
//! Only the first action of a multi-action `ALTER TABLE` is classified, and
//! option flags are read from that action's clause alone. Later actions are
//! not inspected, so `ALTER TABLE t ADD COLUMN a int, ALTER COLUMN b TYPE
//! bigint` is an `AddColumn` and the type change goes unreported.
//!
//! A statement in which the tokenizer had to skip unreadable input is always
//! `Other`.

use migsafe_core::{DialectConfig, LineRange, Operation, OperationKind, OptionFlag, OptionFlags};
use sqlparser::tokenizer::Token;

use crate::splitter::StatementSpan;

/// Unquoted words that can never be a table name
const TABLE_NAME_STOPWORDS: &[&str] = &[
    "ADD", "ALTER", "AS", "CHANGE", "COLUMN", "CONSTRAINT", "DROP", "IF", "MODIFY", "ON",
    "ONLY", "RENAME", "SET", "TO", "USING",
];

/// Words after `ADD` that introduce a constraint or index, not a column
const ADD_NON_COLUMN: &[&str] = &[
    "CHECK", "EXCLUDE", "FULLTEXT", "INDEX", "KEY", "PRIMARY", "SPATIAL", "UNIQUE",
];

/// Turns statement spans into operations
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    dialect: DialectConfig,
}

impl Classifier {
    pub fn new(dialect: DialectConfig) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> DialectConfig {
        self.dialect
    }

    /// Classify one statement. Always returns exactly one operation.
    pub fn classify(&self, statement: &StatementSpan<'_>) -> Operation {
        let tokens: Vec<&Token> = statement.significant_tokens().collect();
        let mut cursor = Cursor::new(&tokens);

        let draft = if statement.recovered {
            None
        } else {
            self.statement(&mut cursor)
        };
        let operation = match draft {
            Some(draft) => draft.into_operation(statement.index, statement.lines, statement.excerpt()),
            None => Operation::other(statement.index, statement.lines, statement.excerpt()),
        };

        tracing::debug!(
            statement = operation.statement_index,
            kind = %operation.kind,
            table = ?operation.table,
            "classified statement"
        );

        operation
    }

    fn accepts_mysql_spellings(&self) -> bool {
        matches!(self.dialect, DialectConfig::MySql | DialectConfig::Generic)
    }

    fn statement(&self, c: &mut Cursor<'_>) -> Option<Draft> {
        if c.eat("DROP") {
            return self.drop_table(c);
        }
        if c.eat("ALTER") {
            return self.alter_table(c);
        }
        if c.eat("CREATE") {
            return self.create_index(c);
        }
        if self.accepts_mysql_spellings() && c.eat("RENAME") {
            return self.rename_table_statement(c);
        }
        None
    }

    fn drop_table(&self, c: &mut Cursor<'_>) -> Option<Draft> {
        if !c.eat("TABLE") {
            return None;
        }

        let mut flags = OptionFlags::new();
        flags.set(OptionFlag::IfExists, c.eat_all(&["IF", "EXISTS"]));
        let table = c.table_name()?;

        Some(Draft::new(OperationKind::DropTable, table).flags(flags))
    }

    fn alter_table(&self, c: &mut Cursor<'_>) -> Option<Draft> {
        if !c.eat("TABLE") {
            return None;
        }

        let mut flags = OptionFlags::new();
        flags.set(OptionFlag::IfExists, c.eat_all(&["IF", "EXISTS"]));
        c.eat("ONLY");
        let table = c.table_name()?;

        let mut action = c.clause();
        self.alter_action(&mut action, table, flags)
    }

    fn alter_action(&self, a: &mut Cursor<'_>, table: String, mut flags: OptionFlags) -> Option<Draft> {
        if a.eat("ADD") {
            return self.add_action(a, table, flags);
        }

        if a.eat("DROP") {
            if !a.eat("COLUMN") {
                return None;
            }
            flags.set(OptionFlag::IfExists, a.eat_all(&["IF", "EXISTS"]));
            let column = a.identifier()?;
            return Some(Draft::new(OperationKind::DropColumn, table).column(column).flags(flags));
        }

        if a.eat("RENAME") {
            return self.rename_action(a, table, flags);
        }

        if a.eat("ALTER") {
            a.eat("COLUMN");
            let column = a.identifier()?;
            let kind = if a.eat("TYPE") || a.eat_all(&["SET", "DATA", "TYPE"]) {
                OperationKind::AlterColumnType
            } else if a.eat_all(&["SET", "NOT", "NULL"]) {
                OperationKind::SetNotNull
            } else {
                return None;
            };
            return Some(Draft::new(kind, table).column(column).flags(flags));
        }

        if self.accepts_mysql_spellings() {
            if a.eat("MODIFY") {
                a.eat("COLUMN");
                let column = a.identifier()?;
                return Some(Draft::new(OperationKind::AlterColumnType, table).column(column).flags(flags));
            }

            if a.eat("CHANGE") {
                a.eat("COLUMN");
                let old = a.identifier()?;
                let new = a.identifier()?;
                // CHANGE both renames and redefines; a rename is the bigger hazard
                let draft = if old.eq_ignore_ascii_case(&new) {
                    Draft::new(OperationKind::AlterColumnType, table).column(old)
                } else {
                    Draft::new(OperationKind::RenameColumn, table).column(old).new_name(new)
                };
                return Some(draft.flags(flags));
            }
        }

        None
    }

    fn add_action(&self, a: &mut Cursor<'_>, table: String, mut flags: OptionFlags) -> Option<Draft> {
        if a.eat("CONSTRAINT") {
            a.identifier()?;
            return self.foreign_key(a, table, flags);
        }
        if a.peek_keyword("FOREIGN") {
            return self.foreign_key(a, table, flags);
        }
        if ADD_NON_COLUMN.iter().any(|kw| a.peek_keyword(kw)) {
            return None;
        }

        a.eat("COLUMN");
        flags.set(OptionFlag::IfExists, a.eat_all(&["IF", "NOT", "EXISTS"]));
        let column = a.identifier()?;

        let definition = a.rest();
        flags.set(OptionFlag::HasDefault, contains_keyword(definition, "DEFAULT"));
        flags.set(OptionFlag::NotNullPresent, contains_not_null(definition));

        Some(Draft::new(OperationKind::AddColumn, table).column(column).flags(flags))
    }

    fn foreign_key(&self, a: &mut Cursor<'_>, table: String, mut flags: OptionFlags) -> Option<Draft> {
        if !a.eat_all(&["FOREIGN", "KEY"]) {
            return None;
        }

        flags.set(OptionFlag::NotValid, contains_sequence(a.rest(), &["NOT", "VALID"]));
        let draft = Draft::new(OperationKind::AddForeignKey, table).flags(flags);

        Some(match a.parenthesized_identifier() {
            Some(column) => draft.column(column),
            None => draft,
        })
    }

    fn rename_action(&self, a: &mut Cursor<'_>, table: String, flags: OptionFlags) -> Option<Draft> {
        if a.eat("TO") || (self.accepts_mysql_spellings() && a.eat("AS")) {
            let new_name = a.table_name()?;
            return Some(Draft::new(OperationKind::RenameTable, table).new_name(new_name).flags(flags));
        }

        if a.peek_keyword("CONSTRAINT") || a.peek_keyword("INDEX") || a.peek_keyword("KEY") {
            return None;
        }

        a.eat("COLUMN");
        let old = a.identifier()?;
        if !a.eat("TO") {
            return None;
        }
        let new = a.identifier()?;

        Some(Draft::new(OperationKind::RenameColumn, table).column(old).new_name(new).flags(flags))
    }

    fn rename_table_statement(&self, c: &mut Cursor<'_>) -> Option<Draft> {
        if !c.eat("TABLE") {
            return None;
        }

        let old = c.table_name()?;
        if !c.eat("TO") {
            return None;
        }
        let new = c.table_name()?;

        Some(Draft::new(OperationKind::RenameTable, old).new_name(new))
    }

    fn create_index(&self, c: &mut Cursor<'_>) -> Option<Draft> {
        let mut flags = OptionFlags::new();
        flags.set(OptionFlag::Unique, c.eat("UNIQUE"));
        if !c.eat("INDEX") {
            return None;
        }

        flags.set(OptionFlag::Concurrently, contains_keyword(c.rest(), "CONCURRENTLY"));
        c.eat("CONCURRENTLY");
        flags.set(OptionFlag::IfExists, c.eat_all(&["IF", "NOT", "EXISTS"]));

        // Index name is optional in PostgreSQL
        if !c.peek_keyword("ON") {
            c.table_name()?;
        }
        if !c.eat("ON") {
            return None;
        }
        c.eat("ONLY");
        let table = c.table_name()?;

        if c.eat("USING") {
            c.identifier();
        }
        let draft = Draft::new(OperationKind::CreateIndex, table).flags(flags);

        Some(match c.parenthesized_identifier() {
            Some(column) => draft.column(column),
            None => draft,
        })
    }
}

/// Operation attributes gathered before line information is attached
struct Draft {
    kind: OperationKind,
    table: String,
    column: Option<String>,
    new_name: Option<String>,
    flags: OptionFlags,
}

impl Draft {
    fn new(kind: OperationKind, table: String) -> Self {
        Self {
            kind,
            table,
            column: None,
            new_name: None,
            flags: OptionFlags::new(),
        }
    }

    fn column(mut self, column: String) -> Self {
        self.column = Some(column);
        self
    }

    fn new_name(mut self, new_name: String) -> Self {
        self.new_name = Some(new_name);
        self
    }

    fn flags(mut self, flags: OptionFlags) -> Self {
        self.flags = flags;
        self
    }

    fn into_operation(self, index: usize, lines: LineRange, excerpt: String) -> Operation {
        let mut operation = Operation::new(self.kind, index, lines, excerpt)
            .with_table(self.table)
            .with_flags(self.flags);
        if let Some(column) = self.column {
            operation = operation.with_column(column);
        }
        if let Some(new_name) = self.new_name {
            operation = operation.with_new_name(new_name);
        }
        operation
    }
}

/// Forward-only cursor over significant tokens
struct Cursor<'a> {
    tokens: &'a [&'a Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [&'a Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|token| is_keyword(token, keyword))
    }

    fn eat(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume `keywords` only if all of them follow in order
    fn eat_all(&mut self, keywords: &[&str]) -> bool {
        let matched = self
            .tokens
            .get(self.pos..self.pos + keywords.len())
            .is_some_and(|window| {
                window
                    .iter()
                    .zip(keywords)
                    .all(|(token, keyword)| is_keyword(token, keyword))
            });
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    /// Any word, quoted or not
    fn identifier(&mut self) -> Option<String> {
        match self.peek()? {
            Token::Word(word) => {
                self.pos += 1;
                Some(word.value.clone())
            }
            _ => None,
        }
    }

    /// Possibly schema-qualified name, parts joined with `.`
    fn table_name(&mut self) -> Option<String> {
        let mut parts = vec![self.name_part()?];

        while matches!(self.peek(), Some(Token::Period)) {
            let Some(Token::Word(word)) = self.tokens.get(self.pos + 1).copied() else {
                break;
            };
            parts.push(word.value.clone());
            self.pos += 2;
        }

        Some(parts.join("."))
    }

    fn name_part(&mut self) -> Option<String> {
        match self.peek()? {
            Token::Word(word)
                if word.quote_style.is_some()
                    || !TABLE_NAME_STOPWORDS.iter().any(|s| word.value.eq_ignore_ascii_case(s)) =>
            {
                self.pos += 1;
                Some(word.value.clone())
            }
            _ => None,
        }
    }

    /// `( name` followed by `,` or `)`; expressions yield nothing
    fn parenthesized_identifier(&mut self) -> Option<String> {
        if !matches!(self.peek(), Some(Token::LParen)) {
            return None;
        }

        let Some(Token::Word(word)) = self.tokens.get(self.pos + 1).copied() else {
            return None;
        };
        match self.tokens.get(self.pos + 2).copied() {
            Some(Token::Comma) | Some(Token::RParen) => {
                self.pos += 2;
                Some(word.value.clone())
            }
            _ => None,
        }
    }

    fn rest(&self) -> &'a [&'a Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    /// Cursor over the remaining tokens up to the next top-level comma
    fn clause(&self) -> Cursor<'a> {
        let rest = self.rest();
        let mut depth = 0usize;
        let end = rest
            .iter()
            .position(|token| match token {
                Token::LParen => {
                    depth += 1;
                    false
                }
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    false
                }
                Token::Comma => depth == 0,
                _ => false,
            })
            .unwrap_or(rest.len());

        Cursor::new(&rest[..end])
    }
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword))
}

fn contains_keyword(tokens: &[&Token], keyword: &str) -> bool {
    tokens.iter().any(|token| is_keyword(token, keyword))
}

fn contains_sequence(tokens: &[&Token], keywords: &[&str]) -> bool {
    tokens.windows(keywords.len()).any(|window| {
        window
            .iter()
            .zip(keywords)
            .all(|(token, keyword)| is_keyword(token, keyword))
    })
}

/// `NOT NULL` as a column constraint, not `IS NOT NULL` inside an expression
fn contains_not_null(tokens: &[&Token]) -> bool {
    tokens.windows(2).enumerate().any(|(i, window)| {
        is_keyword(window[0], "NOT")
            && is_keyword(window[1], "NULL")
            && !(i > 0 && is_keyword(tokens[i - 1], "IS"))
    })
}
