//! Integration tests for splitting and classification

use migsafe_core::{DialectConfig, LineRange, MigsafeError, OperationKind, OptionFlag};
use migsafe_sql::{Classifier, MigrationFile};
use pretty_assertions::assert_eq;

const MIGRATION: &str = r#"-- 20240101_users.sql
BEGIN;

CREATE TABLE audit_log (
    id bigserial PRIMARY KEY,
    note text DEFAULT 'created; pending'
);

/* widen the column; backfill later */
ALTER TABLE public.users
    ALTER COLUMN id TYPE bigint;

ALTER TABLE users ADD COLUMN status varchar(20) DEFAULT 'active' NOT NULL;
CREATE UNIQUE INDEX CONCURRENTLY IF NOT EXISTS users_email_idx ON users (email);
ALTER TABLE orders ADD CONSTRAINT orders_user_fk
    FOREIGN KEY (user_id) REFERENCES users (id) NOT VALID;
ALTER TABLE "Orders" RENAME COLUMN "Total" TO amount;
CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

COMMIT;
"#;

#[test]
fn classify_realistic_migration() {
    let file = MigrationFile::load("20240101_users.sql", MIGRATION, DialectConfig::Postgres).unwrap();
    let classifier = Classifier::new(file.dialect());

    let operations: Vec<_> = file
        .statements()
        .map(|statement| classifier.classify(&statement))
        .collect();

    let kinds: Vec<OperationKind> = operations.iter().map(|op| op.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Other,
            OperationKind::Other,
            OperationKind::AlterColumnType,
            OperationKind::AddColumn,
            OperationKind::CreateIndex,
            OperationKind::AddForeignKey,
            OperationKind::RenameColumn,
            OperationKind::Other,
            OperationKind::Other,
        ]
    );

    let alter = &operations[2];
    assert_eq!(alter.table.as_deref(), Some("public.users"));
    assert_eq!(alter.column.as_deref(), Some("id"));
    assert_eq!(alter.lines, LineRange::new(10, 11));

    let add = &operations[3];
    assert!(add.has(OptionFlag::HasDefault));
    assert!(add.has(OptionFlag::NotNullPresent));

    let index = &operations[4];
    assert!(index.has(OptionFlag::Concurrently));
    assert!(index.has(OptionFlag::Unique));
    assert_eq!(index.table.as_deref(), Some("users"));

    let fk = &operations[5];
    assert!(fk.has(OptionFlag::NotValid));
    assert_eq!(fk.lines, LineRange::new(15, 16));

    let rename = &operations[6];
    assert_eq!(rename.table.as_deref(), Some("Orders"));
    assert_eq!(rename.column.as_deref(), Some("Total"));
    assert_eq!(rename.new_name.as_deref(), Some("amount"));
}

#[test]
fn statement_indices_and_excerpts() {
    let file = MigrationFile::load("m.sql", MIGRATION, DialectConfig::Postgres).unwrap();
    let statements: Vec<_> = file.statements().collect();

    assert_eq!(statements.len(), 9);
    for (i, statement) in statements.iter().enumerate() {
        assert_eq!(statement.index, i);
    }
    assert_eq!(statements[2].excerpt(), "ALTER TABLE public.users ALTER COLUMN id TYPE bigint");
    assert!(statements[7].text.contains("RETURN NEW;"));
    assert_eq!(statements[8].lines, LineRange::single(25));
}

#[test]
fn classification_is_stable_across_walks() {
    let file = MigrationFile::load("m.sql", MIGRATION, DialectConfig::Postgres).unwrap();
    let classifier = Classifier::new(DialectConfig::Postgres);

    let first: Vec<_> = file.statements().map(|s| classifier.classify(&s)).collect();
    let second: Vec<_> = file.statements().map(|s| classifier.classify(&s)).collect();
    assert_eq!(first, second);
}

#[test]
fn mysql_migration() {
    let sql = "ALTER TABLE `orders` MODIFY `total` DECIMAL(12,2) NOT NULL;\n\
               ALTER TABLE `orders` CHANGE `total` `amount` DECIMAL(12,2);\n\
               CREATE INDEX idx_amount ON `orders` (`amount`);";
    let file = MigrationFile::load("m.sql", sql, DialectConfig::MySql).unwrap();
    let classifier = Classifier::new(DialectConfig::MySql);

    let kinds: Vec<OperationKind> = file.statements().map(|s| classifier.classify(&s).kind).collect();
    assert_eq!(
        kinds,
        vec![OperationKind::AlterColumnType, OperationKind::RenameColumn, OperationKind::CreateIndex]
    );
}

#[test]
fn unterminated_dollar_quote_is_malformed() {
    let sql = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN PERFORM 1;";
    let result = MigrationFile::load("m.sql", sql, DialectConfig::Postgres);
    assert!(matches!(result, Err(MigsafeError::MalformedInput { line: 1, .. })));
}

#[test]
fn partial_statements_degrade_to_other() {
    let sql = "DROP TABLE;\nALTER TABLE users;\nCREATE INDEX ON;\nALTER TABLE t ALTER COLUMN;";
    let file = MigrationFile::load("m.sql", sql, DialectConfig::Postgres).unwrap();
    let classifier = Classifier::default();

    for statement in file.statements() {
        assert_eq!(classifier.classify(&statement).kind, OperationKind::Other, "{}", statement.text);
    }
}

#[test]
fn unknown_operator_is_analyzed_not_rejected() {
    let sql = "UPDATE accounts SET frozen = true WHERE balance <-1;\nDROP TABLE users;";
    let file = MigrationFile::load("m.sql", sql, DialectConfig::Postgres).unwrap();
    let classifier = Classifier::new(file.dialect());

    let operations: Vec<_> = file.statements().map(|s| classifier.classify(&s)).collect();
    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0].kind, OperationKind::Other);
    assert_eq!(operations[1].kind, OperationKind::DropTable);
    assert_eq!(operations[1].table.as_deref(), Some("users"));
    assert_eq!(operations[1].lines, LineRange::single(2));
}

#[test]
fn psql_meta_commands_split_statements() {
    let sql = "\\connect app\nDROP TABLE users;\n\\i other.sql\n";
    let file = MigrationFile::load("m.sql", sql, DialectConfig::Postgres).unwrap();
    let classifier = Classifier::default();

    let kinds: Vec<OperationKind> = file.statements().map(|s| classifier.classify(&s).kind).collect();
    assert_eq!(kinds, vec![OperationKind::Other, OperationKind::DropTable, OperationKind::Other]);
}
