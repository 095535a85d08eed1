//! Report rendering: colored text, JSON and SARIF

use std::fmt::Write as _;

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use migsafe_core::{Diagnostic, FileReport, Report, RuleCode, Severity};
use migsafe_engine::{Rule, CATALOG};
use serde_json::{json, Value};

const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

/// Output format for `migsafe lint`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

/// Render a batch report in the requested format
pub fn render(report: &Report, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::Sarif => Ok(serde_json::to_string_pretty(&render_sarif(report))?),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
    }
}

/// Human-readable report
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    for file in &report.files {
        write_file(&mut out, file);
    }

    for error in &report.errors {
        let _ = writeln!(
            out,
            "{} {}:{}: {}",
            "✗".red().bold(),
            error.file.bold(),
            error.line,
            error.message.red()
        );
        let _ = writeln!(out, "  {}", "file was not analyzed".dimmed());
        out.push('\n');
    }

    write_summary(&mut out, report);
    out
}

fn write_file(out: &mut String, file: &FileReport) {
    if file.is_clean() {
        let _ = writeln!(out, "{} {}: no issues", "✓".green(), file.file.green());
        return;
    }

    let _ = writeln!(out, "{} {}", "✗".red().bold(), file.file.bold());
    for diagnostic in &file.diagnostics {
        write_diagnostic(out, diagnostic);
    }
    let _ = writeln!(out, "  Risk score: {}/100", file.risk_score().to_string().bold());
    out.push('\n');
}

fn write_diagnostic(out: &mut String, diagnostic: &Diagnostic) {
    let _ = writeln!(
        out,
        "  line {:<7} [{}] {}: {}",
        diagnostic.lines().to_string(),
        severity_label(diagnostic.severity),
        diagnostic.code.to_string().bold(),
        diagnostic.message
    );

    let estimate = match diagnostic.estimated_lock_seconds {
        Some(seconds) => format!("~{:.3}s", seconds),
        None => "unknown".dimmed().to_string(),
    };
    let escalated = if diagnostic.escalated {
        format!(" {}", "(escalated)".red())
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "    lock: {}  estimate: {}{}",
        diagnostic.lock_type, estimate, escalated
    );

    if !diagnostic.statement.is_empty() {
        let _ = writeln!(out, "    {}", diagnostic.statement.dimmed());
    }
}

fn write_summary(out: &mut String, report: &Report) {
    let summary = &report.summary;

    let _ = writeln!(out, "{}", "=".repeat(60).bright_blue());
    let _ = writeln!(
        out,
        "{} {} files, {} diagnostics",
        "Summary:".bold(),
        report.files.len() + report.errors.len(),
        summary.total
    );
    for severity in Severity::DESCENDING {
        let count = summary.count(severity);
        let count = if count > 0 {
            count.to_string().bold()
        } else {
            count.to_string().green()
        };
        let _ = writeln!(out, "  {:<9} {}", severity.as_str(), count);
    }
    if report.has_errors() {
        let _ = writeln!(
            out,
            "  {} {}",
            "malformed".red(),
            report.errors.len().to_string().red().bold()
        );
    }
    let _ = writeln!(out, "{}", "=".repeat(60).bright_blue());
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium | Severity::Low => "warning",
    }
}

fn sarif_rule(rule: &Rule) -> Value {
    json!({
        "id": rule.code.as_str(),
        "shortDescription": { "text": rule.summary },
        "defaultConfiguration": { "level": sarif_level(rule.severity) },
        "properties": {
            "severity": rule.severity.as_str(),
            "lockType": rule.lock_type,
        }
    })
}

fn sarif_result(diagnostic: &Diagnostic) -> Value {
    let mut properties = json!({
        "severity": diagnostic.severity.as_str(),
        "lockType": diagnostic.lock_type,
        "escalated": diagnostic.escalated,
    });
    if let Some(seconds) = diagnostic.estimated_lock_seconds {
        properties["estimatedLockSeconds"] = json!(seconds);
    }

    json!({
        "ruleId": diagnostic.code.as_str(),
        "level": sarif_level(diagnostic.severity),
        "message": { "text": diagnostic.message },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": { "uri": diagnostic.location.file },
                "region": {
                    "startLine": diagnostic.location.line.max(1),
                    "endLine": diagnostic.location.end_line.max(1),
                }
            }
        }],
        "properties": properties,
    })
}

/// SARIF 2.1.0 log for code scanning
pub fn render_sarif(report: &Report) -> Value {
    let results: Vec<Value> = report
        .files
        .iter()
        .flat_map(|file| file.diagnostics.iter())
        .map(sarif_result)
        .collect();

    let notifications: Vec<Value> = report
        .errors
        .iter()
        .map(|error| {
            json!({
                "level": "error",
                "message": { "text": error.message },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": error.file },
                        "region": { "startLine": error.line.max(1) }
                    }
                }]
            })
        })
        .collect();

    json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "migsafe",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": CATALOG.iter().map(sarif_rule).collect::<Vec<_>>(),
                }
            },
            "invocations": [{
                "executionSuccessful": !report.has_errors(),
                "toolExecutionNotifications": notifications,
            }],
            "results": results,
        }]
    })
}

/// Catalog listing for `migsafe rules`
pub fn render_rules(disabled: &[RuleCode]) -> String {
    let mut out = String::new();

    for rule in CATALOG.iter() {
        let code = if disabled.contains(&rule.code) {
            format!("{} (disabled)", rule.code).dimmed()
        } else {
            rule.code.to_string().bold()
        };
        let _ = writeln!(out, "{}  [{}]  {}", code, severity_label(rule.severity), rule.lock_type);
        let _ = writeln!(out, "    {}", rule.summary);
    }

    out
}
