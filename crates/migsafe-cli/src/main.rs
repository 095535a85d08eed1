use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use migsafe_core::{Config, DialectConfig, Report, RowEstimate, Severity};
use migsafe_engine::Analyzer;

mod files;
mod output;

use output::OutputFormat;

const DEFAULT_CONFIG: &str = "migsafe.toml";

/// MigSafe - catch dangerous migrations before they lock production
#[derive(Parser)]
#[command(name = "migsafe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: migsafe.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint SQL migration files for dangerous operations
    Lint(LintArgs),

    /// List the rule catalog
    Rules,

    /// Write a default migsafe.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct LintArgs {
    /// SQL migration files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Estimated row count for every table without an explicit entry
    #[arg(short, long)]
    rows: Option<u64>,

    /// Estimated row count for one table, as TABLE=ROWS (repeatable)
    #[arg(long = "table-rows", value_name = "TABLE=ROWS", value_parser = parse_table_rows)]
    table_rows: Vec<(String, u64)>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Lowest severity that fails the run (default: fail_on from config, else high)
    #[arg(long)]
    fail_on: Option<Severity>,

    /// SQL dialect, overriding the config
    #[arg(long)]
    dialect: Option<DialectConfig>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl LintArgs {
    /// Config rows overlaid with the command-line estimates
    fn row_estimate(&self, config: &Config) -> RowEstimate {
        let cli = RowEstimate {
            default: self.rows,
            tables: self.table_rows.iter().cloned().collect(),
        };
        config.row_estimate().merged(&cli)
    }
}

fn parse_table_rows(value: &str) -> Result<(String, u64), String> {
    let (table, rows) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=ROWS, got '{}'", value))?;

    let table = table.trim();
    if table.is_empty() {
        return Err(format!("missing table name in '{}'", value));
    }

    let rows = rows
        .trim()
        .replace('_', "")
        .parse::<u64>()
        .map_err(|e| format!("invalid row count in '{}': {}", value, e))?;

    Ok((table.to_string(), rows))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
            init_command(&path, force)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rules => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            print!("{}", output::render_rules(&config.rules.disabled_codes()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Lint(args) => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            lint_command(&config, &args, cli.verbose)
        }
    }
}

/// Load config from `--config`, else `./migsafe.toml` if present, else defaults
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(path) = path {
        Config::from_file(path).with_context(|| format!("failed to load {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    tracing::debug!(dialect = ?config.dialect, fail_on = %config.fail_on, "loaded config");
    Ok(config)
}

fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

/// Lint command - analyze migrations and decide the exit code
fn lint_command(config: &Config, args: &LintArgs, verbose: bool) -> Result<ExitCode> {
    let mut config = config.clone();
    if let Some(dialect) = args.dialect {
        config.dialect = dialect;
    }

    let paths = files::collect_sql_files(&args.paths)?;
    if paths.is_empty() {
        eprintln!("{}", "No .sql files found".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let rows = args.row_estimate(&config);
    let report = lint(&config, &paths, &rows, verbose)?;

    let rendered = render_report(&report, args)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if verbose {
                eprintln!("{} {}", "Report saved to:".green(), path.display());
            }
        }
        None => print!("{}", rendered),
    }

    let fail_on = args.fail_on.unwrap_or(config.fail_on);
    if should_fail(&report, fail_on) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Render in the requested format, without color codes when writing to a file
fn render_report(report: &Report, args: &LintArgs) -> Result<String> {
    if args.output.is_some() {
        colored::control::set_override(false);
    }
    output::render(report, args.format)
}

/// Read and analyze every file that is not allowlisted
fn lint(config: &Config, paths: &[PathBuf], rows: &RowEstimate, verbose: bool) -> Result<Report> {
    let analyzer = Analyzer::from_config(config);

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let name = files::display_name(path);
        if config.allowlist.is_file_skipped(&name) {
            tracing::debug!(file = %name, "skipping allowlisted file");
            continue;
        }

        if verbose {
            eprintln!("  {} {}...", "Checking".cyan(), name);
        }
        let sql = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        sources.push((name, sql));
    }

    Ok(analyzer.analyze_batch(
        sources.iter().map(|(name, sql)| (name.as_str(), sql.as_str())),
        rows,
    ))
}

/// A run fails on any diagnostic at or above `fail_on`, or any malformed file
fn should_fail(report: &Report, fail_on: Severity) -> bool {
    report.has_at_or_above(fail_on) || report.has_errors()
}
