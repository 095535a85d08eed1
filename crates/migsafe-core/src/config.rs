//! Configuration schema (migsafe.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::diagnostic::{RuleCode, Severity};
use crate::estimate::RowEstimate;

/// SQL dialect configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// PostgreSQL
    Postgres,

    /// MySQL / MariaDB
    MySql,

    /// Accepts every spelling the classifier knows
    Generic,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Postgres
    }
}

impl std::str::FromStr for DialectConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

/// Rule selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Rule codes that are never evaluated
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl RuleSettings {
    /// Check if a rule is disabled
    pub fn is_disabled(&self, code: RuleCode) -> bool {
        self.disabled
            .iter()
            .any(|entry| entry.trim().eq_ignore_ascii_case(code.as_str()))
    }

    /// Disabled codes that parse, for handing to the rule engine
    pub fn disabled_codes(&self) -> Vec<RuleCode> {
        RuleCode::ALL
            .iter()
            .copied()
            .filter(|code| self.is_disabled(*code))
            .collect()
    }
}

/// Allowlist rules for specific migration files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowlistRules {
    /// Skip these files entirely (glob patterns)
    #[serde(default)]
    pub skip_files: Vec<String>,
}

impl AllowlistRules {
    /// Check if a file should be skipped
    pub fn is_file_skipped(&self, file: &str) -> bool {
        self.skip_files.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, file)
            } else {
                pattern == file
            }
        })
    }
}

/// Lock-time policy for one rule
///
/// `seconds = base_seconds + seconds_per_million_rows * (rows / 1e6) ^ exponent`
///
/// These numbers are product policy, not measurements. Override them in
/// `[impact.rules.<CODE>]` once real lock durations are known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactCoefficients {
    /// Fixed cost independent of table size
    #[serde(default)]
    pub base_seconds: f64,

    /// Cost per million rows at exponent 1
    pub seconds_per_million_rows: f64,

    /// 1.0 scales linearly, below 1.0 sub-linearly
    #[serde(default = "default_exponent")]
    pub exponent: f64,
}

fn default_exponent() -> f64 {
    1.0
}

impl ImpactCoefficients {
    const fn new(base_seconds: f64, seconds_per_million_rows: f64, exponent: f64) -> Self {
        Self {
            base_seconds,
            seconds_per_million_rows,
            exponent,
        }
    }

    /// Built-in policy for a rule
    pub fn default_for(code: RuleCode) -> Self {
        match code {
            // Catalog-only changes: a short exclusive lock regardless of size
            RuleCode::Ban001 => Self::new(0.010, 0.0, 1.0),
            RuleCode::Ban002 => Self::new(0.050, 0.0, 1.0),
            RuleCode::Ban003 => Self::new(0.005, 0.0, 1.0),
            // Full table rewrites
            RuleCode::Lck001 | RuleCode::Lck004 => Self::new(0.0, 2.0, 1.0),
            // Index build
            RuleCode::Lck002 => Self::new(0.0, 1.5, 0.85),
            // Validation scans
            RuleCode::Lck003 | RuleCode::Lck005 => Self::new(0.0, 0.5, 1.0),
        }
    }

    fn validate(&self, code: &str) -> Result<(), ConfigError> {
        let finite = self.base_seconds.is_finite()
            && self.seconds_per_million_rows.is_finite()
            && self.exponent.is_finite();
        if !finite || self.base_seconds < 0.0 || self.seconds_per_million_rows < 0.0 || self.exponent <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "impact coefficients for {} must be finite, non-negative, with a positive exponent",
                code
            )));
        }
        Ok(())
    }
}

/// Impact refinement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Estimates at or above this raise the severity one level
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold_seconds: f64,

    /// Per-rule overrides of the built-in policy table
    #[serde(default)]
    pub rules: BTreeMap<String, ImpactCoefficients>,
}

fn default_escalation_threshold() -> f64 {
    60.0
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            escalation_threshold_seconds: default_escalation_threshold(),
            rules: BTreeMap::new(),
        }
    }
}

impl ImpactConfig {
    /// Coefficients for a rule, preferring overrides
    pub fn coefficients_for(&self, code: RuleCode) -> ImpactCoefficients {
        self.rules
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(code.as_str()))
            .map(|(_, coefficients)| *coefficients)
            .unwrap_or_else(|| ImpactCoefficients::default_for(code))
    }

    /// Set an override for a rule
    pub fn set_override(&mut self, code: RuleCode, coefficients: ImpactCoefficients) {
        self.rules.insert(code.as_str().to_string(), coefficients);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Lowest severity that fails the run
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,

    /// Rule selection
    #[serde(default)]
    pub rules: RuleSettings,

    /// Allowlist rules
    #[serde(default)]
    pub allowlist: AllowlistRules,

    /// Estimated row counts keyed by exact table name
    #[serde(default)]
    pub rows: BTreeMap<String, u64>,

    /// Impact refinement policy
    #[serde(default)]
    pub impact: ImpactConfig,
}

fn default_fail_on() -> Severity {
    Severity::High
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            fail_on: default_fail_on(),
            rules: RuleSettings::default(),
            allowlist: AllowlistRules::default(),
            rows: BTreeMap::new(),
            impact: ImpactConfig::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject unknown rule codes and nonsensical impact numbers
    pub fn validate(&self) -> Result<(), ConfigError> {
        for code in &self.rules.disabled {
            code.parse::<RuleCode>().map_err(ConfigError::Invalid)?;
        }

        let threshold = self.impact.escalation_threshold_seconds;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "impact.escalation_threshold_seconds must be a positive number".to_string(),
            ));
        }

        for (code, coefficients) in &self.impact.rules {
            code.parse::<RuleCode>().map_err(ConfigError::Invalid)?;
            coefficients.validate(code)?;
        }

        Ok(())
    }

    /// Row estimates declared in the `[rows]` table
    pub fn row_estimate(&self) -> RowEstimate {
        self.rows.iter().map(|(table, rows)| (table.clone(), *rows)).collect()
    }
}

/// Simple glob matching; `*` matches any run of characters
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
