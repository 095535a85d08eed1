//! Impact refinement from row estimates
//!
//! The estimate is `base + seconds_per_million_rows * (rows / 1e6) ^ exponent`
//! using the coefficients in [`ImpactConfig`]. The built-in table is policy
//! pending calibration against real lock durations.

use migsafe_core::{Diagnostic, ImpactConfig, RuleCode};

/// Attaches lock-time estimates and escalates diagnostics that cross the threshold
#[derive(Debug, Clone, Default)]
pub struct ImpactRefiner {
    config: ImpactConfig,
}

impl ImpactRefiner {
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImpactConfig {
        &self.config
    }

    /// Estimated lock duration in seconds, rounded to milliseconds
    ///
    /// Monotonically non-decreasing in `rows` for every valid coefficient set.
    pub fn estimate_seconds(&self, code: RuleCode, rows: u64) -> f64 {
        let c = self.config.coefficients_for(code);
        let millions = rows as f64 / 1_000_000.0;
        let seconds = c.base_seconds + c.seconds_per_million_rows * millions.powf(c.exponent);
        (seconds * 1000.0).round() / 1000.0
    }

    /// Produce the refined diagnostic
    ///
    /// Without a row count the diagnostic comes back unchanged. Refinement
    /// never changes the rule code and never lowers the severity.
    pub fn refine(&self, diagnostic: &Diagnostic, rows: Option<u64>) -> Diagnostic {
        let Some(rows) = rows else {
            return diagnostic.clone();
        };

        let seconds = self.estimate_seconds(diagnostic.code, rows);
        tracing::debug!(code = %diagnostic.code, rows, seconds, "estimated lock time");

        let refined = diagnostic.clone().with_estimate(seconds);
        if seconds < self.config.escalation_threshold_seconds {
            return refined;
        }

        let refined = refined.escalate();
        if refined.escalated {
            tracing::info!(
                code = %refined.code,
                file = %refined.location.file,
                line = refined.location.line,
                seconds,
                severity = %refined.severity,
                "escalated diagnostic"
            );
        }
        refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migsafe_core::{ImpactCoefficients, LineRange, Location, Severity};

    fn diagnostic(code: RuleCode, severity: Severity) -> Diagnostic {
        Diagnostic::new(code, severity, "msg", Location::new("m.sql", LineRange::single(1)))
            .with_table(Some("users".to_string()))
    }

    #[test]
    fn estimate_grows_with_rows() {
        let refiner = ImpactRefiner::default();
        let small = refiner.estimate_seconds(RuleCode::Lck004, 1_000);
        let large = refiner.estimate_seconds(RuleCode::Lck004, 12_000_000);
        assert!(large > small);
        assert_eq!(large, 24.0);
    }

    #[test]
    fn index_builds_scale_sub_linearly() {
        let refiner = ImpactRefiner::default();
        let one = refiner.estimate_seconds(RuleCode::Lck002, 1_000_000);
        let hundred = refiner.estimate_seconds(RuleCode::Lck002, 100_000_000);
        assert_eq!(one, 1.5);
        assert!(hundred < one * 100.0);
        assert!(hundred > one);
    }

    #[test]
    fn catalog_only_changes_have_a_fixed_cost() {
        let refiner = ImpactRefiner::default();
        assert_eq!(refiner.estimate_seconds(RuleCode::Ban001, 0), 0.01);
        assert_eq!(refiner.estimate_seconds(RuleCode::Ban001, 500_000_000), 0.01);
    }

    #[test]
    fn no_rows_passes_through() {
        let refiner = ImpactRefiner::default();
        let original = diagnostic(RuleCode::Lck004, Severity::Critical);
        let refined = refiner.refine(&original, None);
        assert_eq!(refined, original);
        assert!(refined.estimated_lock_seconds.is_none());
    }

    #[test]
    fn estimate_below_threshold_keeps_severity() {
        let refiner = ImpactRefiner::default();
        let original = diagnostic(RuleCode::Lck005, Severity::High);
        let refined = refiner.refine(&original, Some(1_000_000));
        assert_eq!(refined.estimated_lock_seconds, Some(0.5));
        assert_eq!(refined.severity, Severity::High);
        assert!(!refined.escalated);
        assert!(original.estimated_lock_seconds.is_none());
    }

    #[test]
    fn crossing_threshold_escalates_one_level() {
        let refiner = ImpactRefiner::default();
        let original = diagnostic(RuleCode::Lck005, Severity::High);
        // 0.5 s per million rows, so 200M rows is 100 s
        let refined = refiner.refine(&original, Some(200_000_000));
        assert_eq!(refined.severity, Severity::Critical);
        assert!(refined.escalated);
        assert_eq!(refined.code, RuleCode::Lck005);
    }

    #[test]
    fn critical_stays_critical() {
        let refiner = ImpactRefiner::default();
        let original = diagnostic(RuleCode::Lck004, Severity::Critical);
        let refined = refiner.refine(&original, Some(1_000_000_000));
        assert_eq!(refined.severity, Severity::Critical);
        assert!(!refined.escalated);
        assert!(refined.estimated_lock_seconds.unwrap() >= 60.0);
    }

    #[test]
    fn overrides_and_threshold_come_from_config() {
        let mut config = ImpactConfig {
            escalation_threshold_seconds: 1.0,
            ..ImpactConfig::default()
        };
        config.set_override(
            RuleCode::Ban003,
            ImpactCoefficients {
                base_seconds: 2.0,
                seconds_per_million_rows: 0.0,
                exponent: 1.0,
            },
        );
        let refiner = ImpactRefiner::new(config);

        let refined = refiner.refine(&diagnostic(RuleCode::Ban003, Severity::Medium), Some(10));
        assert_eq!(refined.estimated_lock_seconds, Some(2.0));
        assert_eq!(refined.severity, Severity::High);
    }

    #[test]
    fn never_downgrades() {
        let refiner = ImpactRefiner::default();
        for code in RuleCode::ALL {
            for severity in Severity::DESCENDING {
                for rows in [0, 1, 1_000, 10_000_000, u64::MAX] {
                    let refined = refiner.refine(&diagnostic(code, severity), Some(rows));
                    assert!(refined.severity >= severity);
                    assert_eq!(refined.code, code);
                }
            }
        }
    }
}
