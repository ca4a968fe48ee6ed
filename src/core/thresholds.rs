use crate::core::metrics::RunSummary;
use crate::utils::error::Result;
use crate::utils::validation::{validate_range, Validate};
use serde::{Deserialize, Serialize};

/// Exit code when the run completed but a threshold was crossed
pub const THRESHOLDS_CROSSED_EXIT_CODE: i32 = 99;

/// Pass/fail criteria evaluated against the finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Overall fraction of passing checks, 0.0..=1.0
    pub min_checks_pass_rate: Option<f64>,
    pub max_p95_ms: Option<f64>,
    /// Fraction of requests that got no response at all
    pub max_transport_error_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBreach {
    pub name: &'static str,
    pub limit: f64,
    pub actual: f64,
}

impl std::fmt::Display for ThresholdBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: limit {:.4}, actual {:.4}", self.name, self.limit, self.actual)
    }
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.min_checks_pass_rate.is_none()
            && self.max_p95_ms.is_none()
            && self.max_transport_error_rate.is_none()
    }

    pub fn evaluate(&self, summary: &RunSummary) -> Vec<ThresholdBreach> {
        let mut breaches = Vec::new();

        if let Some(limit) = self.min_checks_pass_rate {
            let actual = summary.checks_pass_rate();
            if actual < limit {
                breaches.push(ThresholdBreach {
                    name: "checks_pass_rate",
                    limit,
                    actual,
                });
            }
        }

        if let Some(limit) = self.max_p95_ms {
            let actual = summary.latency.p95_ms;
            if actual > limit {
                breaches.push(ThresholdBreach {
                    name: "latency_p95_ms",
                    limit,
                    actual,
                });
            }
        }

        if let Some(limit) = self.max_transport_error_rate {
            let actual = summary.transport_error_rate();
            if actual > limit {
                breaches.push(ThresholdBreach {
                    name: "transport_error_rate",
                    limit,
                    actual,
                });
            }
        }

        breaches
    }
}

impl Validate for Thresholds {
    fn validate(&self) -> Result<()> {
        if let Some(rate) = self.min_checks_pass_rate {
            validate_range("thresholds.min_checks_pass_rate", rate, 0.0, 1.0)?;
        }
        if let Some(p95) = self.max_p95_ms {
            validate_range("thresholds.max_p95_ms", p95, 0.0, f64::MAX)?;
        }
        if let Some(rate) = self.max_transport_error_rate {
            validate_range("thresholds.max_transport_error_rate", rate, 0.0, 1.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::{CheckSummary, LatencyStats};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn summary(check_passes: u64, check_fails: u64, p95_ms: f64, transport_errors: u64) -> RunSummary {
        RunSummary {
            scenario: "wallet_operation".to_string(),
            target_url: "http://localhost".to_string(),
            started_at: Utc::now(),
            elapsed_secs: 1.0,
            vus: 1,
            rps_limit: None,
            requests: 100,
            transport_errors,
            interrupted_iterations: 0,
            failed_iterations: check_fails,
            requests_per_second: 100.0,
            latency: LatencyStats {
                p95_ms,
                ..LatencyStats::default()
            },
            status_codes: BTreeMap::new(),
            checks: vec![CheckSummary {
                name: "status is 200".to_string(),
                passes: check_passes,
                fails: check_fails,
            }],
            errors: BTreeMap::new(),
            resources: None,
            balance: None,
        }
    }

    #[test]
    fn test_no_thresholds_never_breach() {
        let thresholds = Thresholds::default();
        assert!(thresholds.is_empty());
        assert!(thresholds.evaluate(&summary(0, 100, 9999.0, 100)).is_empty());
    }

    #[test]
    fn test_each_threshold_breaches() {
        let thresholds = Thresholds {
            min_checks_pass_rate: Some(0.99),
            max_p95_ms: Some(200.0),
            max_transport_error_rate: Some(0.01),
        };

        assert!(thresholds.evaluate(&summary(100, 0, 150.0, 0)).is_empty());

        let breaches = thresholds.evaluate(&summary(90, 10, 250.0, 5));
        let names: Vec<&str> = breaches.iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            vec!["checks_pass_rate", "latency_p95_ms", "transport_error_rate"]
        );
        assert_eq!(breaches[0].actual, 0.9);
    }

    #[test]
    fn test_validation_rejects_out_of_range_rates() {
        let thresholds = Thresholds {
            min_checks_pass_rate: Some(1.5),
            ..Thresholds::default()
        };
        assert!(thresholds.validate().is_err());
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_non_finite_limits() {
        for thresholds in [
            Thresholds {
                min_checks_pass_rate: Some(f64::NAN),
                ..Thresholds::default()
            },
            Thresholds {
                max_p95_ms: Some(f64::NAN),
                ..Thresholds::default()
            },
            Thresholds {
                max_p95_ms: Some(f64::INFINITY),
                ..Thresholds::default()
            },
            Thresholds {
                max_transport_error_rate: Some(f64::NAN),
                ..Thresholds::default()
            },
        ] {
            assert!(thresholds.validate().is_err(), "{:?}", thresholds);
        }
    }
}
