use crate::core::metrics::RunSummary;
use crate::core::thresholds::ThresholdBreach;
use crate::core::wallet_api::{format_cents, ReconciliationStatus};
use crate::core::Storage;
use crate::utils::error::Result;
use std::fmt::Write;

fn pct(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// End-of-run summary in the style load testers usually print.
pub fn render_text(summary: &RunSummary, breaches: &[ThresholdBreach]) -> String {
    let mut out = String::new();

    // 寫入 String 不會失敗
    let _ = writeln!(out, "\n  scenario: {} ({} VUs)", summary.scenario, summary.vus);
    let _ = writeln!(out, "  target:   POST {}", summary.target_url);
    let _ = writeln!(
        out,
        "  started:  {}  elapsed: {:.1}s  rps cap: {}\n",
        summary.started_at.to_rfc3339(),
        summary.elapsed_secs,
        summary
            .rps_limit
            .map(|r| r.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    for check in &summary.checks {
        let mark = if check.fails == 0 && check.passes > 0 { '✓' } else { '✗' };
        let _ = writeln!(out, "     {} {}", mark, check.name);
        if check.fails > 0 {
            let _ = writeln!(
                out,
                "      ↳  {} — ✓ {} / ✗ {}",
                pct(check.pass_rate()),
                check.passes,
                check.fails
            );
        }
    }

    let passes: u64 = summary.checks.iter().map(|c| c.passes).sum();
    let fails: u64 = summary.checks.iter().map(|c| c.fails).sum();
    let _ = writeln!(
        out,
        "\n     checks.....................: {}  ✓ {}  ✗ {}",
        pct(summary.checks_pass_rate()),
        passes,
        fails
    );

    let l = &summary.latency;
    let _ = writeln!(
        out,
        "     http_req_duration..........: avg={:.2}ms min={:.2}ms med={:.2}ms p(90)={:.2}ms p(95)={:.2}ms p(99)={:.2}ms max={:.2}ms",
        l.avg_ms, l.min_ms, l.med_ms, l.p90_ms, l.p95_ms, l.p99_ms, l.max_ms
    );
    let _ = writeln!(
        out,
        "     http_reqs..................: {}  {:.2}/s",
        summary.requests, summary.requests_per_second
    );
    let _ = writeln!(
        out,
        "     transport_errors...........: {}  {}",
        summary.transport_errors,
        pct(summary.transport_error_rate())
    );
    if summary.interrupted_iterations > 0 {
        let _ = writeln!(
            out,
            "     interrupted_iterations.....: {}",
            summary.interrupted_iterations
        );
    }

    let statuses: Vec<String> = summary
        .status_codes
        .iter()
        .map(|(status, count)| match status {
            0 => format!("no response={}", count),
            s => format!("{}={}", s, count),
        })
        .collect();
    if !statuses.is_empty() {
        let _ = writeln!(out, "     status_codes...............: {}", statuses.join(" "));
    }

    for (error, count) in &summary.errors {
        let _ = writeln!(out, "     error ({}x): {}", count, error);
    }

    if let Some(resources) = &summary.resources {
        let _ = writeln!(
            out,
            "     client resources...........: cpu avg={:.1}% peak={:.1}% memory peak={}MB",
            resources.average_cpu_percent, resources.peak_cpu_percent, resources.peak_memory_mb
        );
    }

    if let Some(balance) = &summary.balance {
        let verdict = match balance.status {
            ReconciliationStatus::Consistent => "✓ consistent",
            ReconciliationStatus::Inconclusive => "? inconclusive",
            ReconciliationStatus::Mismatch => "✗ MISMATCH",
        };
        let _ = writeln!(
            out,
            "\n     balance {}: {} -> {} (expected Δ {}, observed Δ {}) {}",
            balance.wallet_id,
            format_cents(balance.initial_cents),
            format_cents(balance.final_cents),
            format_cents(balance.expected_delta_cents),
            format_cents(balance.observed_delta_cents),
            verdict
        );
    }

    if !breaches.is_empty() {
        let _ = writeln!(out, "\n     thresholds crossed:");
        for breach in breaches {
            let _ = writeln!(out, "       ✗ {}", breach);
        }
    }

    out
}

/// Writes the summary as pretty JSON and returns the path written.
pub async fn export_json<S: Storage>(storage: &S, path: &str, summary: &RunSummary) -> Result<String> {
    let json = serde_json::to_vec_pretty(summary)?;
    tracing::debug!("Writing summary ({} bytes) to {}", json.len(), path);
    storage.write_file(path, &json).await?;
    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::{CheckSummary, LatencyStats};
    use crate::core::wallet_api::BalanceReconciliation;
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn summary() -> RunSummary {
        let mut status_codes = BTreeMap::new();
        status_codes.insert(200, 8);
        status_codes.insert(500, 2);
        RunSummary {
            scenario: "wallet_operation".to_string(),
            target_url: "http://0.0.0.0:8001/api/v1/wallets/abc/operation".to_string(),
            started_at: Utc::now(),
            elapsed_secs: 1.0,
            vus: 2,
            rps_limit: Some(10),
            requests: 10,
            transport_errors: 0,
            interrupted_iterations: 0,
            failed_iterations: 2,
            requests_per_second: 10.0,
            latency: LatencyStats::default(),
            status_codes,
            checks: vec![
                CheckSummary {
                    name: "status is 200".to_string(),
                    passes: 8,
                    fails: 2,
                },
                CheckSummary {
                    name: "response body contains new_balance".to_string(),
                    passes: 10,
                    fails: 0,
                },
            ],
            errors: BTreeMap::new(),
            resources: None,
            balance: None,
        }
    }

    #[test]
    fn test_render_marks_checks() {
        let text = render_text(&summary(), &[]);
        assert!(text.contains("✗ status is 200"));
        assert!(text.contains("↳  80.00% — ✓ 8 / ✗ 2"));
        assert!(text.contains("✓ response body contains new_balance"));
        assert!(text.contains("http_reqs..................: 10  10.00/s"));
        assert!(text.contains("200=8 500=2"));
        assert!(!text.contains("thresholds crossed"));
    }

    #[test]
    fn test_render_balance_and_breaches() {
        let mut s = summary();
        s.balance = Some(BalanceReconciliation {
            wallet_id: "abc".to_string(),
            initial_cents: 0,
            final_cents: 700,
            expected_delta_cents: 800,
            observed_delta_cents: 700,
            uncertain_requests: 0,
            status: ReconciliationStatus::Mismatch,
        });
        let breach = ThresholdBreach {
            name: "checks_pass_rate",
            limit: 0.99,
            actual: 0.9,
        };
        let text = render_text(&s, &[breach]);
        assert!(text.contains("0.00 -> 7.00"));
        assert!(text.contains("MISMATCH"));
        assert!(text.contains("thresholds crossed"));
        assert!(text.contains("checks_pass_rate"));
    }

    #[tokio::test]
    async fn test_export_json() {
        let storage = MockStorage::default();
        let path = export_json(&storage, "summary.json", &summary()).await.unwrap();
        assert_eq!(path, "summary.json");

        let files = storage.files.lock().await;
        let written: RunSummary = serde_json::from_slice(files.get("summary.json").unwrap()).unwrap();
        assert_eq!(written.requests, 10);
        assert_eq!(written.status_codes.get(&500), Some(&2));
    }
}
