//! Terminal rendering of suites and summaries

use specdrill_core::{FailureKind, TestResult, TestSuite, TestSummary};

const PASS: &str = "✓";
const FAIL: &str = "✗";

/// Cases that would be sent, for `--dry-run`.
pub fn plan(suite: &TestSuite) -> String {
    let mut lines = vec![
        format!("Dry run: {}", suite.name),
        format!("  Base URL: {}", suite.base_url),
        format!("  Cases:    {}", suite.test_cases.len()),
        String::new(),
    ];
    for case in &suite.test_cases {
        let mut line = format!("  {} -> {}", case.name, case.expected_status);
        if !case.description.is_empty() {
            line.push_str(&format!("  ({})", case.description));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn summary(suite: &TestSuite, summary: &TestSummary) -> String {
    let mut lines = vec![
        suite.name.clone(),
        format!("  Base URL: {}", suite.base_url),
        String::new(),
    ];

    for result in &summary.results {
        lines.extend(result_lines(result));
    }

    let verdict = if summary.all_passed() { "PASS" } else { "FAIL" };
    lines.push(String::new());
    lines.push(format!(
        "{verdict}: {} total, {} passed, {} failed ({}ms)",
        summary.total_tests, summary.passed_tests, summary.failed_tests, summary.duration_ms
    ));

    let breakdown: Vec<String> = [
        FailureKind::StatusMismatch,
        FailureKind::Transport,
        FailureKind::RequestConstruction,
    ]
    .into_iter()
    .filter_map(|kind| {
        let count = summary.count_kind(kind);
        (count > 0).then(|| format!("{count} {}", kind.label()))
    })
    .collect();
    if !breakdown.is_empty() {
        lines.push(format!("  Failures: {}", breakdown.join(", ")));
    }

    lines.join("\n")
}

fn result_lines(result: &TestResult) -> Vec<String> {
    let icon = if result.success { PASS } else { FAIL };
    let status = result
        .status_code
        .map_or_else(|| "---".to_string(), |s| s.to_string());
    let mut lines = vec![format!(
        "  {icon} {} -> {status} ({}ms)",
        result.test_case.name, result.duration_ms
    )];

    // Transport and construction errors are kept apart from status mismatches
    if let Some(error) = &result.error {
        lines.push(format!("      Error: {error}"));
    } else if let Some(message) = &result.message {
        lines.push(format!("      {message}"));
    }
    lines
}
