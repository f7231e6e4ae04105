//! `.http` reproduction file for failed cases

use crate::model::{RequestSnapshot, TestResult};

/// Render every failed result as a request block in `.http` format.
#[must_use]
pub fn to_http_file(results: &[TestResult]) -> String {
    let failed: Vec<&TestResult> = results.iter().filter(|r| !r.success).collect();
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} failures)",
        failed.len()
    ));
    lines.push(String::new());

    for (idx, result) in failed.iter().enumerate() {
        let outcome = match (&result.error, result.status_code) {
            (Some(error), _) => error.to_string(),
            (None, Some(status)) => format!(
                "expected {} got {status}",
                result.test_case.expected_status
            ),
            (None, None) => "no response".to_string(),
        };
        lines.push(format!("### [{idx}] {} - {outcome}", result.test_case.name));
        lines.push(request_to_http(&result.request));
        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Render a single request.
#[must_use]
pub fn request_to_http(request: &RequestSnapshot) -> String {
    let mut lines = vec![format!("{} {}", request.method, request.url)];

    for (key, value) in &request.headers {
        if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
            lines.push(format!("{key}: {value}"));
        }
    }

    if let Some(body) = &request.body {
        lines.push(String::new());
        lines.push(body.clone());
    }

    lines.join("\n")
}
