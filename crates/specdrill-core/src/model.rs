//! Test model: cases generated from a document and the results of running them

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::HttpMethod;

/// A concrete request to send and the status it is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    /// "METHOD /path/template"
    pub name: String,
    pub method: HttpMethod,
    /// Path template, placeholders unsubstituted (e.g. `/users/{id}`)
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<serde_json::Value>,
    pub expected_status: u16,
    #[serde(default)]
    pub description: String,
}

impl TestCase {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>, expected_status: u16) -> Self {
        let path = path.into();
        Self {
            name: format!("{method} {path}"),
            method,
            path,
            request_body: None,
            expected_status,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_request_body(mut self, body: serde_json::Value) -> Self {
        self.request_body = Some(body);
        self
    }
}

/// Ordered cases plus the base URL to run them against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestSuite {
    pub name: String,
    pub base_url: String,
    pub test_cases: Vec<TestCase>,
}

/// Case-local execution error. Never aborts the suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// Invalid method, URL, or body at request-build time
    #[error("failed to build request: {message}")]
    RequestConstruction { message: String },
    /// Network failure or timeout while sending or reading
    #[error("{}: {message}", transport_prefix(.timeout))]
    Transport { message: String, timeout: bool },
}

fn transport_prefix(timeout: &bool) -> &'static str {
    if *timeout {
        "request timed out"
    } else {
        "request failed"
    }
}

/// Why a case did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RequestConstruction,
    Transport,
    StatusMismatch,
}

impl FailureKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RequestConstruction => "request error",
            Self::Transport => "transport error",
            Self::StatusMismatch => "status mismatch",
        }
    }
}

/// Request as actually sent, for reporting and dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Outcome of executing one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    pub test_case: TestCase,
    pub success: bool,
    /// Observed status; absent when no response arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// Whether the response body parsed as JSON. Informational only.
    #[serde(default)]
    pub is_valid_json: bool,
}

impl TestResult {
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.error {
            Some(ExecutionError::RequestConstruction { .. }) => {
                Some(FailureKind::RequestConstruction)
            }
            Some(ExecutionError::Transport { .. }) => Some(FailureKind::Transport),
            None if self.success => None,
            None => Some(FailureKind::StatusMismatch),
        }
    }
}

/// Aggregate over one execution pass. `total == passed + failed == results.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestSummary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub duration_ms: u64,
    /// Same order as the suite's test cases
    pub results: Vec<TestResult>,
}

impl TestSummary {
    /// Fold results into a summary, keeping their order.
    #[must_use]
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let passed_tests = results.iter().filter(|r| r.success).count();
        Self {
            total_tests: results.len(),
            passed_tests,
            failed_tests: results.len() - passed_tests,
            duration_ms,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }

    /// Count failures of one kind.
    #[must_use]
    pub fn count_kind(&self, kind: FailureKind) -> usize {
        self.results
            .iter()
            .filter(|r| r.failure_kind() == Some(kind))
            .count()
    }
}

/// Message attached to a result whose status did not match.
#[must_use]
pub fn status_mismatch_message(expected: u16, actual: u16) -> String {
    format!("Expected status {expected} but got {actual}")
}

/// JSON Schema for the summary report.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(TestSummary);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
