//! Test case generation: one case per declared (path, method) pair

use serde::{Deserialize, Serialize};

use crate::document::{Document, HttpMethod, Operation};
use crate::model::{TestCase, TestSuite};

/// Status every generated case expects unless told otherwise.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// How the expected status is derived from an operation's declared responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Expect 200 whatever the declared codes are. Asserts only that some
    /// success occurred, so a declared 201 still expects 200.
    #[default]
    AnySuccess,
    /// Expect the first declared numeric 2xx code, 200 if none.
    Declared,
}

impl StatusPolicy {
    #[must_use]
    pub fn expected_status(self, operation: &Operation) -> u16 {
        match self {
            Self::AnySuccess => DEFAULT_EXPECTED_STATUS,
            Self::Declared => operation
                .responses
                .keys()
                .filter(|code| code.starts_with('2'))
                .find_map(|code| code.parse::<u16>().ok())
                .unwrap_or(DEFAULT_EXPECTED_STATUS),
        }
    }
}

/// Build the case for one operation. The path template is kept verbatim and
/// no request body is synthesized, even when the operation declares one.
#[must_use]
pub fn test_case(
    method: HttpMethod,
    path: &str,
    operation: &Operation,
    policy: StatusPolicy,
) -> TestCase {
    TestCase::new(method, path, policy.expected_status(operation))
        .with_description(operation.summary.clone())
}

/// Walk paths in sorted order and methods in [`HttpMethod::ALL`] order.
#[must_use]
pub fn generate_test_cases(document: &Document, policy: StatusPolicy) -> Vec<TestCase> {
    document
        .paths
        .iter()
        .flat_map(|(path, item)| {
            item.operations()
                .map(move |(method, op)| test_case(method, path, op, policy))
        })
        .collect()
}

/// Assemble a suite named after the document title.
#[must_use]
pub fn build_suite(
    document: &Document,
    base_url: impl Into<String>,
    policy: StatusPolicy,
) -> TestSuite {
    let test_cases = generate_test_cases(document, policy);
    tracing::debug!(
        title = %document.info.title,
        cases = test_cases.len(),
        "generated test cases"
    );
    TestSuite {
        name: suite_name(document),
        base_url: base_url.into(),
        test_cases,
    }
}

fn suite_name(document: &Document) -> String {
    let title = document.info.title.trim();
    match (title.is_empty(), document.info.version.trim()) {
        (true, _) => "Untitled API".to_string(),
        (false, "") => title.to_string(),
        (false, version) => format!("{title} v{version}"),
    }
}
