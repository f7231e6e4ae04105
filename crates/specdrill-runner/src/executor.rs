//! Test execution: one HTTP request per case, folded into a summary
//!
//! Every case is sent exactly once. Transport and request-construction errors
//! are recorded on that case's result and never stop the suite.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};

use specdrill_core::config::DEFAULT_TIMEOUT_SECS;
use specdrill_core::model::status_mismatch_message;
use specdrill_core::{
    ExecutionError, ExecutionRecord, HttpMethod, NoopLogger, RequestSnapshot, ResultLogger,
    TestCase, TestResult, TestSuite, TestSummary,
};

/// Applied to every request, whatever the method.
const JSON: &str = "application/json";

/// The only placeholder substituted in path templates.
const ID_PLACEHOLDER: &str = "{id}";
const ID_VALUE: &str = "1";

/// Replace every `{id}` with `1`. Other placeholders are left as-is.
#[must_use]
pub fn substitute_path_params(path: &str) -> String {
    path.replace(ID_PLACEHOLDER, ID_VALUE)
}

/// Join with exactly one slash between base and path.
#[must_use]
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fixed body sent with POST, PUT and PATCH when the case carries none.
/// Not derived from any schema.
#[must_use]
pub fn placeholder_body() -> serde_json::Value {
    serde_json::json!({"name": "test"})
}

fn request_body(test_case: &TestCase) -> Option<serde_json::Value> {
    test_case
        .method
        .has_body()
        .then(|| test_case.request_body.clone().unwrap_or_else(placeholder_body))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (ACCEPT.to_string(), JSON.to_string()),
        (CONTENT_TYPE.to_string(), JSON.to_string()),
    ])
}

/// A response that arrived and was fully read.
struct Exchange {
    status: u16,
    body: String,
    is_valid_json: bool,
}

/// A request that never produced a readable response.
struct Aborted {
    error: ExecutionError,
    status: Option<u16>,
}

impl Aborted {
    fn construction(message: impl Into<String>) -> Self {
        Self {
            error: ExecutionError::RequestConstruction {
                message: message.into(),
            },
            status: None,
        }
    }

    fn transport(err: &reqwest::Error, status: Option<u16>) -> Self {
        Self {
            error: ExecutionError::Transport {
                message: crate::error_chain(err),
                timeout: err.is_timeout(),
            },
            status,
        }
    }
}

/// Runs test cases against a live service.
pub struct Executor {
    client: reqwest::blocking::Client,
    logger: Box<dyn ResultLogger>,
    workers: usize,
}

impl Executor {
    /// Executor with the default 30 second timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new() -> Result<Self, ExecutorError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ExecutorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Client(e.to_string()))?;
        Ok(Self {
            client,
            logger: Box::new(NoopLogger),
            workers: 1,
        })
    }

    #[must_use]
    pub fn with_logger(mut self, logger: impl ResultLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Number of concurrent workers. 1 (the default) runs cases in order on
    /// the calling thread.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Send one case and record the outcome. Never fails: errors land on the
    /// returned result.
    pub fn execute_test(&self, test_case: &TestCase, base_url: &str) -> TestResult {
        let start = Instant::now();
        let url = join_url(base_url, &substitute_path_params(&test_case.path));
        let mut request = RequestSnapshot {
            method: test_case.method,
            url,
            headers: default_headers(),
            body: None,
        };

        let outcome = self.send(test_case, &mut request);
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(exchange) => {
                let success = exchange.status == test_case.expected_status;
                TestResult {
                    test_case: test_case.clone(),
                    success,
                    status_code: Some(exchange.status),
                    duration_ms,
                    error: None,
                    message: (!success).then(|| {
                        status_mismatch_message(test_case.expected_status, exchange.status)
                    }),
                    request,
                    response_body: Some(exchange.body),
                    is_valid_json: exchange.is_valid_json,
                }
            }
            Err(aborted) => TestResult {
                test_case: test_case.clone(),
                success: false,
                status_code: aborted.status,
                duration_ms,
                message: Some(aborted.error.to_string()),
                error: Some(aborted.error),
                request,
                response_body: None,
                is_valid_json: false,
            },
        };

        self.logger.log(&execution_record(&result));
        result
    }

    /// Execute every case of the suite. `results[i]` always belongs to
    /// `suite.test_cases[i]`.
    pub fn execute_suite(&self, suite: &TestSuite) -> TestSummary {
        let start = Instant::now();
        tracing::info!(
            suite = %suite.name,
            base_url = %suite.base_url,
            cases = suite.test_cases.len(),
            workers = self.workers,
            "executing suite"
        );

        let results = if self.workers > 1 && suite.test_cases.len() > 1 {
            self.execute_pooled(suite)
        } else {
            suite
                .test_cases
                .iter()
                .map(|case| self.execute_test(case, &suite.base_url))
                .collect()
        };

        let summary = TestSummary::from_results(results, elapsed_ms(start));
        tracing::info!(
            total = summary.total_tests,
            passed = summary.passed_tests,
            failed = summary.failed_tests,
            duration_ms = summary.duration_ms,
            "suite finished"
        );
        summary
    }

    /// Workers pull the next index from a shared counter and write into a
    /// pre-sized slot, so completion order does not affect result order.
    fn execute_pooled(&self, suite: &TestSuite) -> Vec<TestResult> {
        let cases = &suite.test_cases;
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<TestResult>>> = Mutex::new(vec![None; cases.len()]);

        std::thread::scope(|scope| {
            for _ in 0..self.workers.min(cases.len()) {
                scope.spawn(|| {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(case) = cases.get(index) else {
                            break;
                        };
                        let result = self.execute_test(case, &suite.base_url);
                        slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(result);
                    }
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }

    fn send(&self, test_case: &TestCase, request: &mut RequestSnapshot) -> Result<Exchange, Aborted> {
        let mut builder = self
            .client
            .request(to_reqwest_method(test_case.method), request.url.as_str())
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);

        if let Some(body) = request_body(test_case) {
            let bytes = serde_json::to_vec(&body)
                .map_err(|e| Aborted::construction(format!("failed to encode body: {e}")))?;
            request.body = Some(String::from_utf8_lossy(&bytes).into_owned());
            builder = builder.body(bytes);
        }

        let built = builder
            .build()
            .map_err(|e| Aborted::construction(crate::error_chain(&e)))?;

        let response = self
            .client
            .execute(built)
            .map_err(|e| Aborted::transport(&e, None))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|e| Aborted::transport(&e, Some(status)))?;

        Ok(Exchange {
            status,
            is_valid_json: serde_json::from_slice::<serde_json::Value>(&bytes).is_ok(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn execution_record(result: &TestResult) -> ExecutionRecord {
    let path_params = if result.test_case.path.contains(ID_PLACEHOLDER) {
        BTreeMap::from([("id".to_string(), ID_VALUE.to_string())])
    } else {
        BTreeMap::new()
    };
    let query_params: BTreeMap<String, String> = reqwest::Url::parse(&result.request.url)
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default();

    ExecutionRecord {
        name: result.test_case.name.clone(),
        endpoint: result.request.url.clone(),
        method: result.test_case.method.to_string(),
        path_params,
        query_params,
        request_headers: result.request.headers.clone(),
        request_body: result.request.body.clone(),
        response_status: result.status_code,
        response_body: result.response_body.clone(),
        error: result.error.as_ref().map(ToString::to_string),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn join_normalizes_slashes() {
        assert_eq!(join_url("http://api.test", "widgets"), "http://api.test/widgets");
        assert_eq!(join_url("http://api.test/", "/widgets"), "http://api.test/widgets");
        assert_eq!(join_url("http://api.test/", "widgets"), "http://api.test/widgets");
        assert_eq!(join_url("http://api.test", "/widgets"), "http://api.test/widgets");
        assert_eq!(join_url("http://api.test/v1", "/widgets"), "http://api.test/v1/widgets");
    }

    #[test]
    fn substitutes_only_id() {
        assert_eq!(substitute_path_params("/widgets/{id}"), "/widgets/1");
        assert_eq!(
            substitute_path_params("/a/{id}/b/{id}"),
            "/a/1/b/1"
        );
        assert_eq!(
            substitute_path_params("/users/{userId}"),
            "/users/{userId}"
        );
        assert_eq!(substitute_path_params("/health"), "/health");
    }

    #[test]
    fn body_only_for_post_put_patch() {
        for method in HttpMethod::ALL {
            let case = TestCase::new(method, "/w", 200);
            assert_eq!(request_body(&case).is_some(), method.has_body(), "{method}");
        }
        let case = TestCase::new(HttpMethod::Put, "/w", 200);
        assert_eq!(request_body(&case), Some(serde_json::json!({"name": "test"})));
    }

    #[test]
    fn case_body_replaces_placeholder() {
        let case = TestCase::new(HttpMethod::Post, "/w", 200)
            .with_request_body(serde_json::json!({"sku": "A-1"}));
        assert_eq!(request_body(&case), Some(serde_json::json!({"sku": "A-1"})));

        let get = TestCase::new(HttpMethod::Get, "/w", 200)
            .with_request_body(serde_json::json!({"sku": "A-1"}));
        assert_eq!(request_body(&get), None);
    }

    #[test]
    fn method_mapping_is_total() {
        for method in HttpMethod::ALL {
            assert_eq!(to_reqwest_method(method).as_str(), method.as_str());
        }
    }

    #[test]
    fn record_reports_id_param_and_query() {
        let case = TestCase::new(HttpMethod::Get, "/widgets/{id}?expand=parts", 200);
        let result = TestResult {
            test_case: case,
            success: true,
            status_code: Some(200),
            duration_ms: 1,
            error: None,
            message: None,
            request: RequestSnapshot {
                method: HttpMethod::Get,
                url: "http://api.test/widgets/1?expand=parts".into(),
                headers: default_headers(),
                body: None,
            },
            response_body: Some("{}".into()),
            is_valid_json: true,
        };
        let record = execution_record(&result);
        assert_eq!(record.path_params.get("id").map(String::as_str), Some("1"));
        assert_eq!(
            record.query_params.get("expand").map(String::as_str),
            Some("parts")
        );
        assert_eq!(record.request_headers["accept"], "application/json");
        assert_eq!(record.response_status, Some(200));
    }

    proptest! {
        #[test]
        fn join_has_exactly_one_separator(
            host in "[a-z]{1,12}",
            segment in "[a-z0-9]{1,12}",
            base_slashes in 0usize..3,
            path_slashes in 0usize..3,
        ) {
            let base = format!("http://{host}.test{}", "/".repeat(base_slashes));
            let path = format!("{}{segment}", "/".repeat(path_slashes));
            let joined = join_url(&base, &path);
            prop_assert_eq!(joined, format!("http://{host}.test/{segment}"));
        }

        #[test]
        fn join_is_idempotent_under_extra_slash(
            segment in "[a-z0-9/]{0,20}",
        ) {
            let base = "http://api.test";
            prop_assert_eq!(
                join_url(base, &segment),
                join_url(&format!("{base}/"), &format!("/{segment}"))
            );
        }

        #[test]
        fn id_substitution_leaves_nothing_behind(
            parts in proptest::collection::vec("[a-z]{0,6}", 1..5),
        ) {
            let template = parts.join("/{id}/");
            let substituted = substitute_path_params(&template);
            prop_assert!(!substituted.contains(ID_PLACEHOLDER));
            prop_assert_eq!(substituted, parts.join("/1/"));
        }

        #[test]
        fn paths_without_id_are_verbatim(path in "/[a-z{}]{0,20}") {
            prop_assume!(!path.contains(ID_PLACEHOLDER));
            prop_assert_eq!(substitute_path_params(&path), path);
        }
    }
}
