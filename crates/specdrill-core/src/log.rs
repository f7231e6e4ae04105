//! Per-case result logging
//!
//! The executor hands one [`ExecutionRecord`] per executed case to a
//! [`ResultLogger`]. Loggers are fire-and-forget: they cannot fail and must
//! not block execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flat record of one executed case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub name: String,
    pub endpoint: String,
    pub method: String,
    pub path_params: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub request_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub trait ResultLogger: Send + Sync {
    fn log(&self, record: &ExecutionRecord);
}

impl<T: ResultLogger + ?Sized> ResultLogger for std::sync::Arc<T> {
    fn log(&self, record: &ExecutionRecord) {
        (**self).log(record);
    }
}

impl<T: ResultLogger + ?Sized> ResultLogger for Box<T> {
    fn log(&self, record: &ExecutionRecord) {
        (**self).log(record);
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl ResultLogger for NoopLogger {
    fn log(&self, _record: &ExecutionRecord) {}
}

/// Emits one `tracing` event per record: `error` when the case hit a
/// transport or construction error, `info` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ResultLogger for TracingLogger {
    fn log(&self, record: &ExecutionRecord) {
        let path_params = map_field(&record.path_params);
        let query_params = map_field(&record.query_params);
        let request_headers = map_field(&record.request_headers);
        let request_body = record.request_body.as_deref().unwrap_or("");

        match &record.error {
            Some(error) => tracing::error!(
                name = %record.name,
                endpoint = %record.endpoint,
                method = %record.method,
                path_params = %path_params,
                query_params = %query_params,
                request_headers = %request_headers,
                request_body,
                error = %error,
                "Test case failed"
            ),
            None => tracing::info!(
                name = %record.name,
                endpoint = %record.endpoint,
                method = %record.method,
                path_params = %path_params,
                query_params = %query_params,
                request_headers = %request_headers,
                request_body,
                response_status = record.response_status.unwrap_or_default(),
                response_body = record.response_body.as_deref().unwrap_or(""),
                "Test case executed"
            ),
        }
    }
}

fn map_field(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string(map).unwrap_or_default()
}
