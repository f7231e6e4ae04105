//! specdrill-core: document model, test model, and test generation
//!
//! This crate turns a typed OpenAPI document into an ordered suite of test
//! cases and defines the result types an executor folds them into.

pub mod config;
pub mod document;
pub mod dump;
pub mod generate;
pub mod log;
pub mod model;
pub mod reproduce;

pub use config::{Config, ConfigError};
pub use document::{Document, HttpMethod, Operation, PathItem};
pub use dump::{DumpError, DumpIndex};
pub use generate::{StatusPolicy, build_suite, generate_test_cases};
pub use log::{ExecutionRecord, NoopLogger, ResultLogger, TracingLogger};
pub use model::{
    ExecutionError, FailureKind, RequestSnapshot, TestCase, TestResult, TestSuite, TestSummary,
};
pub use reproduce::to_http_file;
