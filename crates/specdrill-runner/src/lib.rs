//! specdrill-runner: load OpenAPI documents and execute generated suites

pub mod executor;
pub mod loader;

pub use executor::{Executor, ExecutorError, join_url, substitute_path_params};
pub use loader::{DocumentFormat, Fetch, HttpFetcher, LoadError, Loader, Location, ParseError};

/// Render an error with its full source chain, `outer: inner: root`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
