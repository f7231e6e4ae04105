//! Document loading: resolve the base URL, fetch, parse, generate the suite

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use specdrill_core::{Document, HttpMethod, StatusPolicy, TestSuite, build_suite};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a document lives. Decided by prefix, never by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    /// # Errors
    ///
    /// Returns [`LoadError::Configuration`] for an `http(s)://` location that
    /// is not a valid URL.
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).map_err(|e| {
                LoadError::Configuration(format!("invalid spec URL '{raw}': {e}"))
            })?;
            Ok(Self::Remote(url))
        } else {
            Ok(Self::Local(PathBuf::from(raw)))
        }
    }

    /// Scheme + host (+ port) of a remote location, path and query dropped.
    #[must_use]
    pub fn derived_base_url(&self) -> Option<String> {
        match self {
            Self::Remote(url) => Some(url.origin().ascii_serialization()),
            Self::Local(_) => None,
        }
    }

    fn extension(&self) -> Option<String> {
        let ext = match self {
            Self::Remote(url) => Path::new(url.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_string),
            Self::Local(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_string),
        };
        ext.map(|e| e.to_ascii_lowercase())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retrieves raw document bytes, local or remote alike.
pub trait Fetch {
    /// # Errors
    ///
    /// Returns [`LoadError::Fetch`] or [`LoadError::FetchStatus`].
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, LoadError>;
}

/// Reads local files from disk and remote documents over HTTP.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| LoadError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, LoadError> {
        match location {
            Location::Local(path) => std::fs::read(path).map_err(|e| LoadError::Fetch {
                location: location.to_string(),
                message: e.to_string(),
            }),
            Location::Remote(url) => {
                let fetch_error = |e: reqwest::Error| LoadError::Fetch {
                    location: location.to_string(),
                    message: crate::error_chain(&e),
                };
                let response = self.client.get(url.clone()).send().map_err(fetch_error)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(LoadError::FetchStatus {
                        location: location.to_string(),
                        status: status.as_u16(),
                    });
                }
                let bytes = response.bytes().map_err(fetch_error)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Serialization of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Extension first (`.json`, `.yaml`, `.yml`), then the first
    /// non-blank byte: `{` means JSON, anything else YAML.
    #[must_use]
    pub fn detect(extension: Option<&str>, content: &[u8]) -> Self {
        match extension {
            Some("json") => Self::Json,
            Some("yaml" | "yml") => Self::Yaml,
            _ => match content.iter().find(|b| !b.is_ascii_whitespace()) {
                Some(b'{') => Self::Json,
                _ => Self::Yaml,
            },
        }
    }
}

/// Parse and structurally check an OpenAPI 3.x document.
///
/// # Errors
///
/// Returns [`ParseError`] for malformed JSON/YAML or a tree that is not an
/// OpenAPI 3.x document.
pub fn parse_document(content: &[u8], format: DocumentFormat) -> Result<Document, ParseError> {
    let mut raw: serde_json::Value = match format {
        DocumentFormat::Json => serde_json::from_slice(content)?,
        DocumentFormat::Yaml => serde_yml::from_slice(content)?,
    };
    // Unquoted `openapi: 3.10` arrives from YAML as a number; take the scalar
    // text so trailing zeros survive.
    if let Some(version @ serde_json::Value::Number(_)) = raw.get_mut("openapi") {
        let text = yaml_scalar_text(content, "openapi").unwrap_or_else(|| version.to_string());
        *version = serde_json::Value::String(text);
    }
    check_structure(&raw)?;
    strip_extensions(&mut raw);
    serde_json::from_value(raw).map_err(|e| ParseError::Structure(e.to_string()))
}

/// Raw text of a top-level `key: value` scalar, quotes and comments removed.
fn yaml_scalar_text(content: &[u8], key: &str) -> Option<String> {
    std::str::from_utf8(content)
        .ok()?
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(':'))
        .map(|value| {
            let value = value.split(" #").next().unwrap_or(value).trim();
            value.trim_matches(|c| c == '"' || c == '\'').to_string()
        })
        .filter(|value| !value.is_empty())
}

fn is_extension(key: &str) -> bool {
    key.starts_with("x-")
}

/// Drop `x-` extension keys from the Paths and Responses objects, whose other
/// keys are all typed entries.
fn strip_extensions(raw: &mut serde_json::Value) {
    let Some(paths) = raw.get_mut("paths").and_then(serde_json::Value::as_object_mut) else {
        return;
    };
    paths.retain(|key, _| !is_extension(key));

    for item in paths.values_mut().filter_map(serde_json::Value::as_object_mut) {
        for method in HttpMethod::ALL {
            let responses = item
                .get_mut(&method.as_str().to_ascii_lowercase())
                .and_then(|op| op.get_mut("responses"))
                .and_then(serde_json::Value::as_object_mut);
            if let Some(responses) = responses {
                responses.retain(|key, _| !is_extension(key));
            }
        }
    }
}

fn check_structure(raw: &serde_json::Value) -> Result<(), ParseError> {
    let root = raw
        .as_object()
        .ok_or_else(|| ParseError::Structure("document root must be an object".into()))?;

    match root.get("openapi").and_then(|v| v.as_str()) {
        Some(version) if version.starts_with("3.") => {}
        Some(version) => {
            return Err(ParseError::Structure(format!(
                "unsupported OpenAPI version: {version} (only 3.x is supported)"
            )));
        }
        None => {
            return Err(ParseError::Structure(
                "missing 'openapi' version field".into(),
            ));
        }
    }

    if !root.get("info").is_some_and(serde_json::Value::is_object) {
        return Err(ParseError::Structure("missing 'info' object".into()));
    }
    if !root.get("paths").is_some_and(serde_json::Value::is_object) {
        return Err(ParseError::Structure("missing 'paths' object".into()));
    }
    Ok(())
}

/// Turns a document location into a [`TestSuite`].
pub struct Loader<F = HttpFetcher> {
    fetcher: F,
    status_policy: StatusPolicy,
}

impl Loader<HttpFetcher> {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new() -> Result<Self, LoadError> {
        Ok(Self::with_fetcher(HttpFetcher::new()?))
    }
}

impl<F: Fetch> Loader<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            status_policy: StatusPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Load the document at `location` and generate its suite.
    ///
    /// A non-empty `override_base_url` always wins. Otherwise remote
    /// locations derive one from their scheme and host; local files have
    /// no origin, so they fail.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`]; no partial suite is produced.
    pub fn load(
        &self,
        location: &str,
        override_base_url: Option<&str>,
    ) -> Result<TestSuite, LoadError> {
        let location = Location::parse(location)?;
        let base_url = resolve_base_url(&location, override_base_url)?;
        let document = self.load_document(&location)?;
        tracing::info!(
            location = %location,
            base_url = %base_url,
            paths = document.paths.len(),
            "loaded OpenAPI document"
        );
        Ok(build_suite(&document, base_url, self.status_policy))
    }

    /// # Errors
    ///
    /// Returns [`LoadError::Fetch`], [`LoadError::FetchStatus`], or
    /// [`LoadError::Parse`].
    pub fn load_document(&self, location: &Location) -> Result<Document, LoadError> {
        let content = self.fetcher.fetch(location)?;
        let format = DocumentFormat::detect(location.extension().as_deref(), &content);
        parse_document(&content, format).map_err(|source| LoadError::Parse {
            location: location.to_string(),
            source,
        })
    }
}

/// # Errors
///
/// Returns [`LoadError::Configuration`] when no base URL can be determined.
pub fn resolve_base_url(
    location: &Location,
    override_base_url: Option<&str>,
) -> Result<String, LoadError> {
    if let Some(base) = override_base_url.map(str::trim).filter(|b| !b.is_empty()) {
        return Ok(base.to_string());
    }
    location.derived_base_url().ok_or_else(|| {
        LoadError::Configuration("base URL is required for local spec files".into())
    })
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to fetch spec {location}: HTTP {status}")]
    FetchStatus { location: String, status: u16 },
    #[error("Failed to fetch spec {location}: {message}")]
    Fetch { location: String, message: String },
    #[error("Failed to parse spec {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("Invalid OpenAPI document: {0}")]
    Structure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher(&'static str);

    impl Fetch for StaticFetcher {
        fn fetch(&self, _location: &Location) -> Result<Vec<u8>, LoadError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    const WIDGETS_YAML: &str = r#"
openapi: 3.0.3
info:
  title: Widgets
  version: "1.0"
paths:
  /widgets/{id}:
    get:
      summary: Fetch a widget
      responses:
        200:
          description: OK
    post:
      responses:
        '201':
          description: Created
"#;

    #[test]
    fn location_by_prefix() {
        assert!(matches!(
            Location::parse("https://api.test/openapi.json").unwrap(),
            Location::Remote(_)
        ));
        assert!(matches!(
            Location::parse("specs/http-api.yaml").unwrap(),
            Location::Local(_)
        ));
        // Looks like a URL but lacks the prefix: a path
        assert!(matches!(
            Location::parse("ftp://api.test/openapi.json").unwrap(),
            Location::Local(_)
        ));
    }

    #[test]
    fn invalid_remote_url_is_configuration_error() {
        let err = Location::parse("http://exa mple.com/spec.json").unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
    }

    #[test]
    fn base_url_derived_from_remote_location() {
        let location = Location::parse("https://api.test:8443/v1/openapi.json?rev=3").unwrap();
        assert_eq!(
            resolve_base_url(&location, None).unwrap(),
            "https://api.test:8443"
        );
        let location = Location::parse("http://api.test/docs/openapi.yaml").unwrap();
        assert_eq!(resolve_base_url(&location, Some("")).unwrap(), "http://api.test");
    }

    #[test]
    fn override_wins_over_derived() {
        let location = Location::parse("http://api.test/openapi.json").unwrap();
        assert_eq!(
            resolve_base_url(&location, Some("http://staging.test")).unwrap(),
            "http://staging.test"
        );
    }

    #[test]
    fn local_without_override_is_configuration_error() {
        let location = Location::parse("openapi.yaml").unwrap();
        let err = resolve_base_url(&location, None).unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
        assert!(
            err.to_string()
                .contains("base URL is required for local spec files")
        );
    }

    #[test]
    fn detect_format() {
        assert_eq!(DocumentFormat::detect(Some("json"), b"openapi: 3"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::detect(Some("yml"), b"{}"), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::detect(None, b"  \n{\"a\":1}"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::detect(Some("txt"), b"openapi: 3.0.0"), DocumentFormat::Yaml);
    }

    #[test]
    fn parse_yaml_with_unquoted_status_keys() {
        let doc = parse_document(WIDGETS_YAML.as_bytes(), DocumentFormat::Yaml).unwrap();
        let item = &doc.paths["/widgets/{id}"];
        assert!(item.get.as_ref().unwrap().responses.contains_key("200"));
        assert!(item.post.as_ref().unwrap().responses.contains_key("201"));
    }

    #[test]
    fn parse_rejects_swagger_2() {
        let err = parse_document(
            br#"{"swagger": "2.0", "info": {}, "paths": {}}"#,
            DocumentFormat::Json,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Structure(_)));

        let err = parse_document(
            br#"{"openapi": "2.0", "info": {}, "paths": {}}"#,
            DocumentFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported OpenAPI version"));
    }

    #[test]
    fn parse_accepts_numeric_yaml_version() {
        let doc = parse_document(
            b"openapi: 3.1\ninfo:\n  title: t\n  version: '1'\npaths: {}\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(doc.openapi, "3.1");
    }

    #[test]
    fn numeric_yaml_version_keeps_trailing_zero() {
        let doc = parse_document(
            b"openapi: 3.10 # minor ten\ninfo:\n  title: t\n  version: '1'\npaths: {}\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(doc.openapi, "3.10");
    }

    #[test]
    fn extension_keys_are_ignored() {
        let doc = parse_document(
            br#"{
                "openapi": "3.0.0",
                "info": {"title": "t", "version": "1"},
                "paths": {
                    "x-internal": true,
                    "/a": {
                        "get": {"responses": {"x-cache": {"ttl": 5}, "200": {"description": "OK"}}}
                    }
                }
            }"#,
            DocumentFormat::Json,
        )
        .unwrap();

        assert_eq!(doc.paths.keys().collect::<Vec<_>>(), vec!["/a"]);
        let responses = &doc.paths["/a"].get.as_ref().unwrap().responses;
        assert_eq!(responses.keys().collect::<Vec<_>>(), vec!["200"]);
    }

    #[test]
    fn yaml_extension_keys_are_ignored() {
        let doc = parse_document(
            b"openapi: 3.0.3\ninfo:\n  title: t\n  version: '1'\npaths:\n  x-internal: true\n  /a:\n    post:\n      responses:\n        x-note: created\n        201:\n          description: Created\n",
            DocumentFormat::Yaml,
        )
        .unwrap();

        assert_eq!(doc.paths.len(), 1);
        assert_eq!(
            StatusPolicy::Declared.expected_status(doc.paths["/a"].post.as_ref().unwrap()),
            201
        );
    }

    #[test]
    fn parse_rejects_missing_paths() {
        let err = parse_document(
            br#"{"openapi": "3.1.0", "info": {"title": "t", "version": "1"}}"#,
            DocumentFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("paths"));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = parse_document(b"{\"openapi\": ", DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn load_builds_suite_from_fetched_document() {
        let loader = Loader::with_fetcher(StaticFetcher(WIDGETS_YAML));
        let suite = loader
            .load("specs/widgets.yaml", Some("http://api.test"))
            .unwrap();
        assert_eq!(suite.name, "Widgets v1.0");
        assert_eq!(suite.base_url, "http://api.test");
        assert_eq!(suite.test_cases.len(), 2);
        assert!(suite.test_cases.iter().all(|c| c.expected_status == 200));
    }

    #[test]
    fn declared_policy_flows_through_loader() {
        let loader = Loader::with_fetcher(StaticFetcher(WIDGETS_YAML))
            .with_status_policy(StatusPolicy::Declared);
        let suite = loader.load("widgets.yaml", Some("http://api.test")).unwrap();
        assert_eq!(suite.test_cases[1].expected_status, 201);
    }

    #[test]
    fn load_wraps_parse_error_with_location() {
        let loader = Loader::with_fetcher(StaticFetcher("openapi: [unclosed"));
        let err = loader
            .load("broken.yaml", Some("http://api.test"))
            .unwrap_err();
        match err {
            LoadError::Parse { location, .. } => assert_eq!(location, "broken.yaml"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn configuration_error_precedes_fetch() {
        struct Unreachable;
        impl Fetch for Unreachable {
            fn fetch(&self, _location: &Location) -> Result<Vec<u8>, LoadError> {
                panic!("fetch must not run without a base URL");
            }
        }
        let err = Loader::with_fetcher(Unreachable)
            .load("openapi.json", None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
    }
}
