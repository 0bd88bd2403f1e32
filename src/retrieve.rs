//! Document retrieval from files, HTTP URLs and in-memory maps.
//!
//! The loader only sees the [`Retriever`] capability. Which transport answers
//! a URL is decided here, by scheme or by an explicit URL-to-directory mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{CompileError, LoadError};
use crate::pointer::document_of;
use crate::types::DEFAULT_HTTP_TIMEOUT;

/// Fetches and parses the document at a fragment-free URL.
pub trait Retriever {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError>;
}

impl<R: Retriever + ?Sized> Retriever for Box<R> {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        (**self).retrieve(url)
    }
}

/// Parse a document held in a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(url: &Url, content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson {
        url: url.clone(),
        source,
    })
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(url: &Url, path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            url: url.clone(),
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        url: url.clone(),
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(url, &content)
}

/// Check if a string looks like a URL (starts with http://, https:// or file://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

/// Turn a command-line source (URL or file path) into an absolute URL.
///
/// Relative paths are taken from the current directory. The file itself is
/// not touched here; a missing file surfaces when it is retrieved.
///
/// # Errors
///
/// Returns `CompileError::InvalidUrl` for malformed URLs.
pub fn source_to_url(source: &str) -> Result<Url, CompileError> {
    let invalid = |source_err| CompileError::InvalidUrl {
        url: source.to_string(),
        source: source_err,
    };

    if is_url(source) {
        return Url::parse(source).map_err(invalid);
    }

    let path = Path::new(source);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|_| invalid(url::ParseError::RelativeUrlWithoutBase))?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|()| invalid(url::ParseError::RelativeUrlWithoutBase))
}

/// Reads `file:` URLs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRetriever;

impl Retriever for FileRetriever {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        let path = url
            .to_file_path()
            .map_err(|()| LoadError::UnsupportedScheme { url: url.clone() })?;
        debug!(%url, path = %path.display(), "reading schema file");
        load_schema(url, &path)
    }
}

/// Fetches `http:` and `https:` URLs.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    timeout: Duration,
}

#[cfg(feature = "remote")]
impl HttpRetriever {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "remote")]
impl Default for HttpRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

#[cfg(feature = "remote")]
impl Retriever for HttpRetriever {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        debug!(%url, "fetching schema");
        let network = |source| LoadError::NetworkError {
            url: url.clone(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(network)?;

        let response = client.get(url.as_str()).send().map_err(network)?;

        // Check for HTTP errors before parsing
        let response = response.error_for_status().map_err(network)?;
        let body = response.text().map_err(network)?;

        load_schema_str(url, &body)
    }
}

/// Serves documents from a fixed map. Keys are stored without fragments.
#[derive(Debug, Clone, Default)]
pub struct MemoryRetriever {
    documents: HashMap<Url, Value>,
}

impl MemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &Url, document: Value) {
        self.documents.insert(document_of(url), document);
    }

    /// Builder form of [`MemoryRetriever::insert`].
    pub fn with(mut self, url: &Url, document: Value) -> Self {
        self.insert(url, document);
        self
    }
}

impl Retriever for MemoryRetriever {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        self.documents
            .get(&document_of(url))
            .cloned()
            .ok_or_else(|| LoadError::NotFound { url: url.clone() })
    }
}

/// Answers URLs under `remote_base` from files under `local_base`.
///
/// Everything else, including mapped URLs with no local file, goes to the
/// wrapped retriever.
///
/// # Example
/// ```text
/// remote_base = "https://json-schema.org/draft/2020-12"
/// local_base  = "vendor/2020-12"
/// https://json-schema.org/draft/2020-12/meta/core -> vendor/2020-12/meta/core
/// ```
#[derive(Debug, Clone)]
pub struct MappedRetriever<R> {
    inner: R,
    remote_base: String,
    local_base: PathBuf,
}

impl<R: Retriever> MappedRetriever<R> {
    pub fn new(inner: R, remote_base: impl Into<String>, local_base: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            remote_base: remote_base.into(),
            local_base: local_base.into(),
        }
    }

    /// Local path for `url`, if it falls under the remote base.
    pub fn local_path(&self, url: &Url) -> Option<PathBuf> {
        let remainder = url.as_str().strip_prefix(self.remote_base.trim_end_matches('/'))?;
        if !(remainder.is_empty() || remainder.starts_with('/')) {
            return None;
        }
        // Stripping remote base leaves "/schemas/..." - the leading slash is trimmed
        Some(self.local_base.join(remainder.trim_start_matches('/')))
    }
}

impl<R: Retriever> Retriever for MappedRetriever<R> {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        match self.local_path(url) {
            Some(path) if path.exists() => {
                debug!(%url, path = %path.display(), "mapped to local schema");
                load_schema(url, &path)
            }
            _ => self.inner.retrieve(url),
        }
    }
}

/// Picks a transport by URL scheme.
#[derive(Debug, Clone, Default)]
pub struct AutoRetriever {
    file: FileRetriever,
    #[cfg(feature = "remote")]
    http: HttpRetriever,
}

impl AutoRetriever {
    #[cfg_attr(not(feature = "remote"), allow(unused_variables))]
    pub fn new(timeout: Duration) -> Self {
        Self {
            file: FileRetriever,
            #[cfg(feature = "remote")]
            http: HttpRetriever::new(timeout),
        }
    }
}

impl Retriever for AutoRetriever {
    fn retrieve(&self, url: &Url) -> Result<Value, LoadError> {
        match url.scheme() {
            "file" => self.file.retrieve(url),
            #[cfg(feature = "remote")]
            "http" | "https" => self.http.retrieve(url),
            _ => Err(LoadError::UnsupportedScheme { url: url.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn file_retriever_reads_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "object"}}"#).unwrap();

        let file_url = Url::from_file_path(file.path()).unwrap();
        let schema = FileRetriever.retrieve(&file_url).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn file_retriever_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = Url::from_file_path(dir.path().join("missing.json")).unwrap();
        let result = FileRetriever.retrieve(&missing);
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn file_retriever_invalid_json_keeps_url() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let file_url = Url::from_file_path(file.path()).unwrap();
        let err = FileRetriever.retrieve(&file_url).unwrap_err();
        assert!(matches!(err, LoadError::InvalidJson { .. }));
        assert_eq!(err.url(), &file_url);
    }

    #[test]
    fn file_retriever_rejects_http() {
        let result = FileRetriever.retrieve(&url("https://example.com/a.json"));
        assert!(matches!(result, Err(LoadError::UnsupportedScheme { .. })));
    }

    #[test]
    fn memory_retriever_ignores_fragment() {
        let retriever = MemoryRetriever::new().with(
            &url("https://example.com/a.json"),
            json!({ "type": "string" }),
        );
        let doc = retriever
            .retrieve(&url("https://example.com/a.json#/definitions/x"))
            .unwrap();
        assert_eq!(doc["type"], "string");

        let missing = retriever.retrieve(&url("https://example.com/b.json"));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn mapped_retriever_local_path() {
        let mapped = MappedRetriever::new(
            MemoryRetriever::new(),
            "https://json-schema.org/draft/2020-12/",
            "/vendor/2020-12",
        );
        assert_eq!(
            mapped.local_path(&url("https://json-schema.org/draft/2020-12/meta/core")),
            Some(PathBuf::from("/vendor/2020-12/meta/core"))
        );
        assert_eq!(
            mapped.local_path(&url("https://json-schema.org/draft/2020-12x/schema")),
            None
        );
        assert_eq!(
            mapped.local_path(&url("https://other.example/schema")),
            None
        );
    }

    #[test]
    fn mapped_retriever_reads_files_and_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("types")).unwrap();
        std::fs::write(dir.path().join("types/buyer.json"), r#"{"type":"object"}"#).unwrap();

        let fallback_url = url("https://other.example/b.json");
        let mapped = MappedRetriever::new(
            MemoryRetriever::new().with(&fallback_url, json!({ "type": "null" })),
            "https://schemas.example/v1",
            dir.path(),
        );

        let local = mapped
            .retrieve(&url("https://schemas.example/v1/types/buyer.json"))
            .unwrap();
        assert_eq!(local["type"], "object");

        let remote = mapped.retrieve(&fallback_url).unwrap();
        assert_eq!(remote["type"], "null");

        // Under the base but absent locally: the inner retriever decides.
        let absent = mapped.retrieve(&url("https://schemas.example/v1/types/missing.json"));
        assert!(matches!(absent, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn auto_retriever_rejects_unknown_scheme() {
        let result = AutoRetriever::default().retrieve(&url("ftp://example.com/a.json"));
        assert!(matches!(result, Err(LoadError::UnsupportedScheme { .. })));
    }

    #[test]
    fn source_to_url_accepts_paths_and_urls() {
        let file = NamedTempFile::new().unwrap();
        let from_path = source_to_url(file.path().to_str().unwrap()).unwrap();
        assert_eq!(from_path.scheme(), "file");

        let from_url = source_to_url("https://example.com/a.json").unwrap();
        assert_eq!(from_url.as_str(), "https://example.com/a.json");

        let relative = source_to_url("schemas/person.json").unwrap();
        assert!(relative.path().ends_with("/schemas/person.json"));

        assert!(source_to_url("https://exa mple.com/a.json").is_err());
    }

    #[test]
    fn is_url_schemes() {
        assert!(is_url("https://example.com/schema.json"));
        assert!(is_url("http://example.com/schema.json"));
        assert!(is_url("file:///tmp/schema.json"));
        assert!(!is_url("./schema.json"));
        assert!(!is_url("schema.json"));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn http_retriever_fetches_json() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/schema.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"$schema":"https://json-schema.org/draft/2020-12/schema"}"#)
                .create();

            let target = url(&format!("{}/schema.json", server.url()));
            let doc = HttpRetriever::default().retrieve(&target).unwrap();
            assert_eq!(
                doc["$schema"],
                "https://json-schema.org/draft/2020-12/schema"
            );
            mock.assert();
        }

        #[test]
        fn http_retriever_404_is_network_error() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let target = url(&format!("{}/missing.json", server.url()));
            let err = HttpRetriever::default().retrieve(&target).unwrap_err();
            assert!(matches!(err, LoadError::NetworkError { .. }));
            assert_eq!(err.url(), &target);
        }

        #[test]
        fn http_retriever_bad_body_is_invalid_json() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/broken.json")
                .with_status(200)
                .with_body("{ not json")
                .create();

            let target = url(&format!("{}/broken.json", server.url()));
            let err = HttpRetriever::default().retrieve(&target).unwrap_err();
            assert!(matches!(err, LoadError::InvalidJson { .. }));
        }

        #[test]
        fn auto_retriever_dispatches_http() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/a.json")
                .with_status(200)
                .with_body(r#"{"type":"integer"}"#)
                .create();

            let target = url(&format!("{}/a.json", server.url()));
            let doc = AutoRetriever::default().retrieve(&target).unwrap();
            assert_eq!(doc["type"], "integer");
        }
    }
}
