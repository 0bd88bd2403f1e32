//! Error types for schema loading, indexing and naming.

use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Failures while retrieving or parsing a single document.
///
/// Every variant carries the URL that failed. Nothing at this layer retries.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { url: Url, path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        url: Url,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("no retriever handles {url}")]
    UnsupportedScheme { url: Url },

    #[error("document not available: {url}")]
    NotFound { url: Url },

    // Parse errors (exit code 2)
    #[error("invalid JSON in {url}: {source}")]
    InvalidJson {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// The URL whose retrieval failed.
    pub fn url(&self) -> &Url {
        match self {
            LoadError::FileNotFound { url, .. }
            | LoadError::ReadError { url, .. }
            | LoadError::UnsupportedScheme { url }
            | LoadError::NotFound { url }
            | LoadError::InvalidJson { url, .. } => url,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { url, .. } => url,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::InvalidJson { .. } => 2,
            _ => 3,
        }
    }
}

/// Errors that abort a compilation session.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("unknown draft for {url}: $schema is \"{schema}\"")]
    UnknownDraft { url: Url, schema: String },

    #[error("ambiguous draft for {url}: matches {}", drafts.join(", "))]
    AmbiguousDraft { url: Url, drafts: Vec<String> },

    #[error("draft {key} is already registered")]
    DuplicateDraft { key: String },

    #[error("schema mismatch for {url}: expected {expected}, document declares {detected}")]
    SchemaMismatch {
        url: Url,
        expected: String,
        detected: String,
    },

    #[error("dangling reference at {source_node}: {target} cannot be resolved")]
    DanglingReference { source_node: Url, target: Url },

    #[error("unresolved member of {node}: {member} is not indexed")]
    UnresolvedMember { node: Url, member: Url },

    #[error("{operation} called before {required}")]
    PhaseOrder {
        operation: &'static str,
        required: &'static str,
    },

    #[error("stale result: generation {stamp} was replaced by generation {current}")]
    StaleGeneration { stamp: u64, current: u64 },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Load(e) => e.exit_code(),
            CompileError::PhaseOrder { .. } | CompileError::StaleGeneration { .. } => 4,
            _ => 2,
        }
    }
}
