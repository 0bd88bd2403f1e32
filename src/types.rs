//! Core types shared across the loading, indexing and naming phases.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::draft::Draft;

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Name given to nodes whose URL carries no usable segment.
pub const DEFAULT_NAME_PLACEHOLDER: &str = "Schema";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A primitive type named by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Parse a `type` keyword value.
    ///
    /// Returns `None` for names no draft defines (`any` from draft-03 included).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }
}

/// Options for a compilation session.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Draft assumed for an entry document that has no `$schema`.
    pub default_draft: Draft,
    /// When set, the entry document must declare this draft.
    pub expected_draft: Option<Draft>,
    /// Timeout applied by the HTTP retriever.
    pub http_timeout: Duration,
    /// Name used for nodes with no meaningful URL segment.
    pub name_placeholder: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_draft: Draft::Draft202012,
            expected_draft: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            name_placeholder: DEFAULT_NAME_PLACEHOLDER.to_string(),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the draft used when the entry document has no `$schema`.
    pub fn default_draft(mut self, draft: Draft) -> Self {
        self.default_draft = draft;
        self
    }

    /// Require the entry document to declare `draft`.
    pub fn expected_draft(mut self, draft: Option<Draft>) -> Self {
        self.expected_draft = draft;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the placeholder name for anonymous nodes.
    ///
    /// Falls back to the default when `placeholder` has no identifier characters.
    pub fn name_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        if placeholder.chars().any(|c| c.is_ascii_alphabetic()) {
            self.name_placeholder = placeholder;
        }
        self
    }
}
