//! JSON Schema drafts and the keyword rules each one brings.
//!
//! The set of drafts is closed. Everything draft-specific that the loader and
//! indexer need (which keyword sets a scope, which keywords reference, where
//! nested schemas live) is read from the draft's [`Vocabulary`] table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered JSON Schema draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Draft {
    #[serde(rename = "draft-04")]
    Draft04,
    #[serde(rename = "draft-06")]
    Draft06,
    #[serde(rename = "draft-07")]
    Draft07,
    #[serde(rename = "2019-09")]
    Draft201909,
    #[serde(rename = "2020-12")]
    Draft202012,
}

impl Draft {
    /// All built-in drafts, oldest first.
    pub const ALL: [Draft; 5] = [
        Draft::Draft04,
        Draft::Draft06,
        Draft::Draft07,
        Draft::Draft201909,
        Draft::Draft202012,
    ];

    /// Stable key used in output and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Draft::Draft04 => "draft-04",
            Draft::Draft06 => "draft-06",
            Draft::Draft07 => "draft-07",
            Draft::Draft201909 => "2019-09",
            Draft::Draft202012 => "2020-12",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Draft::ALL.into_iter().find(|d| d.key() == key)
    }

    /// Canonical identifying URL of the draft's meta-schema.
    pub fn meta_schema_url(self) -> &'static str {
        match self {
            Draft::Draft04 => "http://json-schema.org/draft-04/schema#",
            Draft::Draft06 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft07 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Whether a `$schema` value names this draft's meta-schema.
    ///
    /// Ignores an empty trailing fragment and the http/https difference.
    pub fn matches_schema_uri(self, uri: &str) -> bool {
        normalize_meta_uri(uri) == normalize_meta_uri(self.meta_schema_url())
    }

    /// True when `node` declares this draft through `$schema`.
    pub fn is_root_node(self, node: &Value) -> bool {
        node.get("$schema")
            .and_then(Value::as_str)
            .map(|uri| self.matches_schema_uri(uri))
            .unwrap_or(false)
    }

    pub fn vocabulary(self) -> &'static Vocabulary {
        match self {
            Draft::Draft04 => &DRAFT_04,
            Draft::Draft06 => &DRAFT_06,
            Draft::Draft07 => &DRAFT_07,
            Draft::Draft201909 => &DRAFT_2019_09,
            Draft::Draft202012 => &DRAFT_2020_12,
        }
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Draft {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Draft::from_key(s).ok_or_else(|| {
            let known: Vec<&str> = Draft::ALL.iter().map(|d| d.key()).collect();
            format!("unknown draft '{}': expected one of {}", s, known.join(", "))
        })
    }
}

fn normalize_meta_uri(uri: &str) -> &str {
    let uri = uri.trim_end_matches('#');
    uri.strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri)
}

/// Keyword rules for one draft.
#[derive(Debug)]
pub struct Vocabulary {
    /// Keyword declaring a new base URL (`id` before draft-06).
    pub id_keyword: &'static str,
    /// Keywords whose string value names a plain anchor.
    pub anchor_keywords: &'static [&'static str],
    /// Keywords whose string value is a reference.
    pub ref_keywords: &'static [&'static str],
    /// A `$ref` object's siblings are ignored (drafts 04 to 07).
    pub ref_overrides_siblings: bool,
    /// An id made of a bare fragment (`"#name"`) declares an anchor.
    pub fragment_ids: bool,
    /// `true` and `false` are schemas.
    pub boolean_schemas: bool,
    /// Keywords holding an object of named schemas.
    pub schema_maps: &'static [&'static str],
    /// Keywords holding a single schema.
    pub schema_values: &'static [&'static str],
    /// Keywords holding an array of schemas.
    pub schema_arrays: &'static [&'static str],
}

/// A nested schema found directly under a schema object.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSchema<'a> {
    /// Pointer segments from the parent to the child, unescaped.
    pub segments: Vec<String>,
    pub node: &'a Value,
}

impl Vocabulary {
    /// Whether `value` can stand in a schema position.
    pub fn is_schema(&self, value: &Value) -> bool {
        match value {
            Value::Object(_) => true,
            Value::Bool(_) => self.boolean_schemas,
            _ => false,
        }
    }

    /// The non-fragment id declared by `obj`, if any.
    ///
    /// Fragment-only ids are anchors, not scopes, and are skipped here.
    pub fn scope_id<'a>(&self, obj: &'a Map<String, Value>) -> Option<&'a str> {
        if self.ignores_siblings(obj) {
            return None;
        }
        obj.get(self.id_keyword)
            .and_then(Value::as_str)
            .filter(|id| !id.starts_with('#') && !id.is_empty())
    }

    /// Anchor names declared by `obj`, in keyword order.
    pub fn anchors<'a>(&self, obj: &'a Map<String, Value>) -> Vec<&'a str> {
        if self.ignores_siblings(obj) {
            return Vec::new();
        }
        let mut names: Vec<&str> = self
            .anchor_keywords
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .collect();
        if self.fragment_ids {
            if let Some(id) = obj.get(self.id_keyword).and_then(Value::as_str) {
                if let Some((_, fragment)) = id.split_once('#') {
                    if !fragment.is_empty() && !fragment.starts_with('/') {
                        names.push(fragment);
                    }
                }
            }
        }
        names
    }

    /// Reference keywords present on `obj` with their raw values.
    pub fn references<'a>(&self, obj: &'a Map<String, Value>) -> Vec<(&'static str, &'a str)> {
        self.ref_keywords
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str).map(|v| (*k, v)))
            .collect()
    }

    /// Whether the siblings of `$ref` in `obj` are ignored under this draft.
    pub fn ignores_siblings(&self, obj: &Map<String, Value>) -> bool {
        self.ref_overrides_siblings && obj.get("$ref").map(Value::is_string).unwrap_or(false)
    }

    /// Nested schemas directly under `obj`, in source order.
    pub fn children<'a>(&self, obj: &'a Map<String, Value>) -> Vec<ChildSchema<'a>> {
        let mut children = Vec::new();
        if self.ignores_siblings(obj) {
            return children;
        }

        for (keyword, value) in obj {
            let keyword = keyword.as_str();
            if self.schema_maps.contains(&keyword) {
                if let Value::Object(members) = value {
                    for (name, member) in members {
                        if self.is_schema(member) {
                            children.push(ChildSchema {
                                segments: vec![keyword.to_string(), name.clone()],
                                node: member,
                            });
                        }
                    }
                }
                continue;
            }
            match value {
                Value::Array(items) if self.schema_arrays.contains(&keyword) => {
                    for (i, item) in items.iter().enumerate() {
                        if self.is_schema(item) {
                            children.push(ChildSchema {
                                segments: vec![keyword.to_string(), i.to_string()],
                                node: item,
                            });
                        }
                    }
                }
                other if self.schema_values.contains(&keyword) && self.is_schema(other) => {
                    children.push(ChildSchema {
                        segments: vec![keyword.to_string()],
                        node: other,
                    });
                }
                _ => {}
            }
        }
        children
    }
}

static DRAFT_04: Vocabulary = Vocabulary {
    id_keyword: "id",
    anchor_keywords: &[],
    ref_keywords: &["$ref"],
    ref_overrides_siblings: true,
    fragment_ids: true,
    boolean_schemas: false,
    schema_maps: &["properties", "patternProperties", "definitions", "dependencies"],
    schema_values: &["additionalProperties", "additionalItems", "items", "not"],
    schema_arrays: &["allOf", "anyOf", "oneOf", "items"],
};

static DRAFT_06: Vocabulary = Vocabulary {
    id_keyword: "$id",
    anchor_keywords: &[],
    ref_keywords: &["$ref"],
    ref_overrides_siblings: true,
    fragment_ids: true,
    boolean_schemas: true,
    schema_maps: &["properties", "patternProperties", "definitions", "dependencies"],
    schema_values: &[
        "additionalProperties",
        "additionalItems",
        "items",
        "not",
        "propertyNames",
        "contains",
    ],
    schema_arrays: &["allOf", "anyOf", "oneOf", "items"],
};

static DRAFT_07: Vocabulary = Vocabulary {
    id_keyword: "$id",
    anchor_keywords: &[],
    ref_keywords: &["$ref"],
    ref_overrides_siblings: true,
    fragment_ids: true,
    boolean_schemas: true,
    schema_maps: &["properties", "patternProperties", "definitions", "dependencies"],
    schema_values: &[
        "additionalProperties",
        "additionalItems",
        "items",
        "not",
        "propertyNames",
        "contains",
        "if",
        "then",
        "else",
    ],
    schema_arrays: &["allOf", "anyOf", "oneOf", "items"],
};

static DRAFT_2019_09: Vocabulary = Vocabulary {
    id_keyword: "$id",
    anchor_keywords: &["$anchor"],
    ref_keywords: &["$ref", "$recursiveRef"],
    ref_overrides_siblings: false,
    fragment_ids: false,
    boolean_schemas: true,
    schema_maps: &[
        "properties",
        "patternProperties",
        "definitions",
        "$defs",
        "dependentSchemas",
    ],
    schema_values: &[
        "additionalProperties",
        "additionalItems",
        "items",
        "not",
        "propertyNames",
        "contains",
        "if",
        "then",
        "else",
        "unevaluatedItems",
        "unevaluatedProperties",
        "contentSchema",
    ],
    schema_arrays: &["allOf", "anyOf", "oneOf", "items"],
};

static DRAFT_2020_12: Vocabulary = Vocabulary {
    id_keyword: "$id",
    anchor_keywords: &["$anchor", "$dynamicAnchor"],
    ref_keywords: &["$ref", "$dynamicRef"],
    ref_overrides_siblings: false,
    fragment_ids: false,
    boolean_schemas: true,
    schema_maps: &[
        "properties",
        "patternProperties",
        "definitions",
        "$defs",
        "dependentSchemas",
    ],
    schema_values: &[
        "additionalProperties",
        "items",
        "not",
        "propertyNames",
        "contains",
        "if",
        "then",
        "else",
        "unevaluatedItems",
        "unevaluatedProperties",
        "contentSchema",
    ],
    schema_arrays: &["allOf", "anyOf", "oneOf", "prefixItems"],
};
