//! Normalized type description per indexed node.
//!
//! Shapes are what generators read instead of raw keywords: child schemas
//! are already canonical node URLs and references already point at their
//! resolved targets.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::compound::CompoundDescriptor;
use crate::document::DocumentMap;
use crate::indexer::NodeIndex;
use crate::types::{json_type_name, JsonType};

/// One entry of `properties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyShape {
    pub name: String,
    pub node: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeShape {
    /// Set for boolean schemas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    /// Declared `type`, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Url>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compounds: Vec<CompoundDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyShape>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Url>,
    /// `enum` values, or the single `const` value.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TypeShape {
    /// Build the shape of the indexed node at `url`.
    ///
    /// Returns `None` if the URL is not indexed.
    pub fn build(
        url: &Url,
        documents: &DocumentMap,
        index: &NodeIndex,
        compounds: Vec<CompoundDescriptor>,
    ) -> Option<TypeShape> {
        let entry = index.get(url)?;
        let node = documents.node(url)?;

        let reference = documents
            .references_at(url)
            .iter()
            .find_map(|r| r.resolved.clone());

        let obj = match node {
            Value::Bool(b) => {
                return Some(TypeShape {
                    boolean: Some(*b),
                    ..TypeShape::default()
                })
            }
            Value::Object(obj) => obj,
            _ => return Some(TypeShape::default()),
        };

        if entry.draft.vocabulary().ignores_siblings(obj) {
            return Some(TypeShape {
                reference,
                ..TypeShape::default()
            });
        }

        let child = |segments: &[&str]| {
            documents
                .locate(url, segments)
                .filter(|located| index.contains(located))
        };

        let properties = match obj.get("properties") {
            Some(Value::Object(members)) => members
                .keys()
                .filter_map(|name| {
                    child(&["properties", name.as_str()]).map(|node| PropertyShape {
                        name: name.clone(),
                        node,
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        let enumeration = match (obj.get("enum"), obj.get("const")) {
            (Some(Value::Array(values)), _) => Some(values.clone()),
            (_, Some(value)) => Some(vec![value.clone()]),
            _ => None,
        };

        Some(TypeShape {
            boolean: None,
            types: declared_types(url, obj),
            reference,
            compounds,
            properties,
            required: string_list(obj.get("required")),
            items: child(&["items"]),
            additional_properties: child(&["additionalProperties"]),
            enumeration,
            title: string_value(obj.get("title")),
            description: string_value(obj.get("description")),
        })
    }
}

fn declared_types(url: &Url, obj: &Map<String, Value>) -> Vec<JsonType> {
    match obj.get("type") {
        Some(Value::String(name)) => JsonType::parse(name).into_iter().collect(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .filter_map(JsonType::parse)
            .collect(),
        Some(other) => {
            debug!(%url, found = json_type_name(other), "ignoring malformed type keyword");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn string_value(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentEntry;
    use crate::draft::Draft;
    use crate::indexer::build_index;
    use crate::registry::MetaSchemaRegistry;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn shape_of(node: Value, draft: Draft, at: &str) -> Option<TypeShape> {
        let mut documents = DocumentMap::new();
        documents.insert(DocumentEntry {
            retrieval_url: url("https://example.com/a.json"),
            document_url: url("https://example.com/a.json"),
            draft,
            node,
            embedded_at: None,
        });
        let index = build_index(&documents, &MetaSchemaRegistry::builtin()).unwrap();
        TypeShape::build(&url(at), &documents, &index, Vec::new())
    }

    #[test]
    fn object_shape() {
        let shape = shape_of(
            json!({
                "title": "Person",
                "type": "object",
                "properties": { "name": { "type": "string" }, "tags": { "type": "array", "items": {} } },
                "required": ["name"],
                "additionalProperties": false
            }),
            Draft::Draft202012,
            "https://example.com/a.json#",
        )
        .unwrap();

        assert_eq!(shape.types, vec![JsonType::Object]);
        assert_eq!(shape.title.as_deref(), Some("Person"));
        assert_eq!(shape.required, vec!["name"]);
        let names: Vec<&str> = shape.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "tags"]);
        assert_eq!(
            shape.properties[1].node.as_str(),
            "https://example.com/a.json#/properties/tags"
        );
        assert_eq!(
            shape.additional_properties.as_ref().map(Url::as_str),
            Some("https://example.com/a.json#/additionalProperties")
        );
    }

    #[test]
    fn boolean_and_enum_shapes() {
        let node = json!({
            "properties": { "never": false, "color": { "enum": ["red", "green"] }, "one": { "const": 1 } }
        });
        let never = shape_of(node.clone(), Draft::Draft07, "https://example.com/a.json#/properties/never")
            .unwrap();
        assert_eq!(never.boolean, Some(false));

        let color = shape_of(node.clone(), Draft::Draft07, "https://example.com/a.json#/properties/color")
            .unwrap();
        assert_eq!(color.enumeration, Some(vec![json!("red"), json!("green")]));

        let one = shape_of(node, Draft::Draft07, "https://example.com/a.json#/properties/one").unwrap();
        assert_eq!(one.enumeration, Some(vec![json!(1)]));
    }

    #[test]
    fn type_arrays_keep_order_and_drop_unknown() {
        let shape = shape_of(
            json!({ "type": ["string", "any", "null"] }),
            Draft::Draft04,
            "https://example.com/a.json#",
        )
        .unwrap();
        assert_eq!(shape.types, vec![JsonType::String, JsonType::Null]);
    }

    #[test]
    fn unindexed_url_has_no_shape() {
        assert!(shape_of(json!({}), Draft::Draft202012, "https://example.com/a.json#/nope").is_none());
    }

    #[test]
    fn serialized_shape_skips_empty_fields() {
        let shape = TypeShape {
            types: vec![JsonType::Integer],
            ..TypeShape::default()
        };
        assert_eq!(serde_json::to_value(&shape).unwrap(), json!({ "types": ["integer"] }));
    }
}
