//! Normalization of `oneOf` / `anyOf` / `allOf` into compound descriptors.

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::document::DocumentMap;
use crate::error::CompileError;
use crate::indexer::NodeIndex;
use crate::pointer::{decode_pointer, document_of, node_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompoundKind {
    OneOf,
    AnyOf,
    AllOf,
}

impl CompoundKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "oneOf" => Some(CompoundKind::OneOf),
            "anyOf" => Some(CompoundKind::AnyOf),
            "allOf" => Some(CompoundKind::AllOf),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            CompoundKind::OneOf => "oneOf",
            CompoundKind::AnyOf => "anyOf",
            CompoundKind::AllOf => "allOf",
        }
    }
}

/// A composition keyword with its members' canonical node URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundDescriptor {
    #[serde(rename = "type")]
    pub kind: CompoundKind,
    /// Members in source order.
    #[serde(rename = "typeNodeIds")]
    pub type_node_ids: Vec<Url>,
}

/// Describe the composition keywords of the indexed node at `url`.
///
/// One descriptor per keyword present, in the order the keywords appear in
/// the source object. Empty for simple nodes and for nodes whose `$ref`
/// hides its siblings.
///
/// # Errors
///
/// Returns `CompileError::UnresolvedMember` if a member is not indexed.
pub fn describe(
    url: &Url,
    documents: &DocumentMap,
    index: &NodeIndex,
) -> Result<Vec<CompoundDescriptor>, CompileError> {
    let Some(entry) = index.get(url) else {
        return Ok(Vec::new());
    };
    let Some(Value::Object(obj)) = documents.node(url) else {
        return Ok(Vec::new());
    };
    if entry.draft.vocabulary().ignores_siblings(obj) {
        return Ok(Vec::new());
    }

    let mut descriptors = Vec::new();
    for (keyword, value) in obj {
        let (Some(kind), Value::Array(members)) = (CompoundKind::from_keyword(keyword), value)
        else {
            continue;
        };

        let mut type_node_ids = Vec::with_capacity(members.len());
        for i in 0..members.len() {
            let segments = [keyword.clone(), i.to_string()];
            match documents.locate(url, &segments) {
                Some(member) if index.contains(&member) => type_node_ids.push(member),
                _ => {
                    let mut pointer = decode_pointer(url.fragment().unwrap_or(""));
                    pointer.extend(segments);
                    return Err(CompileError::UnresolvedMember {
                        node: url.clone(),
                        member: node_url(&document_of(url), &pointer),
                    });
                }
            }
        }
        descriptors.push(CompoundDescriptor {
            kind,
            type_node_ids,
        });
    }
    Ok(descriptors)
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

    fn setup(node: Value, draft: Draft) -> (DocumentMap, NodeIndex) {
        let mut documents = DocumentMap::new();
        documents.insert(DocumentEntry {
            retrieval_url: url("https://example.com/a.json"),
            document_url: url("https://example.com/a.json"),
            draft,
            node,
            embedded_at: None,
        });
        let index = build_index(&documents, &MetaSchemaRegistry::builtin()).unwrap();
        (documents, index)
    }

    #[test]
    fn one_of_members_in_source_order() {
        let (documents, index) = setup(
            json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }, { "type": "null" }] }),
            Draft::Draft202012,
        );
        let descriptors = describe(&url("https://example.com/a.json#"), &documents, &index).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].kind, CompoundKind::OneOf);
        let ids: Vec<&str> = descriptors[0].type_node_ids.iter().map(Url::as_str).collect();
        assert_eq!(
            ids,
            vec![
                "https://example.com/a.json#/oneOf/0",
                "https://example.com/a.json#/oneOf/1",
                "https://example.com/a.json#/oneOf/2",
            ]
        );
    }

    #[test]
    fn several_keywords_stay_independent() {
        let (documents, index) = setup(
            json!({ "allOf": [{}], "anyOf": [{}, {}] }),
            Draft::Draft202012,
        );
        let descriptors = describe(&url("https://example.com/a.json#"), &documents, &index).unwrap();
        let kinds: Vec<CompoundKind> = descriptors.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![CompoundKind::AllOf, CompoundKind::AnyOf]);
        assert_eq!(descriptors[1].type_node_ids.len(), 2);
    }

    #[test]
    fn simple_node_has_no_descriptor() {
        let (documents, index) = setup(json!({ "type": "object" }), Draft::Draft202012);
        assert!(describe(&url("https://example.com/a.json#"), &documents, &index)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn non_schema_member_is_unresolved() {
        let (documents, index) = setup(json!({ "anyOf": [{}, true] }), Draft::Draft04);
        let err = describe(&url("https://example.com/a.json#"), &documents, &index).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnresolvedMember { member, .. }
                if member.as_str() == "https://example.com/a.json#/anyOf/1"
        ));
    }

    #[test]
    fn serializes_with_kebab_case_tag() {
        let descriptor = CompoundDescriptor {
            kind: CompoundKind::AnyOf,
            type_node_ids: vec![url("https://example.com/a.json#/anyOf/0")],
        };
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({ "type": "any-of", "typeNodeIds": ["https://example.com/a.json#/anyOf/0"] })
        );
    }
}
