//! Flat node index over a loaded document map.
//!
//! Indexing walks structural containment only. References were already
//! resolved by the loader; their targets that no structural walk reaches are
//! indexed as extra roots so every reference lands on an indexed node.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::document::{DocumentEntry, DocumentMap};
use crate::draft::Draft;
use crate::error::CompileError;
use crate::pointer::{decode_pointer, navigate, node_url};
use crate::registry::MetaSchemaRegistry;

/// One indexed schema node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub url: Url,
    pub draft: Draft,
    /// Document the node belongs to.
    pub document: Url,
    /// Raw pointer segments from the document root.
    pub pointer: Vec<String>,
}

/// Canonical node URL -> entry, in URL order.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    nodes: BTreeMap<Url, IndexEntry>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns `false` if the URL was already indexed.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        if self.nodes.contains_key(&entry.url) {
            return false;
        }
        self.nodes.insert(entry.url.clone(), entry);
        true
    }

    pub fn get(&self, url: &Url) -> Option<&IndexEntry> {
        self.nodes.get(url)
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.nodes.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.nodes.values()
    }

    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.nodes.keys()
    }
}

/// Draft-specific structural walk.
pub trait Indexer {
    fn draft(&self) -> Draft;

    /// Index the subtree of `document` at `start`.
    fn index(
        &self,
        documents: &DocumentMap,
        document: &DocumentEntry,
        start: &[String],
        index: &mut NodeIndex,
    );
}

/// Indexer for the built-in drafts, driven by the draft's vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct SchemaIndexer {
    draft: Draft,
}

impl SchemaIndexer {
    pub fn new(draft: Draft) -> Self {
        Self { draft }
    }

    fn visit(
        &self,
        documents: &DocumentMap,
        document: &DocumentEntry,
        node: &Value,
        path: &mut Vec<String>,
        index: &mut NodeIndex,
    ) {
        let url = node_url(&document.document_url, path);
        let inserted = index.insert(IndexEntry {
            url,
            draft: self.draft,
            document: document.document_url.clone(),
            pointer: path.clone(),
        });
        if !inserted {
            return;
        }

        let Value::Object(obj) = node else {
            return;
        };
        for child in self.draft.vocabulary().children(obj) {
            let depth = path.len();
            path.extend(child.segments);
            // Embedded documents are indexed from their own root.
            if documents
                .embedded_at(&node_url(&document.document_url, path))
                .is_none()
            {
                self.visit(documents, document, child.node, path, index);
            }
            path.truncate(depth);
        }
    }
}

impl Indexer for SchemaIndexer {
    fn draft(&self) -> Draft {
        self.draft
    }

    fn index(
        &self,
        documents: &DocumentMap,
        document: &DocumentEntry,
        start: &[String],
        index: &mut NodeIndex,
    ) {
        if let Some(node) = navigate(&document.node, start) {
            let mut path = start.to_vec();
            self.visit(documents, document, node, &mut path, index);
        }
    }
}

/// Build the node index for every document in `documents`.
///
/// # Errors
///
/// `DanglingReference` if a reference was never resolved (the load did not
/// complete), `UnknownDraft` if a document's draft has no registered indexer.
pub fn build_index(
    documents: &DocumentMap,
    registry: &MetaSchemaRegistry,
) -> Result<NodeIndex, CompileError> {
    let indexers: HashMap<Draft, Box<dyn Indexer>> = registry
        .descriptors()
        .map(|d| (d.draft, d.make_indexer()))
        .collect();
    let indexer_for = |entry: &DocumentEntry| {
        indexers
            .get(&entry.draft)
            .ok_or_else(|| CompileError::UnknownDraft {
                url: entry.document_url.clone(),
                schema: entry.draft.key().to_string(),
            })
    };

    let mut index = NodeIndex::new();
    for document in documents.iter() {
        debug!(document = %document.document_url, draft = %document.draft, "indexing document");
        indexer_for(document)?.index(documents, document, &[], &mut index);
    }

    for (site, references) in documents.references() {
        for reference in references {
            let target =
                reference
                    .resolved
                    .as_ref()
                    .ok_or_else(|| CompileError::DanglingReference {
                        source_node: site.clone(),
                        target: reference.target.clone(),
                    })?;
            if index.contains(target) {
                continue;
            }
            let Some(document) = documents.get(target) else {
                continue;
            };
            let start = decode_pointer(target.fragment().unwrap_or(""));
            debug!(%target, "indexing referenced subschema");
            indexer_for(document)?.index(documents, document, &start, &mut index);
        }
    }

    info!(
        documents = documents.len(),
        nodes = index.len(),
        "index complete"
    );
    Ok(index)
}
