//! The compilation façade.
//!
//! A [`SchemaManager`] owns one session's document map, node index and name
//! table and runs the phases in order: load, index, name. Every load bumps a
//! generation counter and drops the index and names built from the previous
//! document set, so a stamp taken earlier can be checked with
//! [`SchemaManager::check_generation`]. A failed load restores the document
//! map it started from and blocks indexing until a later load succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::compound::{describe, CompoundDescriptor};
use crate::document::DocumentMap;
use crate::draft::Draft;
use crate::error::CompileError;
use crate::indexer::{build_index, NodeIndex};
use crate::loader::LoadSession;
use crate::namer::{assign_names, NameTable};
use crate::registry::MetaSchemaRegistry;
use crate::retrieve::Retriever;
use crate::shape::TypeShape;
use crate::types::CompileOptions;

/// Index-phase results, built together.
#[derive(Debug)]
struct Indexed {
    nodes: NodeIndex,
    compounds: BTreeMap<Url, Vec<CompoundDescriptor>>,
    shapes: BTreeMap<Url, TypeShape>,
}

pub struct SchemaManager {
    registry: Arc<MetaSchemaRegistry>,
    retriever: Box<dyn Retriever>,
    options: CompileOptions,
    documents: DocumentMap,
    indexed: Option<Indexed>,
    names: Option<NameTable>,
    generation: u64,
    /// Set while the most recent load failed.
    load_failed: bool,
}

impl SchemaManager {
    /// A manager over the built-in drafts.
    pub fn new(retriever: impl Retriever + 'static, options: CompileOptions) -> Self {
        Self::with_registry(MetaSchemaRegistry::builtin(), retriever, options)
    }

    pub fn with_registry(
        registry: Arc<MetaSchemaRegistry>,
        retriever: impl Retriever + 'static,
        options: CompileOptions,
    ) -> Self {
        Self {
            registry,
            retriever: Box::new(retriever),
            options,
            documents: DocumentMap::new(),
            indexed: None,
            names: None,
            generation: 0,
            load_failed: false,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Load `url` as an entry document, with the configured expected draft.
    ///
    /// # Errors
    ///
    /// Any load, detection or reference error aborts the load.
    pub fn load_from_url(&mut self, url: &Url) -> Result<(), CompileError> {
        self.load_with(url, None, self.options.expected_draft)
    }

    /// Load `url` on behalf of `referencing`.
    ///
    /// A document without `$schema` takes the draft of `referencing` when
    /// that document is loaded, and the configured default draft otherwise.
    ///
    /// # Errors
    ///
    /// Any load, detection or reference error aborts the load. The document
    /// map is left as it was before the call.
    pub fn load_with(
        &mut self,
        url: &Url,
        referencing: Option<&Url>,
        expected: Option<Draft>,
    ) -> Result<(), CompileError> {
        let fallback = referencing
            .and_then(|r| self.documents.get(r))
            .map(|entry| entry.draft)
            .unwrap_or(self.options.default_draft);

        self.generation += 1;
        self.indexed = None;
        self.names = None;

        let snapshot = self.documents.clone();
        let result = LoadSession::new(&self.registry, &*self.retriever, &mut self.documents)
            .load_from_url(url, expected, fallback);
        if result.is_err() {
            warn!(url = %url, "load failed, restoring previous document map");
            self.documents = snapshot;
        }
        self.load_failed = result.is_err();
        result
    }

    /// Build the node index, compound descriptors and type shapes.
    ///
    /// Returns the generation the results belong to.
    ///
    /// # Errors
    ///
    /// `PhaseOrder` if nothing was loaded or the last load failed; otherwise
    /// index or compound errors.
    pub fn index_nodes(&mut self) -> Result<u64, CompileError> {
        if self.load_failed {
            return Err(CompileError::PhaseOrder {
                operation: "index_nodes",
                required: "a successful load_from_url",
            });
        }
        if self.documents.is_empty() {
            return Err(CompileError::PhaseOrder {
                operation: "index_nodes",
                required: "load_from_url",
            });
        }
        self.names = None;

        let nodes = build_index(&self.documents, &self.registry)?;
        let mut compounds = BTreeMap::new();
        let mut shapes = BTreeMap::new();
        for url in nodes.urls() {
            let descriptors = describe(url, &self.documents, &nodes)?;
            if let Some(shape) = TypeShape::build(url, &self.documents, &nodes, descriptors.clone())
            {
                shapes.insert(url.clone(), shape);
            }
            if !descriptors.is_empty() {
                compounds.insert(url.clone(), descriptors);
            }
        }

        self.indexed = Some(Indexed {
            nodes,
            compounds,
            shapes,
        });
        Ok(self.generation)
    }

    /// Assign names to every indexed node.
    ///
    /// # Errors
    ///
    /// `PhaseOrder` if [`index_nodes`](Self::index_nodes) has not run since the last load.
    pub fn name_nodes(&mut self) -> Result<u64, CompileError> {
        let indexed = self.indexed.as_ref().ok_or(CompileError::PhaseOrder {
            operation: "name_nodes",
            required: "index_nodes",
        })?;
        let names = assign_names(&indexed.nodes, &self.options.name_placeholder);
        info!(names = names.len(), generation = self.generation, "naming complete");
        self.names = Some(names);
        Ok(self.generation)
    }

    /// Load, index and name in one go.
    ///
    /// # Errors
    ///
    /// The first error of any phase.
    pub fn compile(&mut self, url: &Url) -> Result<u64, CompileError> {
        self.load_from_url(url)?;
        self.index_nodes()?;
        self.name_nodes()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check that results stamped with `stamp` are still current.
    ///
    /// # Errors
    ///
    /// `StaleGeneration` when a load happened after the stamp was taken.
    pub fn check_generation(&self, stamp: u64) -> Result<(), CompileError> {
        if stamp == self.generation {
            Ok(())
        } else {
            Err(CompileError::StaleGeneration {
                stamp,
                current: self.generation,
            })
        }
    }

    pub fn documents(&self) -> &DocumentMap {
        &self.documents
    }

    pub fn index(&self) -> Option<&NodeIndex> {
        self.indexed.as_ref().map(|i| &i.nodes)
    }

    pub fn names(&self) -> Option<&NameTable> {
        self.names.as_ref()
    }

    /// Indexed node URLs with their draft, in URL order.
    pub fn nodes(&self) -> impl Iterator<Item = (&Url, Draft)> {
        self.index()
            .into_iter()
            .flat_map(|index| index.iter().map(|entry| (&entry.url, entry.draft)))
    }

    /// Canonical indexed URL for `url`.
    ///
    /// Accepts retrieval URLs, anchors and pointers that cross embedded
    /// documents as well as canonical URLs.
    pub fn canonical_url(&self, url: &Url) -> Option<Url> {
        let index = self.index()?;
        if index.contains(url) {
            return Some(url.clone());
        }
        self.documents
            .canonicalize(url)
            .filter(|canonical| index.contains(canonical))
    }

    pub fn get_node(&self, url: &Url) -> Option<&Value> {
        let canonical = self.canonical_url(url)?;
        self.documents.node(&canonical)
    }

    pub fn get_name(&self, url: &Url) -> Option<&str> {
        let canonical = self.canonical_url(url)?;
        self.names.as_ref()?.get(&canonical)
    }

    /// Compound descriptors of a node; empty for simple nodes.
    pub fn get_compound_descriptors(&self, url: &Url) -> &[CompoundDescriptor] {
        self.canonical_url(url)
            .and_then(|canonical| self.indexed.as_ref()?.compounds.get(&canonical))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get_type_shape(&self, url: &Url) -> Option<&TypeShape> {
        let canonical = self.canonical_url(url)?;
        self.indexed.as_ref()?.shapes.get(&canonical)
    }

    /// Resolved target of the first reference declared at a node.
    pub fn get_reference(&self, url: &Url) -> Option<&Url> {
        let canonical = self.canonical_url(url)?;
        self.documents
            .references_at(&canonical)
            .iter()
            .find_map(|r| r.resolved.as_ref())
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("options", &self.options)
            .field("documents", &self.documents.len())
            .field("indexed", &self.index().map(NodeIndex::len))
            .field("named", &self.names.is_some())
            .field("generation", &self.generation)
            .field("load_failed", &self.load_failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::MemoryRetriever;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn manager() -> SchemaManager {
        let retriever = MemoryRetriever::new().with(
            &url("https://example.com/pet.json"),
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "oneOf": [{ "$ref": "#/$defs/cat" }, { "$ref": "#/$defs/dog" }],
                "$defs": {
                    "cat": { "$anchor": "cat", "type": "object" },
                    "dog": { "type": "object" }
                }
            }),
        );
        SchemaManager::new(retriever, CompileOptions::default())
    }

    #[test]
    fn phases_must_run_in_order() {
        let mut manager = manager();
        assert!(matches!(
            manager.index_nodes(),
            Err(CompileError::PhaseOrder { operation: "index_nodes", .. })
        ));
        manager.load_from_url(&url("https://example.com/pet.json")).unwrap();
        assert!(matches!(
            manager.name_nodes(),
            Err(CompileError::PhaseOrder { operation: "name_nodes", .. })
        ));
        manager.index_nodes().unwrap();
        manager.name_nodes().unwrap();
    }

    #[test]
    fn lookups_accept_anchor_urls() {
        let mut manager = manager();
        manager.compile(&url("https://example.com/pet.json")).unwrap();
        let by_anchor = url("https://example.com/pet.json#cat");
        assert_eq!(
            manager.canonical_url(&by_anchor),
            Some(url("https://example.com/pet.json#/$defs/cat"))
        );
        assert_eq!(manager.get_name(&by_anchor), Some("Cat"));
        assert_eq!(manager.get_node(&by_anchor).unwrap()["type"], "object");
    }

    #[test]
    fn reference_and_compound_lookups() {
        let mut manager = manager();
        manager.compile(&url("https://example.com/pet.json")).unwrap();
        assert_eq!(
            manager.get_reference(&url("https://example.com/pet.json#/oneOf/1")),
            Some(&url("https://example.com/pet.json#/$defs/dog"))
        );
        let descriptors = manager.get_compound_descriptors(&url("https://example.com/pet.json"));
        assert_eq!(descriptors.len(), 1);
        assert!(manager
            .get_compound_descriptors(&url("https://example.com/pet.json#/$defs/dog"))
            .is_empty());
    }

    #[test]
    fn reload_invalidates_results() {
        let mut manager = manager();
        let stamp = manager.compile(&url("https://example.com/pet.json")).unwrap();
        assert!(manager.check_generation(stamp).is_ok());

        manager.load_from_url(&url("https://example.com/pet.json")).unwrap();
        assert!(manager.index().is_none());
        assert!(manager.get_name(&url("https://example.com/pet.json")).is_none());
        assert!(matches!(
            manager.check_generation(stamp),
            Err(CompileError::StaleGeneration { .. })
        ));
    }
}
