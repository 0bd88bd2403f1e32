//! The shared document map of one load session.
//!
//! Holds every retrieved (or embedded) document, the retrieval aliases, the
//! anchor table and the reference sites discovered by the loaders. Entries
//! are created once and never mutated afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use url::Url;

use crate::draft::Draft;
use crate::error::CompileError;
use crate::pointer::{
    anchor_url, child, decode_pointer, document_of, fragment_text, is_pointer_fragment, navigate,
    node_url,
};

/// One document: retrieved from a URL or embedded under a non-fragment `$id`.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    /// Where the bytes came from (the parent's URL for embedded documents).
    pub retrieval_url: Url,
    /// Base URL of the document, after applying the root `$id`.
    pub document_url: Url,
    pub draft: Draft,
    pub node: Value,
    /// Canonical location in the enclosing document, for embedded documents.
    pub embedded_at: Option<Url>,
}

impl DocumentEntry {
    /// Canonical URL of the document root.
    pub fn root_url(&self) -> Url {
        node_url::<&str>(&self.document_url, &[])
    }
}

/// A reference keyword found at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub keyword: &'static str,
    /// The keyword value resolved against the node's base URL.
    pub target: Url,
    /// Canonical node URL of the target, once resolved.
    pub resolved: Option<Url>,
}

/// All documents of a session, keyed by document URL.
#[derive(Debug, Default, Clone)]
pub struct DocumentMap {
    documents: BTreeMap<Url, DocumentEntry>,
    aliases: HashMap<Url, Url>,
    embedded: HashMap<Url, Url>,
    anchors: HashMap<Url, Url>,
    references: BTreeMap<Url, Vec<Reference>>,
    walked: HashSet<Url>,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in URL order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.documents.values()
    }

    /// Whether `url` (fragment ignored) names a known document or retrieval alias.
    pub fn contains(&self, url: &Url) -> bool {
        self.get(url).is_some()
    }

    /// Look a document up by document URL or retrieval URL; the fragment is ignored.
    pub fn get(&self, url: &Url) -> Option<&DocumentEntry> {
        let key = document_of(url);
        self.documents.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|target| self.documents.get(target))
        })
    }

    /// Register a document. The first entry for a document URL wins.
    ///
    /// Returns `false` when an entry already existed; the new one is discarded.
    pub fn insert(&mut self, entry: DocumentEntry) -> bool {
        if self.documents.contains_key(&entry.document_url) {
            return false;
        }
        if entry.retrieval_url != entry.document_url && entry.embedded_at.is_none() {
            self.aliases
                .entry(entry.retrieval_url.clone())
                .or_insert_with(|| entry.document_url.clone());
        }
        if let Some(location) = &entry.embedded_at {
            self.embedded
                .insert(location.clone(), entry.document_url.clone());
        }
        self.documents.insert(entry.document_url.clone(), entry);
        true
    }

    /// Record that `retrieval_url` serves the document at `document_url`.
    pub fn add_alias(&mut self, retrieval_url: Url, document_url: Url) {
        if retrieval_url != document_url {
            self.aliases.entry(retrieval_url).or_insert(document_url);
        }
    }

    /// Embedded document starting at a canonical location, if any.
    pub fn embedded_at(&self, location: &Url) -> Option<&Url> {
        self.embedded.get(location)
    }

    /// Register an anchor. The first declaration wins.
    pub fn add_anchor(&mut self, anchor: Url, node: Url) {
        self.anchors.entry(anchor).or_insert(node);
    }

    pub fn add_reference(&mut self, site: Url, keyword: &'static str, target: Url) {
        let refs = self.references.entry(site).or_default();
        if !refs.iter().any(|r| r.keyword == keyword && r.target == target) {
            refs.push(Reference {
                keyword,
                target,
                resolved: None,
            });
        }
    }

    /// References declared at `site`.
    pub fn references_at(&self, site: &Url) -> &[Reference] {
        self.references
            .get(site)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every reference site with its references, in URL order.
    pub fn references(&self) -> impl Iterator<Item = (&Url, &[Reference])> {
        self.references.iter().map(|(site, refs)| (site, refs.as_slice()))
    }

    /// Mark a canonical node location as visited by a loader walk.
    ///
    /// Returns `false` if it was already visited.
    pub fn mark_walked(&mut self, location: Url) -> bool {
        self.walked.insert(location)
    }

    pub fn is_walked(&self, location: &Url) -> bool {
        self.walked.contains(location)
    }

    /// Canonical node URL for any URL pointing into a loaded document.
    ///
    /// Retrieval aliases map onto document URLs, plain-name fragments go
    /// through the anchor table, and pointers that cross into an embedded
    /// document are rebased onto it. Returns `None` when nothing is there.
    pub fn canonicalize(&self, url: &Url) -> Option<Url> {
        let document = self.get(url)?;
        let fragment = url.fragment().unwrap_or("");
        if !is_pointer_fragment(fragment) {
            let anchor = anchor_url(&document.document_url, &fragment_text(url));
            return self.anchors.get(&anchor).cloned();
        }
        self.walk_pointer(document, &decode_pointer(fragment))
    }

    /// Canonical URL of `segments` below the node at `base`.
    pub fn locate<S: AsRef<str>>(&self, base: &Url, segments: &[S]) -> Option<Url> {
        let document = self.get(base)?;
        let mut path = decode_pointer(base.fragment().unwrap_or(""));
        path.extend(segments.iter().map(|s| s.as_ref().to_string()));
        self.walk_pointer(document, &path)
    }

    /// The raw node at a canonical URL.
    pub fn node(&self, url: &Url) -> Option<&Value> {
        let document = self.get(url)?;
        navigate(
            &document.node,
            &decode_pointer(url.fragment().unwrap_or("")),
        )
    }

    fn walk_pointer(&self, start: &DocumentEntry, segments: &[String]) -> Option<Url> {
        let mut document = start;
        let mut current = &start.node;
        let mut path: Vec<&str> = Vec::with_capacity(segments.len());

        for segment in segments {
            current = child(current, segment)?;
            path.push(segment);
            let location = node_url(&document.document_url, &path);
            if let Some(inner) = self.embedded.get(&location) {
                document = self.documents.get(inner)?;
                current = &document.node;
                path.clear();
            }
        }
        Some(node_url(&document.document_url, &path))
    }

    /// Resolve every pending reference to its canonical node URL.
    ///
    /// Returns resolved targets that no loader walk has visited yet, so the
    /// caller can discover them too.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::DanglingReference` for the first target that
    /// cannot be found.
    pub fn resolve_references(&mut self) -> Result<Vec<Url>, CompileError> {
        let mut resolved = Vec::new();
        for (site, refs) in &self.references {
            for (i, reference) in refs.iter().enumerate() {
                if reference.resolved.is_some() {
                    continue;
                }
                let target =
                    self.canonicalize(&reference.target)
                        .ok_or_else(|| CompileError::DanglingReference {
                            source_node: site.clone(),
                            target: reference.target.clone(),
                        })?;
                resolved.push((site.clone(), i, target));
            }
        }

        let mut unvisited = Vec::new();
        for (site, i, target) in resolved {
            if !self.walked.contains(&target) && !unvisited.contains(&target) {
                unvisited.push(target.clone());
            }
            if let Some(reference) = self.references.get_mut(&site).and_then(|r| r.get_mut(i)) {
                reference.resolved = Some(target);
            }
        }
        Ok(unvisited)
    }
}
