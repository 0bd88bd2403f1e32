//! Reference loading across documents and drafts.
//!
//! A [`LoadSession`] drives a work list of fetch and discover jobs over the
//! shared [`DocumentMap`]. Each discover job is handed to the [`Loader`] of the
//! document's own draft, so a draft-07 document referencing a 2020-12 one is
//! walked by both drafts' rules. Documents are inserted before they are walked
//! and walked locations are remembered, so revisits are no-ops and reference
//! cycles terminate.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::document::{DocumentEntry, DocumentMap};
use crate::draft::{Draft, Vocabulary};
use crate::error::CompileError;
use crate::pointer::{anchor_url, decode_pointer, document_of, navigate, node_url};
use crate::registry::MetaSchemaRegistry;
use crate::retrieve::Retriever;

/// Draft-specific reference discovery.
pub trait Loader {
    fn draft(&self) -> Draft;

    /// Walk `document` from the node at `start`, collecting scopes, anchors
    /// and references without touching the map.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::InvalidUrl` if an id or reference cannot be
    /// resolved against its base URL.
    fn discover(
        &self,
        documents: &DocumentMap,
        document: &DocumentEntry,
        start: &[String],
    ) -> Result<Discoveries, CompileError>;
}

/// A non-fragment `$id` found below a document root.
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    /// Canonical location of the node in the enclosing document.
    pub location: Url,
    pub document_url: Url,
    pub node: Value,
    /// Walked together with the enclosing document (same draft).
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundReference {
    pub site: Url,
    pub keyword: &'static str,
    pub target: Url,
}

/// Everything one walk found.
#[derive(Debug, Default)]
pub struct Discoveries {
    pub walked: HashSet<Url>,
    pub embedded: Vec<EmbeddedDocument>,
    /// `(anchor URL, node URL)` pairs in declaration order.
    pub anchors: Vec<(Url, Url)>,
    pub references: Vec<FoundReference>,
}

/// The loader shared by every built-in draft; behavior comes from the
/// draft's [`Vocabulary`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaLoader {
    draft: Draft,
}

impl SchemaLoader {
    pub fn new(draft: Draft) -> Self {
        Self { draft }
    }
}

impl Loader for SchemaLoader {
    fn draft(&self) -> Draft {
        self.draft
    }

    fn discover(
        &self,
        documents: &DocumentMap,
        document: &DocumentEntry,
        start: &[String],
    ) -> Result<Discoveries, CompileError> {
        let Some(node) = navigate(&document.node, start) else {
            return Err(CompileError::DanglingReference {
                source_node: document.root_url(),
                target: node_url(&document.document_url, start),
            });
        };

        let mut walk = Walk {
            draft: self.draft,
            vocabulary: self.draft.vocabulary(),
            documents,
            root: Frame {
                document: document.document_url.clone(),
                depth: 0,
            },
            scopes: Vec::new(),
            found: Discoveries::default(),
        };
        let mut path = start.to_vec();
        walk.visit(node, &mut path, true)?;
        Ok(walk.found)
    }
}

/// One lexical `$id` scope: its base URL and the path depth where it starts.
struct Frame {
    document: Url,
    depth: usize,
}

struct Walk<'a> {
    draft: Draft,
    vocabulary: &'static Vocabulary,
    documents: &'a DocumentMap,
    root: Frame,
    scopes: Vec<Frame>,
    found: Discoveries,
}

impl Walk<'_> {
    fn frame(&self) -> &Frame {
        self.scopes.last().unwrap_or(&self.root)
    }

    fn site(&self, path: &[String]) -> Url {
        let frame = self.frame();
        node_url(&frame.document, &path[frame.depth..])
    }

    fn visit(
        &mut self,
        node: &Value,
        path: &mut Vec<String>,
        is_start: bool,
    ) -> Result<(), CompileError> {
        let site = self.site(path);
        if self.documents.is_walked(&site) || !self.found.walked.insert(site.clone()) {
            return Ok(());
        }
        let Value::Object(obj) = node else {
            return Ok(());
        };

        let mut pushed = false;
        if !is_start {
            if let Some(id) = self.vocabulary.scope_id(obj) {
                let document_url = document_of(&join(&self.frame().document, id)?);
                // A foreign $schema hands the subtree to that draft's loader.
                let inline = !obj.contains_key("$schema") || self.draft.is_root_node(node);
                trace!(location = %site, document = %document_url, inline, "embedded document");
                self.found.embedded.push(EmbeddedDocument {
                    location: site,
                    document_url: document_url.clone(),
                    node: node.clone(),
                    inline,
                });
                if !inline {
                    return Ok(());
                }
                self.found
                    .walked
                    .insert(node_url::<&str>(&document_url, &[]));
                self.scopes.push(Frame {
                    document: document_url,
                    depth: path.len(),
                });
                pushed = true;
            }
        }

        let here = self.site(path);
        let base = self.frame().document.clone();
        for name in self.vocabulary.anchors(obj) {
            self.found.anchors.push((anchor_url(&base, name), here.clone()));
        }
        for (keyword, raw) in self.vocabulary.references(obj) {
            let target = join(&base, raw)?;
            self.found.references.push(FoundReference {
                site: here.clone(),
                keyword,
                target,
            });
        }

        for child in self.vocabulary.children(obj) {
            let depth = path.len();
            path.extend(child.segments);
            let result = self.visit(child.node, path, false);
            path.truncate(depth);
            result?;
        }

        if pushed {
            self.scopes.pop();
        }
        Ok(())
    }
}

fn join(base: &Url, raw: &str) -> Result<Url, CompileError> {
    base.join(raw).map_err(|source| CompileError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

enum Job {
    Fetch {
        url: Url,
        expected: Option<Draft>,
        fallback: Draft,
    },
    Discover {
        document: Url,
        start: Vec<String>,
    },
}

/// One loading pass over a shared document map.
///
/// Single-threaded: jobs run one at a time and every write to the map
/// happens here, so the first entry inserted for a URL always wins.
pub struct LoadSession<'a> {
    registry: &'a MetaSchemaRegistry,
    retriever: &'a dyn Retriever,
    documents: &'a mut DocumentMap,
    loaders: HashMap<Draft, Box<dyn Loader>>,
    fetches: VecDeque<Job>,
    discovers: VecDeque<Job>,
}

impl<'a> LoadSession<'a> {
    pub fn new(
        registry: &'a MetaSchemaRegistry,
        retriever: &'a dyn Retriever,
        documents: &'a mut DocumentMap,
    ) -> Self {
        let loaders = registry
            .descriptors()
            .map(|d| (d.draft, d.make_loader()))
            .collect();
        Self {
            registry,
            retriever,
            documents,
            loaders,
            fetches: VecDeque::new(),
            discovers: VecDeque::new(),
        }
    }

    /// Load `url` and everything it references.
    ///
    /// `expected` constrains the draft the entry document must declare;
    /// `fallback` is used when it declares none. A URL whose document is
    /// already present is not fetched again, but its fragment is still
    /// resolved and walked.
    ///
    /// # Errors
    ///
    /// Fails on the first retrieval, detection or resolution error; nothing
    /// is retried.
    pub fn load_from_url(
        &mut self,
        url: &Url,
        expected: Option<Draft>,
        fallback: Draft,
    ) -> Result<(), CompileError> {
        let before = self.documents.len();
        self.fetches.push_back(Job::Fetch {
            url: document_of(url),
            expected,
            fallback,
        });

        loop {
            while let Some(job) = self.discovers.pop_front().or_else(|| self.fetches.pop_front()) {
                match job {
                    Job::Fetch {
                        url,
                        expected,
                        fallback,
                    } => self.fetch(url, expected, fallback)?,
                    Job::Discover { document, start } => self.discover(&document, start)?,
                }
            }

            let mut pending = self.documents.resolve_references()?;
            let entry = self
                .documents
                .canonicalize(url)
                .ok_or_else(|| CompileError::DanglingReference {
                    source_node: document_of(url),
                    target: url.clone(),
                })?;
            if !self.documents.is_walked(&entry) && !pending.contains(&entry) {
                pending.push(entry);
            }
            if pending.is_empty() {
                break;
            }
            for target in pending {
                debug!(%target, "walking referenced subschema");
                self.discovers.push_back(Job::Discover {
                    document: document_of(&target),
                    start: decode_pointer(target.fragment().unwrap_or("")),
                });
            }
        }

        info!(
            url = %url,
            documents = self.documents.len(),
            added = self.documents.len() - before,
            "load complete"
        );
        Ok(())
    }

    fn fetch(
        &mut self,
        url: Url,
        expected: Option<Draft>,
        fallback: Draft,
    ) -> Result<(), CompileError> {
        if self.documents.contains(&url) {
            trace!(%url, "already loaded");
            return Ok(());
        }

        debug!(%url, "fetching document");
        let node = self.retriever.retrieve(&url)?;
        let draft = self.detect(&url, &node, fallback)?;
        if let Some(expected) = expected {
            if expected != draft {
                return Err(CompileError::SchemaMismatch {
                    url,
                    expected: expected.key().to_string(),
                    detected: draft.key().to_string(),
                });
            }
        }

        let document_url = match node.as_object().and_then(|obj| draft.vocabulary().scope_id(obj)) {
            Some(id) => document_of(&join(&url, id)?),
            None => url.clone(),
        };
        if self.documents.contains(&document_url) {
            self.documents.add_alias(url, document_url);
            return Ok(());
        }

        debug!(%url, document = %document_url, draft = %draft, "loaded document");
        self.documents.insert(DocumentEntry {
            retrieval_url: url,
            document_url: document_url.clone(),
            draft,
            node,
            embedded_at: None,
        });
        self.discovers.push_back(Job::Discover {
            document: document_url,
            start: Vec::new(),
        });
        Ok(())
    }

    fn discover(&mut self, document: &Url, start: Vec<String>) -> Result<(), CompileError> {
        let Some(entry) = self.documents.get(document) else {
            return Ok(());
        };
        let draft = entry.draft;
        let retrieval_url = entry.retrieval_url.clone();
        let loader = self.loaders.get(&draft).ok_or_else(|| CompileError::UnknownDraft {
            url: document.clone(),
            schema: draft.key().to_string(),
        })?;
        let found = loader.discover(self.documents, entry, &start)?;

        for site in found.walked {
            self.documents.mark_walked(site);
        }

        for embedded in found.embedded {
            let embedded_draft = if embedded.inline {
                draft
            } else {
                self.detect(&embedded.document_url, &embedded.node, draft)?
            };
            let document_url = embedded.document_url.clone();
            let inserted = self.documents.insert(DocumentEntry {
                retrieval_url: retrieval_url.clone(),
                document_url: embedded.document_url,
                draft: embedded_draft,
                node: embedded.node,
                embedded_at: Some(embedded.location),
            });
            if inserted && !embedded.inline {
                self.discovers.push_back(Job::Discover {
                    document: document_url,
                    start: Vec::new(),
                });
            }
        }

        for (anchor, node) in found.anchors {
            self.documents.add_anchor(anchor, node);
        }

        for reference in found.references {
            trace!(site = %reference.site, keyword = reference.keyword, target = %reference.target, "reference");
            let target_document = document_of(&reference.target);
            if !self.documents.contains(&target_document) {
                self.fetches.push_back(Job::Fetch {
                    url: target_document,
                    expected: None,
                    fallback: draft,
                });
            }
            self.documents
                .add_reference(reference.site, reference.keyword, reference.target);
        }
        Ok(())
    }

    /// Detect the draft of a root node, falling back when it declares none.
    fn detect(&self, url: &Url, node: &Value, fallback: Draft) -> Result<Draft, CompileError> {
        match self.registry.detect(url, node) {
            Ok(descriptor) => Ok(descriptor.draft),
            Err(CompileError::UnknownDraft { .. }) if node.get("$schema").is_none() => {
                warn!(%url, draft = %fallback, "document has no $schema, assuming draft");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }
}
