//! Meta-schema registry: which drafts are known and how to recognize them.
//!
//! The built-in registry is created once, on first use, and is read-only
//! afterwards. Custom registries can be assembled with [`MetaSchemaRegistry::new`]
//! and [`MetaSchemaRegistry::register`] before a session starts.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use url::Url;

use crate::draft::Draft;
use crate::error::CompileError;
use crate::indexer::{Indexer, SchemaIndexer};
use crate::loader::{Loader, SchemaLoader};

type RootPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type LoaderFactory = Box<dyn Fn() -> Box<dyn Loader> + Send + Sync>;
type IndexerFactory = Box<dyn Fn() -> Box<dyn Indexer> + Send + Sync>;

static BUILTIN: Lazy<Arc<MetaSchemaRegistry>> = Lazy::new(|| {
    let mut registry = MetaSchemaRegistry::new();
    for draft in Draft::ALL {
        registry.descriptors.push(MetaSchemaDescriptor::builtin(draft));
    }
    Arc::new(registry)
});

/// One registered draft.
pub struct MetaSchemaDescriptor {
    pub draft: Draft,
    pub meta_schema_url: &'static str,
    is_root_node: RootPredicate,
    make_loader: LoaderFactory,
    make_indexer: IndexerFactory,
}

impl MetaSchemaDescriptor {
    /// Descriptor for a built-in draft, recognized through `$schema`.
    pub fn builtin(draft: Draft) -> Self {
        Self {
            draft,
            meta_schema_url: draft.meta_schema_url(),
            is_root_node: Box::new(move |node: &Value| draft.is_root_node(node)),
            make_loader: Box::new(move || -> Box<dyn Loader> { Box::new(SchemaLoader::new(draft)) }),
            make_indexer: Box::new(move || -> Box<dyn Indexer> {
                Box::new(SchemaIndexer::new(draft))
            }),
        }
    }

    /// Replace the root predicate, keeping the draft's loader and indexer.
    pub fn with_root_predicate(
        mut self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_root_node = Box::new(predicate);
        self
    }

    pub fn key(&self) -> &'static str {
        self.draft.key()
    }

    pub fn is_root_node(&self, node: &Value) -> bool {
        (self.is_root_node)(node)
    }

    pub fn make_loader(&self) -> Box<dyn Loader> {
        (self.make_loader)()
    }

    pub fn make_indexer(&self) -> Box<dyn Indexer> {
        (self.make_indexer)()
    }
}

impl std::fmt::Debug for MetaSchemaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaSchemaDescriptor")
            .field("draft", &self.draft)
            .field("meta_schema_url", &self.meta_schema_url)
            .finish_non_exhaustive()
    }
}

/// Table of known drafts.
#[derive(Debug, Default)]
pub struct MetaSchemaRegistry {
    descriptors: Vec<MetaSchemaDescriptor>,
}

impl MetaSchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry holding every built-in draft.
    pub fn builtin() -> Arc<MetaSchemaRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// Add a draft.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::DuplicateDraft` if the draft key is already registered.
    pub fn register(&mut self, descriptor: MetaSchemaDescriptor) -> Result<(), CompileError> {
        if self.get(descriptor.draft).is_some() {
            return Err(CompileError::DuplicateDraft {
                key: descriptor.key().to_string(),
            });
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn get(&self, draft: Draft) -> Option<&MetaSchemaDescriptor> {
        self.descriptors.iter().find(|d| d.draft == draft)
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetaSchemaDescriptor> {
        self.descriptors.iter()
    }

    /// Find the single draft whose predicate accepts `root`.
    ///
    /// # Errors
    ///
    /// `UnknownDraft` when nothing matches, `AmbiguousDraft` when more than one does.
    pub fn detect(&self, url: &Url, root: &Value) -> Result<&MetaSchemaDescriptor, CompileError> {
        let matches: Vec<&MetaSchemaDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.is_root_node(root))
            .collect();

        match matches.as_slice() {
            [single] => Ok(*single),
            [] => Err(CompileError::UnknownDraft {
                url: url.clone(),
                schema: match root.get("$schema") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "<none>".to_string(),
                },
            }),
            many => Err(CompileError::AmbiguousDraft {
                url: url.clone(),
                drafts: many.iter().map(|d| d.key().to_string()).collect(),
            }),
        }
    }
}
