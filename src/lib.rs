//! Schema Graph
//!
//! Loads JSON Schema documents across drafts and documents, and turns them
//! into a flat, canonically-keyed, uniquely-named node graph for code
//! generators.
//!
//! # Example
//!
//! ```
//! use schema_graph::{CompileOptions, MemoryRetriever, SchemaManager};
//! use serde_json::json;
//! use url::Url;
//!
//! let entry = Url::parse("https://example.com/pet.json").unwrap();
//! let retriever = MemoryRetriever::new().with(
//!     &entry,
//!     json!({
//!         "$schema": "https://json-schema.org/draft/2020-12/schema",
//!         "oneOf": [{ "$ref": "#/$defs/cat" }, { "$ref": "#/$defs/dog" }],
//!         "$defs": { "cat": { "type": "object" }, "dog": { "type": "object" } }
//!     }),
//! );
//!
//! let mut manager = SchemaManager::new(retriever, CompileOptions::default());
//! manager.compile(&entry).unwrap();
//!
//! let cat = Url::parse("https://example.com/pet.json#/$defs/cat").unwrap();
//! assert_eq!(manager.get_name(&cat), Some("Cat"));
//!
//! let union = &manager.get_compound_descriptors(&entry)[0];
//! assert_eq!(union.type_node_ids.len(), 2);
//! ```
//!
//! # Phases
//!
//! | Phase | Operation | Produces |
//! |-------|-----------|----------|
//! | load | [`SchemaManager::load_from_url`] | document map, resolved references |
//! | index | [`SchemaManager::index_nodes`] | node index, compound descriptors, type shapes |
//! | name | [`SchemaManager::name_nodes`] | name table |
//!
//! # Drafts
//!
//! draft-04, draft-06, draft-07, 2019-09 and 2020-12 are built in. A document
//! is assigned its draft from `$schema`; documents that declare none inherit
//! the draft of the document referencing them.

mod compound;
mod document;
mod draft;
mod error;
mod indexer;
mod loader;
mod manager;
mod namer;
mod pointer;
mod registry;
mod retrieve;
mod shape;
mod types;

pub use compound::{describe, CompoundDescriptor, CompoundKind};
pub use document::{DocumentEntry, DocumentMap, Reference};
pub use draft::{ChildSchema, Draft, Vocabulary};
pub use error::{CompileError, LoadError};
pub use indexer::{build_index, IndexEntry, Indexer, NodeIndex, SchemaIndexer};
pub use loader::{Discoveries, EmbeddedDocument, FoundReference, LoadSession, Loader, SchemaLoader};
pub use manager::SchemaManager;
pub use namer::{assign_names, NameTable};
pub use pointer::{decode_pointer, encode_pointer, navigate_fragment, node_url};
pub use registry::{MetaSchemaDescriptor, MetaSchemaRegistry};
pub use retrieve::{
    is_url, load_schema, load_schema_str, source_to_url, AutoRetriever, FileRetriever,
    MappedRetriever, MemoryRetriever, Retriever,
};
pub use shape::{PropertyShape, TypeShape};
pub use types::{json_type_name, CompileOptions, JsonType, DEFAULT_HTTP_TIMEOUT};

#[cfg(feature = "remote")]
pub use retrieve::HttpRetriever;
