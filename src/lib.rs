//! # ragcell
//!
//! A multi-tenant document indexing and retrieval core for RAG backends.
//!
//! ragcell ingests uploaded documents (txt, md, pdf, docx), splits them
//! into overlapping chunks, embeds them, and stores them in per-scope
//! vector collections — one shared `common` collection plus one private
//! collection per user. A reconciliation engine keeps the collections
//! consistent with the authoritative file store, and a retrieval engine
//! serves similarity search results with per-chunk provenance.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────┐
//! │  Upload  │──▶│    Indexer     │──▶│ SQLite per scope │
//! │ txt/pdf/ │   │ load → chunk  │   │  f32 BLOB vecs  │
//! │ md/docx  │   │ → embed batch │   └───────┬─────────┘
//! └──────────┘   └───────────────┘           │
//!                       ▲                    ▼
//!                ┌──────┴──────┐      ┌────────────┐
//!                │  Reconcile  │      │  Retrieval │
//!                │ stats/clean │      │  top-k sim │
//!                └─────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scope`] | Tenancy scopes and collection naming |
//! | [`models`] | Core data types |
//! | [`loader`] | Multi-format text extraction |
//! | [`chunker`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector collection storage |
//! | [`registry`] | Lazy per-scope collection handles |
//! | [`files`] | Authoritative file storage |
//! | [`metadata`] | Document metadata storage |
//! | [`service`] | Service wiring |
//! | [`indexer`] | Upload / index / remove / list |
//! | [`reconcile`] | Drift detection, cleanup, reindex |
//! | [`retrieval`] | Similarity search |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod files;
pub mod indexer;
pub mod loader;
pub mod metadata;
pub mod models;
pub mod reconcile;
pub mod registry;
pub mod retrieval;
pub mod scope;
pub mod service;
pub mod store;

pub use error::{RagError, Result};
pub use scope::Scope;
pub use service::RagService;
