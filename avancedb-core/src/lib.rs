//! `avancedb-core`: the sharded document store and parallel map/reduce
//! executor underneath a CouchDB-compatible document database.
//!
//! This crate is the in-memory core only. The HTTP/REST surface, the
//! embedded JavaScript engine, persistence, and CLI/config/logging
//! wiring for a standalone server are explicit external collaborators —
//! see `runtime::ScriptRuntime` for the seam the JS engine plugs into.
//!
//! ```
//! use avancedb_core::{Database, DatabaseConfig};
//! use serde_json::json;
//!
//! let db = Database::new(DatabaseConfig::default().with_shard_count(4));
//! let doc = db.set_document("widget", json!({"color": "red"})).unwrap();
//! assert!(doc.rev().to_string().starts_with("1-"));
//! assert_eq!(db.doc_count(), 1);
//! ```

pub mod collation;
pub mod database;
pub mod document;
pub mod error;
pub mod logging;
pub mod mapreduce;
pub mod options;
pub mod runtime;
pub mod shard;
pub mod value;

pub use database::{BulkDocumentInput, BulkItemResult, Database};
pub use document::{Document, Revision};
pub use error::{AvanceError, Result};
pub use mapreduce::{MapReduceExecutor, MapReduceOutcome, MapReduceResults, MapReduceTask, MapReduceThreadPool, ViewRow};
pub use options::{DatabaseConfig, PostAllDocumentsOptions, ViewQueryOptions};
pub use runtime::{NativeClosureRuntime, ScriptRuntime};
pub use shard::{DocumentCollection, ShardGuard};
pub use value::{ScriptArray, ScriptObject, ScriptType, ScriptValue};
