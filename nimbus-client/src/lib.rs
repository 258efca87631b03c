/// Nimbus datastore client
///
/// Keys and entities are encoded into the service's JSON protos, sent through
/// a `RequestSender`, and decoded back. `Dataset` is the entry point;
/// `Transaction` sequences begin/commit/rollback around batched reads and writes.

pub mod config;
pub mod connection;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod query;
pub mod transaction;

// Re-export key types
pub use config::{DatasetConfig, DATASTORE_SCOPES, DEFAULT_BASE_URL};
pub use connection::{
    ApiRequest, ApiResponse, HttpConnection, NoopTokenProvider, RequestSender,
    StaticTokenProvider, TokenProvider,
};
pub use dataset::{dataset_id_from_project, Dataset};
pub use error::{ClientError, Result};
pub use nimbus_core::{Entity, Identifier, Key, PathElement, Value};
pub use nimbus_proto::{CommitResponse, Mode};
pub use query::{Kinds, NamespacedKind, Query, DEFAULT_NAMESPACE};
pub use transaction::Transaction;
