/// JSON wire shapes for the Nimbus datastore API
///
/// Each type mirrors a message of the service's protocol-buffer schema in its
/// JSON mapping: camelCase field names, int64 values as decimal strings,
/// bytes as base64 strings, unset fields omitted.

mod int64;

pub mod entity;
pub mod query;
pub mod request;

pub use entity::{Entity, Key, PartitionId, PathElement, Property, Value};
pub use query::{
    CompositeFilter, CompositeOperator, Direction, Filter, KindExpression, PropertyExpression,
    PropertyFilter, PropertyOperator, PropertyOrder, PropertyReference, Query,
};
pub use request::{
    AllocateIdsRequest, AllocateIdsResponse, BeginTransactionRequest, BeginTransactionResponse,
    CommitRequest, CommitResponse, EntityResult, LookupRequest, LookupResponse, Mode, Mutation,
    MutationResult, ReadOptions, RollbackRequest, RollbackResponse, RunQueryRequest,
};

/// Remote method names, appended to `{base}/{datasetId}/`
pub mod method {
    pub const BEGIN_TRANSACTION: &str = "beginTransaction";
    pub const COMMIT: &str = "commit";
    pub const ROLLBACK: &str = "rollback";
    pub const LOOKUP: &str = "lookup";
    pub const ALLOCATE_IDS: &str = "allocateIds";
}
