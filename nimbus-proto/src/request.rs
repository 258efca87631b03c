use serde::{Deserialize, Serialize};

use crate::{Entity, Key, PartitionId, Query};

/// Commit mode of a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Transactional,
    NonTransactional,
}

/// MutationProto: buckets of entities and keys applied in one commit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upsert: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_auto_id: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginTransactionRequest {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginTransactionResponse {
    /// Opaque transaction handle
    #[serde(default)]
    pub transaction: String,
}

/// Body of a `commit` call. A bare `{transaction}` body commits an open
/// transaction; a body with `mode` and `mutation` applies writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation: Option<Mutation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    #[serde(default)]
    pub index_updates: i64,
    /// Keys assigned to `insertAutoId` entities, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_auto_id_key: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_result: Option<MutationResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackResponse {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
    #[serde(default)]
    pub key: Vec<Key>,
}

/// Wrapper around an entity in lookup and query results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityResult {
    #[serde(default)]
    pub entity: Entity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub found: Vec<EntityResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<EntityResult>,
    /// Keys the service did not get to; the caller may look them up again
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocateIdsRequest {
    #[serde(default)]
    pub key: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocateIdsResponse {
    #[serde(default)]
    pub key: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,
    pub query: Query,
}
