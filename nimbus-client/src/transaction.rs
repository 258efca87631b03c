/// Transaction coordinator
///
/// A `Transaction` starts without an id (auto-commit mode). `begin()` assigns
/// an id from the service; `commit()` or `rollback()` finalize it. Reads and
/// writes are composed from the entity codec and sent through the shared
/// `RequestSender`, one request per call.
use crate::connection::{ApiRequest, RequestSender};
use crate::convert::*;
use crate::error::{ClientError, Result};
use crate::query::Query;
use nimbus_core::{Entity, Key};
use nimbus_proto::{self as proto, method, Mode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct TransactionState {
    /// None until begin() succeeds
    id: Option<String>,
    /// Set once commit or rollback has a response, success or not
    finalized: bool,
}

/// Where requests go and how mutations are scoped; shared by every
/// transaction of a dataset.
#[derive(Debug)]
pub(crate) struct Endpoint {
    pub(crate) base_url: String,
    pub(crate) dataset_id: String,
    pub(crate) transactional_mutations: bool,
}

impl Endpoint {
    fn uri(&self, method: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.dataset_id,
            method
        )
    }
}

/// Handle to one transaction. Clones share the same state.
///
/// No ordering is enforced between overlapping calls on the same handle;
/// the service decides how they interleave.
#[derive(Clone)]
pub struct Transaction {
    connection: Arc<dyn RequestSender>,
    endpoint: Arc<Endpoint>,
    state: Arc<Mutex<TransactionState>>,
}

impl Transaction {
    pub(crate) fn new(connection: Arc<dyn RequestSender>, endpoint: Arc<Endpoint>) -> Self {
        Self {
            connection,
            endpoint,
            state: Arc::new(Mutex::new(TransactionState::default())),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.endpoint.dataset_id
    }

    /// Server-assigned id, None in auto-commit mode
    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }

    /// Mode and transaction id a mutation is sent with.
    ///
    /// Always NON_TRANSACTIONAL unless transactional mutations are enabled in
    /// the config and this transaction has been begun.
    pub fn mutation_mode(&self) -> (Mode, Option<String>) {
        if self.endpoint.transactional_mutations {
            if let Some(id) = self.id() {
                return (Mode::Transactional, Some(id));
            }
        }
        (Mode::NonTransactional, None)
    }

    fn read_options(&self) -> Option<proto::ReadOptions> {
        match self.mutation_mode() {
            (Mode::Transactional, Some(id)) => Some(proto::ReadOptions {
                transaction: Some(id),
            }),
            _ => None,
        }
    }

    /// Ask the service for a transaction id.
    ///
    /// Not guarded: a second call issues a second beginTransaction and the
    /// new id replaces the old one.
    pub async fn begin(&self) -> Result<()> {
        let response: proto::BeginTransactionResponse = self
            .make_request(method::BEGIN_TRANSACTION, &proto::BeginTransactionRequest {})
            .await?;

        if response.transaction.is_empty() {
            return Err(ClientError::Decoding(
                "beginTransaction response carried no transaction".to_string(),
            ));
        }

        info!(dataset = %self.endpoint.dataset_id, transaction = %response.transaction, "transaction started");
        self.state.lock().id = Some(response.transaction);
        Ok(())
    }

    /// Commit the transaction. Finalized afterwards whatever the outcome.
    pub async fn commit(&self) -> Result<()> {
        let request = proto::CommitRequest {
            transaction: self.id(),
            ..Default::default()
        };
        let result: Result<proto::CommitResponse> =
            self.make_request(method::COMMIT, &request).await;
        self.state.lock().finalized = true;

        match &result {
            Ok(_) => info!(transaction = ?request.transaction, "transaction committed"),
            Err(e) => warn!(transaction = ?request.transaction, error = %e, "commit failed"),
        }
        result.map(|_| ())
    }

    /// Roll the transaction back. Finalized afterwards whatever the outcome.
    pub async fn rollback(&self) -> Result<()> {
        let request = proto::RollbackRequest {
            transaction: self.id(),
        };
        let result: Result<proto::RollbackResponse> =
            self.make_request(method::ROLLBACK, &request).await;
        self.state.lock().finalized = true;

        match &result {
            Ok(_) => info!(transaction = ?request.transaction, "transaction rolled back"),
            Err(e) => warn!(transaction = ?request.transaction, error = %e, "rollback failed"),
        }
        result.map(|_| ())
    }

    /// No-op once finalized, otherwise `commit()`.
    pub async fn finalize(&self) -> Result<()> {
        if self.is_finalized() {
            return Ok(());
        }
        self.commit().await
    }

    /// Look up one key. None when the service found nothing.
    pub async fn get(&self, key: &Key) -> Result<Option<(Key, Entity)>> {
        let (keys, entities) = self.get_all(std::slice::from_ref(key)).await?;
        Ok(keys.into_iter().zip(entities).next())
    }

    /// Look up many keys with one `lookup` request.
    ///
    /// Returns parallel vectors of the found keys and entities in the order
    /// the service listed them, which need not match `keys`. Missing and
    /// deferred keys are left out.
    pub async fn get_all(&self, keys: &[Key]) -> Result<(Vec<Key>, Vec<Entity>)> {
        let key_protos = keys
            .iter()
            .map(|key| key_to_key_proto(&self.endpoint.dataset_id, key))
            .collect::<nimbus_core::Result<Vec<_>>>()?;

        let request = proto::LookupRequest {
            read_options: self.read_options(),
            key: key_protos,
        };
        let response: proto::LookupResponse = self.make_request(method::LOOKUP, &request).await?;

        debug!(
            requested = keys.len(),
            found = response.found.len(),
            missing = response.missing.len(),
            deferred = response.deferred.len(),
            "lookup finished"
        );

        let mut found_keys = Vec::with_capacity(response.found.len());
        let mut entities = Vec::with_capacity(response.found.len());
        for result in response.found {
            let mut entity = result.entity;
            let key = entity.key.take().ok_or_else(|| {
                ClientError::Decoding("lookup result entity has no key".to_string())
            })?;
            found_keys.push(key_from_key_proto(key)?);
            entities.push(entity_from_entity_proto(entity)?);
        }

        Ok((found_keys, entities))
    }

    pub async fn put(&self, key: &Key, entity: &Entity) -> Result<proto::CommitResponse> {
        self.put_all(std::slice::from_ref(key), std::slice::from_ref(entity))
            .await
    }

    /// Save entities with one `commit` request.
    ///
    /// Complete keys are sent as updates, incomplete ones as inserts with
    /// server-assigned ids. The raw commit response is returned; assigned
    /// keys are not decoded. Mismatched lengths fail before anything is sent.
    pub async fn put_all(&self, keys: &[Key], entities: &[Entity]) -> Result<proto::CommitResponse> {
        if keys.len() != entities.len() {
            return Err(ClientError::Validation(format!(
                "put_all needs one entity per key, got {} keys and {} entities",
                keys.len(),
                entities.len()
            )));
        }

        let mut mutation = proto::Mutation::default();
        for (key, entity) in keys.iter().zip(entities) {
            let encoded = entity_to_entity_proto_with_key(&self.endpoint.dataset_id, key, entity)?;
            if is_key_complete(key) {
                mutation.update.push(encoded);
            } else {
                mutation.insert_auto_id.push(encoded);
            }
        }

        debug!(
            update = mutation.update.len(),
            insert_auto_id = mutation.insert_auto_id.len(),
            "saving entities"
        );
        self.send_mutation(mutation).await
    }

    pub async fn delete(&self, key: &Key) -> Result<()> {
        self.delete_all(std::slice::from_ref(key)).await
    }

    /// Delete keys with one `commit` request.
    pub async fn delete_all(&self, keys: &[Key]) -> Result<()> {
        let delete = keys
            .iter()
            .map(|key| key_to_key_proto(&self.endpoint.dataset_id, key))
            .collect::<nimbus_core::Result<Vec<_>>>()?;

        debug!(count = delete.len(), "deleting keys");
        self.send_mutation(proto::Mutation {
            delete,
            ..Default::default()
        })
        .await
        .map(|_| ())
    }

    /// Queries are not executed at this layer.
    pub async fn run_query(&self, query: &Query) -> Result<(Vec<Key>, Vec<Entity>)> {
        Err(ClientError::Unimplemented(format!(
            "run_query over kinds {:?} is not supported by the transaction layer",
            query.kinds()
        )))
    }

    /// Send one `commit` carrying `mutation`.
    ///
    /// A TRANSACTIONAL commit ends the transaction on the service, so it
    /// finalizes this handle the same way `commit()` does, and a later
    /// mutation on the finalized handle fails before anything is sent.
    async fn send_mutation(&self, mutation: proto::Mutation) -> Result<proto::CommitResponse> {
        let (mode, transaction) = self.mutation_mode();
        if mode == Mode::Transactional && self.is_finalized() {
            return Err(ClientError::Validation(format!(
                "transaction {} is already finalized",
                transaction.unwrap_or_default()
            )));
        }

        let request = proto::CommitRequest {
            transaction,
            mode: Some(mode),
            mutation: Some(mutation),
        };
        let result = self.make_request(method::COMMIT, &request).await;

        if mode == Mode::Transactional {
            self.state.lock().finalized = true;
            match &result {
                Ok(_) => info!(transaction = ?request.transaction, "transaction committed with mutation"),
                Err(e) => warn!(transaction = ?request.transaction, error = %e, "transactional commit failed"),
            }
        }
        result
    }

    /// POST `body` to `{base_url}/{dataset_id}/{method}` and decode the reply.
    ///
    /// A non-null `error` field in the reply wins over everything else,
    /// including a success status.
    pub(crate) async fn make_request<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let uri = self.endpoint.uri(method);
        let json = serde_json::to_value(body)
            .map_err(|e| ClientError::Encoding(format!("{} request: {}", method, e)))?;

        debug!(method, uri = %uri, "sending request");
        let response = self
            .connection
            .send(ApiRequest {
                method: "POST".to_string(),
                uri,
                json,
            })
            .await?;

        if let Some(error) = response
            .body
            .as_ref()
            .and_then(|b| b.get("error"))
            .filter(|e| !e.is_null())
        {
            let err = ClientError::from_error_body(error);
            warn!(method, status = response.status, error = %err, "service returned an error");
            return Err(err);
        }

        if !response.is_success() {
            return Err(ClientError::Transport(format!(
                "{} returned HTTP {}",
                method, response.status
            )));
        }

        let body = match response.body {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(body) => body,
        };
        serde_json::from_value(body)
            .map_err(|e| ClientError::Decoding(format!("{} response: {}", method, e)))
    }
}
