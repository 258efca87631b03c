/// Per-dataset facade
use crate::config::DatasetConfig;
use crate::connection::{HttpConnection, RequestSender};
use crate::convert::{is_key_complete, key_from_key_proto, key_to_key_proto};
use crate::error::{ClientError, Result};
use crate::query::{Kinds, NamespacedKind, Query, DEFAULT_NAMESPACE};
use crate::transaction::{Endpoint, Transaction};
use nimbus_core::{Entity, Key};
use nimbus_proto::{self as proto, method};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dataset id for a project id.
///
/// Ids that already contain a partition prefix (`s~` or `e~`, anywhere in the
/// string) are kept as they are; everything else gets `s~` prepended.
pub fn dataset_id_from_project(project_id: &str) -> String {
    if project_id.contains("s~") || project_id.contains("e~") {
        project_id.to_string()
    } else {
        format!("s~{}", project_id)
    }
}

/// Entry point for one dataset.
///
/// Owns a default auto-commit transaction used by the plain CRUD calls and
/// spawns explicit transactions that share its connection.
pub struct Dataset {
    connection: Arc<dyn RequestSender>,
    endpoint: Arc<Endpoint>,
    default_transaction: Transaction,
}

impl Dataset {
    /// Connect over HTTP with the credentials and scopes of `config`
    ///
    /// # Example
    /// ```no_run
    /// # use nimbus_client::{Dataset, DatasetConfig, Key, Value, Entity};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let dataset = Dataset::new(DatasetConfig::new("my-project").with_access_token("ya29..."))?;
    ///
    /// let mut user = Entity::new();
    /// user.insert("name".to_string(), Value::from("Alice"));
    /// dataset.put(&Key::new("User", "alice"), &user).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: DatasetConfig) -> Result<Self> {
        config.validate().map_err(ClientError::Config)?;
        let connection = HttpConnection::new(&config)?;
        Ok(Self::with_connection(&config, Arc::new(connection)))
    }

    /// Use an existing request sender instead of opening an HTTP connection
    pub fn with_connection(config: &DatasetConfig, connection: Arc<dyn RequestSender>) -> Self {
        let endpoint = Arc::new(Endpoint {
            base_url: config.base_url.clone(),
            dataset_id: dataset_id_from_project(&config.project_id),
            transactional_mutations: config.transactional_mutations,
        });
        let default_transaction = Transaction::new(connection.clone(), endpoint.clone());

        debug!(dataset = %endpoint.dataset_id, "dataset ready");
        Self {
            connection,
            endpoint,
            default_transaction,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.endpoint.dataset_id
    }

    /// The auto-commit transaction behind the plain CRUD calls
    pub fn default_transaction(&self) -> &Transaction {
        &self.default_transaction
    }

    /// New explicit transaction on the shared connection, not yet begun
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.connection.clone(), self.endpoint.clone())
    }

    /// Query over one or more kinds in the default namespace
    pub fn query(&self, kinds: impl Into<Kinds>) -> Query {
        Query::in_namespace(self.endpoint.dataset_id.clone(), DEFAULT_NAMESPACE, kinds)
    }

    /// Query over (namespace, kind) pairs, each scoped on its own
    ///
    /// ```no_run
    /// # use nimbus_client::{Dataset, DatasetConfig};
    /// # fn example(dataset: Dataset) {
    /// let query = dataset.query_ns([("blog", "Post"), ("blog", "Comment")]);
    /// # }
    /// ```
    pub fn query_ns<I, K>(&self, ns_and_kinds: I) -> Query
    where
        I: IntoIterator<Item = K>,
        K: Into<NamespacedKind>,
    {
        Query::new(
            self.endpoint.dataset_id.clone(),
            ns_and_kinds.into_iter().map(Into::into).collect(),
        )
    }

    pub async fn get(&self, key: &Key) -> Result<Option<(Key, Entity)>> {
        self.default_transaction.get(key).await
    }

    pub async fn get_all(&self, keys: &[Key]) -> Result<(Vec<Key>, Vec<Entity>)> {
        self.default_transaction.get_all(keys).await
    }

    pub async fn put(&self, key: &Key, entity: &Entity) -> Result<proto::CommitResponse> {
        self.default_transaction.put(key, entity).await
    }

    pub async fn put_all(&self, keys: &[Key], entities: &[Entity]) -> Result<proto::CommitResponse> {
        self.default_transaction.put_all(keys, entities).await
    }

    pub async fn delete(&self, key: &Key) -> Result<()> {
        self.default_transaction.delete(key).await
    }

    pub async fn delete_all(&self, keys: &[Key]) -> Result<()> {
        self.default_transaction.delete_all(keys).await
    }

    pub async fn run_query(&self, query: &Query) -> Result<(Vec<Key>, Vec<Entity>)> {
        self.default_transaction.run_query(query).await
    }

    /// Run `f` inside a new transaction.
    ///
    /// If `begin` fails its error is returned and `f` never runs. When `f`
    /// succeeds the transaction is finalized (committed unless `f` already
    /// committed or rolled back). When `f` fails an unfinalized transaction is
    /// rolled back and `f`'s error is returned.
    ///
    /// # Example
    /// ```no_run
    /// # use nimbus_client::{Dataset, DatasetConfig, Key};
    /// # async fn example(dataset: Dataset) -> nimbus_client::Result<()> {
    /// dataset
    ///     .run_in_transaction(|tx| async move {
    ///         let found = tx.get(&Key::new("Counter", "visits")).await?;
    ///         Ok(found.is_some())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_in_transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let transaction = self.transaction();
        transaction.begin().await?;

        match f(transaction.clone()).await {
            Ok(value) => {
                transaction.finalize().await?;
                Ok(value)
            }
            Err(err) => {
                if !transaction.is_finalized() {
                    if let Err(rollback_err) = transaction.rollback().await {
                        warn!(error = %rollback_err, "rollback after failed transaction body failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Reserve `n` ids for an incomplete key.
    ///
    /// Returns `n` complete keys. A complete key fails before anything is sent.
    pub async fn allocate_ids(&self, incomplete_key: &Key, n: usize) -> Result<Vec<Key>> {
        if is_key_complete(incomplete_key) {
            return Err(ClientError::Validation(format!(
                "allocate_ids needs an incomplete key, got {}",
                incomplete_key
            )));
        }

        let encoded = key_to_key_proto(&self.endpoint.dataset_id, incomplete_key)?;
        let request = proto::AllocateIdsRequest {
            key: vec![encoded; n],
        };
        let response: proto::AllocateIdsResponse = self
            .default_transaction
            .make_request(method::ALLOCATE_IDS, &request)
            .await?;

        debug!(requested = n, allocated = response.key.len(), "ids allocated");
        if response.key.len() != n {
            return Err(ClientError::Decoding(format!(
                "allocateIds returned {} keys, expected {}",
                response.key.len(),
                n
            )));
        }
        response
            .key
            .into_iter()
            .map(|key| key_from_key_proto(key).map_err(ClientError::from))
            .collect()
    }
}
