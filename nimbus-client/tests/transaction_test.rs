/// Transaction coordinator behavior against a scripted request sender
mod common;

use common::{config, dataset, dataset_with, MockSender, BASE_URL};
use nimbus_client::{ClientError, Entity, Key, Mode, Value};
use serde_json::json;

fn user(name: &str) -> Entity {
    let mut entity = Entity::new();
    entity.insert("name".to_string(), Value::from(name));
    entity
}

#[tokio::test]
async fn test_get_all_returns_only_found_entities_in_server_order() {
    let sender = MockSender::new();
    sender.reply(json!({
        "found": [ {
            "entity": {
                "key": { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User", "id": "2" } ] },
                "property": [ { "name": "name", "value": { "stringValue": "Bob" } } ]
            }
        } ],
        "missing": [ {
            "entity": { "key": { "path": [ { "kind": "User", "id": "1" } ] } }
        } ]
    }));
    let dataset = dataset(&sender);

    let (keys, entities) = dataset
        .get_all(&[Key::new("User", 1), Key::new("User", 2)])
        .await
        .unwrap();

    assert_eq!(keys, vec![Key::new("User", 2)]);
    assert_eq!(entities, vec![user("Bob")]);

    assert_eq!(sender.methods(), vec!["lookup"]);
    assert_eq!(
        sender.body(0),
        json!({
            "key": [
                { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User", "id": "1" } ] },
                { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User", "id": "2" } ] }
            ]
        })
    );
}

#[tokio::test]
async fn test_get_single_key() {
    let sender = MockSender::new();
    sender.reply(json!({
        "found": [ {
            "entity": {
                "key": { "path": [ { "kind": "User", "name": "alice" } ] },
                "property": [ { "name": "name", "value": { "stringValue": "Alice" } } ]
            }
        } ]
    }));
    sender.reply(json!({}));
    let dataset = dataset(&sender);

    let found = dataset.get(&Key::new("User", "alice")).await.unwrap();
    assert_eq!(found, Some((Key::new("User", "alice"), user("Alice"))));

    let missing = dataset.get(&Key::new("User", "ghost")).await.unwrap();
    assert_eq!(missing, None);
    assert_eq!(sender.requests().len(), 2);
}

#[tokio::test]
async fn test_put_all_length_mismatch_fails_without_request() {
    let sender = MockSender::new();
    let dataset = dataset(&sender);

    let err = dataset
        .put_all(&[Key::new("User", 1), Key::new("User", 2)], &[user("a")])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(sender.requests().is_empty());
}

#[tokio::test]
async fn test_put_all_splits_update_and_insert_auto_id() {
    let sender = MockSender::new();
    sender.reply(json!({
        "mutationResult": {
            "indexUpdates": 4,
            "insertAutoIdKey": [ { "path": [ { "kind": "User", "id": "77" } ] } ]
        }
    }));
    let dataset = dataset(&sender);

    let response = dataset
        .put_all(
            &[Key::new("User", 1), Key::incomplete("User")],
            &[user("existing"), user("fresh")],
        )
        .await
        .unwrap();

    // Raw response: assigned keys stay in wire form
    let result = response.mutation_result.unwrap();
    assert_eq!(result.index_updates, 4);
    assert_eq!(result.insert_auto_id_key.len(), 1);
    assert_eq!(result.insert_auto_id_key[0].path[0].id, Some(77));

    assert_eq!(sender.methods(), vec!["commit"]);
    assert_eq!(
        sender.body(0),
        json!({
            "mode": "NON_TRANSACTIONAL",
            "mutation": {
                "update": [ {
                    "key": { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User", "id": "1" } ] },
                    "property": [ { "name": "name", "value": { "stringValue": "existing" } } ]
                } ],
                "insertAutoId": [ {
                    "key": { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User" } ] },
                    "property": [ { "name": "name", "value": { "stringValue": "fresh" } } ]
                } ]
            }
        })
    );
}

#[tokio::test]
async fn test_put_encoding_error_sends_nothing() {
    let sender = MockSender::new();
    let dataset = dataset(&sender);

    let mut entity = Entity::new();
    entity.insert("ratio".to_string(), Value::Double(f64::NAN));
    let err = dataset.put(&Key::new("Stat", 1), &entity).await.unwrap_err();

    assert!(matches!(err, ClientError::Encoding(_)));
    assert!(sender.requests().is_empty());
}

#[tokio::test]
async fn test_delete_all_sends_one_non_transactional_commit() {
    let sender = MockSender::new();
    let dataset = dataset(&sender);

    dataset.delete_all(&[Key::new("User", 1)]).await.unwrap();

    let requests = sender.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri, format!("{}/s~demo/commit", BASE_URL));
    assert_eq!(
        requests[0].json,
        json!({
            "mode": "NON_TRANSACTIONAL",
            "mutation": {
                "delete": [ { "partitionId": { "datasetId": "s~demo" }, "path": [ { "kind": "User", "id": "1" } ] } ]
            }
        })
    );
}

#[tokio::test]
async fn test_begin_commit_then_finalize_is_noop() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-1" }));
    sender.reply(json!({}));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    assert!(tx.id().is_none());

    tx.begin().await.unwrap();
    assert_eq!(tx.id().as_deref(), Some("tx-1"));

    tx.commit().await.unwrap();
    assert!(tx.is_finalized());

    tx.finalize().await.unwrap();
    tx.finalize().await.unwrap();

    assert_eq!(sender.methods(), vec!["beginTransaction", "commit"]);
    assert_eq!(sender.body(0), json!({}));
    assert_eq!(sender.body(1), json!({ "transaction": "tx-1" }));
}

#[tokio::test]
async fn test_finalize_commits_when_open() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-9" }));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    tx.finalize().await.unwrap();

    assert!(tx.is_finalized());
    assert_eq!(sender.methods(), vec!["beginTransaction", "commit"]);
}

#[tokio::test]
async fn test_failed_commit_still_finalizes() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-2" }));
    sender.reply(json!({ "error": { "code": 409, "message": "contention" } }));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, ClientError::Service { code: Some(409), .. }));
    assert!(tx.is_finalized());

    tx.finalize().await.unwrap();
    assert_eq!(sender.requests().len(), 2);
}

#[tokio::test]
async fn test_rollback_body_and_state() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-3" }));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    tx.rollback().await.unwrap();

    assert!(tx.is_finalized());
    assert_eq!(sender.methods(), vec!["beginTransaction", "rollback"]);
    assert_eq!(sender.body(1), json!({ "transaction": "tx-3" }));
}

#[tokio::test]
async fn test_transport_error_passes_through_and_finalizes() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-4" }));
    sender.fail(ClientError::Transport("connection reset".to_string()));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    let err = tx.rollback().await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(ref m) if m == "connection reset"));
    assert!(tx.is_finalized());
}

#[tokio::test]
async fn test_begin_twice_issues_two_requests() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "first" }));
    sender.reply(json!({ "transaction": "second" }));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    tx.begin().await.unwrap();

    assert_eq!(tx.id().as_deref(), Some("second"));
    assert_eq!(sender.methods(), vec!["beginTransaction", "beginTransaction"]);
}

#[tokio::test]
async fn test_mutations_stay_non_transactional_inside_a_transaction() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-5" }));
    let dataset = dataset(&sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    assert_eq!(tx.mutation_mode(), (Mode::NonTransactional, None));

    tx.delete(&Key::new("User", 1)).await.unwrap();
    tx.get(&Key::new("User", 1)).await.unwrap();

    let delete_body = sender.body(1);
    assert_eq!(delete_body["mode"], json!("NON_TRANSACTIONAL"));
    assert!(delete_body.get("transaction").is_none());
    assert!(sender.body(2).get("readOptions").is_none());
}

#[tokio::test]
async fn test_transactional_mutations_opt_in() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-6" }));
    let dataset = dataset_with(&config("demo").with_transactional_mutations(true), &sender);

    // Auto-commit transaction has no id, so it stays non-transactional
    assert_eq!(
        dataset.default_transaction().mutation_mode(),
        (Mode::NonTransactional, None)
    );

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    assert_eq!(
        tx.mutation_mode(),
        (Mode::Transactional, Some("tx-6".to_string()))
    );

    tx.get(&Key::new("User", 1)).await.unwrap();
    assert_eq!(sender.body(1)["readOptions"], json!({ "transaction": "tx-6" }));

    tx.put(&Key::new("User", 1), &user("a")).await.unwrap();
    let put_body = sender.body(2);
    assert_eq!(put_body["mode"], json!("TRANSACTIONAL"));
    assert_eq!(put_body["transaction"], json!("tx-6"));

    // The transactional commit ended the transaction
    assert!(tx.is_finalized());
    tx.finalize().await.unwrap();
    assert_eq!(sender.methods(), vec!["beginTransaction", "lookup", "commit"]);
}

#[tokio::test]
async fn test_mutation_after_transactional_commit_is_rejected() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-7" }));
    let dataset = dataset_with(&config("demo").with_transactional_mutations(true), &sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    tx.delete(&Key::new("User", 1)).await.unwrap();

    let err = tx.delete(&Key::new("User", 2)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(sender.methods(), vec!["beginTransaction", "commit"]);
}

#[tokio::test]
async fn test_failed_transactional_commit_still_finalizes() {
    let sender = MockSender::new();
    sender.reply(json!({ "transaction": "tx-8" }));
    sender.reply(json!({ "error": { "code": 409, "message": "contention" } }));
    let dataset = dataset_with(&config("demo").with_transactional_mutations(true), &sender);

    let tx = dataset.transaction();
    tx.begin().await.unwrap();
    let err = tx.put(&Key::new("User", 1), &user("a")).await.unwrap_err();

    assert!(matches!(err, ClientError::Service { code: Some(409), .. }));
    assert!(tx.is_finalized());
}

#[tokio::test]
async fn test_run_query_is_unimplemented() {
    let sender = MockSender::new();
    let dataset = dataset(&sender);

    let query = dataset.query("User").filter("age >", 18).unwrap();
    let err = dataset.run_query(&query).await.unwrap_err();

    assert!(matches!(err, ClientError::Unimplemented(_)));
    assert!(sender.requests().is_empty());
}

#[tokio::test]
async fn test_lookup_result_without_key_is_a_decoding_error() {
    let sender = MockSender::new();
    sender.reply(json!({ "found": [ { "entity": { "property": [] } } ] }));
    let dataset = dataset(&sender);

    let err = dataset.get(&Key::new("User", 1)).await.unwrap_err();
    assert!(matches!(err, ClientError::Decoding(_)));
}
