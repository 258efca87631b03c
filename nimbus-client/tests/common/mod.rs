//! Shared helpers for the client integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nimbus_client::{
    ApiRequest, ApiResponse, ClientError, Dataset, DatasetConfig, RequestSender, Result,
};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::sync::Arc;

pub const BASE_URL: &str = "https://datastore.test/v1beta2/datasets";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Request sender that records every request and replays scripted replies in
/// order. Once the script runs out it answers `{}`.
#[derive(Default)]
pub struct MockSender {
    replies: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, body: Json) -> &Self {
        self.replies.lock().push_back(Ok(ApiResponse::ok(body)));
        self
    }

    pub fn reply_with(&self, response: ApiResponse) -> &Self {
        self.replies.lock().push_back(Ok(response));
        self
    }

    pub fn fail(&self, err: ClientError) -> &Self {
        self.replies.lock().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Remote method of each request, i.e. the last URI segment
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.uri.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn body(&self, index: usize) -> Json {
        self.requests.lock()[index].json.clone()
    }
}

#[async_trait]
impl RequestSender for MockSender {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::ok(serde_json::json!({}))))
    }
}

pub fn config(project_id: &str) -> DatasetConfig {
    DatasetConfig::new(project_id).with_base_url(BASE_URL)
}

pub fn dataset_with(config: &DatasetConfig, sender: &Arc<MockSender>) -> Dataset {
    init_tracing();
    Dataset::with_connection(config, sender.clone())
}

pub fn dataset(sender: &Arc<MockSender>) -> Dataset {
    dataset_with(&config("demo"), sender)
}
