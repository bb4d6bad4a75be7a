#![allow(dead_code)]

use futures::future::BoxFuture;
use memberkit::dispatch::{HttpTransport, OutgoingRequest, RawResponse};
use memberkit::{ClientConfig, MemberClient, SessionError};
use memberkit::store::CredentialStore;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Transport that replays canned JSON responses and counts calls
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    sent: Mutex<Vec<OutgoingRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(RawResponse::json(status, &body));
    }

    pub fn push_raw(&self, response: RawResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<RawResponse, SessionError>> {
        self.sent.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            next.ok_or_else(|| SessionError::transport("no scripted response", None, true))
        })
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = "https://members.example.org/api/".to_string();
    config
}

pub fn create_client(
    store: Arc<dyn CredentialStore>,
    transport: Arc<ScriptedTransport>,
) -> MemberClient {
    MemberClient::with_parts(test_config(), store, transport).expect("client should build")
}
