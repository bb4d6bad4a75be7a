//! UI-facing entry point.
//!
//! [`MemberClient`] wires a [`SessionManager`] and a [`Dispatcher`] over the
//! same store and exposes the operations screens are allowed to call.

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, HttpTransport, ReqwestTransport, RequestOptions};
use crate::error::SessionError;
use crate::identity::Identity;
use crate::session::{
    Durability, SessionManager, SessionManagerConfig, SessionState, SessionUpdate, SubscriptionId,
};
use crate::store::{CredentialStore, FileStore, MemoryStore};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

pub struct MemberClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    dispatcher: Dispatcher,
}

impl MemberClient {
    /// Client over the configured store and a `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn CredentialStore> = if config.storage.ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            let path = config.storage.session_file()?;
            info!("Using session file {}", path.display());
            Arc::new(FileStore::new(path))
        };
        let transport =
            Arc::new(ReqwestTransport::new(&config.api).context("Failed to create HTTP transport")?);
        Self::with_parts(config, store, transport)
    }

    /// Client over caller-provided store and transport.
    pub fn with_parts(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let session = Arc::new(SessionManager::new(
            store,
            SessionManagerConfig::from(&config),
        ));
        let dispatcher = Dispatcher::new(&config, transport, Arc::clone(&session))
            .context("Failed to create dispatcher")?;

        Ok(Self {
            config,
            session,
            dispatcher,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.session.current_identity().await
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    /// Called now with the current identity, then on every change.
    pub fn subscribe<F>(&self, on_change: F) -> SubscriptionId
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        self.session.publisher().subscribe(on_change)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.session.publisher().unsubscribe(id)
    }

    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.session.publisher().watch()
    }

    pub async fn login(&self, document: &str, password: &str) -> Result<Identity, SessionError> {
        self.session.login(&self.dispatcher, document, password).await
    }

    pub async fn logout(&self) -> Durability {
        self.session.clear_session().await
    }

    pub async fn replace_identity(&self, identity: Identity) -> Result<SessionUpdate, SessionError> {
        self.session.replace_identity(identity).await
    }

    pub async fn update_photo(&self, photo: Option<String>) -> Result<SessionUpdate, SessionError> {
        self.session.update_photo(photo).await
    }

    pub async fn request(
        &self,
        endpoint: &str,
        params: &Value,
        requires_auth: bool,
    ) -> Result<Value, SessionError> {
        self.dispatcher.request(endpoint, params, requires_auth).await
    }

    pub async fn request_with(
        &self,
        endpoint: &str,
        params: &Value,
        options: RequestOptions,
    ) -> Result<Value, SessionError> {
        self.dispatcher.request_with(endpoint, params, options).await
    }

    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Value,
        options: RequestOptions,
    ) -> Result<T, SessionError> {
        self.dispatcher.request_as(endpoint, params, options).await
    }
}
