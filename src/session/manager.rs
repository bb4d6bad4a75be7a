use crate::config::{ClientConfig, ResponseConventions};
use crate::dispatch::{Dispatcher, RequestOptions};
use crate::env;
use crate::error::SessionError;
use crate::identity::{Credential, Identity, IdentityId, identity_from_login_payload};
use crate::session::cache::{SessionCache, SessionState};
use crate::session::persistence::{RestoreOutcome, SessionPersistence};
use crate::session::publisher::IdentityPublisher;
use crate::store::CredentialStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Configuration for session manager
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub login_endpoint: String,
    pub conventions: ResponseConventions,
}

impl From<&ClientConfig> for SessionManagerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            login_endpoint: config.api.login_endpoint.clone(),
            conventions: config.conventions.clone(),
        }
    }
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Whether a session change reached durable storage
#[derive(Debug, Clone, PartialEq)]
pub enum Durability {
    Persisted,
    /// Applied in memory only; the next cold start may not see it.
    MemoryOnly { reason: String },
}

impl Durability {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Durability::Persisted)
    }
}

/// Result of a successful session change
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub identity: Identity,
    pub durability: Durability,
}

/// Credential material attached to authenticated calls
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub identity_id: IdentityId,
    pub credential: Credential,
}

/// Single authority for who is logged in.
///
/// Owns the cache, the persisted session keys and the identity publisher.
/// All session writes go through `write_lock`, so the cache update, the
/// notification and the store writes of one change never interleave with
/// another change.
pub struct SessionManager {
    cache: RwLock<SessionCache>,
    persistence: SessionPersistence,
    publisher: Arc<IdentityPublisher>,
    write_lock: Mutex<()>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, config: SessionManagerConfig) -> Self {
        Self {
            cache: RwLock::new(SessionCache::new()),
            persistence: SessionPersistence::new(store),
            publisher: Arc::new(IdentityPublisher::new()),
            write_lock: Mutex::new(()),
            config,
        }
    }

    pub fn publisher(&self) -> &Arc<IdentityPublisher> {
        &self.publisher
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Current lifecycle state. Does not warm the cache.
    pub async fn state(&self) -> SessionState {
        {
            let cache = self.cache.read().await;
            if cache.is_warm() {
                return match cache.get() {
                    Some(_) => SessionState::Active,
                    None => SessionState::Absent,
                };
            }
        }

        match self.persistence.restore().await {
            RestoreOutcome::Found(_) => SessionState::Stale,
            _ => SessionState::Absent,
        }
    }

    /// The logged-in identity, loading it from the store on first use.
    pub async fn current_identity(&self) -> Option<Identity> {
        {
            let cache = self.cache.read().await;
            if cache.is_warm() {
                return cache.get().cloned();
            }
        }

        self.restore().await
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.current_identity()
            .await
            .and_then(|identity| identity.credential)
    }

    /// Identifier and credential for an authenticated call.
    pub async fn auth_context(&self) -> Option<AuthContext> {
        let identity = self.current_identity().await?;
        let credential = identity.credential?;
        Some(AuthContext {
            identity_id: identity.id,
            credential,
        })
    }

    async fn restore(&self) -> Option<Identity> {
        let _write = self.write_lock.lock().await;

        // Another task may have warmed the cache while we waited
        {
            let cache = self.cache.read().await;
            if cache.is_warm() {
                return cache.get().cloned();
            }
        }

        let restored = match self.persistence.restore().await {
            RestoreOutcome::Found(identity) => Some(identity),
            RestoreOutcome::Missing => {
                debug!("No stored session");
                None
            }
            RestoreOutcome::Partial { has_identity } => {
                warn!(
                    "Stored session is incomplete (identity present: {}), treating as absent",
                    has_identity
                );
                None
            }
            RestoreOutcome::Corrupt(detail) => {
                warn!("Stored session is corrupt, treating as absent: {}", detail);
                None
            }
            RestoreOutcome::Unreadable(e) => {
                // Leave the cache cold so a later read retries the store
                error!("Session store unreadable: {}", e);
                return None;
            }
        };

        {
            let mut cache = self.cache.write().await;
            match &restored {
                Some(identity) => cache.set(identity.clone()),
                None => cache.clear(),
            }
        }
        self.publisher.publish(restored.clone());
        restored
    }

    /// Make `identity` the logged-in identity.
    ///
    /// The cache is updated and subscribers notified before the store is
    /// written; a store failure leaves the session active for this process
    /// and is reported as [`Durability::MemoryOnly`].
    pub async fn establish_session(&self, identity: Identity) -> Result<SessionUpdate, SessionError> {
        if identity.credential.is_none() {
            return Err(SessionError::InvalidIdentity(format!(
                "identity {} carries no credential",
                identity.id
            )));
        }

        let _write = self.write_lock.lock().await;
        let durability = self.apply(identity.clone()).await;
        info!("Session established for identity {}", identity.id);
        Ok(SessionUpdate {
            identity,
            durability,
        })
    }

    /// Replace the logged-in identity with an updated copy of itself.
    ///
    /// The replacement must have the same identifier; when it carries no
    /// credential the current one is kept.
    pub async fn replace_identity(&self, identity: Identity) -> Result<SessionUpdate, SessionError> {
        // Warm the cache first; restore takes the write lock itself
        self.current_identity().await;

        let _write = self.write_lock.lock().await;
        let current = self.active_identity().await?;
        self.replace_locked(&current, identity).await
    }

    /// Replace the profile photo reference, keeping every other field.
    pub async fn update_photo(&self, photo: Option<String>) -> Result<SessionUpdate, SessionError> {
        self.current_identity().await;

        // Read and replace under one lock hold
        let _write = self.write_lock.lock().await;
        let current = self.active_identity().await?;
        let updated = current.with_photo(photo);
        self.replace_locked(&current, updated).await
    }

    /// Cached identity. Caller holds `write_lock`.
    async fn active_identity(&self) -> Result<Identity, SessionError> {
        self.cache
            .read()
            .await
            .get()
            .cloned()
            .ok_or(SessionError::SessionInvalid)
    }

    /// Caller holds `write_lock`.
    async fn replace_locked(
        &self,
        current: &Identity,
        mut identity: Identity,
    ) -> Result<SessionUpdate, SessionError> {
        if current.id != identity.id {
            return Err(SessionError::InvalidIdentity(format!(
                "cannot replace identity {} with identity {}",
                current.id, identity.id
            )));
        }
        if identity.credential.is_none() {
            identity.credential = current.credential.clone();
        }

        let durability = self.apply(identity.clone()).await;
        debug!("Identity {} replaced", identity.id);
        Ok(SessionUpdate {
            identity,
            durability,
        })
    }

    /// Drop the session from memory and storage. Safe to call repeatedly.
    pub async fn clear_session(&self) -> Durability {
        let _write = self.write_lock.lock().await;

        self.cache.write().await.clear();
        self.publisher.publish(None);

        match self.persistence.clear().await {
            Ok(()) => {
                info!("Session cleared");
                Durability::Persisted
            }
            Err(e) => {
                error!(
                    "Session cleared in memory but the store still holds it: {}",
                    e
                );
                Durability::MemoryOnly {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Authenticate against the backend and establish the resulting session.
    ///
    /// A response that marks failure yields `AuthenticationFailed`; a response
    /// that succeeds but lacks the identity or credential yields
    /// `AuthResponseMalformed`. Other dispatcher errors pass through.
    pub async fn login(
        &self,
        dispatcher: &Dispatcher,
        document: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        let mut fields = Map::new();
        fields.insert(env::wire::LOGIN_DOCUMENT_PARAM.to_string(), Value::from(document));
        fields.insert(env::wire::LOGIN_PASSWORD_PARAM.to_string(), Value::from(password));
        let params = Value::Object(fields);

        let body = match dispatcher
            .request_with(&self.config.login_endpoint, &params, RequestOptions::public())
            .await
        {
            Ok(body) => body,
            Err(SessionError::Application(message)) => {
                info!("Login rejected by server");
                return Err(SessionError::AuthenticationFailed { message });
            }
            Err(e) => {
                warn!("Login request failed: {}", e);
                return Err(e);
            }
        };

        let identity = identity_from_login_payload(&body, &self.config.conventions)?;
        let update = self.establish_session(identity).await?;
        if let Durability::MemoryOnly { reason } = &update.durability {
            warn!(
                "Logged in for this process only; session not persisted: {}",
                reason
            );
        }
        Ok(update.identity)
    }

    /// Write the new identity to cache, notify, then persist.
    /// Caller holds `write_lock`.
    async fn apply(&self, identity: Identity) -> Durability {
        self.cache.write().await.set(identity.clone());
        self.publisher.publish(Some(identity.clone()));

        let Some(credential) = identity.credential.as_ref() else {
            return Durability::MemoryOnly {
                reason: "identity carries no credential".to_string(),
            };
        };

        match self.persistence.save(&identity, credential).await {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                error!(
                    "Session for identity {} is active but not persisted; next start will require login: {}",
                    identity.id, e
                );
                Durability::MemoryOnly {
                    reason: e.to_string(),
                }
            }
        }
    }
}
