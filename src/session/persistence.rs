use crate::env;
use crate::error::StoreError;
use crate::identity::{Credential, Identity};
use crate::store::CredentialStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Serialized form of the identity key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub identity: Identity,
}

/// What a restore attempt found in the store
#[derive(Debug)]
pub enum RestoreOutcome {
    Found(Identity),
    /// Neither key present
    Missing,
    /// Exactly one of the two keys present
    Partial { has_identity: bool },
    /// Identity key present but not decodable
    Corrupt(String),
    /// The store itself failed
    Unreadable(StoreError),
}

/// Reads and writes the two session keys as a unit.
///
/// The identity (without its credential) and the credential live under
/// separate keys. A save drops the old credential before touching the
/// identity and writes the new credential last, so an interrupted save
/// leaves an incomplete pair, which restores as absent. A failed save
/// removes both keys.
pub struct SessionPersistence {
    store: Arc<dyn CredentialStore>,
}

impl SessionPersistence {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Persist `identity` and its credential.
    pub async fn save(&self, identity: &Identity, credential: &Credential) -> Result<(), StoreError> {
        let envelope = StoredIdentity {
            format_version: env::store::IDENTITY_FORMAT_VERSION,
            saved_at: Utc::now(),
            identity: identity.without_credential(),
        };
        let serialized = serde_json::to_string(&envelope)?;

        let result = async {
            self.store.remove(env::store::CREDENTIAL_KEY).await?;
            self.store
                .write(env::store::IDENTITY_KEY, &serialized)
                .await?;
            self.store
                .write(env::store::CREDENTIAL_KEY, credential.expose())
                .await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(
                    "Session persisted to {} store for identity {}",
                    self.store.backend_name(),
                    identity.id
                );
                Ok(())
            }
            Err(e) => {
                error!("Session save failed, rolling back: {}", e);
                if let Err(rollback) = self.clear().await {
                    error!("Session rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Load the stored session, if complete and decodable.
    pub async fn restore(&self) -> RestoreOutcome {
        let identity_raw = match self.store.read(env::store::IDENTITY_KEY).await {
            Ok(value) => value,
            Err(StoreError::Corrupt(detail)) => return RestoreOutcome::Corrupt(detail),
            Err(e) => return RestoreOutcome::Unreadable(e),
        };
        let credential_raw = match self.store.read(env::store::CREDENTIAL_KEY).await {
            Ok(value) => value,
            Err(StoreError::Corrupt(detail)) => return RestoreOutcome::Corrupt(detail),
            Err(e) => return RestoreOutcome::Unreadable(e),
        };

        let credential = credential_raw.and_then(Credential::new);
        let (identity_raw, credential) = match (identity_raw, credential) {
            (None, None) => return RestoreOutcome::Missing,
            (Some(_), None) => return RestoreOutcome::Partial { has_identity: true },
            (None, Some(_)) => return RestoreOutcome::Partial { has_identity: false },
            (Some(identity), Some(credential)) => (identity, credential),
        };

        let envelope: StoredIdentity = match serde_json::from_str(&identity_raw) {
            Ok(envelope) => envelope,
            Err(e) => return RestoreOutcome::Corrupt(e.to_string()),
        };

        if envelope.format_version != env::store::IDENTITY_FORMAT_VERSION {
            return RestoreOutcome::Corrupt(format!(
                "unsupported identity format version {}",
                envelope.format_version
            ));
        }

        info!(
            "Restored session for identity {} (saved {})",
            envelope.identity.id, envelope.saved_at
        );
        RestoreOutcome::Found(envelope.identity.with_credential(credential))
    }

    /// Remove both keys. Both removals are attempted; the first error wins.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let identity = self.store.remove(env::store::IDENTITY_KEY).await;
        let credential = self.store.remove(env::store::CREDENTIAL_KEY).await;

        if let Err(e) = &identity {
            warn!("Failed to remove stored identity: {}", e);
        }
        if let Err(e) = &credential {
            warn!("Failed to remove stored credential: {}", e);
        }
        identity.and(credential)
    }
}
