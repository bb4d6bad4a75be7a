//! Durable key/value storage for the session.
//!
//! The session manager is the only writer. Backends report every failure to
//! the caller; deciding whether a failure is fatal is left to the manager.

pub mod file;
pub mod memory;


pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;

/// Key/value persistence that survives process restarts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Value under `key`, or `None` when absent.
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
