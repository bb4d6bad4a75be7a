use crate::error::StoreError;
use crate::store::CredentialStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Entries = BTreeMap<String, String>;

/// Store backed by a single JSON object file.
///
/// Every mutation rewrites the whole file through a temp file that is synced
/// and then renamed over the original, so a crash leaves either the old or
/// the new contents on disk.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> Result<Option<Entries>, StoreError> {
        let content = match async_fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    /// Entries for a read-modify-write; a corrupt file starts over empty.
    /// The flag reports whether corrupt contents were discarded.
    async fn load_for_update(&self) -> Result<(Entries, bool), StoreError> {
        match self.load().await {
            Ok(entries) => Ok((entries.unwrap_or_default(), false)),
            Err(StoreError::Corrupt(detail)) => {
                warn!("Discarding corrupt store file: {}", detail);
                Ok((Entries::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match async_fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            async_fs::create_dir_all(parent).await?;
        }

        let serialized = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.temp_path();

        let mut file = async_fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = async_fs::rename(&temp_path, &self.path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(
            "Store file written: {} ({} bytes)",
            self.path.display(),
            serialized.len()
        );
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, _) = self.load_for_update().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .and_then(|mut entries| entries.remove(key)))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, discarded) = self.load_for_update().await?;
        if entries.remove(key).is_none() && !discarded {
            return Ok(());
        }
        self.save(&entries).await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
