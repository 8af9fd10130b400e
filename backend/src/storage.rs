use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob {0} not found")]
    NotFound(String),
    #[error("blob {0} already exists")]
    AlreadyExists(String),
    #[error("invalid blob key {0:?}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Write-once content storage. Blobs live under `root` when one is given and
/// in memory otherwise; either way they are published at
/// `{public_base}/{key}`.
#[derive(Clone)]
pub struct BlobStore {
    root: Option<PathBuf>,
    memory: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    public_base: String,
}

impl BlobStore {
    pub fn in_memory(public_base: impl Into<String>) -> Self {
        Self {
            root: None,
            memory: Arc::new(RwLock::new(HashMap::new())),
            public_base: trim_base(public_base.into()),
        }
    }

    pub fn on_disk(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::in_memory(public_base)
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    /// Inverse of [`public_url`](Self::public_url) for URLs this store issued.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base.as_str())?
            .strip_prefix('/')
            .filter(|key| !key.is_empty())
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        validate_key(key)?;
        match &self.root {
            Some(root) => {
                let path = root.join(key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let mut file = match tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                {
                    Ok(file) => file,
                    Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Err(StorageError::AlreadyExists(key.to_string()))
                    }
                    Err(err) => return Err(err.into()),
                };
                file.write_all(&bytes).await?;
                file.flush().await?;
            }
            None => {
                let mut memory = self.memory.write().await;
                if memory.contains_key(key) {
                    return Err(StorageError::AlreadyExists(key.to_string()));
                }
                memory.insert(key.to_string(), bytes);
            }
        }
        Ok(self.public_url(key))
    }

    pub async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        validate_key(key)?;
        let bytes = match &self.root {
            Some(root) => match tokio::fs::read(root.join(key)).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::NotFound(key.to_string()))
                }
                Err(err) => return Err(err.into()),
            },
            None => self
                .memory
                .read()
                .await
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))?,
        };
        Ok(StoredBlob {
            bytes,
            content_type: content_type_for(key),
        })
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        match &self.root {
            Some(root) => match tokio::fs::remove_file(root.join(key)).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(key.to_string()))
                }
                Err(err) => Err(err.into()),
            },
            None => self
                .memory
                .write()
                .await
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(key.to_string())),
        }
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

// Keys are relative slash-separated paths; nothing may escape the root.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.contains('\\')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        _ => "application/octet-stream",
    }
}
