use std::{
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tokio::{fs as async_fs, sync::Mutex};

const BLOB_EXTENSION: &str = "json";

/// Flat key-value storage for whole serialized collections.
pub trait BlobStore {
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<String>>>;
    fn set(&self, key: &str, value: &str) -> impl Future<Output = anyhow::Result<()>>;
    fn remove(&self, key: &str) -> impl Future<Output = anyhow::Result<()>>;
    fn keys(&self) -> impl Future<Output = anyhow::Result<Vec<String>>>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub async fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        async_fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create data directory {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), BLOB_EXTENSION))
    }
}

impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.blob_path(key);
        match async_fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read blob {:?}", path)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.blob_path(key);
        // write aside then rename, readers never see a torn blob
        let tmp_path = path.with_extension(format!("{}.tmp", BLOB_EXTENSION));
        async_fs::write(&tmp_path, value)
            .await
            .with_context(|| format!("Failed to write blob {:?}", tmp_path))?;
        async_fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to move blob {:?} into place", path))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.blob_path(key);
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob {:?}", path)),
        }
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = async_fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list data directory {:?}", self.dir))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(&format!(".{}", BLOB_EXTENSION)) {
                if let Some(key) = decode_key(stem) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Keys are percent-encoded so that namespace separators stay file-name safe.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Volatile store, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with raw blobs.
    pub fn with_blobs<I, K, V>(blobs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            blobs: Mutex::new(
                blobs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.blobs.lock().await.keys().cloned().collect())
    }
}

impl<B: BlobStore> BlobStore for std::sync::Arc<B> {
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<String>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> impl Future<Output = anyhow::Result<()>> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = anyhow::Result<()>> {
        (**self).remove(key)
    }

    fn keys(&self) -> impl Future<Output = anyhow::Result<Vec<String>>> {
        (**self).keys()
    }
}
