use super::{ObjectEntry, ObjectStat, ObjectStore, ObjectStream};
use crate::error::Result;
use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The single entry point for store I/O used by the rest of the crate.
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    /// Set once the bucket is known to exist. Held across the
    /// check-then-create sequence so only one caller attempts creation.
    bucket_ready: Mutex<bool>,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            bucket_ready: Mutex::new(false),
        }
    }

    pub async fn bucket_exists(&self) -> Result<bool> {
        self.store.bucket_exists().await
    }

    /// Creates the bucket if it is missing. Concurrent callers wait for the
    /// first one and then observe the existing bucket.
    pub async fn ensure_bucket(&self) -> Result<()> {
        let mut ready = self.bucket_ready.lock().await;
        if *ready {
            return Ok(());
        }

        if !self.store.bucket_exists().await? {
            self.store.create_bucket().await?;
            info!("Bucket initialized");
        }

        *ready = true;
        Ok(())
    }

    pub async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.store.put_object(key, data, content_type).await
    }

    pub async fn get_object(&self, key: &str) -> Result<Bytes> {
        self.store.get_object(key).await
    }

    pub async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>> {
        self.store.stat_object(key).await
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.stat_object(key).await?.is_some())
    }

    pub async fn remove_object(&self, key: &str) -> Result<()> {
        self.store.remove_object(key).await
    }

    pub async fn copy_object(&self, source_key: &str, target_key: &str) -> Result<()> {
        self.store.copy_object(source_key, target_key).await
    }

    pub fn list_objects(&self, prefix: &str, recursive: bool, max_keys: Option<usize>) -> ObjectStream {
        self.store.list_objects(prefix, recursive, max_keys)
    }

    /// Drains a listing into memory.
    pub async fn collect_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectEntry>> {
        let entries: Vec<ObjectEntry> = self
            .store
            .list_objects(prefix, recursive, None)
            .try_collect()
            .await?;
        debug!(prefix = %prefix, recursive, count = entries.len(), "Listed objects");
        Ok(entries)
    }

    /// True if a non-recursive listing under `prefix` yields anything.
    pub async fn has_entries(&self, prefix: &str) -> Result<bool> {
        let mut listing = self.store.list_objects(prefix, false, Some(1));
        Ok(listing.try_next().await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn ensure_bucket_creates_once_under_concurrency() {
        let store = MemoryStore::new();
        let gateway = Arc::new(ObjectStoreGateway::new(Arc::new(store.clone())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move { gateway.ensure_bucket().await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(store.bucket_exists().await.unwrap());
    }

    #[tokio::test]
    async fn has_entries_sees_implicit_content() {
        let gateway = ObjectStoreGateway::new(Arc::new(MemoryStore::with_bucket()));
        assert!(!gateway.has_entries("docs/").await.unwrap());

        gateway
            .put_object("docs/deep/a.txt", Bytes::from_static(b"a"), "text/plain")
            .await
            .unwrap();
        assert!(gateway.has_entries("docs/").await.unwrap());
        assert!(!gateway.object_exists("docs/").await.unwrap());
    }
}
