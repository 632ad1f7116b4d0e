use super::{ObjectEntry, ObjectStat, ObjectStore, ObjectStream};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

type Bucket = BTreeMap<String, StoredObject>;

/// In-process bucket with S3 listing semantics. Keys are kept sorted, so
/// listings come back in lexicographic order like they do from S3.
#[derive(Clone, Default)]
pub struct MemoryStore {
    bucket: Arc<RwLock<Option<Bucket>>>,
}

impl MemoryStore {
    /// A store whose bucket has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with its bucket already in place.
    pub fn with_bucket() -> Self {
        Self {
            bucket: Arc::new(RwLock::new(Some(Bucket::new()))),
        }
    }

    /// Number of stored objects, markers included.
    pub async fn len(&self) -> usize {
        self.bucket.read().await.as_ref().map_or(0, |b| b.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn no_bucket() -> Error {
    Error::Storage("bucket does not exist".to_string())
}

fn list_entries(bucket: &Bucket, prefix: &str, recursive: bool) -> Vec<ObjectEntry> {
    let mut entries: Vec<ObjectEntry> = Vec::new();

    for (key, object) in bucket.range(prefix.to_string()..) {
        let Some(rest) = key.strip_prefix(prefix) else {
            break;
        };

        if recursive {
            entries.push(ObjectEntry::object(key.as_str(), object.data.len() as u64));
            continue;
        }

        match rest.find('/') {
            Some(index) => {
                let common = &key[..prefix.len() + index + 1];
                let seen = entries
                    .last()
                    .map_or(false, |last| last.is_implicit_dir && last.key == common);
                if !seen {
                    entries.push(ObjectEntry::common_prefix(common));
                }
            }
            None => entries.push(ObjectEntry::object(key.as_str(), object.data.len() as u64)),
        }
    }

    entries
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self) -> Result<bool> {
        Ok(self.bucket.read().await.is_some())
    }

    async fn create_bucket(&self) -> Result<()> {
        let mut bucket = self.bucket.write().await;
        if bucket.is_none() {
            *bucket = Some(Bucket::new());
            debug!("Created in-memory bucket");
        }
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let mut guard = self.bucket.write().await;
        let bucket = guard.as_mut().ok_or_else(no_bucket)?;
        let size = data.len();
        bucket.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        debug!(key = %key, size, "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let guard = self.bucket.read().await;
        let bucket = guard.as_ref().ok_or_else(no_bucket)?;
        bucket
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::Storage(format!("no such key: {}", key)))
    }

    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>> {
        let guard = self.bucket.read().await;
        let bucket = guard.as_ref().ok_or_else(no_bucket)?;
        Ok(bucket.get(key).map(|object| ObjectStat {
            size: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
        }))
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        let mut guard = self.bucket.write().await;
        let bucket = guard.as_mut().ok_or_else(no_bucket)?;
        if bucket.remove(key).is_some() {
            debug!(key = %key, "Removed object");
        }
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, target_key: &str) -> Result<()> {
        let mut guard = self.bucket.write().await;
        let bucket = guard.as_mut().ok_or_else(no_bucket)?;
        let object = bucket
            .get(source_key)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no such key: {}", source_key)))?;
        bucket.insert(target_key.to_string(), object);
        Ok(())
    }

    fn list_objects(&self, prefix: &str, recursive: bool, max_keys: Option<usize>) -> ObjectStream {
        let bucket = Arc::clone(&self.bucket);
        let prefix = prefix.to_string();

        let listing = async move {
            let guard = bucket.read().await;
            let bucket = guard.as_ref().ok_or_else(no_bucket)?;
            Ok::<_, Error>(list_entries(bucket, &prefix, recursive))
        };

        let entries = stream::once(listing)
            .map_ok(|entries| stream::iter(entries.into_iter().map(Ok)))
            .try_flatten();

        match max_keys {
            Some(limit) => entries.take(limit).boxed(),
            None => entries.boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::with_bucket();
        for key in ["a/", "a/x.txt", "a/b/", "a/b/y.txt", "a/c/z.txt", "ab.txt"] {
            store
                .put_object(key, Bytes::from(key.to_string()), "text/plain")
                .await
                .unwrap();
        }
        store
    }

    async fn keys(store: &MemoryStore, prefix: &str, recursive: bool) -> Vec<(String, bool)> {
        store
            .list_objects(prefix, recursive, None)
            .map_ok(|e| (e.key, e.is_implicit_dir))
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn non_recursive_listing_groups_common_prefixes() {
        let store = seeded().await;
        assert_eq!(
            keys(&store, "a/", false).await,
            vec![
                ("a/".to_string(), false),
                ("a/b/".to_string(), true),
                ("a/c/".to_string(), true),
                ("a/x.txt".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn recursive_listing_returns_every_key_under_prefix() {
        let store = seeded().await;
        let listed: Vec<String> = keys(&store, "a/", true).await.into_iter().map(|(k, _)| k).collect();
        assert_eq!(listed, vec!["a/", "a/b/", "a/b/y.txt", "a/c/z.txt", "a/x.txt"]);
    }

    #[tokio::test]
    async fn max_keys_limits_the_stream() {
        let store = seeded().await;
        let listed: Vec<ObjectEntry> = store
            .list_objects("", true, Some(2))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn stat_distinguishes_absence_from_failure() {
        let store = seeded().await;
        assert_eq!(store.stat_object("a/x.txt").await.unwrap().unwrap().size, 7);
        assert!(store.stat_object("missing").await.unwrap().is_none());

        let bucketless = MemoryStore::new();
        assert!(bucketless.stat_object("a").await.is_err());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = seeded().await;
        store.remove_object("a/x.txt").await.unwrap();
        store.remove_object("a/x.txt").await.unwrap();
        assert!(store.stat_object("a/x.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn copy_keeps_the_source() {
        let store = seeded().await;
        store.copy_object("a/x.txt", "copy.txt").await.unwrap();
        assert_eq!(store.get_object("copy.txt").await.unwrap(), Bytes::from("a/x.txt"));
        assert!(store.stat_object("a/x.txt").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bucket_creation_is_idempotent() {
        let store = MemoryStore::new();
        assert!(!store.bucket_exists().await.unwrap());
        store.create_bucket().await.unwrap();
        store.put_object("k", Bytes::from_static(b"v"), "text/plain").await.unwrap();
        store.create_bucket().await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
