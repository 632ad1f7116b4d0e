pub mod gateway;
pub mod memory;
pub mod s3;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use gateway::ObjectStoreGateway;
pub use memory::MemoryStore;
pub use s3::S3Store;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub content_type: Option<String>,
}

/// One listing entry. Non-recursive listings fold everything below a
/// sub-prefix into a single entry with `is_implicit_dir` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub is_implicit_dir: bool,
}

impl ObjectEntry {
    pub fn object(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            is_implicit_dir: false,
        }
    }

    pub fn common_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            size: 0,
            is_implicit_dir: true,
        }
    }
}

pub type ObjectStream = BoxStream<'static, Result<ObjectEntry>>;

/// Flat key/value blob store bound to a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // Bucket operations
    async fn bucket_exists(&self) -> Result<bool>;

    /// Creates the bucket. Succeeds if this caller already owns it.
    async fn create_bucket(&self) -> Result<()>;

    // Object operations
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<Bytes>;

    /// `Ok(None)` when the key is absent; `Err` only on transport failure.
    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>>;

    /// Removing an absent key is not an error.
    async fn remove_object(&self, key: &str) -> Result<()>;

    /// Server-side copy within the bucket.
    async fn copy_object(&self, source_key: &str, target_key: &str) -> Result<()>;

    /// Lazily lists keys under `prefix`. Non-recursive listings group
    /// deeper keys by their next `/`, the way S3 delimiter listings do.
    fn list_objects(&self, prefix: &str, recursive: bool, max_keys: Option<usize>) -> ObjectStream;
}
